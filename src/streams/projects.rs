//! プロジェクトとプロジェクト配下のリソース

use async_stream::try_stream;
use futures::StreamExt;

use super::StreamArgs;
use crate::client::ApiBase;
use crate::stream::{
    Extract, PageRequest, Record, RecordStream, Stream, StreamState, SyncMode, boxed, field_string,
    paginate, stamp,
};

/// プロジェクト一覧。プロジェクトが指定されている場合はキーで絞り込む
#[derive(Debug, Clone)]
pub struct Projects {
    args: StreamArgs,
}

impl Projects {
    pub fn new(args: StreamArgs) -> Self {
        Self { args }
    }

    fn in_scope(&self, project: &Record) -> bool {
        let projects = &self.args.projects;
        projects.is_empty()
            || field_string(project, "key").is_some_and(|key| projects.contains(&key))
    }

    fn read_projects(&self) -> RecordStream<'_> {
        boxed(try_stream! {
            let request = PageRequest::new(ApiBase::Platform, "project/search", Extract::Field("values"))
                .param("expand", "description,lead");
            let mut projects = paginate(&self.args.client, request);
            while let Some(project) = projects.next().await {
                let project = project?;
                if self.in_scope(&project) {
                    yield project;
                }
            }
        })
    }
}

impl Stream for Projects {
    fn name(&self) -> &'static str {
        "projects"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("id")
    }

    fn projects(&self) -> &[String] {
        &self.args.projects
    }

    fn read_records<'a>(
        &'a self,
        _sync_mode: SyncMode,
        _state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        self.read_projects()
    }
}

/// 子リソースのパスに埋め込むプロジェクトの識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectRef {
    Key,
    Id,
}

/// プロジェクト子ストリームの定義。パスは `project/{key|id}/{resource}`
#[derive(Debug)]
pub struct ProjectChildDefinition {
    pub name: &'static str,
    pub resource: &'static str,
    pub by: ProjectRef,
    pub extract: Extract,
    pub primary_key: Option<&'static str>,
    pub paginate: bool,
}

pub static PROJECT_AVATARS: ProjectChildDefinition = ProjectChildDefinition {
    name: "project_avatars",
    resource: "avatars",
    by: ProjectRef::Key,
    extract: Extract::ObjectValues(None),
    primary_key: Some("id"),
    paginate: false,
};

pub static PROJECT_COMPONENTS: ProjectChildDefinition = ProjectChildDefinition {
    name: "project_components",
    resource: "component",
    by: ProjectRef::Key,
    extract: Extract::Field("values"),
    primary_key: Some("id"),
    paginate: true,
};

pub static PROJECT_EMAIL: ProjectChildDefinition = ProjectChildDefinition {
    name: "project_email",
    resource: "email",
    by: ProjectRef::Id,
    extract: Extract::Root,
    primary_key: Some("projectId"),
    paginate: false,
};

pub static PROJECT_PERMISSION_SCHEMES: ProjectChildDefinition = ProjectChildDefinition {
    name: "project_permission_schemes",
    resource: "securitylevel",
    by: ProjectRef::Key,
    extract: Extract::Field("levels"),
    primary_key: Some("id"),
    paginate: false,
};

pub static PROJECT_VERSIONS: ProjectChildDefinition = ProjectChildDefinition {
    name: "project_versions",
    resource: "version",
    by: ProjectRef::Key,
    extract: Extract::Field("values"),
    primary_key: Some("id"),
    paginate: true,
};

/// 対象プロジェクトごとに 1 エンドポイントを読む子ストリーム
#[derive(Debug, Clone)]
pub struct ProjectChildStream {
    definition: &'static ProjectChildDefinition,
    projects: Projects,
}

impl ProjectChildStream {
    pub fn new(definition: &'static ProjectChildDefinition, args: StreamArgs) -> Self {
        Self {
            definition,
            projects: Projects::new(args),
        }
    }

    pub fn definition(&self) -> &'static ProjectChildDefinition {
        self.definition
    }
}

impl Stream for ProjectChildStream {
    fn name(&self) -> &'static str {
        self.definition.name
    }

    fn primary_key(&self) -> Option<&'static str> {
        self.definition.primary_key
    }

    fn projects(&self) -> &[String] {
        &self.projects.args.projects
    }

    fn read_records<'a>(
        &'a self,
        _sync_mode: SyncMode,
        _state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        let definition = self.definition;
        boxed(try_stream! {
            let mut projects = self.projects.read_projects();
            while let Some(project) = projects.next().await {
                let project = project?;
                let reference = match definition.by {
                    ProjectRef::Key => field_string(&project, "key"),
                    ProjectRef::Id => field_string(&project, "id"),
                };
                let Some(reference) = reference else {
                    continue;
                };

                let request = PageRequest::new(
                    ApiBase::Platform,
                    format!("project/{}/{}", reference, definition.resource),
                    definition.extract,
                )
                .paginate(definition.paginate);

                let mut records = paginate(&self.projects.args.client, request);
                while let Some(record) = records.next().await {
                    let mut record = record?;
                    stamp(&mut record, "projectId", project.get("id").cloned());
                    yield record;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::test_support::args_for;
    use futures::TryStreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_projects(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rest/api/3/project/search"))
            .and(query_param("expand", "description,lead"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "maxResults": 50,
                "total": 2,
                "isLast": true,
                "values": [
                    {"id": "10000", "key": "ABC", "name": "Alpha"},
                    {"id": "10001", "key": "XYZ", "name": "Omega"}
                ]
            })))
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_projects_filtered_by_key() {
        let mock_server = MockServer::start().await;
        mount_projects(&mock_server).await;

        let records: Vec<Record> = Projects::new(args_for(&mock_server.uri(), &["XYZ"]))
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["key"], "XYZ");
    }

    #[tokio::test]
    async fn test_project_email_uses_project_id() {
        let mock_server = MockServer::start().await;
        mount_projects(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/project/10000/email"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "emailAddress": "alpha@example.com"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let stream = ProjectChildStream::new(&PROJECT_EMAIL, args_for(&mock_server.uri(), &["ABC"]));

        let records: Vec<Record> = stream
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            records,
            vec![json!({"emailAddress": "alpha@example.com", "projectId": "10000"})]
        );
    }

    #[tokio::test]
    async fn test_project_avatars_flatten_system_and_custom() {
        // Given: system と custom に分かれたアバター
        let mock_server = MockServer::start().await;
        mount_projects(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/project/ABC/avatars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "system": [{"id": "1"}, {"id": "2"}],
                "custom": [{"id": "3"}]
            })))
            .mount(&mock_server)
            .await;

        let stream =
            ProjectChildStream::new(&PROJECT_AVATARS, args_for(&mock_server.uri(), &["ABC"]));

        // When
        let records: Vec<Record> = stream
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await
            .unwrap();

        // Then: 全アバターが 1 レコードずつ返る
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r["projectId"] == "10000"));
    }
}
