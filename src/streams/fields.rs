//! 課題フィールドとカスタムフィールドコンテキスト

use std::collections::HashMap;

use async_stream::try_stream;
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;

use super::StreamArgs;
use crate::client::ApiBase;
use crate::error::{Error, Result};
use crate::stream::{
    Extract, PageRequest, Record, RecordStream, Stream, StreamState, SyncMode, boxed, field_string,
    paginate, stamp,
};

/// 全フィールド（システム・カスタム）の一覧
#[derive(Debug, Clone)]
pub struct IssueFields {
    args: StreamArgs,
}

impl IssueFields {
    pub fn new(args: StreamArgs) -> Self {
        Self { args }
    }

    fn request() -> PageRequest {
        PageRequest::new(ApiBase::Platform, "field", Extract::Root).paginate(false)
    }

    /// フィールド名から ID の一覧を引くマップを作る（同名フィールドは複数あり得る）
    pub async fn field_ids_by_name(&self) -> Result<HashMap<String, Vec<String>>> {
        let fields: Vec<Record> = paginate(&self.args.client, Self::request())
            .try_collect()
            .await?;

        let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
        for field in &fields {
            if let (Some(name), Some(id)) = (field_string(field, "name"), field_string(field, "id")) {
                by_name.entry(name).or_default().push(id);
            }
        }
        Ok(by_name)
    }
}

impl Stream for IssueFields {
    fn name(&self) -> &'static str {
        "issue_fields"
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
        paginate(&self.args.client, Self::request())
    }
}

/// コンテキスト取得時に読み飛ばすステータス
const SKIPPED_STATUSES: [u16; 3] = [400, 403, 404];

/// カスタムフィールドごとのコンテキスト
#[derive(Debug, Clone)]
pub struct IssueCustomFieldContexts {
    fields: IssueFields,
}

impl IssueCustomFieldContexts {
    pub fn new(args: StreamArgs) -> Self {
        Self {
            fields: IssueFields::new(args),
        }
    }
}

fn is_custom(field: &Record) -> bool {
    field.get("custom").and_then(Value::as_bool).unwrap_or(false)
}

fn is_skipped(error: &Error) -> bool {
    error
        .status()
        .is_some_and(|status| SKIPPED_STATUSES.contains(&status))
}

impl Stream for IssueCustomFieldContexts {
    fn name(&self) -> &'static str {
        "issue_custom_field_contexts"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("id")
    }

    fn projects(&self) -> &[String] {
        &self.fields.args.projects
    }

    fn read_records<'a>(
        &'a self,
        sync_mode: SyncMode,
        state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        boxed(try_stream! {
            let mut fields = self.fields.read_records(sync_mode, state);
            while let Some(field) = fields.next().await {
                let field = field?;
                if !is_custom(&field) {
                    continue;
                }
                let Some(field_id) = field_string(&field, "id") else {
                    continue;
                };

                let request = PageRequest::new(
                    ApiBase::Platform,
                    format!("field/{}/context", field_id),
                    Extract::Field("values"),
                );
                let field_type = field.pointer("/schema/type").cloned();

                let mut contexts = paginate(&self.fields.args.client, request);
                while let Some(context) = contexts.next().await {
                    let mut context = match context {
                        Err(e) if is_skipped(&e) => {
                            tracing::warn!(field_id = %field_id, error = %e, "skipping custom field context");
                            break;
                        }
                        other => other?,
                    };
                    stamp(&mut context, "fieldId", Some(Value::String(field_id.clone())));
                    stamp(&mut context, "fieldType", field_type.clone());
                    yield context;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::test_support::args_for;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_fields(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rest/api/3/field"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "summary", "name": "Summary", "custom": false},
                {"id": "customfield_10000", "name": "Development", "custom": true, "schema": {"type": "any"}},
                {"id": "customfield_10001", "name": "Development", "custom": true, "schema": {"type": "any"}},
                {"id": "customfield_10002", "name": "Team", "custom": true, "schema": {"type": "team"}}
            ])))
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_field_ids_by_name() {
        let mock_server = MockServer::start().await;
        mount_fields(&mock_server).await;

        let fields = IssueFields::new(args_for(&mock_server.uri(), &[]));
        let by_name = fields.field_ids_by_name().await.unwrap();

        assert_eq!(
            by_name["Development"],
            vec!["customfield_10000".to_string(), "customfield_10001".to_string()]
        );
        assert_eq!(by_name["Summary"], vec!["summary".to_string()]);
    }

    #[tokio::test]
    async fn test_custom_field_contexts_skip_forbidden_fields() {
        // Given: 1 件は 403、1 件は 404、1 件は正常
        let mock_server = MockServer::start().await;
        mount_fields(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/field/customfield_10000/context"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/field/customfield_10001/context"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/field/customfield_10002/context"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "maxResults": 50,
                "total": 1,
                "isLast": true,
                "values": [{"id": "10100", "name": "Default context"}]
            })))
            .mount(&mock_server)
            .await;

        let stream = IssueCustomFieldContexts::new(args_for(&mock_server.uri(), &[]));

        // When
        let records: Vec<Record> = stream
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await
            .unwrap();

        // Then: 読めたコンテキストだけが返る
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["fieldId"], "customfield_10002");
        assert_eq!(records[0]["fieldType"], "team");
    }

    #[tokio::test]
    async fn test_custom_field_contexts_propagate_server_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/field"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "customfield_10000", "name": "Team", "custom": true}
            ])))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/field/customfield_10000/context"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let stream = IssueCustomFieldContexts::new(args_for(&mock_server.uri(), &[]));

        let result: Result<Vec<Record>> = stream
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await;

        assert!(matches!(result, Err(Error::ApiError { status: 500, .. })));
    }
}
