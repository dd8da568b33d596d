//! Jira Software（アジャイル API）のボード・スプリント関連ストリーム

use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::Value;

use super::{IncrementalStreamArgs, StreamArgs};
use crate::client::ApiBase;
use crate::stream::{
    Extract, IncrementalCursor, PageRequest, Record, RecordStream, Stream, StreamState, SyncMode,
    boxed, field_string, paginate, stamp,
};
use crate::time_filter::jql_since_condition;

/// アジャイル API の課題一覧で要求するフィールド
const AGILE_ISSUE_FIELDS: &str = "key,created,updated";

/// 課題の `fields.created` / `fields.updated` をトップレベルに持ち上げる
fn lift_issue_dates(record: &mut Record) {
    let created = record.pointer("/fields/created").cloned();
    let updated = record.pointer("/fields/updated").cloned();
    stamp(record, "created", created);
    stamp(record, "updated", updated);
}

fn agile_issue_request(path: String, since: Option<DateTime<Utc>>) -> PageRequest {
    let request = PageRequest::new(ApiBase::Agile, path, Extract::Field("issues"))
        .param("fields", AGILE_ISSUE_FIELDS);
    match since {
        Some(since) => request.param("jql", jql_since_condition("updated", &since)),
        None => request,
    }
}

/// ボード一覧。プロジェクトが指定されている場合はその所在プロジェクトで絞り込む
#[derive(Debug, Clone)]
pub struct Boards {
    args: StreamArgs,
}

impl Boards {
    pub fn new(args: StreamArgs) -> Self {
        Self { args }
    }

    fn in_scope(&self, board: &Record) -> bool {
        let projects = &self.args.projects;
        if projects.is_empty() {
            return true;
        }
        board
            .pointer("/location/projectKey")
            .and_then(Value::as_str)
            .is_some_and(|key| projects.iter().any(|p| p == key))
    }

    fn read_boards(&self) -> RecordStream<'_> {
        boxed(try_stream! {
            let request = PageRequest::new(ApiBase::Agile, "board", Extract::Field("values"));
            let mut boards = paginate(&self.args.client, request);
            while let Some(board) = boards.next().await {
                let mut board = board?;
                if !self.in_scope(&board) {
                    continue;
                }
                let project_id = board.pointer("/location/projectId").cloned();
                let project_key = board.pointer("/location/projectKey").cloned();
                stamp(&mut board, "projectId", project_id);
                stamp(&mut board, "projectKey", project_key);
                yield board;
            }
        })
    }
}

impl Stream for Boards {
    fn name(&self) -> &'static str {
        "boards"
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
        self.read_boards()
    }
}

/// ボードごとの課題
#[derive(Debug, Clone)]
pub struct BoardIssues {
    args: IncrementalStreamArgs,
    boards: Boards,
    cursor: IncrementalCursor,
}

impl BoardIssues {
    pub fn new(args: IncrementalStreamArgs) -> Self {
        let cursor = IncrementalCursor::new("updated", args.start_date);
        Self {
            boards: Boards::new(args.args.clone()),
            args,
            cursor,
        }
    }
}

impl Stream for BoardIssues {
    fn name(&self) -> &'static str {
        "board_issues"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("id")
    }

    fn cursor_field(&self) -> Option<&'static str> {
        Some(self.cursor.field())
    }

    fn projects(&self) -> &[String] {
        self.args.projects()
    }

    fn read_records<'a>(
        &'a self,
        sync_mode: SyncMode,
        state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        let since = self.cursor.starting_point(sync_mode.effective_state(state));
        boxed(try_stream! {
            let mut boards = self.boards.read_boards();
            while let Some(board) = boards.next().await {
                let board = board?;
                let Some(board_id) = field_string(&board, "id") else {
                    continue;
                };

                let request = agile_issue_request(format!("board/{}/issue", board_id), since);
                let mut issues = paginate(self.args.client(), request);
                while let Some(issue) = issues.next().await {
                    let mut issue = issue?;
                    stamp(&mut issue, "boardId", board.get("id").cloned());
                    lift_issue_dates(&mut issue);
                    if self.cursor.accepts(&issue, since) {
                        yield issue;
                    }
                }
            }
        })
    }
}

/// スクラムボードのスプリント
#[derive(Debug, Clone)]
pub struct Sprints {
    boards: Boards,
}

impl Sprints {
    pub fn new(args: StreamArgs) -> Self {
        Self {
            boards: Boards::new(args),
        }
    }

    fn read_sprints(&self) -> RecordStream<'_> {
        boxed(try_stream! {
            let mut boards = self.boards.read_boards();
            while let Some(board) = boards.next().await {
                let board = board?;
                // スプリントを持つのはスクラムボードのみ
                if board.get("type").and_then(Value::as_str) != Some("scrum") {
                    continue;
                }
                let Some(board_id) = field_string(&board, "id") else {
                    continue;
                };

                let request = PageRequest::new(
                    ApiBase::Agile,
                    format!("board/{}/sprint", board_id),
                    Extract::Field("values"),
                );
                let mut sprints = paginate(&self.boards.args.client, request);
                while let Some(sprint) = sprints.next().await {
                    let mut sprint = sprint?;
                    stamp(&mut sprint, "boardId", board.get("id").cloned());
                    yield sprint;
                }
            }
        })
    }
}

impl Stream for Sprints {
    fn name(&self) -> &'static str {
        "sprints"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("id")
    }

    fn projects(&self) -> &[String] {
        &self.boards.args.projects
    }

    fn read_records<'a>(
        &'a self,
        _sync_mode: SyncMode,
        _state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        self.read_sprints()
    }
}

/// スプリントごとの課題。ID は `{sprintId}-{issueId}`
#[derive(Debug, Clone)]
pub struct SprintIssues {
    args: IncrementalStreamArgs,
    sprints: Sprints,
    cursor: IncrementalCursor,
}

impl SprintIssues {
    pub fn new(args: IncrementalStreamArgs) -> Self {
        let cursor = IncrementalCursor::new("updated", args.start_date);
        Self {
            sprints: Sprints::new(args.args.clone()),
            args,
            cursor,
        }
    }
}

fn sprint_issue_record(mut issue: Record, sprint_id: &str) -> Record {
    lift_issue_dates(&mut issue);
    if let (Some(issue_id), Some(obj)) = (field_string(&issue, "id"), issue.as_object_mut()) {
        obj.insert("issueId".to_string(), Value::String(issue_id.clone()));
        obj.insert("sprintId".to_string(), Value::String(sprint_id.to_string()));
        obj.insert(
            "id".to_string(),
            Value::String(format!("{}-{}", sprint_id, issue_id)),
        );
    }
    issue
}

impl Stream for SprintIssues {
    fn name(&self) -> &'static str {
        "sprint_issues"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("id")
    }

    fn cursor_field(&self) -> Option<&'static str> {
        Some(self.cursor.field())
    }

    fn projects(&self) -> &[String] {
        self.args.projects()
    }

    fn read_records<'a>(
        &'a self,
        sync_mode: SyncMode,
        state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        let since = self.cursor.starting_point(sync_mode.effective_state(state));
        boxed(try_stream! {
            let mut sprints = self.sprints.read_sprints();
            while let Some(sprint) = sprints.next().await {
                let sprint = sprint?;
                let Some(sprint_id) = field_string(&sprint, "id") else {
                    continue;
                };

                let request = agile_issue_request(format!("sprint/{}/issue", sprint_id), since);
                let mut issues = paginate(self.args.client(), request);
                while let Some(issue) = issues.next().await {
                    let issue = sprint_issue_record(issue?, &sprint_id);
                    if self.cursor.accepts(&issue, since) {
                        yield issue;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::test_support::{args_for, incremental_args_for};
    use futures::TryStreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_boards(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rest/agile/1.0/board"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "maxResults": 50,
                "total": 2,
                "isLast": true,
                "values": [
                    {"id": 1, "type": "scrum", "location": {"projectId": 10000, "projectKey": "ABC"}},
                    {"id": 2, "type": "kanban", "location": {"projectId": 10001, "projectKey": "XYZ"}}
                ]
            })))
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_boards_filtered_by_project() {
        let mock_server = MockServer::start().await;
        mount_boards(&mock_server).await;

        let all: Vec<Record> = Boards::new(args_for(&mock_server.uri(), &[]))
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let filtered: Vec<Record> = Boards::new(args_for(&mock_server.uri(), &["ABC"]))
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["projectKey"], "ABC");
        assert_eq!(filtered[0]["projectId"], 10000);
    }

    #[tokio::test]
    async fn test_board_issues_stamped_with_board() {
        let mock_server = MockServer::start().await;
        mount_boards(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/rest/agile/1.0/board/1/issue"))
            .and(query_param("fields", "key,created,updated"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "maxResults": 50,
                "total": 1,
                "issues": [{
                    "id": "10001",
                    "key": "ABC-1",
                    "fields": {
                        "created": "2024-01-01T00:00:00.000+0000",
                        "updated": "2024-01-02T00:00:00.000+0000"
                    }
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let stream = BoardIssues::new(incremental_args_for(&mock_server.uri(), &["ABC"], None));

        let records: Vec<Record> = stream
            .read_records(SyncMode::Incremental, None)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["boardId"], 1);
        assert_eq!(records[0]["updated"], "2024-01-02T00:00:00.000+0000");
    }

    #[tokio::test]
    async fn test_sprint_issues_only_for_scrum_boards() {
        // Given: スクラムボード 1 件とカンバンボード 1 件
        let mock_server = MockServer::start().await;
        mount_boards(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/rest/agile/1.0/board/1/sprint"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "maxResults": 50,
                "isLast": true,
                "values": [{"id": 7, "name": "Sprint 1"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/agile/1.0/board/2/sprint"))
            .respond_with(ResponseTemplate::new(400))
            .expect(0)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/agile/1.0/sprint/7/issue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "maxResults": 50,
                "total": 1,
                "issues": [{
                    "id": "10001",
                    "key": "ABC-1",
                    "fields": {"updated": "2024-01-02T00:00:00.000+0000"}
                }]
            })))
            .mount(&mock_server)
            .await;

        let stream = SprintIssues::new(incremental_args_for(&mock_server.uri(), &[], None));

        // When
        let records: Vec<Record> = stream
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await
            .unwrap();

        // Then
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], "7-10001");
        assert_eq!(records[0]["issueId"], "10001");
        assert_eq!(records[0]["sprintId"], "7");
    }
}
