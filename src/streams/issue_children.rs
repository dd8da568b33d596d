//! 課題ごとに取得する子リソース（コメント・作業ログ・ウォッチャーなど）
//!
//! 親となる課題は子ストリーム自身の状態と開始日で増分的に読み込む。

use async_stream::try_stream;
use futures::StreamExt;

use super::{IncrementalStreamArgs, Issues};
use crate::client::ApiBase;
use crate::stream::{
    Extract, IncrementalCursor, PageRequest, Record, RecordStream, Stream, StreamState, SyncMode,
    boxed, field_string, paginate, stamp,
};

/// 課題子ストリームの定義
#[derive(Debug)]
pub struct IssueChildDefinition {
    pub name: &'static str,
    /// `issue/{key}/` に続くパス
    pub resource: &'static str,
    pub extract: Extract,
    pub primary_key: Option<&'static str>,
    pub cursor_field: &'static str,
    pub params: &'static [(&'static str, &'static str)],
    pub paginate: bool,
}

pub static ISSUE_COMMENTS: IssueChildDefinition = IssueChildDefinition {
    name: "issue_comments",
    resource: "comment",
    extract: Extract::Field("comments"),
    primary_key: Some("id"),
    cursor_field: "updated",
    params: &[("expand", "renderedBody")],
    paginate: true,
};

pub static ISSUE_WORKLOGS: IssueChildDefinition = IssueChildDefinition {
    name: "issue_worklogs",
    resource: "worklog",
    extract: Extract::Field("worklogs"),
    primary_key: Some("id"),
    cursor_field: "updated",
    params: &[],
    paginate: true,
};

pub static ISSUE_REMOTE_LINKS: IssueChildDefinition = IssueChildDefinition {
    name: "issue_remote_links",
    resource: "remotelink",
    extract: Extract::Root,
    primary_key: Some("id"),
    cursor_field: "issueUpdated",
    params: &[],
    paginate: false,
};

pub static ISSUE_VOTES: IssueChildDefinition = IssueChildDefinition {
    name: "issue_votes",
    resource: "votes",
    extract: Extract::Field("voters"),
    primary_key: None,
    cursor_field: "issueUpdated",
    params: &[],
    paginate: false,
};

pub static ISSUE_WATCHERS: IssueChildDefinition = IssueChildDefinition {
    name: "issue_watchers",
    resource: "watchers",
    extract: Extract::Field("watchers"),
    primary_key: None,
    cursor_field: "issueUpdated",
    params: &[],
    paginate: false,
};

/// 子レコードに親課題の ID と更新日時を記録する
fn stamp_issue(record: &mut Record, issue: &Record) {
    stamp(record, "issueId", issue.get("id").cloned());
    stamp(record, "issueUpdated", issue.get("updated").cloned());
}

/// 課題ごとに 1 エンドポイントを読む子ストリーム
#[derive(Debug, Clone)]
pub struct IssueChildStream {
    definition: &'static IssueChildDefinition,
    args: IncrementalStreamArgs,
    issues: Issues,
    cursor: IncrementalCursor,
}

impl IssueChildStream {
    pub fn new(definition: &'static IssueChildDefinition, args: IncrementalStreamArgs) -> Self {
        let cursor = IncrementalCursor::new(definition.cursor_field, args.start_date);
        Self {
            definition,
            issues: Issues::parent(args.clone()),
            args,
            cursor,
        }
    }

    pub fn definition(&self) -> &'static IssueChildDefinition {
        self.definition
    }

    fn request(&self, issue_key: &str) -> PageRequest {
        PageRequest::new(
            ApiBase::Platform,
            format!("issue/{}/{}", issue_key, self.definition.resource),
            self.definition.extract,
        )
        .params(self.definition.params)
        .paginate(self.definition.paginate)
    }
}

impl Stream for IssueChildStream {
    fn name(&self) -> &'static str {
        self.definition.name
    }

    fn primary_key(&self) -> Option<&'static str> {
        self.definition.primary_key
    }

    fn cursor_field(&self) -> Option<&'static str> {
        Some(self.definition.cursor_field)
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
            let mut issues = self.issues.read_since(since, None);
            while let Some(issue) = issues.next().await {
                let issue = issue?;
                let Some(key) = field_string(&issue, "key") else {
                    continue;
                };

                let mut records = paginate(self.args.client(), self.request(&key));
                while let Some(record) = records.next().await {
                    let mut record = record?;
                    stamp_issue(&mut record, &issue);
                    if self.cursor.accepts(&record, since) {
                        yield record;
                    }
                }
            }
        })
    }
}

/// 課題プロパティ。キー一覧を取得した後、各プロパティを個別に読む
#[derive(Debug, Clone)]
pub struct IssueProperties {
    args: IncrementalStreamArgs,
    issues: Issues,
    cursor: IncrementalCursor,
}

impl IssueProperties {
    pub fn new(args: IncrementalStreamArgs) -> Self {
        let cursor = IncrementalCursor::new("issueUpdated", args.start_date);
        Self {
            issues: Issues::parent(args.clone()),
            args,
            cursor,
        }
    }
}

impl Stream for IssueProperties {
    fn name(&self) -> &'static str {
        "issue_properties"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("key")
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
            let mut issues = self.issues.read_since(since, None);
            while let Some(issue) = issues.next().await {
                let issue = issue?;
                let Some(issue_key) = field_string(&issue, "key") else {
                    continue;
                };

                let keys = PageRequest::new(
                    ApiBase::Platform,
                    format!("issue/{}/properties", issue_key),
                    Extract::Field("keys"),
                )
                .paginate(false);

                let mut property_keys = paginate(self.args.client(), keys);
                while let Some(property_key) = property_keys.next().await {
                    let property_key = property_key?;
                    let Some(property_key) = field_string(&property_key, "key") else {
                        continue;
                    };

                    let path = format!(
                        "issue/{}/properties/{}",
                        issue_key,
                        urlencoding::encode(&property_key)
                    );
                    let body = self.args.client().get_json(ApiBase::Platform, &path, &[]).await?;
                    for mut record in Extract::Root.records(body) {
                        stamp_issue(&mut record, &issue);
                        yield record;
                    }
                }
            }
        })
    }
}
