use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::StreamExt;

use super::IncrementalStreamArgs;
use crate::client::ApiBase;
use crate::stream::{
    Extract, IncrementalCursor, PageRequest, Record, RecordStream, Stream, StreamState, SyncMode,
    boxed, paginate, stamp,
};
use crate::time_filter::jql_since_condition;

/// 課題ストリームのオプション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuesOptions {
    /// 変更履歴を展開する（`expand=changelog`）
    pub expand_changelog: bool,
    /// レンダリング済みフィールドを含める（`expand=renderedFields`）
    pub render_fields: bool,
    /// 取得するフィールド。`None` の場合は全フィールド
    pub fields: Option<Vec<String>>,
}

impl IssuesOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expand_changelog(mut self, enabled: bool) -> Self {
        self.expand_changelog = enabled;
        self
    }

    pub fn render_fields(mut self, enabled: bool) -> Self {
        self.render_fields = enabled;
        self
    }

    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// 親ストリームとして使う場合に取得するフィールド
const PARENT_FIELDS: [&str; 4] = ["key", "created", "updated", "project"];

/// JQL 検索による課題ストリーム
#[derive(Debug, Clone)]
pub struct Issues {
    args: IncrementalStreamArgs,
    options: IssuesOptions,
    cursor: IncrementalCursor,
}

impl Issues {
    pub fn new(args: IncrementalStreamArgs, options: IssuesOptions) -> Self {
        let cursor = IncrementalCursor::new("updated", args.start_date);
        Self {
            args,
            options,
            cursor,
        }
    }

    /// 子ストリームが課題キーを列挙するための軽量な課題ストリーム
    pub fn parent(args: IncrementalStreamArgs) -> Self {
        let fields = PARENT_FIELDS.iter().map(|f| f.to_string()).collect();
        Self::new(args, IssuesOptions::new().fields(fields))
    }

    pub fn options(&self) -> &IssuesOptions {
        &self.options
    }

    pub fn cursor(&self) -> &IncrementalCursor {
        &self.cursor
    }

    /// 検索 JQL を組み立てる
    pub fn jql(&self, since: Option<DateTime<Utc>>) -> String {
        let mut clauses = Vec::new();

        let projects = self.args.projects();
        if !projects.is_empty() {
            let keys = projects
                .iter()
                .map(|p| quote_jql(p))
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!("project in ({})", keys));
        }

        if let Some(since) = since {
            clauses.push(jql_since_condition(self.cursor.field(), &since));
        }

        let order = format!("ORDER BY {} asc", self.cursor.field());
        if clauses.is_empty() {
            order
        } else {
            format!("{} {}", clauses.join(" AND "), order)
        }
    }

    fn request(&self, since: Option<DateTime<Utc>>, fields: Option<&[String]>) -> PageRequest {
        let fields = fields
            .or(self.options.fields.as_deref())
            .map(|f| f.join(","))
            .unwrap_or_else(|| "*all".to_string());

        let mut request = PageRequest::new(ApiBase::Platform, "search", Extract::Field("issues"))
            .param("jql", self.jql(since))
            .param("fields", fields);

        let mut expand = Vec::new();
        if self.options.render_fields {
            expand.push("renderedFields");
        }
        if self.options.expand_changelog {
            expand.push("changelog");
        }
        if !expand.is_empty() {
            request = request.param("expand", expand.join(","));
        }
        request
    }

    /// 指定時点以降に更新された課題を読む
    ///
    /// `fields` を指定すると、この呼び出しに限り取得フィールドを上書きする。
    pub fn read_since<'a>(
        &'a self,
        since: Option<DateTime<Utc>>,
        fields: Option<Vec<String>>,
    ) -> RecordStream<'a> {
        let request = self.request(since, fields.as_deref());
        boxed(try_stream! {
            let mut pages = paginate(self.args.client(), request);
            while let Some(record) = pages.next().await {
                let record = transform_issue(record?);
                if self.cursor.accepts(&record, since) {
                    yield record;
                }
            }
        })
    }
}

/// JQL の文字列リテラルとして引用する
fn quote_jql(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// 課題のプロジェクト・作成日時・更新日時をトップレベルに持ち上げる
fn transform_issue(mut record: Record) -> Record {
    let project_id = record.pointer("/fields/project/id").cloned();
    let project_key = record.pointer("/fields/project/key").cloned();
    let created = record.pointer("/fields/created").cloned();
    let updated = record.pointer("/fields/updated").cloned();

    stamp(&mut record, "projectId", project_id);
    stamp(&mut record, "projectKey", project_key);
    stamp(&mut record, "created", created);
    stamp(&mut record, "updated", updated);
    record
}

impl Stream for Issues {
    fn name(&self) -> &'static str {
        "issues"
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
        tracing::debug!(stream = "issues", ?sync_mode, ?since, "reading issues");
        self.read_since(since, None)
    }
}
