//! 課題に紐づく GitHub プルリクエスト（実験的ストリーム）
//!
//! `Development` フィールドの要約でプルリクエストを持つと判定された課題についてのみ、
//! 開発情報 API から詳細を取得する。

use std::sync::Arc;

use async_stream::try_stream;
use futures::StreamExt;

use super::{IncrementalStreamArgs, IssueFields, Issues};
use crate::client::ApiBase;
use crate::stream::{
    Extract, IncrementalCursor, PageRequest, Record, RecordStream, Stream, StreamState, SyncMode,
    boxed, field_string, paginate, stamp,
};

/// 開発情報を保持するフィールドの名前
const DEVELOPMENT_FIELD: &str = "Development";

const OVERALL_DETAILS_MARKER: &str = "PullRequestOverallDetails{";
const OVERALL_COUNT_KEYS: [&str; 3] = ["openCount", "mergedCount", "declinedCount"];
const SUMMARY_MARKER: &str = "pullrequest={dataType=pullrequest";
const SUMMARY_COUNT_KEY: &str = "stateCount";

#[derive(Debug, Clone)]
pub struct PullRequests {
    issues: Arc<Issues>,
    issue_fields: Arc<IssueFields>,
    args: IncrementalStreamArgs,
    cursor: IncrementalCursor,
}

impl PullRequests {
    pub fn new(
        issues: Arc<Issues>,
        issue_fields: Arc<IssueFields>,
        args: IncrementalStreamArgs,
    ) -> Self {
        let cursor = IncrementalCursor::new("updated", args.start_date);
        Self {
            issues,
            issue_fields,
            args,
            cursor,
        }
    }

    /// 課題の読み込みに使う共有ストリーム
    pub fn issues_stream(&self) -> &Arc<Issues> {
        &self.issues
    }

    /// フィールド ID の解決に使う共有ストリーム
    pub fn issue_fields_stream(&self) -> &Arc<IssueFields> {
        &self.issue_fields
    }

    fn detail_request(issue_id: String) -> PageRequest {
        PageRequest::new(ApiBase::DevStatus, "issue/detail", Extract::Field("detail"))
            .param("issueId", issue_id)
            .param("applicationType", "GitHub")
            .param("dataType", "pullrequest")
            .paginate(false)
    }
}

/// `Development` フィールドの値がプルリクエストの存在を示すかどうか
pub fn has_pull_requests(development: &Record) -> bool {
    development
        .as_str()
        .is_some_and(|summary| pull_request_count(summary) > 0)
}

fn pull_request_count(summary: &str) -> u64 {
    let overall: u64 = section_after(summary, OVERALL_DETAILS_MARKER)
        .map(|section| {
            OVERALL_COUNT_KEYS
                .iter()
                .map(|key| count_value(section, key))
                .sum()
        })
        .unwrap_or(0);

    let state: u64 = section_after(summary, SUMMARY_MARKER)
        .map(|section| count_value(section, SUMMARY_COUNT_KEY))
        .unwrap_or(0);

    overall + state
}

/// マーカー直後から最初の `}` までの部分
fn section_after<'s>(text: &'s str, marker: &str) -> Option<&'s str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    Some(rest.split('}').next().unwrap_or(rest))
}

/// `key=<数値>` の数値を合計する
fn count_value(section: &str, key: &str) -> u64 {
    section
        .match_indices(key)
        .filter_map(|(index, _)| {
            let value = section[index + key.len()..].strip_prefix('=')?;
            let end = value
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(value.len());
            value[..end].parse::<u64>().ok()
        })
        .sum()
}

impl Stream for PullRequests {
    fn name(&self) -> &'static str {
        "pull_requests"
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
        tracing::debug!(stream = "pull_requests", ?sync_mode, ?since, "reading pull requests");
        boxed(try_stream! {
            let field_ids = self.issue_fields.field_ids_by_name().await?;
            let development_fields = field_ids.get(DEVELOPMENT_FIELD).cloned().unwrap_or_default();
            if development_fields.is_empty() {
                tracing::info!("no Development field found, skipping pull requests");
            }

            if !development_fields.is_empty() {
                let mut fields = development_fields.clone();
                fields.push("updated".to_string());

                let mut issues = self.issues.read_since(since, Some(fields));
                while let Some(issue) = issues.next().await {
                    let issue = issue?;
                    let linked = development_fields.iter().any(|field| {
                        issue
                            .get("fields")
                            .and_then(|fields| fields.get(field))
                            .is_some_and(has_pull_requests)
                    });
                    if !linked {
                        continue;
                    }
                    let Some(issue_id) = field_string(&issue, "id") else {
                        continue;
                    };

                    let mut details = paginate(self.args.client(), Self::detail_request(issue_id));
                    while let Some(detail) = details.next().await {
                        let mut detail = detail?;
                        stamp(&mut detail, "id", issue.get("id").cloned());
                        stamp(&mut detail, "updated", issue.get("updated").cloned());
                        if self.cursor.accepts(&detail, since) {
                            yield detail;
                        }
                    }
                }
            }
        })
    }
}
