use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// JQL で使う日時フォーマット (`yyyy/MM/dd HH:mm`)
const JQL_DATETIME_FORMAT: &str = "%Y/%m/%d %H:%M";

/// 日時文字列を`DateTime<Utc>`にパース
///
/// RFC 3339、Jira の応答形式 (`2024-01-02T03:04:05.000+0000`)、
/// `YYYY-MM-DDTHH:MM:SS`、`YYYY-MM-DD HH:MM[:SS]`、`YYYY-MM-DD` を受け付ける。
/// タイムゾーンのない値は UTC とみなす。
pub fn parse_jira_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// DateTime<Utc>をJQL用の日時文字列にフォーマット
pub fn format_jql_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(JQL_DATETIME_FORMAT).to_string()
}

/// `<field> >= 'yyyy/MM/dd HH:mm'` 形式の JQL 条件を生成
pub fn jql_since_condition(field: &str, since: &DateTime<Utc>) -> String {
    format!("{} >= '{}'", field, format_jql_datetime(since))
}
