//! 増分同期のカーソル管理

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Record, StreamState};
use crate::time_filter::parse_jira_datetime;

/// 増分ストリームのカーソル設定
#[derive(Debug, Clone, PartialEq)]
pub struct IncrementalCursor {
    field: &'static str,
    start_date: Option<DateTime<Utc>>,
}

impl IncrementalCursor {
    pub fn new(field: &'static str, start_date: Option<DateTime<Utc>>) -> Self {
        Self { field, start_date }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    /// 状態に保存されたカーソル値
    pub fn state_value(&self, state: Option<&StreamState>) -> Option<DateTime<Utc>> {
        state?
            .get(self.field)
            .and_then(Value::as_str)
            .and_then(parse_jira_datetime)
    }

    /// 読み込み開始時点。状態のカーソル値と開始日のうち遅い方
    pub fn starting_point(&self, state: Option<&StreamState>) -> Option<DateTime<Utc>> {
        match (self.state_value(state), self.start_date) {
            (Some(state_value), Some(start_date)) => Some(state_value.max(start_date)),
            (state_value, start_date) => state_value.or(start_date),
        }
    }

    /// レコードのカーソル値が開始時点以降かどうか。カーソル値を持たないレコードは通す
    pub fn accepts(&self, record: &Record, starting_point: Option<DateTime<Utc>>) -> bool {
        let Some(starting_point) = starting_point else {
            return true;
        };
        match record.get(self.field).and_then(Value::as_str).and_then(parse_jira_datetime) {
            Some(value) => value >= starting_point,
            None => true,
        }
    }
}

/// 現在の状態とレコードのカーソル値のうち新しい方を状態として返す
pub fn updated_state(field: &str, current: Option<StreamState>, record: &Record) -> StreamState {
    let mut state = current.unwrap_or_default();

    let Some(latest) = record.get(field).and_then(Value::as_str) else {
        return state;
    };

    let keep_current = state
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|current| match (parse_jira_datetime(current), parse_jira_datetime(latest)) {
            (Some(current), Some(latest)) => current >= latest,
            _ => current >= latest,
        });

    if !keep_current {
        state.insert(field.to_string(), Value::String(latest.to_string()));
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn state(value: &str) -> StreamState {
        let mut state = StreamState::new();
        state.insert("updated".to_string(), json!(value));
        state
    }

    #[test]
    fn test_starting_point_prefers_later_value() {
        let start_date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cursor = IncrementalCursor::new("updated", Some(start_date));

        // 開始日のみ
        assert_eq!(cursor.starting_point(None), Some(start_date));

        // 状態の方が新しい
        let newer = state("2024-03-01T12:00:00.000+0000");
        assert_eq!(
            cursor.starting_point(Some(&newer)),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );

        // 状態の方が古い
        let older = state("2023-06-01T00:00:00.000+0000");
        assert_eq!(cursor.starting_point(Some(&older)), Some(start_date));
    }

    #[test]
    fn test_starting_point_without_start_date() {
        let cursor = IncrementalCursor::new("updated", None);

        assert_eq!(cursor.starting_point(None), None);
        assert_eq!(cursor.starting_point(Some(&StreamState::new())), None);
        assert!(cursor.starting_point(Some(&state("2024-03-01"))).is_some());
    }

    #[test]
    fn test_accepts() {
        let cursor = IncrementalCursor::new("updated", None);
        let point = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());

        assert!(cursor.accepts(&json!({"updated": "2024-02-01T00:00:00.000+0000"}), point));
        assert!(!cursor.accepts(&json!({"updated": "2024-01-31T23:59:00.000+0000"}), point));
        assert!(cursor.accepts(&json!({"id": "1"}), point));
        assert!(cursor.accepts(&json!({"updated": "2020-01-01"}), None));
    }

    #[test]
    fn test_updated_state_keeps_maximum() {
        let first = updated_state("updated", None, &json!({"updated": "2024-01-02T00:00:00.000+0000"}));
        assert_eq!(first["updated"], "2024-01-02T00:00:00.000+0000");

        let older = updated_state(
            "updated",
            Some(first.clone()),
            &json!({"updated": "2024-01-01T00:00:00.000+0000"}),
        );
        assert_eq!(older["updated"], "2024-01-02T00:00:00.000+0000");

        let newer = updated_state(
            "updated",
            Some(first),
            &json!({"updated": "2024-01-03T09:00:00.000+0900"}),
        );
        assert_eq!(newer["updated"], "2024-01-03T09:00:00.000+0900");
    }

    #[test]
    fn test_updated_state_without_cursor_value() {
        let current = state("2024-01-02T00:00:00.000+0000");

        let next = updated_state("updated", Some(current.clone()), &json!({"id": "1"}));

        assert_eq!(next, current);
    }
}
