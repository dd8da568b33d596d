//! Jira のオフセット型ページネーション
//!
//! 応答が `startAt` を含むオブジェクトなら `startAt + maxResults` で次ページへ進み、
//! `isLast` が真、または `total` に達した時点で終了する。配列応答は
//! ページが満杯だった場合のみ次ページを要求する。

use async_stream::try_stream;
use serde::Deserialize;
use serde_json::Value;

use super::{Record, RecordStream, boxed};
use crate::client::{ApiBase, JiraClient};

pub const PAGE_SIZE: u64 = 50;

/// 応答本文からレコードを取り出す方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extract {
    /// 本文そのもの
    Root,
    /// 指定フィールドの値
    Field(&'static str),
    /// オブジェクトの各値（配列の値は展開する）。`Some` の場合は指定フィールド配下
    ObjectValues(Option<&'static str>),
}

impl Extract {
    pub fn records(self, body: Value) -> Vec<Record> {
        let target = match self {
            Extract::Root | Extract::ObjectValues(None) => body,
            Extract::Field(field) | Extract::ObjectValues(Some(field)) => match body {
                Value::Object(mut map) => map.remove(field).unwrap_or(Value::Null),
                _ => Value::Null,
            },
        };

        match target {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            Value::Object(map) if matches!(self, Extract::ObjectValues(_)) => map
                .into_iter()
                .flat_map(|(_, value)| match value {
                    Value::Array(items) => items,
                    other => vec![other],
                })
                .collect(),
            other => vec![other],
        }
    }
}

/// ページ情報。Jira の一覧応答に含まれる
#[derive(Debug, Clone, Deserialize)]
struct PageInfo {
    #[serde(rename = "startAt")]
    start_at: Option<u64>,

    #[serde(rename = "maxResults")]
    max_results: Option<u64>,

    total: Option<u64>,

    #[serde(rename = "isLast")]
    is_last: Option<bool>,
}

/// 次ページの `startAt` を求める。`None` は最終ページ
pub fn next_start_at(body: &Value, requested_start_at: u64, page_size: u64) -> Option<u64> {
    match body {
        Value::Object(_) => {
            let info = PageInfo::deserialize(body).ok()?;
            let start_at = info.start_at?;
            let max_results = info.max_results.unwrap_or(0);
            if max_results == 0 {
                return None;
            }
            let next = start_at.checked_add(max_results)?;
            match (info.is_last, info.total) {
                (Some(true), _) => None,
                (Some(false), _) => Some(next),
                (None, Some(total)) if next >= total => None,
                _ => Some(next),
            }
        }
        Value::Array(items) if items.len() as u64 == page_size => {
            requested_start_at.checked_add(page_size)
        }
        _ => None,
    }
}

/// 1 エンドポイントへのリクエスト定義
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub api: ApiBase,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub extract: Extract,
    /// `startAt`/`maxResults` を付けて次ページを辿るかどうか
    pub paginate: bool,
}

impl PageRequest {
    pub fn new(api: ApiBase, path: impl Into<String>, extract: Extract) -> Self {
        Self {
            api,
            path: path.into(),
            params: Vec::new(),
            extract,
            paginate: true,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn params(mut self, params: &[(&str, &str)]) -> Self {
        self.params.extend(
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        self
    }

    pub fn paginate(mut self, enabled: bool) -> Self {
        self.paginate = enabled;
        self
    }
}

/// 全ページのレコードを順に返すストリームを作成
pub fn paginate<'a>(client: &'a JiraClient, request: PageRequest) -> RecordStream<'a> {
    boxed(try_stream! {
        let mut start_at = 0u64;
        loop {
            let mut params = request.params.clone();
            if request.paginate {
                params.push(("startAt".to_string(), start_at.to_string()));
                params.push(("maxResults".to_string(), PAGE_SIZE.to_string()));
            }

            let body = client.get_json(request.api, &request.path, &params).await?;
            let next = if request.paginate {
                next_start_at(&body, start_at, PAGE_SIZE)
            } else {
                None
            };

            let records = request.extract.records(body);
            let page_is_empty = records.is_empty();
            for record in records {
                yield record;
            }

            match next {
                Some(next) if !page_is_empty => start_at = next,
                _ => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_root_and_field() {
        let body = json!([{"id": "1"}, {"id": "2"}]);
        assert_eq!(Extract::Root.records(body).len(), 2);

        let body = json!({"values": [{"id": "1"}], "total": 1});
        assert_eq!(Extract::Field("values").records(body), vec![json!({"id": "1"})]);

        let body = json!({"total": 0});
        assert!(Extract::Field("values").records(body).is_empty());

        let body = json!({"id": "10000", "name": "single"});
        assert_eq!(Extract::Root.records(body.clone()), vec![body]);
    }

    #[test]
    fn test_extract_object_values() {
        let body = json!({
            "permissions": {
                "ADD_COMMENTS": {"key": "ADD_COMMENTS"},
                "BROWSE_PROJECTS": {"key": "BROWSE_PROJECTS"}
            }
        });
        let records = Extract::ObjectValues(Some("permissions")).records(body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["key"], "ADD_COMMENTS");

        let body = json!({"system": [{"id": "1"}, {"id": "2"}], "custom": [{"id": "3"}]});
        let records = Extract::ObjectValues(None).records(body);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_next_start_at_with_total() {
        let body = json!({"startAt": 0, "maxResults": 50, "total": 120, "values": []});
        assert_eq!(next_start_at(&body, 0, PAGE_SIZE), Some(50));

        let body = json!({"startAt": 100, "maxResults": 50, "total": 120, "values": []});
        assert_eq!(next_start_at(&body, 100, PAGE_SIZE), None);
    }

    #[test]
    fn test_next_start_at_with_is_last() {
        let body = json!({"startAt": 0, "maxResults": 50, "total": 500, "isLast": true});
        assert_eq!(next_start_at(&body, 0, PAGE_SIZE), None);

        let body = json!({"startAt": 0, "maxResults": 50, "isLast": false});
        assert_eq!(next_start_at(&body, 0, PAGE_SIZE), Some(50));
    }

    #[test]
    fn test_next_start_at_without_paging_info() {
        let body = json!({"issueLinkTypes": []});
        assert_eq!(next_start_at(&body, 0, PAGE_SIZE), None);

        let body = json!({"startAt": 0, "maxResults": 0, "total": 10});
        assert_eq!(next_start_at(&body, 0, PAGE_SIZE), None);
    }

    #[test]
    fn test_next_start_at_stops_on_overflow() {
        let body = json!({"startAt": u64::MAX, "maxResults": 50, "values": [{}]});
        assert_eq!(next_start_at(&body, 0, PAGE_SIZE), None);

        let full_page = Value::Array(vec![json!({}); PAGE_SIZE as usize]);
        assert_eq!(next_start_at(&full_page, u64::MAX - 1, PAGE_SIZE), None);
    }

    #[test]
    fn test_next_start_at_for_arrays() {
        let full_page = Value::Array(vec![json!({}); PAGE_SIZE as usize]);
        assert_eq!(next_start_at(&full_page, 50, PAGE_SIZE), Some(100));

        let partial_page = json!([{}, {}]);
        assert_eq!(next_start_at(&partial_page, 0, PAGE_SIZE), None);
    }
}
