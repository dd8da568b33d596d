//! レコードストリームの共通契約
//!
//! 各ストリームは 1 種類の Jira リソースを表し、同期モードと前回の状態を
//! 受け取って遅延評価される有限のレコード列を返す。

pub mod cursor;
pub mod pagination;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use cursor::IncrementalCursor;
pub use pagination::{Extract, PAGE_SIZE, PageRequest, paginate};

/// Jira から取得した 1 レコード
pub type Record = serde_json::Value;

/// ストリームの状態（`{ <cursor_field>: <最新のカーソル値> }`）
pub type StreamState = serde_json::Map<String, serde_json::Value>;

/// 遅延評価されるレコード列
pub type RecordStream<'a> = BoxStream<'a, Result<Record>>;

/// 同期モード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// 状態に関係なく全件を読み直す
    #[default]
    FullRefresh,
    /// 保存済みカーソル以降に変更されたレコードのみ読む
    Incremental,
}

impl SyncMode {
    /// このモードで参照すべき状態。フルリフレッシュでは状態を無視する
    pub fn effective_state(self, state: Option<&StreamState>) -> Option<&StreamState> {
        match self {
            SyncMode::FullRefresh => None,
            SyncMode::Incremental => state,
        }
    }
}

/// 同期対象のリソース種別ごとのストリーム
pub trait Stream: Send + Sync {
    /// ストリーム名（例: `issues`）
    fn name(&self) -> &'static str;

    fn primary_key(&self) -> Option<&'static str>;

    /// 増分同期に使うカーソルフィールド。`None` はフルリフレッシュ専用
    fn cursor_field(&self) -> Option<&'static str> {
        None
    }

    /// このストリームに適用されるプロジェクトフィルター（空の場合は全プロジェクト）
    fn projects(&self) -> &[String];

    fn supports_incremental(&self) -> bool {
        self.cursor_field().is_some()
    }

    fn read_records<'a>(
        &'a self,
        sync_mode: SyncMode,
        state: Option<&'a StreamState>,
    ) -> RecordStream<'a>;

    /// レコードを読んだ後の新しい状態を返す
    fn updated_state(&self, current: Option<StreamState>, record: &Record) -> Option<StreamState> {
        match self.cursor_field() {
            Some(field) => Some(cursor::updated_state(field, current, record)),
            None => current,
        }
    }
}

impl std::fmt::Debug for dyn Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name())
            .field("cursor_field", &self.cursor_field())
            .finish()
    }
}

/// `try_stream!` で組み立てたレコード列を `RecordStream` に変換する
pub(crate) fn boxed<'a, S>(stream: S) -> RecordStream<'a>
where
    S: futures::Stream<Item = Result<Record>> + Send + 'a,
{
    Box::pin(stream)
}

/// レコードのフィールドを文字列として取り出す（数値 ID も文字列化する）
pub(crate) fn field_string(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 親リソースの識別子などをレコードに追加する。既存の値は上書きしない
pub(crate) fn stamp(record: &mut Record, key: &str, value: Option<serde_json::Value>) {
    if let (Some(obj), Some(value)) = (record.as_object_mut(), value) {
        obj.entry(key.to_string()).or_insert(value);
    }
}
