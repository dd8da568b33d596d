//! ストリームを順に読み出してシンクへ書き込む同期ドライバー

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use crate::error::Result;
use crate::stream::{Record, Stream, StreamState, SyncMode};

/// 同期サービスの設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 要求する同期モード。増分非対応のストリームはフルリフレッシュになる
    pub sync_mode: SyncMode,
    /// 同期対象のストリーム名（空の場合は全ストリーム）
    pub selected_streams: Vec<String>,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn selected_streams(mut self, streams: Vec<String>) -> Self {
        self.selected_streams = streams;
        self
    }

    fn is_selected(&self, name: &str) -> bool {
        self.selected_streams.is_empty() || self.selected_streams.iter().any(|s| s == name)
    }
}

/// 同期処理の結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// ストリーム別統計
    pub stream_stats: HashMap<String, StreamSyncStats>,
    /// 同期後の状態（増分ストリームのみ）
    pub state: HashMap<String, StreamState>,
    pub error_count: usize,
    pub error_messages: Vec<String>,
    pub is_success: bool,
}

impl SyncResult {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            stream_stats: HashMap::new(),
            state: HashMap::new(),
            error_count: 0,
            error_messages: Vec::new(),
            is_success: false,
        }
    }

    /// 同期終了を記録
    pub fn finish(&mut self) {
        self.end_time = Utc::now();
        self.is_success = self.error_count == 0;
    }

    pub fn add_error(&mut self, message: String) {
        self.error_count += 1;
        self.error_messages.push(message);
    }

    /// 同期処理時間（秒）
    pub fn duration_seconds(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    pub fn total_records(&self) -> usize {
        self.stream_stats.values().map(|s| s.record_count).sum()
    }
}

impl Default for SyncResult {
    fn default() -> Self {
        Self::new()
    }
}

/// ストリーム別の同期統計
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSyncStats {
    pub stream_name: String,
    pub sync_mode: SyncMode,
    pub record_count: usize,
    pub error_count: usize,
    pub last_sync_time: DateTime<Utc>,
}

impl StreamSyncStats {
    pub fn new(stream_name: String, sync_mode: SyncMode) -> Self {
        Self {
            stream_name,
            sync_mode,
            record_count: 0,
            error_count: 0,
            last_sync_time: Utc::now(),
        }
    }
}

/// 直前の同期処理の結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum SyncState {
    /// まだ一度も完了していない
    #[default]
    Idle,
    Completed,
    Error(String),
}

impl SyncState {
    pub fn is_error(&self) -> bool {
        matches!(self, SyncState::Error(_))
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SyncState::Completed)
    }
}

/// 読み出したレコードの書き込み先
pub trait RecordSink {
    fn emit(&mut self, stream: &str, record: &Record) -> Result<()>;
}

/// メモリ上に `(ストリーム名, レコード)` を溜める
impl RecordSink for Vec<(String, Record)> {
    fn emit(&mut self, stream: &str, record: &Record) -> Result<()> {
        self.push((stream.to_string(), record.clone()));
        Ok(())
    }
}

/// `{"stream": ..., "data": ...}` を 1 行ずつ書き出す
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn emit(&mut self, stream: &str, record: &Record) -> Result<()> {
        let line = serde_json::json!({ "stream": stream, "data": record });
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

/// 同期サービス
pub struct SyncService {
    config: SyncConfig,
    current_state: SyncState,
    /// ストリーム名ごとの増分状態
    state: HashMap<String, StreamState>,
}

impl SyncService {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            current_state: SyncState::Idle,
            state: HashMap::new(),
        }
    }

    /// 前回の同期で保存した状態から再開する
    pub fn with_state(mut self, state: HashMap<String, StreamState>) -> Self {
        self.state = state;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn current_state(&self) -> &SyncState {
        &self.current_state
    }

    pub fn state(&self) -> &HashMap<String, StreamState> {
        &self.state
    }

    fn mode_for(&self, stream: &dyn Stream) -> SyncMode {
        match self.config.sync_mode {
            SyncMode::Incremental if stream.supports_incremental() => SyncMode::Incremental,
            _ => SyncMode::FullRefresh,
        }
    }

    /// ストリームを 1 つずつ最後まで読み、シンクへ書き込む
    ///
    /// あるストリームでエラーが発生しても結果に記録して次のストリームへ進む。
    /// 増分状態は最後まで読み切ったストリームについてのみ更新する。
    #[tracing::instrument(skip_all, fields(streams = streams.len()))]
    pub async fn run(
        &mut self,
        streams: &[Arc<dyn Stream>],
        sink: &mut dyn RecordSink,
    ) -> Result<SyncResult> {
        let mut result = SyncResult::new();

        for stream in streams.iter().filter(|s| self.config.is_selected(s.name())) {
            let name = stream.name();
            let mode = self.mode_for(stream.as_ref());
            let mut stats = StreamSyncStats::new(name.to_string(), mode);
            tracing::info!(stream = name, ?mode, "syncing stream");

            let current = self.state.get(name).cloned();
            let mut new_state = current.clone();
            let mut completed = true;

            let mut records = stream.read_records(mode, current.as_ref());
            while let Some(record) = records.next().await {
                let emitted = match record {
                    Ok(record) => sink.emit(name, &record).map(|()| record),
                    Err(e) => Err(e),
                };
                match emitted {
                    Ok(record) => {
                        stats.record_count += 1;
                        if mode == SyncMode::Incremental {
                            new_state = stream.updated_state(new_state, &record);
                        }
                    }
                    Err(e) => {
                        tracing::error!(stream = name, error = %e, "stream failed");
                        stats.error_count += 1;
                        result.add_error(format!("{}: {}", name, e));
                        completed = false;
                        break;
                    }
                }
            }
            drop(records);

            // 途中で失敗した場合、レコードはカーソル順とは限らないため前回の状態を残す
            match (mode, new_state) {
                (SyncMode::Incremental, Some(new_state)) if completed => {
                    self.state.insert(name.to_string(), new_state);
                }
                (SyncMode::Incremental, _) if !completed => {
                    tracing::warn!(stream = name, "keeping previous state after failure");
                }
                _ => {}
            }

            tracing::info!(stream = name, records = stats.record_count, "stream finished");
            stats.last_sync_time = Utc::now();
            result.stream_stats.insert(name.to_string(), stats);
        }

        result.state = self.state.clone();
        result.finish();

        self.current_state = if result.is_success {
            SyncState::Completed
        } else {
            SyncState::Error(format!("{} stream(s) failed", result.error_count))
        };

        Ok(result)
    }
}
