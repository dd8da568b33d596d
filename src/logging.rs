//! `tracing` によるログ出力の初期化
//!
//! 標準出力はレコード出力に使うため、ログは標準エラー出力へ書き出す。

use serde::{Deserialize, Serialize};
use std::io;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::error::{Error, Result};

/// ログレベル
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// ログ出力形式
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

/// ログ設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// `EnvFilter` 形式のフィルター。指定時は `level` より優先する
    pub filter: Option<String>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// フィルター文字列。このクレートは `level`、HTTP 関連の依存は warn
    pub fn filter_directives(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => format!(
                "{}={},hyper=warn,reqwest=warn",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                self.level.as_str()
            ),
        }
    }
}

fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    // RUST_LOG が設定されていればそちらを使う
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.filter_directives())
        .map_err(|e| Error::InvalidConfiguration(format!("Invalid log filter: {}", e)))
}

/// グローバルな subscriber を登録する。2 回目以降の呼び出しはエラー
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Console => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| Error::Unexpected(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        let config = LogConfig::new().level(LogLevel::Debug);
        assert_eq!(
            config.filter_directives(),
            "source_jira=debug,hyper=warn,reqwest=warn"
        );

        let config = LogConfig::new().filter("trace");
        assert_eq!(config.filter_directives(), "trace");
    }

    #[test]
    fn test_log_config_deserialize() {
        let config: LogConfig =
            serde_json::from_str(r#"{"level": "warn", "format": "json"}"#).unwrap();

        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.filter.is_none());
    }
}
