//! ホストパイプラインへの入口（接続チェックとストリーム一覧）

use std::sync::Arc;

use futures::TryStreamExt;

use crate::auth::BasicAuthenticator;
use crate::config::{RawConfig, SourceConfig};
use crate::error::{ErrorKind, Result};
use crate::registry::StreamRegistry;
use crate::stream::{Stream, SyncMode};
use crate::streams::StreamArgs;
use crate::streams::resource::{ISSUE_RESOLUTIONS, ResourceStream};

/// 応答本文が解釈できない場合に返す固定メッセージ
pub const CONNECTION_ERROR_MESSAGE: &str = "Unable to connect to the Jira API with the provided credentials. Please make sure the input credentials and environment are correct.";

/// 接続チェックの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Succeeded,
    /// 回復可能な失敗。`kind` は `Connectivity` か `MalformedResponse`
    Failed { kind: ErrorKind, message: String },
}

impl ConnectionStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ConnectionStatus::Succeeded)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Succeeded => None,
            ConnectionStatus::Failed { message, .. } => Some(message),
        }
    }

    /// `(到達可能か, エラーメッセージ)` の組に変換
    pub fn into_tuple(self) -> (bool, Option<String>) {
        match self {
            ConnectionStatus::Succeeded => (true, None),
            ConnectionStatus::Failed { message, .. } => (false, Some(message)),
        }
    }
}

/// Jira ソースコネクタ。呼び出し間で状態を持たない
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceJira;

impl SourceJira {
    pub fn new() -> Self {
        Self
    }

    /// 課題解決状況を 1 回読み切って到達性と認証情報を確認する
    ///
    /// 接続できない場合と応答本文が解釈できない場合は `Ok(Failed)` を返し、
    /// それ以外のエラーはそのまま `Err` として返す。
    #[tracing::instrument(skip_all, fields(domain = %config.domain))]
    pub async fn check_connection(&self, config: &RawConfig) -> Result<ConnectionStatus> {
        let config = SourceConfig::validate_and_transform(config.clone())?;
        let authenticator = Arc::new(BasicAuthenticator::from_config(&config));
        let stream = ResourceStream::new(
            &ISSUE_RESOLUTIONS,
            StreamArgs::from_config(&config, authenticator)?,
        );

        let result = stream
            .read_records(SyncMode::FullRefresh, None)
            .try_for_each(|_| async { Ok(()) })
            .await;

        match result {
            Ok(()) => {
                tracing::info!("connection check succeeded");
                Ok(ConnectionStatus::Succeeded)
            }
            Err(e) => match e.kind() {
                ErrorKind::Connectivity => {
                    tracing::warn!(error = %e, "Jira is unreachable");
                    Ok(ConnectionStatus::Failed {
                        kind: ErrorKind::Connectivity,
                        message: e.to_string(),
                    })
                }
                ErrorKind::MalformedResponse => {
                    tracing::warn!(error = %e, "Jira returned a malformed response");
                    Ok(ConnectionStatus::Failed {
                        kind: ErrorKind::MalformedResponse,
                        message: CONNECTION_ERROR_MESSAGE.to_string(),
                    })
                }
                ErrorKind::Configuration | ErrorKind::Unclassified => {
                    tracing::error!(error = %e, "connection check failed");
                    Err(e)
                }
            },
        }
    }

    /// 設定から全ストリームを構築する
    pub fn streams(&self, config: &RawConfig) -> Result<StreamRegistry> {
        let config = SourceConfig::validate_and_transform(config.clone())?;
        StreamRegistry::build(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_tuple() {
        assert_eq!(ConnectionStatus::Succeeded.into_tuple(), (true, None));

        let failed = ConnectionStatus::Failed {
            kind: ErrorKind::MalformedResponse,
            message: CONNECTION_ERROR_MESSAGE.to_string(),
        };
        assert!(!failed.is_ok());
        assert_eq!(failed.error_message(), Some(CONNECTION_ERROR_MESSAGE));
        assert_eq!(
            failed.into_tuple(),
            (false, Some(CONNECTION_ERROR_MESSAGE.to_string()))
        );
    }

    #[test]
    fn test_streams_rejects_invalid_start_date() {
        let config = RawConfig::new("example.atlassian.net", "a@example.com", "t")
            .start_date("not a date");

        let result = SourceJira::new().streams(&config);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_check_connection_rejects_empty_domain() {
        let config = RawConfig::new("", "a@example.com", "t");

        let result = SourceJira::new().check_connection(&config).await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);
    }
}
