use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// エラーの分類。接続チェックはこの分類で回復可能かどうかを判定する
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 接続先に到達できない
    Connectivity,
    /// レスポンス本文が JSON として解釈できない
    MalformedResponse,
    /// 設定値の欠落・不正
    Configuration,
    /// 上記以外
    Unclassified,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RequestFailed(e) if e.is_connect() => ErrorKind::Connectivity,
            Error::RequestFailed(e) if e.is_decode() => ErrorKind::MalformedResponse,
            Error::JsonParsing(_) => ErrorKind::MalformedResponse,
            Error::InvalidConfiguration(_) | Error::ConfigurationMissing(_) => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::Unclassified,
        }
    }

    /// HTTP ステータスエラーの場合はそのステータスを返す
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ApiError { status, .. } => Some(*status),
            Error::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        let json_err = serde_json::from_str::<serde_json::Value>("").unwrap_err();
        assert_eq!(Error::from(json_err).kind(), ErrorKind::MalformedResponse);

        assert_eq!(
            Error::InvalidConfiguration("bad start_date".to_string()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::ConfigurationMissing("domain".to_string()).kind(),
            ErrorKind::Configuration
        );

        let api_err = Error::ApiError {
            status: 401,
            message: "Unauthorized".to_string(),
        };
        assert_eq!(api_err.kind(), ErrorKind::Unclassified);
        assert_eq!(api_err.status(), Some(401));
    }

    #[test]
    fn test_error_display() {
        let err = Error::ApiError {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not Found");
    }
}
