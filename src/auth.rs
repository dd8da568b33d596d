use base64::Engine;
use reqwest::header::HeaderValue;

use crate::config::SourceConfig;
use crate::error::{Error, Result};

/// Basic 認証の資格情報。全ストリームで `Arc` 共有され、構築後は変更されない
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuthenticator {
    email: String,
    api_token: String,
}

impl BasicAuthenticator {
    pub fn new(email: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            api_token: api_token.into(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.email.clone(), config.api_token.clone())
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// `Authorization` ヘッダーの値を生成
    pub fn header_value(&self) -> Result<HeaderValue> {
        let auth_value = format!("{}:{}", self.email, self.api_token);
        let encoded = base64::engine::general_purpose::STANDARD.encode(auth_value.as_bytes());
        let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))
            .map_err(|_| Error::InvalidConfiguration("Invalid auth header".to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl std::fmt::Debug for BasicAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthenticator")
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}
