use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, header};
use serde_json::Value;
use url::Url;

use crate::auth::BasicAuthenticator;
use crate::error::{Error, Result};

/// Jira の REST API 系統
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiBase {
    /// `/rest/api/3/`
    Platform,
    /// `/rest/agile/1.0/`
    Agile,
    /// `/rest/dev-status/1.0/`
    DevStatus,
}

impl ApiBase {
    pub fn prefix(self) -> &'static str {
        match self {
            ApiBase::Platform => "/rest/api/3/",
            ApiBase::Agile => "/rest/agile/1.0/",
            ApiBase::DevStatus => "/rest/dev-status/1.0/",
        }
    }
}

/// ドメインと認証情報を束ねた HTTP クライアント。clone は安価で、
/// 認証情報は `Arc` で共有される
#[derive(Debug, Clone)]
pub struct JiraClient {
    client: Client,
    domain: Arc<str>,
    base_url: Arc<str>,
    authenticator: Arc<BasicAuthenticator>,
}

impl JiraClient {
    pub fn new(domain: impl Into<String>, authenticator: Arc<BasicAuthenticator>) -> Result<Self> {
        let domain = domain.into();
        let base_url = base_url_for(&domain)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(header::AUTHORIZATION, authenticator.header_value()?);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Unexpected(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            domain: domain.into(),
            base_url: base_url.into(),
            authenticator,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn authenticator(&self) -> &Arc<BasicAuthenticator> {
        &self.authenticator
    }

    pub fn url(&self, api: ApiBase, path: &str) -> String {
        format!("{}{}{}", self.base_url, api.prefix(), path.trim_start_matches('/'))
    }

    /// GET リクエストを送信し、本文を JSON として返す
    ///
    /// 空の本文や JSON 以外の本文は [`Error::JsonParsing`] になる。
    pub async fn get_json(
        &self,
        api: ApiBase,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value> {
        let url = self.url(api, path);
        tracing::debug!(%url, ?params, "GET");

        let response = self.client.get(&url).query(params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::ApiError { status, message });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn base_url_for(domain: &str) -> Result<String> {
    let domain = domain.trim().trim_end_matches('/');
    if domain.is_empty() {
        return Err(Error::InvalidConfiguration("domain is empty".to_string()));
    }

    let base_url = if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    };

    Url::parse(&base_url)
        .map_err(|_| Error::InvalidConfiguration(format!("Invalid domain: {}", domain)))?;

    Ok(base_url)
}
