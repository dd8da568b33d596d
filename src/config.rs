use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::time_filter::parse_jira_datetime;

/// ホストから渡される未加工のコネクタ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    /// Jira のドメイン（例: `your-domain.atlassian.net`）
    pub domain: String,
    pub email: String,
    pub api_token: String,
    /// 対象プロジェクトキー（空の場合は全プロジェクト）
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub render_fields: bool,
    #[serde(default)]
    pub expand_issue_changelog: bool,
    #[serde(default)]
    pub enable_experimental_streams: bool,
}

impl RawConfig {
    pub fn new(
        domain: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            email: email.into(),
            api_token: api_token.into(),
            projects: Vec::new(),
            start_date: None,
            render_fields: false,
            expand_issue_changelog: false,
            enable_experimental_streams: false,
        }
    }

    pub fn projects(mut self, projects: Vec<String>) -> Self {
        self.projects = projects;
        self
    }

    pub fn start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    pub fn render_fields(mut self, enabled: bool) -> Self {
        self.render_fields = enabled;
        self
    }

    pub fn expand_issue_changelog(mut self, enabled: bool) -> Self {
        self.expand_issue_changelog = enabled;
        self
    }

    pub fn enable_experimental_streams(mut self, enabled: bool) -> Self {
        self.enable_experimental_streams = enabled;
        self
    }

    /// JSON マッピングから設定を読み込む
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }

    /// JSON ファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| Error::InvalidConfiguration(format!("config file is not JSON: {}", e)))?;
        Self::from_value(&value)
    }

    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self> {
        use std::env;

        let domain = env::var("JIRA_DOMAIN").map_err(|_| {
            Error::ConfigurationMissing("JIRA_DOMAIN not found in environment".to_string())
        })?;
        let email = env::var("JIRA_EMAIL").map_err(|_| {
            Error::ConfigurationMissing("JIRA_EMAIL not found in environment".to_string())
        })?;
        let api_token = env::var("JIRA_API_TOKEN").map_err(|_| {
            Error::ConfigurationMissing("JIRA_API_TOKEN not found in environment".to_string())
        })?;

        let projects = env::var("JIRA_PROJECTS")
            .map(|v| {
                v.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let flag = |name: &str| {
            env::var(name)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false)
        };

        Ok(Self {
            domain,
            email,
            api_token,
            projects,
            start_date: env::var("JIRA_START_DATE").ok(),
            render_fields: flag("JIRA_RENDER_FIELDS"),
            expand_issue_changelog: flag("JIRA_EXPAND_ISSUE_CHANGELOG"),
            enable_experimental_streams: flag("JIRA_ENABLE_EXPERIMENTAL_STREAMS"),
        })
    }
}

/// 正規化済みのコネクタ設定
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub domain: String,
    pub email: String,
    pub api_token: String,
    pub projects: Vec<String>,
    /// `None` の場合は全履歴を同期する
    pub start_date: Option<DateTime<Utc>>,
    pub render_fields: bool,
    pub expand_issue_changelog: bool,
    pub enable_experimental_streams: bool,
}

impl SourceConfig {
    /// 未加工設定を検証し、`start_date` をタイムスタンプに変換する
    pub fn validate_and_transform(raw: RawConfig) -> Result<Self> {
        let start_date = match raw.start_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(parse_jira_datetime(s).ok_or_else(|| {
                Error::InvalidConfiguration(format!("start_date is not a valid date: {}", s))
            })?),
        };

        Ok(Self {
            domain: raw.domain,
            email: raw.email,
            api_token: raw.api_token,
            projects: raw.projects,
            start_date,
            render_fields: raw.render_fields,
            expand_issue_changelog: raw.expand_issue_changelog,
            enable_experimental_streams: raw.enable_experimental_streams,
        })
    }
}
