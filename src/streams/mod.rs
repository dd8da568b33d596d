//! Jira の各リソースに対応するストリーム実装

pub mod boards;
pub mod fields;
pub mod filters;
pub mod issue_children;
pub mod issues;
pub mod projects;
pub mod pull_requests;
pub mod resource;
pub mod screens;
pub mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::BasicAuthenticator;
use crate::client::JiraClient;
use crate::config::SourceConfig;
use crate::error::Result;

pub use boards::{BoardIssues, Boards, SprintIssues, Sprints};
pub use fields::{IssueCustomFieldContexts, IssueFields};
pub use filters::FilterSharing;
pub use issue_children::{
    ISSUE_COMMENTS, ISSUE_REMOTE_LINKS, ISSUE_VOTES, ISSUE_WATCHERS, ISSUE_WORKLOGS,
    IssueChildDefinition, IssueChildStream, IssueProperties,
};
pub use issues::{Issues, IssuesOptions};
pub use projects::{
    PROJECT_AVATARS, PROJECT_COMPONENTS, PROJECT_EMAIL, PROJECT_PERMISSION_SCHEMES,
    PROJECT_VERSIONS, ProjectChildDefinition, ProjectChildStream, ProjectRef, Projects,
};
pub use pull_requests::PullRequests;
pub use resource::{Avatars, ResourceDefinition, ResourceStream};
pub use screens::{ScreenTabFields, ScreenTabs};
pub use users::UsersGroupsDetailed;

/// 全ストリームが受け取る共通引数
#[derive(Debug, Clone)]
pub struct StreamArgs {
    pub client: JiraClient,
    /// 対象プロジェクトキー（空の場合は全プロジェクト）
    pub projects: Vec<String>,
}

impl StreamArgs {
    pub fn new(client: JiraClient, projects: Vec<String>) -> Self {
        Self { client, projects }
    }

    pub fn from_config(
        config: &SourceConfig,
        authenticator: Arc<BasicAuthenticator>,
    ) -> Result<Self> {
        let client = JiraClient::new(config.domain.clone(), authenticator)?;
        Ok(Self::new(client, config.projects.clone()))
    }

    pub fn with_start_date(self, start_date: Option<DateTime<Utc>>) -> IncrementalStreamArgs {
        IncrementalStreamArgs {
            args: self,
            start_date,
        }
    }
}

/// 増分ストリーム用の引数。共通引数に開始日を加える
#[derive(Debug, Clone)]
pub struct IncrementalStreamArgs {
    pub args: StreamArgs,
    /// `None` の場合は全履歴
    pub start_date: Option<DateTime<Utc>>,
}

impl IncrementalStreamArgs {
    pub fn client(&self) -> &JiraClient {
        &self.args.client
    }

    pub fn projects(&self) -> &[String] {
        &self.args.projects
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn args_for(uri: &str, projects: &[&str]) -> StreamArgs {
        let auth = Arc::new(BasicAuthenticator::new("test@example.com", "test_token"));
        let client = JiraClient::new(uri, auth).unwrap();
        StreamArgs::new(client, projects.iter().map(|p| p.to_string()).collect())
    }

    pub fn incremental_args_for(
        uri: &str,
        projects: &[&str],
        start_date: Option<DateTime<Utc>>,
    ) -> IncrementalStreamArgs {
        args_for(uri, projects).with_start_date(start_date)
    }
}
