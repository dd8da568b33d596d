//! 設定から全ストリームを構築するレジストリ

use std::sync::Arc;

use crate::auth::BasicAuthenticator;
use crate::config::SourceConfig;
use crate::error::Result;
use crate::stream::Stream;
use crate::streams::resource::{
    APPLICATION_ROLES, DASHBOARDS, FILTERS, GROUPS, ISSUE_FIELD_CONFIGURATIONS, ISSUE_LINK_TYPES,
    ISSUE_NAVIGATOR_SETTINGS, ISSUE_NOTIFICATION_SCHEMES, ISSUE_PRIORITIES, ISSUE_RESOLUTIONS,
    ISSUE_SECURITY_SCHEMES, ISSUE_TYPE_SCHEMES, ISSUE_TYPE_SCREEN_SCHEMES, JIRA_SETTINGS, LABELS,
    PERMISSION_SCHEMES, PERMISSIONS, PROJECT_CATEGORIES, PROJECT_TYPES, SCREEN_SCHEMES, SCREENS,
    TIME_TRACKING, USERS, WORKFLOW_SCHEMES, WORKFLOW_STATUS_CATEGORIES, WORKFLOW_STATUSES,
    WORKFLOWS,
};
use crate::streams::{
    Avatars, BoardIssues, Boards, FilterSharing, ISSUE_COMMENTS, ISSUE_REMOTE_LINKS, ISSUE_VOTES,
    ISSUE_WATCHERS, ISSUE_WORKLOGS, IssueChildDefinition, IssueChildStream,
    IssueCustomFieldContexts, IssueFields, IssueProperties, Issues, IssuesOptions,
    PROJECT_AVATARS, PROJECT_COMPONENTS, PROJECT_EMAIL, PROJECT_PERMISSION_SCHEMES,
    PROJECT_VERSIONS, ProjectChildDefinition, ProjectChildStream, Projects, PullRequests,
    ResourceDefinition, ResourceStream, ScreenTabFields, ScreenTabs, SprintIssues, Sprints,
    StreamArgs, UsersGroupsDetailed,
};

/// 構築済みストリームの一覧
///
/// 全ストリームは 1 つの認証情報を共有する。`issues` と `issue_fields` は
/// 実験的ストリームからも同じインスタンスが参照される。
#[derive(Debug)]
pub struct StreamRegistry {
    streams: Vec<Arc<dyn Stream>>,
    issues: Arc<Issues>,
    issue_fields: Arc<IssueFields>,
    pull_requests: Option<Arc<PullRequests>>,
}

impl StreamRegistry {
    /// 検証済み設定から全ストリームを構築する
    pub fn build(config: &SourceConfig) -> Result<Self> {
        let authenticator = Arc::new(BasicAuthenticator::from_config(config));
        let args = StreamArgs::from_config(config, authenticator)?;
        let incremental_args = args.clone().with_start_date(config.start_date);

        let issues_options = IssuesOptions::new()
            .expand_changelog(config.expand_issue_changelog)
            .render_fields(config.render_fields);
        let issues = Arc::new(Issues::new(incremental_args.clone(), issues_options));
        let issue_fields = Arc::new(IssueFields::new(args.clone()));

        let resource = |definition: &'static ResourceDefinition| -> Arc<dyn Stream> {
            Arc::new(ResourceStream::new(definition, args.clone()))
        };
        let issue_child = |definition: &'static IssueChildDefinition| -> Arc<dyn Stream> {
            Arc::new(IssueChildStream::new(definition, incremental_args.clone()))
        };
        let project_child = |definition: &'static ProjectChildDefinition| -> Arc<dyn Stream> {
            Arc::new(ProjectChildStream::new(definition, args.clone()))
        };

        let mut streams: Vec<Arc<dyn Stream>> = vec![
            resource(&APPLICATION_ROLES),
            Arc::new(Avatars::new(args.clone())),
            Arc::new(Boards::new(args.clone())),
            Arc::new(BoardIssues::new(incremental_args.clone())),
            resource(&DASHBOARDS),
            resource(&FILTERS),
            Arc::new(FilterSharing::new(args.clone())),
            resource(&GROUPS),
            issues.clone(),
            issue_child(&ISSUE_COMMENTS),
            issue_fields.clone(),
            resource(&ISSUE_FIELD_CONFIGURATIONS),
            Arc::new(IssueCustomFieldContexts::new(args.clone())),
            resource(&ISSUE_LINK_TYPES),
            resource(&ISSUE_NAVIGATOR_SETTINGS),
            resource(&ISSUE_NOTIFICATION_SCHEMES),
            resource(&ISSUE_PRIORITIES),
            Arc::new(IssueProperties::new(incremental_args.clone())),
            issue_child(&ISSUE_REMOTE_LINKS),
            resource(&ISSUE_RESOLUTIONS),
            resource(&ISSUE_SECURITY_SCHEMES),
            resource(&ISSUE_TYPE_SCHEMES),
            resource(&ISSUE_TYPE_SCREEN_SCHEMES),
            issue_child(&ISSUE_VOTES),
            issue_child(&ISSUE_WATCHERS),
            issue_child(&ISSUE_WORKLOGS),
            resource(&JIRA_SETTINGS),
            resource(&LABELS),
            resource(&PERMISSIONS),
            resource(&PERMISSION_SCHEMES),
            Arc::new(Projects::new(args.clone())),
            project_child(&PROJECT_AVATARS),
            resource(&PROJECT_CATEGORIES),
            project_child(&PROJECT_COMPONENTS),
            project_child(&PROJECT_EMAIL),
            project_child(&PROJECT_PERMISSION_SCHEMES),
            resource(&PROJECT_TYPES),
            project_child(&PROJECT_VERSIONS),
            resource(&SCREENS),
            Arc::new(ScreenTabs::new(args.clone())),
            Arc::new(ScreenTabFields::new(args.clone())),
            resource(&SCREEN_SCHEMES),
            Arc::new(Sprints::new(args.clone())),
            Arc::new(SprintIssues::new(incremental_args.clone())),
            resource(&TIME_TRACKING),
            resource(&USERS),
            Arc::new(UsersGroupsDetailed::new(args.clone())),
            resource(&WORKFLOWS),
            resource(&WORKFLOW_SCHEMES),
            resource(&WORKFLOW_STATUSES),
            resource(&WORKFLOW_STATUS_CATEGORIES),
        ];

        let pull_requests = if config.enable_experimental_streams {
            let pull_requests = Arc::new(PullRequests::new(
                issues.clone(),
                issue_fields.clone(),
                incremental_args.clone(),
            ));
            streams.push(pull_requests.clone());
            Some(pull_requests)
        } else {
            None
        };

        tracing::debug!(
            count = streams.len(),
            experimental = config.enable_experimental_streams,
            "built stream registry"
        );

        Ok(Self {
            streams,
            issues,
            issue_fields,
            pull_requests,
        })
    }

    pub fn streams(&self) -> &[Arc<dyn Stream>] {
        &self.streams
    }

    pub fn into_streams(self) -> Vec<Arc<dyn Stream>> {
        self.streams
    }

    pub fn issues(&self) -> &Arc<Issues> {
        &self.issues
    }

    pub fn issue_fields(&self) -> &Arc<IssueFields> {
        &self.issue_fields
    }

    /// 実験的ストリームが無効の場合は `None`
    pub fn pull_requests(&self) -> Option<&Arc<PullRequests>> {
        self.pull_requests.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Stream>> {
        self.streams.iter().find(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.streams.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
