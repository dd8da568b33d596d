//! 1 エンドポイントをそのまま読むだけの宣言的なストリーム

use async_stream::try_stream;
use futures::StreamExt;
use serde_json::json;

use super::StreamArgs;
use crate::client::ApiBase;
use crate::stream::{
    Extract, PageRequest, Record, RecordStream, Stream, StreamState, SyncMode, boxed, paginate,
};

/// リソースストリームの定義
#[derive(Debug)]
pub struct ResourceDefinition {
    pub name: &'static str,
    pub api: ApiBase,
    pub path: &'static str,
    pub extract: Extract,
    pub primary_key: Option<&'static str>,
    pub params: &'static [(&'static str, &'static str)],
    pub paginate: bool,
    pub transform: Option<fn(Record) -> Record>,
}

impl ResourceDefinition {
    const fn platform(name: &'static str, path: &'static str, extract: Extract) -> Self {
        Self {
            name,
            api: ApiBase::Platform,
            path,
            extract,
            primary_key: Some("id"),
            params: &[],
            paginate: true,
            transform: None,
        }
    }

    const fn primary_key(mut self, primary_key: Option<&'static str>) -> Self {
        self.primary_key = primary_key;
        self
    }

    const fn params(mut self, params: &'static [(&'static str, &'static str)]) -> Self {
        self.params = params;
        self
    }

    /// 配列を丸ごと返すエンドポイント
    const fn unpaged(mut self) -> Self {
        self.paginate = false;
        self
    }

    const fn transform(mut self, transform: fn(Record) -> Record) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.api, self.path, self.extract)
            .params(self.params)
            .paginate(self.paginate)
    }
}

pub static APPLICATION_ROLES: ResourceDefinition =
    ResourceDefinition::platform("application_roles", "applicationrole", Extract::Root)
        .primary_key(Some("key"))
        .unpaged();

pub static DASHBOARDS: ResourceDefinition =
    ResourceDefinition::platform("dashboards", "dashboard", Extract::Field("dashboards"));

pub static FILTERS: ResourceDefinition =
    ResourceDefinition::platform("filters", "filter/search", Extract::Field("values")).params(&[(
        "expand",
        "description,owner,jql,viewUrl,searchUrl,favourite,favouritedCount,sharePermissions,isWritable,subscriptions",
    )]);

pub static GROUPS: ResourceDefinition =
    ResourceDefinition::platform("groups", "group/bulk", Extract::Field("values"))
        .primary_key(Some("groupId"));

pub static ISSUE_FIELD_CONFIGURATIONS: ResourceDefinition = ResourceDefinition::platform(
    "issue_field_configurations",
    "fieldconfiguration",
    Extract::Field("values"),
);

pub static ISSUE_LINK_TYPES: ResourceDefinition = ResourceDefinition::platform(
    "issue_link_types",
    "issueLinkType",
    Extract::Field("issueLinkTypes"),
)
.unpaged();

pub static ISSUE_NAVIGATOR_SETTINGS: ResourceDefinition =
    ResourceDefinition::platform("issue_navigator_settings", "settings/columns", Extract::Root)
        .primary_key(None)
        .unpaged();

pub static ISSUE_NOTIFICATION_SCHEMES: ResourceDefinition = ResourceDefinition::platform(
    "issue_notification_schemes",
    "notificationscheme",
    Extract::Field("values"),
);

pub static ISSUE_PRIORITIES: ResourceDefinition =
    ResourceDefinition::platform("issue_priorities", "priority/search", Extract::Field("values"));

pub static ISSUE_RESOLUTIONS: ResourceDefinition = ResourceDefinition::platform(
    "issue_resolutions",
    "resolution/search",
    Extract::Field("values"),
);

pub static ISSUE_SECURITY_SCHEMES: ResourceDefinition = ResourceDefinition::platform(
    "issue_security_schemes",
    "issuesecurityschemes",
    Extract::Field("issueSecuritySchemes"),
)
.unpaged();

pub static ISSUE_TYPE_SCHEMES: ResourceDefinition = ResourceDefinition::platform(
    "issue_type_schemes",
    "issuetypescheme",
    Extract::Field("values"),
);

pub static ISSUE_TYPE_SCREEN_SCHEMES: ResourceDefinition = ResourceDefinition::platform(
    "issue_type_screen_schemes",
    "issuetypescreenscheme",
    Extract::Field("values"),
);

pub static JIRA_SETTINGS: ResourceDefinition =
    ResourceDefinition::platform("jira_settings", "application-properties", Extract::Root)
        .unpaged();

pub static LABELS: ResourceDefinition =
    ResourceDefinition::platform("labels", "label", Extract::Field("values"))
        .primary_key(Some("label"))
        .transform(label_record);

pub static PERMISSIONS: ResourceDefinition = ResourceDefinition::platform(
    "permissions",
    "permissions",
    Extract::ObjectValues(Some("permissions")),
)
.primary_key(Some("key"))
.unpaged();

pub static PERMISSION_SCHEMES: ResourceDefinition = ResourceDefinition::platform(
    "permission_schemes",
    "permissionscheme",
    Extract::Field("permissionSchemes"),
)
.unpaged();

pub static PROJECT_CATEGORIES: ResourceDefinition =
    ResourceDefinition::platform("project_categories", "projectCategory", Extract::Root).unpaged();

pub static PROJECT_TYPES: ResourceDefinition =
    ResourceDefinition::platform("project_types", "project/type", Extract::Root)
        .primary_key(Some("key"))
        .unpaged();

pub static SCREENS: ResourceDefinition =
    ResourceDefinition::platform("screens", "screens", Extract::Field("values"));

pub static SCREEN_SCHEMES: ResourceDefinition =
    ResourceDefinition::platform("screen_schemes", "screenscheme", Extract::Field("values"));

pub static TIME_TRACKING: ResourceDefinition = ResourceDefinition::platform(
    "time_tracking",
    "configuration/timetracking/list",
    Extract::Root,
)
.primary_key(Some("key"))
.unpaged();

/// 配列応答だが `startAt`/`maxResults` でページングされる
pub static USERS: ResourceDefinition =
    ResourceDefinition::platform("users", "users/search", Extract::Root)
        .primary_key(Some("accountId"));

pub static WORKFLOWS: ResourceDefinition =
    ResourceDefinition::platform("workflows", "workflow/search", Extract::Field("values"));

pub static WORKFLOW_SCHEMES: ResourceDefinition =
    ResourceDefinition::platform("workflow_schemes", "workflowscheme", Extract::Field("values"));

pub static WORKFLOW_STATUSES: ResourceDefinition =
    ResourceDefinition::platform("workflow_statuses", "status", Extract::Root).unpaged();

pub static WORKFLOW_STATUS_CATEGORIES: ResourceDefinition =
    ResourceDefinition::platform("workflow_status_categories", "statuscategory", Extract::Root)
        .unpaged();

/// ラベルは文字列で返るため `{"label": ...}` に包む
fn label_record(record: Record) -> Record {
    match record {
        Record::String(label) => json!({ "label": label }),
        other => other,
    }
}

/// 定義に従って 1 エンドポイントを読むストリーム
#[derive(Debug, Clone)]
pub struct ResourceStream {
    definition: &'static ResourceDefinition,
    args: StreamArgs,
}

impl ResourceStream {
    pub fn new(definition: &'static ResourceDefinition, args: StreamArgs) -> Self {
        Self { definition, args }
    }

    pub fn definition(&self) -> &'static ResourceDefinition {
        self.definition
    }
}

impl Stream for ResourceStream {
    fn name(&self) -> &'static str {
        self.definition.name
    }

    fn primary_key(&self) -> Option<&'static str> {
        self.definition.primary_key
    }

    fn projects(&self) -> &[String] {
        &self.args.projects
    }

    fn read_records<'a>(
        &'a self,
        _sync_mode: SyncMode,
        _state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        let records = paginate(&self.args.client, self.definition.request());
        match self.definition.transform {
            Some(transform) => records.map(move |record| record.map(transform)).boxed(),
            None => records,
        }
    }
}

const AVATAR_TYPES: [&str; 3] = ["issuetype", "project", "user"];

/// システムアバター（課題タイプ・プロジェクト・ユーザー）
#[derive(Debug, Clone)]
pub struct Avatars {
    args: StreamArgs,
}

impl Avatars {
    pub fn new(args: StreamArgs) -> Self {
        Self { args }
    }
}

impl Stream for Avatars {
    fn name(&self) -> &'static str {
        "avatars"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("id")
    }

    fn projects(&self) -> &[String] {
        &self.args.projects
    }

    fn read_records<'a>(
        &'a self,
        _sync_mode: SyncMode,
        _state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        boxed(try_stream! {
            for avatar_type in AVATAR_TYPES {
                let request = PageRequest::new(
                    ApiBase::Platform,
                    format!("avatar/{}/system", avatar_type),
                    Extract::Field("system"),
                )
                .paginate(false);

                let mut records = paginate(&self.args.client, request);
                while let Some(record) = records.next().await {
                    yield record?;
                }
            }
        })
    }
}
