use async_stream::try_stream;
use futures::StreamExt;

use super::StreamArgs;
use super::resource::{ResourceStream, USERS};
use crate::client::ApiBase;
use crate::stream::{
    Extract, PageRequest, RecordStream, Stream, StreamState, SyncMode, boxed, field_string,
    paginate,
};

/// ユーザーごとの詳細（所属グループとアプリケーションロールを含む）
#[derive(Debug, Clone)]
pub struct UsersGroupsDetailed {
    args: StreamArgs,
    users: ResourceStream,
}

impl UsersGroupsDetailed {
    pub fn new(args: StreamArgs) -> Self {
        Self {
            users: ResourceStream::new(&USERS, args.clone()),
            args,
        }
    }
}

impl Stream for UsersGroupsDetailed {
    fn name(&self) -> &'static str {
        "users_groups_detailed"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("accountId")
    }

    fn projects(&self) -> &[String] {
        &self.args.projects
    }

    fn read_records<'a>(
        &'a self,
        sync_mode: SyncMode,
        state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        boxed(try_stream! {
            let mut users = self.users.read_records(sync_mode, state);
            while let Some(user) = users.next().await {
                let user = user?;
                let Some(account_id) = field_string(&user, "accountId") else {
                    continue;
                };

                let request = PageRequest::new(ApiBase::Platform, "user", Extract::Root)
                    .param("accountId", account_id)
                    .param("expand", "groups,applicationRoles")
                    .paginate(false);

                let mut details = paginate(&self.args.client, request);
                while let Some(detail) = details.next().await {
                    yield detail?;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Record;
    use crate::streams::test_support::args_for;
    use futures::TryStreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_user_details_per_account() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/users/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"accountId": "a1", "displayName": "Taro"},
                {"accountId": "a2", "displayName": "Hanako"}
            ])))
            .mount(&mock_server)
            .await;

        for account_id in ["a1", "a2"] {
            Mock::given(method("GET"))
                .and(path("/rest/api/3/user"))
                .and(query_param("accountId", account_id))
                .and(query_param("expand", "groups,applicationRoles"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "accountId": account_id,
                    "groups": {"size": 1, "items": [{"name": "jira-users"}]}
                })))
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let stream = UsersGroupsDetailed::new(args_for(&mock_server.uri(), &[]));

        let records: Vec<Record> = stream
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["accountId"], "a2");
        assert_eq!(records[0]["groups"]["items"][0]["name"], "jira-users");
    }
}
