use async_stream::try_stream;
use futures::StreamExt;

use super::StreamArgs;
use super::resource::{FILTERS, ResourceStream};
use crate::client::ApiBase;
use crate::stream::{
    Extract, PageRequest, RecordStream, Stream, StreamState, SyncMode, boxed, field_string,
    paginate, stamp,
};

/// フィルターごとの共有権限
#[derive(Debug, Clone)]
pub struct FilterSharing {
    args: StreamArgs,
    filters: ResourceStream,
}

impl FilterSharing {
    pub fn new(args: StreamArgs) -> Self {
        Self {
            filters: ResourceStream::new(&FILTERS, args.clone()),
            args,
        }
    }
}

impl Stream for FilterSharing {
    fn name(&self) -> &'static str {
        "filter_sharing"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("id")
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
            let mut filters = self.filters.read_records(sync_mode, state);
            while let Some(filter) = filters.next().await {
                let filter = filter?;
                let Some(filter_id) = field_string(&filter, "id") else {
                    continue;
                };

                let request = PageRequest::new(
                    ApiBase::Platform,
                    format!("filter/{}/permission", filter_id),
                    Extract::Root,
                )
                .paginate(false);

                let mut permissions = paginate(&self.args.client, request);
                while let Some(permission) = permissions.next().await {
                    let mut permission = permission?;
                    stamp(&mut permission, "filterId", filter.get("id").cloned());
                    yield permission;
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
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_filter_sharing_per_filter() {
        // Given: 2 件のフィルターとそれぞれの共有権限
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/filter/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "maxResults": 50,
                "total": 2,
                "isLast": true,
                "values": [{"id": "10000"}, {"id": "10001"}]
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/filter/10000/permission"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "type": "global"}
            ])))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/api/3/filter/10001/permission"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let stream = FilterSharing::new(args_for(&mock_server.uri(), &[]));

        // When
        let records: Vec<Record> = stream
            .read_records(SyncMode::FullRefresh, None)
            .try_collect()
            .await
            .unwrap();

        // Then
        assert_eq!(records, vec![json!({"id": 1, "type": "global", "filterId": "10000"})]);
    }
}
