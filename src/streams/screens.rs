use async_stream::try_stream;
use futures::StreamExt;

use super::StreamArgs;
use super::resource::{ResourceStream, SCREENS};
use crate::client::ApiBase;
use crate::stream::{
    Extract, PageRequest, RecordStream, Stream, StreamState, SyncMode, boxed, field_string,
    paginate, stamp,
};

/// 画面ごとのタブ
#[derive(Debug, Clone)]
pub struct ScreenTabs {
    args: StreamArgs,
    screens: ResourceStream,
}

impl ScreenTabs {
    pub fn new(args: StreamArgs) -> Self {
        Self {
            screens: ResourceStream::new(&SCREENS, args.clone()),
            args,
        }
    }

    fn read_tabs(&self) -> RecordStream<'_> {
        boxed(try_stream! {
            let mut screens = self.screens.read_records(SyncMode::FullRefresh, None);
            while let Some(screen) = screens.next().await {
                let screen = screen?;
                let Some(screen_id) = field_string(&screen, "id") else {
                    continue;
                };

                let request = PageRequest::new(
                    ApiBase::Platform,
                    format!("screens/{}/tabs", screen_id),
                    Extract::Root,
                )
                .paginate(false);

                let mut tabs = paginate(&self.args.client, request);
                while let Some(tab) = tabs.next().await {
                    let mut tab = tab?;
                    stamp(&mut tab, "screenId", screen.get("id").cloned());
                    yield tab;
                }
            }
        })
    }
}

impl Stream for ScreenTabs {
    fn name(&self) -> &'static str {
        "screen_tabs"
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
        self.read_tabs()
    }
}

/// タブごとのフィールド
#[derive(Debug, Clone)]
pub struct ScreenTabFields {
    tabs: ScreenTabs,
}

impl ScreenTabFields {
    pub fn new(args: StreamArgs) -> Self {
        Self {
            tabs: ScreenTabs::new(args),
        }
    }
}

impl Stream for ScreenTabFields {
    fn name(&self) -> &'static str {
        "screen_tab_fields"
    }

    fn primary_key(&self) -> Option<&'static str> {
        Some("id")
    }

    fn projects(&self) -> &[String] {
        &self.tabs.args.projects
    }

    fn read_records<'a>(
        &'a self,
        _sync_mode: SyncMode,
        _state: Option<&'a StreamState>,
    ) -> RecordStream<'a> {
        boxed(try_stream! {
            let mut tabs = self.tabs.read_tabs();
            while let Some(tab) = tabs.next().await {
                let tab = tab?;
                let (Some(screen_id), Some(tab_id)) =
                    (field_string(&tab, "screenId"), field_string(&tab, "id"))
                else {
                    continue;
                };

                let request = PageRequest::new(
                    ApiBase::Platform,
                    format!("screens/{}/tabs/{}/fields", screen_id, tab_id),
                    Extract::Root,
                )
                .paginate(false);

                let mut fields = paginate(&self.tabs.args.client, request);
                while let Some(field) = fields.next().await {
                    let mut field = field?;
                    stamp(&mut field, "screenId", tab.get("screenId").cloned());
                    stamp(&mut field, "tabId", tab.get("id").cloned());
                    yield field;
                }
            }
        })
    }
}
