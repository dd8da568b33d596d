pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod source;
pub mod stream;
pub mod streams;
pub mod sync;
pub mod time_filter;

pub use auth::BasicAuthenticator;
pub use client::{ApiBase, JiraClient};
pub use config::{RawConfig, SourceConfig};
pub use error::{Error, ErrorKind, Result};

// Source facade re-exports
pub use registry::StreamRegistry;
pub use source::{CONNECTION_ERROR_MESSAGE, ConnectionStatus, SourceJira};

// Stream contract re-exports
pub use stream::{IncrementalCursor, Record, RecordStream, Stream, StreamState, SyncMode};

// Sync module re-exports
pub use sync::{
    JsonLinesSink, RecordSink, StreamSyncStats, SyncConfig, SyncResult, SyncService, SyncState,
};

// Logging re-exports
pub use logging::{LogConfig, LogFormat, LogLevel, init_logging};

// Time filter module re-exports
pub use time_filter::parse_jira_datetime;
