//! Narrow client surface over the CloudWatch Logs API.
//!
//! Only the four operations the supervision hierarchy needs: group
//! enumeration by prefix, stream enumeration per group, forward event
//! fetches, all paginated one page per call. Tests inject in-process fakes.

use async_trait::async_trait;

use crate::error::Result;

mod aws;

pub use aws::AwsCloudWatchLogs;

/// Summary of a log stream as returned by stream enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub name: String,
    /// Milliseconds since the Unix epoch; `None` for streams that never
    /// received an event.
    pub last_event_timestamp: Option<i64>,
}

/// One raw log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A page of log group names matching a prefix.
#[derive(Debug, Clone, Default)]
pub struct GroupPage {
    pub groups: Vec<String>,
    pub next_token: Option<String>,
}

/// A page of stream summaries, ordered by last event descending.
#[derive(Debug, Clone, Default)]
pub struct StreamPage {
    pub streams: Vec<StreamSummary>,
    pub next_token: Option<String>,
}

/// A page of log events plus the forward cursor for the next fetch.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<LogEvent>,
    pub next_forward_token: Option<String>,
}

/// Query parameters for one forward fetch of log events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub group: String,
    pub stream: String,
    /// Lower bound in ms since the Unix epoch. Governs the first fetch; once
    /// a token is present the token wins.
    pub start_time: i64,
    /// Opaque forward cursor. `None` on the very first fetch; never an empty
    /// string.
    pub next_token: Option<String>,
    pub limit: i32,
}

impl EventQuery {
    pub const PAGE_LIMIT: i32 = 100;

    #[must_use]
    pub fn new(group: String, stream: String, start_time: i64) -> Self {
        Self {
            group,
            stream,
            start_time,
            next_token: None,
            limit: Self::PAGE_LIMIT,
        }
    }
}

#[async_trait]
pub trait CloudWatchLogs: Send + Sync {
    /// One page of log groups whose name begins with `prefix`. An empty
    /// prefix enumerates all groups.
    async fn describe_log_groups(
        &self,
        prefix: &str,
        next_token: Option<String>,
    ) -> Result<GroupPage>;

    /// One page of the streams of `group`, ordered by last event descending.
    async fn describe_log_streams(
        &self,
        group: &str,
        next_token: Option<String>,
    ) -> Result<StreamPage>;

    /// The next page of events for `query`, forward direction.
    async fn get_log_events(&self, query: &EventQuery) -> Result<EventPage>;
}
