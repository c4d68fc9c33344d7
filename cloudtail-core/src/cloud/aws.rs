use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
use aws_sdk_cloudwatchlogs::types::OrderBy;
use aws_sdk_cloudwatchlogs::Client;

use super::{CloudWatchLogs, EventPage, EventQuery, GroupPage, LogEvent, StreamPage, StreamSummary};
use crate::error::{Error, Result};

/// Production client backed by the AWS SDK. Retries and backoff come from
/// the SDK configuration the client was built with.
pub struct AwsCloudWatchLogs {
    client: Client,
}

impl AwsCloudWatchLogs {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudWatchLogs for AwsCloudWatchLogs {
    async fn describe_log_groups(
        &self,
        prefix: &str,
        next_token: Option<String>,
    ) -> Result<GroupPage> {
        let mut request = self.client.describe_log_groups().set_next_token(next_token);
        if !prefix.is_empty() {
            request = request.log_group_name_prefix(prefix);
        }
        let output = request
            .send()
            .await
            .map_err(|e| Error::Cloud(format!("{}", DisplayErrorContext(&e))))?;

        let groups = output
            .log_groups()
            .iter()
            .filter_map(|group| group.log_group_name().map(str::to_string))
            .collect();
        Ok(GroupPage {
            groups,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn describe_log_streams(
        &self,
        group: &str,
        next_token: Option<String>,
    ) -> Result<StreamPage> {
        let output = self
            .client
            .describe_log_streams()
            .log_group_name(group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| Error::Cloud(format!("{}", DisplayErrorContext(&e))))?;

        let streams = output
            .log_streams()
            .iter()
            .filter_map(|stream| {
                stream.log_stream_name().map(|name| StreamSummary {
                    name: name.to_string(),
                    last_event_timestamp: stream.last_event_timestamp(),
                })
            })
            .collect();
        Ok(StreamPage {
            streams,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn get_log_events(&self, query: &EventQuery) -> Result<EventPage> {
        let output = self
            .client
            .get_log_events()
            .log_group_name(&query.group)
            .log_stream_name(&query.stream)
            .start_from_head(true)
            .limit(query.limit)
            .start_time(query.start_time)
            .set_next_token(query.next_token.clone())
            .send()
            .await
            .map_err(|e| Error::Cloud(format!("{}", DisplayErrorContext(&e))))?;

        let events = output
            .events()
            .iter()
            .filter_map(|event| match (event.message(), event.timestamp()) {
                (Some(message), Some(timestamp)) => Some(LogEvent {
                    message: message.to_string(),
                    timestamp,
                }),
                _ => None,
            })
            .collect();
        Ok(EventPage {
            events,
            next_forward_token: output.next_forward_token().map(str::to_string),
        })
    }
}
