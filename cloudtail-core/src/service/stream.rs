//! Per-stream tailer: pulls log events forward, drives the line assembler,
//! persists the resume cursor and decides its own lifecycle.

use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant};

use super::Context;
use crate::clock;
use crate::cloud::{EventQuery, LogEvent};
use crate::error::Result;
use crate::event::Event;
use crate::multiline::Assembler;
use crate::registry::{RegistryItem, StreamKey};

/// Tails one (group, stream) pair until the stream expires or a fetch
/// fails, then signals `finished` exactly once so the supervisor can reap
/// it.
pub struct StreamTailer {
    key: StreamKey,
    prospector_id: String,
    ctx: Context,
    query: EventQuery,
    assembler: Assembler,
    /// Timestamp of the last digested event, ms since epoch. Zero until the
    /// first event arrives.
    last_event_timestamp: i64,
    published_events: u64,
    finished: Option<oneshot::Sender<bool>>,
}

impl StreamTailer {
    pub fn new(
        key: StreamKey,
        prospector_id: String,
        assembler: Assembler,
        ctx: Context,
        finished: oneshot::Sender<bool>,
    ) -> Self {
        // The lower bound is fixed at construction. Once a fetch or a
        // restored cursor provides a token, the token governs pagination.
        let start_time = clock::millis_ago(ctx.config.stream_event_horizon);
        let query = EventQuery::new(key.group.clone(), key.stream.clone(), start_time);

        Self {
            key,
            prospector_id,
            ctx,
            query,
            assembler,
            last_event_timestamp: 0,
            published_events: 0,
            finished: Some(finished),
        }
    }

    /// Runs the tail loop to completion, then signals `finished`.
    pub async fn run(mut self) {
        tracing::info!(stream = %self.key, "tailer started");
        self.tail().await;
        tracing::info!(stream = %self.key, "tailer stopped");

        if let Some(finished) = self.finished.take() {
            let _ = finished.send(true);
        }
    }

    async fn tail(&mut self) {
        if self.restore_cursor().await.is_err() {
            return;
        }

        let report_period = self.ctx.config.report_frequency;
        let mut report_ticker = interval_at(Instant::now() + report_period, report_period);

        loop {
            if let Err(e) = self.next().await {
                tracing::error!(stream = %self.key, error = %e, "event fetch failed");
                return;
            }

            if clock::is_before(
                self.ctx.config.stream_event_horizon,
                self.last_event_timestamp,
            ) {
                tracing::info!(stream = %self.key, "stream expired");
                return;
            }

            // the report tick must not preempt forward progress, so it is
            // drained without blocking; otherwise wait out the refresh
            if report_ticker.tick().now_or_never().is_some() {
                self.report();
            } else {
                tokio::time::sleep(self.refresh_delay()).await;
            }
        }
    }

    /// Loads persisted resume state. Absence is a fresh start; any real read
    /// failure terminates the tailer.
    async fn restore_cursor(&mut self) -> Result<()> {
        match self.ctx.registry.read_cursor(&self.key).await {
            Ok(Some(item)) => {
                if !item.next_token.is_empty() {
                    self.query.next_token = Some(item.next_token);
                }
                self.assembler.restore(&item.buffer);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                tracing::error!(stream = %self.key, error = %e, "failed to read registry cursor");
                Err(e)
            }
        }
    }

    /// Fetches and digests one page of events, then advances and persists
    /// the cursor. An empty page means no progress this tick.
    async fn next(&mut self) -> Result<()> {
        let page = self.ctx.cloud.get_log_events(&self.query).await?;
        if page.events.is_empty() {
            return Ok(());
        }

        for event in &page.events {
            self.digest(event).await;
        }

        self.query.next_token = page.next_forward_token;
        let item = RegistryItem {
            next_token: self.query.next_token.clone().unwrap_or_default(),
            buffer: self.assembler.buffer().to_string(),
        };
        if let Err(e) = self.ctx.registry.write_cursor(&self.key, &item).await {
            tracing::warn!(stream = %self.key, error = %e, "failed to persist cursor");
        }
        Ok(())
    }

    async fn digest(&mut self, raw: &LogEvent) {
        if let Some(flush) = self.assembler.digest(&raw.message, raw.timestamp) {
            let event = Event {
                timestamp: clock::to_time(flush.timestamp),
                prospector: self.prospector_id.clone(),
                event_type: self.prospector_id.clone(),
                message: flush.message,
                group: self.key.group.clone(),
                stream: self.key.stream.clone(),
            };
            self.ctx.publisher.publish(event).await;
            self.published_events += 1;
        }
        self.last_event_timestamp = raw.timestamp;
    }

    fn refresh_delay(&self) -> Duration {
        if clock::is_hot(
            self.ctx.config.hot_stream_event_horizon,
            self.last_event_timestamp,
        ) {
            self.ctx.config.hot_stream_event_refresh_frequency
        } else {
            self.ctx.config.stream_event_refresh_frequency
        }
    }

    fn report(&mut self) {
        tracing::info!(
            stream = %self.key,
            published = self.published_events,
            period = ?self.ctx.config.report_frequency,
            "stream report"
        );
        self.published_events = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::cloud::EventPage;
    use crate::config::Config;
    use crate::error::Error;
    use crate::registry::Registry;
    use crate::testutil::{test_context, TestContext};

    fn harness(config: Config) -> TestContext {
        test_context(config)
    }

    fn tailer(harness: &TestContext) -> (StreamTailer, oneshot::Receiver<bool>) {
        let (finished_tx, finished_rx) = oneshot::channel();
        let tailer = StreamTailer::new(
            StreamKey::new("group", "stream"),
            "prospector".to_string(),
            Assembler::new(None),
            harness.ctx.clone(),
            finished_tx,
        );
        (tailer, finished_rx)
    }

    fn page(messages: &[&str], next_forward_token: &str) -> EventPage {
        let now = Utc::now().timestamp_millis();
        EventPage {
            events: messages
                .iter()
                .map(|message| LogEvent {
                    message: (*message).to_string(),
                    timestamp: now,
                })
                .collect(),
            next_forward_token: Some(next_forward_token.to_string()),
        }
    }

    #[tokio::test]
    async fn publishes_every_event_of_a_page() {
        let h = harness(Config::default());
        let (mut tailer, _finished_rx) = tailer(&h);
        h.cloud
            .push_event_page(Ok(page(&["Event 1\n", "Event 2\n", "Event 3\n"], "f/1")));

        tailer.next().await.expect("fetch");

        let events = h.publisher.events.lock().clone();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].message, "Event 1\n");
        assert_eq!(events[0].prospector, "prospector");
        assert_eq!(events[0].event_type, "prospector");
        assert_eq!(events[0].group, "group");
        assert_eq!(events[0].stream, "stream");
    }

    #[tokio::test]
    async fn persists_the_token_of_the_most_recent_fetch() {
        let h = harness(Config::default());
        let (mut tailer, _finished_rx) = tailer(&h);
        h.cloud.push_event_page(Ok(page(&["one\n"], "f/1")));
        h.cloud.push_event_page(Ok(page(&["two\n"], "f/2")));

        tailer.next().await.expect("fetch");
        tailer.next().await.expect("fetch");

        let item = h
            .registry
            .read_cursor(&StreamKey::new("group", "stream"))
            .await
            .expect("read")
            .expect("cursor present");
        assert_eq!(item.next_token, "f/2");

        // the second fetch carried the first token forward
        let queries = h.cloud.event_queries.lock().clone();
        assert_eq!(queries[0].next_token, None);
        assert_eq!(queries[1].next_token.as_deref(), Some("f/1"));
    }

    #[tokio::test]
    async fn empty_page_does_not_advance_the_cursor() {
        let h = harness(Config::default());
        let (mut tailer, _finished_rx) = tailer(&h);
        h.cloud.push_event_page(Ok(page(&["one\n"], "f/1")));
        h.cloud.push_event_page(Ok(EventPage {
            events: Vec::new(),
            next_forward_token: Some("f/ignored".to_string()),
        }));

        tailer.next().await.expect("fetch");
        tailer.next().await.expect("fetch");

        assert_eq!(tailer.query.next_token.as_deref(), Some("f/1"));
        let item = h
            .registry
            .read_cursor(&StreamKey::new("group", "stream"))
            .await
            .expect("read")
            .expect("cursor present");
        assert_eq!(item.next_token, "f/1");
    }

    #[tokio::test]
    async fn fetch_error_signals_finished_exactly_once() {
        let h = harness(Config::default());
        let (tailer, finished_rx) = tailer(&h);
        h.cloud
            .push_event_page(Err(Error::Cloud("InvalidOperationException".to_string())));

        tailer.run().await;

        assert!(finished_rx.await.expect("finished signal"));
        assert!(h.publisher.events.lock().is_empty());
    }

    #[tokio::test]
    async fn registry_read_failure_terminates_the_tailer() {
        let h = harness(Config::default());
        let failing = Arc::new(crate::testutil::FailingRegistry);
        let ctx = Context {
            registry: failing as Arc<dyn Registry>,
            ..h.ctx.clone()
        };
        let (finished_tx, finished_rx) = oneshot::channel();
        let tailer = StreamTailer::new(
            StreamKey::new("group", "stream"),
            "prospector".to_string(),
            Assembler::new(None),
            ctx,
            finished_tx,
        );

        tailer.run().await;

        assert!(finished_rx.await.expect("finished signal"));
        assert!(h.cloud.event_queries.lock().is_empty());
    }

    #[tokio::test]
    async fn start_time_is_the_horizon_lower_bound() {
        let config = Config {
            stream_event_horizon: Duration::from_secs(3600),
            ..Config::default()
        };
        let h = harness(config);
        let (tailer, _finished_rx) = tailer(&h);

        let now = Utc::now().timestamp_millis();
        let two_hours_old = now - 2 * 3_600_000;
        let thirty_minutes_old = now - 30 * 60_000;
        assert!(two_hours_old < tailer.query.start_time);
        assert!(thirty_minutes_old > tailer.query.start_time);
        assert_eq!(tailer.query.limit, EventQuery::PAGE_LIMIT);
        assert_eq!(tailer.query.next_token, None);
    }

    #[tokio::test]
    async fn resumes_from_the_persisted_cursor() {
        let h = harness(Config::default());
        h.registry
            .write_cursor(
                &StreamKey::new("group", "stream"),
                &RegistryItem {
                    next_token: "f/resume".to_string(),
                    buffer: "half a record".to_string(),
                },
            )
            .await
            .expect("seed cursor");

        let (mut tailer, _finished_rx) = tailer(&h);
        tailer.restore_cursor().await.expect("restore");

        assert_eq!(tailer.query.next_token.as_deref(), Some("f/resume"));
        assert_eq!(tailer.assembler.buffer(), "half a record");
    }

    #[tokio::test]
    async fn persisted_empty_token_stays_unset_on_resume() {
        let h = harness(Config::default());
        h.registry
            .write_cursor(
                &StreamKey::new("group", "stream"),
                &RegistryItem::default(),
            )
            .await
            .expect("seed cursor");

        let (mut tailer, _finished_rx) = tailer(&h);
        tailer.restore_cursor().await.expect("restore");

        // the first fetch must omit the token rather than send ""
        assert_eq!(tailer.query.next_token, None);
    }

    #[tokio::test]
    async fn expired_stream_terminates_after_the_fetch() {
        let config = Config {
            stream_event_horizon: Duration::from_secs(3600),
            ..Config::default()
        };
        let h = harness(config);
        let (tailer, finished_rx) = tailer(&h);

        let stale = Utc::now().timestamp_millis() - 2 * 3_600_000;
        h.cloud.push_event_page(Ok(EventPage {
            events: vec![LogEvent {
                message: "old\n".to_string(),
                timestamp: stale,
            }],
            next_forward_token: Some("f/1".to_string()),
        }));

        tailer.run().await;

        assert!(finished_rx.await.expect("finished signal"));
        // the stale event was still published before expiry kicked in
        assert_eq!(h.publisher.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn hot_stream_selects_the_hot_refresh_delay() {
        let config = Config {
            stream_event_horizon: Duration::from_secs(7200),
            stream_event_refresh_frequency: Duration::from_secs(5),
            hot_stream_event_horizon: Duration::from_secs(600),
            hot_stream_event_refresh_frequency: Duration::from_secs(1),
            ..Config::default()
        };
        let h = harness(config);
        let (mut tailer, _finished_rx) = tailer(&h);

        tailer.last_event_timestamp = Utc::now().timestamp_millis() - 60_000;
        assert_eq!(tailer.refresh_delay(), Duration::from_secs(1));

        tailer.last_event_timestamp = Utc::now().timestamp_millis() - 3_600_000;
        assert_eq!(tailer.refresh_delay(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn zero_hot_horizon_never_selects_the_hot_delay() {
        let config = Config {
            stream_event_refresh_frequency: Duration::from_secs(5),
            hot_stream_event_horizon: Duration::ZERO,
            hot_stream_event_refresh_frequency: Duration::from_secs(1),
            ..Config::default()
        };
        let h = harness(config);
        let (mut tailer, _finished_rx) = tailer(&h);

        tailer.last_event_timestamp = Utc::now().timestamp_millis() - 1;
        assert_eq!(tailer.refresh_delay(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn multiline_buffer_is_persisted_with_the_cursor() {
        use crate::config::{MatchMode, Multiline};
        use crate::multiline::MultilinePolicy;

        let h = harness(Config::default());
        let policy = MultilinePolicy::compile(&Multiline {
            pattern: "^START RequestId.+".to_string(),
            negate: true,
            match_mode: MatchMode::After,
        })
        .expect("policy");
        let (finished_tx, _finished_rx) = oneshot::channel();
        let mut tailer = StreamTailer::new(
            StreamKey::new("group", "stream"),
            "prospector".to_string(),
            Assembler::new(Some(policy)),
            h.ctx.clone(),
            finished_tx,
        );

        h.cloud.push_event_page(Ok(page(
            &["START RequestId: aaa-bbb\n", "[Info] Hello\n"],
            "f/1",
        )));
        tailer.next().await.expect("fetch");

        // nothing flushed yet, the open record rides along in the cursor
        assert!(h.publisher.events.lock().is_empty());
        let item = h
            .registry
            .read_cursor(&StreamKey::new("group", "stream"))
            .await
            .expect("read")
            .expect("cursor present");
        assert_eq!(item.buffer, "START RequestId: aaa-bbb\n[Info] Hello\n");
    }
}
