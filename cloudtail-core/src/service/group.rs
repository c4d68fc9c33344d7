//! Per-group supervisor: keeps the set of tailers in step with the streams
//! the cloud reports for its log group.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant};
use tokio_util::sync::CancellationToken;

use super::{Context, StreamTailer};
use crate::clock;
use crate::config::Prospector;
use crate::error::Result;
use crate::multiline::{Assembler, MultilinePolicy};
use crate::registry::StreamKey;

/// Supervises the tailers of one log group. Groups live for the process
/// lifetime; their tailers come and go with stream activity.
pub struct GroupSupervisor {
    name: String,
    prospector: Arc<Prospector>,
    policy: Option<MultilinePolicy>,
    ctx: Context,
    streams: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
    added_streams: AtomicU64,
    removed_streams: Arc<AtomicU64>,
}

impl GroupSupervisor {
    pub fn new(name: String, prospector: Arc<Prospector>, ctx: Context) -> Result<Self> {
        let policy = prospector
            .multiline
            .as_ref()
            .map(MultilinePolicy::compile)
            .transpose()?;

        Ok(Self {
            name,
            prospector,
            policy,
            ctx,
            streams: Arc::new(RwLock::new(HashMap::new())),
            added_streams: AtomicU64::new(0),
            removed_streams: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Supervision loop: stream refresh and counter reports, each on its own
    /// ticker.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(group = %self.name, "group supervisor started");

        let mut refresh_ticker = interval(self.ctx.config.stream_refresh_frequency);
        let report_period = self.ctx.config.report_frequency;
        let mut report_ticker = interval_at(Instant::now() + report_period, report_period);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!(group = %self.name, "group supervisor stopped");
                    return;
                }
                _ = refresh_ticker.tick() => self.refresh_streams().await,
                _ = report_ticker.tick() => self.report(),
            }
        }
    }

    /// One enumeration pass: spawn a tailer for every fresh stream that is
    /// not already tailed. Expired streams that are still tailed are left to
    /// terminate on their own.
    pub async fn refresh_streams(&self) {
        let horizon = self.ctx.config.stream_event_horizon;
        let mut next_token = None;

        loop {
            let page = match self
                .ctx
                .cloud
                .describe_log_streams(&self.name, next_token.take())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(group = %self.name, error = %e, "failed to enumerate streams");
                    return;
                }
            };

            for summary in &page.streams {
                let Some(timestamp) = summary.last_event_timestamp else {
                    tracing::debug!(group = %self.name, stream = %summary.name, "stream has no events yet");
                    continue;
                };
                let tailed = self.streams.read().contains_key(&summary.name);
                let expired = clock::is_before(horizon, timestamp);
                if !tailed && !expired {
                    self.spawn_tailer(&summary.name);
                }
            }

            next_token = page.next_token;
            if next_token.is_none() {
                return;
            }
        }
    }

    fn spawn_tailer(&self, stream_name: &str) {
        let (finished_tx, finished_rx) = oneshot::channel();
        let tailer = StreamTailer::new(
            StreamKey::new(self.name.clone(), stream_name),
            self.prospector.id.clone(),
            Assembler::new(self.policy.clone()),
            self.ctx.clone(),
            finished_tx,
        );

        tracing::info!(group = %self.name, stream = %stream_name, "start monitoring stream");
        let task = tokio::spawn(tailer.run());
        self.streams.write().insert(stream_name.to_string(), task);
        self.added_streams.fetch_add(1, Ordering::Relaxed);

        // reaper: waits for the tailer to finish, then drops it from the map
        let streams = Arc::clone(&self.streams);
        let removed_streams = Arc::clone(&self.removed_streams);
        let group = self.name.clone();
        let stream = stream_name.to_string();
        tokio::spawn(async move {
            let _ = finished_rx.await;
            tracing::info!(group = %group, stream = %stream, "stop monitoring stream");
            streams.write().remove(&stream);
            removed_streams.fetch_add(1, Ordering::Relaxed);
        });
    }

    fn report(&self) {
        tracing::info!(
            group = %self.name,
            active = self.streams.read().len(),
            added = self.added_streams.swap(0, Ordering::Relaxed),
            removed = self.removed_streams.swap(0, Ordering::Relaxed),
            "group report"
        );
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when `stream` is currently tailed.
    #[must_use]
    pub fn is_tailing(&self, stream: &str) -> bool {
        self.streams.read().contains_key(stream)
    }

    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.read().len()
    }
}
