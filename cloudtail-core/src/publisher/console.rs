use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use super::EventPublisher;
use crate::event::Event;

/// Writes events as newline-delimited JSON to a byte sink, stdout by
/// default. Write failures are logged and the event is dropped.
pub struct ConsolePublisher<W = Stdout> {
    sink: Mutex<W>,
}

impl ConsolePublisher<Stdout> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sink(tokio::io::stdout())
    }
}

impl Default for ConsolePublisher<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> ConsolePublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn with_sink(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl<W> EventPublisher for ConsolePublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&self, event: Event) {
        let mut line = match serde_json::to_vec(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode event");
                return;
            }
        };
        line.push(b'\n');

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.write_all(&line).await {
            tracing::warn!(error = %e, "failed to write event to sink");
        }
    }

    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.flush().await {
            tracing::warn!(error = %e, "failed to flush sink");
        }
    }
}
