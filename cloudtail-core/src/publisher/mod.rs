//! Outbound event sink adapter.

use async_trait::async_trait;

use crate::event::Event;

mod console;

pub use console::ConsolePublisher;

/// Downstream sink for normalized events.
///
/// Publishing reports no errors back to the tailers: a rejected or dropped
/// event is lost past this boundary, and cursors still advance.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Sends exactly one event to the downstream sink.
    async fn publish(&self, event: Event);

    /// Releases sink resources. Safe to call more than once.
    async fn close(&self);
}
