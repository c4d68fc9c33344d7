use std::sync::Arc;

use crate::cloud::CloudWatchLogs;
use crate::config::Config;
use crate::publisher::EventPublisher;
use crate::registry::Registry;

/// Configuration and collaborator handles shared down the supervision
/// hierarchy. All members are immutable or safe for concurrent use, so the
/// context clones freely into every task.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub cloud: Arc<dyn CloudWatchLogs>,
    pub registry: Arc<dyn Registry>,
    pub publisher: Arc<dyn EventPublisher>,
}
