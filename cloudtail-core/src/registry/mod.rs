//! Durable per-stream cursor store.
//!
//! A registry keeps, for every tailed stream, the opaque forward cursor of
//! the last persisted fetch and the partial multi-line buffer, so a restart
//! resumes where the previous process stopped.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

mod memory;
mod s3;

pub use memory::MemoryRegistry;
pub use s3::S3Registry;

/// Identity of a tailed stream, used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub group: String,
    pub stream: String,
}

impl StreamKey {
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
        }
    }

    /// Object key under an optional configured prefix.
    #[must_use]
    pub fn object_key(&self, prefix: &str) -> String {
        format!("{}{}/{}", prefix, self.group, self.stream)
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.stream)
    }
}

/// Persisted resume state for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryItem {
    /// Opaque forward cursor from the last persisted fetch. Empty means the
    /// stream has not produced a token yet.
    #[serde(rename = "NextToken")]
    pub next_token: String,
    /// Partial multi-line record waiting for its closing event.
    #[serde(rename = "Buffer")]
    pub buffer: String,
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Loads the persisted cursor for `key`. An unknown key is `Ok(None)`,
    /// not an error.
    async fn read_cursor(&self, key: &StreamKey) -> Result<Option<RegistryItem>>;

    /// Persists the cursor for `key`, replacing any previous value.
    async fn write_cursor(&self, key: &StreamKey, item: &RegistryItem) -> Result<()>;
}
