use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Registry, RegistryItem, StreamKey};
use crate::error::Result;

/// Process-local registry. Cursors do not survive a restart; used when no
/// bucket is configured.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: RwLock<HashMap<String, RegistryItem>>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn read_cursor(&self, key: &StreamKey) -> Result<Option<RegistryItem>> {
        Ok(self.entries.read().get(&key.object_key("")).cloned())
    }

    async fn write_cursor(&self, key: &StreamKey, item: &RegistryItem) -> Result<()> {
        self.entries
            .write()
            .insert(key.object_key(""), item.clone());
        Ok(())
    }
}
