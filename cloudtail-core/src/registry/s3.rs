// Uses OpenDAL for unified storage access, so any S3-compatible store
// (AWS S3, Minio, ...) can hold the cursor objects.

use async_trait::async_trait;
use opendal::{services::S3, ErrorKind, Operator};

use super::{Registry, RegistryItem, StreamKey};
use crate::error::{Error, Result};

/// Object-store registry. One JSON object per stream, keyed
/// `<prefix><group>/<stream>`.
pub struct S3Registry {
    operator: Operator,
    key_prefix: String,
}

impl S3Registry {
    pub fn new(bucket: &str, region: &str, key_prefix: &str) -> Result<Self> {
        tracing::info!(bucket, region, "initializing s3 registry");

        let builder = S3::default().bucket(bucket).region(region);
        let operator = Operator::new(builder).map_err(Error::Storage)?.finish();

        Ok(Self::with_operator(operator, key_prefix))
    }

    /// Wraps an already-built operator; lets tests point at a local store.
    #[must_use]
    pub fn with_operator(operator: Operator, key_prefix: &str) -> Self {
        Self {
            operator,
            key_prefix: key_prefix.to_string(),
        }
    }
}

#[async_trait]
impl Registry for S3Registry {
    async fn read_cursor(&self, key: &StreamKey) -> Result<Option<RegistryItem>> {
        let object_key = key.object_key(&self.key_prefix);
        tracing::debug!(key = %object_key, "fetching registry cursor");

        match self.operator.read(&object_key).await {
            Ok(buffer) => {
                let item: RegistryItem = serde_json::from_slice(&buffer.to_vec())?;
                Ok(Some(item))
            }
            // a normal condition when the program starts monitoring a new stream
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(e)),
        }
    }

    async fn write_cursor(&self, key: &StreamKey, item: &RegistryItem) -> Result<()> {
        let object_key = key.object_key(&self.key_prefix);
        let body = serde_json::to_vec(item)?;

        self.operator
            .write_with(&object_key, body)
            .content_type("application/json")
            .await
            .map_err(Error::Storage)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use opendal::services::Memory;

    use super::*;

    fn memory_backed_registry(key_prefix: &str) -> S3Registry {
        let operator = Operator::new(Memory::default())
            .expect("memory operator")
            .finish();
        S3Registry::with_operator(operator, key_prefix)
    }

    #[tokio::test]
    async fn cursor_round_trips_through_the_object_store() {
        let registry = memory_backed_registry("cursors/");
        let key = StreamKey::new("group", "stream");
        let item = RegistryItem {
            next_token: "f/34139340".to_string(),
            buffer: "START RequestId: aaa-bbb\n".to_string(),
        };

        registry.write_cursor(&key, &item).await.expect("write");
        let loaded = registry.read_cursor(&key).await.expect("read");
        assert_eq!(loaded, Some(item));
    }

    #[tokio::test]
    async fn missing_object_reads_as_absent() {
        let registry = memory_backed_registry("");
        let key = StreamKey::new("group", "never-seen");
        assert_eq!(registry.read_cursor(&key).await.expect("read"), None);
    }

    #[tokio::test]
    async fn stored_object_body_is_the_wire_json() {
        let operator = Operator::new(Memory::default())
            .expect("memory operator")
            .finish();
        let registry = S3Registry::with_operator(operator.clone(), "prod/");

        let key = StreamKey::new("group", "stream");
        let item = RegistryItem {
            next_token: "f/1".to_string(),
            buffer: String::new(),
        };
        registry.write_cursor(&key, &item).await.expect("write");

        let body = operator.read("prod/group/stream").await.expect("object");
        assert_eq!(
            String::from_utf8(body.to_vec()).expect("utf-8"),
            r#"{"NextToken":"f/1","Buffer":""}"#
        );
    }
}
