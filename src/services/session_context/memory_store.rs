use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{SessionBackend, SessionError};

struct MemoryEntry {
    fields: HashMap<String, String>,
    expires_at: Instant,
}

/// In-process session storage for development and tests. Sessions vanish on
/// restart and are not shared between replicas.
#[derive(Default)]
pub(crate) struct MemorySessionBackend {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn write(
        &self,
        key: &str,
        fields: Vec<(String, String)>,
        ttl_seconds: u64,
    ) -> Result<(), SessionError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry { fields: HashMap::new(), expires_at: now });
        entry.fields.extend(fields);
        entry.expires_at = now + Duration::from_secs(ttl_seconds);

        Ok(())
    }

    async fn read(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>, SessionError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let live = entries.get(key).filter(|entry| entry.expires_at > now);

        Ok(fields
            .iter()
            .map(|field| live.and_then(|entry| entry.fields.get(field).cloned()))
            .collect())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_merges_fields() {
        let backend = MemorySessionBackend::default();
        backend.write("k", vec![("a".into(), "1".into())], 60).await.unwrap();
        backend.write("k", vec![("b".into(), "2".into())], 60).await.unwrap();

        let values = backend.read("k", &["a".into(), "b".into(), "c".into()]).await.unwrap();
        assert_eq!(values, vec![Some("1".to_string()), Some("2".to_string()), None]);
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let backend = MemorySessionBackend::default();
        backend.write("k", vec![("a".into(), "1".into())], 0).await.unwrap();

        let values = backend.read("k", &["a".into()]).await.unwrap();
        assert_eq!(values, vec![None]);
    }
}
