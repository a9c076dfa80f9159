use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CheckStore;
use crate::error::StoreError;
use crate::http_probe::result::CheckResult;

/// Process-local store. Records live until the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, CheckResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CheckStore for MemoryStore {
    async fn get(&self, hostname: &str) -> Result<Option<CheckResult>, StoreError> {
        Ok(self.records.read().await.get(hostname).cloned())
    }

    async fn put(&self, hostname: &str, check: &CheckResult) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(hostname.to_string(), check.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_unknown_hostname_is_absent() {
        let store = MemoryStore::new();
        assert_eq!(store.get("example.com").await.expect("infallible"), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_overwrites_previous_record() {
        let store = MemoryStore::new();
        let first = CheckResult {
            time: 1,
            duid_cookie: true,
            ..Default::default()
        };
        let second = CheckResult {
            time: 2,
            server_header: true,
            ..Default::default()
        };

        store.put("example.com", &first).await.expect("infallible");
        store.put("example.com", &second).await.expect("infallible");

        assert_eq!(store.get("example.com").await.expect("infallible"), Some(second));
        assert_eq!(store.len().await, 1);
    }
}
