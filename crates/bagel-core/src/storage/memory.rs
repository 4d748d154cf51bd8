//! In-memory [`ObjectStore`] for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::ObjectStore;

#[derive(Default)]
struct Objects {
    by_path: BTreeMap<String, Vec<u8>>,
    puts: Vec<String>,
}

/// Objects held in a process-local map. Clones share the same map.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<Objects>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.by_path.get(path).cloned())
    }

    /// Stored paths in lexical order.
    pub fn paths(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.by_path.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored paths under a prefix, e.g. `"src/log/"`.
    pub fn paths_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.paths()
            .into_iter()
            .filter(|p| p.starts_with(prefix))
            .collect()
    }

    /// Every path passed to `put`, in call order, repeats included.
    pub fn put_log(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.puts.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .map(|objects| objects.by_path.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| anyhow!("object store lock poisoned"))?;
        objects.by_path.insert(path.to_string(), data);
        objects.puts.push(path.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryObjectStore::new();
        store.upload_data("src/data/t/a.json", b"[1]".to_vec()).await.unwrap();
        store.upload_data("src/data/t/a.json", b"[2]".to_vec()).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("src/data/t/a.json").unwrap(), b"[2]".to_vec());
        assert_eq!(store.put_log().len(), 2);
    }

    #[tokio::test]
    async fn test_prefix_listing() {
        let store = InMemoryObjectStore::new();
        store.upload_data("src/data/t/a.json", vec![]).await.unwrap();
        store.upload_log("src/log/t/a.log", vec![]).await.unwrap();

        assert_eq!(store.paths_with_prefix("src/log/"), vec!["src/log/t/a.log"]);
        assert!(!store.is_empty());
    }
}
