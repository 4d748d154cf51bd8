//! Local filesystem [`ObjectStore`].
//!
//! Artifact paths map onto directories under a root, e.g.
//! `{root}/etq/data/doc_work/2022/06/24/doc_work_2022_06_24T09_26_09_548513Z.json`.
//! Each write goes to a temporary sibling first and is renamed into place, so
//! a reader never sees a half-written artifact and an overwrite is atomic.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bagel_core::ObjectStore;

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Resolve an artifact path under the root, refusing anything that
    /// could escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("refusing to write outside the landing root: {:?}", path);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn backend(&self) -> &str {
        "local"
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut tmp = target.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &data)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .with_context(|| format!("Failed to move artifact into {}", target.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let path = "etq/data/docs/2022/06/24/docs_2022_06_24T09_26_09_548513Z.json";

        store.upload_data(path, b"[]".to_vec()).await.unwrap();

        let written = std::fs::read(dir.path().join(path)).unwrap();
        assert_eq!(written, b"[]");
    }

    #[tokio::test]
    async fn test_put_overwrites_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let path = "etq/log/docs/2022/06/24/docs.log";

        store.upload_log(path, b"first".to_vec()).await.unwrap();
        store.upload_log(path, b"second".to_vec()).await.unwrap();

        let folder = dir.path().join("etq/log/docs/2022/06/24");
        let entries: Vec<_> = std::fs::read_dir(&folder).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(std::fs::read(folder.join("docs.log")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_escaping_paths_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.put("../outside.json", vec![]).await.is_err());
        assert!(store.put("/etc/passwd", vec![]).await.is_err());
        assert!(store.put("", vec![]).await.is_err());
    }
}
