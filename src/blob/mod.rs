//! Blob storage over the `object_store` abstraction.
//!
//! Attachments have no metadata rows anywhere: the object store is the
//! source of truth, enumerated by prefix listing. Uploads overwrite on
//! path collision, which is also the only dedup the service offers.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjPath;
use object_store::{ObjectStore, PutPayload};

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Object store error: {0}")]
    Store(#[from] object_store::Error),
    #[error("Invalid blob path: {0}")]
    Path(String),
}

/// Storage backend selection.
#[derive(Clone, Debug)]
pub enum BlobBackend {
    /// Local filesystem rooted at the given directory.
    Local(PathBuf),
    /// In-memory (tests, ephemeral deployments).
    Memory,
}

/// A rooted view of an object store with public-URL derivation.
///
/// `root` plays the role of a bucket: every path handed to this store is
/// placed under it, and derived URLs are `{public_base}/{root}/{path}`.
#[derive(Clone)]
pub struct BlobStore {
    store: Arc<dyn ObjectStore>,
    root: String,
    public_base: String,
}

impl BlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, root: &str, public_base: &str) -> Self {
        BlobStore {
            store,
            root: root.trim_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_backend(
        backend: &BlobBackend,
        root: &str,
        public_base: &str,
    ) -> Result<Self, BlobError> {
        let store: Arc<dyn ObjectStore> = match backend {
            BlobBackend::Local(dir) => Arc::new(
                LocalFileSystem::new_with_prefix(dir)
                    .map_err(|e| BlobError::Path(e.to_string()))?,
            ),
            BlobBackend::Memory => Arc::new(InMemory::new()),
        };
        Ok(BlobStore::new(store, root, public_base))
    }

    fn location(&self, path: &str) -> ObjPath {
        ObjPath::from(format!("{}/{}", self.root, path.trim_matches('/')))
    }

    /// Write bytes at `path`, overwriting any existing object.
    pub async fn put(&self, path: &str, data: Bytes) -> Result<(), BlobError> {
        let location = self.location(path);
        self.store.put(&location, PutPayload::from(data)).await?;
        Ok(())
    }

    /// List object paths (relative to the root) under `prefix`, in
    /// store order.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let location = self.location(prefix);
        let mut stream = self.store.list(Some(&location));
        let mut paths = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta?;
            let full = meta.location.to_string();
            let relative = full
                .strip_prefix(&format!("{}/", self.root))
                .unwrap_or(&full)
                .to_string();
            paths.push(relative);
        }
        Ok(paths)
    }

    /// Delete every object under `prefix`. Returns the number removed.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64, BlobError> {
        let paths = self.list(prefix).await?;
        let mut removed = 0u64;
        for path in &paths {
            self.store.delete(&self.location(path)).await?;
            removed += 1;
        }
        Ok(removed)
    }

    pub async fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.store.delete(&self.location(path)).await?;
        Ok(())
    }

    /// Derived public URL for an object path. Purely syntactic; the
    /// object need not exist.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.root, path.trim_matches('/'))
    }
}

/// Restrict a user-supplied file name to `[A-Za-z0-9.]`, replacing
/// everything else with `_`. Keeps object paths flat and predictable.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect()
}
