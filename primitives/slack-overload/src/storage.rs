//! Directory-backed blob containers for triggers and user records.
//!
//! ```text
//! {root}/triggers/{user_id}/{trigger}.json
//! {root}/users/{user_id}.json
//! ```

use async_trait::async_trait;
use overload_core::{ActionTemplate, StoreError, TemplateStore, User, UserStore};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::fs;

const TRIGGERS: &str = "triggers";
const USERS: &str = "users";

static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);

/// Runs a filesystem operation under `timeout`, mapping a missing file to
/// [`StoreError::NotFound`].
pub(crate) async fn bounded<T>(
    timeout: Duration,
    operation: &'static str,
    key: &str,
    work: impl Future<Output = io::Result<T>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
            key: key.to_string(),
        }),
        Ok(Err(e)) => Err(StoreError::transport(operation, key, e)),
        Err(elapsed) => Err(StoreError::transport(operation, key, elapsed)),
    }
}

/// Rejects keys that could escape their container.
pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });

    if valid {
        Ok(())
    } else {
        Err(StoreError::transport(
            "resolve",
            key,
            format!("{key:?} is not a valid storage key"),
        ))
    }
}

/// A temporary sibling of `target`, removed on drop unless persisted.
///
/// Dropping also covers a write abandoned by a storage timeout.
pub(crate) struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    pub(crate) fn beside(target: &Path) -> Self {
        let path = target.with_extension(format!(
            "tmp-{}-{}",
            std::process::id(),
            NEXT_TEMP.fetch_add(1, Ordering::Relaxed)
        ));
        Self {
            path,
            persisted: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Renames the temporary file over `target`.
    pub(crate) async fn persist(mut self, target: &Path) -> io::Result<()> {
        fs::rename(&self.path, target).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Writes through a temporary sibling so readers never see half a blob.
pub(crate) async fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp = TempFile::beside(path);
    fs::write(temp.path(), data).await?;
    temp.persist(path).await
}

/// Blob storage rooted at a directory, one subdirectory per container.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    timeout: Duration,
}

impl BlobStore {
    pub async fn open(root: impl Into<PathBuf>, timeout: Duration) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(TRIGGERS)).await?;
        fs::create_dir_all(root.join(USERS)).await?;
        Ok(Self { root, timeout })
    }

    fn blob_path(&self, container: &str, key: &str) -> Result<PathBuf, StoreError> {
        check_key(key)?;
        Ok(self.root.join(container).join(format!("{key}.json")))
    }

    async fn get_blob<T: DeserializeOwned>(&self, container: &str, key: &str) -> Result<T, StoreError> {
        let path = self.blob_path(container, key)?;
        let bytes = bounded(self.timeout, "read", key, fs::read(&path)).await?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            key: format!("{container}/{key}"),
            source,
        })
    }

    async fn set_blob<T: Serialize>(&self, container: &str, key: &str, value: &T) -> Result<(), StoreError> {
        let path = self.blob_path(container, key)?;
        let data = serde_json::to_vec(value).map_err(|e| StoreError::transport("encode", key, e))?;
        bounded(self.timeout, "save", key, write_atomically(&path, &data)).await
    }

    async fn delete_blob(&self, container: &str, key: &str) -> Result<(), StoreError> {
        let path = self.blob_path(container, key)?;
        bounded(self.timeout, "delete", key, fs::remove_file(&path)).await
    }

    /// Names of the blobs directly under `prefix`, without extension, sorted.
    async fn list_container(&self, container: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        check_key(prefix)?;
        let dir = self.root.join(container).join(prefix);

        let listing = async {
            let mut names = Vec::new();
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
            names.sort();
            Ok::<_, io::Error>(names)
        };

        match bounded(self.timeout, "list", prefix, listing).await {
            Err(StoreError::NotFound { .. }) => Ok(Vec::new()),
            result => result,
        }
    }
}

#[async_trait]
impl TemplateStore for BlobStore {
    async fn get(&self, user_id: &str, name: &str) -> Result<ActionTemplate, StoreError> {
        self.get_blob(TRIGGERS, &format!("{user_id}/{name}")).await
    }

    async fn put(&self, user_id: &str, template: &ActionTemplate) -> Result<(), StoreError> {
        self.set_blob(TRIGGERS, &format!("{user_id}/{}", template.name), template)
            .await
    }

    async fn delete(&self, user_id: &str, name: &str) -> Result<(), StoreError> {
        self.delete_blob(TRIGGERS, &format!("{user_id}/{name}")).await
    }

    async fn list(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.list_container(TRIGGERS, user_id).await
    }
}

#[async_trait]
impl UserStore for BlobStore {
    async fn get(&self, user_id: &str) -> Result<User, StoreError> {
        match self.get_blob(USERS, user_id).await {
            Err(StoreError::NotFound { .. }) => Ok(User::new(user_id)),
            result => result,
        }
    }

    async fn put(&self, user: &User) -> Result<(), StoreError> {
        if user.id.is_empty() {
            return Err(StoreError::transport("save", "users", "cannot save user, no ID was given"));
        }
        self.set_blob(USERS, &user.id, user).await
    }
}
