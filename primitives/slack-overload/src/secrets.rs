//! File-backed secret vault holding Slack user tokens.
//!
//! Each token lives in `{root}/oauth-{slack_id}.json` next to its tags and is
//! written owner-readable only.

use crate::storage::{TempFile, bounded, check_key};
use async_trait::async_trait;
use overload_core::{Credential, CredentialStore, CredentialTags, StoreError};
use serde::{Deserialize, Serialize};
use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs, io::AsyncWriteExt};

#[derive(Serialize, Deserialize)]
struct SecretEntry {
    value: String,
    #[serde(default)]
    tags: CredentialTags,
}

/// Vault rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileVault {
    root: PathBuf,
    timeout: Duration,
}

impl FileVault {
    pub async fn open(root: impl Into<PathBuf>, timeout: Duration) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, timeout })
    }

    fn secret_name(external_id: &str) -> String {
        format!("oauth-{external_id}")
    }

    fn secret_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        check_key(name)?;
        if name.contains('/') {
            return Err(StoreError::transport(
                "resolve",
                name,
                "secret names cannot be nested",
            ));
        }
        Ok(self.root.join(format!("{name}.json")))
    }
}

#[cfg(unix)]
async fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let temp = TempFile::beside(path);
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(temp.path())
        .await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    temp.persist(path).await
}

#[cfg(not(unix))]
async fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    crate::storage::write_atomically(path, data).await
}

#[async_trait]
impl CredentialStore for FileVault {
    async fn get(&self, external_id: &str) -> Result<Credential, StoreError> {
        let name = Self::secret_name(external_id);
        let path = self.secret_path(&name)?;
        let bytes = bounded(self.timeout, "load secret", &name, fs::read(&path)).await?;
        let entry: SecretEntry =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                key: name.clone(),
                source,
            })?;

        Ok(Credential {
            external_id: external_id.to_string(),
            access_token: entry.value,
            tags: entry.tags,
        })
    }

    async fn set(&self, credential: &Credential) -> Result<(), StoreError> {
        let name = Self::secret_name(&credential.external_id);
        let path = self.secret_path(&name)?;
        let entry = SecretEntry {
            value: credential.access_token.clone(),
            tags: credential.tags.clone(),
        };
        let data = serde_json::to_vec(&entry).map_err(|e| StoreError::transport("encode", &name, e))?;
        bounded(self.timeout, "save secret", &name, write_private(&path, &data)).await
    }
}
