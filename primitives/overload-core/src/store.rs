//! Persistence seams: triggers, user records and access credentials.
//!
//! Every entity is an independent read-modify-write blob. There is no
//! multi-key transaction, so two concurrent edits by the same user can race.

use crate::action::ActionTemplate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed source error for collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{key} was not found")]
    NotFound { key: String },

    #[error("could not {operation} {key}")]
    Transport {
        operation: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("could not decode {key}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn transport(operation: &'static str, key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StoreError::Transport {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }
}

/// Persisted triggers, namespaced by internal user id.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get(&self, user_id: &str, name: &str) -> Result<ActionTemplate, StoreError>;

    /// Creates or overwrites the trigger with the template's name.
    async fn put(&self, user_id: &str, template: &ActionTemplate) -> Result<(), StoreError>;

    async fn delete(&self, user_id: &str, name: &str) -> Result<(), StoreError>;

    /// Names of every trigger the user owns, sorted.
    async fn list(&self, user_id: &str) -> Result<Vec<String>, StoreError>;
}

/// One Slack account linked to an internal user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedIdentity {
    #[serde(rename = "id")]
    pub external_id: String,

    #[serde(rename = "team")]
    pub team_id: String,
}

/// An internal user and the Slack accounts linked to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    #[serde(rename = "slack-users", default)]
    pub identities: Vec<LinkedIdentity>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            identities: Vec::new(),
        }
    }

    /// Links another account. Returns false if it was already linked.
    pub fn link(&mut self, external_id: &str, team_id: &str) -> bool {
        if self.identities.iter().any(|i| i.external_id == external_id) {
            return false;
        }
        self.identities.push(LinkedIdentity {
            external_id: external_id.to_string(),
            team_id: team_id.to_string(),
        });
        true
    }
}

/// Whether `id` can name a user record: 1 to 64 ASCII letters, digits, `-`
/// or `_`. Generated ids are UUIDs.
pub fn is_valid_user_id(id: &str) -> bool {
    (1..=64).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// User records keyed by internal user id.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns an empty user, not an error, when no record exists.
    async fn get(&self, user_id: &str) -> Result<User, StoreError>;

    async fn put(&self, user: &User) -> Result<(), StoreError>;
}

/// Tags stored alongside an access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialTags {
    /// Internal user that owns the Slack account.
    #[serde(rename = "user", default)]
    pub user_id: String,

    #[serde(rename = "team", default)]
    pub team_id: String,

    #[serde(default)]
    pub scopes: String,
}

/// A Slack user token and its ownership tags.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub external_id: String,
    pub access_token: String,
    pub tags: CredentialTags,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("external_id", &self.external_id)
            .field("access_token", &"<redacted>")
            .field("tags", &self.tags)
            .finish()
    }
}

/// Access tokens keyed by Slack user id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, external_id: &str) -> Result<Credential, StoreError>;

    /// Creates or overwrites the credential for `credential.external_id`.
    async fn set(&self, credential: &Credential) -> Result<(), StoreError>;
}
