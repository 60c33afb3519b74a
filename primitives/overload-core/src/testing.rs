//! In-memory collaborators for tests.

use crate::action::{ActionTemplate, Presence};
use crate::api::{ApiError, DndState, OAuthExchange, OAuthGrant, StatusApi};
use crate::apply::SubOperation;
use crate::store::{
    Credential, CredentialStore, CredentialTags, StoreError, TemplateStore, User, UserStore,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

pub fn credential(external_id: &str) -> Credential {
    Credential {
        external_id: external_id.to_string(),
        access_token: format!("xoxp-{external_id}"),
        tags: CredentialTags {
            user_id: format!("user-{external_id}"),
            team_id: format!("T-{external_id}"),
            scopes: "dnd:read,dnd:write".to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    SetPresence(Presence),
    SetStatus {
        text: String,
        emoji: String,
        expiry_minutes: u64,
    },
    DndInfo,
    StartSnooze(u64),
    EndSnooze,
}

/// Records every call per Slack user and fails the ones it is told to.
#[derive(Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<(String, ApiCall)>>,
    snoozed: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<(String, SubOperation)>>,
}

impl RecordingApi {
    pub fn set_snoozed(&self, external_id: &str) {
        self.snoozed.lock().unwrap().insert(external_id.to_string());
    }

    pub fn fail(&self, external_id: &str, operation: SubOperation) {
        self.failing
            .lock()
            .unwrap()
            .insert((external_id.to_string(), operation));
    }

    pub fn calls_for(&self, external_id: &str) -> Vec<ApiCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == external_id)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn all_calls(&self) -> Vec<(String, ApiCall)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(
        &self,
        credential: &Credential,
        operation: SubOperation,
        method: &'static str,
        call: ApiCall,
    ) -> Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((credential.external_id.clone(), call));

        let key = (credential.external_id.clone(), operation);
        if self.failing.lock().unwrap().contains(&key) {
            return Err(ApiError::Rejected {
                method,
                code: "invalid_auth".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StatusApi for RecordingApi {
    async fn set_presence(&self, credential: &Credential, presence: Presence) -> Result<(), ApiError> {
        self.record(
            credential,
            SubOperation::Presence,
            "users.setPresence",
            ApiCall::SetPresence(presence),
        )
    }

    async fn set_custom_status(
        &self,
        credential: &Credential,
        text: &str,
        emoji: &str,
        expiry_minutes: u64,
    ) -> Result<(), ApiError> {
        self.record(
            credential,
            SubOperation::Status,
            "users.profile.set",
            ApiCall::SetStatus {
                text: text.to_string(),
                emoji: emoji.to_string(),
                expiry_minutes,
            },
        )
    }

    async fn dnd_state(&self, credential: &Credential) -> Result<DndState, ApiError> {
        self.record(credential, SubOperation::DoNotDisturb, "dnd.info", ApiCall::DndInfo)?;
        let snooze_enabled = self
            .snoozed
            .lock()
            .unwrap()
            .contains(&credential.external_id);
        Ok(DndState { snooze_enabled })
    }

    async fn start_snooze(&self, credential: &Credential, minutes: u64) -> Result<(), ApiError> {
        self.record(
            credential,
            SubOperation::DoNotDisturb,
            "dnd.setSnooze",
            ApiCall::StartSnooze(minutes),
        )?;
        self.snoozed
            .lock()
            .unwrap()
            .insert(credential.external_id.clone());
        Ok(())
    }

    async fn end_snooze(&self, credential: &Credential) -> Result<(), ApiError> {
        self.record(
            credential,
            SubOperation::DoNotDisturb,
            "dnd.endSnooze",
            ApiCall::EndSnooze,
        )?;
        self.snoozed.lock().unwrap().remove(&credential.external_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCredentials {
    credentials: Mutex<HashMap<String, Credential>>,
}

impl MemoryCredentials {
    pub fn with(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let store = Self::default();
        {
            let mut map = store.credentials.lock().unwrap();
            for credential in credentials {
                map.insert(credential.external_id.clone(), credential);
            }
        }
        store
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn get(&self, external_id: &str) -> Result<Credential, StoreError> {
        self.credentials
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: format!("oauth-{external_id}"),
            })
    }

    async fn set(&self, credential: &Credential) -> Result<(), StoreError> {
        self.credentials
            .lock()
            .unwrap()
            .insert(credential.external_id.clone(), credential.clone());
        Ok(())
    }
}

/// Trigger store that counts reads, and can be told to fail them.
#[derive(Default)]
pub struct MemoryTemplates {
    templates: Mutex<BTreeMap<(String, String), ActionTemplate>>,
    reads: Mutex<usize>,
    broken: Mutex<bool>,
}

impl MemoryTemplates {
    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }

    pub fn break_reads(&self) {
        *self.broken.lock().unwrap() = true;
    }

    pub fn stored(&self, user_id: &str, name: &str) -> Option<ActionTemplate> {
        self.templates
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplates {
    async fn get(&self, user_id: &str, name: &str) -> Result<ActionTemplate, StoreError> {
        *self.reads.lock().unwrap() += 1;
        let key = format!("{user_id}/{name}");
        if *self.broken.lock().unwrap() {
            return Err(StoreError::transport("read", key, "connection reset"));
        }
        self.stored(user_id, name)
            .ok_or(StoreError::NotFound { key })
    }

    async fn put(&self, user_id: &str, template: &ActionTemplate) -> Result<(), StoreError> {
        self.templates
            .lock()
            .unwrap()
            .insert((user_id.to_string(), template.name.clone()), template.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str, name: &str) -> Result<(), StoreError> {
        self.templates
            .lock()
            .unwrap()
            .remove(&(user_id.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                key: format!("{user_id}/{name}"),
            })
    }

    async fn list(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        *self.reads.lock().unwrap() += 1;
        Ok(self
            .templates
            .lock()
            .unwrap()
            .keys()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, name)| name.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<String, User>>,
    broken: Mutex<bool>,
}

impl MemoryUsers {
    pub fn with(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::default();
        {
            let mut map = store.users.lock().unwrap();
            for user in users {
                map.insert(user.id.clone(), user);
            }
        }
        store
    }

    pub fn break_writes(&self) {
        *self.broken.lock().unwrap() = true;
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn get(&self, user_id: &str) -> Result<User, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| User::new(user_id)))
    }

    async fn put(&self, user: &User) -> Result<(), StoreError> {
        if *self.broken.lock().unwrap() {
            return Err(StoreError::transport("save", &user.id, "disk full"));
        }
        self.users
            .lock()
            .unwrap()
            .insert(user.id.clone(), user.clone());
        Ok(())
    }
}

/// Hands out a fixed grant for any code.
pub struct FixedExchange(pub OAuthGrant);

#[async_trait]
impl OAuthExchange for FixedExchange {
    async fn exchange(&self, code: &str) -> Result<OAuthGrant, ApiError> {
        if code.is_empty() {
            return Err(ApiError::Rejected {
                method: "oauth.v2.access",
                code: "invalid_code".to_string(),
            });
        }
        Ok(self.0.clone())
    }
}
