//! Slack-facing seams: status mutations and the OAuth code exchange.

use crate::action::Presence;
use crate::store::{BoxError, Credential};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from the external status API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered but refused the call.
    #[error("{method} failed: {code}")]
    Rejected { method: &'static str, code: String },

    /// The call never got an answer.
    #[error("{method} request failed")]
    Transport {
        method: &'static str,
        #[source]
        source: BoxError,
    },
}

/// Do-not-disturb state of one Slack account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DndState {
    pub snooze_enabled: bool,
}

/// Presence, custom status and snooze calls made on behalf of one account.
#[async_trait]
pub trait StatusApi: Send + Sync {
    async fn set_presence(&self, credential: &Credential, presence: Presence) -> Result<(), ApiError>;

    /// `expiry_minutes` of zero keeps the status until it is changed.
    async fn set_custom_status(
        &self,
        credential: &Credential,
        text: &str,
        emoji: &str,
        expiry_minutes: u64,
    ) -> Result<(), ApiError>;

    async fn dnd_state(&self, credential: &Credential) -> Result<DndState, ApiError>;

    async fn start_snooze(&self, credential: &Credential, minutes: u64) -> Result<(), ApiError>;

    async fn end_snooze(&self, credential: &Credential) -> Result<(), ApiError>;
}

/// What a completed OAuth exchange grants.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthGrant {
    pub external_id: String,
    pub team_id: String,
    pub team_name: String,
    pub access_token: String,
    pub scopes: String,
}

impl std::fmt::Debug for OAuthGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthGrant")
            .field("external_id", &self.external_id)
            .field("team_id", &self.team_id)
            .field("team_name", &self.team_name)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Trades an authorization code for a user token.
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    async fn exchange(&self, code: &str) -> Result<OAuthGrant, ApiError>;
}
