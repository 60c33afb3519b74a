//! Applies one action to one Slack account.

use crate::action::Action;
use crate::api::{ApiError, StatusApi};
use crate::error::error_chain;
use crate::store::Credential;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, info};

/// The independent mutations made for every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubOperation {
    Presence,
    Status,
    DoNotDisturb,
}

impl fmt::Display for SubOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubOperation::Presence => "set presence",
            SubOperation::Status => "set status",
            SubOperation::DoNotDisturb => "update do not disturb",
        })
    }
}

/// One sub-operation that failed.
#[derive(Debug, Error)]
#[error("could not {operation}")]
pub struct SubOperationFailure {
    pub operation: SubOperation,
    #[source]
    pub source: ApiError,
}

/// The sub-operations that failed for one account. The others went through.
#[derive(Debug, Error)]
pub struct ApplyError {
    pub failures: Vec<SubOperationFailure>,
}

impl ApplyError {
    pub fn failed(&self, operation: SubOperation) -> bool {
        self.failures.iter().any(|f| f.operation == operation)
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.failures.iter().map(|e| error_chain(e)).collect();
        f.write_str(&parts.join("; "))
    }
}

/// Issues the presence, status and do-not-disturb calls for an action.
#[derive(Clone)]
pub struct ActionApplier {
    api: Arc<dyn StatusApi>,
    debug: bool,
}

impl ActionApplier {
    pub fn new(api: Arc<dyn StatusApi>, debug: bool) -> Self {
        Self { api, debug }
    }

    /// Runs all three sub-operations concurrently and waits for every one.
    ///
    /// Nothing is rolled back: a failed status update leaves a successful
    /// presence update in place.
    pub async fn apply(&self, credential: &Credential, action: &Action) -> Result<(), ApplyError> {
        if self.debug {
            info!(
                slack_id = %credential.external_id,
                team_id = %credential.tags.team_id,
                ?action,
                "updating slack status"
            );
        }

        let (presence, status, dnd) = tokio::join!(
            self.api.set_presence(credential, action.presence),
            self.api.set_custom_status(
                credential,
                &action.status_text,
                &action.status_emoji,
                action.status_expiry_minutes(),
            ),
            self.sync_do_not_disturb(credential, action),
        );

        let failures: Vec<SubOperationFailure> = [
            (SubOperation::Presence, presence),
            (SubOperation::Status, status),
            (SubOperation::DoNotDisturb, dnd),
        ]
        .into_iter()
        .filter_map(|(operation, result)| {
            result
                .err()
                .map(|source| SubOperationFailure { operation, source })
        })
        .collect();

        if failures.is_empty() {
            debug!(slack_id = %credential.external_id, "slack status updated");
            Ok(())
        } else {
            Err(ApplyError { failures })
        }
    }

    /// Snoozes when asked to. Otherwise ends a snooze, but only one that is
    /// actually running.
    async fn sync_do_not_disturb(&self, credential: &Credential, action: &Action) -> Result<(), ApiError> {
        if action.do_not_disturb {
            return self.api.start_snooze(credential, action.snooze_minutes()).await;
        }

        let state = self.api.dnd_state(credential).await?;
        if state.snooze_enabled {
            self.api.end_snooze(credential).await?;
        }
        Ok(())
    }
}
