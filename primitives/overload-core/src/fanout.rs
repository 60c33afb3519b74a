//! Applies one action to every Slack account linked to a user.
//!
//! One task runs per linked account with no cap on parallelism. Users link a
//! handful of workspaces, so the number of concurrent Slack calls stays small;
//! a user with hundreds of links would open hundreds of requests at once.

use crate::action::Action;
use crate::apply::{ActionApplier, ApplyError};
use crate::error::error_chain;
use crate::store::{CredentialStore, LinkedIdentity, StoreError};
use futures::future::join_all;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::warn;

/// Why one linked account was not updated.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("could not load its access token")]
    Credential(#[source] StoreError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// A linked account that failed, with the team it belongs to.
#[derive(Debug)]
pub struct IdentityFailure {
    pub identity: LinkedIdentity,
    pub error: IdentityError,
}

/// Every linked account that failed. Accounts not listed were updated.
#[derive(Debug, Error)]
pub struct FanOutError {
    pub attempted: usize,
    pub failures: Vec<IdentityFailure>,
}

impl fmt::Display for FanOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not update {} of {} linked Slack accounts",
            self.failures.len(),
            self.attempted
        )?;
        for failure in &self.failures {
            write!(
                f,
                "\n• {} on team {}: {}",
                failure.identity.external_id,
                failure.identity.team_id,
                error_chain(&failure.error)
            )?;
        }
        Ok(())
    }
}

/// Fans an action out across linked accounts.
#[derive(Clone)]
pub struct FanOut {
    credentials: Arc<dyn CredentialStore>,
    applier: ActionApplier,
}

impl FanOut {
    pub fn new(credentials: Arc<dyn CredentialStore>, applier: ActionApplier) -> Self {
        Self {
            credentials,
            applier,
        }
    }

    /// Applies `action` to every identity and waits for all of them.
    ///
    /// No identities is not an error here; callers decide whether an
    /// unlinked user is a problem.
    pub async fn apply(&self, identities: &[LinkedIdentity], action: &Action) -> Result<(), FanOutError> {
        let results = join_all(
            identities
                .iter()
                .map(|identity| self.apply_to_identity(identity, action)),
        )
        .await;

        let failures: Vec<IdentityFailure> = identities
            .iter()
            .zip(results)
            .filter_map(|(identity, result)| {
                result.err().map(|error| {
                    warn!(
                        slack_id = %identity.external_id,
                        team_id = %identity.team_id,
                        error = %error_chain(&error),
                        "linked account was not updated"
                    );
                    IdentityFailure {
                        identity: identity.clone(),
                        error,
                    }
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FanOutError {
                attempted: identities.len(),
                failures,
            })
        }
    }

    async fn apply_to_identity(&self, identity: &LinkedIdentity, action: &Action) -> Result<(), IdentityError> {
        let credential = self
            .credentials
            .get(&identity.external_id)
            .await
            .map_err(IdentityError::Credential)?;

        self.applier.apply(&credential, action).await?;
        Ok(())
    }
}
