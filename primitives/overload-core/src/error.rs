//! Errors surfaced by the slash commands.

use crate::api::ApiError;
use crate::fanout::FanOutError;
use crate::store::StoreError;
use crate::template::TemplateError;
use std::error::Error as StdError;
use thiserror::Error;

/// How an error should be presented to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; shown verbatim with a hint.
    UserInput,
    /// The caller has not linked a Slack account.
    Unauthorized,
    /// Storage, vault or Slack failed; shown as a generic failure.
    Transport,
    /// Some linked accounts were updated and some were not.
    PartialFanOut,
}

#[derive(Debug, Error)]
pub enum OverloadError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Please name a trigger, for example `/{command} vacation`")]
    MissingTriggerName { command: &'static str },

    #[error("trigger {name} not registered")]
    TriggerNotRegistered { name: String },

    #[error("Could not delete trigger {name:?} because it is not defined")]
    TriggerNotDefined { name: String },

    #[error("Slack user {external_id} has not authorized the Slack Overload app")]
    NotLinked { external_id: String },

    #[error("user {user_id} has no linked Slack accounts")]
    NoLinkedAccounts { user_id: String },

    #[error("{context}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("could not exchange the authorization code")]
    OAuth(#[source] ApiError),

    #[error(transparent)]
    FanOut(#[from] FanOutError),
}

impl OverloadError {
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        OverloadError::Store {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OverloadError::Template(_)
            | OverloadError::MissingTriggerName { .. }
            | OverloadError::TriggerNotRegistered { .. }
            | OverloadError::TriggerNotDefined { .. } => ErrorKind::UserInput,
            OverloadError::NotLinked { .. } | OverloadError::NoLinkedAccounts { .. } => {
                ErrorKind::Unauthorized
            }
            OverloadError::Store { .. } | OverloadError::OAuth(_) => ErrorKind::Transport,
            OverloadError::FanOut(_) => ErrorKind::PartialFanOut,
        }
    }
}

/// Renders an error and all of its sources as `outer: inner: root`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
