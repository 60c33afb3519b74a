//! Overload Core - Status Triggers for Slack
//!
//! Users define named triggers such as
//!
//! ```text
//! vacation = On a boat! (⛵) DND for 1w
//! ```
//!
//! and later fire them by name. Firing a trigger sets presence, custom status
//! and do-not-disturb on every Slack account linked to the user, concurrently,
//! and reports each account that could not be updated.
//!
//! Storage, the secret vault and the Slack Web API sit behind the traits in
//! [`store`] and [`api`], so the binary decides where things live.

pub mod action;
pub mod api;
pub mod app;
pub mod apply;
pub mod duration;
pub mod error;
pub mod fanout;
pub mod store;
pub mod template;

#[cfg(test)]
mod testing;

pub use action::{Action, ActionTemplate, Presence};
pub use api::{ApiError, DndState, OAuthExchange, OAuthGrant, StatusApi};
pub use app::{Caller, Collaborators, Overload, Reply, Settings};
pub use apply::{ActionApplier, ApplyError, SubOperation};
pub use duration::{DurationError, TriggerDuration, parse_duration};
pub use error::{ErrorKind, OverloadError, error_chain};
pub use fanout::{FanOut, FanOutError};
pub use store::{
    BoxError, Credential, CredentialStore, CredentialTags, LinkedIdentity, StoreError,
    TemplateStore, User, UserStore, is_valid_user_id,
};
pub use template::{TemplateError, parse_template};
