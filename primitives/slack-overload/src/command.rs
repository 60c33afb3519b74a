//! The form Slack posts for a slash command.

use overload_core::Caller;
use serde::Deserialize;

/// Fields of a slash command payload this service reads. Slack sends more.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlashCommand {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    pub team_id: String,
    #[serde(default)]
    pub team_domain: String,
    #[serde(default)]
    pub text: String,
}

impl SlashCommand {
    pub fn caller(&self) -> Caller {
        Caller {
            external_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            team_id: self.team_id.clone(),
            team_name: self.team_domain.clone(),
        }
    }
}
