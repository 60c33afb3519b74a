//! Desired presence state and the named triggers that store it.

use crate::duration::TriggerDuration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Presence reported to Slack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    #[serde(rename = "away")]
    Away,
    /// Slack calls this `auto`: presence follows the user's activity.
    #[default]
    #[serde(rename = "auto")]
    Active,
}

impl Presence {
    pub fn as_str(self) -> &'static str {
        match self {
            Presence::Away => "away",
            Presence::Active => "auto",
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of the presence, status and do-not-disturb state to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub presence: Presence,

    #[serde(rename = "status-text", default, skip_serializing_if = "String::is_empty")]
    pub status_text: String,

    #[serde(rename = "status-emoji", default, skip_serializing_if = "String::is_empty")]
    pub status_emoji: String,

    #[serde(rename = "dnd", default, skip_serializing_if = "std::ops::Not::not")]
    pub do_not_disturb: bool,

    #[serde(default, skip_serializing_if = "TriggerDuration::is_empty")]
    pub duration: TriggerDuration,
}

impl Action {
    /// The action behind `/clear-status`: active, no status, no snooze.
    pub fn clear() -> Self {
        Self {
            presence: Presence::Active,
            ..Self::default()
        }
    }

    /// Minutes to snooze for. Zero unless do-not-disturb was requested.
    pub fn snooze_minutes(&self) -> u64 {
        if self.do_not_disturb {
            self.duration.minutes()
        } else {
            0
        }
    }

    /// Minutes until the custom status clears itself, zero for never.
    pub fn status_expiry_minutes(&self) -> u64 {
        self.duration.minutes()
    }
}

/// A named, persisted action owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub name: String,

    /// Slack team the trigger was created from.
    #[serde(rename = "team", default)]
    pub team_id: String,

    pub action: Action,
}

impl fmt::Display for ActionTemplate {
    /// One-line summary in the same shape as a definition:
    /// `name = [text] [(emoji)] [DND] [for duration]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = &self.action;
        write!(f, "{} =", self.name)?;
        if !action.status_text.is_empty() {
            write!(f, " {}", action.status_text)?;
        }
        if !action.status_emoji.is_empty() {
            write!(f, " ({})", action.status_emoji)?;
        }
        if action.do_not_disturb {
            f.write_str(" DND")?;
        }
        if !action.duration.is_empty() {
            write!(f, " for {}", action.duration)?;
        }
        Ok(())
    }
}
