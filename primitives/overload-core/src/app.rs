//! The slash commands, wired to the stores and the Slack API.

use crate::action::{Action, ActionTemplate};
use crate::api::{OAuthExchange, StatusApi};
use crate::apply::ActionApplier;
use crate::error::{ErrorKind, OverloadError, error_chain};
use crate::fanout::FanOut;
use crate::store::{
    Credential, CredentialStore, CredentialTags, StoreError, TemplateStore, User, UserStore,
    is_valid_user_id,
};
use crate::template::{DEFINITION_EXAMPLE, is_valid_trigger_name, parse_template};
use std::sync::Arc;
use tracing::{error, info, warn};

const AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";
const USER_SCOPES: &str = "dnd:read,dnd:write,users:write,users.profile:write";

/// The Slack account that sent a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub external_id: String,
    pub user_name: String,
    pub team_id: String,
    pub team_name: String,
}

/// A message for the caller: a markdown line, optionally followed by items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub items: Vec<String>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            items: Vec::new(),
        }
    }
}

/// Settings that shape replies and logging.
#[derive(Debug, Clone)]
pub struct Settings {
    /// OAuth client id used in account-linking links.
    pub client_id: String,
    /// Where new users are sent to get started.
    pub landing_url: String,
    pub debug: bool,
}

/// Everything the commands talk to.
pub struct Collaborators {
    pub templates: Arc<dyn TemplateStore>,
    pub users: Arc<dyn UserStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub status_api: Arc<dyn StatusApi>,
    pub oauth: Arc<dyn OAuthExchange>,
}

/// Runs the slash commands.
pub struct Overload {
    templates: Arc<dyn TemplateStore>,
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialStore>,
    oauth: Arc<dyn OAuthExchange>,
    fan_out: FanOut,
    settings: Settings,
}

impl Overload {
    pub fn new(collaborators: Collaborators, settings: Settings) -> Self {
        let applier = ActionApplier::new(collaborators.status_api, settings.debug);
        let fan_out = FanOut::new(collaborators.credentials.clone(), applier);
        Self {
            templates: collaborators.templates,
            users: collaborators.users,
            credentials: collaborators.credentials,
            oauth: collaborators.oauth,
            fan_out,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// `/trigger NAME`: applies a stored trigger to every linked account.
    pub async fn trigger(&self, caller: &Caller, name: &str) -> Result<Reply, OverloadError> {
        log_command("trigger", caller, name);
        let name = name.trim();
        if name.is_empty() {
            return Err(OverloadError::MissingTriggerName { command: "trigger" });
        }

        let user_id = self.lookup_user_id(caller).await?;
        let template = self.load_trigger(&user_id, name).await?;
        self.apply_to_all(&user_id, &template.action).await?;

        Ok(Reply::text(format!(
            "Triggered *{}* {}",
            template.name, template.action.status_emoji
        )))
    }

    /// `/create-trigger DEFINITION`: parses and stores a trigger, replacing
    /// any trigger with the same name.
    pub async fn create_trigger(&self, caller: &Caller, definition: &str) -> Result<Reply, OverloadError> {
        log_command("create-trigger", caller, definition);
        let user_id = self.lookup_user_id(caller).await?;

        let mut template = parse_template(definition.trim())?;
        template.team_id = caller.team_id.clone();

        self.templates
            .put(&user_id, &template)
            .await
            .map_err(|e| OverloadError::store(format!("could not save trigger {}", template.name), e))?;

        Ok(Reply::text(format!("Created trigger *{}*", template.name)))
    }

    /// `/delete-trigger NAME`
    pub async fn delete_trigger(&self, caller: &Caller, name: &str) -> Result<Reply, OverloadError> {
        log_command("delete-trigger", caller, name);
        let name = name.trim();
        if name.is_empty() {
            return Err(OverloadError::MissingTriggerName {
                command: "delete-trigger",
            });
        }

        let user_id = self.lookup_user_id(caller).await?;
        let not_defined = || OverloadError::TriggerNotDefined {
            name: name.to_string(),
        };
        if !is_valid_trigger_name(name) {
            return Err(not_defined());
        }

        match self.templates.delete(&user_id, name).await {
            Ok(()) => Ok(Reply::text(format!("Deleted trigger *{name}*"))),
            Err(e) if e.is_not_found() => Err(not_defined()),
            Err(e) => Err(OverloadError::store(format!("could not delete trigger {name}"), e)),
        }
    }

    /// `/list-triggers`: one summary line per trigger.
    pub async fn list_triggers(&self, caller: &Caller) -> Result<Reply, OverloadError> {
        log_command("list-triggers", caller, "");
        let user_id = self.lookup_user_id(caller).await?;

        let names = self
            .templates
            .list(&user_id)
            .await
            .map_err(|e| OverloadError::store("could not list triggers", e))?;

        let mut items = Vec::with_capacity(names.len());
        for name in names {
            match self.templates.get(&user_id, &name).await {
                Ok(template) => items.push(template.to_string()),
                // Deleted since it was listed.
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    return Err(OverloadError::store(format!("could not load trigger {name}"), e));
                }
            }
        }

        if items.is_empty() {
            return Ok(Reply::text(format!(
                "You haven't defined any triggers yet. Try `{DEFINITION_EXAMPLE}`"
            )));
        }

        Ok(Reply {
            text: "Here are the triggers that you have defined:".to_string(),
            items,
        })
    }

    /// `/clear-status`: back to active with no status and no snooze. Never
    /// touches stored triggers.
    pub async fn clear_status(&self, caller: &Caller) -> Result<Reply, OverloadError> {
        log_command("clear-status", caller, "");
        let user_id = self.lookup_user_id(caller).await?;
        self.apply_to_all(&user_id, &Action::clear()).await?;

        Ok(Reply::text("Your status has been cleared :boom:"))
    }

    /// `/link-slack`: a link that attaches another Slack account to the
    /// caller's user.
    pub async fn link_slack(&self, caller: &Caller) -> Result<Reply, OverloadError> {
        log_command("link-slack", caller, "");
        let user_id = self.lookup_user_id(caller).await?;

        Ok(Reply::text(format!(
            "Click the link below to associate another Slack account with this account.\n\n<{}|Link Slack Account>",
            self.authorize_url(&user_id)
        )))
    }

    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?scope=commands&user_scope={USER_SCOPES}&client_id={}&state={state}",
            self.settings.client_id
        )
    }

    /// Completes an OAuth flow and returns the internal user id the account
    /// now belongs to.
    ///
    /// An account that is already linked keeps its user. Otherwise it joins
    /// `requested_user` (from the link's state or the session), or a new user.
    pub async fn link_account(&self, code: &str, requested_user: Option<&str>) -> Result<String, OverloadError> {
        let grant = self.oauth.exchange(code).await.map_err(OverloadError::OAuth)?;
        info!(
            slack_id = %grant.external_id,
            team_id = %grant.team_id,
            team_name = %grant.team_name,
            "oauth grant received"
        );

        let existing_owner = match self.credentials.get(&grant.external_id).await {
            Ok(existing) => Some(existing.tags.user_id).filter(|id| is_valid_user_id(id)),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                return Err(OverloadError::store(
                    format!("could not look up slack user {}", grant.external_id),
                    e,
                ));
            }
        };
        let requested_user = requested_user.filter(|id| !id.is_empty()).and_then(|id| {
            if is_valid_user_id(id) {
                Some(id.to_string())
            } else {
                warn!(requested_user = ?id, "ignoring malformed user id");
                None
            }
        });
        let user_id = existing_owner
            .or(requested_user)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        // The user record goes first so a stored token always has an owner.
        let mut user = self.load_user(&user_id).await?;
        if user.link(&grant.external_id, &grant.team_id) {
            self.users.put(&user).await.map_err(|e| {
                OverloadError::store(
                    format!("could not save user mapping for {user_id} -> {}", grant.external_id),
                    e,
                )
            })?;
        }

        let credential = Credential {
            external_id: grant.external_id.clone(),
            access_token: grant.access_token,
            tags: CredentialTags {
                user_id: user_id.clone(),
                team_id: grant.team_id.clone(),
                scopes: grant.scopes,
            },
        };
        self.credentials.set(&credential).await.map_err(|e| {
            OverloadError::store(
                format!(
                    "could not save oauth token for {} on {}({})",
                    grant.external_id, grant.team_name, grant.team_id
                ),
                e,
            )
        })?;

        Ok(user_id)
    }

    /// Turns an error into what the caller should see, logging the details.
    pub fn error_reply(&self, err: &OverloadError) -> Reply {
        match err.kind() {
            ErrorKind::UserInput => {
                warn!(error = %error_chain(err), "rejected command");
                Reply::text(err.to_string())
            }
            ErrorKind::Unauthorized => {
                warn!(error = %err, "caller is not linked");
                match err {
                    OverloadError::NoLinkedAccounts { .. } => Reply::text(format!(
                        "Your Slack Overload account has no Slack accounts linked to it yet.\n\nFollow the <{}|QuickStart> to link one.",
                        self.settings.landing_url
                    )),
                    _ => Reply::text(format!(
                        "Your account hasn't activated the Slack Overload app yet.\n\n:heavy_plus_sign: *New Users*\nFollow the <{}|QuickStart> to get started.\n\n:link: *Existing Users*\nRun `/link-slack` from another Slack account that is already activated to link it to this account.",
                        self.settings.landing_url
                    )),
                }
            }
            ErrorKind::PartialFanOut => {
                warn!(error = %error_chain(err), "status was only partly updated");
                Reply::text(err.to_string())
            }
            ErrorKind::Transport => {
                error!(error = %error_chain(err), "command failed");
                Reply::text("Slack Overload could not complete that right now. Please try again later.")
            }
        }
    }

    async fn lookup_user_id(&self, caller: &Caller) -> Result<String, OverloadError> {
        let not_linked = || OverloadError::NotLinked {
            external_id: caller.external_id.clone(),
        };

        match self.credentials.get(&caller.external_id).await {
            Ok(credential) if !is_valid_user_id(&credential.tags.user_id) => Err(not_linked()),
            Ok(credential) => Ok(credential.tags.user_id),
            Err(e) if e.is_not_found() => Err(not_linked()),
            Err(e) => Err(OverloadError::store(
                format!("could not look up slack user {}", caller.external_id),
                e,
            )),
        }
    }

    async fn load_trigger(&self, user_id: &str, name: &str) -> Result<ActionTemplate, OverloadError> {
        let not_registered = || OverloadError::TriggerNotRegistered {
            name: name.to_string(),
        };
        if !is_valid_trigger_name(name) {
            return Err(not_registered());
        }

        match self.templates.get(user_id, name).await {
            Ok(template) => Ok(template),
            Err(StoreError::NotFound { .. }) => Err(not_registered()),
            Err(e) => Err(OverloadError::store(format!("could not load trigger {name}"), e)),
        }
    }

    async fn load_user(&self, user_id: &str) -> Result<User, OverloadError> {
        self.users
            .get(user_id)
            .await
            .map_err(|e| OverloadError::store(format!("could not load user {user_id}"), e))
    }

    async fn apply_to_all(&self, user_id: &str, action: &Action) -> Result<(), OverloadError> {
        let user = self.load_user(user_id).await?;
        if user.identities.is_empty() {
            return Err(OverloadError::NoLinkedAccounts {
                user_id: user_id.to_string(),
            });
        }

        self.fan_out.apply(&user.identities, action).await?;
        Ok(())
    }
}

fn log_command(command: &str, caller: &Caller, argument: &str) {
    info!(
        command,
        argument,
        slack_id = %caller.external_id,
        user_name = %caller.user_name,
        team_id = %caller.team_id,
        team_name = %caller.team_name,
        "slash command"
    );
}
