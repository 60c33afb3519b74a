//! Slack Web API client for status updates and the OAuth exchange.

use async_trait::async_trait;
use overload_core::{ApiError, Credential, DndState, OAuthExchange, OAuthGrant, Presence, StatusApi};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

pub struct SlackClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    debug: bool,
}

impl SlackClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
        debug: bool,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            debug,
        })
    }

    fn post(&self, method: &str) -> RequestBuilder {
        self.http.post(format!("{}/{method}", self.base_url))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let transport = |e: reqwest::Error| ApiError::Transport {
            method,
            source: e.into(),
        };

        let body: Value = request
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        if self.debug {
            info!(method, response = %redact(&body), "slack api response");
        }

        let body = check_response(method, body)?;
        serde_json::from_value(body).map_err(|e| ApiError::Transport {
            method,
            source: e.into(),
        })
    }
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Deserialize)]
struct DndInfoResponse {
    #[serde(default)]
    snooze_enabled: bool,
}

#[derive(Deserialize)]
struct OAuthResponse {
    authed_user: AuthedUser,
    #[serde(default)]
    team: Option<Team>,
}

#[derive(Deserialize)]
struct AuthedUser {
    id: String,
    #[serde(default)]
    scope: String,
    access_token: String,
}

#[derive(Deserialize)]
struct Team {
    id: String,
    #[serde(default)]
    name: String,
}

impl From<OAuthResponse> for OAuthGrant {
    fn from(response: OAuthResponse) -> Self {
        let team = response.team.unwrap_or(Team {
            id: String::new(),
            name: String::new(),
        });
        OAuthGrant {
            external_id: response.authed_user.id,
            team_id: team.id,
            team_name: team.name,
            access_token: response.authed_user.access_token,
            scopes: response.authed_user.scope,
        }
    }
}

/// Slack answers 200 even when a call fails; `ok: false` carries the reason.
fn check_response(method: &'static str, body: Value) -> Result<Value, ApiError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }
    let code = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error")
        .to_string();
    Err(ApiError::Rejected { method, code })
}

/// Unix time a status set now should clear at, or 0 to keep it.
fn status_expiration(minutes: u64, now: u64) -> u64 {
    if minutes == 0 {
        0
    } else {
        now.saturating_add(minutes.saturating_mul(60))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn redact(body: &Value) -> Value {
    let mut body = body.clone();
    if let Some(token) = body.pointer_mut("/authed_user/access_token") {
        *token = Value::String("[redacted]".to_string());
    }
    if let Some(token) = body.pointer_mut("/access_token") {
        *token = Value::String("[redacted]".to_string());
    }
    body
}

#[async_trait]
impl StatusApi for SlackClient {
    async fn set_presence(&self, credential: &Credential, presence: Presence) -> Result<(), ApiError> {
        let request = self
            .post("users.setPresence")
            .bearer_auth(&credential.access_token)
            .form(&[("presence", presence.as_str())]);
        self.call::<Empty>("users.setPresence", request).await?;
        Ok(())
    }

    async fn set_custom_status(
        &self,
        credential: &Credential,
        text: &str,
        emoji: &str,
        expiry_minutes: u64,
    ) -> Result<(), ApiError> {
        let request = self
            .post("users.profile.set")
            .bearer_auth(&credential.access_token)
            .json(&json!({
                "profile": {
                    "status_text": text,
                    "status_emoji": emoji,
                    "status_expiration": status_expiration(expiry_minutes, unix_now()),
                }
            }));
        self.call::<Empty>("users.profile.set", request).await?;
        Ok(())
    }

    async fn dnd_state(&self, credential: &Credential) -> Result<DndState, ApiError> {
        let request = self.post("dnd.info").bearer_auth(&credential.access_token);
        let info: DndInfoResponse = self.call("dnd.info", request).await?;
        Ok(DndState {
            snooze_enabled: info.snooze_enabled,
        })
    }

    async fn start_snooze(&self, credential: &Credential, minutes: u64) -> Result<(), ApiError> {
        let request = self
            .post("dnd.setSnooze")
            .bearer_auth(&credential.access_token)
            .form(&[("num_minutes", minutes.to_string())]);
        self.call::<Empty>("dnd.setSnooze", request).await?;
        Ok(())
    }

    async fn end_snooze(&self, credential: &Credential) -> Result<(), ApiError> {
        let request = self.post("dnd.endSnooze").bearer_auth(&credential.access_token);
        self.call::<Empty>("dnd.endSnooze", request).await?;
        Ok(())
    }
}

#[async_trait]
impl OAuthExchange for SlackClient {
    async fn exchange(&self, code: &str) -> Result<OAuthGrant, ApiError> {
        let request = self.post("oauth.v2.access").form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
        ]);
        let response: OAuthResponse = self.call("oauth.v2.access", request).await?;
        Ok(response.into())
    }
}
