//! HTTP routes: one per slash command, plus the OAuth redirect target.

use crate::command::SlashCommand;
use crate::message::SlackMessage;
use crate::session::SessionKey;
use crate::signature::require_slack_signature;
use axum::{
    Json, Router,
    extract::{Form, Query, State, rejection::FormRejection},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use overload_core::{Overload, OverloadError, Reply, error_chain};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state.
pub struct AppState {
    pub overload: Arc<Overload>,
    pub session: SessionKey,
    pub signing_secret: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let commands = Router::new()
        .route("/link-slack", post(link_slack))
        .route("/list-triggers", post(list_triggers))
        .route("/trigger", post(trigger))
        .route("/create-trigger", post(create_trigger))
        .route("/delete-trigger", post(delete_trigger))
        .route("/clear-status", post(clear_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_slack_signature,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/oauth", get(oauth))
        .merge(commands)
        .with_state(state)
}

type CommandForm = Result<Form<SlashCommand>, FormRejection>;

fn command(form: CommandForm) -> Result<SlashCommand, Json<SlackMessage>> {
    form.map(|Form(command)| command).map_err(|rejection| {
        warn!(error = %rejection, "unreadable slash command");
        Json(SlackMessage::ephemeral(
            "Slack Overload could not read that command. Please try again.",
        ))
    })
}

/// Slack shows anything but a 200 as a generic failure, so errors are
/// answered with a 200 and an explanation.
fn respond(state: &AppState, result: Result<Reply, OverloadError>) -> Json<SlackMessage> {
    let reply = result.unwrap_or_else(|err| state.overload.error_reply(&err));
    Json(SlackMessage::from(&reply))
}

async fn health() -> &'static str {
    "ok"
}

async fn trigger(State(state): State<Arc<AppState>>, form: CommandForm) -> Json<SlackMessage> {
    let command = match command(form) {
        Ok(command) => command,
        Err(reply) => return reply,
    };
    let result = state.overload.trigger(&command.caller(), &command.text).await;
    respond(&state, result)
}

async fn create_trigger(State(state): State<Arc<AppState>>, form: CommandForm) -> Json<SlackMessage> {
    let command = match command(form) {
        Ok(command) => command,
        Err(reply) => return reply,
    };
    let result = state
        .overload
        .create_trigger(&command.caller(), &command.text)
        .await;
    respond(&state, result)
}

async fn delete_trigger(State(state): State<Arc<AppState>>, form: CommandForm) -> Json<SlackMessage> {
    let command = match command(form) {
        Ok(command) => command,
        Err(reply) => return reply,
    };
    let result = state
        .overload
        .delete_trigger(&command.caller(), &command.text)
        .await;
    respond(&state, result)
}

async fn list_triggers(State(state): State<Arc<AppState>>, form: CommandForm) -> Json<SlackMessage> {
    let command = match command(form) {
        Ok(command) => command,
        Err(reply) => return reply,
    };
    let result = state.overload.list_triggers(&command.caller()).await;
    respond(&state, result)
}

async fn clear_status(State(state): State<Arc<AppState>>, form: CommandForm) -> Json<SlackMessage> {
    let command = match command(form) {
        Ok(command) => command,
        Err(reply) => return reply,
    };
    let result = state.overload.clear_status(&command.caller()).await;
    respond(&state, result)
}

async fn link_slack(State(state): State<Arc<AppState>>, form: CommandForm) -> Json<SlackMessage> {
    let command = match command(form) {
        Ok(command) => command,
        Err(reply) => return reply,
    };
    let result = state.overload.link_slack(&command.caller()).await;
    respond(&state, result)
}

#[derive(Debug, Default, Deserialize)]
struct OAuthParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Slack sends the browser here after the user approves the app.
async fn oauth(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OAuthParams>,
    headers: HeaderMap,
) -> Response {
    if let Some(reason) = params.error {
        warn!(%reason, "oauth was not approved");
        return (StatusCode::BAD_REQUEST, "Slack Overload was not authorized.").into_response();
    }
    let Some(code) = params.code.filter(|code| !code.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing authorization code.").into_response();
    };

    let requested_user = params
        .state
        .filter(|id| !id.is_empty())
        .or_else(|| state.session.user_id(&headers));

    let user_id = match state
        .overload
        .link_account(&code, requested_user.as_deref())
        .await
    {
        Ok(user_id) => user_id,
        Err(err) => {
            error!(error = %error_chain(&err), "could not link slack account");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not link your Slack account. Please try again.",
            )
                .into_response();
        }
    };
    info!(%user_id, "slack account linked");

    let landing_url = state.overload.settings().landing_url.clone();
    match state.session.cookie(&user_id) {
        Some(cookie) => (
            StatusCode::FOUND,
            [(header::LOCATION, landing_url), (header::SET_COOKIE, cookie)],
        )
            .into_response(),
        None => (StatusCode::FOUND, [(header::LOCATION, landing_url)]).into_response(),
    }
}
