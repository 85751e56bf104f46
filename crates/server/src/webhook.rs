use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info, warn};
use uuid::Uuid;

use sift_core::domain::envelope::EventEnvelope;
use sift_core::errors::VerificationError;
use sift_slack::events::{EventContext, EventDispatcher, EventOutcome};

pub const EVENTS_PATH: &str = "/slack/events";

#[derive(Clone)]
pub struct WebhookState {
    verification_token: Arc<SecretString>,
    dispatcher: Arc<EventDispatcher>,
}

impl WebhookState {
    pub fn new(verification_token: SecretString, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { verification_token: Arc::new(verification_token), dispatcher }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route(EVENTS_PATH, post(receive_event)).with_state(state)
}

/// Verifies the envelope token, answers the handshake inline and acknowledges
/// everything else with 200 once the dispatcher returns.
pub async fn receive_event(State(state): State<WebhookState>, body: Bytes) -> Response {
    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(
                event_name = "webhook.payload.rejected",
                error = %error,
                "could not parse event envelope"
            );
            return (StatusCode::BAD_REQUEST, format!("invalid event payload: {error}"))
                .into_response();
        }
    };

    if let Err(error) = VerificationError::check(
        state.verification_token.expose_secret(),
        &envelope.verification_token,
    ) {
        warn!(
            event_name = "webhook.verification.failed",
            team_id = envelope.team_id.as_deref().unwrap_or("unknown"),
            "rejecting envelope with a foreign verification token"
        );
        return (StatusCode::FORBIDDEN, error.to_string()).into_response();
    }

    let ctx = EventContext { correlation_id: Uuid::new_v4().to_string() };
    let team_id = envelope.team_id.as_deref().unwrap_or("unknown");

    match state.dispatcher.dispatch(&envelope, &ctx).await {
        Ok(EventOutcome::Challenge(challenge)) => (StatusCode::OK, challenge).into_response(),
        Ok(outcome) => {
            info!(
                event_name = "webhook.event.handled",
                correlation_id = %ctx.correlation_id,
                team_id,
                outcome = ?outcome,
                "event handled"
            );
            StatusCode::OK.into_response()
        }
        Err(error) => {
            error!(
                event_name = "webhook.event.failed",
                correlation_id = %ctx.correlation_id,
                team_id,
                error_class = error.error_class(),
                error = %error,
                "event handling failed; acknowledging to avoid redelivery"
            );
            StatusCode::OK.into_response()
        }
    }
}
