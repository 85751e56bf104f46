use serde::{Deserialize, Serialize};

use crate::domain::message::MessageEvent;

pub const URL_VERIFICATION: &str = "url_verification";
pub const EVENT_CALLBACK: &str = "event_callback";

/// Outer webhook payload: `{token, team_id, type, event?, challenge?}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(default, rename = "token")]
    pub verification_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(rename = "type")]
    pub envelope_type: String,
    #[serde(default, rename = "event", skip_serializing_if = "Option::is_none")]
    pub raw_event: Option<RawEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}

impl EventEnvelope {
    pub fn is_handshake(&self) -> bool {
        self.envelope_type == URL_VERIFICATION
    }

    pub fn is_callback(&self) -> bool {
        self.envelope_type == EVENT_CALLBACK
    }
}

/// Inner event. Its `type` stays in `message.extra` so indexed documents keep it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent {
    pub message: MessageEvent,
}

impl RawEvent {
    pub fn event_type(&self) -> &str {
        self.message.extra.get("type").and_then(|value| value.as_str()).unwrap_or_default()
    }

    /// `message` or `message.channel_join` style routing key.
    pub fn subtype_key(&self) -> String {
        match &self.message.subtype {
            Some(subtype) => format!("{}.{subtype}", self.event_type()),
            None => self.event_type().to_owned(),
        }
    }
}
