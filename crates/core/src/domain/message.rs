use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ApplicationError;

/// A chat message as delivered by the platform. Fields the bridge does not
/// interpret are kept in `extra` so they reach the index untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageEvent {
    pub fn is_from(&self, user_id: &str) -> bool {
        self.user.as_deref() == Some(user_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub channel: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IndexDocument {
    pub fn object_id_for(channel: &str, ts: &str) -> String {
        format!("{channel}.{ts}")
    }

    /// Builds the document for `message`, taking the channel from the payload
    /// when present and from `origin_channel` otherwise (history pages omit it).
    pub fn from_message(
        message: MessageEvent,
        origin_channel: Option<&str>,
    ) -> Result<Self, ApplicationError> {
        let channel = message
            .channel
            .or_else(|| origin_channel.map(str::to_owned))
            .filter(|channel| !channel.is_empty())
            .ok_or_else(|| {
                ApplicationError::InvalidPayload("message has no channel".to_owned())
            })?;
        let ts = message.ts.filter(|ts| !ts.is_empty()).ok_or_else(|| {
            ApplicationError::InvalidPayload(format!("message in `{channel}` has no ts"))
        })?;

        Ok(Self {
            object_id: Self::object_id_for(&channel, &ts),
            channel,
            ts,
            user: message.user,
            text: message.text,
            extra: message.extra,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub channel: String,
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl SearchHit {
    /// `1500000000.000200` becomes `1500000000000200`, the permalink form.
    pub fn permalink_ts(&self) -> String {
        self.ts.replacen('.', "", 1)
    }

    pub fn whole_seconds(&self) -> &str {
        self.ts.split('.').next().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{IndexDocument, MessageEvent, SearchHit};
    use crate::domain::envelope::EventEnvelope;

    #[test]
    fn document_keeps_original_fields_and_derives_object_id() {
        let envelope: EventEnvelope = serde_json::from_value(json!({
            "token": "verify",
            "team_id": "T1",
            "type": "event_callback",
            "event": {
                "type": "message",
                "user": "U1",
                "text": "deploy is done",
                "ts": "1500000000.000200",
                "attachments": [{ "text": "build log" }]
            }
        }))
        .expect("envelope");
        let message = envelope.raw_event.expect("event").message;

        let document = IndexDocument::from_message(message, Some("C1")).expect("document");
        let value = serde_json::to_value(&document).expect("serialize");

        assert_eq!(value["objectID"], "C1.1500000000.000200");
        assert_eq!(value["channel"], "C1");
        assert_eq!(value["type"], "message");
        assert_eq!(value["attachments"][0]["text"], "build log");
    }

    #[test]
    fn payload_channel_wins_over_origin_channel() {
        let message = MessageEvent {
            channel: Some("C9".to_owned()),
            ts: Some("1.2".to_owned()),
            ..MessageEvent::default()
        };

        let document = IndexDocument::from_message(message, Some("C1")).expect("document");
        assert_eq!(document.object_id, "C9.1.2");
    }

    #[test]
    fn message_without_ts_is_rejected() {
        let message = MessageEvent { channel: Some("C1".to_owned()), ..MessageEvent::default() };
        assert!(IndexDocument::from_message(message, None).is_err());
    }

    #[test]
    fn hit_timestamp_forms() {
        let hit = SearchHit {
            channel: "C1".to_owned(),
            ts: "1500000000.000200".to_owned(),
            user: None,
            text: String::new(),
        };

        assert_eq!(hit.permalink_ts(), "1500000000000200");
        assert_eq!(hit.whole_seconds(), "1500000000");
    }
}
