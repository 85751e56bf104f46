//! Maps an inbound envelope to the one thing the bridge should do with it.

use regex::Regex;

use crate::domain::envelope::EventEnvelope;
use crate::domain::message::MessageEvent;

const MESSAGE: &str = "message";
const CHANNEL_JOIN: &str = "message.channel_join";

/// Matches `<@BOT> query` or `<@BOT>: query` anywhere in a message.
#[derive(Clone, Debug)]
pub struct MentionPattern {
    regex: Regex,
}

impl MentionPattern {
    pub fn for_bot(bot_user_id: &str) -> Result<Self, regex::Error> {
        let pattern = format!("<@{}>:? (.*)", regex::escape(bot_user_id));
        Ok(Self { regex: Regex::new(&pattern)? })
    }

    pub fn query<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.regex.captures(text).and_then(|captures| captures.get(1)).map(|m| m.as_str())
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// The workspace's own bot user, resolved from the team's credential record.
#[derive(Clone, Debug)]
pub struct BotIdentity {
    pub user_id: String,
    pub mention: MentionPattern,
}

impl BotIdentity {
    pub fn new(user_id: impl Into<String>) -> Result<Self, regex::Error> {
        let user_id = user_id.into();
        let mention = MentionPattern::for_bot(&user_id)?;
        Ok(Self { user_id, mention })
    }

    /// Messages the bot wrote, subtyped messages and queries addressed to the
    /// bot never belong in the index.
    pub fn is_indexable(&self, message: &MessageEvent) -> bool {
        !message.is_from(&self.user_id)
            && message.subtype.is_none()
            && !self.mention.is_match(&message.text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Handshake,
    IndexableMessage,
    JoinBackfill,
    BotQuery,
    Ignored,
    Unrecognized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnMessage,
    ForeignJoin,
    UnknownBotIdentity,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    Handshake { challenge: String },
    IndexableMessage(MessageEvent),
    JoinBackfill { channel: String },
    BotQuery { channel: String, query: String },
    Ignored(IgnoreReason),
    Unrecognized { event_key: String },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::Handshake { .. } => IntentKind::Handshake,
            Self::IndexableMessage(_) => IntentKind::IndexableMessage,
            Self::JoinBackfill { .. } => IntentKind::JoinBackfill,
            Self::BotQuery { .. } => IntentKind::BotQuery,
            Self::Ignored(_) => IntentKind::Ignored,
            Self::Unrecognized { .. } => IntentKind::Unrecognized,
        }
    }
}

pub fn classify(envelope: &EventEnvelope, bot: Option<&BotIdentity>) -> Intent {
    if envelope.is_handshake() {
        return Intent::Handshake { challenge: envelope.challenge.clone().unwrap_or_default() };
    }
    if !envelope.is_callback() {
        return Intent::Unrecognized { event_key: envelope.envelope_type.clone() };
    }
    let Some(event) = &envelope.raw_event else {
        return Intent::Unrecognized { event_key: format!("{}.<missing>", envelope.envelope_type) };
    };

    let event_key = event.subtype_key();
    if event_key != CHANNEL_JOIN && event_key != MESSAGE {
        return Intent::Unrecognized { event_key };
    }
    let Some(bot) = bot else {
        return Intent::Ignored(IgnoreReason::UnknownBotIdentity);
    };
    let message = &event.message;

    if event_key == CHANNEL_JOIN {
        if !message.is_from(&bot.user_id) {
            return Intent::Ignored(IgnoreReason::ForeignJoin);
        }
        return match &message.channel {
            Some(channel) => Intent::JoinBackfill { channel: channel.clone() },
            None => Intent::Unrecognized { event_key },
        };
    }

    if message.is_from(&bot.user_id) {
        return Intent::Ignored(IgnoreReason::OwnMessage);
    }
    match bot.mention.query(&message.text) {
        Some(query) => match &message.channel {
            Some(channel) => Intent::BotQuery { channel: channel.clone(), query: query.to_owned() },
            None => Intent::Unrecognized { event_key },
        },
        None => Intent::IndexableMessage(message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{classify, BotIdentity, IgnoreReason, Intent, IntentKind, MentionPattern};
    use crate::domain::envelope::EventEnvelope;
    use crate::domain::message::{IndexDocument, MessageEvent};

    fn bot() -> BotIdentity {
        BotIdentity::new("UBOT").expect("bot identity")
    }

    fn message_envelope(event: serde_json::Value) -> EventEnvelope {
        serde_json::from_value(json!({
            "token": "verify",
            "team_id": "T1",
            "type": "event_callback",
            "event": event
        }))
        .expect("envelope")
    }

    fn text_message(user: &str, text: &str) -> EventEnvelope {
        message_envelope(json!({
            "type": "message",
            "channel": "C1",
            "user": user,
            "text": text,
            "ts": "1500000000.000100"
        }))
    }

    #[test]
    fn handshake_echoes_challenge() {
        let envelope: EventEnvelope = serde_json::from_value(json!({
            "token": "verify",
            "type": "url_verification",
            "challenge": "abc123"
        }))
        .expect("envelope");

        assert_eq!(
            classify(&envelope, None),
            Intent::Handshake { challenge: "abc123".to_owned() }
        );
    }

    #[test]
    fn unknown_envelope_type_is_unrecognized() {
        let envelope: EventEnvelope =
            serde_json::from_value(json!({ "token": "verify", "type": "app_rate_limited" }))
                .expect("envelope");

        assert_eq!(classify(&envelope, Some(&bot())).kind(), IntentKind::Unrecognized);
    }

    #[test]
    fn mention_with_space_is_a_bot_query() {
        let intent = classify(&text_message("U1", "<@UBOT> foo"), Some(&bot()));

        assert_eq!(intent, Intent::BotQuery { channel: "C1".to_owned(), query: "foo".to_owned() });
    }

    #[test]
    fn mention_with_colon_is_a_bot_query() {
        let intent = classify(&text_message("U1", "<@UBOT>: foo"), Some(&bot()));

        assert_eq!(intent, Intent::BotQuery { channel: "C1".to_owned(), query: "foo".to_owned() });
    }

    #[test]
    fn mention_without_space_is_indexed() {
        let intent = classify(&text_message("U1", "<@UBOT>foo"), Some(&bot()));

        assert_eq!(intent.kind(), IntentKind::IndexableMessage);
    }

    #[test]
    fn indexed_message_keeps_its_event_type() {
        let envelope = message_envelope(json!({
            "type": "message",
            "channel": "C1",
            "user": "U1",
            "text": "hi",
            "ts": "1.2",
            "team": "T1"
        }));

        let Intent::IndexableMessage(message) = classify(&envelope, Some(&bot())) else {
            panic!("expected an indexable message");
        };
        let document = IndexDocument::from_message(message, None).expect("document");
        let value = serde_json::to_value(&document).expect("serialize");

        assert_eq!(value["type"], "message");
        assert_eq!(value["team"], "T1");
        assert_eq!(value["objectID"], "C1.1.2");
    }

    #[test]
    fn mention_inside_a_sentence_still_queries() {
        let intent = classify(&text_message("U1", "hey <@UBOT> release notes"), Some(&bot()));

        assert_eq!(
            intent,
            Intent::BotQuery { channel: "C1".to_owned(), query: "release notes".to_owned() }
        );
    }

    #[test]
    fn bot_messages_are_ignored_even_when_they_mention_the_bot() {
        for text in ["plain text", "<@UBOT> foo"] {
            let intent = classify(&text_message("UBOT", text), Some(&bot()));
            assert_eq!(intent, Intent::Ignored(IgnoreReason::OwnMessage));
        }
    }

    #[test]
    fn bot_join_triggers_backfill() {
        let envelope = message_envelope(json!({
            "type": "message",
            "subtype": "channel_join",
            "channel": "C7",
            "user": "UBOT",
            "text": "<@UBOT> has joined the channel",
            "ts": "1500000000.000100"
        }));

        assert_eq!(
            classify(&envelope, Some(&bot())),
            Intent::JoinBackfill { channel: "C7".to_owned() }
        );
    }

    #[test]
    fn join_by_another_user_is_ignored() {
        let envelope = message_envelope(json!({
            "type": "message",
            "subtype": "channel_join",
            "channel": "C7",
            "user": "U2"
        }));

        assert_eq!(classify(&envelope, Some(&bot())), Intent::Ignored(IgnoreReason::ForeignJoin));
    }

    #[test]
    fn other_subtypes_are_unrecognized() {
        let envelope = message_envelope(json!({
            "type": "message",
            "subtype": "message_changed",
            "channel": "C1"
        }));

        assert_eq!(
            classify(&envelope, Some(&bot())),
            Intent::Unrecognized { event_key: "message.message_changed".to_owned() }
        );
    }

    #[test]
    fn callback_without_known_bot_is_ignored() {
        let intent = classify(&text_message("U1", "hello"), None);

        assert_eq!(intent, Intent::Ignored(IgnoreReason::UnknownBotIdentity));
    }

    #[test]
    fn indexability_filters_bot_subtype_and_query_messages() {
        let bot = bot();
        let ordinary =
            MessageEvent { user: Some("U1".to_owned()), text: "hi".to_owned(), ..Default::default() };
        let own = MessageEvent { user: Some("UBOT".to_owned()), ..ordinary.clone() };
        let subtyped = MessageEvent { subtype: Some("bot_message".to_owned()), ..ordinary.clone() };
        let query = MessageEvent { text: "<@UBOT>: find it".to_owned(), ..ordinary.clone() };

        assert!(bot.is_indexable(&ordinary));
        assert!(!bot.is_indexable(&own));
        assert!(!bot.is_indexable(&subtyped));
        assert!(!bot.is_indexable(&query));
    }

    #[test]
    fn bot_ids_are_matched_literally() {
        let pattern = MentionPattern::for_bot("U.B+").expect("pattern");

        assert_eq!(pattern.query("<@U.B+> ok"), Some("ok"));
        assert_eq!(pattern.query("<@UxBB> ok"), None);
    }
}
