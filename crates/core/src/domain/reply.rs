use serde::Serialize;

use crate::domain::message::SearchHit;

pub const RESULTS_FOUND_TEXT: &str = "Here are some results I found";

pub fn no_hits_text(query: &str) -> String {
    format!("I am sorry to say that I found no hits for \"{query}\"")
}

/// Fixed styling shared by every reply: result color and the credits footer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyBranding {
    pub color: String,
    pub footer: String,
    pub footer_icon: String,
}

impl Default for ReplyBranding {
    fn default() -> Self {
        Self {
            color: "#005500".to_owned(),
            footer: "Powered by Algolia".to_owned(),
            footer_icon:
                "https://www.algolia.com/static_assets/images/press/downloads/algolia-mark-blue.png"
                    .to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyAttachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_icon: Option<String>,
}

impl ReplyAttachment {
    pub fn search_result(
        hit: &SearchHit,
        channel_name: &str,
        author_name: &str,
        team_url: &str,
        branding: &ReplyBranding,
    ) -> Self {
        Self {
            color: Some(branding.color.clone()),
            author_name: Some(author_name.to_owned()),
            title: Some(format!("#{channel_name}")),
            title_link: Some(format!(
                "{team_url}archives/{channel_name}/p{}",
                hit.permalink_ts()
            )),
            text: hit.text.clone(),
            ts: Some(hit.whole_seconds().to_owned()),
            footer: None,
            footer_icon: None,
        }
    }

    pub fn credits(branding: &ReplyBranding) -> Self {
        Self {
            color: None,
            author_name: None,
            title: None,
            title_link: None,
            text: String::new(),
            ts: None,
            footer: Some(branding.footer.clone()),
            footer_icon: Some(branding.footer_icon.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyPayload {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfurl_links: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfurl_media: Option<bool>,
    pub attachments: Vec<ReplyAttachment>,
}

impl ReplyPayload {
    pub fn no_hits(channel: &str, query: &str, branding: &ReplyBranding) -> Self {
        Self {
            channel: channel.to_owned(),
            text: no_hits_text(query),
            unfurl_links: None,
            unfurl_media: None,
            attachments: vec![ReplyAttachment::credits(branding)],
        }
    }

    pub fn results(
        channel: &str,
        mut attachments: Vec<ReplyAttachment>,
        branding: &ReplyBranding,
    ) -> Self {
        attachments.push(ReplyAttachment::credits(branding));
        Self {
            channel: channel.to_owned(),
            text: RESULTS_FOUND_TEXT.to_owned(),
            unfurl_links: Some(false),
            unfurl_media: Some(false),
            attachments,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ReplyAttachment, ReplyBranding, ReplyPayload};
    use crate::domain::message::SearchHit;

    #[test]
    fn result_attachment_links_to_archive_permalink() {
        let hit = SearchHit {
            channel: "C1".to_owned(),
            ts: "1500000000.000200".to_owned(),
            user: Some("U1".to_owned()),
            text: "the deploy broke".to_owned(),
        };

        let attachment = ReplyAttachment::search_result(
            &hit,
            "general",
            "Ada Lovelace",
            "https://acme.slack.com/",
            &ReplyBranding::default(),
        );

        assert_eq!(
            serde_json::to_value(&attachment).expect("serialize"),
            json!({
                "color": "#005500",
                "author_name": "Ada Lovelace",
                "title": "#general",
                "title_link": "https://acme.slack.com/archives/general/p1500000000000200",
                "text": "the deploy broke",
                "ts": "1500000000"
            })
        );
    }

    #[test]
    fn no_hits_payload_omits_unfurl_flags() {
        let payload = ReplyPayload::no_hits("C1", "widgets", &ReplyBranding::default());
        let value = serde_json::to_value(&payload).expect("serialize");

        assert!(value.get("unfurl_links").is_none());
        assert_eq!(value["attachments"][0]["text"], "");
        assert_eq!(value["attachments"][0]["footer"], "Powered by Algolia");
    }
}
