use async_trait::async_trait;

use crate::domain::{message::MessageEvent, reply::ReplyPayload, team::AccessToken};
use crate::errors::UpstreamError;

/// One page of channel history, newest first as the platform returns it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryPage {
    pub messages: Vec<MessageEvent>,
    pub has_more: bool,
}

impl HistoryPage {
    /// Oldest `ts` on the page; the next page is requested strictly before it.
    pub fn oldest_ts(&self) -> Option<&str> {
        self.messages
            .iter()
            .filter_map(|message| message.ts.as_deref())
            .min_by(|left, right| compare_ts(left, right))
    }
}

/// Compares dotted `seconds.fraction` timestamps numerically.
pub fn compare_ts(left: &str, right: &str) -> std::cmp::Ordering {
    fn split(ts: &str) -> (u64, u64) {
        let (seconds, fraction) = ts.split_once('.').unwrap_or((ts, "0"));
        (seconds.parse().unwrap_or(0), fraction.parse().unwrap_or(0))
    }
    split(left).cmp(&split(right))
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn post_message(
        &self,
        token: &AccessToken,
        payload: &ReplyPayload,
    ) -> Result<(), UpstreamError>;

    /// Fetches history older than `latest` (or the newest page when `None`).
    async fn channel_history(
        &self,
        token: &AccessToken,
        channel: &str,
        latest: Option<&str>,
    ) -> Result<HistoryPage, UpstreamError>;

    async fn channel_name(&self, token: &AccessToken, channel: &str)
        -> Result<String, UpstreamError>;

    async fn user_real_name(&self, token: &AccessToken, user: &str)
        -> Result<String, UpstreamError>;

    /// Canonical workspace URL with a trailing slash, e.g. `https://acme.slack.com/`.
    async fn team_url(&self, token: &AccessToken) -> Result<String, UpstreamError>;
}
