use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::chat::ChatApi;
use crate::domain::reply::{ReplyAttachment, ReplyBranding, ReplyPayload};
use crate::domain::team::{AccessToken, TeamCredential};
use crate::errors::{ApplicationError, UpstreamError};
use crate::search::{SearchIndex, SearchQuery};

pub const DEFAULT_HITS_PER_PAGE: usize = 5;
const ANONYMOUS_AUTHOR: &str = "bot";

/// Turns a query addressed to the bot into a reply built from the team's index.
pub struct QueryRelay {
    chat: Arc<dyn ChatApi>,
    index: Arc<dyn SearchIndex>,
    hits_per_page: usize,
    branding: ReplyBranding,
}

impl QueryRelay {
    pub fn new(chat: Arc<dyn ChatApi>, index: Arc<dyn SearchIndex>) -> Self {
        Self {
            chat,
            index,
            hits_per_page: DEFAULT_HITS_PER_PAGE,
            branding: ReplyBranding::default(),
        }
    }

    pub fn with_hits_per_page(mut self, hits_per_page: usize) -> Self {
        self.hits_per_page = hits_per_page.clamp(1, DEFAULT_HITS_PER_PAGE);
        self
    }

    pub fn with_branding(mut self, branding: ReplyBranding) -> Self {
        self.branding = branding;
        self
    }

    pub async fn relay(
        &self,
        credential: &TeamCredential,
        channel: &str,
        query: &str,
    ) -> Result<ReplyPayload, ApplicationError> {
        let token = credential.bot_token()?;
        let search = SearchQuery::for_hits(query, self.hits_per_page);
        let hits = self.index.search(credential.team_id.index_name(), &search).await?;

        debug!(
            event_name = "relay.search.completed",
            team_id = %credential.team_id,
            channel_id = channel,
            hits = hits.len(),
            "search returned"
        );

        if hits.is_empty() {
            return Ok(ReplyPayload::no_hits(channel, query, &self.branding));
        }

        let team_url = self.chat.team_url(token).await?;
        let mut lookups = Lookups::new(self.chat.as_ref(), token);
        let mut attachments = Vec::with_capacity(hits.len());
        for hit in &hits {
            let channel_name = lookups.channel_name(&hit.channel).await?;
            let author_name = match hit.user.as_deref() {
                Some(user) => lookups.user_name(user).await?,
                None => ANONYMOUS_AUTHOR.to_owned(),
            };
            attachments.push(ReplyAttachment::search_result(
                hit,
                &channel_name,
                &author_name,
                &team_url,
                &self.branding,
            ));
        }

        Ok(ReplyPayload::results(channel, attachments, &self.branding))
    }
}

/// Memo for a single relay; dropped with it so renames show up on the next query.
struct Lookups<'a> {
    chat: &'a dyn ChatApi,
    token: &'a AccessToken,
    channels: HashMap<String, String>,
    users: HashMap<String, String>,
}

impl<'a> Lookups<'a> {
    fn new(chat: &'a dyn ChatApi, token: &'a AccessToken) -> Self {
        Self { chat, token, channels: HashMap::new(), users: HashMap::new() }
    }

    async fn channel_name(&mut self, channel: &str) -> Result<String, UpstreamError> {
        if let Some(name) = self.channels.get(channel) {
            return Ok(name.clone());
        }
        let name = self.chat.channel_name(self.token, channel).await?;
        self.channels.insert(channel.to_owned(), name.clone());
        Ok(name)
    }

    async fn user_name(&mut self, user: &str) -> Result<String, UpstreamError> {
        if let Some(name) = self.users.get(user) {
            return Ok(name.clone());
        }
        let name = self.chat.user_real_name(self.token, user).await?;
        self.users.insert(user.to_owned(), name.clone());
        Ok(name)
    }
}
