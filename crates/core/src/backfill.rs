//! Budgeted channel-history backfill.
//!
//! A pass fetches at most `PageBudget` pages of history, newest first, and
//! writes the indexable messages of every page as one batch. When the budget
//! runs out before the history does, the report says so and carries the
//! cursor a later pass resumes from. Re-running a pass is safe because index
//! writes are upserts keyed by channel and ts.

use std::sync::Arc;

use tracing::{info, warn};

use crate::chat::ChatApi;
use crate::classifier::BotIdentity;
use crate::domain::team::TeamCredential;
use crate::errors::ApplicationError;
use crate::indexer::MessageIndexer;

pub const DEFAULT_PAGE_BUDGET: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageBudget(u32);

impl PageBudget {
    pub fn new(pages: u32) -> Self {
        Self(pages.max(1))
    }

    pub fn pages(self) -> u32 {
        self.0
    }
}

impl Default for PageBudget {
    fn default() -> Self {
        Self(DEFAULT_PAGE_BUDGET)
    }
}

/// Where the next pass picks up: history strictly older than `oldest_ts`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackfillCursor {
    pub channel: String,
    pub oldest_ts: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub channel: String,
    pub passes: u32,
    pub pages_fetched: u32,
    pub indexed: usize,
    pub skipped: usize,
    pub truncated: bool,
    pub resume_from: Option<BackfillCursor>,
}

pub struct BackfillEngine {
    chat: Arc<dyn ChatApi>,
    indexer: Arc<MessageIndexer>,
    budget: PageBudget,
}

impl BackfillEngine {
    pub fn new(chat: Arc<dyn ChatApi>, indexer: Arc<MessageIndexer>, budget: PageBudget) -> Self {
        Self { chat, indexer, budget }
    }

    pub fn budget(&self) -> PageBudget {
        self.budget
    }

    /// Single pass from the newest message, the join-trigger behavior.
    pub async fn backfill(
        &self,
        credential: &TeamCredential,
        channel: &str,
    ) -> Result<BackfillReport, ApplicationError> {
        self.run_pass(credential, channel, None).await
    }

    pub async fn resume(
        &self,
        credential: &TeamCredential,
        cursor: &BackfillCursor,
    ) -> Result<BackfillReport, ApplicationError> {
        self.run_pass(credential, &cursor.channel, Some(&cursor.oldest_ts)).await
    }

    /// Chains up to `max_passes` passes, each resuming where the previous one
    /// stopped. The returned report sums all passes.
    pub async fn run_passes(
        &self,
        credential: &TeamCredential,
        channel: &str,
        max_passes: u32,
    ) -> Result<BackfillReport, ApplicationError> {
        let mut total = self.backfill(credential, channel).await?;

        while total.passes < max_passes {
            let Some(cursor) = total.resume_from.clone() else {
                break;
            };
            let next = self.resume(credential, &cursor).await?;
            total.passes += next.passes;
            total.pages_fetched += next.pages_fetched;
            total.indexed += next.indexed;
            total.skipped += next.skipped;
            total.truncated = next.truncated;
            total.resume_from = next.resume_from;
        }

        Ok(total)
    }

    async fn run_pass(
        &self,
        credential: &TeamCredential,
        channel: &str,
        resume_before: Option<&str>,
    ) -> Result<BackfillReport, ApplicationError> {
        let token = credential.user_token()?;
        let bot = BotIdentity::new(credential.bot_user_id.as_str()).map_err(|error| {
            ApplicationError::Configuration(format!("invalid bot user id: {error}"))
        })?;

        let mut report =
            BackfillReport { channel: channel.to_owned(), passes: 1, ..BackfillReport::default() };
        let mut latest = resume_before.map(str::to_owned);
        let mut has_more = true;

        while has_more && report.pages_fetched < self.budget.pages() {
            let page = self.chat.channel_history(token, channel, latest.as_deref()).await?;
            report.pages_fetched += 1;
            has_more = page.has_more;

            match page.oldest_ts() {
                Some(oldest) => latest = Some(oldest.to_owned()),
                // Without a timestamp to page from, asking again would return the same page.
                None => has_more = false,
            }

            let (keep, dropped): (Vec<_>, Vec<_>) =
                page.messages.into_iter().partition(|message| bot.is_indexable(message));
            report.skipped += dropped.len();
            let batch = self.indexer.index_batch(&credential.team_id, channel, keep).await?;
            report.indexed += batch.indexed;
            report.skipped += batch.unkeyed;
        }

        if has_more {
            report.truncated = true;
            report.resume_from = latest
                .map(|oldest_ts| BackfillCursor { channel: channel.to_owned(), oldest_ts });
            warn!(
                event_name = "backfill.pass.truncated",
                team_id = %credential.team_id,
                channel_id = channel,
                page_budget = self.budget.pages(),
                indexed = report.indexed,
                resume_from = report
                    .resume_from
                    .as_ref()
                    .map(|cursor| cursor.oldest_ts.as_str())
                    .unwrap_or("unknown"),
                "page budget exhausted before channel history; older messages were not indexed"
            );
        } else {
            info!(
                event_name = "backfill.pass.completed",
                team_id = %credential.team_id,
                channel_id = channel,
                pages_fetched = report.pages_fetched,
                indexed = report.indexed,
                skipped = report.skipped,
                "channel history backfill completed"
            );
        }

        Ok(report)
    }
}
