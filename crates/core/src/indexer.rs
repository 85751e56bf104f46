use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::message::{IndexDocument, MessageEvent};
use crate::domain::team::TeamId;
use crate::errors::ApplicationError;
use crate::search::{IndexSettings, SearchIndex};

/// Normalizes messages into index documents and writes them to the team's index.
///
/// Index settings are applied once per team for the life of the process; a
/// restart re-applies them on the first write.
pub struct MessageIndexer {
    index: Arc<dyn SearchIndex>,
    settings: IndexSettings,
    configured: Mutex<HashSet<TeamId>>,
}

impl MessageIndexer {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self::with_settings(index, IndexSettings::for_messages())
    }

    pub fn with_settings(index: Arc<dyn SearchIndex>, settings: IndexSettings) -> Self {
        Self { index, settings, configured: Mutex::new(HashSet::new()) }
    }

    pub fn search_index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }

    /// Live-message path: exactly one document per call.
    pub async fn index(
        &self,
        team: &TeamId,
        message: MessageEvent,
    ) -> Result<IndexDocument, ApplicationError> {
        let document = IndexDocument::from_message(message, None)?;
        self.ensure_configured(team).await?;
        self.index.upsert_one(team.index_name(), &document).await?;

        debug!(
            event_name = "index.message.upserted",
            team_id = %team,
            channel_id = %document.channel,
            object_id = %document.object_id,
            "indexed live message"
        );
        Ok(document)
    }

    /// Backfill path: one submission for a whole history page. Messages without
    /// a `ts` cannot be keyed; they are left out and counted as `unkeyed`.
    pub async fn index_batch(
        &self,
        team: &TeamId,
        channel: &str,
        messages: Vec<MessageEvent>,
    ) -> Result<BatchOutcome, ApplicationError> {
        let mut outcome = BatchOutcome::default();
        let mut documents = Vec::with_capacity(messages.len());
        for message in messages {
            match IndexDocument::from_message(message, Some(channel)) {
                Ok(document) => documents.push(document),
                Err(error) => {
                    outcome.unkeyed += 1;
                    debug!(
                        event_name = "index.batch.unkeyed",
                        team_id = %team,
                        channel_id = channel,
                        error = %error,
                        "dropped history message"
                    );
                }
            }
        }
        if documents.is_empty() {
            return Ok(outcome);
        }

        self.ensure_configured(team).await?;
        self.index.upsert(team.index_name(), &documents).await?;
        outcome.indexed = documents.len();

        debug!(
            event_name = "index.batch.upserted",
            team_id = %team,
            channel_id = channel,
            documents = outcome.indexed,
            "indexed history batch"
        );
        Ok(outcome)
    }

    /// The lock is not held across `apply_settings`, so a slow settings call for
    /// one team does not stall writes for the others. Two racing first writes
    /// may both apply settings; the call is idempotent.
    async fn ensure_configured(&self, team: &TeamId) -> Result<(), ApplicationError> {
        if self.configured.lock().await.contains(team) {
            return Ok(());
        }

        self.index.apply_settings(team.index_name(), &self.settings).await?;
        self.configured.lock().await.insert(team.clone());
        info!(event_name = "index.settings.applied", team_id = %team, "applied index settings");
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub indexed: usize,
    pub unkeyed: usize,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Mutex, Notify};

    use super::{BatchOutcome, MessageIndexer};
    use crate::domain::message::{IndexDocument, MessageEvent, SearchHit};
    use crate::domain::team::TeamId;
    use crate::errors::UpstreamError;
    use crate::search::{IndexSettings, SearchIndex, SearchQuery};

    #[derive(Default)]
    struct RecordingIndex {
        state: Mutex<RecordingState>,
    }

    #[derive(Default)]
    struct RecordingState {
        settings_calls: Vec<String>,
        upsert_calls: usize,
        documents: BTreeMap<(String, String), IndexDocument>,
    }

    #[async_trait]
    impl SearchIndex for RecordingIndex {
        async fn apply_settings(
            &self,
            index: &str,
            _settings: &IndexSettings,
        ) -> Result<(), UpstreamError> {
            self.state.lock().await.settings_calls.push(index.to_owned());
            Ok(())
        }

        async fn upsert(
            &self,
            index: &str,
            documents: &[IndexDocument],
        ) -> Result<(), UpstreamError> {
            let mut state = self.state.lock().await;
            state.upsert_calls += 1;
            for document in documents {
                state
                    .documents
                    .insert((index.to_owned(), document.object_id.clone()), document.clone());
            }
            Ok(())
        }

        async fn search(
            &self,
            _index: &str,
            _query: &SearchQuery,
        ) -> Result<Vec<SearchHit>, UpstreamError> {
            Ok(Vec::new())
        }
    }

    /// Holds the first settings call for `T1` until `release` is notified.
    #[derive(Default)]
    struct GatedIndex {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SearchIndex for GatedIndex {
        async fn apply_settings(
            &self,
            index: &str,
            _settings: &IndexSettings,
        ) -> Result<(), UpstreamError> {
            if index == "T1" {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(())
        }

        async fn upsert(
            &self,
            _index: &str,
            _documents: &[IndexDocument],
        ) -> Result<(), UpstreamError> {
            Ok(())
        }

        async fn search(
            &self,
            _index: &str,
            _query: &SearchQuery,
        ) -> Result<Vec<SearchHit>, UpstreamError> {
            Ok(Vec::new())
        }
    }

    fn message(channel: Option<&str>, ts: &str, text: &str) -> MessageEvent {
        MessageEvent {
            channel: channel.map(str::to_owned),
            ts: Some(ts.to_owned()),
            user: Some("U1".to_owned()),
            text: text.to_owned(),
            ..MessageEvent::default()
        }
    }

    #[tokio::test]
    async fn indexing_the_same_message_twice_keeps_one_document() {
        let index = Arc::new(RecordingIndex::default());
        let indexer = MessageIndexer::new(index.clone());
        let team = TeamId("T1".to_owned());

        indexer.index(&team, message(Some("C1"), "1.000100", "first")).await.expect("index");
        indexer.index(&team, message(Some("C1"), "1.000100", "edited")).await.expect("index");

        let state = index.state.lock().await;
        assert_eq!(state.documents.len(), 1);
        let stored = &state.documents[&("T1".to_owned(), "C1.1.000100".to_owned())];
        assert_eq!(stored.text, "edited");
    }

    #[tokio::test]
    async fn settings_are_applied_once_per_team() {
        let index = Arc::new(RecordingIndex::default());
        let indexer = MessageIndexer::new(index.clone());

        for (team, ts) in [("T1", "1.1"), ("T1", "1.2"), ("T2", "1.3")] {
            indexer
                .index(&TeamId(team.to_owned()), message(Some("C1"), ts, "hello"))
                .await
                .expect("index");
        }

        assert_eq!(index.state.lock().await.settings_calls, vec!["T1", "T2"]);
    }

    #[tokio::test]
    async fn batch_fills_in_origin_channel_and_skips_empty_pages() {
        let index = Arc::new(RecordingIndex::default());
        let indexer = MessageIndexer::new(index.clone());
        let team = TeamId("T1".to_owned());

        let written = indexer
            .index_batch(&team, "C5", vec![message(None, "2.1", "a"), message(None, "2.2", "b")])
            .await
            .expect("batch");
        let empty = indexer.index_batch(&team, "C5", Vec::new()).await.expect("empty batch");

        let state = index.state.lock().await;
        assert_eq!(written, BatchOutcome { indexed: 2, unkeyed: 0 });
        assert_eq!(empty, BatchOutcome::default());
        assert_eq!(state.upsert_calls, 1);
        assert!(state.documents.contains_key(&("T1".to_owned(), "C5.2.1".to_owned())));
    }

    #[tokio::test]
    async fn batch_counts_messages_without_ts() {
        let index = Arc::new(RecordingIndex::default());
        let indexer = MessageIndexer::new(index.clone());
        let unkeyed = MessageEvent { text: "no ts".to_owned(), ..MessageEvent::default() };

        let outcome = indexer
            .index_batch(&TeamId("T1".to_owned()), "C5", vec![message(None, "2.1", "a"), unkeyed])
            .await
            .expect("batch");

        assert_eq!(outcome, BatchOutcome { indexed: 1, unkeyed: 1 });
        assert_eq!(index.state.lock().await.documents.len(), 1);
    }

    #[tokio::test]
    async fn slow_settings_for_one_team_do_not_block_another() {
        let index = Arc::new(GatedIndex::default());
        let indexer = Arc::new(MessageIndexer::new(index.clone()));

        let blocked = {
            let indexer = Arc::clone(&indexer);
            tokio::spawn(async move {
                indexer.index(&TeamId("T1".to_owned()), message(Some("C1"), "1.1", "a")).await
            })
        };
        index.entered.notified().await;

        let other = tokio::time::timeout(
            Duration::from_secs(1),
            indexer.index(&TeamId("T2".to_owned()), message(Some("C1"), "1.2", "b")),
        )
        .await;
        assert!(matches!(other, Ok(Ok(_))), "second team should index while the first waits");

        index.release.notify_one();
        blocked.await.expect("join").expect("first team indexes once released");
    }

    #[tokio::test]
    async fn live_message_without_channel_is_rejected() {
        let indexer = MessageIndexer::new(Arc::new(RecordingIndex::default()));

        let result = indexer.index(&TeamId("T1".to_owned()), message(None, "1.1", "x")).await;
        assert!(result.is_err());
    }
}
