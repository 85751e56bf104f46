use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use sift_core::chat::compare_ts;
use sift_core::domain::message::{IndexDocument, SearchHit};
use sift_core::errors::UpstreamError;
use sift_core::search::{IndexSettings, SearchIndex, SearchQuery};

#[derive(Default)]
struct IndexState {
    settings: Option<IndexSettings>,
    documents: BTreeMap<String, IndexDocument>,
}

/// Process-local index for tests and offline runs. Matching is a
/// case-insensitive check that every query term occurs in the text; hits come
/// back newest first, like the `desc(ts)` custom ranking.
#[derive(Default)]
pub struct InMemorySearchIndex {
    indexes: RwLock<HashMap<String, IndexState>>,
}

impl InMemorySearchIndex {
    pub async fn documents(&self, index: &str) -> Vec<IndexDocument> {
        let indexes = self.indexes.read().await;
        indexes
            .get(index)
            .map(|state| state.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn settings(&self, index: &str) -> Option<IndexSettings> {
        let indexes = self.indexes.read().await;
        indexes.get(index).and_then(|state| state.settings.clone())
    }
}

fn matches(document: &IndexDocument, terms: &[String]) -> bool {
    let text = document.text.to_lowercase();
    terms.iter().all(|term| text.contains(term.as_str()))
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn apply_settings(
        &self,
        index: &str,
        settings: &IndexSettings,
    ) -> Result<(), UpstreamError> {
        let mut indexes = self.indexes.write().await;
        indexes.entry(index.to_owned()).or_default().settings = Some(settings.clone());
        Ok(())
    }

    async fn upsert(&self, index: &str, documents: &[IndexDocument]) -> Result<(), UpstreamError> {
        let mut indexes = self.indexes.write().await;
        let state = indexes.entry(index.to_owned()).or_default();
        for document in documents {
            state.documents.insert(document.object_id.clone(), document.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, UpstreamError> {
        let indexes = self.indexes.read().await;
        let Some(state) = indexes.get(index) else {
            return Ok(Vec::new());
        };

        let terms: Vec<String> = query.text.split_whitespace().map(str::to_lowercase).collect();
        let mut found: Vec<&IndexDocument> =
            state.documents.values().filter(|document| matches(document, &terms)).collect();
        found.sort_by(|left, right| compare_ts(&right.ts, &left.ts));

        Ok(found
            .into_iter()
            .take(query.hits_per_page)
            .map(|document| SearchHit {
                channel: document.channel.clone(),
                ts: document.ts.clone(),
                user: document.user.clone(),
                text: document.text.clone(),
            })
            .collect())
    }
}
