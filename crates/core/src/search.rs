use async_trait::async_trait;

use crate::domain::message::{IndexDocument, SearchHit};
use crate::errors::UpstreamError;

pub const RETRIEVED_ATTRIBUTES: [&str; 4] = ["channel", "ts", "user", "text"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSettings {
    pub searchable_attributes: Vec<String>,
    pub custom_ranking: Vec<String>,
}

impl IndexSettings {
    /// Message text and attachment text are searchable; newest messages rank first.
    pub fn for_messages() -> Self {
        Self {
            searchable_attributes: vec!["text".to_owned(), "attachments.text".to_owned()],
            custom_ranking: vec!["desc(ts)".to_owned()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub attributes_to_retrieve: Vec<String>,
    pub hits_per_page: usize,
}

impl SearchQuery {
    pub fn for_hits(text: impl Into<String>, hits_per_page: usize) -> Self {
        Self {
            text: text.into(),
            attributes_to_retrieve: RETRIEVED_ATTRIBUTES.iter().map(|a| (*a).to_owned()).collect(),
            hits_per_page,
        }
    }
}

/// Team-scoped search index. Writes are upserts keyed by `objectID`.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn apply_settings(
        &self,
        index: &str,
        settings: &IndexSettings,
    ) -> Result<(), UpstreamError>;

    async fn upsert(&self, index: &str, documents: &[IndexDocument]) -> Result<(), UpstreamError>;

    async fn upsert_one(&self, index: &str, document: &IndexDocument) -> Result<(), UpstreamError> {
        self.upsert(index, std::slice::from_ref(document)).await
    }

    /// Hits in the index's own ranking order.
    async fn search(&self, index: &str, query: &SearchQuery)
        -> Result<Vec<SearchHit>, UpstreamError>;
}
