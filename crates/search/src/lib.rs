//! Search index adapters behind `sift_core::search::SearchIndex`.

pub mod algolia;
pub mod memory;

pub use algolia::{AlgoliaIndexClient, AlgoliaSetupError};
pub use memory::InMemorySearchIndex;
