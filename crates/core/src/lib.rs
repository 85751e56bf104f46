pub mod backfill;
pub mod chat;
pub mod classifier;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod indexer;
pub mod relay;
pub mod search;

pub use backfill::{BackfillCursor, BackfillEngine, BackfillReport, PageBudget};
pub use chat::{ChatApi, HistoryPage};
pub use classifier::{classify, BotIdentity, IgnoreReason, Intent, IntentKind, MentionPattern};
pub use credentials::{require_credential, CredentialStore};
pub use domain::envelope::{EventEnvelope, RawEvent};
pub use domain::message::{IndexDocument, MessageEvent, SearchHit};
pub use domain::reply::{ReplyAttachment, ReplyBranding, ReplyPayload};
pub use domain::team::{AccessToken, TeamCredential, TeamId};
pub use errors::{ApplicationError, CredentialError, UpstreamError, VerificationError};
pub use indexer::{BatchOutcome, MessageIndexer};
pub use relay::QueryRelay;
pub use search::{IndexSettings, SearchIndex, SearchQuery};
