//! Slack side of the bridge.
//!
//! - **Web API** (`web_api`) - `conversations.*`, `users.info`, `auth.test` and
//!   `chat.postMessage` behind the `ChatApi` trait
//! - **Events** (`events`) - routes classified webhook envelopes to the indexing,
//!   backfill and query handlers
//!
//! ```text
//! Webhook → EventDispatcher → classify → Handler → MessageIndexer
//!                                                  → BackfillEngine
//!                                                  → QueryRelay
//! ```

pub mod events;
pub mod web_api;

pub use events::{
    bridge_dispatcher, BotQueryHandler, DispatchError, EventContext, EventDispatcher,
    EventHandler, EventHandlerError, EventOutcome, IndexMessageHandler, JoinBackfillHandler,
};
pub use web_api::{AuthIdentity, SlackClientError, SlackWebClient};
