use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info};

use sift_core::backfill::{BackfillEngine, BackfillReport, PageBudget};
use sift_core::chat::ChatApi;
use sift_core::classifier::{classify, BotIdentity, IgnoreReason, Intent, IntentKind};
use sift_core::config::{AppConfig, BackfillMode};
use sift_core::credentials::{require_credential, CredentialStore};
use sift_core::domain::envelope::EventEnvelope;
use sift_core::domain::team::TeamCredential;
use sift_core::errors::ApplicationError;
use sift_core::indexer::MessageIndexer;
use sift_core::relay::QueryRelay;
use sift_core::search::SearchIndex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// What handling an envelope amounted to. Every variant is acknowledged to
/// the caller with success; only the handshake carries a response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Challenge(String),
    Indexed { object_id: String },
    Backfilled(BackfillReport),
    BackfillScheduled { channel: String },
    Replied { channel: String, attachments: usize },
    Ignored(IgnoreReason),
    Unrecognized { event_key: String },
    Unhandled(IntentKind),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

impl DispatchError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Application(error) | Self::Handler(EventHandlerError::Application(error)) => {
                error.error_class()
            }
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn intent_kind(&self) -> IntentKind;
    async fn handle(
        &self,
        credential: &TeamCredential,
        intent: &Intent,
        ctx: &EventContext,
    ) -> Result<EventOutcome, EventHandlerError>;
}

/// Resolves the team's credential, classifies the envelope against the team's
/// bot identity and hands the intent to the handler registered for it.
pub struct EventDispatcher {
    credentials: Arc<dyn CredentialStore>,
    handlers: HashMap<IntentKind, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials, handlers: HashMap::new() }
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.intent_kind(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &EventEnvelope,
        ctx: &EventContext,
    ) -> Result<EventOutcome, DispatchError> {
        // Envelopes that are not message or join events never need a credential.
        match classify(envelope, None) {
            Intent::Handshake { challenge } => return Ok(EventOutcome::Challenge(challenge)),
            Intent::Unrecognized { event_key } => {
                info!(
                    event_name = "event.unrecognized",
                    correlation_id = %ctx.correlation_id,
                    event_key = %event_key,
                    "acknowledging unrecognized event"
                );
                return Ok(EventOutcome::Unrecognized { event_key });
            }
            _ => {}
        }

        let team_id = envelope.team_id.as_deref().ok_or_else(|| {
            ApplicationError::InvalidPayload("event callback without team_id".to_owned())
        })?;
        let credential = require_credential(self.credentials.as_ref(), team_id).await?;
        let bot = BotIdentity::new(credential.bot_user_id.as_str()).map_err(|error| {
            ApplicationError::Configuration(format!(
                "bot user id for team `{team_id}` is not usable: {error}"
            ))
        })?;

        let intent = classify(envelope, Some(&bot));
        debug!(
            event_name = "event.classified",
            correlation_id = %ctx.correlation_id,
            team_id = %team_id,
            intent = ?intent.kind(),
            "classified event"
        );

        match &intent {
            Intent::Ignored(reason) => Ok(EventOutcome::Ignored(*reason)),
            Intent::Unrecognized { event_key } => {
                Ok(EventOutcome::Unrecognized { event_key: event_key.clone() })
            }
            _ => {
                let Some(handler) = self.handlers.get(&intent.kind()) else {
                    return Ok(EventOutcome::Unhandled(intent.kind()));
                };
                handler.handle(&credential, &intent, ctx).await.map_err(DispatchError::from)
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher with the indexing, backfill and query handlers wired from config.
pub fn bridge_dispatcher(
    credentials: Arc<dyn CredentialStore>,
    chat: Arc<dyn ChatApi>,
    index: Arc<dyn SearchIndex>,
    config: &AppConfig,
) -> EventDispatcher {
    let indexer = Arc::new(MessageIndexer::new(index.clone()));
    let engine = Arc::new(BackfillEngine::new(
        chat.clone(),
        indexer.clone(),
        PageBudget::new(config.backfill.page_budget),
    ));
    let relay = QueryRelay::new(chat.clone(), index)
        .with_hits_per_page(config.relay.hits_per_page)
        .with_branding(config.relay.branding());

    let mut dispatcher = EventDispatcher::new(credentials);
    dispatcher.register(IndexMessageHandler::new(indexer));
    dispatcher.register(JoinBackfillHandler::new(
        engine,
        config.backfill.mode,
        config.backfill.max_passes,
    ));
    dispatcher.register(BotQueryHandler::new(Arc::new(relay), chat));
    dispatcher
}

pub struct IndexMessageHandler {
    indexer: Arc<MessageIndexer>,
}

impl IndexMessageHandler {
    pub fn new(indexer: Arc<MessageIndexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl EventHandler for IndexMessageHandler {
    fn intent_kind(&self) -> IntentKind {
        IntentKind::IndexableMessage
    }

    async fn handle(
        &self,
        credential: &TeamCredential,
        intent: &Intent,
        _ctx: &EventContext,
    ) -> Result<EventOutcome, EventHandlerError> {
        let Intent::IndexableMessage(message) = intent else {
            return Ok(EventOutcome::Unhandled(intent.kind()));
        };

        let document = self.indexer.index(&credential.team_id, message.clone()).await?;
        Ok(EventOutcome::Indexed { object_id: document.object_id })
    }
}

pub struct JoinBackfillHandler {
    engine: Arc<BackfillEngine>,
    mode: BackfillMode,
    max_passes: u32,
}

impl JoinBackfillHandler {
    pub fn new(engine: Arc<BackfillEngine>, mode: BackfillMode, max_passes: u32) -> Self {
        Self { engine, mode, max_passes: max_passes.max(1) }
    }
}

#[async_trait]
impl EventHandler for JoinBackfillHandler {
    fn intent_kind(&self) -> IntentKind {
        IntentKind::JoinBackfill
    }

    async fn handle(
        &self,
        credential: &TeamCredential,
        intent: &Intent,
        ctx: &EventContext,
    ) -> Result<EventOutcome, EventHandlerError> {
        let Intent::JoinBackfill { channel } = intent else {
            return Ok(EventOutcome::Unhandled(intent.kind()));
        };

        match self.mode {
            BackfillMode::Inline => {
                let report = self.engine.backfill(credential, channel).await?;
                Ok(EventOutcome::Backfilled(report))
            }
            BackfillMode::Background => {
                let engine = self.engine.clone();
                let credential = credential.clone();
                let channel_id = channel.clone();
                let correlation_id = ctx.correlation_id.clone();
                let max_passes = self.max_passes;

                tokio::spawn(async move {
                    match engine.run_passes(&credential, &channel_id, max_passes).await {
                        Ok(report) => info!(
                            event_name = "backfill.background.completed",
                            correlation_id = %correlation_id,
                            team_id = %credential.team_id,
                            channel_id = %channel_id,
                            passes = report.passes,
                            indexed = report.indexed,
                            truncated = report.truncated,
                            "background backfill finished"
                        ),
                        Err(error) => error!(
                            event_name = "backfill.background.failed",
                            correlation_id = %correlation_id,
                            team_id = %credential.team_id,
                            channel_id = %channel_id,
                            error_class = error.error_class(),
                            error = %error,
                            "background backfill failed"
                        ),
                    }
                });

                Ok(EventOutcome::BackfillScheduled { channel: channel.clone() })
            }
        }
    }
}

pub struct BotQueryHandler {
    relay: Arc<QueryRelay>,
    chat: Arc<dyn ChatApi>,
}

impl BotQueryHandler {
    pub fn new(relay: Arc<QueryRelay>, chat: Arc<dyn ChatApi>) -> Self {
        Self { relay, chat }
    }
}

#[async_trait]
impl EventHandler for BotQueryHandler {
    fn intent_kind(&self) -> IntentKind {
        IntentKind::BotQuery
    }

    async fn handle(
        &self,
        credential: &TeamCredential,
        intent: &Intent,
        _ctx: &EventContext,
    ) -> Result<EventOutcome, EventHandlerError> {
        let Intent::BotQuery { channel, query } = intent else {
            return Ok(EventOutcome::Unhandled(intent.kind()));
        };

        let payload = self.relay.relay(credential, channel, query).await?;
        let token = credential.bot_token()?;
        self.chat.post_message(token, &payload).await.map_err(ApplicationError::from)?;

        Ok(EventOutcome::Replied {
            channel: payload.channel.clone(),
            attachments: payload.attachments.len(),
        })
    }
}
