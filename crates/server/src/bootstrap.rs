use std::sync::Arc;

use axum::Router;
use sift_core::config::{AppConfig, ConfigError, LoadOptions};
use sift_db::{connect_with_config, migrations, DbPool, SqlTeamCredentialRepository};
use sift_search::{AlgoliaIndexClient, AlgoliaSetupError};
use sift_slack::events::{bridge_dispatcher, EventDispatcher};
use sift_slack::web_api::{SlackClientError, SlackWebClient};
use thiserror::Error;
use tracing::info;

use crate::{health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dispatcher: Arc<EventDispatcher>,
}

impl Application {
    /// Webhook and health routes on one listener.
    pub fn router(&self) -> Router {
        let state = webhook::WebhookState::new(
            self.config.slack.verification_token.clone(),
            self.dispatcher.clone(),
        );
        webhook::router(state).merge(health::router(self.db_pool.clone()))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    SlackClient(#[from] SlackClientError),
    #[error(transparent)]
    SearchClient(#[from] AlgoliaSetupError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let credentials = Arc::new(SqlTeamCredentialRepository::new(db_pool.clone()));
    let chat = Arc::new(SlackWebClient::from_config(&config.slack)?);
    let index = Arc::new(AlgoliaIndexClient::from_config(&config.search)?);
    let dispatcher = bridge_dispatcher(credentials, chat, index, &config);
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        handlers = dispatcher.handler_count(),
        backfill_mode = ?config.backfill.mode,
        search_endpoint = %config.search.endpoint(),
        "event dispatcher wired"
    );

    Ok(Application { config, db_pool, dispatcher: Arc::new(dispatcher) })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use sift_core::config::{ConfigOverrides, LoadOptions};
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_owned()),
                slack_verification_token: Some("verify-me".to_owned()),
                search_application_id: Some("APPID".to_owned()),
                search_api_key: Some("admin-key".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_verification_token() {
        let mut options = valid_overrides("sqlite::memory:");
        options.overrides.slack_verification_token = Some("  ".to_owned());

        let result = bootstrap(options).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.verification_token"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_serves_both_routes() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'team_credential'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("count tables");
        assert_eq!(table_count, 1);
        assert_eq!(app.dispatcher.handler_count(), 3);

        let health = app
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health response");
        assert_eq!(health.status(), StatusCode::OK);

        let handshake = app
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slack/events")
                    .body(Body::from(
                        r#"{"token":"verify-me","type":"url_verification","challenge":"c"}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("webhook response");
        assert_eq!(handshake.status(), StatusCode::OK);

        app.db_pool.close().await;
    }
}
