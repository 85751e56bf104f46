use std::sync::Arc;

use sift_core::backfill::{BackfillEngine, BackfillReport, PageBudget};
use sift_core::credentials::require_credential;
use sift_core::indexer::MessageIndexer;
use sift_db::{connect_with_config, SqlTeamCredentialRepository};
use sift_search::AlgoliaIndexClient;
use sift_slack::web_api::SlackWebClient;

use crate::commands::{load_config, runtime, CommandResult};

type Failure = (&'static str, String, u8);

/// Manual backfill of one channel, chaining up to `passes` budgeted passes.
pub fn run(team_id: &str, channel: &str, passes: u32) -> CommandResult {
    let config = match load_config("backfill") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("backfill") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result: Result<BackfillReport, Failure> = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let outcome = async {
            let credentials = SqlTeamCredentialRepository::new(pool.clone());
            let credential = require_credential(&credentials, team_id)
                .await
                .map_err(|error| (error.error_class(), error.to_string(), 5u8))?;

            let chat = SlackWebClient::from_config(&config.slack)
                .map_err(|error| ("slack_client", error.to_string(), 3u8))?;
            let index = AlgoliaIndexClient::from_config(&config.search)
                .map_err(|error| ("search_client", error.to_string(), 3u8))?;
            let engine = BackfillEngine::new(
                Arc::new(chat),
                Arc::new(MessageIndexer::new(Arc::new(index))),
                PageBudget::new(config.backfill.page_budget),
            );

            let report = engine
                .run_passes(&credential, channel, passes.max(1))
                .await
                .map_err(|error| (error.error_class(), error.to_string(), 6u8))?;
            Ok::<BackfillReport, Failure>(report)
        }
        .await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(report) => CommandResult::success("backfill", summarize(&report)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("backfill", error_class, message, exit_code)
        }
    }
}

fn summarize(report: &BackfillReport) -> String {
    let mut summary = format!(
        "channel {}: indexed {} message(s), skipped {}, {} page(s) over {} pass(es)",
        report.channel, report.indexed, report.skipped, report.pages_fetched, report.passes
    );
    if let Some(cursor) = &report.resume_from {
        summary.push_str(&format!(
            "; truncated, older history remains before {}",
            cursor.oldest_ts
        ));
    }
    summary
}
