use sift_core::domain::team::{AccessToken, TeamCredential, TeamId};
use sift_db::{
    connect_with_config, SqlTeamCredentialRepository, TeamCredentialRepository, TeamInstall,
};
use sift_slack::web_api::SlackWebClient;

use crate::commands::{load_config, runtime, CommandResult};

#[derive(Clone, Debug)]
pub struct TeamAddArgs {
    pub team_id: String,
    pub bot_token: String,
    pub user_token: String,
    /// Resolved with `auth.test` on the bot token when absent.
    pub bot_user_id: Option<String>,
}

type Failure = (&'static str, String, u8);

/// Registers or replaces a team's install record.
pub fn add(args: TeamAddArgs) -> CommandResult {
    let config = match load_config("team add") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("team add") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        if args.bot_token.trim().is_empty() || args.user_token.trim().is_empty() {
            return Err::<String, Failure>((
                "invalid_argument",
                "both --bot-token and --user-token are required".to_owned(),
                2,
            ));
        }

        let bot_user_id = match args.bot_user_id.clone() {
            Some(bot_user_id) => bot_user_id,
            None => {
                let client = SlackWebClient::from_config(&config.slack)
                    .map_err(|error| ("slack_client", error.to_string(), 3u8))?;
                let identity = client
                    .auth_identity(&AccessToken::new(args.bot_token.clone()))
                    .await
                    .map_err(|error| ("slack_identity", error.to_string(), 6u8))?;
                if identity.team_id != args.team_id {
                    return Err((
                        "team_mismatch",
                        format!(
                            "bot token belongs to team `{}`, not `{}`",
                            identity.team_id, args.team_id
                        ),
                        6,
                    ));
                }
                identity.user_id
            }
        };

        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let credential = TeamCredential::new(
            args.team_id.clone(),
            args.bot_token.clone(),
            args.user_token.clone(),
            bot_user_id.clone(),
        );
        let saved = SqlTeamCredentialRepository::new(pool.clone())
            .save(TeamInstall::new(credential))
            .await
            .map_err(|error| ("credential_store", error.to_string(), 5u8));
        pool.close().await;
        saved?;

        Ok(format!("registered team `{}` with bot user `{bot_user_id}`", args.team_id))
    });

    match result {
        Ok(message) => CommandResult::success("team add", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("team add", error_class, message, exit_code)
        }
    }
}

/// Lists registered teams without their tokens.
pub fn list() -> CommandResult {
    let config = match load_config("team list") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("team list") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result: Result<Vec<TeamInstall>, Failure> = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let installs = SqlTeamCredentialRepository::new(pool.clone())
            .list()
            .await
            .map_err(|error| ("credential_store", error.to_string(), 5u8));
        pool.close().await;
        installs
    });

    match result {
        Ok(installs) if installs.is_empty() => {
            CommandResult::success("team list", "no teams registered")
        }
        Ok(installs) => {
            let lines: Vec<String> = installs.iter().map(render_install).collect();
            CommandResult::success("team list", lines.join("\n"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("team list", error_class, message, exit_code)
        }
    }
}

fn render_install(install: &TeamInstall) -> String {
    let TeamId(team_id) = &install.credential.team_id;
    format!(
        "{team_id} bot_user={} installed_at={}",
        install.credential.bot_user_id,
        install.installed_at.to_rfc3339()
    )
}
