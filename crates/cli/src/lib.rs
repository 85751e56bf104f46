pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::team::TeamAddArgs;

#[derive(Debug, Parser)]
#[command(
    name = "sift",
    about = "Sift operator CLI",
    long_about = "Operate the Slack search bridge: migrations, config inspection, readiness checks, team registration and manual backfill.",
    after_help = "Examples:\n  sift doctor --json\n  sift team add T024BE7LD --bot-token xoxb-... --user-token xoxp-...\n  sift backfill T024BE7LD C024BE91L --passes 3"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credential database and team registrations")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Manage per-team install records", subcommand)]
    Team(TeamCommand),
    #[command(about = "Index a channel's history outside the webhook path")]
    Backfill {
        #[arg(help = "Team id whose credential record is used")]
        team_id: String,
        #[arg(help = "Channel id to backfill")]
        channel: String,
        #[arg(long, default_value_t = 1, help = "Budgeted passes to chain")]
        passes: u32,
    },
}

#[derive(Debug, Subcommand)]
enum TeamCommand {
    #[command(about = "Register or replace a team's tokens")]
    Add(AddTeam),
    #[command(about = "List registered teams without tokens")]
    List,
}

#[derive(Debug, Args)]
struct AddTeam {
    team_id: String,
    #[arg(long, help = "Bot access token (xoxb-...)")]
    bot_token: String,
    #[arg(long, help = "User access token used for history reads (xoxp-...)")]
    user_token: String,
    #[arg(long, help = "Bot user id; looked up with auth.test when omitted")]
    bot_user_id: Option<String>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Team(TeamCommand::Add(add)) => commands::team::add(TeamAddArgs {
            team_id: add.team_id,
            bot_token: add.bot_token,
            user_token: add.user_token,
            bot_user_id: add.bot_user_id,
        }),
        Command::Team(TeamCommand::List) => commands::team::list(),
        Command::Backfill { team_id, channel, passes } => {
            commands::backfill::run(&team_id, &channel, passes)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command, TeamCommand};

    #[test]
    fn team_add_parses_optional_bot_user_id() {
        let cli = Cli::try_parse_from([
            "sift",
            "team",
            "add",
            "T1",
            "--bot-token",
            "xoxb-1",
            "--user-token",
            "xoxp-1",
        ])
        .expect("parse");

        let Command::Team(TeamCommand::Add(add)) = cli.command else {
            panic!("expected team add");
        };
        assert_eq!(add.team_id, "T1");
        assert!(add.bot_user_id.is_none());
    }

    #[test]
    fn backfill_defaults_to_a_single_pass() {
        let cli = Cli::try_parse_from(["sift", "backfill", "T1", "C1"]).expect("parse");

        let Command::Backfill { passes, .. } = cli.command else {
            panic!("expected backfill");
        };
        assert_eq!(passes, 1);
    }
}
