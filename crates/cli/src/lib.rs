pub mod bootstrap;
pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use textagent_core::config::LoadOptions;

use crate::commands::handle::HandleArgs;

#[derive(Debug, Parser)]
#[command(
    name = "textagent",
    about = "Messaging and task-tracking action handlers for a conversational agent",
    long_about = "Serve agent action-group requests as one-shot handlers, apply record-store \
                  migrations, and inspect effective configuration.",
    after_help = "Examples:\n  textagent handle --service messaging < request.json\n  \
                  textagent handle --service task-tracking --lines < requests.ndjson\n  \
                  textagent migrate\n  textagent config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a TOML config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Handle action-group requests from stdin and write response envelopes")]
    Handle(HandleArgs),
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Handle(args) => commands::handle::run(options, args),
        Command::Migrate => commands::migrate::run(options),
        Command::Config => commands::config::run(options),
    };

    if !result.output.is_empty() {
        if result.is_success() {
            println!("{}", result.output);
        } else {
            eprintln!("{}", result.output);
        }
    }
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command};
    use crate::bootstrap::ServiceKind;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn handle_parses_service_and_flags() {
        let cli = Cli::try_parse_from([
            "textagent",
            "--config",
            "custom.toml",
            "handle",
            "--service",
            "task-tracking",
            "--lines",
            "--request-id",
            "req-7",
        ])
        .expect("valid arguments");

        assert_eq!(cli.config.as_deref().and_then(|p| p.to_str()), Some("custom.toml"));
        let Command::Handle(args) = cli.command else {
            panic!("expected handle command");
        };
        assert_eq!(args.service, ServiceKind::TaskTracking);
        assert!(args.lines);
        assert_eq!(args.request_id.as_deref(), Some("req-7"));
    }

    #[test]
    fn handle_requires_a_service() {
        assert!(Cli::try_parse_from(["textagent", "handle"]).is_err());
    }
}
