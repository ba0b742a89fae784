//! reip - Real Estate Intelligence Portal
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use reip::cli::{self, Cli, Commands};
use reip::core::logging;
use reip::render::{RenderOptions, error::render_error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::from_arg)
        .or_else(logging::parse_log_level_from_env)
        .unwrap_or_default();
    let log_format = if cli.json_output {
        logging::LogFormat::Json
    } else {
        logging::parse_log_format_from_env().unwrap_or_default()
    };
    logging::init(
        log_level,
        log_format,
        logging::parse_log_file_from_env(),
        cli.verbose,
    );

    let options = RenderOptions {
        format: cli.effective_format(),
        pretty: cli.pretty,
        no_color: !reip::util::env::should_use_color(cli.no_color),
    };
    let command = command_name(cli.command.as_ref());

    match run(&cli, options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(
                command,
                error_code = e.error_code(),
                category = ?e.category(),
                "Command failed"
            );
            eprintln!("{}", render_error(&e, command, options));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: &Cli, options: RenderOptions) -> reip::Result<()> {
    let Some(command) = &cli.command else {
        print_quickstart();
        return Ok(());
    };

    match command {
        Commands::Check(args) => cli::check::execute(cli, args, options).await,
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "reip", &mut std::io::stdout());
            Ok(())
        }
        Commands::Whoami => cli::account::whoami(&cli::open_portal(cli)?, options).await,
        Commands::Usage => cli::account::usage(&cli::open_portal(cli)?, options).await,
        Commands::Lookup(args) => cli::lookup::execute(&cli::open_portal(cli)?, args, options).await,
        Commands::Portfolio(cmd) => {
            cli::portfolio::execute(&cli::open_portal(cli)?, cmd, options).await
        }
        Commands::Orders(args) => cli::orders::execute(&cli::open_portal(cli)?, args, options).await,
    }
}

const fn command_name(command: Option<&Commands>) -> &'static str {
    match command {
        None => "reip",
        Some(Commands::Whoami) => "whoami",
        Some(Commands::Lookup(_)) => "lookup",
        Some(Commands::Portfolio(_)) => "portfolio",
        Some(Commands::Orders(_)) => "orders",
        Some(Commands::Usage) => "usage",
        Some(Commands::Check(_)) => "check",
        Some(Commands::Completions { .. }) => "completions",
    }
}

/// Print quickstart help when no command is given.
fn print_quickstart() {
    println!(
        r#"reip - Real Estate Intelligence Portal

USAGE:
    reip [OPTIONS] <COMMAND>

COMMANDS:
    whoami          Sign in and show the current user
    lookup          Look up and analyze a property
    portfolio       List or delete saved properties
    orders          List recent orders
    usage           Show this month's API usage
    check           Validate configuration and secrets

QUICK START:
    reip check                                  # Verify secrets.toml
    reip lookup "123 Main St, Springfield, IL"  # Property report
    reip lookup "..." --save                    # ...and save it
    reip portfolio list                         # Saved properties

ROBOT MODE:
    reip usage --json                           # JSON envelope output

For more help: reip --help
Version: {}"#,
        env!("CARGO_PKG_VERSION")
    );
}
