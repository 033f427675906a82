pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rise_core::config::LoadOptions;

use commands::chat::ChatArgs;

#[derive(Debug, Parser)]
#[command(
    name = "rise",
    about = "Rise Construction operator CLI",
    long_about = "Prepare the Rise database, inspect configuration, check readiness, and run \
                  assistant turns from the terminal.",
    after_help = "Examples:\n  rise migrate\n  rise seed\n  rise doctor --json\n  \
                  rise chat --role admin \"list pending projects\""
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a rise.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo equipment, labour and project catalog")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model settings, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one message to the assistant as a staff role")]
    Chat {
        #[arg(long, default_value = "user", help = "Caller tier: user, admin or super_admin")]
        role: String,
        #[arg(long, help = "Continue an existing session instead of starting a new one")]
        session: Option<String>,
        message: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&options),
        Command::Seed => commands::seed::run(&options),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Chat { role, session, message } => {
            commands::chat::run(&options, ChatArgs { role, session, message })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
