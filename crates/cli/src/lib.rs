pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "concierge",
    about = "Concierge operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations, and send one-off \
                  messages through the assistant pipeline.",
    after_help = "Examples:\n  concierge doctor --json\n  concierge config\n  concierge ask --key U123 \"Do you stock gloves?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Validate config, database connectivity, and schema version")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one message through the assistant as the given conversation key")]
    Ask {
        #[arg(long, help = "Conversation key (e.g. a LINE user id)")]
        key: String,
        #[arg(help = "Message text")]
        text: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Ask { key, text } => commands::ask::run(&key, &text),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
