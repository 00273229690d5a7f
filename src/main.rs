use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use auditlog::audit::JsonlSink;
use auditlog::cli::{handle_log_command, handle_tracked_command, LogCommands, TrackedCommands};
use auditlog::config::{paths::AuditPaths, settings::Settings};

#[derive(Parser)]
#[command(
    name = "auditlog",
    version,
    about = "Inspect the field-level audit trail of tracked records",
    long_about = "auditlog reads the append-only audit log written by the \
                  change-diffing engine and shows who changed what, from \
                  where, and which fields moved from which value to which."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit log inspection commands
    #[command(subcommand)]
    Log(LogCommands),

    /// Tracked entity type commands
    #[command(subcommand)]
    Tracked(TrackedCommands),

    /// Write a default settings file
    Init,

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = AuditPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Log(cmd)) => {
            let sink = JsonlSink::new(settings.audit_log_path(&paths));
            handle_log_command(&sink, &settings, cmd)?;
        }
        Some(Commands::Tracked(cmd)) => {
            handle_tracked_command(&settings, cmd)?;
        }
        Some(Commands::Init) => {
            if paths.is_initialized() {
                println!(
                    "Settings already exist at: {}",
                    paths.settings_file().display()
                );
            } else {
                settings.save(&paths)?;
                println!("Settings written to: {}", paths.settings_file().display());
            }
        }
        Some(Commands::Config) => {
            println!("auditlog Configuration");
            println!("======================");
            println!("Base directory: {}", paths.base_dir().display());
            println!("Settings file:  {}", paths.settings_file().display());
            println!("Audit log:      {}", settings.audit_log_path(&paths).display());
            println!("Sink:           {:?}", settings.sink);
            println!("Log filter:     {}", settings.log_filter);
            println!("Tracked types:  {}", settings.tracked.len());
        }
        None => {
            println!("auditlog - field-level audit trail viewer");
            println!();
            println!("Run 'auditlog --help' for usage information.");
        }
    }

    Ok(())
}
