use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod console;
mod repl;

#[derive(Parser)]
#[command(
    name = "pomoplex",
    version,
    about = "Run many pomodoro timers from one console",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: commands::run::RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive timer console (default)
    Run(commands::run::RunArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("POMOPLEX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Run(args)) => commands::run::run(args).map_err(Into::into),
        Some(Commands::Config { action }) => commands::config::run(action),
        None => commands::run::run(cli.run).map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
