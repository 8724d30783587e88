use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::Args;
use pomoplex_core::{Config, ConfigError, CoreError, TimeUnit, TimerManager, TimerManagerBuilder};

use crate::console::{Console, ConsoleListener};
use crate::repl::{self, Flow};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Maximum number of timers running at once
    #[arg(long)]
    pub pool_size: Option<usize>,
    /// Time unit for schedule entries (seconds, minutes, hours, days)
    #[arg(long)]
    pub unit: Option<TimeUnit>,
    /// Default schedule as comma-separated durations, e.g. 25,5,25,15
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub schedule: Option<Vec<i64>>,
    /// Report events from the start instead of waiting for `li`
    #[arg(long)]
    pub talk: bool,
    /// Colour notifications and errors
    #[arg(long)]
    pub ansi: bool,
    /// Do not print tick notifications
    #[arg(long)]
    pub no_ticks: bool,
    /// Read configuration from this file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    /// Command-line flags win over the configuration file.
    fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(pool_size) = self.pool_size {
            config.manager.max_active_timers = pool_size;
        }
        if let Some(unit) = self.unit {
            config.manager.time_unit = unit;
        }
        if let Some(schedule) = &self.schedule {
            config.manager.default_schedule = schedule.clone();
        }
        if self.talk {
            config.manager.talk = true;
        }
        if self.ansi {
            config.cli.ansi = true;
        }
        if self.no_ticks {
            config.cli.show_ticks = false;
        }
        config.manager.validate()?;
        Ok(())
    }
}

/// Exit status after a termination signal, shell style (128 + signal).
const EXIT_ON_SIGINT: i32 = 130;
#[cfg(unix)]
const EXIT_ON_SIGTERM: i32 = 143;

async fn termination_signal() -> io::Result<i32> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| EXIT_ON_SIGINT),
            _ = terminate.recv() => Ok(EXIT_ON_SIGTERM),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| EXIT_ON_SIGINT)
    }
}

/// Shut the manager down when the process is asked to terminate, so every
/// running timer still reports its stop before the process exits.
fn watch_signals(manager: Arc<TimerManager>) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("pomoplex-signals".into())
        .spawn(move || {
            let code = match runtime.block_on(termination_signal()) {
                Ok(code) => code,
                Err(e) => {
                    tracing::warn!("cannot listen for termination signals: {e}");
                    return;
                }
            };
            tracing::info!(code, "termination signal received, shutting down");
            manager.shutdown();
            std::process::exit(code);
        })?;
    Ok(())
}

pub fn run(args: RunArgs) -> pomoplex_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default(),
    };
    args.apply(&mut config)?;

    let interactive = io::stdin().is_terminal();
    let console = Arc::new(Console::new(config.cli.ansi, interactive));
    let manager = Arc::new(
        TimerManagerBuilder::from_config(&config.manager)?
            .listener(ConsoleListener::new(Arc::clone(&console), config.cli.show_ticks))
            .build()?,
    );
    watch_signals(Arc::clone(&manager))?;

    console.hint("Welcome to pomoplex. Type 'help' for help.\n");
    console.prompt();

    let mut stdout = io::stdout();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let outcome = repl::parse(&line)
            .map_err(|e| CoreError::Custom(e.to_string()))
            .and_then(|command| repl::execute(command, &manager, &mut stdout));
        match outcome {
            Ok(Flow::Exit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => console.error(&e.to_string()),
        }
        console.prompt();
    }

    let report = manager.shutdown();
    tracing::debug!(
        timers_stopped = report.timers_stopped,
        clean = report.is_clean(),
        "console closed"
    );
    Ok(())
}
