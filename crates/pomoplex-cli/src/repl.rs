//! Line commands understood by the interactive console.

use std::io::Write;
use std::thread;
use std::time::Duration;

use pomoplex_core::{ExecutionSchedule, TimerManager};

pub const HELP: &str = "\
 1. a [silent] <name> [<d1> <d2>...] ........ add timer
 2. ls ....................................... list timers
 3. mv <name> <new_name> ..................... rename timer
 4. su <name> ................................ suspend timer
 5. re <name> ................................ resume timer
 6. rm <name> ................................ remove timer
 7. li [<name>] .............................. start listening to timer(s)
 8. stfu [<name>] ............................ stop listening to timer(s)
 9. cl ....................................... clear (remove all timers)
10. sl <secs> ................................ sleep (for scripted input)
11. bye ...................................... exit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Add {
        name: String,
        talk: bool,
        durations: Vec<i64>,
    },
    List,
    Rename {
        name: String,
        new_name: String,
    },
    Suspend(String),
    Resume(String),
    Remove(String),
    Listen(Option<String>),
    Mute(Option<String>),
    Clear,
    Sleep(u64),
    Bye,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid syntax.")]
    InvalidSyntax,
    #[error("Invalid command.")]
    InvalidCommand,
}

/// Whether the loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

fn one(args: &[&str]) -> Result<String, ParseError> {
    match args {
        [name] => Ok((*name).to_string()),
        _ => Err(ParseError::InvalidSyntax),
    }
}

fn optional(args: &[&str]) -> Result<Option<String>, ParseError> {
    match args {
        [] => Ok(None),
        [name] => Ok(Some((*name).to_string())),
        _ => Err(ParseError::InvalidSyntax),
    }
}

fn none(args: &[&str], command: Command) -> Result<Command, ParseError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(ParseError::InvalidSyntax)
    }
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(Command::Empty);
    };

    match verb {
        "help" => none(args, Command::Help),
        "a" => {
            let (talk, rest) = match args {
                ["silent", rest @ ..] => (false, rest),
                rest => (true, rest),
            };
            let (name, durations) = rest.split_first().ok_or(ParseError::InvalidSyntax)?;
            let durations = durations
                .iter()
                .map(|d| d.parse::<i64>().map_err(|_| ParseError::InvalidSyntax))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::Add {
                name: (*name).to_string(),
                talk,
                durations,
            })
        }
        "ls" => none(args, Command::List),
        "mv" => match args {
            [name, new_name] => Ok(Command::Rename {
                name: (*name).to_string(),
                new_name: (*new_name).to_string(),
            }),
            _ => Err(ParseError::InvalidSyntax),
        },
        "su" => one(args).map(Command::Suspend),
        "re" => one(args).map(Command::Resume),
        "rm" => one(args).map(Command::Remove),
        "li" => optional(args).map(Command::Listen),
        "stfu" => optional(args).map(Command::Mute),
        "cl" => none(args, Command::Clear),
        "sl" => one(args)?
            .parse::<u64>()
            .map(Command::Sleep)
            .map_err(|_| ParseError::InvalidSyntax),
        "bye" => none(args, Command::Bye),
        _ => Err(ParseError::InvalidCommand),
    }
}

/// Run one command against the manager. Listings and help go to `out`;
/// everything else reports through listeners.
pub fn execute(
    command: Command,
    manager: &TimerManager,
    out: &mut impl Write,
) -> pomoplex_core::Result<Flow> {
    match command {
        Command::Empty => {}
        Command::Help => out.write_all(HELP.as_bytes())?,
        Command::Add {
            name,
            talk,
            durations,
        } => {
            let schedule = if durations.is_empty() {
                None
            } else {
                Some(ExecutionSchedule::try_from_signed(&durations)?)
            };
            manager.add_with(&name, talk, schedule)?;
        }
        Command::List => {
            for timer in manager.list() {
                writeln!(
                    out,
                    "{:<20} {:<10} {}",
                    timer.name(),
                    timer.status().to_string(),
                    timer.pomodoro_count()
                )?;
            }
        }
        Command::Rename { name, new_name } => manager.rename(&name, &new_name)?,
        Command::Suspend(name) => manager.suspend(&name)?,
        Command::Resume(name) => manager.resume(&name)?,
        Command::Remove(name) => {
            manager.remove(&name)?;
        }
        Command::Listen(None) => manager.talk(),
        Command::Listen(Some(name)) => manager.talk_timer(&name)?,
        Command::Mute(None) => manager.stfu(),
        Command::Mute(Some(name)) => manager.stfu_timer(&name)?,
        Command::Clear => {
            let removed = manager.clear();
            tracing::debug!(removed, "cleared timers");
        }
        Command::Sleep(secs) => thread::sleep(Duration::from_secs(secs)),
        Command::Bye => return Ok(Flow::Exit),
    }
    out.flush()?;
    Ok(Flow::Continue)
}
