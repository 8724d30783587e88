//! Terminal output shared by the command loop and the event listener.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use pomoplex_core::{Listener, TimeUnit, Timer, TimerStatus};

const ANSI_GREEN: &str = "\u{1b}[32m";
const ANSI_RED: &str = "\u{1b}[31m";
const ANSI_RESET: &str = "\u{1b}[0m";

pub const PROMPT: &str = "pomodoro> ";

/// Serializes writes from the input loop and the delivery thread so that a
/// notification never splits a line the user is reading.
pub struct Console {
    ansi: bool,
    interactive: bool,
    lock: Mutex<()>,
}

impl Console {
    pub fn new(ansi: bool, interactive: bool) -> Self {
        Self {
            ansi,
            interactive,
            lock: Mutex::new(()),
        }
    }

    fn paint(&self, color: &str, msg: &str) -> String {
        if self.ansi {
            format!("{color}{msg}{ANSI_RESET}")
        } else {
            msg.to_string()
        }
    }

    fn write(&self, text: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    /// Text only shown to a person at a terminal.
    pub fn hint(&self, text: &str) {
        if self.interactive {
            self.write(text);
        }
    }

    pub fn prompt(&self) {
        self.hint(PROMPT);
    }

    /// Asynchronous notification: starts on a fresh line and re-prompts.
    pub fn notice(&self, msg: &str) {
        let mut text = format!("\n{}\n", self.paint(ANSI_GREEN, msg));
        if self.interactive {
            text.push_str(PROMPT);
        }
        self.write(&text);
    }

    pub fn error(&self, msg: &str) {
        self.write(&format!("{}\n", self.paint(ANSI_RED, msg)));
    }
}

/// Prints every timer event as a one-line notice.
pub struct ConsoleListener {
    console: Arc<Console>,
    show_ticks: bool,
}

impl ConsoleListener {
    pub fn new(console: Arc<Console>, show_ticks: bool) -> Self {
        Self {
            console,
            show_ticks,
        }
    }

    fn say(&self, timer: &Timer, what: std::fmt::Arguments<'_>) {
        self.console.notice(&format!("{}: {what}", timer.name()));
    }
}

impl Listener for ConsoleListener {
    fn on_tick(&self, timer: &Timer, status: TimerStatus, elapsed: u64, total: u64, unit: TimeUnit) {
        if self.show_ticks {
            self.say(timer, format_args!("{status} {elapsed} of {total} ({unit})"));
        }
    }

    fn on_timer_removed(&self, timer: &Timer) {
        self.say(timer, format_args!("removed"));
    }

    fn on_timer_suspended(&self, timer: &Timer) {
        self.say(timer, format_args!("suspended"));
    }

    fn on_timer_resumed(&self, timer: &Timer) {
        self.say(timer, format_args!("resumed"));
    }

    fn on_activity_started(&self, timer: &Timer, duration: u64, unit: TimeUnit) {
        self.say(timer, format_args!("activity started ({duration} {unit})"));
    }

    fn on_activity_ended(&self, timer: &Timer, pomodoro_count: u32) {
        self.say(timer, format_args!("activity ended ({pomodoro_count} pomodoros)"));
    }

    fn on_break_started(&self, timer: &Timer, duration: u64, unit: TimeUnit) {
        self.say(timer, format_args!("break started ({duration} {unit})"));
    }

    fn on_timer_stopped(&self, timer: &Timer, pomodoro_count: u32) {
        self.say(timer, format_args!("timer stopped ({pomodoro_count} pomodoros)"));
    }

    fn on_timer_ended(&self, timer: &Timer, pomodoro_count: u32) {
        self.say(timer, format_args!("timer ended ({pomodoro_count} pomodoros)"));
    }
}
