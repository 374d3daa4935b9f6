//! Routing of log events onto the console.
//!
//! Log output is never addressable: every event is appended through the
//! same lock as everything else. Under contention, events appear in the
//! order their threads won the lock, which need not be timestamp order.

use crate::console::Console;
use crate::writer::{ansi, WriteRequest};
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use log::{Level, LevelFilter, Log, Metadata, Record};
use simplelog::{Config, SharedLogger};
use std::sync::Arc;

/// The single hook a logging framework calls with an already rendered
/// message.
pub trait LogEventSink: Send + Sync {
    fn on_log_event(&self, level: Level, rendered: &str);
}

impl LogEventSink for Console {
    fn on_log_event(&self, level: Level, rendered: &str) {
        let (prefix, suffix) = if self.config().colored_levels {
            level_style(level)
        } else {
            (String::new(), String::new())
        };
        let payload = format!("{}\n", rendered.trim_end_matches(['\r', '\n']));
        let request = WriteRequest::append(&payload)
            .prefix(&prefix)
            .suffix(&suffix)
            .numbered(self.config().numbered)
            .fresh_line();
        // Appends are never rejected.
        let _ = self.write(&request);
    }
}

impl<T: LogEventSink + ?Sized> LogEventSink for Arc<T> {
    fn on_log_event(&self, level: Level, rendered: &str) {
        (**self).on_log_event(level, rendered)
    }
}

fn level_style(level: Level) -> (String, String) {
    let color = match level {
        Level::Error => Color::Red,
        Level::Warn => Color::Yellow,
        Level::Info => return (String::new(), String::new()),
        Level::Debug => Color::Green,
        Level::Trace => Color::Magenta,
    };
    (ansi(SetForegroundColor(color)), ansi(ResetColor))
}

/// `[WARN ] target: message`
pub fn render_record(record: &Record) -> String {
    format!(
        "[{:<5}] {}: {}",
        record.level(),
        record.target(),
        record.args()
    )
}

/// A `log` backend that feeds a [`LogEventSink`]. It is also a
/// [`SharedLogger`], so it can sit next to file loggers in a
/// `simplelog::CombinedLogger`.
pub struct ConsoleLogger {
    level: LevelFilter,
    sink: Arc<dyn LogEventSink>,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter, sink: Arc<dyn LogEventSink>) -> Box<Self> {
        Box::new(Self { level, sink })
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.sink
                .on_log_event(record.level(), &render_record(record));
        }
    }

    fn flush(&self) {}
}

impl SharedLogger for ConsoleLogger {
    fn level(&self) -> LevelFilter {
        self.level
    }

    fn config(&self) -> Option<&Config> {
        None
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        Box::new(*self)
    }
}
