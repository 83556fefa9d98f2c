//! Logging sink port.
//!
//! Every component receives a [`Logger`] through its constructor; there is no
//! global logger. Delivery (stdout, tracing, a remote log service) is the
//! sink implementation's concern.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

/// Severity of a log event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `(level, group, source, message)` events.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, group: &str, source: &str, message: &str);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _group: &str, _source: &str, _message: &str) {}
}

/// A captured log event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    pub level: Level,
    pub group: String,
    pub source: String,
    pub message: String,
}

/// Keeps events in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, group: &str, source: &str, message: &str) {
        let event = LogEvent {
            level,
            group: group.to_string(),
            source: source.to_string(),
            message: message.to_string(),
        };
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// A sink bound to a log group and a source component name.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    group: Arc<str>,
    source: &'static str,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>, group: impl Into<Arc<str>>, source: &'static str) -> Self {
        Self {
            sink,
            group: group.into(),
            source,
        }
    }

    /// A logger that drops everything.
    pub fn null() -> Self {
        Self::new(Arc::new(NullSink), "", "")
    }

    /// Same sink and group, different source component.
    pub fn for_source(&self, source: &'static str) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            group: Arc::clone(&self.group),
            source,
        }
    }

    pub fn log(&self, level: Level, message: &str) {
        self.sink.log(level, &self.group, self.source, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("group", &self.group)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_tags_group_and_source() {
        let sink = Arc::new(MemorySink::new());
        let log = Logger::new(sink.clone(), "expense-tracker", "ExpenseService");
        log.info("created");
        log.for_source("BudgetService").error("boom");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, Level::Info);
        assert_eq!(events[0].group, "expense-tracker");
        assert_eq!(events[0].source, "ExpenseService");
        assert_eq!(events[1].source, "BudgetService");
        assert_eq!(events[1].message, "boom");
    }

    #[test]
    fn null_logger_is_silent() {
        Logger::null().error("nobody hears this");
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error);
        assert_eq!(Level::Warn.to_string(), "warn");
    }
}
