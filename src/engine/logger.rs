//! # Engine logger.
//!
//! Construction strategies receive a [`Logger`] and hand it to the engine they
//! build, so backend diagnostics end up wherever the consumer wants them.
//!
//! - [`NoopLogger`] discards everything.
//! - [`TracingLogger`] forwards to `tracing` with `source`/`category` fields.
//! - [`AllLogger`] fans out to several loggers; `AllLogger::default()` (no
//!   children) is the default logger of an [`EngineConfig`](crate::EngineConfig).

use std::fmt;
use std::sync::Arc;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for engine diagnostics.
///
/// `source` names the emitting component (e.g. `"pdfium"`), `category` a
/// sub-area (e.g. `"render"`).
pub trait Logger: Send + Sync + 'static {
    fn log(&self, level: Level, source: &str, category: &str, message: &str);

    fn debug(&self, source: &str, category: &str, message: &str) {
        self.log(Level::Debug, source, category, message);
    }

    fn info(&self, source: &str, category: &str, message: &str) {
        self.log(Level::Info, source, category, message);
    }

    fn warn(&self, source: &str, category: &str, message: &str) {
        self.log(Level::Warn, source, category, message);
    }

    fn error(&self, source: &str, category: &str, message: &str) {
        self.log(Level::Error, source, category, message);
    }
}

/// Shared logger handle.
pub type LoggerRef = Arc<dyn Logger>;

/// Discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _source: &str, _category: &str, _message: &str) {}
}

/// Forwards every line to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, source: &str, category: &str, message: &str) {
        match level {
            Level::Debug => tracing::debug!(source, category, "{message}"),
            Level::Info => tracing::info!(source, category, "{message}"),
            Level::Warn => tracing::warn!(source, category, "{message}"),
            Level::Error => tracing::error!(source, category, "{message}"),
        }
    }
}

/// Fans every line out to all children, in order.
#[derive(Default, Clone)]
pub struct AllLogger {
    loggers: Vec<LoggerRef>,
}

impl AllLogger {
    pub fn new(loggers: Vec<LoggerRef>) -> Self {
        Self { loggers }
    }

    /// Number of child loggers.
    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl Logger for AllLogger {
    fn log(&self, level: Level, source: &str, category: &str, message: &str) {
        for logger in &self.loggers {
            logger.log(level, source, category, message);
        }
    }
}

impl fmt::Debug for AllLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllLogger")
            .field("loggers", &self.loggers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<String>>);

    impl Logger for Capture {
        fn log(&self, level: Level, source: &str, category: &str, message: &str) {
            self.0
                .lock()
                .push(format!("{level:?} {source}/{category}: {message}"));
        }
    }

    #[test]
    fn test_all_logger_fans_out_in_order() {
        let a = Arc::new(Capture::default());
        let b = Arc::new(Capture::default());
        let all = AllLogger::new(vec![a.clone(), Arc::new(NoopLogger), b.clone()]);

        all.warn("pdfium", "render", "slow page");
        all.debug("pdfium", "open", "doc-1");

        let expected = vec![
            "Warn pdfium/render: slow page".to_string(),
            "Debug pdfium/open: doc-1".to_string(),
        ];
        assert_eq!(*a.0.lock(), expected);
        assert_eq!(*b.0.lock(), expected);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_default_all_logger_is_empty() {
        let all = AllLogger::default();
        assert!(all.is_empty());
        all.error("pdfium", "init", "ignored");
    }
}
