use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::sync::OnceLock;
use tokio::sync::broadcast;

static LOGGER: OnceLock<ForwardingLogger> = OnceLock::new();

const LOG_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub level: String,
    pub message: String,
    pub timestamp: String,
}

/// Writes log records to stderr and forwards them to the host app.
pub struct ForwardingLogger {
    tx: broadcast::Sender<LogMessage>,
    level: LevelFilter,
}

impl ForwardingLogger {
    pub fn new(level: LevelFilter) -> Self {
        let (tx, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self { tx, level }
    }

    /// Installs the logger process-wide.
    pub fn init(level: LevelFilter) -> Result<&'static ForwardingLogger, SetLoggerError> {
        let logger = LOGGER.get_or_init(|| ForwardingLogger::new(level));
        log::set_logger(logger).map(|()| log::set_max_level(level))?;
        Ok(logger)
    }

    /// The installed logger, if `init` succeeded
    pub fn installed() -> Option<&'static ForwardingLogger> {
        LOGGER.get()
    }

    /// Receives every log line emitted after subscribing
    pub fn subscribe(&self) -> broadcast::Receiver<LogMessage> {
        self.tx.subscribe()
    }

    fn forward(&self, record: &Record) {
        let log_message = LogMessage {
            level: record.level().to_string(),
            message: record.args().to_string(),
            timestamp: Local::now().to_rfc3339(),
        };
        // No subscribers is the normal case before the UI attaches.
        let _ = self.tx.send(log_message);
    }
}

impl log::Log for ForwardingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
            self.forward(record);
        }
    }

    fn flush(&self) {}
}
