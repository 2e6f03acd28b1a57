use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log record emitted during an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub request_id: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Formats the record as `2024-05-01T10:00:00 abc-123 [INFO] message`.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} [{}] {}",
            self.timestamp.format("%FT%T"),
            self.request_id,
            self.level,
            self.message
        )
    }
}

#[derive(Debug, Error)]
#[error("Log sink failure: {0}")]
pub struct SinkError(pub String);

/// Destination of log records, e.g. the process log or a buffer returned to the caller.
/// Sinks may fail, but the failure is only ever reported back to the logger, never to the handler.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError>;
}

/// Forwards records to `tracing` with the request ID attached as the `requestId` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let request_id = record.request_id.as_str();
        match record.level {
            LogLevel::Debug => debug!(requestId = request_id, "{}", record.message),
            LogLevel::Info => info!(requestId = request_id, "{}", record.message),
            LogLevel::Warn => warn!(requestId = request_id, "{}", record.message),
            LogLevel::Error => error!(requestId = request_id, "{}", record.message),
        }
        Ok(())
    }
}

/// Keeps records in memory.
/// The host uses it to return the invocation log to the caller in `x-fc-log-result`.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything logged so far.
    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Removes and returns everything logged so far.
    pub fn take(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(mut records) => std::mem::take(&mut *records),
            Err(_) => Vec::new(),
        }
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        match self.records.lock() {
            Ok(mut records) => {
                records.push(record.clone());
                Ok(())
            }
            Err(e) => Err(SinkError(format!("Poisoned log buffer: {e}"))),
        }
    }
}

/// A logger bound to one invocation.
/// Every record it emits carries the request ID it was created with.
///
/// Logging is fire-and-forget: a failing sink is reported at debug level and otherwise ignored,
/// so it can never change the outcome of the invocation.
#[derive(Clone)]
pub struct RequestLogger {
    request_id: Arc<str>,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl RequestLogger {
    pub fn new(request_id: &str, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            request_id: Arc::from(request_id),
            sinks,
        }
    }

    /// Adds another destination for the records of this invocation.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let record = LogRecord {
            request_id: self.request_id.to_string(),
            level,
            message: message.into(),
            timestamp: Utc::now(),
        };

        for sink in &self.sinks {
            if let Err(e) = sink.emit(&record) {
                debug!(requestId = &*self.request_id, "Log record dropped: {e}");
            }
        }
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("request_id", &self.request_id)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Creates a logger per invocation, keyed by its request ID.
/// The host owns the factory and passes the logger into every call.
pub trait LoggerFactory: Send + Sync {
    fn logger(&self, request_id: &str) -> RequestLogger;
}

/// The default factory: records go to `tracing` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLoggerFactory;

impl LoggerFactory for TracingLoggerFactory {
    fn logger(&self, request_id: &str) -> RequestLogger {
        RequestLogger::new(request_id, vec![Arc::new(TracingSink) as Arc<dyn LogSink>])
    }
}

/// Joins the records into a single header-safe line with newlines escaped as `\n`.
pub fn escape_log(records: &[LogRecord]) -> String {
    records
        .iter()
        .map(|r| r.to_line())
        .collect::<Vec<String>>()
        .join("\n")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSink;

    impl LogSink for BrokenSink {
        fn emit(&self, _record: &LogRecord) -> Result<(), SinkError> {
            Err(SinkError("unreachable".to_owned()))
        }
    }

    #[test]
    fn every_record_is_tagged_with_request_id() {
        let sink = Arc::new(MemorySink::new());
        let logger = RequestLogger::new("abc-123", vec![sink.clone() as Arc<dyn LogSink>]);

        logger.info("one");
        logger.warn("two");
        logger.error("three");

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.request_id == "abc-123"));
        assert_eq!(records[1].level, LogLevel::Warn);
        assert_eq!(records[2].message, "three");
    }

    #[test]
    fn broken_sink_does_not_stop_other_sinks() {
        let sink = Arc::new(MemorySink::new());
        let sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(BrokenSink), Arc::new(TracingSink)];
        let logger = RequestLogger::new("req-1", sinks).with_sink(sink.clone());

        logger.info("still logged");

        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn take_drains_the_buffer() {
        let sink = Arc::new(MemorySink::new());
        let logger = RequestLogger::new("req-1", vec![sink.clone() as Arc<dyn LogSink>]);
        logger.debug("x");

        assert_eq!(sink.take().len(), 1);
        assert!(sink.take().is_empty());
    }

    #[test]
    fn lines_carry_request_id_and_level() {
        let sink = Arc::new(MemorySink::new());
        let logger = RequestLogger::new("abc-123", vec![sink.clone() as Arc<dyn LogSink>]);
        logger.info("hello\nworld");

        let line = sink.records()[0].to_line();
        assert!(line.ends_with(" abc-123 [INFO] hello\nworld"));

        let escaped = escape_log(&sink.records());
        assert!(!escaped.contains('\n'));
        assert!(escaped.ends_with("hello\\nworld"));
    }

    #[test]
    fn factory_binds_the_request_id() {
        let logger = TracingLoggerFactory.logger("req-42");
        assert_eq!(logger.request_id(), "req-42");
    }

    /// Collects the fields of every tracing event as `(level, name, value)`.
    #[derive(Clone, Default)]
    struct FieldRecorder(Arc<Mutex<Vec<(tracing::Level, String, String)>>>);

    struct FieldVisitor<'a> {
        level: tracing::Level,
        fields: &'a mut Vec<(tracing::Level, String, String)>,
    }

    impl tracing::field::Visit for FieldVisitor<'_> {
        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.fields.push((self.level, field.name().to_owned(), value.to_owned()));
        }

        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
            self.fields.push((self.level, field.name().to_owned(), format!("{value:?}")));
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FieldRecorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            let mut fields = self.0.lock().unwrap();
            let mut visitor = FieldVisitor {
                level: *event.metadata().level(),
                fields: &mut fields,
            };
            event.record(&mut visitor);
        }
    }

    #[test]
    fn tracing_events_carry_request_id_field() {
        use tracing_subscriber::layer::SubscriberExt;

        let recorder = FieldRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());

        tracing::subscriber::with_default(subscriber, || {
            let logger = RequestLogger::new("abc-123", vec![Arc::new(TracingSink) as Arc<dyn LogSink>]);
            logger.debug("one");
            logger.info("two");
            logger.warn("three");
            logger.error("four");
        });

        let fields = recorder.0.lock().unwrap();
        let request_ids: Vec<&(tracing::Level, String, String)> =
            fields.iter().filter(|(_, name, _)| name == "requestId").collect();
        assert_eq!(request_ids.len(), 4);
        assert!(request_ids.iter().all(|(_, _, value)| value == "abc-123"));

        let levels: Vec<tracing::Level> = request_ids.iter().map(|(level, _, _)| *level).collect();
        assert_eq!(
            levels,
            vec![tracing::Level::DEBUG, tracing::Level::INFO, tracing::Level::WARN, tracing::Level::ERROR]
        );
        assert!(fields.iter().any(|(_, name, value)| name == "message" && value == "three"));
    }
}
