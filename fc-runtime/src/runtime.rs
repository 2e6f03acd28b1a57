use crate::context::InvocationContext;
use crate::error::HandlerError;
use crate::handler::{Handler, InvocationResult};
use crate::logger::{escape_log, LogRecord, LoggerFactory, MemorySink, RequestLogger, TracingLoggerFactory};
use crate::payload::Payload;
use std::any::Any;
use std::sync::{Arc, RwLock};
use tokio::task::JoinError;
use tracing::{debug, error};

/// The result of an invocation together with everything the handler logged while producing it.
#[derive(Debug)]
pub struct Invocation {
    pub result: InvocationResult,
    pub log: Vec<LogRecord>,
}

/// The host side of the contract: holds the registered handler and dispatches invocations to it.
///
/// Each invocation gets its own logger from the factory and runs on a tokio blocking thread,
/// so a slow synchronous handler does not hold up the server and parallel invocations share nothing.
pub struct Runtime {
    handler: Arc<dyn Handler>,
    loggers: Arc<dyn LoggerFactory>,
    /// Log of the last initialization, prepended to the log result of subsequent invocations
    init_log: RwLock<String>,
}

impl Runtime {
    /// Registers the handler. This is done once per process.
    pub fn new<H: Handler + 'static>(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            loggers: Arc::new(TracingLoggerFactory),
            init_log: RwLock::new(String::new()),
        }
    }

    /// Replaces the default logger factory that logs via `tracing` only.
    pub fn with_logger_factory<F: LoggerFactory + 'static>(mut self, loggers: F) -> Self {
        self.loggers = Arc::new(loggers);
        self
    }

    /// Runs the handler for one request.
    /// Never fails: handler errors and panics end up in [InvocationResult::Failure].
    pub async fn invoke(&self, ctx: InvocationContext, input: Payload) -> Invocation {
        let request_id = ctx.request_id().to_owned();
        let (logger, capture) = self.logger(&request_id);

        logger.info(format!("FC Invoke Start RequestId: {request_id}"));
        // payload contents stay out of the captured log, it is returned to the caller in a header
        debug!(requestId = request_id.as_str(), "Payload: {} bytes", input.len());

        let handler = self.handler.clone();
        let handler_logger = logger.clone();
        let result = match tokio::task::spawn_blocking(move || handler.handle(&ctx, input, &handler_logger)).await {
            Ok(result) => InvocationResult::from(result),
            Err(e) => InvocationResult::Failure(join_error_to_handler_error(e)),
        };

        if let InvocationResult::Failure(e) = &result {
            logger.error(format!("Invocation failed: {e}"));
        }
        logger.info(format!("FC Invoke End RequestId: {request_id}"));

        Invocation {
            result,
            log: capture.take(),
        }
    }

    /// Runs the handler's initializer. The log is kept and prepended to the log result of
    /// every invocation that follows.
    pub async fn initialize(&self, ctx: InvocationContext) -> Invocation {
        let request_id = ctx.request_id().to_owned();
        let (logger, capture) = self.logger(&request_id);

        logger.info(format!("FC Initialize Start RequestId: {request_id}"));

        let handler = self.handler.clone();
        let handler_logger = logger.clone();
        let result = match tokio::task::spawn_blocking(move || handler.initialize(&ctx, &handler_logger)).await {
            Ok(Ok(())) => InvocationResult::Success(Payload::empty()),
            Ok(Err(e)) => InvocationResult::Failure(e),
            Err(e) => InvocationResult::Failure(join_error_to_handler_error(e)),
        };

        if let InvocationResult::Failure(e) = &result {
            logger.error(format!("Initialization failed: {e}"));
        }
        logger.info(format!("FC Initialize End RequestId: {request_id}"));

        let log = capture.take();
        match self.init_log.write() {
            Ok(mut init_log) => *init_log = escape_log(&log),
            Err(_) => error!("Write deadlock on init_log. It's a bug"),
        }

        Invocation { result, log }
    }

    /// The log of an invocation as a single header-safe line, prefixed with the initialization log.
    pub fn log_result(&self, log: &[LogRecord]) -> String {
        let init_log = match self.init_log.read() {
            Ok(init_log) => init_log.clone(),
            Err(_) => {
                error!("Read deadlock on init_log. It's a bug");
                String::new()
            }
        };

        let log = escape_log(log);
        match (init_log.is_empty(), log.is_empty()) {
            (true, _) => log,
            (false, true) => init_log,
            (false, false) => [init_log, log].join("\\n"),
        }
    }

    /// A logger for one request that also captures its records for the log result.
    fn logger(&self, request_id: &str) -> (RequestLogger, Arc<MemorySink>) {
        let capture = Arc::new(MemorySink::new());
        let logger = self.loggers.logger(request_id).with_sink(capture.clone());
        (logger, capture)
    }
}

/// A handler task can only fail to join if it panicked or was cancelled.
fn join_error_to_handler_error(e: JoinError) -> HandlerError {
    if e.is_panic() {
        let panic = e.into_panic();
        HandlerError::internal(format!("Handler panicked: {}", panic_message(panic.as_ref())))
    } else {
        HandlerError::internal(format!("Handler task failed: {e}"))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic payload"
    }
}
