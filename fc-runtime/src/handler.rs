use crate::context::InvocationContext;
use crate::error::HandlerError;
use crate::logger::RequestLogger;
use crate::payload::Payload;
use std::sync::Arc;

/// User code invoked by the host once per request.
///
/// `handle` runs synchronously on a blocking thread owned by the host, possibly in parallel
/// with other invocations, hence `Send + Sync`. Implementations must not keep unsynchronized
/// mutable state between calls.
pub trait Handler: Send + Sync {
    /// Processes one invocation. Failures are returned, not panicked: the host turns a panic
    /// into an `Internal` error, but that is a safety net, not part of the contract.
    fn handle(&self, ctx: &InvocationContext, input: Payload, logger: &RequestLogger) -> Result<Payload, HandlerError>;

    /// Called once per container start, before any invocation, if the function has an initializer configured.
    fn initialize(&self, _ctx: &InvocationContext, _logger: &RequestLogger) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle(&self, ctx: &InvocationContext, input: Payload, logger: &RequestLogger) -> Result<Payload, HandlerError> {
        (**self).handle(ctx, input, logger)
    }

    fn initialize(&self, ctx: &InvocationContext, logger: &RequestLogger) -> Result<(), HandlerError> {
        (**self).initialize(ctx, logger)
    }
}

/// A [Handler] made out of a plain function or closure. See [handler_fn].
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps a function with the `handle` signature into a [Handler]:
/// ```ignore
/// let runtime = Runtime::new(handler_fn(|_ctx: &InvocationContext, input: Payload, _log: &RequestLogger| Ok(input)));
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&InvocationContext, Payload, &RequestLogger) -> Result<Payload, HandlerError> + Send + Sync,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&InvocationContext, Payload, &RequestLogger) -> Result<Payload, HandlerError> + Send + Sync,
{
    fn handle(&self, ctx: &InvocationContext, input: Payload, logger: &RequestLogger) -> Result<Payload, HandlerError> {
        (self.f)(ctx, input, logger)
    }
}

/// Outcome of one invocation: either the output payload or the error, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    Success(Payload),
    Failure(HandlerError),
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            InvocationResult::Success(payload) => Some(payload),
            InvocationResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&HandlerError> {
        match self {
            InvocationResult::Success(_) => None,
            InvocationResult::Failure(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<Payload, HandlerError> {
        self.into()
    }
}

impl From<Result<Payload, HandlerError>> for InvocationResult {
    fn from(result: Result<Payload, HandlerError>) -> Self {
        match result {
            Ok(payload) => InvocationResult::Success(payload),
            Err(e) => InvocationResult::Failure(e),
        }
    }
}

impl From<InvocationResult> for Result<Payload, HandlerError> {
    fn from(result: InvocationResult) -> Self {
        match result {
            InvocationResult::Success(payload) => Ok(payload),
            InvocationResult::Failure(e) => Err(e),
        }
    }
}
