use fc_runtime::{Handler, HandlerError, InvocationContext, Payload, RequestLogger};

/// Produces the diagnostic form of the context that gets logged with every invocation.
pub(crate) type DescribeContext = fn(&InvocationContext) -> Result<String, serde_json::Error>;

/// Echoes the input payload back and logs the invocation context as JSON.
pub(crate) struct EchoHandler {
    describe: DescribeContext,
}

impl EchoHandler {
    pub(crate) fn new() -> Self {
        Self {
            describe: serde_json::to_string::<InvocationContext>,
        }
    }

    /// Replaces the context serializer, e.g. with one that fails.
    #[cfg(test)]
    pub(crate) fn with_describe(describe: DescribeContext) -> Self {
        Self { describe }
    }
}

impl Handler for EchoHandler {
    fn handle(&self, ctx: &InvocationContext, input: Payload, logger: &RequestLogger) -> Result<Payload, HandlerError> {
        // the context dump is for diagnostics only and must not fail the invocation
        let fc_context = match (self.describe)(ctx) {
            Ok(v) => v,
            Err(e) => {
                logger.error(format!("error: {e}"));
                String::new()
            }
        };

        logger.info(format!("hello rust! fc context: {fc_context}"));

        Ok(input)
    }

    fn initialize(&self, ctx: &InvocationContext, logger: &RequestLogger) -> Result<(), HandlerError> {
        logger.info(format!("initializer: {}", ctx.function().initializer));
        Ok(())
    }
}
