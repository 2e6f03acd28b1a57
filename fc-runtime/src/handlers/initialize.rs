use super::{empty, error_response, log_result_header, LOG_RESULT_HEADER};
use crate::context::InvocationContext;
use crate::handler::InvocationResult;
use crate::runtime::Runtime;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Error, HeaderMap, Response, StatusCode};
use tracing::warn;

/// Handles `POST /initialize`: runs the handler's initializer once before the first invocation.
/// The request body is ignored.
pub(crate) async fn handler(runtime: &Runtime, headers: &HeaderMap) -> Response<BoxBody<Bytes, Error>> {
    let ctx = match InvocationContext::from_headers(headers) {
        Ok(v) => v,
        Err(e) => {
            warn!("Initialization rejected: {e}");
            return error_response(StatusCode::BAD_REQUEST, &e, None);
        }
    };

    let init = runtime.initialize(ctx).await;
    let log_result = runtime.log_result(&[]);

    match init.result {
        InvocationResult::Success(_) => {
            let mut builder = Response::builder().status(StatusCode::OK);
            if let Some(log_result) = log_result_header(&log_result) {
                builder = builder.header(LOG_RESULT_HEADER, log_result);
            }
            builder.body(empty()).expect("Failed to create a response")
        }
        InvocationResult::Failure(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e, Some(&log_result)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::dispatch;
    use super::super::tests::{body_bytes, echo_runtime, request_headers};
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::Handler;
    use crate::logger::RequestLogger;
    use crate::payload::Payload;
    use hyper::Method;

    struct FailingInit;

    impl Handler for FailingInit {
        fn handle(&self, _: &InvocationContext, input: Payload, _: &RequestLogger) -> Result<Payload, HandlerError> {
            Ok(input)
        }

        fn initialize(&self, _: &InvocationContext, _: &RequestLogger) -> Result<(), HandlerError> {
            Err(HandlerError::downstream("config store unreachable"))
        }
    }

    #[tokio::test]
    async fn default_initializer_succeeds() {
        let runtime = echo_runtime();
        let headers = request_headers("init-1");

        let resp = dispatch(&runtime, &Method::POST, "/initialize", &headers, Bytes::new()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_bytes(resp).await.is_empty());
        assert!(runtime.log_result(&[]).contains("FC Initialize End RequestId: init-1"));
    }

    #[tokio::test]
    async fn failed_initializer_is_a_500() {
        let runtime = Runtime::new(FailingInit);
        let headers = request_headers("init-2");

        let resp = dispatch(&runtime, &Method::POST, "/initialize", &headers, Bytes::new()).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(body["errorType"], "Downstream");
    }
}
