use super::{error_response, full, log_result_header, LOG_RESULT_HEADER};
use crate::context::InvocationContext;
use crate::handler::InvocationResult;
use crate::payload::Payload;
use crate::runtime::Runtime;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Error, HeaderMap, Response, StatusCode};
use tracing::warn;

/// Handles `POST /invoke`: the request body is the input payload, the context comes from the `x-fc-*` headers.
/// Replies with the output payload on success or a JSON error with status 500 on failure.
pub(crate) async fn handler(runtime: &Runtime, headers: &HeaderMap, body: Bytes) -> Response<BoxBody<Bytes, Error>> {
    let ctx = match InvocationContext::from_headers(headers) {
        Ok(v) => v,
        Err(e) => {
            warn!("Invocation rejected: {e}");
            return error_response(StatusCode::BAD_REQUEST, &e, None);
        }
    };

    let invocation = runtime.invoke(ctx, Payload::from(body)).await;
    let log_result = runtime.log_result(&invocation.log);

    match invocation.result {
        InvocationResult::Success(payload) => {
            let mut builder = Response::builder().status(StatusCode::OK);
            if let Some(log_result) = log_result_header(&log_result) {
                builder = builder.header(LOG_RESULT_HEADER, log_result);
            }
            builder
                .body(full(payload.into_bytes()))
                .expect("Failed to create a response")
        }
        InvocationResult::Failure(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e, Some(&log_result)),
    }
}
