use crate::context::headers::CONTROL_PATH;
use crate::error::HandlerError;
use crate::runtime::Runtime;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) mod initialize;
pub(crate) mod invoke;

/// The invocation log is returned to the platform in this header.
pub(crate) const LOG_RESULT_HEADER: &str = "x-fc-log-result";

/// Entry point of the HTTP service: reads the whole body and hands the request over to [dispatch].
pub(crate) async fn custom_runtime_api(
    runtime: Arc<Runtime>,
    req: Request<hyper::body::Incoming>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    Ok(dispatch(&runtime, &parts.method, parts.uri.path(), &parts.headers, body).await)
}

/// Routes a request by its command, which is the `x-fc-control-path` header if present or the URL path otherwise.
/// Only `POST /invoke` and `POST /initialize` are served, everything else is a 404.
pub(crate) async fn dispatch(
    runtime: &Runtime,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let command = headers
        .get(CONTROL_PATH)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(path);

    debug!("Request: {method} {path}, command: {command}");

    match (method, command) {
        (&Method::POST, "/invoke") => invoke::handler(runtime, headers, body).await,
        (&Method::POST, "/initialize") => initialize::handler(runtime, headers).await,
        _ => {
            warn!("Unknown request: {method} {path}, command: {command}");
            Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(empty())
                .expect("Failed to create a response")
        }
    }
}

/// Builds an error response with a JSON body and an optional log result.
pub(crate) fn error_response(
    status: StatusCode,
    error: &HandlerError,
    log_result: Option<&str>,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json");

    if let Some(log_result) = log_result.and_then(log_result_header) {
        builder = builder.header(LOG_RESULT_HEADER, log_result);
    }

    builder
        .body(full(error.to_json()))
        .expect("Failed to create a response")
}

/// Converts the log into a header value. The log is best-effort, so it is dropped if it cannot be a header.
pub(crate) fn log_result_header(log_result: &str) -> Option<HeaderValue> {
    if log_result.is_empty() {
        return None;
    }

    match HeaderValue::from_str(log_result) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Log result cannot be sent as a header: {e}");
            None
        }
    }
}

/// Returns an empty response body.
pub(crate) fn empty() -> BoxBody<Bytes, hyper::Error> {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Returns an response body with contents of `chunk` which can be some type convertible into Bytes, e.g. &str.
pub(crate) fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(chunk.into()).map_err(|never| match never {}).boxed()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::context::headers::REQUEST_ID;
    use crate::handler::handler_fn;
    use crate::{InvocationContext, Payload, RequestLogger};

    pub(crate) fn echo_runtime() -> Runtime {
        Runtime::new(handler_fn(|_: &InvocationContext, input: Payload, _: &RequestLogger| Ok(input)))
    }

    pub(crate) fn request_headers(request_id: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID, HeaderValue::from_static(request_id));
        headers
    }

    pub(crate) async fn body_bytes(resp: Response<BoxBody<Bytes, hyper::Error>>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let runtime = echo_runtime();
        let headers = request_headers("req-1");

        let resp = dispatch(&runtime, &Method::POST, "/unknown", &headers, Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = dispatch(&runtime, &Method::GET, "/invoke", &headers, Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn control_path_overrides_url_path() {
        let runtime = echo_runtime();
        let mut headers = request_headers("req-1");
        headers.insert(CONTROL_PATH, HeaderValue::from_static("/invoke"));

        let resp = dispatch(&runtime, &Method::POST, "/", &headers, Bytes::from_static(b"ping")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, Bytes::from_static(b"ping"));
    }

    #[test]
    fn unprintable_log_results_are_dropped() {
        assert!(log_result_header("").is_none());
        assert!(log_result_header("line one\nline two").is_none());
        assert!(log_result_header("line one\\nline two").is_some());
    }
}
