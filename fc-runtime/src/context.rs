use crate::error::HandlerError;
use chrono::{DateTime, Utc};
use hyper::HeaderMap;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Names of the headers the platform uses to pass the invocation context to a custom runtime.
pub mod headers {
    pub const REQUEST_ID: &str = "x-fc-request-id";
    pub const ACCESS_KEY_ID: &str = "x-fc-access-key-id";
    pub const ACCESS_KEY_SECRET: &str = "x-fc-access-key-secret";
    pub const SECURITY_TOKEN: &str = "x-fc-security-token";
    pub const FUNCTION_NAME: &str = "x-fc-function-name";
    pub const FUNCTION_HANDLER: &str = "x-fc-function-handler";
    pub const FUNCTION_INITIALIZER: &str = "x-fc-function-initializer";
    pub const FUNCTION_MEMORY: &str = "x-fc-function-memory";
    pub const FUNCTION_TIMEOUT: &str = "x-fc-function-timeout";
    pub const SERVICE_NAME: &str = "x-fc-service-name";
    pub const REGION: &str = "x-fc-region";
    pub const ACCOUNT_ID: &str = "x-fc-account-id";
    pub const QUALIFIER: &str = "x-fc-qualifier";
    pub const CONTROL_PATH: &str = "x-fc-control-path";
}

/// Temporary credentials issued to the function for this invocation.
/// The secret and the token are never serialized or printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    access_key_id: String,
    #[serde(skip_serializing)]
    access_key_secret: String,
    #[serde(skip_serializing)]
    security_token: String,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        security_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            security_token: security_token.into(),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn access_key_secret(&self) -> &str {
        &self.access_key_secret
    }

    pub fn security_token(&self) -> &str {
        &self.security_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .field("security_token", &"***")
            .finish()
    }
}

/// What the platform tells the function about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionMeta {
    pub name: String,
    pub handler: String,
    pub initializer: String,
    /// Memory limit in MB
    pub memory_size: Option<u32>,
    /// Execution time limit in seconds
    pub timeout: Option<u32>,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub qualifier: String,
}

/// Per-invocation context handed to the handler alongside the payload.
///
/// A context is created by the host right before the call and dropped right after it.
/// It has no setters, so it cannot change while the handler runs, and it is not `Clone`
/// to discourage carrying it over into another invocation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    request_id: String,
    deadline: Option<DateTime<Utc>>,
    credentials: Credentials,
    function: FunctionMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    control_path: Option<String>,
}

impl InvocationContext {
    /// Starts building a context. The request ID is validated in [ContextBuilder::build].
    pub fn builder(request_id: impl Into<String>) -> ContextBuilder {
        ContextBuilder {
            request_id: request_id.into(),
            deadline: None,
            credentials: Credentials::default(),
            function: FunctionMeta::default(),
            control_path: None,
        }
    }

    /// Builds the context out of the `x-fc-*` headers of a custom runtime request.
    /// Only the request ID is mandatory. Malformed optional values are logged and ignored.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, HandlerError> {
        let request_id = header(headers, headers::REQUEST_ID)
            .ok_or_else(|| HandlerError::invalid_input(format!("Missing {} header", headers::REQUEST_ID)))?;

        let credentials = Credentials::new(
            header(headers, headers::ACCESS_KEY_ID).unwrap_or_default(),
            header(headers, headers::ACCESS_KEY_SECRET).unwrap_or_default(),
            header(headers, headers::SECURITY_TOKEN).unwrap_or_default(),
        );

        let function = FunctionMeta {
            name: header(headers, headers::FUNCTION_NAME).unwrap_or_default(),
            handler: header(headers, headers::FUNCTION_HANDLER).unwrap_or_default(),
            initializer: header(headers, headers::FUNCTION_INITIALIZER).unwrap_or_default(),
            memory_size: numeric_header(headers, headers::FUNCTION_MEMORY),
            timeout: numeric_header(headers, headers::FUNCTION_TIMEOUT),
            service: header(headers, headers::SERVICE_NAME).unwrap_or_default(),
            region: header(headers, headers::REGION).unwrap_or_default(),
            account_id: header(headers, headers::ACCOUNT_ID).unwrap_or_default(),
            qualifier: header(headers, headers::QUALIFIER).unwrap_or_default(),
        };

        let mut builder = Self::builder(request_id)
            .credentials(credentials)
            .function(function.clone());

        // the deadline counts from the moment the request was received
        if let Some(timeout) = function.timeout {
            builder = builder.timeout(Duration::from_secs(timeout.into()));
        }

        if let Some(control_path) = header(headers, headers::CONTROL_PATH) {
            builder = builder.control_path(control_path);
        }

        builder.build()
    }

    /// Unique ID of this invocation. Safe to log verbatim.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Time left until the deadline, zero if it has passed.
    /// Returns None if the invocation has no deadline.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Handlers doing long-running work are expected to check this and bail out with a Timeout error.
    pub fn is_expired(&self) -> bool {
        matches!(self.remaining_time(), Some(left) if left.is_zero())
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn function(&self) -> &FunctionMeta {
        &self.function
    }

    pub fn control_path(&self) -> Option<&str> {
        self.control_path.as_deref()
    }
}

pub struct ContextBuilder {
    request_id: String,
    deadline: Option<DateTime<Utc>>,
    credentials: Credentials,
    function: FunctionMeta,
    control_path: Option<String>,
}

impl ContextBuilder {
    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline to `timeout` from now.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        match chrono::Duration::from_std(timeout) {
            Ok(timeout) => self.deadline = Some(Utc::now() + timeout),
            Err(e) => warn!("Timeout {timeout:?} is out of range, no deadline is set: {e}"),
        }
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn function(mut self, function: FunctionMeta) -> Self {
        self.function = function;
        self
    }

    pub fn control_path(mut self, control_path: impl Into<String>) -> Self {
        self.control_path = Some(control_path.into());
        self
    }

    /// Fails if the request ID is empty or blank.
    pub fn build(self) -> Result<InvocationContext, HandlerError> {
        if self.request_id.trim().is_empty() {
            return Err(HandlerError::invalid_input("Request ID must not be empty"));
        }

        Ok(InvocationContext {
            request_id: self.request_id,
            deadline: self.deadline,
            credentials: self.credentials,
            function: self.function,
            control_path: self.control_path,
        })
    }
}

/// Generates a fresh request ID for invocations that do not come from the platform, e.g. local runs.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns the header value as a string if it is present, non-empty and printable.
fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn numeric_header(headers: &HeaderMap, name: &str) -> Option<u32> {
    let value = header(headers, name)?;
    match value.parse::<u32>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring invalid {name} header value {value}: {e}");
            None
        }
    }
}
