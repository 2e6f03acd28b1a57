use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Broad category of a handler failure.
/// The host uses it as `errorType` when reporting the failure to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// The payload or the context could not be accepted, e.g. malformed JSON
    InvalidInput,
    /// A service the handler depends on failed
    Downstream,
    /// Auxiliary data could not be (de)serialized
    Serialization,
    /// The invocation deadline passed before the work was done
    Timeout,
    /// Anything else, including a handler panic caught by the host
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::Downstream => "Downstream",
            ErrorKind::Serialization => "Serialization",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The failure arm of an invocation.
/// Handlers return it as a value; it never unwinds through the host.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct HandlerError {
    #[serde(rename = "errorType")]
    kind: ErrorKind,
    #[serde(rename = "errorMessage")]
    message: String,
}

impl HandlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn downstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Downstream, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error as `{"errorType":"...","errorMessage":"..."}`, the body the HTTP host replies with.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(v) => v,
            // only strings and a unit enum in there, so this is not expected to happen
            Err(_) => format!(r#"{{"errorType":"{}","errorMessage":""}}"#, self.kind),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::serialization(e.to_string())
    }
}

/// Failures of the host itself: configuration, sockets, HTTP.
/// Only returned from the process-level entry points, never from an invocation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Http(#[from] hyper::Error),
    #[error("Invocation failed: {0}")]
    Handler(#[from] HandlerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_uses_platform_field_names() {
        let err = HandlerError::invalid_input("bad payload");
        let v: serde_json::Value = serde_json::from_str(&err.to_json()).unwrap();
        assert_eq!(v["errorType"], "InvalidInput");
        assert_eq!(v["errorMessage"], "bad payload");
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = HandlerError::downstream("db is down");
        assert_eq!(err.to_string(), "Downstream: db is down");
        assert_eq!(err.kind(), ErrorKind::Downstream);
        assert_eq!(err.message(), "db is down");
    }

    #[test]
    fn serde_errors_become_serialization_failures() {
        let e = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(HandlerError::from(e).kind(), ErrorKind::Serialization);
    }
}
