use crate::error::HandlerError;
use hyper::body::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// An opaque byte sequence passed into and returned from a handler.
/// The contract imposes no encoding. The JSON and UTF-8 helpers are conveniences
/// for handlers that choose to give their payloads a structure.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload(Bytes);

impl Payload {
    pub fn new<T: Into<Bytes>>(bytes: T) -> Self {
        Self(bytes.into())
    }

    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes `value` as JSON.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    /// Parses the payload as JSON. A malformed payload is the caller's fault, hence `InvalidInput`.
    pub fn to_json<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_slice(&self.0)
            .map_err(|e| HandlerError::invalid_input(format!("Payload is not valid JSON: {e}")))
    }

    pub fn to_utf8(&self) -> Result<&str, HandlerError> {
        std::str::from_utf8(&self.0).map_err(|e| HandlerError::invalid_input(format!("Payload is not UTF-8: {e}")))
    }

    /// A printable form for logs: UTF-8 as-is, anything else hex-encoded.
    pub fn to_log_string(&self) -> String {
        match std::str::from_utf8(&self.0) {
            Ok(v) => v.to_owned(),
            Err(_) => hex::encode(&self.0),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.to_log_string()).finish()
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<&'static str> for Payload {
    fn from(s: &'static str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Payload> for Bytes {
    fn from(payload: Payload) -> Self {
        payload.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Request {
        command: String,
    }

    #[test]
    fn json_helpers_layer_a_schema_on_top() {
        let payload = Payload::from(r#"{"command":"ping"}"#);
        let req: Request = payload.to_json().unwrap();
        assert_eq!(req.command, "ping");

        let out = Payload::from_json(&req).unwrap();
        assert_eq!(out.as_bytes(), br#"{"command":"ping"}"#);
    }

    #[test]
    fn malformed_json_is_invalid_input() {
        let err = Payload::from("not json").to_json::<Request>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn binary_payloads_are_hex_in_logs() {
        let payload = Payload::from(vec![0xffu8, 0x00, 0x10]);
        assert_eq!(payload.to_log_string(), "ff0010");
        assert!(payload.to_utf8().is_err());
        assert_eq!(Payload::from("ping").to_log_string(), "ping");
    }

    #[test]
    fn empty_is_a_valid_payload() {
        let payload = Payload::empty();
        assert!(payload.is_empty());
        assert_eq!(payload, Payload::from(Vec::<u8>::new()));
    }
}
