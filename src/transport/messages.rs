//! Wire format for the line transport.
//!
//! Every line is one JSON object `{"src", "dest", "body"}`. The body always
//! carries a `type` tag and optionally `msg_id` / `in_reply_to`; the remaining
//! fields depend on the type and are decoded by the handler that owns it.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, RippleError};
use crate::node::NodeName;
use crate::{malformed_error, transport_error};

pub const INIT: &str = "init";
pub const INIT_OK: &str = "init_ok";
pub const ERROR: &str = "error";

/// A single framed message
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub src: NodeName,
    pub dest: NodeName,
    pub body: Body,
}

/// Message body: the type tag, correlation ids, and type-specific fields
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Body {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Body {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Build a body of `kind` whose fields are the serialized `payload` struct
    pub fn with_payload<T: Serialize>(kind: impl Into<String>, payload: &T) -> Result<Self> {
        let fields = match serde_json::to_value(payload)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(transport_error!(
                    "body payload must serialize to an object, got {}",
                    other
                ))
            }
        };
        Ok(Self {
            kind: kind.into(),
            fields,
            ..Default::default()
        })
    }

    /// Decode the type-specific fields into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| malformed_error!("invalid {} body: {}", self.kind, e))
    }

    pub fn error(code: ErrorCode, text: impl Into<String>) -> Self {
        let mut body = Self::new(ERROR);
        body.fields.insert("code".to_string(), Value::from(code.code()));
        body.fields.insert("text".to_string(), Value::from(text.into()));
        body
    }

    pub fn is_error(&self) -> bool {
        self.kind == ERROR
    }

    /// Interpret an `error` body received from a peer
    pub fn to_rpc_error(&self) -> RippleError {
        let code = self
            .fields
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|code| u32::try_from(code).ok())
            .unwrap_or(ErrorCode::Crash.code());
        let text = self
            .fields
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        RippleError::Rpc { code, text }
    }
}

/// Error codes carried in `error` bodies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Timeout,
    NodeNotFound,
    NotSupported,
    TemporarilyUnavailable,
    MalformedRequest,
    Crash,
    Abort,
    KeyDoesNotExist,
    KeyAlreadyExists,
    PreconditionFailed,
    TxnConflict,
    Other(u32),
}

impl ErrorCode {
    pub fn code(&self) -> u32 {
        match self {
            ErrorCode::Timeout => 0,
            ErrorCode::NodeNotFound => 1,
            ErrorCode::NotSupported => 10,
            ErrorCode::TemporarilyUnavailable => 11,
            ErrorCode::MalformedRequest => 12,
            ErrorCode::Crash => 13,
            ErrorCode::Abort => 14,
            ErrorCode::KeyDoesNotExist => 20,
            ErrorCode::KeyAlreadyExists => 21,
            ErrorCode::PreconditionFailed => 22,
            ErrorCode::TxnConflict => 30,
            ErrorCode::Other(code) => *code,
        }
    }
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0 => ErrorCode::Timeout,
            1 => ErrorCode::NodeNotFound,
            10 => ErrorCode::NotSupported,
            11 => ErrorCode::TemporarilyUnavailable,
            12 => ErrorCode::MalformedRequest,
            13 => ErrorCode::Crash,
            14 => ErrorCode::Abort,
            20 => ErrorCode::KeyDoesNotExist,
            21 => ErrorCode::KeyAlreadyExists,
            22 => ErrorCode::PreconditionFailed,
            30 => ErrorCode::TxnConflict,
            other => ErrorCode::Other(other),
        }
    }
}
