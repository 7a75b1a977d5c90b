//! Response envelope
//!
//! Every operation resolves to an [`Envelope`]: either domain fields on
//! success or `{ "error": { "code": ..., "message": ... } }` on failure.
//! Mapping envelopes to transport status codes is left to the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Machine-readable failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Store reports the IRI absent
    DocNotFound,
    /// Add rejected: IRI already present in the client store
    DocExistsOnClient,
    /// Add rejected: IRI already present in the portal store
    DocExistsOnPortal,
    /// Field-level validation failure
    InvalidValues,
    /// No metadata handler registered for the document type
    UnsupportedDocType,
    /// Token missing or rejected
    AuthFailed,
    /// Upstream or transport failure
    Exception,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocNotFound => "doc_not_found",
            Self::DocExistsOnClient => "doc_exists_on_client",
            Self::DocExistsOnPortal => "doc_exists_on_portal",
            Self::InvalidValues => "invalid_values",
            Self::UnsupportedDocType => "unsupported_doc_type",
            Self::AuthFailed => "auth_failed",
            Self::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of a failure envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    /// Free text, or structured detail such as field errors
    #[serde(default)]
    pub message: Value,
}

/// Final response of a pipeline operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Failure { error: ErrorBody },
    Success(Value),
}

impl Envelope {
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success(value.into())
    }

    pub fn failure(code: ErrorCode, message: impl Into<Value>) -> Self {
        Self::Failure {
            error: ErrorBody {
                code: code.as_str().to_string(),
                message: message.into(),
            },
        }
    }

    /// Wrap an upstream error as `EXCEPTION`, keeping its message and the
    /// debug rendering (source chain) as detail.
    pub fn exception<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::failure(ErrorCode::Exception, format!("{} \n {:?}", err, err))
    }

    /// Interpret a raw store reply. Any reply with an `error` member is a
    /// failure: the store's own code when it gives one, `EXCEPTION` with the
    /// raw `error` value otherwise.
    pub fn from_store_reply(reply: Value) -> Self {
        let Some(error) = reply.get("error") else {
            return Self::Success(reply);
        };
        match error.get("code").and_then(Value::as_str) {
            Some(code) => Self::Failure {
                error: ErrorBody {
                    code: code.to_string(),
                    message: error.get("message").cloned().unwrap_or(Value::Null),
                },
            },
            None => Self::failure(ErrorCode::Exception, error.clone()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Failure { error } => Some(error.code.as_str()),
            Self::Success(_) => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Success(v) => v,
            Self::Failure { error } => serde_json::json!({ "error": error }),
        }
    }
}

/// Status code carried by a store reply, from either
/// `{"error": {"code": ..}}` or `{"success": {"code": ..}}`.
pub fn reply_code(reply: &Value) -> Option<&str> {
    reply
        .get("error")
        .or_else(|| reply.get("success"))
        .and_then(|body| body.get("code"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_shape() {
        let env = Envelope::failure(ErrorCode::DocExistsOnClient, "exists");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"error": {"code": "doc_exists_on_client", "message": "exists"}})
        );
        assert_eq!(env.error_code(), Some("doc_exists_on_client"));
    }

    #[test]
    fn test_success_is_transparent() {
        let env = Envelope::success(json!({"metadata": ["a"]}));
        assert_eq!(serde_json::to_value(&env).unwrap(), json!({"metadata": ["a"]}));
        assert!(!env.is_error());
    }

    #[test]
    fn test_store_reply() {
        let failed = Envelope::from_store_reply(json!({"error": {"code": "no_documents", "message": "none"}}));
        assert_eq!(failed.error_code(), Some("no_documents"));

        let ok = Envelope::from_store_reply(json!({"success": {"code": "save_file", "message": "ok"}}));
        assert!(!ok.is_error());
    }

    #[test]
    fn test_store_reply_without_code_is_exception() {
        let bare = Envelope::from_store_reply(json!({"error": "store offline"}));
        assert_eq!(
            bare.into_value(),
            json!({"error": {"code": "EXCEPTION", "message": "store offline"}})
        );

        let uncoded = Envelope::from_store_reply(json!({"error": {"message": "no code"}}));
        assert_eq!(uncoded.error_code(), Some("EXCEPTION"));
        assert_eq!(uncoded.into_value()["error"]["message"], json!({"message": "no code"}));

        let numeric = Envelope::from_store_reply(json!({"error": {"code": 500}}));
        assert_eq!(numeric.error_code(), Some("EXCEPTION"));
    }

    #[test]
    fn test_reply_code() {
        assert_eq!(reply_code(&json!({"error": {"code": "doc_not_found"}})), Some("doc_not_found"));
        assert_eq!(reply_code(&json!({"success": {"code": "doc_exists"}})), Some("doc_exists"));
        assert_eq!(reply_code(&json!({"other": 1})), None);
    }

    #[test]
    fn test_exception_message() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let env = Envelope::exception(&err);
        assert_eq!(env.error_code(), Some("EXCEPTION"));
    }
}
