//! Error types
//!
//! Library errors are configuration or infrastructure faults. Domain failures
//! a caller should see (existence conflicts, validation, upstream errors) are
//! carried as [`crate::envelope::Envelope`] data instead.

use thiserror::Error;

use crate::document::FieldError;

/// Errors raised by the pipeline registry and executor
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Operation '{0}' is already registered")]
    DuplicateOperation(String),

    #[error("Operation '{0}' has no steps")]
    EmptyOperation(String),

    #[error("Operation '{operation}' ends with step '{step}', which never produces a response")]
    NoResponseStep { operation: String, step: String },

    #[error("Operation '{0}' finished without a response")]
    MissingResponse(String),

    #[error("Step '{step}' requires '{slot}', which no earlier step provided")]
    MissingInput { step: &'static str, slot: &'static str },

    #[error("Slot '{0}' was superseded and cannot be written again")]
    SlotSuperseded(&'static str),

    #[error("Operation '{operation}' cancelled before step '{step}'")]
    Cancelled { operation: String, step: String },

    #[error("Workflow error: {0}")]
    Workflow(#[from] docflow_workflow::WorkflowError),
}

/// Errors raised by the external service gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Unknown operation '{operation}' on service '{service}'")]
    UnknownOperation { service: String, operation: String },

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Request to {service}.{operation} failed: {source}")]
    Transport {
        service: String,
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service}.{operation} returned HTTP {status}")]
    Status {
        service: String,
        operation: String,
        status: u16,
    },

    #[error("Could not decode reply from {service}.{operation}: {message}")]
    Decode {
        service: String,
        operation: String,
        message: String,
    },

    #[error("{service}.{operation} is unavailable: {message}")]
    Unavailable {
        service: String,
        operation: String,
        message: String,
    },
}

/// Errors raised while assembling configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {var}: {message}")]
    InvalidVar { var: String, message: String },

    #[error("Invalid service catalog: {0}")]
    InvalidCatalog(String),

    #[error("Workflow error: {0}")]
    Workflow(#[from] docflow_workflow::WorkflowError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors raised by document-type metadata handlers
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("No metadata handler for document type '{0}'")]
    UnsupportedDocType(String),

    #[error("{} invalid metadata value(s)", .0.len())]
    InvalidValues(Vec<FieldError>),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Errors raised by the attachment store
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot derive a storage path from IRI '{0}'")]
    InvalidIri(String),

    #[error("Attachment reference '{0}' escapes the attachment root")]
    InvalidReference(String),

    #[error("Removed {removed} attachment file(s); {} could not be removed: {}", .failed.len(), .failed.join("; "))]
    Incomplete { removed: usize, failed: Vec<String> },
}

/// Errors raised while publishing status messages
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No subscribers for routing key '{0}'")]
    NoSubscribers(String),
}

/// Errors raised while rendering XML payloads
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),

    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<handlebars::TemplateError> for RenderError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::Template(Box::new(err))
    }
}

/// Errors raised by token validation
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No bearer token supplied")]
    MissingToken,

    #[error("Token rejected: {0}")]
    InvalidToken(String),

    #[error("Token file error: {0}")]
    Config(String),
}
