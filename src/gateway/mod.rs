//! External service gateway
//!
//! Steps never talk HTTP directly. They name a service and an operation and
//! hand over a JSON payload; the gateway resolves the target from the
//! [`ServiceCatalog`] and returns the store's JSON reply.
//!
//! A reply is returned as-is even when it carries an `error` member: stores
//! report domain outcomes such as `doc_not_found` that way, and it is up to
//! the calling step to interpret them. `Err` is reserved for failures to
//! reach the store or read its reply.

pub mod catalog;
pub mod http;
pub mod memory;

pub use catalog::{HttpMethod, OperationDef, ResolvedCall, ServiceCatalog, ServiceDef, PORTAL_DATA, XML_SERVER};
pub use http::HttpGateway;
pub use memory::InMemoryGateway;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GatewayError;

/// Call a named operation on a remote service
#[async_trait]
pub trait ServiceGateway: Send + Sync {
    async fn call(&self, service: &str, operation: &str, payload: Value) -> Result<Value, GatewayError>;
}
