//! docflow - document operation pipelines
//!
//! Every document operation (add, edit, load, list, delete, upload, metadata)
//! is a named pipeline of small steps executed over a per-request context.
//! The XML store and the portal are reached through a [`ServiceGateway`];
//! workflow state is derived by the `docflow-workflow` crate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docflow::{AppConfig, HttpGateway, OperationInput, PipelineExecutor, PipelineRegistry, Services};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = AppConfig::from_env()?;
//! let gateway = Arc::new(HttpGateway::new(config.service_catalog()?)?);
//! let services = Services::builder(gateway, config.workflow_engine()?)
//!     .with_config(&config)
//!     .build()?;
//! let executor = PipelineExecutor::new(Arc::new(PipelineRegistry::standard()?), Arc::new(services))?;
//!
//! let input = OperationInput::json(serde_json::json!({"data": {"iri": "/akn/ke/act/legge/1970-06-03/Cap_44/eng@/!main"}}));
//! let response = executor.execute("/document/load", input).await?;
//! println!("{}", response.into_value());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Response envelope and document model
pub mod document;
pub mod envelope;

// Configuration
pub mod config;

// External stores
pub mod gateway;

// Operation pipelines
pub mod pipeline;

// Listing, metadata and rendering
pub mod listing;
pub mod merge;
pub mod meta;
pub mod render;

// Collaborator seams
pub mod attachments;
pub mod auth;
pub mod notify;

pub use config::AppConfig;
pub use document::{Document, DocumentWorkflow, FieldError, FormPackage};
pub use envelope::{Envelope, ErrorBody, ErrorCode};
pub use error::{GatewayError, PipelineError};
pub use gateway::{HttpGateway, InMemoryGateway, ServiceCatalog, ServiceGateway};
pub use listing::{ListingSorter, SortSpec};
pub use merge::merge;
pub use meta::{DocType, MetaHandler, MetaRegistry};
pub use pipeline::{OperationInput, PipelineExecutor, PipelineRegistry, Services};
