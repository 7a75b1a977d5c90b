//! Operation pipelines
//!
//! An operation is a named, ordered list of [`StepId`]s registered in the
//! [`PipelineRegistry`]. The [`PipelineExecutor`] runs those steps over a
//! fresh [`PipelineContext`] per request:
//!
//! ```text
//! /document/add
//!   receive -> docExistsOnClient -> docExistsOnPortal -> setFormObject
//!   -> convertFormToDocument -> renderDocument -> saveToXmlDb
//!   -> notifyStatus -> respond
//! ```
//!
//! A step returning [`StepOutcome::Stop`] ends the operation with that
//! response. Otherwise the response is whatever the last step left in the
//! response slot.

pub mod context;
pub mod executor;
pub mod registry;
pub mod services;
pub mod step;
pub mod steps;

pub use context::{MetaObject, MetaXmlPackage, OperationInput, PipelineContext, Slot};
pub use executor::PipelineExecutor;
pub use registry::{Decoding, OperationSpec, PipelineRegistry};
pub use services::{Services, ServicesBuilder};
pub use step::{PipelineStep, StepId, StepOutcome};
