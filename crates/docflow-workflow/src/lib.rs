//! Document Workflow
//!
//! Lifecycle workflows for documents. Each document type (optionally narrowed
//! to a set of sub-types) has an ordered sequence of states and a
//! role → state → grant table listing the states a role may move a document
//! to and the actions it may perform while the document sits in a state.
//!
//! Definitions are loaded from YAML once at startup and are immutable
//! afterwards, so a [`WorkflowEngine`] can be shared freely across tasks.
//!
//! ```ignore
//! let catalog = WorkflowCatalog::new(WorkflowLoader::load_from_dir(dir)?)?;
//! let engine = WorkflowEngine::new(catalog);
//! let info = engine.derive_state("act", "legge", "editable", "client.Editor")?;
//! assert_eq!(info.progress.percent, 40);
//! ```

pub mod catalog;
pub mod definition;
pub mod engine;

pub use catalog::WorkflowCatalog;
pub use definition::{RoleStateGrant, StateDef, WorkflowDefinition, WorkflowLoader};
pub use engine::{Progress, StateSummary, WorkflowEngine, WorkflowStateInfo};

use thiserror::Error;

/// Errors raised while loading or querying workflow definitions
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No workflow defined for document type '{doc_type}' (sub-type '{sub_type}')")]
    UnknownWorkflow { doc_type: String, sub_type: String },

    #[error("Workflow '{0}' has no states")]
    NoStates(String),

    #[error("Workflow '{workflow}' declares state '{state}' more than once")]
    DuplicateState { workflow: String, state: String },

    #[error("Workflow '{workflow}' references unknown state '{state}' for role '{role}'")]
    UnknownStateReference {
        workflow: String,
        role: String,
        state: String,
    },

    #[error("Workflows '{first}' and '{second}' both cover document type '{doc_type}' sub-type '{sub_type}'")]
    Overlap {
        doc_type: String,
        sub_type: String,
        first: String,
        second: String,
    },
}
