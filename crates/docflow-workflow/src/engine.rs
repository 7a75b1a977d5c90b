//! Workflow Engine
//!
//! Derives the lifecycle view of a document from its type, sub-type and
//! current state: the full state sequence, the states the acting role may move
//! it to, the role's permissions, and a completion percentage.
//!
//! Derivation is pure. The engine holds only the immutable catalog, so it is
//! shared behind an `Arc` and queried concurrently without locking.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::WorkflowCatalog;
use crate::definition::WorkflowDefinition;
use crate::WorkflowError;

/// The workflow derivation engine
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    catalog: Arc<WorkflowCatalog>,
}

/// Lifecycle view of one document for one role (or set of roles)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStateInfo {
    pub workflow: String,
    pub current_state: String,
    pub all_states: Vec<StateSummary>,
    pub next_states: Vec<String>,
    pub permissions: Vec<String>,
    pub progress: Progress,
}

/// Name and title of a state, in lifecycle order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    pub name: String,
    pub title: String,
}

/// Completion percentage derived from the state position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// 0..=100
    pub percent: u8,
    /// False when the current state is not part of the workflow; `percent`
    /// is then clamped to 0.
    pub state_known: bool,
}

impl Progress {
    /// `floor((position + 1) / total * 100)`, or 0 when the state is unknown
    pub fn from_position(position: Option<usize>, total: usize) -> Self {
        match position {
            Some(index) if total > 0 => Self {
                percent: (((index + 1) * 100) / total).min(100) as u8,
                state_known: true,
            },
            _ => Self {
                percent: 0,
                state_known: false,
            },
        }
    }
}

impl WorkflowEngine {
    /// Create a new workflow engine
    pub fn new(catalog: WorkflowCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    /// Get the workflow catalog
    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    fn definition(&self, doc_type: &str, sub_type: &str) -> Result<&WorkflowDefinition, WorkflowError> {
        self.catalog
            .resolve(doc_type, sub_type)
            .ok_or_else(|| WorkflowError::UnknownWorkflow {
                doc_type: doc_type.to_string(),
                sub_type: sub_type.to_string(),
            })
    }

    /// State a newly created document starts in
    pub fn initial_state(&self, doc_type: &str, sub_type: &str) -> Result<String, WorkflowError> {
        let definition = self.definition(doc_type, sub_type)?;
        definition
            .initial_state()
            .map(str::to_string)
            .ok_or_else(|| WorkflowError::NoStates(definition.workflow.clone()))
    }

    /// Derive the lifecycle view for a single role.
    ///
    /// A role without an entry for the current state gets empty next states
    /// and permissions.
    pub fn derive_state(
        &self,
        doc_type: &str,
        sub_type: &str,
        current_state: &str,
        role: &str,
    ) -> Result<WorkflowStateInfo, WorkflowError> {
        self.derive_state_for_roles(doc_type, sub_type, current_state, &[role])
    }

    /// Derive the lifecycle view for a user holding several roles.
    ///
    /// Next states and permissions are the union over all roles, in the order
    /// roles are given, without duplicates.
    pub fn derive_state_for_roles<S: AsRef<str>>(
        &self,
        doc_type: &str,
        sub_type: &str,
        current_state: &str,
        roles: &[S],
    ) -> Result<WorkflowStateInfo, WorkflowError> {
        let definition = self.definition(doc_type, sub_type)?;

        let position = definition.position(current_state);
        let progress = Progress::from_position(position, definition.states.len());
        if !progress.state_known {
            tracing::warn!(
                workflow = %definition.workflow,
                state = current_state,
                "Document state is not part of its workflow; progress clamped to 0"
            );
        }

        let mut next_states: Vec<String> = Vec::new();
        let mut permissions: Vec<String> = Vec::new();
        for role in roles {
            if let Some(grant) = definition.grant(role.as_ref(), current_state) {
                push_unique(&mut next_states, &grant.next_states);
                push_unique(&mut permissions, &grant.permissions);
            }
        }

        Ok(WorkflowStateInfo {
            workflow: definition.workflow.clone(),
            current_state: current_state.to_string(),
            all_states: definition
                .states
                .iter()
                .map(|s| StateSummary {
                    name: s.name.clone(),
                    title: s.title.clone(),
                })
                .collect(),
            next_states,
            permissions,
            progress,
        })
    }
}

fn push_unique(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowLoader;

    const THREE_STATES: &str = r#"
workflow: simple
doc_type: doc
states:
  - name: draft
  - name: review
  - name: published
roles:
  client.Editor:
    draft:
      next_states: [review]
      permissions: [view, edit]
  client.Admin:
    draft:
      next_states: [published, review]
      permissions: [view, delete]
"#;

    fn engine() -> WorkflowEngine {
        let def = WorkflowLoader::load_from_str(THREE_STATES).unwrap();
        WorkflowEngine::new(WorkflowCatalog::new(vec![def]).unwrap())
    }

    #[test]
    fn test_progress_by_position() {
        let engine = engine();
        let percent = |state: &str| {
            engine
                .derive_state("doc", "any", state, "client.Editor")
                .unwrap()
                .progress
                .percent
        };
        assert_eq!(percent("draft"), 33);
        assert_eq!(percent("review"), 66);
        assert_eq!(percent("published"), 100);
    }

    #[test]
    fn test_unknown_state_clamps_to_zero() {
        let info = engine()
            .derive_state("doc", "any", "archived", "client.Editor")
            .unwrap();
        assert_eq!(info.progress.percent, 0);
        assert!(!info.progress.state_known);
        assert!(info.next_states.is_empty());
    }

    #[test]
    fn test_role_grants() {
        let info = engine()
            .derive_state("doc", "any", "draft", "client.Editor")
            .unwrap();
        assert_eq!(info.next_states, vec!["review"]);
        assert_eq!(info.permissions, vec!["view", "edit"]);
        assert_eq!(info.all_states.len(), 3);
        assert_eq!(info.current_state, "draft");
    }

    #[test]
    fn test_missing_role_is_empty_not_error() {
        let info = engine()
            .derive_state("doc", "any", "draft", "portal.Reader")
            .unwrap();
        assert!(info.next_states.is_empty());
        assert!(info.permissions.is_empty());
        assert_eq!(info.progress.percent, 33);
    }

    #[test]
    fn test_roles_union_preserves_order() {
        let info = engine()
            .derive_state_for_roles("doc", "any", "draft", &["client.Editor", "client.Admin"])
            .unwrap();
        assert_eq!(info.next_states, vec!["review", "published"]);
        assert_eq!(info.permissions, vec!["view", "edit", "delete"]);
    }

    #[test]
    fn test_unknown_doc_type() {
        let err = engine()
            .derive_state("judgment", "any", "draft", "client.Editor")
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownWorkflow { .. }));
    }

    #[test]
    fn test_initial_state() {
        assert_eq!(engine().initial_state("doc", "x").unwrap(), "draft");
    }

    #[test]
    fn test_progress_from_position() {
        assert_eq!(Progress::from_position(Some(0), 1).percent, 100);
        assert_eq!(Progress::from_position(Some(1), 4).percent, 50);
        assert_eq!(Progress::from_position(Some(0), 0).percent, 0);
        assert_eq!(Progress::from_position(None, 5).percent, 0);
    }
}
