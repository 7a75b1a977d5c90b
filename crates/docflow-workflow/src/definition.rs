//! Workflow Definition Types and YAML Loading
//!
//! Workflows are defined in YAML files and loaded at startup.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::WorkflowError;

/// A complete workflow definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow identifier
    pub workflow: String,
    /// Document type this workflow governs (e.g. "act", "judgment")
    pub doc_type: String,
    /// Sub-types covered; empty means every sub-type of `doc_type`
    #[serde(default)]
    pub sub_types: Vec<String>,
    /// Version number
    #[serde(default = "default_version")]
    pub version: u32,
    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// States in lifecycle order; the first is the initial state
    pub states: Vec<StateDef>,

    /// role -> state -> grant
    #[serde(default)]
    pub roles: HashMap<String, HashMap<String, RoleStateGrant>>,
}

fn default_version() -> u32 {
    1
}

/// State definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDef {
    /// State name as stored on the document
    pub name: String,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

/// What a role may do while a document is in a given state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleStateGrant {
    /// States the role may transition the document to
    #[serde(default)]
    pub next_states: Vec<String>,
    /// Actions the role may perform (e.g. "view", "edit", "delete")
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl WorkflowDefinition {
    /// Get the initial state for this workflow
    pub fn initial_state(&self) -> Option<&str> {
        self.states.first().map(|s| s.name.as_str())
    }

    /// State names in lifecycle order
    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.name.as_str()).collect()
    }

    /// Zero-based position of a state in the lifecycle order
    pub fn position(&self, state: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name == state)
    }

    /// Look up the grant for a role in a state
    pub fn grant(&self, role: &str, state: &str) -> Option<&RoleStateGrant> {
        self.roles.get(role).and_then(|states| states.get(state))
    }

    /// Does this definition cover the given sub-type?
    pub fn covers(&self, sub_type: &str) -> bool {
        self.sub_types.is_empty() || self.sub_types.iter().any(|s| s == sub_type)
    }

    /// Check internal consistency: at least one state, unique state names,
    /// and grants that only mention declared states.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.states.is_empty() {
            return Err(WorkflowError::NoStates(self.workflow.clone()));
        }

        let mut seen = HashSet::new();
        for state in &self.states {
            if !seen.insert(state.name.as_str()) {
                return Err(WorkflowError::DuplicateState {
                    workflow: self.workflow.clone(),
                    state: state.name.clone(),
                });
            }
        }

        for (role, states) in &self.roles {
            for (state, grant) in states {
                let referenced = std::iter::once(state).chain(grant.next_states.iter());
                for name in referenced {
                    if !seen.contains(name.as_str()) {
                        return Err(WorkflowError::UnknownStateReference {
                            workflow: self.workflow.clone(),
                            role: role.clone(),
                            state: name.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// Loader for workflow definitions
pub struct WorkflowLoader;

impl WorkflowLoader {
    /// Load all workflow definitions from a directory
    pub fn load_from_dir(dir: &Path) -> Result<Vec<WorkflowDefinition>, WorkflowError> {
        let mut definitions = Vec::new();

        if !dir.exists() {
            tracing::warn!("Workflow directory {} does not exist", dir.display());
            return Ok(definitions);
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
            {
                paths.push(path);
            }
        }
        // read_dir order is platform dependent
        paths.sort();

        for path in paths {
            let def = Self::load_from_file(&path)?;
            tracing::debug!("Loaded workflow '{}' from {}", def.workflow, path.display());
            definitions.push(def);
        }

        Ok(definitions)
    }

    /// Load a single workflow definition from a file
    pub fn load_from_file(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// Load from a YAML string
    pub fn load_from_str(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
        let def: WorkflowDefinition = serde_yaml::from_str(yaml)?;
        def.validate()?;
        Ok(def)
    }
}
