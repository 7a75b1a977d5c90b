//! Operation table
//!
//! Operations are registered once at startup from the declarative table in
//! [`PipelineRegistry::standard`]. Each step identifier is resolved to its
//! implementation at registration, so an executor never looks steps up by
//! name at request time.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::step::{PipelineStep, StepId};
use super::steps;
use crate::error::PipelineError;
use crate::gateway::HttpMethod;

/// How the transport decodes a request before it reaches the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Decoding {
    Json,
    Multipart,
    AuthSelfTest,
}

/// Declared shape of one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSpec {
    pub name: String,
    pub method: HttpMethod,
    pub decoding: Decoding,
    pub steps: Vec<StepId>,
}

struct RegisteredOperation {
    spec: OperationSpec,
    steps: Vec<Arc<dyn PipelineStep>>,
}

/// Operations registered in bulk with JSON decoding
const OPERATIONS: &[(&str, HttpMethod, &[StepId])] = &[
    (
        "/document/add",
        HttpMethod::Post,
        &[
            StepId::Receive,
            StepId::DocExistsOnClient,
            StepId::DocExistsOnPortal,
            StepId::SetFormObject,
            StepId::ConvertFormToDocument,
            StepId::RenderDocument,
            StepId::SaveToXmlDb,
            StepId::NotifyStatus,
            StepId::Respond,
        ],
    ),
    (
        "/document/edit",
        HttpMethod::Post,
        &[StepId::Receive, StepId::SetFormObject, StepId::UpdateTitle, StepId::Respond],
    ),
    (
        "/document/load",
        HttpMethod::Post,
        &[StepId::Receive, StepId::LoadXmlForIri, StepId::ConvertToDocument, StepId::Respond],
    ),
    (
        "/documents",
        HttpMethod::Post,
        &[
            StepId::Authenticate,
            StepId::Receive,
            StepId::LoadListing,
            StepId::ConvertToListing,
            StepId::SortListing,
            StepId::Respond,
        ],
    ),
    (
        "/documents/filter",
        HttpMethod::Post,
        &[
            StepId::Authenticate,
            StepId::Receive,
            StepId::LoadFilteredListing,
            StepId::ConvertToListing,
            StepId::Respond,
        ],
    ),
    (
        "/document/delete",
        HttpMethod::Post,
        &[
            StepId::Receive,
            StepId::LoadXmlForIri,
            StepId::ConvertToDocument,
            StepId::DeleteDocument,
            StepId::Respond,
        ],
    ),
    ("/documents/metadata", HttpMethod::Get, &[StepId::LoadMetadata, StepId::Respond]),
    (
        "/document/tags/refresh",
        HttpMethod::Post,
        &[StepId::Receive, StepId::RefreshTags, StepId::Respond],
    ),
    (
        "/documents/metadata/add",
        HttpMethod::Post,
        &[StepId::Receive, StepId::SaveMetadata, StepId::Respond],
    ),
    (
        "/documents/custom/meta/edit",
        HttpMethod::Post,
        &[
            StepId::Receive,
            StepId::ConvertFormToMetaObject,
            StepId::RenderMetaObject,
            StepId::SaveCustomMeta,
            StepId::Respond,
        ],
    ),
];

const UPLOAD_STEPS: &[StepId] = &[
    StepId::ReceiveUpload,
    StepId::LoadXmlForIri,
    StepId::ConvertToDocument,
    StepId::StoreAttachments,
    StepId::RenderDocument,
    StepId::SaveToXmlDb,
    StepId::Respond,
];

const AUTH_STEPS: &[StepId] = &[StepId::Authenticate, StepId::AuthSelfTest];

/// Registered operations by name
#[derive(Default)]
pub struct PipelineRegistry {
    operations: BTreeMap<String, RegisteredOperation>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation the service exposes
    pub fn standard() -> Result<Self, PipelineError> {
        let mut registry = Self::new();
        for (name, method, steps) in OPERATIONS {
            registry.register(name, *method, steps)?;
        }
        // registered individually: the transport decodes these differently
        registry.register_special("/document/upload", HttpMethod::Post, Decoding::Multipart, UPLOAD_STEPS)?;
        registry.register_special("/document/auth", HttpMethod::Post, Decoding::AuthSelfTest, AUTH_STEPS)?;
        Ok(registry)
    }

    /// Register a JSON operation
    pub fn register(&mut self, name: &str, method: HttpMethod, steps: &[StepId]) -> Result<(), PipelineError> {
        self.register_special(name, method, Decoding::Json, steps)
    }

    /// Register an operation with its own request decoding.
    ///
    /// Rejects duplicate names, empty step lists, and step lists whose last
    /// step never produces a response.
    pub fn register_special(
        &mut self,
        name: &str,
        method: HttpMethod,
        decoding: Decoding,
        steps: &[StepId],
    ) -> Result<(), PipelineError> {
        if self.operations.contains_key(name) {
            return Err(PipelineError::DuplicateOperation(name.to_string()));
        }
        let last = steps
            .last()
            .ok_or_else(|| PipelineError::EmptyOperation(name.to_string()))?;
        if !last.emits_response() {
            return Err(PipelineError::NoResponseStep {
                operation: name.to_string(),
                step: last.to_string(),
            });
        }

        let resolved = steps.iter().map(|id| steps::resolve(*id)).collect();
        self.operations.insert(
            name.to_string(),
            RegisteredOperation {
                spec: OperationSpec {
                    name: name.to_string(),
                    method,
                    decoding,
                    steps: steps.to_vec(),
                },
                steps: resolved,
            },
        );
        tracing::debug!(operation = name, steps = steps.len(), "Registered operation");
        Ok(())
    }

    /// Register an operation declared with step names, as in a YAML table
    pub fn register_named(&mut self, name: &str, method: HttpMethod, steps: &[&str]) -> Result<(), PipelineError> {
        let ids = steps
            .iter()
            .map(|s| s.parse::<StepId>())
            .collect::<Result<Vec<_>, _>>()?;
        self.register(name, method, &ids)
    }

    pub fn lookup(&self, name: &str) -> Result<&OperationSpec, PipelineError> {
        self.operations
            .get(name)
            .map(|op| &op.spec)
            .ok_or_else(|| PipelineError::OperationNotFound(name.to_string()))
    }

    pub(crate) fn steps(&self, name: &str) -> Result<&[Arc<dyn PipelineStep>], PipelineError> {
        self.operations
            .get(name)
            .map(|op| op.steps.as_slice())
            .ok_or_else(|| PipelineError::OperationNotFound(name.to_string()))
    }

    /// Declared operations, sorted by name
    pub fn operations(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.values().map(|op| &op.spec)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Startup check: every operation ends with a response-emitting step and
    /// every resolved step matches its declared identifier
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, op) in &self.operations {
            match op.spec.steps.last() {
                None => return Err(PipelineError::EmptyOperation(name.clone())),
                Some(last) if !last.emits_response() => {
                    return Err(PipelineError::NoResponseStep {
                        operation: name.clone(),
                        step: last.to_string(),
                    })
                }
                Some(_) => {}
            }
            for (declared, step) in op.spec.steps.iter().zip(&op.steps) {
                if *declared != step.id() {
                    return Err(PipelineError::UnknownStep(declared.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let registry = PipelineRegistry::standard().unwrap();
        assert_eq!(registry.len(), 12);
        registry.validate().unwrap();

        let upload = registry.lookup("/document/upload").unwrap();
        assert_eq!(upload.decoding, Decoding::Multipart);
        assert_eq!(registry.lookup("/document/auth").unwrap().decoding, Decoding::AuthSelfTest);
        assert_eq!(registry.lookup("/documents/metadata").unwrap().method, HttpMethod::Get);
        assert_eq!(registry.lookup("/document/add").unwrap().decoding, Decoding::Json);
    }

    #[test]
    fn test_operation_spec_serializes() {
        let registry = PipelineRegistry::standard().unwrap();
        let spec = serde_json::to_value(registry.lookup("/documents/metadata").unwrap()).unwrap();
        assert_eq!(spec["steps"], serde_json::json!(["loadMetadata", "respond"]));
        assert_eq!(spec["decoding"], "json");
    }

    #[test]
    fn test_every_operation_ends_with_response() {
        let registry = PipelineRegistry::standard().unwrap();
        for op in registry.operations() {
            assert!(op.steps.last().unwrap().emits_response(), "{} has no response step", op.name);
        }
    }

    #[test]
    fn test_unknown_operation() {
        let registry = PipelineRegistry::standard().unwrap();
        assert!(matches!(
            registry.lookup("/document/publish"),
            Err(PipelineError::OperationNotFound(name)) if name == "/document/publish"
        ));
    }

    #[test]
    fn test_rejects_bad_registrations() {
        let mut registry = PipelineRegistry::new();
        registry
            .register("/document/load", HttpMethod::Post, &[StepId::Receive, StepId::Respond])
            .unwrap();

        assert!(matches!(
            registry.register("/document/load", HttpMethod::Post, &[StepId::Respond]),
            Err(PipelineError::DuplicateOperation(_))
        ));
        assert!(matches!(
            registry.register("/empty", HttpMethod::Post, &[]),
            Err(PipelineError::EmptyOperation(_))
        ));
        assert!(matches!(
            registry.register("/dangling", HttpMethod::Post, &[StepId::Receive, StepId::LoadXmlForIri]),
            Err(PipelineError::NoResponseStep { step, .. }) if step == "loadXmlForIri"
        ));
    }

    #[test]
    fn test_register_named() {
        let mut registry = PipelineRegistry::new();
        registry
            .register_named("/documents/metadata", HttpMethod::Get, &["loadMetadata", "respond"])
            .unwrap();
        assert_eq!(
            registry.lookup("/documents/metadata").unwrap().steps,
            vec![StepId::LoadMetadata, StepId::Respond]
        );
        assert!(matches!(
            registry.register_named("/x", HttpMethod::Post, &["receive", "convertAknObjectToXml"]),
            Err(PipelineError::UnknownStep(_))
        ));
    }
}
