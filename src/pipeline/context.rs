//! Per-execution pipeline context
//!
//! A fresh [`PipelineContext`] is created for every execution and owned by it
//! alone. Each intermediate artefact lives in a named [`Slot`]. A slot can be
//! written any number of times until a step consumes it with
//! [`Slot::take`]; after that it is superseded and further writes are
//! rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attachments::UploadedFile;
use crate::auth::AuthContext;
use crate::document::{Attachment, Document, FormPackage, StoredPackage};
use crate::envelope::Envelope;
use crate::error::PipelineError;
use crate::listing::Listing;
use crate::render::RenderedPackage;

#[derive(Debug, Clone, PartialEq)]
enum SlotState<T> {
    Empty,
    Filled(T),
    Superseded,
}

/// A named, write-until-consumed context field
#[derive(Debug, Clone, PartialEq)]
pub struct Slot<T> {
    name: &'static str,
    state: SlotState<T>,
}

impl<T> Slot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: SlotState::Empty,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Store a value, replacing any previous one
    pub fn set(&mut self, value: T) -> Result<(), PipelineError> {
        if matches!(self.state, SlotState::Superseded) {
            return Err(PipelineError::SlotSuperseded(self.name));
        }
        self.state = SlotState::Filled(value);
        Ok(())
    }

    pub fn get(&self) -> Option<&T> {
        match &self.state {
            SlotState::Filled(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match &mut self.state {
            SlotState::Filled(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the value a step depends on
    pub fn require(&self, step: &'static str) -> Result<&T, PipelineError> {
        let slot = self.name;
        self.get().ok_or(PipelineError::MissingInput { step, slot })
    }

    pub fn require_mut(&mut self, step: &'static str) -> Result<&mut T, PipelineError> {
        let slot = self.name;
        self.get_mut().ok_or(PipelineError::MissingInput { step, slot })
    }

    /// Consume the value; the slot is superseded afterwards
    pub fn take(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.state, SlotState::Superseded) {
            SlotState::Filled(value) => Some(value),
            SlotState::Empty => {
                self.state = SlotState::Empty;
                None
            }
            SlotState::Superseded => None,
        }
    }

    pub fn take_required(&mut self, step: &'static str) -> Result<T, PipelineError> {
        let slot = self.name;
        self.take().ok_or(PipelineError::MissingInput { step, slot })
    }

    pub fn is_filled(&self) -> bool {
        matches!(self.state, SlotState::Filled(_))
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self.state, SlotState::Superseded)
    }
}

/// Raw request handed to an operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationInput {
    /// Decoded JSON body; the UI wraps its payload in `data`
    #[serde(default)]
    pub body: Value,
    /// Bearer token, when the transport supplied one
    #[serde(default)]
    pub token: Option<String>,
    /// Files of a multipart upload
    #[serde(default)]
    pub files: Vec<UploadedFile>,
}

impl OperationInput {
    pub fn json(body: Value) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_files(mut self, files: Vec<UploadedFile>) -> Self {
        self.files = files;
        self
    }
}

/// Validated custom metadata awaiting rendering
#[derive(Debug, Clone, PartialEq)]
pub struct MetaObject {
    pub iri: String,
    pub doc_type: String,
    pub object: Value,
}

/// Rendered custom metadata awaiting persistence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaXmlPackage {
    pub iri: String,
    pub data: String,
}

/// State threaded through the steps of one execution
#[derive(Debug)]
pub struct PipelineContext {
    pub operation: String,
    pub input: OperationInput,

    /// The submitted `data` object
    pub form: Slot<Value>,
    /// The `pkg` part of the submitted form
    pub package: Slot<FormPackage>,
    pub auth: Slot<AuthContext>,
    pub document: Slot<Document>,
    /// Document as read back from the XML store
    pub loaded: Slot<StoredPackage>,
    /// Raw listing reply from the XML store
    pub listing_reply: Slot<Value>,
    pub listing: Slot<Listing>,
    pub rendered: Slot<RenderedPackage>,
    /// Attachment files written by this execution, until the document is saved
    pub stored_attachments: Slot<Vec<Attachment>>,
    pub meta_object: Slot<MetaObject>,
    pub meta_xml: Slot<MetaXmlPackage>,

    pub response: Slot<Envelope>,
}

impl PipelineContext {
    pub fn new(operation: impl Into<String>, input: OperationInput) -> Self {
        Self {
            operation: operation.into(),
            input,
            form: Slot::new("form"),
            package: Slot::new("package"),
            auth: Slot::new("auth"),
            document: Slot::new("document"),
            loaded: Slot::new("loaded"),
            listing_reply: Slot::new("listing_reply"),
            listing: Slot::new("listing"),
            rendered: Slot::new("rendered"),
            stored_attachments: Slot::new("stored_attachments"),
            meta_object: Slot::new("meta_object"),
            meta_xml: Slot::new("meta_xml"),
            response: Slot::new("response"),
        }
    }

    /// Whether an earlier step already recorded a failure
    pub fn has_error_response(&self) -> bool {
        self.response.get().map(Envelope::is_error).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_overwrite_then_take() {
        let mut slot: Slot<u32> = Slot::new("n");
        assert!(slot.get().is_none());
        slot.set(1).unwrap();
        slot.set(2).unwrap();
        assert_eq!(slot.get(), Some(&2));

        assert_eq!(slot.take(), Some(2));
        assert!(slot.is_superseded());
        assert!(matches!(slot.set(3), Err(PipelineError::SlotSuperseded("n"))));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_take_on_empty_slot_does_not_supersede() {
        let mut slot: Slot<u32> = Slot::new("n");
        assert_eq!(slot.take(), None);
        assert!(!slot.is_superseded());
        slot.set(5).unwrap();
    }

    #[test]
    fn test_require_names_step_and_slot() {
        let slot: Slot<String> = Slot::new("document");
        match slot.require("renderDocument") {
            Err(PipelineError::MissingInput { step, slot }) => {
                assert_eq!(step, "renderDocument");
                assert_eq!(slot, "document");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_error_response_detection() {
        let mut ctx = PipelineContext::new("/document/load", OperationInput::json(json!({})));
        assert!(!ctx.has_error_response());
        ctx.response.set(Envelope::success(json!({"ok": true}))).unwrap();
        assert!(!ctx.has_error_response());
        ctx.response
            .set(Envelope::failure(crate::envelope::ErrorCode::DocNotFound, "gone"))
            .unwrap();
        assert!(ctx.has_error_response());
    }
}
