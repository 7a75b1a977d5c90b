//! Step implementations
//!
//! Every [`StepId`] resolves to exactly one implementation here.

mod documents;
mod existence;
mod intake;
mod listing;
mod metadata;

use serde_json::Value;
use std::sync::Arc;

use super::context::PipelineContext;
use super::step::{PipelineStep, StepId};
use crate::document::FieldError;
use crate::envelope::{Envelope, ErrorCode};
use crate::error::{GatewayError, PipelineError};

/// Resolve a declarative step identifier to its implementation
pub fn resolve(id: StepId) -> Arc<dyn PipelineStep> {
    match id {
        StepId::Receive => Arc::new(intake::Receive),
        StepId::ReceiveUpload => Arc::new(intake::ReceiveUpload),
        StepId::Authenticate => Arc::new(intake::Authenticate),
        StepId::AuthSelfTest => Arc::new(intake::AuthSelfTest),
        StepId::SetFormObject => Arc::new(intake::SetFormObject),
        StepId::Respond => Arc::new(intake::Respond),
        StepId::DocExistsOnClient => Arc::new(existence::DocExistsOnClient),
        StepId::DocExistsOnPortal => Arc::new(existence::DocExistsOnPortal),
        StepId::ConvertFormToDocument => Arc::new(documents::ConvertFormToDocument),
        StepId::RenderDocument => Arc::new(documents::RenderDocument),
        StepId::SaveToXmlDb => Arc::new(documents::SaveToXmlDb),
        StepId::NotifyStatus => Arc::new(documents::NotifyStatus),
        StepId::UpdateTitle => Arc::new(documents::UpdateTitle),
        StepId::LoadXmlForIri => Arc::new(documents::LoadXmlForIri),
        StepId::ConvertToDocument => Arc::new(documents::ConvertToDocument),
        StepId::DeleteDocument => Arc::new(documents::DeleteDocument),
        StepId::StoreAttachments => Arc::new(documents::StoreAttachments),
        StepId::LoadListing => Arc::new(listing::LoadListing),
        StepId::LoadFilteredListing => Arc::new(listing::LoadFilteredListing),
        StepId::ConvertToListing => Arc::new(listing::ConvertToListing),
        StepId::SortListing => Arc::new(listing::SortListing),
        StepId::LoadMetadata => Arc::new(metadata::LoadMetadata),
        StepId::SaveMetadata => Arc::new(metadata::SaveMetadata),
        StepId::RefreshTags => Arc::new(metadata::RefreshTags),
        StepId::ConvertFormToMetaObject => Arc::new(metadata::ConvertFormToMetaObject),
        StepId::RenderMetaObject => Arc::new(metadata::RenderMetaObject),
        StepId::SaveCustomMeta => Arc::new(metadata::SaveCustomMeta),
    }
}

/// Record a store call result as the response: the store's own reply
/// (success or error member) or `EXCEPTION` for a failed call.
fn record_reply(ctx: &mut PipelineContext, result: Result<Value, GatewayError>) -> Result<(), PipelineError> {
    let envelope = match result {
        Ok(reply) => Envelope::from_store_reply(reply),
        Err(e) => Envelope::exception(&e),
    };
    ctx.response.set(envelope)
}

fn invalid_values(errors: &[FieldError]) -> Envelope {
    Envelope::failure(
        ErrorCode::InvalidValues,
        serde_json::to_value(errors).unwrap_or(Value::Null),
    )
}

fn missing_field(field: &str) -> Envelope {
    invalid_values(&[FieldError::new(field, "is required")])
}

/// Non-empty string at a JSON pointer
fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
