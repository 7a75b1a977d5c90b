//! IRI existence checks run before a document is added

use async_trait::async_trait;
use serde_json::{json, Value};

use super::super::context::PipelineContext;
use super::super::services::Services;
use super::super::step::{PipelineStep, StepId, StepOutcome};
use super::{missing_field, str_at};
use crate::envelope::{reply_code, Envelope, ErrorCode};
use crate::error::PipelineError;
use crate::gateway::{PORTAL_DATA, XML_SERVER};

const IRI_POINTER: &str = "/pkg/pkgIdentity/docIri/value";

/// Ask a store whether the form's IRI exists.
///
/// `None` means the store reported `doc_not_found` and the add may proceed.
/// Any other reply stops the operation: a success reply with `exists`, an
/// error reply with the store's own error, a failed call with `EXCEPTION`.
async fn check_absent(
    ctx: &PipelineContext,
    services: &Services,
    service: &str,
    exists: ErrorCode,
) -> Option<Envelope> {
    let iri = match ctx.form.get().and_then(|form| str_at(form, IRI_POINTER)) {
        Some(iri) => iri.to_string(),
        None => return Some(missing_field("docIri")),
    };

    match services.gateway.call(service, "docExists", json!({ "iri": iri })).await {
        Ok(reply) if reply_code(&reply) == Some(ErrorCode::DocNotFound.as_str()) => None,
        Ok(reply) if reply.get("error").is_some() => Some(Envelope::from_store_reply(reply)),
        Ok(_) => {
            tracing::info!(iri = %iri, service, "Document already exists");
            Some(Envelope::failure(exists, format!("Document {} already exists", iri)))
        }
        Err(e) => Some(Envelope::exception(&e)),
    }
}

/// Stops the add when the IRI already exists in the client store
pub struct DocExistsOnClient;

#[async_trait]
impl PipelineStep for DocExistsOnClient {
    fn id(&self) -> StepId {
        StepId::DocExistsOnClient
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        Ok(match check_absent(ctx, services, XML_SERVER, ErrorCode::DocExistsOnClient).await {
            None => StepOutcome::Continue,
            Some(response) => StepOutcome::Stop(response),
        })
    }
}

/// Stops the add when the IRI is already published on the portal, unless
/// the form sets `skipCheck`
pub struct DocExistsOnPortal;

#[async_trait]
impl PipelineStep for DocExistsOnPortal {
    fn id(&self) -> StepId {
        StepId::DocExistsOnPortal
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let skip = ctx
            .form
            .get()
            .and_then(|form| form.get("skipCheck"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if skip {
            tracing::debug!("Portal existence check skipped");
            return Ok(StepOutcome::Continue);
        }

        Ok(match check_absent(ctx, services, PORTAL_DATA, ErrorCode::DocExistsOnPortal).await {
            None => StepOutcome::Continue,
            Some(response) => StepOutcome::Stop(response),
        })
    }
}
