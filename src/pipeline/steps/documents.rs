//! Single-document steps: convert, render, save, load, edit, delete, upload

use async_trait::async_trait;
use serde_json::{json, Value};

use super::super::context::PipelineContext;
use super::super::services::Services;
use super::super::step::{PipelineStep, StepId, StepOutcome};
use super::{invalid_values, missing_field, record_reply, str_at};
use crate::auth::AuthContext;
use crate::document::{Document, DocumentWorkflow, StoredPackage};
use crate::envelope::{Envelope, ErrorCode};
use crate::error::PipelineError;
use crate::gateway::XML_SERVER;
use crate::notify::{StatusMessage, EXCHANGE};
use crate::render::RenderedPackage;
use docflow_workflow::WorkflowError;

/// Workflow view of `doc` for the caller's roles. Documents whose type has
/// no workflow keep their stored state and nothing else.
pub(super) fn derive_workflow(doc: &Document, auth: Option<&AuthContext>, services: &Services) -> DocumentWorkflow {
    let roles = auth
        .map(|a| a.roles_for_client(&services.client_id))
        .unwrap_or_default();
    match services
        .workflow
        .derive_state_for_roles(&doc.doc_type, &doc.sub_type, &doc.workflow.state, &roles)
    {
        Ok(info) => info.into(),
        Err(e) => {
            tracing::warn!(iri = %doc.iri, error = %e, "No workflow for document");
            DocumentWorkflow {
                state: doc.workflow.state.clone(),
                ..Default::default()
            }
        }
    }
}

/// Remove attachment files written earlier in this execution once the
/// document they belong to can no longer be saved
async fn discard_stored_attachments(ctx: &mut PipelineContext, services: &Services) {
    let Some(stored) = ctx.stored_attachments.take().filter(|s| !s.is_empty()) else {
        return;
    };
    match services.attachments.delete(&stored).await {
        Ok(removed) => tracing::info!(removed, "Discarded attachments of unsaved document"),
        Err(e) => tracing::warn!(error = %e, "Discarding attachments failed"),
    }
}

/// Validates the submitted package and builds the canonical document in its
/// workflow's initial state
pub struct ConvertFormToDocument;

#[async_trait]
impl PipelineStep for ConvertFormToDocument {
    fn id(&self) -> StepId {
        StepId::ConvertFormToDocument
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let pkg = ctx.package.require("convertFormToDocument")?;
        let mut doc = match Document::from_form(pkg) {
            Ok(doc) => doc,
            Err(errors) => {
                tracing::info!(errors = errors.len(), "Submitted document failed validation");
                return Ok(StepOutcome::Stop(invalid_values(&errors)));
            }
        };

        match services.workflow.initial_state(&doc.doc_type, &doc.sub_type) {
            Ok(initial) => doc.workflow.state = initial,
            Err(e @ WorkflowError::UnknownWorkflow { .. }) => {
                return Ok(StepOutcome::Stop(Envelope::failure(ErrorCode::UnsupportedDocType, e.to_string())));
            }
            Err(e) => return Err(e.into()),
        }
        doc.workflow = derive_workflow(&doc, ctx.auth.get(), services);

        ctx.document.set(doc)?;
        Ok(StepOutcome::Continue)
    }
}

/// Renders the document to Akoma Ntoso XML
pub struct RenderDocument;

#[async_trait]
impl PipelineStep for RenderDocument {
    fn id(&self) -> StepId {
        StepId::RenderDocument
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let doc = ctx.document.require("renderDocument")?;
        match RenderedPackage::for_document(services.renderer.as_ref(), doc) {
            Ok(package) => {
                tracing::debug!(file = %package.file_xml, bytes = package.data.len(), "Rendered document");
                ctx.rendered.set(package)?;
                Ok(StepOutcome::Continue)
            }
            Err(e) => {
                tracing::error!(iri = %doc.iri, error = %e, "Rendering failed");
                discard_stored_attachments(ctx, services).await;
                Ok(StepOutcome::Stop(Envelope::exception(&e)))
            }
        }
    }
}

/// Writes the rendered package to the XML store. A failed save discards
/// attachment files stored for it.
pub struct SaveToXmlDb;

#[async_trait]
impl PipelineStep for SaveToXmlDb {
    fn id(&self) -> StepId {
        StepId::SaveToXmlDb
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let package = ctx.rendered.take_required("saveToXmlDb")?;
        let payload = serde_json::to_value(&package).unwrap_or(Value::Null);
        let result = services.gateway.call(XML_SERVER, "saveXml", payload).await;
        record_reply(ctx, result)?;
        if ctx.has_error_response() {
            discard_stored_attachments(ctx, services).await;
        }
        Ok(StepOutcome::Continue)
    }
}

/// Publishes a status message when the save succeeded
pub struct NotifyStatus;

#[async_trait]
impl PipelineStep for NotifyStatus {
    fn id(&self) -> StepId {
        StepId::NotifyStatus
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        if ctx.has_error_response() {
            return Ok(StepOutcome::Continue);
        }
        let Some(doc) = ctx.document.get() else {
            return Ok(StepOutcome::Continue);
        };

        let message = StatusMessage {
            exchange: EXCHANGE.to_string(),
            routing_key: services.notifier.routing_key().to_string(),
            iri: doc.iri.clone(),
            state: doc.workflow.state.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = services.notifier.notify(message).await {
            tracing::warn!(iri = %doc.iri, error = %e, "Status notification failed");
        }
        Ok(StepOutcome::Continue)
    }
}

/// Updates the title of an existing document
pub struct UpdateTitle;

#[async_trait]
impl PipelineStep for UpdateTitle {
    fn id(&self) -> StepId {
        StepId::UpdateTitle
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let pkg = ctx.package.require("updateTitle")?;
        let iri = pkg.iri().trim().to_string();
        if iri.is_empty() {
            return Ok(StepOutcome::Stop(missing_field("docIri")));
        }
        let payload = json!({
            "iri": iri,
            "data": [{ "name": "docTitle", "value": pkg.pkg_identity.doc_title.value }],
        });

        let result = services.gateway.call(XML_SERVER, "updateXml", payload).await;
        record_reply(ctx, result)?;
        Ok(StepOutcome::Continue)
    }
}

/// Reads a document from the XML store. A store or transport failure is
/// recorded as the response and the pipeline continues.
pub struct LoadXmlForIri;

#[async_trait]
impl PipelineStep for LoadXmlForIri {
    fn id(&self) -> StepId {
        StepId::LoadXmlForIri
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let form = ctx.form.require("loadXmlForIri")?;
        let Some(iri) = str_at(form, "/iri").map(str::to_string) else {
            ctx.response.set(missing_field("iri"))?;
            return Ok(StepOutcome::Continue);
        };

        match services.gateway.call(XML_SERVER, "getXml", json!({ "iri": iri })).await {
            Ok(reply) if reply.get("error").is_some() => {
                ctx.response.set(Envelope::from_store_reply(reply))?;
            }
            Ok(reply) => match serde_json::from_value::<StoredPackage>(reply) {
                Ok(stored) => ctx.loaded.set(stored)?,
                Err(e) => {
                    tracing::error!(iri = %iri, error = %e, "Unreadable document from store");
                    ctx.response.set(Envelope::exception(&e))?;
                }
            },
            Err(e) => ctx.response.set(Envelope::exception(&e))?,
        }
        Ok(StepOutcome::Continue)
    }
}

/// Turns the loaded record into the canonical document with its workflow
/// view, or passes an earlier failure through
pub struct ConvertToDocument;

#[async_trait]
impl PipelineStep for ConvertToDocument {
    fn id(&self) -> StepId {
        StepId::ConvertToDocument
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        if ctx.has_error_response() {
            return Ok(StepOutcome::Continue);
        }
        let mut doc = ctx.loaded.take_required("convertToDocument")?.into_document();
        doc.workflow = derive_workflow(&doc, ctx.auth.get(), services);

        let value = serde_json::to_value(&doc).unwrap_or(Value::Null);
        ctx.response.set(Envelope::success(value))?;
        ctx.document.set(doc)?;
        Ok(StepOutcome::Continue)
    }
}

/// Deletes the loaded document and its attachment files
pub struct DeleteDocument;

#[async_trait]
impl PipelineStep for DeleteDocument {
    fn id(&self) -> StepId {
        StepId::DeleteDocument
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        if ctx.has_error_response() {
            return Ok(StepOutcome::Continue);
        }
        let doc = ctx.document.require("deleteDocument")?;

        let response = match services
            .gateway
            .call(XML_SERVER, "deleteDocument", json!({ "iri": doc.iri }))
            .await
        {
            Ok(reply) => {
                let envelope = Envelope::from_store_reply(reply);
                if !envelope.is_error() {
                    match services.attachments.delete(&doc.attachments).await {
                        Ok(removed) => tracing::debug!(iri = %doc.iri, removed, "Removed attachment files"),
                        Err(e) => tracing::warn!(iri = %doc.iri, error = %e, "Attachment cleanup failed"),
                    }
                }
                envelope
            }
            Err(e) => Envelope::exception(&e),
        };
        ctx.response.set(response)?;
        Ok(StepOutcome::Continue)
    }
}

/// Stores uploaded files and appends their descriptors to the document
pub struct StoreAttachments;

#[async_trait]
impl PipelineStep for StoreAttachments {
    fn id(&self) -> StepId {
        StepId::StoreAttachments
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        if let Some(failure) = ctx.response.get().filter(|r| r.is_error()) {
            return Ok(StepOutcome::Stop(failure.clone()));
        }

        let titles: Vec<(String, String)> = ctx
            .form
            .get()
            .and_then(|form| form.get("attachments"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        (
                            str_at(item, "/field").unwrap_or_default().to_string(),
                            str_at(item, "/title").unwrap_or_default().to_string(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let files = ctx.input.files.clone();
        let (iri, mut index) = {
            let doc = ctx.document.require("storeAttachments")?;
            (doc.iri.clone(), doc.next_attachment_index())
        };
        let mut stored = Vec::with_capacity(files.len());
        for file in &files {
            let title = titles
                .iter()
                .find(|(field, _)| *field == file.field_name)
                .map(|(_, title)| title.as_str())
                .unwrap_or("");
            match services.attachments.store(&iri, index, title, file).await {
                Ok(attachment) => {
                    stored.push(attachment);
                    index += 1;
                }
                Err(e) => {
                    tracing::error!(iri = %iri, file = %file.file_name, error = %e, "Storing attachment failed");
                    ctx.stored_attachments.set(stored)?;
                    discard_stored_attachments(ctx, services).await;
                    return Ok(StepOutcome::Stop(Envelope::exception(&e)));
                }
            }
        }

        tracing::info!(iri = %iri, count = stored.len(), "Stored attachments");
        ctx.document
            .require_mut("storeAttachments")?
            .attachments
            .extend(stored.iter().cloned());
        ctx.stored_attachments.set(stored)?;
        Ok(StepOutcome::Continue)
    }
}
