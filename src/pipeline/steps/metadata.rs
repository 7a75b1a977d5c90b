//! Keyword metadata and document-type custom metadata steps

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::super::context::{MetaObject, MetaXmlPackage, PipelineContext};
use super::super::services::Services;
use super::super::step::{PipelineStep, StepId, StepOutcome};
use super::{invalid_values, missing_field, record_reply, str_at};
use crate::envelope::{Envelope, ErrorCode};
use crate::error::{MetaError, PipelineError};
use crate::gateway::{PORTAL_DATA, XML_SERVER};
use crate::merge::merge;

const DOC_TYPE_POINTER: &str = "/pkg/pkgIdentity/docAknType/value";
const IRI_POINTER: &str = "/pkg/pkgIdentity/docIri/value";

/// Keywords of a store `metadata` reply; a lone keyword is not wrapped
fn keywords(reply: &Value) -> Vec<Value> {
    match reply.get("keyword") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    }
}

/// Client keywords followed by the portal keywords the client lacks
pub struct LoadMetadata;

#[async_trait]
impl PipelineStep for LoadMetadata {
    fn id(&self) -> StepId {
        StepId::LoadMetadata
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let client = match services.gateway.call(XML_SERVER, "metadata", Value::Null).await {
            Ok(reply) => keywords(&reply),
            Err(e) => {
                tracing::error!(error = %e, "Loading client metadata failed");
                return Ok(StepOutcome::Stop(Envelope::exception(&e)));
            }
        };

        let portal = match services.gateway.call(PORTAL_DATA, "metadata", Value::Null).await {
            Ok(reply) => keywords(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "Portal metadata unavailable, using client keywords only");
                Vec::new()
            }
        };

        let metadata = merge(&client, &portal);
        tracing::debug!(client = client.len(), merged = metadata.len(), "Merged metadata");
        ctx.response.set(Envelope::success(json!({ "metadata": metadata })))?;
        Ok(StepOutcome::Continue)
    }
}

/// Adds keywords to the client store
pub struct SaveMetadata;

#[async_trait]
impl PipelineStep for SaveMetadata {
    fn id(&self) -> StepId {
        StepId::SaveMetadata
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let form = ctx.form.require("saveMetadata")?.clone();
        let result = services.gateway.call(XML_SERVER, "saveMetadata", form).await;
        record_reply(ctx, result)?;
        Ok(StepOutcome::Continue)
    }
}

pub struct RefreshTags;

#[async_trait]
impl PipelineStep for RefreshTags {
    fn id(&self) -> StepId {
        StepId::RefreshTags
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let form = ctx.form.require("refreshTags")?;
        let Some(iri) = str_at(form, "/iri").map(str::to_string) else {
            return Ok(StepOutcome::Stop(missing_field("iri")));
        };
        let result = services.gateway.call(XML_SERVER, "refreshTags", json!({ "iri": iri })).await;
        record_reply(ctx, result)?;
        Ok(StepOutcome::Continue)
    }
}

/// UI fields arrive either bare or as `{ value }`
fn field_value(raw: &Value) -> Value {
    match raw {
        Value::Object(map) if map.contains_key("value") => map.get("value").cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn unsupported(doc_type: &str) -> StepOutcome {
    StepOutcome::Stop(Envelope::failure(
        ErrorCode::UnsupportedDocType,
        format!("No custom metadata for document type '{}'", doc_type),
    ))
}

/// Builds and validates the custom metadata object for the document's type.
///
/// Only the fields named in `selected` are taken from `customMeta`. An
/// invalid object stops the operation before anything is rendered or saved.
pub struct ConvertFormToMetaObject;

#[async_trait]
impl PipelineStep for ConvertFormToMetaObject {
    fn id(&self) -> StepId {
        StepId::ConvertFormToMetaObject
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let form = ctx.form.require("convertFormToMetaObject")?;
        let Some(iri) = str_at(form, IRI_POINTER).map(str::to_string) else {
            return Ok(StepOutcome::Stop(missing_field("docIri")));
        };
        let Some(doc_type) = str_at(form, DOC_TYPE_POINTER).map(str::to_string) else {
            return Ok(StepOutcome::Stop(missing_field("docAknType")));
        };
        let handler = match services.meta.resolve(&doc_type) {
            Ok(handler) => handler,
            Err(MetaError::UnsupportedDocType(t)) => return Ok(unsupported(&t)),
            Err(e) => return Ok(StepOutcome::Stop(Envelope::exception(&e))),
        };

        let selected: Vec<String> = form
            .get("selected")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let custom_meta = form.pointer("/pkg/customMeta").and_then(Value::as_object);
        let chosen: Map<String, Value> = selected
            .iter()
            .filter_map(|name| {
                custom_meta
                    .and_then(|meta| meta.get(name))
                    .map(|raw| (name.clone(), field_value(raw)))
            })
            .collect();

        let object = handler.to_template_object(&chosen);
        if let Err(errors) = handler.validate(&object, &selected) {
            tracing::info!(iri = %iri, errors = errors.len(), "Custom metadata failed validation");
            return Ok(StepOutcome::Stop(invalid_values(&errors)));
        }

        ctx.meta_object.set(MetaObject { iri, doc_type, object })?;
        Ok(StepOutcome::Continue)
    }
}

/// Renders the validated object with the type's template
pub struct RenderMetaObject;

#[async_trait]
impl PipelineStep for RenderMetaObject {
    fn id(&self) -> StepId {
        StepId::RenderMetaObject
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let meta = ctx.meta_object.take_required("renderMetaObject")?;
        let rendered = services
            .meta
            .resolve(&meta.doc_type)
            .and_then(|handler| handler.to_xml(&meta.object, services.renderer.as_ref()));
        match rendered {
            Ok(data) => {
                ctx.meta_xml.set(MetaXmlPackage { iri: meta.iri, data })?;
                Ok(StepOutcome::Continue)
            }
            Err(MetaError::UnsupportedDocType(t)) => Ok(unsupported(&t)),
            Err(e) => {
                tracing::error!(iri = %meta.iri, error = %e, "Rendering custom metadata failed");
                Ok(StepOutcome::Stop(Envelope::exception(&e)))
            }
        }
    }
}

pub struct SaveCustomMeta;

#[async_trait]
impl PipelineStep for SaveCustomMeta {
    fn id(&self) -> StepId {
        StepId::SaveCustomMeta
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let package = ctx.meta_xml.take_required("saveCustomMeta")?;
        let payload = serde_json::to_value(&package).unwrap_or(Value::Null);
        let result = services.gateway.call(XML_SERVER, "saveCustomMeta", payload).await;
        record_reply(ctx, result)?;
        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_accepts_single_and_list() {
        assert_eq!(keywords(&json!({"keyword": ["a", "b"]})), vec![json!("a"), json!("b")]);
        assert_eq!(keywords(&json!({"keyword": "a"})), vec![json!("a")]);
        assert!(keywords(&json!({})).is_empty());
    }

    #[test]
    fn test_field_value_unwraps_form_fields() {
        assert_eq!(field_value(&json!({"value": "x", "error": ""})), json!("x"));
        assert_eq!(field_value(&json!("x")), json!("x"));
    }
}
