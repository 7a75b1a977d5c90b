//! Listing steps

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::super::context::PipelineContext;
use super::super::services::Services;
use super::super::step::{PipelineStep, StepId, StepOutcome};
use super::documents::derive_workflow;
use crate::document::StoredPackage;
use crate::envelope::{Envelope, ErrorCode};
use crate::error::{GatewayError, PipelineError};
use crate::gateway::XML_SERVER;
use crate::listing::{Listing, ListingSorter, SortOrder, SortSpec};

/// The listing request with the caller's client roles added
fn listing_request(ctx: &PipelineContext, step: &'static str, services: &Services) -> Result<Value, PipelineError> {
    let auth = ctx.auth.require(step)?;
    let form = ctx.form.require(step)?;
    let mut request = match form {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    request.insert("roles".into(), serde_json::json!(auth.roles_for_client(&services.client_id)));
    Ok(Value::Object(request))
}

fn store_listing(ctx: &mut PipelineContext, result: Result<Value, GatewayError>) -> Result<(), PipelineError> {
    match result {
        Ok(reply) => ctx.listing_reply.set(reply),
        Err(e) => ctx.response.set(Envelope::exception(&e)),
    }
}

/// Fetches the documents visible to the caller's roles. An empty set comes
/// back from the store as an error reply, which is returned as-is.
pub struct LoadListing;

#[async_trait]
impl PipelineStep for LoadListing {
    fn id(&self) -> StepId {
        StepId::LoadListing
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let request = listing_request(ctx, "loadListing", services)?;
        let result = services.gateway.call(XML_SERVER, "getDocuments", request).await;
        if let Ok(reply) = &result {
            if reply.get("error").is_some() {
                return Ok(StepOutcome::Stop(Envelope::from_store_reply(reply.clone())));
            }
        }
        store_listing(ctx, result)?;
        Ok(StepOutcome::Continue)
    }
}

/// Like [`LoadListing`] against the filtered query; a store error reply is
/// reported as `EXCEPTION`.
pub struct LoadFilteredListing;

#[async_trait]
impl PipelineStep for LoadFilteredListing {
    fn id(&self) -> StepId {
        StepId::LoadFilteredListing
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let request = listing_request(ctx, "loadFilteredListing", services)?;
        let result = services.gateway.call(XML_SERVER, "getFilteredDocuments", request).await;
        if let Ok(reply) = &result {
            if let Some(error) = reply.get("error") {
                return Ok(StepOutcome::Stop(Envelope::failure(ErrorCode::Exception, error.clone())));
            }
        }
        store_listing(ctx, result)?;
        Ok(StepOutcome::Continue)
    }
}

/// Numbers arrive as strings from the XML store
fn as_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Builds the listing page from the store reply
pub struct ConvertToListing;

#[async_trait]
impl PipelineStep for ConvertToListing {
    fn id(&self) -> StepId {
        StepId::ConvertToListing
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        if ctx.has_error_response() {
            return Ok(StepOutcome::Continue);
        }
        let reply = ctx.listing_reply.take_required("convertToListing")?;

        // a single package is not wrapped in an array
        let packages = match reply.get("package") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single.clone()],
        };

        let mut documents = Vec::with_capacity(packages.len());
        for package in packages {
            match serde_json::from_value::<StoredPackage>(package) {
                Ok(stored) => {
                    let mut doc = stored.into_document();
                    doc.workflow = derive_workflow(&doc, ctx.auth.get(), services);
                    documents.push(doc);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Unreadable document in listing");
                    ctx.response.set(Envelope::exception(&e))?;
                    return Ok(StepOutcome::Continue);
                }
            }
        }

        let listing = Listing {
            timestamp: reply
                .get("timestamp")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            start: as_count(reply.get("itemsFrom")),
            total: as_count(reply.get("records")),
            documents,
        };
        tracing::debug!(count = listing.documents.len(), total = listing.total, "Converted listing");

        ctx.response
            .set(Envelope::success(serde_json::to_value(&listing).unwrap_or(Value::Null)))?;
        ctx.listing.set(listing)?;
        Ok(StepOutcome::Continue)
    }
}

/// Orders the listing by the request's `sortOrder`
pub struct SortListing;

#[async_trait]
impl PipelineStep for SortListing {
    fn id(&self) -> StepId {
        StepId::SortListing
    }

    async fn run(&self, ctx: &mut PipelineContext, _services: &Services) -> Result<StepOutcome, PipelineError> {
        if ctx.has_error_response() {
            return Ok(StepOutcome::Continue);
        }
        let order: SortOrder = ctx
            .form
            .get()
            .and_then(|form| form.get("sortOrder"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let spec = SortSpec::from_order(&order);

        let listing = ctx.listing.require_mut("sortListing")?;
        ListingSorter::sort(&mut listing.documents, &spec);
        let value = serde_json::to_value(&*listing).unwrap_or(Value::Null);
        ctx.response.set(Envelope::success(value))?;
        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_count() {
        assert_eq!(as_count(Some(&json!("12"))), 12);
        assert_eq!(as_count(Some(&json!(3))), 3);
        assert_eq!(as_count(Some(&json!("n/a"))), 0);
        assert_eq!(as_count(None), 0);
    }
}
