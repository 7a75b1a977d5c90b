//! Request intake, authentication and the response terminal

use async_trait::async_trait;
use serde_json::{json, Value};

use super::super::context::PipelineContext;
use super::super::services::Services;
use super::super::step::{PipelineStep, StepId, StepOutcome};
use super::invalid_values;
use crate::document::{FieldError, FormPackage};
use crate::envelope::{Envelope, ErrorCode};
use crate::error::PipelineError;

fn submitted_data(body: &Value) -> Value {
    body.get("data").cloned().unwrap_or_else(|| body.clone())
}

/// Takes the submitted `data` object as the form
pub struct Receive;

#[async_trait]
impl PipelineStep for Receive {
    fn id(&self) -> StepId {
        StepId::Receive
    }

    async fn run(&self, ctx: &mut PipelineContext, _services: &Services) -> Result<StepOutcome, PipelineError> {
        let form = submitted_data(&ctx.input.body);
        ctx.form.set(form)?;
        Ok(StepOutcome::Continue)
    }
}

/// Multipart intake: the form fields become the form, files stay on the input
pub struct ReceiveUpload;

#[async_trait]
impl PipelineStep for ReceiveUpload {
    fn id(&self) -> StepId {
        StepId::ReceiveUpload
    }

    async fn run(&self, ctx: &mut PipelineContext, _services: &Services) -> Result<StepOutcome, PipelineError> {
        if ctx.input.files.is_empty() {
            return Ok(StepOutcome::Stop(invalid_values(&[FieldError::new(
                "files",
                "at least one file is required",
            )])));
        }
        tracing::debug!(files = ctx.input.files.len(), "Received upload");
        let form = submitted_data(&ctx.input.body);
        ctx.form.set(form)?;
        Ok(StepOutcome::Continue)
    }
}

/// Validates the bearer token and records the caller's identity
pub struct Authenticate;

#[async_trait]
impl PipelineStep for Authenticate {
    fn id(&self) -> StepId {
        StepId::Authenticate
    }

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError> {
        let token = ctx.input.token.clone().unwrap_or_default();
        match services.auth.validate(&token).await {
            Ok(auth) => {
                tracing::debug!(user = %auth.user, "Authenticated");
                ctx.auth.set(auth)?;
                Ok(StepOutcome::Continue)
            }
            Err(e) => {
                tracing::warn!(operation = %ctx.operation, error = %e, "Authentication failed");
                Ok(StepOutcome::Stop(Envelope::failure(ErrorCode::AuthFailed, e.to_string())))
            }
        }
    }
}

/// Responds with the validated identity
pub struct AuthSelfTest;

#[async_trait]
impl PipelineStep for AuthSelfTest {
    fn id(&self) -> StepId {
        StepId::AuthSelfTest
    }

    async fn run(&self, ctx: &mut PipelineContext, _services: &Services) -> Result<StepOutcome, PipelineError> {
        let auth = ctx.auth.require("authSelfTest")?;
        Ok(StepOutcome::Stop(Envelope::success(json!({
            "msg": "Completed !",
            "auth": auth,
        }))))
    }
}

/// Narrows the form to its `pkg` part
pub struct SetFormObject;

#[async_trait]
impl PipelineStep for SetFormObject {
    fn id(&self) -> StepId {
        StepId::SetFormObject
    }

    async fn run(&self, ctx: &mut PipelineContext, _services: &Services) -> Result<StepOutcome, PipelineError> {
        let form = ctx.form.take_required("setFormObject")?;
        let pkg = form.get("pkg").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<FormPackage>(pkg) {
            Ok(pkg) => {
                ctx.package.set(pkg)?;
                Ok(StepOutcome::Continue)
            }
            Err(e) => Ok(StepOutcome::Stop(invalid_values(&[FieldError::new("pkg", e.to_string())]))),
        }
    }
}

/// Terminal step: returns whatever the response slot holds
pub struct Respond;

#[async_trait]
impl PipelineStep for Respond {
    fn id(&self) -> StepId {
        StepId::Respond
    }

    async fn run(&self, ctx: &mut PipelineContext, _services: &Services) -> Result<StepOutcome, PipelineError> {
        match ctx.response.take() {
            Some(response) => Ok(StepOutcome::Stop(response)),
            None => Err(PipelineError::MissingResponse(ctx.operation.clone())),
        }
    }
}
