//! Runs a registered operation's steps over a fresh context

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use super::context::{OperationInput, PipelineContext};
use super::registry::PipelineRegistry;
use super::services::Services;
use super::step::StepOutcome;
use crate::envelope::Envelope;
use crate::error::PipelineError;

/// Executes operations against shared, read-only registries and services.
///
/// Cloning is cheap and every call owns its own [`PipelineContext`], so one
/// executor serves any number of concurrent requests.
#[derive(Clone, Debug)]
pub struct PipelineExecutor {
    registry: Arc<PipelineRegistry>,
    services: Arc<Services>,
}

impl PipelineExecutor {
    /// Fails if the registry does not pass its startup validation
    pub fn new(registry: Arc<PipelineRegistry>, services: Arc<Services>) -> Result<Self, PipelineError> {
        registry.validate()?;
        Ok(Self { registry, services })
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub async fn execute(&self, operation: &str, input: OperationInput) -> Result<Envelope, PipelineError> {
        let (_keep_open, cancel) = watch::channel(false);
        self.execute_cancellable(operation, input, cancel).await
    }

    /// Execute until done or until `cancel` turns `true`.
    ///
    /// On cancellation no further step is scheduled and the in-flight step
    /// future is dropped.
    pub async fn execute_cancellable(
        &self,
        operation: &str,
        input: OperationInput,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Envelope, PipelineError> {
        let steps = self.registry.steps(operation)?;
        let started = Instant::now();
        let mut ctx = PipelineContext::new(operation, input);
        tracing::info!(operation, steps = steps.len(), "Executing operation");

        for step in steps {
            let id = step.id();
            if *cancel.borrow() {
                return Err(cancelled(operation, id.as_str()));
            }
            tracing::debug!(operation, step = %id, "Running step");

            let outcome = tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel) => {
                    tracing::info!(operation, step = %id, "Operation cancelled");
                    return Err(cancelled(operation, id.as_str()));
                }
                outcome = step.run(&mut ctx, &self.services) => outcome?,
            };

            if let StepOutcome::Stop(response) = outcome {
                tracing::info!(
                    operation,
                    step = %id,
                    error = response.error_code().unwrap_or("-"),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Operation finished"
                );
                return Ok(response);
            }
        }

        let response = ctx
            .response
            .take()
            .ok_or_else(|| PipelineError::MissingResponse(operation.to_string()))?;
        tracing::info!(
            operation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Operation finished without a terminal step"
        );
        Ok(response)
    }
}

fn cancelled(operation: &str, step: &str) -> PipelineError {
    PipelineError::Cancelled {
        operation: operation.to_string(),
        step: step.to_string(),
    }
}

/// Resolves once the flag is set; never resolves if the sender goes away
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{HttpMethod, InMemoryGateway, ServiceGateway};
    use crate::pipeline::step::StepId;
    use async_trait::async_trait;
    use docflow_workflow::{WorkflowCatalog, WorkflowEngine};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn services(gateway: Arc<dyn ServiceGateway>) -> Arc<Services> {
        let engine = WorkflowEngine::new(WorkflowCatalog::new(Vec::new()).unwrap());
        Arc::new(Services::builder(gateway, engine).build().unwrap())
    }

    fn executor(registry: PipelineRegistry, gateway: Arc<dyn ServiceGateway>) -> PipelineExecutor {
        PipelineExecutor::new(Arc::new(registry), services(gateway)).unwrap()
    }

    /// Gateway whose calls never complete
    struct StalledGateway;

    #[async_trait]
    impl ServiceGateway for StalledGateway {
        async fn call(&self, _service: &str, _operation: &str, _payload: Value) -> Result<Value, crate::error::GatewayError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let exec = executor(PipelineRegistry::new(), Arc::new(InMemoryGateway::new()));
        let result = exec.execute("/nope", OperationInput::default()).await;
        assert!(matches!(result, Err(PipelineError::OperationNotFound(name)) if name == "/nope"));
    }

    #[tokio::test]
    async fn test_stop_returns_response() {
        let gateway = Arc::new(InMemoryGateway::new());
        let mut registry = PipelineRegistry::new();
        registry
            .register(
                "/document/load",
                HttpMethod::Post,
                &[StepId::Receive, StepId::LoadXmlForIri, StepId::ConvertToDocument, StepId::Respond],
            )
            .unwrap();
        let exec = executor(registry, gateway.clone());

        let response = exec
            .execute("/document/load", OperationInput::json(json!({"data": {"iri": "/akn/ke/act/x"}})))
            .await
            .unwrap();
        assert_eq!(response.error_code(), Some("doc_not_found"));
        assert_eq!(gateway.calls(), vec!["xmlServer.getXml".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_prerequisite_is_an_error() {
        let mut registry = PipelineRegistry::new();
        registry
            .register("/broken", HttpMethod::Post, &[StepId::RenderDocument, StepId::Respond])
            .unwrap();
        let exec = executor(registry, Arc::new(InMemoryGateway::new()));

        let result = exec.execute("/broken", OperationInput::default()).await;
        assert!(matches!(
            result,
            Err(PipelineError::MissingInput { step: "renderDocument", slot: "document" })
        ));
    }

    #[tokio::test]
    async fn test_cancel_drops_in_flight_step() {
        let mut registry = PipelineRegistry::new();
        registry
            .register("/documents/metadata", HttpMethod::Get, &[StepId::LoadMetadata, StepId::Respond])
            .unwrap();
        let exec = executor(registry, Arc::new(StalledGateway));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            exec.execute_cancellable("/documents/metadata", OperationInput::default(), rx)
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("executor did not stop")
            .unwrap();
        assert!(matches!(
            result,
            Err(PipelineError::Cancelled { step, .. }) if step == "loadMetadata"
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let exec = executor(PipelineRegistry::standard().unwrap(), Arc::new(InMemoryGateway::new()));
        let (_tx, rx) = watch::channel(true);
        let result = exec
            .execute_cancellable("/documents/metadata", OperationInput::default(), rx)
            .await;
        assert!(matches!(result, Err(PipelineError::Cancelled { step, .. }) if step == "loadMetadata"));
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_independent() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.seed_client_keywords(&["tax"]);
        let exec = executor(PipelineRegistry::standard().unwrap(), gateway);

        let runs: Vec<_> = (0..8)
            .map(|_| {
                let exec = exec.clone();
                tokio::spawn(async move { exec.execute("/documents/metadata", OperationInput::default()).await })
            })
            .collect();
        for run in runs {
            let response = run.await.unwrap().unwrap();
            assert_eq!(response.into_value(), json!({"metadata": ["tax"]}));
        }
    }
}
