//! HTTP gateway
//!
//! JSON-over-HTTP client for the document stores. One `reqwest::Client` per
//! service so each service keeps its own connect timeout; read timeouts are
//! applied per request.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::catalog::{HttpMethod, ResolvedCall, ServiceCatalog};
use super::ServiceGateway;
use crate::error::{ConfigError, GatewayError};

const RETRY_DELAY_MS: u64 = 250;

/// Gateway that reaches the stores over HTTP
pub struct HttpGateway {
    catalog: Arc<ServiceCatalog>,
    clients: HashMap<String, Client>,
}

impl HttpGateway {
    /// Build clients for every service in the catalog
    pub fn new(catalog: ServiceCatalog) -> Result<Self, ConfigError> {
        catalog.validate()?;
        let mut clients = HashMap::new();
        for (name, service) in &catalog.services {
            let client = Client::builder()
                .connect_timeout(Duration::from_millis(service.connect_timeout_ms))
                .build()?;
            clients.insert(name.clone(), client);
        }
        Ok(Self {
            catalog: Arc::new(catalog),
            clients,
        })
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    async fn send_once(
        &self,
        client: &Client,
        target: &ResolvedCall,
        service: &str,
        operation: &str,
        payload: &Value,
    ) -> Result<Value, GatewayError> {
        let mut request = client
            .request(to_reqwest(target.method), target.url.clone())
            .timeout(target.read_timeout)
            .header("Accept", "application/json");
        if target.method.has_body() {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|source| GatewayError::Transport {
            service: service.to_string(),
            operation: operation.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                service: service.to_string(),
                operation: operation.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| GatewayError::Decode {
            service: service.to_string(),
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ServiceGateway for HttpGateway {
    async fn call(&self, service: &str, operation: &str, payload: Value) -> Result<Value, GatewayError> {
        let target = self.catalog.resolve(service, operation)?;
        let client = self
            .clients
            .get(service)
            .ok_or_else(|| GatewayError::UnknownService(service.to_string()))?;

        tracing::debug!(
            service,
            operation,
            method = target.method.as_str(),
            url = %target.url,
            "Calling store"
        );

        let mut attempt = 0;
        loop {
            match self.send_once(client, &target, service, operation, &payload).await {
                Err(GatewayError::Transport { source, .. }) if attempt < target.max_retries && is_retryable(&source) => {
                    attempt += 1;
                    tracing::warn!(
                        service,
                        operation,
                        attempt,
                        max_retries = target.max_retries,
                        error = %source,
                        "Transport failure, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
                }
                Err(e) => {
                    tracing::error!(service, operation, error = %e, "Store call failed");
                    return Err(e);
                }
                Ok(reply) => return Ok(reply),
            }
        }
    }
}

fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog_for(base: &str, retries: u32) -> ServiceCatalog {
        let yaml = format!(
            "services:\n  xmlServer:\n    base_url: {base}\n    connect_timeout_ms: 200\n    read_timeout_ms: 200\n    max_retries: {retries}\n    operations:\n      getXml:\n        path: /gwc/document/load\n"
        );
        ServiceCatalog::load_from_str(&yaml).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_operation_fails_before_sending() {
        let gateway = HttpGateway::new(catalog_for("http://127.0.0.1:9", 0)).unwrap();
        let err = gateway.call("xmlServer", "saveXml", json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownOperation { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_transport_error() {
        // port 9 (discard) is not listening on test hosts
        let gateway = HttpGateway::new(catalog_for("http://127.0.0.1:9", 1)).unwrap();
        let err = gateway
            .call("xmlServer", "getXml", json!({"iri": "/akn/ke/act"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport { .. }));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest(HttpMethod::Get), Method::GET);
        assert_eq!(to_reqwest(HttpMethod::Post), Method::POST);
    }
}
