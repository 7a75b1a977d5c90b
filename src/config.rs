//! Application configuration
//!
//! Read from the environment (with `.env` support) at startup. Everything
//! has a default so a bare checkout runs against local stores.

use std::path::PathBuf;
use std::time::Duration;

use docflow_workflow::{WorkflowCatalog, WorkflowEngine, WorkflowLoader};

use crate::error::ConfigError;
use crate::gateway::ServiceCatalog;
use crate::notify::STATUS_ROUTING_KEY;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the client XML store
    pub xml_server_base: String,
    /// Base URL of the portal data store
    pub portal_data_base: String,
    /// Service catalog YAML; the built-in catalog is used when unset
    pub services_path: Option<PathBuf>,
    pub workflows_dir: PathBuf,
    pub attachments_dir: PathBuf,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub status_routing_key: String,
    /// Client whose token roles drive listings and workflow permissions
    pub client_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            xml_server_base: "http://localhost:8080/exist/restxq".to_string(),
            portal_data_base: "http://localhost:9080/exist/restxq".to_string(),
            services_path: None,
            workflows_dir: PathBuf::from("config/workflows"),
            attachments_dir: PathBuf::from("akn_attachments"),
            connect_timeout: Duration::from_millis(5_000),
            read_timeout: Duration::from_millis(30_000),
            status_routing_key: STATUS_ROUTING_KEY.to_string(),
            client_id: "gawati-client".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from process environment, after applying any `.env` file
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let protocol = var("API_PROTOCOL").unwrap_or_else(|| "http".to_string());
        let host = var("API_HOST").unwrap_or_else(|| "localhost".to_string());
        let port = var("API_PORT").unwrap_or_else(|| "8080".to_string());
        port.parse::<u16>().map_err(|e| ConfigError::InvalidVar {
            var: "API_PORT".to_string(),
            message: e.to_string(),
        })?;

        let millis = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            match var(key) {
                None => Ok(default),
                Some(raw) => raw.parse::<u64>().map(Duration::from_millis).map_err(|e| ConfigError::InvalidVar {
                    var: key.to_string(),
                    message: e.to_string(),
                }),
            }
        };

        Ok(Self {
            xml_server_base: format!("{}://{}:{}/exist/restxq", protocol, host, port),
            portal_data_base: var("PORTAL_DATA_BASE").unwrap_or(defaults.portal_data_base),
            services_path: var("DOCFLOW_SERVICES").map(PathBuf::from),
            workflows_dir: var("DOCFLOW_WORKFLOWS").map(PathBuf::from).unwrap_or(defaults.workflows_dir),
            attachments_dir: var("DOCFLOW_ATTACHMENTS")
                .map(PathBuf::from)
                .unwrap_or(defaults.attachments_dir),
            connect_timeout: millis("DOCFLOW_CONNECT_TIMEOUT_MS", defaults.connect_timeout)?,
            read_timeout: millis("DOCFLOW_READ_TIMEOUT_MS", defaults.read_timeout)?,
            status_routing_key: var("DOCFLOW_STATUS_ROUTING_KEY").unwrap_or(defaults.status_routing_key),
            client_id: var("DOCFLOW_CLIENT_ID").unwrap_or(defaults.client_id),
        })
    }

    /// Service catalog from `services_path`, or the built-in defaults
    pub fn service_catalog(&self) -> Result<ServiceCatalog, ConfigError> {
        match &self.services_path {
            Some(path) => {
                tracing::info!("Loading service catalog from {}", path.display());
                ServiceCatalog::load_from_file(path)
            }
            None => Ok(ServiceCatalog::defaults(
                &self.xml_server_base,
                &self.portal_data_base,
                self.connect_timeout,
                self.read_timeout,
            )),
        }
    }

    /// Load every workflow definition and build the engine
    pub fn workflow_engine(&self) -> Result<WorkflowEngine, ConfigError> {
        let definitions = WorkflowLoader::load_from_dir(&self.workflows_dir)?;
        tracing::info!(
            "Loaded {} workflow definition(s) from {}",
            definitions.len(),
            self.workflows_dir.display()
        );
        Ok(WorkflowEngine::new(WorkflowCatalog::new(definitions)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_api_base_from_parts() {
        let config = AppConfig::from_lookup(lookup(&[
            ("API_PROTOCOL", "https"),
            ("API_HOST", "store.example.org"),
            ("API_PORT", "8443"),
            ("DOCFLOW_READ_TIMEOUT_MS", "1500"),
            ("DOCFLOW_CLIENT_ID", "editor-ui"),
        ]))
        .unwrap();
        assert_eq!(config.xml_server_base, "https://store.example.org:8443/exist/restxq");
        assert_eq!(config.read_timeout, Duration::from_millis(1500));
        assert_eq!(config.client_id, "editor-ui");
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("API_PORT", "eighty")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("DOCFLOW_CONNECT_TIMEOUT_MS", "-1")])).is_err());
    }

    #[test]
    fn test_default_service_catalog() {
        let catalog = AppConfig::default().service_catalog().unwrap();
        let call = catalog.resolve("xmlServer", "getXml").unwrap();
        assert_eq!(call.url.as_str(), "http://localhost:8080/exist/restxq/gwc/document/load");
    }

    #[test]
    fn test_bundled_workflows_load() {
        let config = AppConfig {
            workflows_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/workflows"),
            ..AppConfig::default()
        };
        let engine = config.workflow_engine().unwrap();
        assert_eq!(engine.catalog().doc_types(), vec!["act", "doc", "judgment"]);
    }
}
