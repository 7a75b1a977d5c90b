//! Service catalog
//!
//! Maps `(service, operation)` to a URL, an HTTP method and the timeouts and
//! retry budget to use. Loaded from YAML, or built from the defaults for the
//! client XML server and the portal data server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{ConfigError, GatewayError};

pub const XML_SERVER: &str = "xmlServer";
pub const PORTAL_DATA: &str = "portalData";

/// HTTP verb of a remote operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a JSON payload is sent as the request body
    pub fn has_body(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

/// A remote operation on a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDef {
    /// Path appended to the service base URL
    pub path: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Overrides the service read timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
}

/// A remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDef {
    pub base_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Extra attempts after a transport failure. Zero unless configured.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub operations: BTreeMap<String, OperationDef>,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

/// Everything needed to issue one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    pub url: Url,
    pub method: HttpMethod,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_retries: u32,
}

/// Catalog of remote services
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceCatalog {
    pub services: BTreeMap<String, ServiceDef>,
}

impl ServiceCatalog {
    /// Load a catalog from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&content)
    }

    /// Load a catalog from a YAML string
    pub fn load_from_str(yaml: &str) -> Result<Self, ConfigError> {
        let catalog: ServiceCatalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// The two stores the document pipelines talk to, with their standard
    /// operation paths.
    pub fn defaults(xml_server_base: &str, portal_data_base: &str, connect: Duration, read: Duration) -> Self {
        let op = |path: &str, method: HttpMethod| OperationDef {
            path: path.to_string(),
            method,
            read_timeout_ms: None,
        };
        let service = |base: &str, operations: Vec<(&str, OperationDef)>| ServiceDef {
            base_url: base.to_string(),
            connect_timeout_ms: connect.as_millis() as u64,
            read_timeout_ms: read.as_millis() as u64,
            max_retries: 0,
            operations: operations
                .into_iter()
                .map(|(name, def)| (name.to_string(), def))
                .collect(),
        };

        let xml_server = service(
            xml_server_base,
            vec![
                ("docExists", op("/gwc/document/exists", HttpMethod::Post)),
                ("saveXml", op("/gwc/document/save", HttpMethod::Post)),
                ("updateXml", op("/gwc/document/update", HttpMethod::Post)),
                ("getXml", op("/gwc/document/load", HttpMethod::Post)),
                ("getDocuments", op("/gwc/documents", HttpMethod::Post)),
                ("getFilteredDocuments", op("/gwc/documents/filter", HttpMethod::Post)),
                ("deleteDocument", op("/gwc/document/delete", HttpMethod::Post)),
                ("metadata", op("/gwc/metadata", HttpMethod::Get)),
                ("saveMetadata", op("/gwc/metadata/save", HttpMethod::Post)),
                ("refreshTags", op("/gwc/document/tags/refresh", HttpMethod::Post)),
                ("saveCustomMeta", op("/gwc/document/custom/meta/save", HttpMethod::Post)),
            ],
        );
        let portal_data = service(
            portal_data_base,
            vec![
                ("docExists", op("/gw/doc/exists", HttpMethod::Post)),
                ("metadata", op("/gw/keywords", HttpMethod::Get)),
            ],
        );

        let mut services = BTreeMap::new();
        services.insert(XML_SERVER.to_string(), xml_server);
        services.insert(PORTAL_DATA.to_string(), portal_data);
        Self { services }
    }

    /// Check that every base URL parses and every operation path is absolute
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, service) in &self.services {
            Url::parse(&service.base_url).map_err(|e| {
                ConfigError::InvalidCatalog(format!("service '{}' base_url: {}", name, e))
            })?;
            for (op_name, op) in &service.operations {
                if !op.path.starts_with('/') {
                    return Err(ConfigError::InvalidCatalog(format!(
                        "operation '{}.{}' path must start with '/'",
                        name, op_name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDef> {
        self.services.get(name)
    }

    /// `service.operation` names, sorted
    pub fn operation_names(&self) -> Vec<String> {
        self.services
            .iter()
            .flat_map(|(service, def)| def.operations.keys().map(move |op| format!("{}.{}", service, op)))
            .collect()
    }

    /// Resolve a call target
    pub fn resolve(&self, service: &str, operation: &str) -> Result<ResolvedCall, GatewayError> {
        let def = self
            .services
            .get(service)
            .ok_or_else(|| GatewayError::UnknownService(service.to_string()))?;
        let op = def
            .operations
            .get(operation)
            .ok_or_else(|| GatewayError::UnknownOperation {
                service: service.to_string(),
                operation: operation.to_string(),
            })?;

        let raw = format!("{}{}", def.base_url.trim_end_matches('/'), op.path);
        let url = Url::parse(&raw).map_err(|source| GatewayError::InvalidUrl { url: raw, source })?;

        Ok(ResolvedCall {
            url,
            method: op.method,
            connect_timeout: Duration::from_millis(def.connect_timeout_ms),
            read_timeout: Duration::from_millis(op.read_timeout_ms.unwrap_or(def.read_timeout_ms)),
            max_retries: def.max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_YAML: &str = r#"
services:
  xmlServer:
    base_url: http://localhost:8080/exist/restxq
    read_timeout_ms: 10000
    max_retries: 2
    operations:
      saveXml:
        path: /gwc/document/save
      metadata:
        path: /gwc/metadata
        method: GET
        read_timeout_ms: 500
"#;

    #[test]
    fn test_load_and_resolve() {
        let catalog = ServiceCatalog::load_from_str(CATALOG_YAML).unwrap();
        let call = catalog.resolve("xmlServer", "saveXml").unwrap();
        assert_eq!(call.url.as_str(), "http://localhost:8080/exist/restxq/gwc/document/save");
        assert_eq!(call.method, HttpMethod::Post);
        assert_eq!(call.read_timeout, Duration::from_secs(10));
        assert_eq!(call.connect_timeout, Duration::from_millis(5_000));
        assert_eq!(call.max_retries, 2);
    }

    #[test]
    fn test_operation_timeout_override() {
        let catalog = ServiceCatalog::load_from_str(CATALOG_YAML).unwrap();
        let call = catalog.resolve("xmlServer", "metadata").unwrap();
        assert_eq!(call.method, HttpMethod::Get);
        assert_eq!(call.read_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_unknown_targets() {
        let catalog = ServiceCatalog::load_from_str(CATALOG_YAML).unwrap();
        assert!(matches!(
            catalog.resolve("search", "query"),
            Err(GatewayError::UnknownService(_))
        ));
        assert!(matches!(
            catalog.resolve("xmlServer", "getXml"),
            Err(GatewayError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn test_defaults_have_no_retries() {
        let catalog = ServiceCatalog::defaults(
            "http://localhost:8080/exist/restxq",
            "http://localhost:9080/exist/restxq",
            Duration::from_secs(2),
            Duration::from_secs(20),
        );
        catalog.validate().unwrap();
        for service in catalog.services.values() {
            assert_eq!(service.max_retries, 0);
        }
        let call = catalog.resolve(PORTAL_DATA, "docExists").unwrap();
        assert_eq!(call.url.as_str(), "http://localhost:9080/exist/restxq/gw/doc/exists");
        assert_eq!(call.connect_timeout, Duration::from_secs(2));
        assert!(catalog.operation_names().contains(&"xmlServer.saveCustomMeta".to_string()));
    }

    #[test]
    fn test_relative_path_rejected() {
        let yaml = "services:\n  x:\n    base_url: http://h\n    operations:\n      a:\n        path: nope\n";
        assert!(ServiceCatalog::load_from_str(yaml).is_err());
    }
}
