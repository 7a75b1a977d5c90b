//! Collaborators shared by all executions

use std::sync::Arc;

use docflow_workflow::WorkflowEngine;

use crate::attachments::{AttachmentStore, FsAttachmentStore};
use crate::auth::{StaticTokenValidator, TokenValidator};
use crate::config::AppConfig;
use crate::error::RenderError;
use crate::gateway::ServiceGateway;
use crate::meta::MetaRegistry;
use crate::notify::{NoopNotifier, StatusNotifier};
use crate::render::{HandlebarsRenderer, XmlRenderer};

/// Read-only services handed to every step
#[derive(Clone)]
pub struct Services {
    pub gateway: Arc<dyn ServiceGateway>,
    pub workflow: WorkflowEngine,
    pub meta: MetaRegistry,
    pub renderer: Arc<dyn XmlRenderer>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub notifier: Arc<dyn StatusNotifier>,
    pub auth: Arc<dyn TokenValidator>,
    /// Client whose roles are read from tokens
    pub client_id: String,
}

impl Services {
    pub fn builder(gateway: Arc<dyn ServiceGateway>, workflow: WorkflowEngine) -> ServicesBuilder {
        ServicesBuilder {
            gateway,
            workflow,
            meta: None,
            renderer: None,
            attachments: None,
            notifier: None,
            auth: None,
            client_id: AppConfig::default().client_id,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("workflow", &self.workflow)
            .field("meta", &self.meta)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Services`]; unset collaborators get local defaults
pub struct ServicesBuilder {
    gateway: Arc<dyn ServiceGateway>,
    workflow: WorkflowEngine,
    meta: Option<MetaRegistry>,
    renderer: Option<Arc<dyn XmlRenderer>>,
    attachments: Option<Arc<dyn AttachmentStore>>,
    notifier: Option<Arc<dyn StatusNotifier>>,
    auth: Option<Arc<dyn TokenValidator>>,
    client_id: String,
}

impl ServicesBuilder {
    pub fn meta(mut self, meta: MetaRegistry) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn XmlRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn attachments(mut self, attachments: Arc<dyn AttachmentStore>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn StatusNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn auth(mut self, auth: Arc<dyn TokenValidator>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Apply the attachment root and client id from config
    pub fn with_config(self, config: &AppConfig) -> Self {
        let attachments: Arc<dyn AttachmentStore> = Arc::new(FsAttachmentStore::new(&config.attachments_dir));
        self.attachments(attachments).client_id(config.client_id.clone())
    }

    pub fn build(self) -> Result<Services, RenderError> {
        let renderer = match self.renderer {
            Some(renderer) => renderer,
            None => Arc::new(HandlebarsRenderer::new()?),
        };
        Ok(Services {
            gateway: self.gateway,
            workflow: self.workflow,
            meta: self.meta.unwrap_or_else(MetaRegistry::standard),
            renderer,
            attachments: self
                .attachments
                .unwrap_or_else(|| Arc::new(FsAttachmentStore::new(AppConfig::default().attachments_dir))),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
            auth: self.auth.unwrap_or_else(|| Arc::new(StaticTokenValidator::new())),
            client_id: self.client_id,
        })
    }
}
