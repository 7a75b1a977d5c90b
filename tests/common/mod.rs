//! Shared harness for pipeline integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::broadcast;

use docflow::attachments::FsAttachmentStore;
use docflow::auth::{AuthContext, StaticTokenValidator};
use docflow::notify::{ChannelNotifier, StatusMessage};
use docflow::{Envelope, InMemoryGateway, OperationInput, PipelineExecutor, PipelineRegistry, Services};
use docflow_workflow::{WorkflowCatalog, WorkflowEngine, WorkflowLoader};

pub const CLIENT: &str = "gawati-client";
pub const EDITOR_TOKEN: &str = "editor-token";
pub const ADMIN_TOKEN: &str = "admin-token";

pub struct Harness {
    pub gateway: Arc<InMemoryGateway>,
    pub executor: PipelineExecutor,
    pub attachments: TempDir,
    pub published: broadcast::Receiver<StatusMessage>,
}

fn identity(user: &str, roles: &[&str]) -> AuthContext {
    let mut client_roles = BTreeMap::new();
    client_roles.insert(CLIENT.to_string(), roles.iter().map(|r| r.to_string()).collect());
    AuthContext {
        user: user.to_string(),
        realm_roles: Vec::new(),
        client_roles,
    }
}

pub fn harness() -> Harness {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/workflows");
    let definitions = WorkflowLoader::load_from_dir(&dir).expect("bundled workflows load");
    let engine = WorkflowEngine::new(WorkflowCatalog::new(definitions).expect("workflows do not overlap"));

    let gateway = Arc::new(InMemoryGateway::new());
    let attachments = tempfile::tempdir().expect("tempdir");
    let notifier = ChannelNotifier::new(16, "statusQ");
    let published = notifier.subscribe();
    let tokens = StaticTokenValidator::new()
        .with_token(EDITOR_TOKEN, identity("editor", &["client.Editor"]))
        .with_token(ADMIN_TOKEN, identity("admin", &["client.Admin"]));

    let services = Services::builder(gateway.clone(), engine)
        .attachments(Arc::new(FsAttachmentStore::new(attachments.path())))
        .notifier(Arc::new(notifier))
        .auth(Arc::new(tokens))
        .client_id(CLIENT)
        .build()
        .expect("templates compile");
    let registry = PipelineRegistry::standard().expect("operation table is valid");
    let executor = PipelineExecutor::new(Arc::new(registry), Arc::new(services)).expect("registry validates");

    Harness {
        gateway,
        executor,
        attachments,
        published,
    }
}

impl Harness {
    pub async fn run(&self, operation: &str, input: OperationInput) -> Envelope {
        self.executor
            .execute(operation, input)
            .await
            .unwrap_or_else(|e| panic!("{} failed: {}", operation, e))
    }

    pub async fn post(&self, operation: &str, data: Value) -> Value {
        self.run(operation, OperationInput::json(json!({ "data": data })))
            .await
            .into_value()
    }

    pub async fn add(&self, iri: &str, title: &str) -> Value {
        self.post("/document/add", add_form(iri, title)).await
    }
}

/// IRI of a Kenyan act with the given number
pub fn act_iri(number: &str) -> String {
    format!("/akn/ke/act/legge/1970-06-03/{}/eng@/!main", number)
}

/// The `data` object the editing UI posts to `/document/add`
pub fn add_form(iri: &str, title: &str) -> Value {
    json!({
        "pkg": {
            "pkgIdentity": {
                "docLang": {"value": {"value": "eng", "label": "English"}},
                "docType": {"value": "legge"},
                "docAknType": {"value": "act"},
                "docCountry": {"value": "ke"},
                "docTitle": {"value": title},
                "docOfficialDate": {"value": "1970-06-03"},
                "docPublicationDate": {"value": "1970-07-01T00:00:00Z"},
                "docNumber": {"value": "Cap_44"},
                "docPart": {"value": "main"},
                "docIri": {"value": iri},
                "docTags": {"value": ["tax", "finance"]}
            },
            "pkgAttachments": [],
            "customMeta": {}
        }
    })
}

pub fn error_code(response: &Value) -> Option<&str> {
    response.pointer("/error/code").and_then(Value::as_str)
}
