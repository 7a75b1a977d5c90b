//! In-memory document stores
//!
//! Implements the `xmlServer` and `portalData` operations the pipelines use,
//! replying in the same JSON shapes as the real stores. Used by the
//! integration tests and by `docflow run --memory`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use super::catalog::{PORTAL_DATA, XML_SERVER};
use super::ServiceGateway;
use crate::error::GatewayError;

#[derive(Debug, Clone)]
struct StoredRecord {
    document: Value,
    xml: String,
    file_name: String,
    status: String,
    custom_meta_xml: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, StoredRecord>,
    portal_iris: BTreeSet<String>,
    client_keywords: Option<Vec<String>>,
    portal_keywords: Option<Vec<String>>,
    saved_metadata: Vec<Value>,
    calls: Vec<String>,
    unavailable: HashSet<String>,
    canned: BTreeMap<String, Value>,
}

/// Gateway backed by in-process maps
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<MemoryState>,
}

fn success(code: &str, message: impl Into<String>) -> Value {
    json!({"success": {"code": code, "message": message.into()}})
}

fn failure(code: &str, message: impl Into<String>) -> Value {
    json!({"error": {"code": code, "message": message.into()}})
}

fn str_field<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or_default()
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        // a poisoned lock only means a test panicked mid-call; the maps are still usable
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Mark an IRI as already published on the portal
    pub fn seed_portal_document(&self, iri: &str) {
        self.with_state(|s| {
            s.portal_iris.insert(iri.to_string());
        });
    }

    /// Store a document record directly, bypassing `saveXml`
    pub fn seed_document(&self, iri: &str, document: Value, status: &str) {
        self.with_state(|s| {
            s.records.insert(
                iri.to_string(),
                StoredRecord {
                    document,
                    xml: String::new(),
                    file_name: String::new(),
                    status: status.to_string(),
                    custom_meta_xml: None,
                },
            );
        });
    }

    pub fn seed_client_keywords(&self, keywords: &[&str]) {
        self.with_state(|s| s.client_keywords = Some(keywords.iter().map(|k| k.to_string()).collect()));
    }

    pub fn seed_portal_keywords(&self, keywords: &[&str]) {
        self.with_state(|s| s.portal_keywords = Some(keywords.iter().map(|k| k.to_string()).collect()));
    }

    /// Make every call to `service.operation` fail as if the store were down
    pub fn make_unavailable(&self, service: &str, operation: &str) {
        self.with_state(|s| {
            s.unavailable.insert(format!("{}.{}", service, operation));
        });
    }

    /// Answer every call to `service.operation` with `reply` verbatim
    pub fn reply_with(&self, service: &str, operation: &str, reply: Value) {
        self.with_state(|s| {
            s.canned.insert(format!("{}.{}", service, operation), reply);
        });
    }

    /// `service.operation` of every call received, in order
    pub fn calls(&self) -> Vec<String> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn was_called(&self, service: &str, operation: &str) -> bool {
        let key = format!("{}.{}", service, operation);
        self.with_state(|s| s.calls.iter().any(|c| *c == key))
    }

    pub fn contains(&self, iri: &str) -> bool {
        self.with_state(|s| s.records.contains_key(iri))
    }

    pub fn stored_xml(&self, iri: &str) -> Option<String> {
        self.with_state(|s| s.records.get(iri).map(|r| r.xml.clone()))
    }

    pub fn stored_file_name(&self, iri: &str) -> Option<String> {
        self.with_state(|s| s.records.get(iri).map(|r| r.file_name.clone()))
    }

    pub fn stored_custom_meta(&self, iri: &str) -> Option<String> {
        self.with_state(|s| s.records.get(iri).and_then(|r| r.custom_meta_xml.clone()))
    }

    pub fn saved_metadata(&self) -> Vec<Value> {
        self.with_state(|s| s.saved_metadata.clone())
    }

    fn dispatch(state: &mut MemoryState, service: &str, operation: &str, payload: &Value) -> Option<Value> {
        let reply = match (service, operation) {
            (XML_SERVER, "docExists") => {
                let iri = str_field(payload, "iri");
                if state.records.contains_key(iri) {
                    success("doc_exists", format!("{} exists", iri))
                } else {
                    failure("doc_not_found", format!("{} not found", iri))
                }
            }
            (PORTAL_DATA, "docExists") => {
                let iri = str_field(payload, "iri");
                if state.portal_iris.contains(iri) {
                    success("doc_exists", format!("{} exists", iri))
                } else {
                    failure("doc_not_found", format!("{} not found", iri))
                }
            }
            (XML_SERVER, "saveXml") => {
                let iri = str_field(payload, "iri").to_string();
                let document = payload.get("document").cloned().unwrap_or(Value::Null);
                let status = document
                    .pointer("/workflow/state")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let update = payload.get("update").and_then(Value::as_bool).unwrap_or(false);
                if state.records.contains_key(&iri) && !update {
                    failure("doc_exists", format!("{} exists", iri))
                } else {
                    let custom_meta_xml = state.records.get(&iri).and_then(|r| r.custom_meta_xml.clone());
                    state.records.insert(
                        iri.clone(),
                        StoredRecord {
                            document,
                            xml: str_field(payload, "data").to_string(),
                            file_name: str_field(payload, "fileXml").to_string(),
                            status,
                            custom_meta_xml,
                        },
                    );
                    success("save_xml", format!("{} saved", iri))
                }
            }
            (XML_SERVER, "updateXml") => {
                let iri = str_field(payload, "iri");
                match state.records.get_mut(iri) {
                    None => failure("doc_not_found", format!("{} not found", iri)),
                    Some(record) => {
                        let fields = payload.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
                        for field in fields {
                            if str_field(&field, "name") == "docTitle" {
                                if let Some(doc) = record.document.as_object_mut() {
                                    doc.insert("title".into(), field.get("value").cloned().unwrap_or(Value::Null));
                                }
                            }
                        }
                        success("update_xml", format!("{} updated", iri))
                    }
                }
            }
            (XML_SERVER, "getXml") => {
                let iri = str_field(payload, "iri");
                match state.records.get(iri) {
                    None => failure("doc_not_found", format!("{} not found", iri)),
                    Some(record) => package(record),
                }
            }
            (XML_SERVER, "getDocuments") | (XML_SERVER, "getFilteredDocuments") => {
                let filtered = operation == "getFilteredDocuments";
                let matching: Vec<&StoredRecord> = state
                    .records
                    .values()
                    .filter(|r| matches_doc_types(r, payload.get("docTypes")))
                    .filter(|r| !filtered || matches_title(r, str_field(payload, "title")))
                    .collect();
                if matching.is_empty() {
                    failure("no_documents", "No documents found")
                } else {
                    let from = payload.get("itemsFrom").and_then(Value::as_u64).unwrap_or(1).max(1) as usize;
                    let page_size = payload
                        .get("pageSize")
                        .and_then(Value::as_u64)
                        .map(|n| n as usize)
                        .unwrap_or(matching.len());
                    let page: Vec<Value> = matching.iter().skip(from - 1).take(page_size).map(|r| package(r)).collect();
                    json!({
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                        "itemsFrom": from.to_string(),
                        "records": matching.len().to_string(),
                        "package": page,
                    })
                }
            }
            (XML_SERVER, "deleteDocument") => {
                let iri = str_field(payload, "iri");
                match state.records.remove(iri) {
                    Some(_) => success("delete_document", format!("{} deleted", iri)),
                    None => failure("doc_not_found", format!("{} not found", iri)),
                }
            }
            (XML_SERVER, "metadata") => keyword_reply(&state.client_keywords),
            (PORTAL_DATA, "metadata") => keyword_reply(&state.portal_keywords),
            (XML_SERVER, "refreshTags") => {
                let iri = str_field(payload, "iri");
                if state.records.contains_key(iri) {
                    success("refresh_tags", format!("tags refreshed for {}", iri))
                } else {
                    failure("doc_not_found", format!("{} not found", iri))
                }
            }
            (XML_SERVER, "saveMetadata") => {
                state.saved_metadata.push(payload.clone());
                let added: Vec<String> = payload
                    .get("keyword")
                    .and_then(Value::as_array)
                    .map(|kw| kw.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                let existing = state.client_keywords.take().unwrap_or_default();
                state.client_keywords = Some(crate::merge::merge(&existing, &added));
                success("save_metadata", "metadata saved")
            }
            (XML_SERVER, "saveCustomMeta") => {
                let iri = str_field(payload, "iri");
                match state.records.get_mut(iri) {
                    None => failure("doc_not_found", format!("{} not found", iri)),
                    Some(record) => {
                        record.custom_meta_xml = Some(str_field(payload, "data").to_string());
                        success("save_custom_meta", format!("custom metadata saved for {}", iri))
                    }
                }
            }
            _ => return None,
        };
        Some(reply)
    }
}

fn package(record: &StoredRecord) -> Value {
    json!({
        "document": record.document,
        "workflow": {"state": {"status": record.status, "label": record.status}},
    })
}

fn keyword_reply(keywords: &Option<Vec<String>>) -> Value {
    match keywords {
        Some(list) => json!({ "keyword": list }),
        None => json!({}),
    }
}

fn matches_doc_types(record: &StoredRecord, doc_types: Option<&Value>) -> bool {
    let doc_type = record.document.get("docType").and_then(Value::as_str).unwrap_or_default();
    match doc_types {
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(doc_type)),
        Some(Value::String(t)) if t != "all" => t == doc_type,
        _ => true,
    }
}

fn matches_title(record: &StoredRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    record
        .document
        .get("title")
        .and_then(Value::as_str)
        .map(|title| title.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

#[async_trait]
impl ServiceGateway for InMemoryGateway {
    async fn call(&self, service: &str, operation: &str, payload: Value) -> Result<Value, GatewayError> {
        let key = format!("{}.{}", service, operation);
        self.with_state(|state| {
            state.calls.push(key.clone());
            if state.unavailable.contains(&key) {
                return Err(GatewayError::Unavailable {
                    service: service.to_string(),
                    operation: operation.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            if let Some(reply) = state.canned.get(&key) {
                return Ok(reply.clone());
            }
            Self::dispatch(state, service, operation, &payload).ok_or_else(|| GatewayError::UnknownOperation {
                service: service.to_string(),
                operation: operation.to_string(),
            })
        })
    }
}
