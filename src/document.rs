//! Document model
//!
//! Two shapes of the same document:
//! - [`FormPackage`]: what the editing UI posts (`pkg`), every field wrapped
//!   in `{ "value": ..., "error": ... }`.
//! - [`Document`]: the canonical representation the pipeline validates,
//!   renders and returns.

use chrono::NaiveDate;
use docflow_workflow::{StateSummary, WorkflowStateInfo};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A UI form field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormField<T> {
    #[serde(default)]
    pub value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl<T> FormField<T> {
    pub fn new(value: T) -> Self {
        Self { value, error: None }
    }
}

/// Language picker value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LangValue {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub label: String,
}

/// Identity block of a submitted package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PkgIdentity {
    pub doc_lang: FormField<LangValue>,
    pub doc_type: FormField<String>,
    pub doc_akn_type: FormField<String>,
    pub doc_country: FormField<String>,
    pub doc_title: FormField<String>,
    pub doc_official_date: FormField<String>,
    pub doc_created_date: FormField<String>,
    pub doc_modified_date: FormField<String>,
    pub doc_publication_date: FormField<String>,
    pub doc_entry_into_force_date: FormField<String>,
    pub doc_version_date: FormField<String>,
    pub doc_number: FormField<String>,
    pub doc_part: FormField<String>,
    pub doc_iri: FormField<String>,
    pub doc_tags: FormField<Vec<String>>,
}

/// The `pkg` object posted by the editing UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPackage {
    pub pkg_identity: PkgIdentity,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pkg_attachments: Vec<Attachment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_meta: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Map<String, Value>>,
}

impl FormPackage {
    pub fn iri(&self) -> &str {
        &self.pkg_identity.doc_iri.value
    }

    pub fn doc_type(&self) -> &str {
        &self.pkg_identity.doc_akn_type.value
    }
}

/// Attachment descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Stable identifier within the document
    pub id: String,
    /// 1-based position in the attachment list
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub file_name: String,
    /// Where the attachment store keeps the file
    #[serde(default)]
    pub storage_ref: String,
    #[serde(default)]
    pub mime_type: String,
}

/// Workflow section of a document, as derived for the acting user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentWorkflow {
    pub state: String,
    pub all_states: Vec<StateSummary>,
    pub next_states: Vec<String>,
    pub permissions: Vec<String>,
    pub progress: u8,
}

impl From<WorkflowStateInfo> for DocumentWorkflow {
    fn from(info: WorkflowStateInfo) -> Self {
        Self {
            state: info.current_state,
            all_states: info.all_states,
            next_states: info.next_states,
            permissions: info.permissions,
            progress: info.progress.percent,
        }
    }
}

/// Canonical document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub iri: String,
    /// Akoma Ntoso document type, e.g. "act"
    pub doc_type: String,
    /// Local name of the document type, e.g. "legge"
    pub sub_type: String,
    pub language: String,
    pub country: String,

    pub title: String,
    pub official_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_date: Option<NaiveDate>,
    #[serde(default)]
    pub modified_date: Option<NaiveDate>,
    #[serde(default)]
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub entry_into_force_date: Option<NaiveDate>,
    #[serde(default)]
    pub version_date: Option<NaiveDate>,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub part: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Map<String, Value>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_meta: BTreeMap<String, Value>,

    #[serde(default)]
    pub workflow: DocumentWorkflow,
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Document {
    /// Convert a submitted package into a canonical document, validating the
    /// fields the pipeline depends on. All failures are collected.
    pub fn from_form(pkg: &FormPackage) -> Result<Self, Vec<FieldError>> {
        let id = &pkg.pkg_identity;
        let mut errors = Vec::new();

        let required = |field: &str, value: &str, errors: &mut Vec<FieldError>| {
            if value.trim().is_empty() {
                errors.push(FieldError::new(field, "is required"));
            }
        };
        required("docIri", &id.doc_iri.value, &mut errors);
        required("docAknType", &id.doc_akn_type.value, &mut errors);
        required("docType", &id.doc_type.value, &mut errors);
        required("docLang", &id.doc_lang.value.value, &mut errors);
        required("docCountry", &id.doc_country.value, &mut errors);
        required("docTitle", &id.doc_title.value, &mut errors);

        if !id.doc_iri.value.is_empty() && !id.doc_iri.value.starts_with("/akn/") {
            errors.push(FieldError::new("docIri", "must start with /akn/"));
        }

        let official_date = match parse_date("docOfficialDate", &id.doc_official_date.value) {
            Ok(Some(d)) => Some(d),
            Ok(None) => {
                errors.push(FieldError::new("docOfficialDate", "is required"));
                None
            }
            Err(e) => {
                errors.push(e);
                None
            }
        };
        let mut optional_date = |field: &str, raw: &str| match parse_date(field, raw) {
            Ok(d) => d,
            Err(e) => {
                errors.push(e);
                None
            }
        };
        let created_date = optional_date("docCreatedDate", &id.doc_created_date.value);
        let modified_date = optional_date("docModifiedDate", &id.doc_modified_date.value);
        let publication_date = optional_date("docPublicationDate", &id.doc_publication_date.value);
        let entry_into_force_date =
            optional_date("docEntryIntoForceDate", &id.doc_entry_into_force_date.value);
        let version_date = optional_date("docVersionDate", &id.doc_version_date.value);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            iri: id.doc_iri.value.trim().to_string(),
            doc_type: id.doc_akn_type.value.trim().to_string(),
            sub_type: id.doc_type.value.trim().to_string(),
            language: id.doc_lang.value.value.clone(),
            country: id.doc_country.value.clone(),
            title: id.doc_title.value.clone(),
            official_date,
            created_date,
            modified_date,
            publication_date,
            entry_into_force_date,
            version_date,
            number: id.doc_number.value.clone(),
            part: id.doc_part.value.clone(),
            tags: id.doc_tags.value.clone(),
            classification: pkg.classification.clone(),
            attachments: pkg.pkg_attachments.clone(),
            custom_meta: pkg.custom_meta.clone(),
            workflow: DocumentWorkflow::default(),
        })
    }

    /// Next free attachment index
    pub fn next_attachment_index(&self) -> u32 {
        self.attachments.iter().map(|a| a.index).max().unwrap_or(0) + 1
    }
}

fn parse_date(field: &str, raw: &str) -> Result<Option<NaiveDate>, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    // the UI may post full ISO timestamps; only the date part is kept
    let date_part = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| FieldError::new(field, format!("'{}' is not a valid date", raw)))
}

/// Document record as kept by the XML store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPackage {
    pub document: Document,
    #[serde(default)]
    pub workflow: Option<StoredWorkflow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub state: StoredState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredState {
    pub status: String,
    #[serde(default)]
    pub label: String,
}

impl StoredPackage {
    /// The store's workflow status wins over whatever the document carries
    pub fn into_document(self) -> Document {
        let mut doc = self.document;
        if let Some(wf) = self.workflow {
            doc.workflow.state = wf.state.status;
        }
        doc
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn form_package(iri: &str, title: &str) -> FormPackage {
        FormPackage {
            pkg_identity: PkgIdentity {
                doc_lang: FormField::new(LangValue {
                    value: "eng".into(),
                    label: "English".into(),
                }),
                doc_type: FormField::new("legge".into()),
                doc_akn_type: FormField::new("act".into()),
                doc_country: FormField::new("ke".into()),
                doc_title: FormField::new(title.into()),
                doc_official_date: FormField::new("1970-06-03".into()),
                doc_number: FormField::new("Cap_44".into()),
                doc_part: FormField::new("main".into()),
                doc_iri: FormField::new(iri.into()),
                doc_tags: FormField::new(vec!["tax".into(), "finance".into()]),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::form_package;
    use super::*;
    use serde_json::json;

    const IRI: &str = "/akn/ke/act/legge/1970-06-03/Cap_44/eng@/!main";

    #[test]
    fn test_from_form() {
        let doc = Document::from_form(&form_package(IRI, "Income Tax")).unwrap();
        assert_eq!(doc.iri, IRI);
        assert_eq!(doc.doc_type, "act");
        assert_eq!(doc.sub_type, "legge");
        assert_eq!(doc.language, "eng");
        assert_eq!(doc.official_date, NaiveDate::from_ymd_opt(1970, 6, 3));
        assert_eq!(doc.tags, vec!["tax", "finance"]);
        assert!(doc.attachments.is_empty());
    }

    #[test]
    fn test_from_form_collects_errors() {
        let mut pkg = form_package("ke/act", "");
        pkg.pkg_identity.doc_official_date.value = "03/06/1970".into();
        pkg.pkg_identity.doc_version_date.value = "never".into();

        let errors = Document::from_form(&pkg).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["docTitle", "docIri", "docOfficialDate", "docVersionDate"]);
    }

    #[test]
    fn test_timestamp_dates_accepted() {
        let mut pkg = form_package(IRI, "Income Tax");
        pkg.pkg_identity.doc_created_date.value = "2018-05-11T10:00:00.000Z".into();
        let doc = Document::from_form(&pkg).unwrap();
        assert_eq!(doc.created_date, NaiveDate::from_ymd_opt(2018, 5, 11));
    }

    #[test]
    fn test_null_attachments_become_empty() {
        let doc: Document = serde_json::from_value(json!({
            "iri": IRI,
            "docType": "act",
            "subType": "legge",
            "language": "eng",
            "country": "ke",
            "title": "t",
            "officialDate": "1970-06-03",
            "attachments": null,
            "tags": null
        }))
        .unwrap();
        assert!(doc.attachments.is_empty());
        assert!(doc.tags.is_empty());
    }

    #[test]
    fn test_form_package_from_ui_json() {
        let pkg: FormPackage = serde_json::from_value(json!({
            "pkgIdentity": {
                "docIri": {"value": IRI, "error": null},
                "docAknType": {"value": "act"},
                "docLang": {"value": {"value": "eng", "label": "English"}}
            },
            "pkgAttachments": null
        }))
        .unwrap();
        assert_eq!(pkg.iri(), IRI);
        assert_eq!(pkg.doc_type(), "act");
        assert!(pkg.pkg_attachments.is_empty());
    }

    #[test]
    fn test_stored_package_state_wins() {
        let mut doc = Document::from_form(&form_package(IRI, "t")).unwrap();
        doc.workflow.state = "draft".into();
        let stored = StoredPackage {
            document: doc,
            workflow: Some(StoredWorkflow {
                state: StoredState {
                    status: "review".into(),
                    label: "Review".into(),
                },
            }),
        };
        assert_eq!(stored.into_document().workflow.state, "review");
    }
}
