//! XML rendering
//!
//! Documents and custom metadata are rendered to Akoma Ntoso XML through
//! Handlebars templates compiled once at startup.

use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::document::Document;
use crate::error::RenderError;

pub const DOCUMENT_TEMPLATE: &str = "akn_document";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (DOCUMENT_TEMPLATE, include_str!("../templates/akn_document.xml.hbs")),
    ("meta/act", include_str!("../templates/meta/act.xml.hbs")),
    ("meta/judgment", include_str!("../templates/meta/judgment.xml.hbs")),
    ("meta/doc", include_str!("../templates/meta/doc.xml.hbs")),
];

/// Renders a named template against JSON data
pub trait XmlRenderer: Send + Sync {
    fn render(&self, template: &str, data: &Value) -> Result<String, RenderError>;

    fn has_template(&self, template: &str) -> bool;
}

/// Handlebars-backed renderer with the built-in templates registered
pub struct HandlebarsRenderer {
    handlebars: Handlebars<'static>,
}

impl HandlebarsRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_helper("iso_date", Box::new(iso_date_helper));

        for (name, source) in BUILTIN_TEMPLATES {
            handlebars.register_template_string(name, *source)?;
        }

        Ok(Self { handlebars })
    }

    /// Register or replace a template
    pub fn register(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        self.handlebars.register_template_string(name, source)?;
        Ok(())
    }
}

impl XmlRenderer for HandlebarsRenderer {
    fn render(&self, template: &str, data: &Value) -> Result<String, RenderError> {
        Ok(self.handlebars.render(template, data)?)
    }

    fn has_template(&self, template: &str) -> bool {
        self.handlebars.has_template(template)
    }
}

/// Rendered document ready for the XML store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPackage {
    pub file_xml: String,
    /// Overwrite an existing document with the same IRI
    pub update: bool,
    pub iri: String,
    /// The XML
    pub data: String,
    /// Canonical document, stored alongside the XML
    pub document: Value,
}

impl RenderedPackage {
    pub fn for_document(renderer: &dyn XmlRenderer, doc: &Document) -> Result<Self, RenderError> {
        let document = serde_json::to_value(doc)?;
        let xml = renderer.render(DOCUMENT_TEMPLATE, &template_data(doc, &document))?;
        Ok(Self {
            file_xml: file_name_from_iri(&doc.iri, "xml"),
            update: true,
            iri: doc.iri.clone(),
            data: xml,
            document,
        })
    }
}

fn template_data(doc: &Document, document: &Value) -> Value {
    let mut data = match document {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let mut named_dates = Map::new();
    for (name, date) in [
        ("docCreatedDate", doc.created_date),
        ("docModifiedDate", doc.modified_date),
        ("docPublicationDate", doc.publication_date),
        ("docEntryIntoForceDate", doc.entry_into_force_date),
        ("docVersionDate", doc.version_date),
    ] {
        if let Some(date) = date {
            named_dates.insert(name.to_string(), json!(date.to_string()));
        }
    }

    data.insert("workIri".into(), json!(work_iri(&doc.iri)));
    data.insert("namedDates".into(), Value::Object(named_dates));
    Value::Object(data)
}

/// Work-level IRI: the expression IRI up to, not including, the
/// `lang@version` component.
pub fn work_iri(iri: &str) -> String {
    iri.split('/')
        .take_while(|segment| !segment.contains('@'))
        .collect::<Vec<_>>()
        .join("/")
}

/// Derive a storage file name from an IRI:
/// `/akn/ke/act/legge/1970-06-03/Cap_44/eng@/!main` becomes
/// `akn_ke_act_legge_1970-06-03_Cap_44_eng_main.xml`.
pub fn file_name_from_iri(iri: &str, extension: &str) -> String {
    let stem = iri
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    format!("{}.{}", stem, extension)
}

fn iso_date_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(param.split('T').next().unwrap_or(""))?;
    Ok(())
}
