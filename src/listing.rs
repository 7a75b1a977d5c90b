//! Document listings and multi-key sorting

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::document::Document;

/// One page of documents as returned to the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub timestamp: String,
    /// 1-based index of the first document in this page
    pub start: u64,
    /// Total number of matching documents in the store
    pub total: u64,
    pub documents: Vec<Document>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Field a listing can be sorted by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortField {
    /// Document title
    Title,
    /// Current workflow state name
    State,
    /// First permitted next state, absent when there is none
    NextStates,
    /// Workflow progress percentage
    Workflow,
    /// Anything else; contributes no ordering
    Unrecognized(String),
}

impl SortField {
    pub fn parse(name: &str) -> Self {
        match name {
            "docTitle" | "title" => Self::Title,
            "state" => Self::State,
            "nextStates" => Self::NextStates,
            "workflow" => Self::Workflow,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    fn key<'a>(&self, doc: &'a Document) -> SortKey<'a> {
        match self {
            Self::Title => SortKey::Text(Some(doc.title.as_str())),
            Self::State => SortKey::Text(Some(doc.workflow.state.as_str())),
            Self::NextStates => SortKey::Text(doc.workflow.next_states.first().map(String::as_str)),
            Self::Workflow => SortKey::Number(doc.workflow.progress),
            Self::Unrecognized(_) => SortKey::Equal,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SortKey<'a> {
    Text(Option<&'a str>),
    Number(u8),
    Equal,
}

impl SortKey<'_> {
    /// Ascending comparison; absent values sort after present ones
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => match (a, b) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// `sortOrder` as posted by the UI: parallel lists of field names and
/// directions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortOrder {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub orders: Vec<String>,
}

/// Ordered `(field, direction)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<(SortField, SortDirection)>,
}

impl SortSpec {
    pub fn new(keys: Vec<(SortField, SortDirection)>) -> Self {
        Self { keys }
    }

    /// Build from the UI's parallel lists. A field without a matching
    /// direction sorts ascending.
    pub fn from_order(order: &SortOrder) -> Self {
        let keys = order
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let direction = match order.orders.get(i).map(|o| o.to_ascii_lowercase()) {
                    Some(o) if o == "desc" => SortDirection::Desc,
                    Some(o) if o == "asc" => SortDirection::Asc,
                    Some(other) => {
                        tracing::warn!(field = %field, direction = %other, "Unknown sort direction, using ascending");
                        SortDirection::Asc
                    }
                    None => SortDirection::Asc,
                };
                (SortField::parse(field), direction)
            })
            .collect();
        Self { keys }
    }

    pub fn keys(&self) -> &[(SortField, SortDirection)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Field names that will not affect the order
    pub fn unrecognized(&self) -> Vec<&str> {
        self.keys
            .iter()
            .filter_map(|(field, _)| match field {
                SortField::Unrecognized(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, direction) in &self.keys {
            let ordering = field.key(a).compare(&field.key(b));
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Stable multi-key sorter for listings
pub struct ListingSorter;

impl ListingSorter {
    /// Sort in place. Documents equal under every key keep their relative
    /// order.
    pub fn sort(documents: &mut [Document], spec: &SortSpec) {
        let unrecognized = spec.unrecognized();
        if !unrecognized.is_empty() {
            tracing::warn!(fields = ?unrecognized, "Ignoring unrecognized sort fields");
        }
        if spec.is_empty() {
            return;
        }
        // slice::sort_by is stable
        documents.sort_by(|a, b| spec.compare(a, b));
    }
}
