//! Workflow catalog keyed by document type and sub-type

use std::collections::HashMap;

use crate::definition::WorkflowDefinition;
use crate::WorkflowError;

/// Immutable set of workflow definitions, indexed by document type.
///
/// A definition listing explicit sub-types wins over a generic definition
/// (empty `sub_types`) for the same document type.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    by_doc_type: HashMap<String, Vec<WorkflowDefinition>>,
}

impl WorkflowCatalog {
    /// Build a catalog, rejecting definitions whose coverage overlaps
    pub fn new(definitions: Vec<WorkflowDefinition>) -> Result<Self, WorkflowError> {
        let mut by_doc_type: HashMap<String, Vec<WorkflowDefinition>> = HashMap::new();

        for def in definitions {
            def.validate()?;
            let siblings = by_doc_type.entry(def.doc_type.clone()).or_default();
            if let Some(clash) = siblings.iter().find(|other| overlaps(other, &def)) {
                let sub_type = if def.sub_types.is_empty() {
                    "*".to_string()
                } else {
                    def.sub_types
                        .iter()
                        .find(|s| clash.covers(s))
                        .cloned()
                        .unwrap_or_else(|| "*".to_string())
                };
                return Err(WorkflowError::Overlap {
                    doc_type: def.doc_type.clone(),
                    sub_type,
                    first: clash.workflow.clone(),
                    second: def.workflow.clone(),
                });
            }
            siblings.push(def);
        }

        Ok(Self { by_doc_type })
    }

    /// Find the definition governing a document type / sub-type pair
    pub fn resolve(&self, doc_type: &str, sub_type: &str) -> Option<&WorkflowDefinition> {
        let candidates = self.by_doc_type.get(doc_type)?;
        candidates
            .iter()
            .find(|d| !d.sub_types.is_empty() && d.covers(sub_type))
            .or_else(|| candidates.iter().find(|d| d.sub_types.is_empty()))
    }

    /// Document types with at least one workflow
    pub fn doc_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_doc_type.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.by_doc_type.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_doc_type.is_empty()
    }
}

fn overlaps(a: &WorkflowDefinition, b: &WorkflowDefinition) -> bool {
    match (a.sub_types.is_empty(), b.sub_types.is_empty()) {
        (true, true) => true,
        (false, false) => a.sub_types.iter().any(|s| b.covers(s)),
        // generic + specific coexist; specific wins at resolve time
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowLoader;

    fn def(workflow: &str, doc_type: &str, sub_types: &[&str]) -> WorkflowDefinition {
        let subs = sub_types
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(", ");
        let yaml = format!(
            "workflow: {workflow}\ndoc_type: {doc_type}\nsub_types: [{subs}]\nstates:\n  - name: draft\n"
        );
        WorkflowLoader::load_from_str(&yaml).unwrap()
    }

    #[test]
    fn test_specific_wins_over_generic() {
        let catalog = WorkflowCatalog::new(vec![
            def("act_generic", "act", &[]),
            def("act_legge", "act", &["legge"]),
        ])
        .unwrap();

        assert_eq!(catalog.resolve("act", "legge").unwrap().workflow, "act_legge");
        assert_eq!(catalog.resolve("act", "decreto").unwrap().workflow, "act_generic");
        assert!(catalog.resolve("judgment", "x").is_none());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_overlap_rejected() {
        let err = WorkflowCatalog::new(vec![
            def("one", "act", &["legge", "decreto"]),
            def("two", "act", &["decreto"]),
        ])
        .unwrap_err();

        match err {
            WorkflowError::Overlap { sub_type, .. } => assert_eq!(sub_type, "decreto"),
            other => panic!("unexpected error: {other}"),
        }

        assert!(WorkflowCatalog::new(vec![def("a", "doc", &[]), def("b", "doc", &[])]).is_err());
    }

    #[test]
    fn test_doc_types_sorted() {
        let catalog = WorkflowCatalog::new(vec![
            def("j", "judgment", &[]),
            def("a", "act", &[]),
        ])
        .unwrap();
        assert_eq!(catalog.doc_types(), vec!["act", "judgment"]);
    }
}
