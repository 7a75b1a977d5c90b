use super::fields::{FieldKind, FieldSpecHandler, MetaField};
use super::DocType;

const ACT_STATUSES: &[&str] = &["in_force", "amended", "repealed", "not_commenced"];

pub fn act_handler() -> FieldSpecHandler {
    FieldSpecHandler::new(
        DocType::Act,
        "meta/act",
        vec![
            MetaField::required("actStatus", FieldKind::Choice(ACT_STATUSES)),
            MetaField::optional("enactmentDate", FieldKind::Date),
            MetaField::optional("ministry", FieldKind::Text),
        ],
    )
}

pub fn judgment_handler() -> FieldSpecHandler {
    FieldSpecHandler::new(
        DocType::Judgment,
        "meta/judgment",
        vec![
            MetaField::required("court", FieldKind::Text),
            MetaField::required("caseNumber", FieldKind::Text),
            MetaField::optional("decisionDate", FieldKind::Date),
            MetaField::optional("judges", FieldKind::TextList),
        ],
    )
}

pub fn doc_handler() -> FieldSpecHandler {
    FieldSpecHandler::new(
        DocType::Doc,
        "meta/doc",
        vec![
            MetaField::optional("source", FieldKind::Text),
            MetaField::optional("pageCount", FieldKind::PositiveInt),
        ],
    )
}
