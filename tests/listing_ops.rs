//! Authenticated listings with role-derived workflow views and sorting

mod common;

use common::{act_iri, error_code, harness, Harness, ADMIN_TOKEN, EDITOR_TOKEN};
use serde_json::{json, Value};

use docflow::listing::Listing;
use docflow::OperationInput;

async fn seeded() -> Harness {
    let h = harness();
    h.add(&act_iri("Cap_1"), "Zeta Act").await;
    h.add(&act_iri("Cap_2"), "Alpha Act").await;
    h.add(&act_iri("Cap_3"), "Mid Act").await;

    // move Cap_3 along its workflow
    let loaded = h.post("/document/load", json!({"iri": act_iri("Cap_3")})).await;
    h.gateway.seed_document(&act_iri("Cap_3"), loaded, "editable");
    h
}

async fn list(h: &Harness, operation: &str, token: &str, data: Value) -> Value {
    h.run(operation, OperationInput::json(json!({ "data": data })).with_token(token))
        .await
        .into_value()
}

fn titles(listing: &Listing) -> Vec<&str> {
    listing.documents.iter().map(|d| d.title.as_str()).collect()
}

#[tokio::test]
async fn test_listing_sorted_by_title() {
    let h = seeded().await;
    let response = list(
        &h,
        "/documents",
        ADMIN_TOKEN,
        json!({"docTypes": "all", "itemsFrom": 1, "pageSize": 10,
               "sortOrder": {"fields": ["docTitle"], "orders": ["asc"]}}),
    )
    .await;
    let listing: Listing = serde_json::from_value(response).unwrap();

    assert_eq!(listing.start, 1);
    assert_eq!(listing.total, 3);
    assert!(!listing.timestamp.is_empty());
    assert_eq!(titles(&listing), vec!["Alpha Act", "Mid Act", "Zeta Act"]);
}

#[tokio::test]
async fn test_listing_workflow_view_follows_roles() {
    let h = seeded().await;
    let response = list(&h, "/documents", ADMIN_TOKEN, json!({"docTypes": ["act"]})).await;
    let listing: Listing = serde_json::from_value(response).unwrap();

    let editable = listing.documents.iter().find(|d| d.title == "Mid Act").unwrap();
    assert_eq!(editable.workflow.state, "editable");
    assert_eq!(editable.workflow.progress, 40);
    assert_eq!(editable.workflow.next_states, vec!["under_review"]);
    assert!(editable.workflow.permissions.contains(&"transit".to_string()));

    let response = list(&h, "/documents", EDITOR_TOKEN, json!({"docTypes": ["act"]})).await;
    let listing: Listing = serde_json::from_value(response).unwrap();
    let editable = listing.documents.iter().find(|d| d.title == "Mid Act").unwrap();
    assert_eq!(editable.workflow.next_states, vec!["under_review", "draft"]);
}

#[tokio::test]
async fn test_listing_multi_key_sort() {
    let h = seeded().await;
    let response = list(
        &h,
        "/documents",
        ADMIN_TOKEN,
        json!({"sortOrder": {"fields": ["workflow", "title"], "orders": ["desc", "desc"]}}),
    )
    .await;
    let listing: Listing = serde_json::from_value(response).unwrap();
    assert_eq!(titles(&listing), vec!["Mid Act", "Zeta Act", "Alpha Act"]);
}

#[tokio::test]
async fn test_unknown_sort_field_keeps_store_order() {
    let h = seeded().await;
    let response = list(
        &h,
        "/documents",
        ADMIN_TOKEN,
        json!({"sortOrder": {"fields": ["colour"], "orders": ["asc"]}}),
    )
    .await;
    let listing: Listing = serde_json::from_value(response).unwrap();
    // the store returns documents in IRI order
    assert_eq!(titles(&listing), vec!["Zeta Act", "Alpha Act", "Mid Act"]);
}

#[tokio::test]
async fn test_listing_requires_valid_token() {
    let h = seeded().await;
    let response = list(&h, "/documents", "nobody", json!({})).await;
    assert_eq!(error_code(&response), Some("auth_failed"));
    assert!(!h.gateway.was_called("xmlServer", "getDocuments"));

    let response = h
        .run("/documents", OperationInput::json(json!({"data": {}})))
        .await
        .into_value();
    assert_eq!(error_code(&response), Some("auth_failed"));
}

#[tokio::test]
async fn test_empty_listing_returns_store_error() {
    let h = harness();
    let response = list(&h, "/documents", ADMIN_TOKEN, json!({"docTypes": "all"})).await;
    assert_eq!(error_code(&response), Some("no_documents"));
}

#[tokio::test]
async fn test_listing_store_unavailable() {
    let h = seeded().await;
    h.gateway.make_unavailable("xmlServer", "getDocuments");
    let response = list(&h, "/documents", ADMIN_TOKEN, json!({})).await;
    assert_eq!(error_code(&response), Some("EXCEPTION"));
}

#[tokio::test]
async fn test_filtered_listing() {
    let h = seeded().await;
    let response = list(&h, "/documents/filter", EDITOR_TOKEN, json!({"title": "alpha"})).await;
    let listing: Listing = serde_json::from_value(response).unwrap();
    assert_eq!(titles(&listing), vec!["Alpha Act"]);
    assert_eq!(listing.total, 1);

    let response = list(&h, "/documents/filter", EDITOR_TOKEN, json!({"title": "omega"})).await;
    assert_eq!(error_code(&response), Some("EXCEPTION"));
}
