use music_collection_bulk_ops::models::ItemType;
use music_collection_bulk_ops::protocol::{Command, ImportInput, Outbound};
use music_collection_bulk_ops::state::{Operation, OperationState};
use serde_json::json;

#[test]
fn start_hide_carries_crumb() {
    let cmd = Command::from_message(&json!({ "startBulkHide": { "crumb": "abc" } })).unwrap();
    assert_eq!(cmd, Some(Command::StartBulkHide { crumb: Some("abc".into()) }));

    let cmd = Command::from_message(&json!({ "startBulkUnhide": {} })).unwrap();
    assert_eq!(cmd, Some(Command::StartBulkUnhide { crumb: None }));
}

#[test]
fn import_payload_decodes_items_or_urls() {
    let cmd = Command::from_message(&json!({
        "startBulkImport": { "items": [
            { "item_id": 1, "item_type": "a", "item_title": "X", "band_name": "B", "unit_price": 2.5 }
        ] }
    }))
    .unwrap();
    match cmd {
        Some(Command::StartBulkImport(ImportInput::Items(items))) => {
            assert_eq!(items[0].item_type, ItemType::Album);
            assert_eq!(items[0].unit_price, Some(2.5));
            assert_eq!(items[0].currency, "USD");
        }
        other => panic!("unexpected {:?}", other),
    }

    let cmd = Command::from_message(&json!({ "startBulkImport": { "items": ["https://x.bandcamp.com/track/y"] } }))
        .unwrap();
    assert_eq!(
        cmd,
        Some(Command::StartBulkImport(ImportInput::Urls(vec!["https://x.bandcamp.com/track/y".into()])))
    );
}

#[test]
fn older_key_names_are_accepted() {
    assert_eq!(
        Command::from_message(&json!({ "unhide": {} })).unwrap(),
        Some(Command::StartBulkUnhide { crumb: None })
    );
    assert_eq!(Command::from_message(&json!({ "getUnhideState": {} })).unwrap(), Some(Command::QueryState));
    assert_eq!(Command::from_message(&json!({ "getCartImportState": true })).unwrap(), Some(Command::QueryState));
    assert_eq!(
        Command::from_message(&json!({ "cartUrlImport": { "urls": ["u1", "u2"] } })).unwrap(),
        Some(Command::StartBulkImport(ImportInput::Urls(vec!["u1".into(), "u2".into()])))
    );
}

#[test]
fn first_key_in_precedence_order_wins() {
    let cmd = Command::from_message(&json!({
        "queryState": {},
        "startBulkUnhide": {},
        "startBulkHide": { "crumb": "c" }
    }))
    .unwrap();
    assert_eq!(cmd, Some(Command::StartBulkHide { crumb: Some("c".into()) }));
}

#[test]
fn unrecognized_messages_are_ignored() {
    assert_eq!(Command::from_message(&json!({ "ping": 1 })).unwrap(), None);
    assert_eq!(Command::from_message(&json!("startBulkHide")).unwrap(), None);
    assert_eq!(Command::from_message(&json!({ "startBulkHide": null })).unwrap(), None);
}

#[test]
fn malformed_import_payload_is_an_error() {
    assert!(Command::from_message(&json!({ "startBulkImport": {} })).is_err());
    assert!(Command::from_message(&json!({ "startBulkImport": { "items": "nope" } })).is_err());
}

#[test]
fn outbound_shapes() {
    let done = Outbound::Complete { message: "Successfully hidden 3 items".into() };
    assert_eq!(done.to_json(), r#"{"complete":{"message":"Successfully hidden 3 items"}}"#);

    let fatal = Outbound::FatalError { message: "boom".into() };
    assert_eq!(fatal.to_json(), r#"{"fatalError":{"message":"boom"}}"#);

    let st = Outbound::State(OperationState::idle(Operation::Hide, None));
    let v: serde_json::Value = serde_json::from_str(&st.to_json()).unwrap();
    assert_eq!(v["state"]["totalCount"], 0);
    assert_eq!(v["state"]["operation"], "hide");
    assert_eq!(v["state"]["errors"], json!([]));
}
