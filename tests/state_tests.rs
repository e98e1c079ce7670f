use music_collection_bulk_ops::state::{Operation, OperationState, Phase};

fn finished(op: Operation, total: usize, failures: usize) -> OperationState {
    let mut st = OperationState::idle(op, None);
    st.begin(op, total);
    for i in 0..total {
        if i < failures {
            st.record(Err(format!("item {} failed", i)));
        } else {
            st.record(Ok(()));
        }
    }
    st.finish();
    st
}

#[test]
fn message_variants_per_operation() {
    assert_eq!(finished(Operation::Hide, 3, 0).completion_message(), "Successfully hidden 3 items");
    assert_eq!(finished(Operation::Unhide, 5, 1).completion_message(), "4 items unhidden with 1 errors");
    assert_eq!(finished(Operation::Unhide, 2, 2).completion_message(), "Failed to unhide all 2 items");
    assert_eq!(
        finished(Operation::Import, 2, 1).completion_message(),
        "Successfully added 1 items to cart. 1 items could not be added"
    );
    assert_eq!(finished(Operation::UrlImport, 1, 0).completion_message(), "Successfully added 1 items to cart");
    assert_eq!(OperationState::empty_message(Operation::Hide), "No visible items found");
}

#[test]
fn finished_run_counts_every_item_as_processed() {
    let st = finished(Operation::Hide, 4, 2);
    assert_eq!(st.phase, Phase::Complete);
    assert!(!st.is_processing);
    assert_eq!(st.processed_count, st.total_count);
    assert!(st.errors.len() <= st.total_count);
    assert_eq!(st.succeeded(), 2);
}

#[test]
fn retention_bound_keeps_latest_errors_and_full_count() {
    let mut st = OperationState::idle(Operation::Hide, Some(2));
    st.begin(Operation::Hide, 4);
    for i in 0..4 {
        st.record(Err(format!("e{}", i)));
    }
    assert_eq!(st.error_count, 4);
    assert_eq!(st.errors.iter().cloned().collect::<Vec<_>>(), vec!["e2", "e3"]);
    assert_eq!(st.processed_count, 4);
}

#[test]
fn zero_retention_keeps_count_but_no_lines() {
    let mut st = OperationState::idle(Operation::Hide, Some(0));
    st.begin(Operation::Hide, 3);
    st.record(Err("x".into()));
    st.record(Ok(()));
    st.record(Err("y".into()));
    st.finish();

    assert!(st.errors.is_empty());
    assert_eq!(st.error_count, 2);
    assert_eq!(st.processed_count, 3);
    assert_eq!(st.completion_message(), "1 items hidden with 2 errors");
}

#[test]
fn begin_keeps_retention_bound() {
    let mut st = OperationState::idle(Operation::Unhide, Some(1));
    st.begin(Operation::Unhide, 2);
    st.record(Err("a".into()));
    st.record(Err("b".into()));
    assert_eq!(st.errors.iter().cloned().collect::<Vec<_>>(), vec!["b"]);
}

#[test]
fn snapshot_uses_camel_case_keys() {
    let st = OperationState::idle(Operation::UrlImport, None);
    let v = serde_json::to_value(&st).unwrap();
    assert_eq!(v["isProcessing"], false);
    assert_eq!(v["errorCount"], 0);
    assert_eq!(v["operation"], "urlImport");
    assert_eq!(v["phase"], "idle");
    assert!(v.get("retain_errors").is_none());
    assert!(v.get("retainErrors").is_none());
}
