use music_collection_bulk_ops::api::mock::MockProvider;
use music_collection_bulk_ops::engine::{resolve_cart_request, BulkEngine, EngineOptions};
use music_collection_bulk_ops::executor::DispatchPolicy;
use music_collection_bulk_ops::models::{
    currency_minimum, CartItem, ItemType, PageDetails, TaskItem, TralbumDetails,
};
use music_collection_bulk_ops::protocol::{Command, ImportInput, Outbound};
use music_collection_bulk_ops::state::{Operation, OperationState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn options() -> EngineOptions {
    EngineOptions {
        base_url: "https://bandcamp.com".into(),
        page_size: 100,
        max_pages: None,
        collection_policy: DispatchPolicy::Concurrent { limit: None },
        import_policy: DispatchPolicy::SerialDelayed { delay: Duration::from_millis(250) },
        retain_errors: None,
    }
}

fn item(id: u64, price: Option<f64>, currency: &str) -> CartItem {
    CartItem {
        item_id: id,
        item_type: ItemType::Album,
        item_title: format!("Record {}", id),
        band_name: "Band".into(),
        currency: currency.into(),
        url: format!("https://band.bandcamp.com/album/record-{}", id),
        unit_price: price,
    }
}

async fn import(provider: Arc<MockProvider>, input: ImportInput) -> (Vec<Outbound>, OperationState) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut engine = BulkEngine::new(provider, options(), tx);
    engine.handle(Command::StartBulkImport(input)).await;
    let mut msgs = Vec::new();
    while let Ok(m) = rx.try_recv() {
        msgs.push(m);
    }
    (msgs, engine.state().clone())
}

fn complete_message(msgs: &[Outbound]) -> String {
    match msgs.last() {
        Some(Outbound::Complete { message }) => message.clone(),
        other => panic!("expected complete, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn known_price_skips_detail_lookup() {
    let provider = Arc::new(MockProvider::new(1));
    let (msgs, st) = import(provider.clone(), ImportInput::Items(vec![item(42, Some(5.0), "USD")])).await;

    assert_eq!(provider.count_calls("details:"), 0);
    let sent = provider.cart_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].unit_price, 5.0);
    assert_eq!(sent[0].item_title, "Record 42");
    assert_eq!(st.operation, Operation::Import);
    assert_eq!(complete_message(&msgs), "Successfully added 1 items to cart");
}

#[tokio::test(start_paused = true)]
async fn missing_price_is_looked_up() {
    let provider = Arc::new(MockProvider::new(1).with_details(
        8,
        TralbumDetails { price: 9.0, is_purchasable: true, title: None, currency: None },
    ));
    import(provider.clone(), ImportInput::Items(vec![item(8, None, "USD")])).await;

    assert_eq!(provider.count_calls("details:8"), 1);
    assert_eq!(provider.cart_requests()[0].unit_price, 9.0);
}

#[tokio::test(start_paused = true)]
async fn zero_price_falls_back_to_currency_minimum() {
    let provider = Arc::new(MockProvider::new(1).with_details(
        9,
        TralbumDetails { price: 0.0, is_purchasable: true, title: None, currency: None },
    ));
    import(provider.clone(), ImportInput::Items(vec![item(9, None, "EUR")])).await;

    assert_eq!(provider.cart_requests()[0].unit_price, 0.25);
}

#[tokio::test(start_paused = true)]
async fn unpurchasable_item_fails_and_is_not_added() {
    let provider = Arc::new(MockProvider::new(1).with_details(
        7,
        TralbumDetails { price: 3.0, is_purchasable: false, title: None, currency: None },
    ));
    let (msgs, st) = import(provider.clone(), ImportInput::Items(vec![item(7, None, "USD")])).await;

    assert!(provider.cart_requests().is_empty());
    assert_eq!(st.errors[0], "Error processing item 7: Item \"Record 7\" is not purchasable");
    assert_eq!(complete_message(&msgs), "Failed to add all 1 items to cart");
}

#[tokio::test(start_paused = true)]
async fn partial_import_reports_both_counts() {
    let provider = Arc::new(MockProvider::new(1).erroring(2).refusing(3));
    let items = vec![item(1, Some(1.0), "USD"), item(2, None, "USD"), item(3, Some(1.0), "USD")];
    let (msgs, st) = import(provider.clone(), ImportInput::Items(items)).await;

    assert_eq!(st.error_count, 2);
    assert_eq!(st.errors[0], "Error processing item 2: HTTP 404: Not Found");
    assert_eq!(st.errors[1], "Error processing item 3: Failed to add \"Record 3\" to cart");
    assert_eq!(
        complete_message(&msgs),
        "Successfully added 1 items to cart. 2 items could not be added"
    );
}

#[tokio::test(start_paused = true)]
async fn import_is_serial_with_pause_between_items() {
    let provider = Arc::new(MockProvider::new(1));
    let items = (1..=4).map(|id| item(id, Some(1.0), "USD")).collect();
    let started = tokio::time::Instant::now();
    import(provider.clone(), ImportInput::Items(items)).await;

    assert!(started.elapsed() >= Duration::from_millis(750));
    let ids: Vec<u64> = provider.cart_requests().iter().map(|r| r.item_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(provider.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn url_import_resolves_page_then_adds() {
    let url = "https://band.bandcamp.com/album/record";
    let provider = Arc::new(MockProvider::new(1).with_page_details(
        url,
        PageDetails {
            id: 555,
            item_type: ItemType::Album,
            title: "Record".into(),
            tralbum_artist: "Band".into(),
            currency: "GBP".into(),
            bandcamp_url: url.into(),
            price: Some(7.0),
        },
    ));
    let input = ImportInput::Urls(vec![url.into(), "not a url".into()]);
    let (msgs, st) = import(provider.clone(), input).await;

    assert_eq!(st.operation, Operation::UrlImport);
    assert_eq!(provider.count_calls("page:"), 2);
    assert_eq!(provider.count_calls("details:555"), 1);
    let sent = provider.cart_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!((sent[0].item_id, sent[0].currency.as_str()), (555, "GBP"));
    assert_eq!(st.errors[0], "Error processing URL not a url: Invalid URL");
    assert_eq!(
        complete_message(&msgs),
        "Successfully added 1 items to cart. 1 items could not be added"
    );
}

#[tokio::test]
async fn empty_import_completes_immediately() {
    let provider = Arc::new(MockProvider::new(1));
    let (msgs, _) = import(provider, ImportInput::Urls(vec![])).await;
    assert_eq!(msgs, vec![Outbound::Complete { message: "No items found to import".into() }]);
}

#[tokio::test]
async fn resolve_rejects_unknown_currency_at_zero_price() {
    let provider = MockProvider::new(1).with_details(
        4,
        TralbumDetails { price: 0.0, is_purchasable: true, title: None, currency: None },
    );
    let task = TaskItem::cart(item(4, None, "XYZ"), "https://bandcamp.com");
    let err = resolve_cart_request(&provider, task).await.unwrap_err();
    assert!(err.to_string().contains("XYZ"));
}

#[test]
fn currency_minimum_table() {
    assert_eq!(currency_minimum("USD"), Some(0.5));
    assert_eq!(currency_minimum("JPY"), Some(70.0));
    assert_eq!(currency_minimum("HUF"), Some(100.0));
    assert_eq!(currency_minimum("SEK"), Some(3.0));
    assert_eq!(currency_minimum("BTC"), None);
}
