use super::{Listing, Provider};
use crate::models::{
    Action, CartAddRequest, CollectionSummary, ItemType, PageDetails, PageToken, TralbumDetails,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// A scripted provider used in tests and for `--dry-run`.
/// Listing pages are served in the order given; once a listing runs out it
/// answers with an empty page. Every call is recorded.
pub struct MockProvider {
    fan_id: u64,
    summary_error: Option<String>,
    pages: Mutex<HashMap<Listing, VecDeque<Value>>>,
    refused: HashSet<u64>,
    erroring: HashSet<u64>,
    details: HashMap<u64, TralbumDetails>,
    page_details: HashMap<String, PageDetails>,
    latency: Duration,
    calls: Mutex<Vec<String>>,
    cart: Mutex<Vec<CartAddRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new(fan_id: u64) -> Self {
        Self {
            fan_id,
            summary_error: None,
            pages: Mutex::new(HashMap::new()),
            refused: HashSet::new(),
            erroring: HashSet::new(),
            details: HashMap::new(),
            page_details: HashMap::new(),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            cart: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Small fixed collection: two visible items and one hidden one.
    pub fn demo() -> Self {
        Self::new(1).with_pages(
            Listing::Collection,
            vec![json!({
                "items": [
                    { "item_id": 101, "item_type": "album", "hidden": null },
                    { "item_id": 102, "item_type": "track", "hidden": null },
                    { "item_id": 103, "item_type": "album", "hidden": 1 }
                ],
                "more_available": false
            })],
        )
        .with_pages(
            Listing::Hidden,
            vec![json!({ "items": [ { "item_id": 103, "item_type": "album" } ] })],
        )
    }

    pub fn with_pages(self, listing: Listing, pages: Vec<Value>) -> Self {
        if let Ok(mut p) = self.pages.lock() {
            p.insert(listing, pages.into());
        }
        self
    }

    /// `collection_summary` fails with `msg`.
    pub fn failing_summary(mut self, msg: &str) -> Self {
        self.summary_error = Some(msg.to_string());
        self
    }

    /// Mutations of `item_id` answer `false`.
    pub fn refusing(mut self, item_id: u64) -> Self {
        self.refused.insert(item_id);
        self
    }

    /// Mutations and detail lookups of `item_id` fail with an error.
    pub fn erroring(mut self, item_id: u64) -> Self {
        self.erroring.insert(item_id);
        self
    }

    pub fn with_details(mut self, item_id: u64, details: TralbumDetails) -> Self {
        self.details.insert(item_id, details);
        self
    }

    pub fn with_page_details(mut self, url: &str, details: PageDetails) -> Self {
        self.page_details.insert(url.to_string(), details);
        self
    }

    /// Every mutation takes `latency` to answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn cart_requests(&self) -> Vec<CartAddRequest> {
        self.cart.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Highest number of mutations that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        if let Ok(mut c) = self.calls.lock() {
            c.push(call);
        }
    }

    async fn mutation<T>(&self, item_id: u64, answer: T) -> Result<T> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.erroring.contains(&item_id) {
            return Err(anyhow!("HTTP 500: Internal Server Error"));
        }
        Ok(answer)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn collection_summary(&self) -> Result<CollectionSummary> {
        self.record("summary".into());
        if let Some(e) = &self.summary_error {
            return Err(anyhow!("{}", e));
        }
        Ok(CollectionSummary { fan_id: self.fan_id, username: None, url: None })
    }

    async fn list_page(
        &self,
        listing: Listing,
        _fan_id: u64,
        token: &PageToken,
        _count: usize,
    ) -> Result<Value> {
        self.record(format!("list:{}:{}", listing.endpoint(), token.as_str()));
        let next = self
            .pages
            .lock()
            .map_err(|_| anyhow!("mock page table poisoned"))?
            .get_mut(&listing)
            .and_then(|q| q.pop_front());
        Ok(next.unwrap_or_else(|| json!({ "items": [] })))
    }

    async fn hide_unhide(
        &self,
        action: Action,
        _fan_id: u64,
        item_type: ItemType,
        item_id: u64,
        _crumb: Option<&str>,
    ) -> Result<bool> {
        info!("MockProvider: {} {} {}", action.as_str(), item_type.as_str(), item_id);
        self.record(format!("{}:{}", action.as_str(), item_id));
        let ok = !self.refused.contains(&item_id);
        self.mutation(item_id, ok).await
    }

    async fn tralbum_details(&self, item_id: u64, _item_type: ItemType) -> Result<TralbumDetails> {
        self.record(format!("details:{}", item_id));
        if self.erroring.contains(&item_id) {
            return Err(anyhow!("HTTP 404: Not Found"));
        }
        Ok(self.details.get(&item_id).cloned().unwrap_or(TralbumDetails {
            price: 1.0,
            is_purchasable: true,
            title: None,
            currency: None,
        }))
    }

    async fn tralbum_details_from_page(&self, url: &str) -> Result<PageDetails> {
        self.record(format!("page:{}", url));
        self.page_details
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("Invalid URL"))
    }

    async fn add_to_cart(&self, request: &CartAddRequest) -> Result<bool> {
        info!("MockProvider: add_to_cart {} at {}", request.item_id, request.unit_price);
        self.record(format!("cart:{}", request.item_id));
        if let Ok(mut c) = self.cart.lock() {
            c.push(request.clone());
        }
        let ok = !self.refused.contains(&request.item_id);
        self.mutation(request.item_id, ok).await
    }
}
