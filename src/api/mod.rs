pub mod bandcamp;
pub mod mock;

use crate::models::{Action, CartAddRequest, CollectionSummary, ItemType, PageDetails, PageToken, TralbumDetails};
use anyhow::Result;

/// Which collection listing to page through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listing {
    /// Every item in the collection, hidden or not.
    Collection,
    /// Only the hidden items.
    Hidden,
}

impl Listing {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Listing::Collection => "collection_items",
            Listing::Hidden => "hidden_items",
        }
    }
}

/// Provider trait: the remote operations a bulk run needs.
/// Implementations: bandcamp::BandcampProvider and mock::MockProvider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Summary of the signed-in fan's collection; carries the fan id.
    async fn collection_summary(&self) -> Result<CollectionSummary>;

    /// Fetch one listing page older than `token`. The raw reply is returned
    /// so the caller can validate its shape.
    async fn list_page(
        &self,
        listing: Listing,
        fan_id: u64,
        token: &PageToken,
        count: usize,
    ) -> Result<serde_json::Value>;

    /// Hide or unhide one collection item. `Ok(false)` means the remote refused.
    async fn hide_unhide(
        &self,
        action: Action,
        fan_id: u64,
        item_type: ItemType,
        item_id: u64,
        crumb: Option<&str>,
    ) -> Result<bool>;

    /// Price and purchasability of one album/track.
    async fn tralbum_details(&self, item_id: u64, item_type: ItemType) -> Result<TralbumDetails>;

    /// Resolve a public album/track page URL into item details.
    async fn tralbum_details_from_page(&self, url: &str) -> Result<PageDetails>;

    /// Put one item in the cart.
    async fn add_to_cart(&self, request: &CartAddRequest) -> Result<bool>;

    /// Return the provider's name (for logging)
    fn name(&self) -> &str;
}
