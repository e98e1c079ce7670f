use serde::{Deserialize, Serialize};

/// Kind of a collection entry. Listings spell it out ("album", "track"),
/// the cart and detail endpoints use the one-letter codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(rename = "album", alias = "a")]
    Album,
    #[serde(rename = "track", alias = "t")]
    Track,
}

impl ItemType {
    pub fn code(&self) -> &'static str {
        match self {
            ItemType::Album => "a",
            ItemType::Track => "t",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Album => "album",
            ItemType::Track => "track",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Hide,
    Unhide,
    Add,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Hide => "hide",
            Action::Unhide => "unhide",
            Action::Add => "add",
        }
    }

    pub fn gerund(&self) -> &'static str {
        match self {
            Action::Hide => "hiding",
            Action::Unhide => "unhiding",
            Action::Add => "adding",
        }
    }

    pub fn past(&self) -> &'static str {
        match self {
            Action::Hide => "hidden",
            Action::Unhide => "unhidden",
            Action::Add => "added",
        }
    }
}

/// Continuation token of a collection listing. Never parsed: the last one
/// received is passed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(pub String);

impl PageToken {
    /// Token that starts a listing from "now": `<unixSeconds>:999999999:t::`.
    pub fn starting_at(unix_seconds: i64) -> Self {
        PageToken(format!("{}:999999999:t::", unix_seconds))
    }

    pub fn now() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One entry of a remote collection listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedRecord {
    pub item_id: u64,
    pub item_type: ItemType,
    #[serde(default)]
    pub hidden: Option<serde_json::Value>,
}

impl ListedRecord {
    /// `hidden` absent, null or false means the entry is visible.
    pub fn is_hidden(&self) -> bool {
        match &self.hidden {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => false,
            Some(_) => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSummary {
    pub fan_id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A cart entry supplied by the caller. `unit_price` is set when the caller
/// already resolved pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub item_id: u64,
    pub item_type: ItemType,
    #[serde(default)]
    pub item_title: String,
    #[serde(default)]
    pub band_name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

fn default_currency() -> String {
    "USD".into()
}

/// Subset of the mobile tralbum details reply the import needs.
#[derive(Debug, Clone, Deserialize)]
pub struct TralbumDetails {
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub is_purchasable: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Item description scraped from a public album/track page.
#[derive(Debug, Clone, Deserialize)]
pub struct PageDetails {
    pub id: u64,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tralbum_artist: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub bandcamp_url: String,
    #[serde(default)]
    pub price: Option<f64>,
}

impl From<PageDetails> for CartItem {
    fn from(p: PageDetails) -> Self {
        CartItem {
            item_id: p.id,
            item_type: p.item_type,
            item_title: p.title,
            band_name: p.tralbum_artist,
            currency: p.currency,
            url: p.bandcamp_url,
            unit_price: None,
        }
    }
}

/// The cart add request emitted for one resolved import item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartAddRequest {
    pub item_id: u64,
    pub item_type: ItemType,
    pub item_title: String,
    pub band_name: String,
    pub unit_price: f64,
    pub currency: String,
    pub url: String,
}

/// One unit of mutation work.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskItem {
    pub fan_id: Option<u64>,
    pub item_id: u64,
    pub item_type: ItemType,
    pub action: Action,
    pub crumb: Option<String>,
    pub base_url: String,
    pub unit_price: Option<f64>,
    pub cart: Option<CartItem>,
}

impl TaskItem {
    pub fn collection(
        fan_id: u64,
        record: &ListedRecord,
        action: Action,
        crumb: Option<String>,
        base_url: &str,
    ) -> Self {
        TaskItem {
            fan_id: Some(fan_id),
            item_id: record.item_id,
            item_type: record.item_type,
            action,
            crumb,
            base_url: base_url.to_string(),
            unit_price: None,
            cart: None,
        }
    }

    pub fn cart(item: CartItem, base_url: &str) -> Self {
        TaskItem {
            fan_id: None,
            item_id: item.item_id,
            item_type: item.item_type,
            action: Action::Add,
            crumb: None,
            base_url: base_url.to_string(),
            unit_price: item.unit_price,
            cart: Some(item),
        }
    }
}

/// Smallest price accepted per currency, used when the detail lookup
/// reports a zero ("name your price") price.
pub fn currency_minimum(currency: &str) -> Option<f64> {
    let v = match currency {
        "USD" | "AUD" | "NZD" | "CHF" => 0.5,
        "GBP" | "EUR" => 0.25,
        "CAD" | "SGD" => 1.0,
        "JPY" => 70.0,
        "CZK" => 10.0,
        "DKK" | "HKD" => 2.5,
        "HUF" => 100.0,
        "ILS" => 1.5,
        "MXN" => 5.0,
        "NOK" | "PLN" | "SEK" => 3.0,
        _ => return None,
    };
    Some(v)
}
