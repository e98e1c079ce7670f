use crate::api::{Listing, Provider};
use crate::models::{ListedRecord, PageToken};
use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

/// One validated listing reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub items: Vec<ListedRecord>,
    /// Entries in the reply, including ones that did not decode.
    pub received: usize,
    pub last_token: Option<PageToken>,
    pub more_available: Option<bool>,
}

impl ListPage {
    /// Validate a raw listing reply. A non-object reply, or one without an
    /// `items` array, is rejected. Entries that do not decode are skipped.
    pub fn parse(raw: &Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| anyhow!("Invalid response structure: {}", raw))?;
        let items = match obj.get("items") {
            Some(Value::Array(a)) => a,
            other => bail!(
                "Response items field is not an array: {}",
                other.map(json_kind).unwrap_or("undefined")
            ),
        };
        let received = items.len();
        let items: Vec<ListedRecord> = items
            .iter()
            .filter_map(|v| match serde_json::from_value::<ListedRecord>(v.clone()) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!("Skipping listing record {}: {}", v, e);
                    None
                }
            })
            .collect();
        let last_token = obj
            .get("last_token")
            .or_else(|| obj.get("continuation_token"))
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map(|t| PageToken(t.to_string()));
        let more_available = obj.get("more_available").and_then(|m| m.as_bool());
        Ok(ListPage { items, received, last_token, more_available })
    }

    /// True when this page ends the listing.
    pub fn is_last(&self, page_size: usize) -> bool {
        self.received < page_size || self.last_token.is_none() || self.more_available == Some(false)
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Pages through one listing until the provider runs out.
#[derive(Debug, Clone)]
pub struct Collector {
    pub listing: Listing,
    pub page_size: usize,
    pub max_pages: Option<usize>,
}

impl Collector {
    pub fn new(listing: Listing, page_size: usize) -> Self {
        Self { listing, page_size, max_pages: None }
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Fetch every page, strictly one after another, and return all records.
    ///
    /// Any malformed page aborts the whole collection. Without `max_pages`
    /// a provider that keeps returning full pages with a token is followed
    /// forever.
    pub async fn collect(
        &self,
        provider: &dyn Provider,
        fan_id: u64,
        initial: PageToken,
    ) -> Result<Vec<ListedRecord>> {
        let mut token = initial;
        let mut records: Vec<ListedRecord> = Vec::new();
        let mut batch = 0usize;

        loop {
            batch += 1;
            if let Some(max) = self.max_pages {
                if batch > max {
                    bail!("listing did not end within {} pages", max);
                }
            }
            debug!("Fetching {} batch {} with token {:?}", self.listing.endpoint(), batch, token.as_str());
            let raw = provider.list_page(self.listing, fan_id, &token, self.page_size).await?;
            let page = ListPage::parse(&raw)?;
            let last = page.is_last(self.page_size);
            debug!("Batch {} returned {} records", batch, page.items.len());
            records.extend(page.items);

            match page.last_token {
                Some(next) if !last => token = next,
                _ => break,
            }
        }

        info!(
            "Collected {} records from {} in {} batches",
            records.len(),
            self.listing.endpoint(),
            batch
        );
        Ok(records)
    }

    /// Whether a record becomes a task. The full collection listing only
    /// yields items that are not already hidden.
    pub fn wants(&self, record: &ListedRecord) -> bool {
        match self.listing {
            Listing::Collection => !record.is_hidden(),
            Listing::Hidden => true,
        }
    }
}
