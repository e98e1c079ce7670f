use super::{Listing, Provider};
use crate::config::Config;
use crate::models::{
    Action, CartAddRequest, CollectionSummary, ItemType, PageDetails, PageToken, TralbumDetails,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;

const XHR_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
const MOBILE_USER_AGENT: &str = "Bandcamp/218977 CFNetwork/1399 Darwin/22.1.0";

static TRALBUM_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-tralbum="([^"]*)""#).expect("static regex"));

/// Provider backed by the site's private JSON endpoints.
///
/// Mutations (hide/unhide, cart add) are spaced at least `min_interval`
/// apart across all callers, which is what lets the engine fire every task
/// at once. A 429 reply is surfaced as an error and never retried.
pub struct BandcampProvider {
    client: Client,
    base_url: String,
    min_interval: Duration,
    last_mutation: tokio::sync::Mutex<Option<Instant>>,
}

impl BandcampProvider {
    pub fn new(base_url: impl Into<String>, min_interval: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            min_interval,
            last_mutation: tokio::sync::Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.base_url.clone(), Duration::from_millis(cfg.mutation_min_interval_ms))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Wait until `min_interval` has passed since the previous mutation.
    async fn pace(&self) {
        let mut last = self.last_mutation.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Pacing mutation request for {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Turn a non-success reply into an error, reporting rate limiting distinctly.
    async fn check(resp: Response, what: &str) -> Result<Response> {
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            warn!("{} rate limited (retry-after {:?})", what, retry_after);
            return Err(anyhow!("rate_limited: retry_after={:?}", retry_after));
        }
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed: {} => {}", what, status, txt));
        }
        Ok(resp)
    }
}

/// Undo the HTML attribute escaping applied to embedded JSON.
fn unescape_attr(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Pull item details out of an album/track page.
pub fn parse_page_details(html: &str, page_url: &str) -> Result<PageDetails> {
    let raw = TRALBUM_ATTR
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| anyhow!("no tralbum data found on {}", page_url))?;
    let j: Value = serde_json::from_str(&unescape_attr(raw.as_str()))
        .map_err(|e| anyhow!("parse tralbum data: {}", e))?;

    let id = j["id"]
        .as_u64()
        .or_else(|| j["current"]["id"].as_u64())
        .ok_or_else(|| anyhow!("tralbum data has no id"))?;
    let item_type = match j["item_type"].as_str() {
        Some("track") | Some("t") => ItemType::Track,
        Some("album") | Some("a") => ItemType::Album,
        other => return Err(anyhow!("unknown item type {:?}", other)),
    };
    Ok(PageDetails {
        id,
        item_type,
        title: j["current"]["title"].as_str().unwrap_or("").to_string(),
        tralbum_artist: j["artist"].as_str().unwrap_or("").to_string(),
        currency: j["currency"]
            .as_str()
            .or_else(|| j["current"]["currency"].as_str())
            .unwrap_or("USD")
            .to_string(),
        bandcamp_url: j["url"].as_str().unwrap_or(page_url).to_string(),
        price: j["current"]["minimum_price"].as_f64(),
    })
}

#[async_trait]
impl Provider for BandcampProvider {
    fn name(&self) -> &str {
        "bandcamp"
    }

    async fn collection_summary(&self) -> Result<CollectionSummary> {
        let resp = self
            .client
            .get(self.url("/api/fan/2/collection_summary"))
            .header(ACCEPT, XHR_ACCEPT)
            .header("x-requested-with", "XMLHttpRequest")
            .send()
            .await?;
        let resp = Self::check(resp, "collection summary").await?;
        let j: Value = resp.json().await?;
        let mut body = j.get("collection_summary").cloned().unwrap_or_else(|| j.clone());
        if body.get("fan_id").is_none() {
            if let (Some(obj), Some(id)) = (body.as_object_mut(), j.get("fan_id")) {
                obj.insert("fan_id".into(), id.clone());
            }
        }
        let summary: CollectionSummary =
            serde_json::from_value(body).map_err(|e| anyhow!("no fan_id in collection summary: {}", e))?;
        Ok(summary)
    }

    async fn list_page(
        &self,
        listing: Listing,
        fan_id: u64,
        token: &PageToken,
        count: usize,
    ) -> Result<Value> {
        let url = self.url(&format!("/api/fancollection/1/{}", listing.endpoint()));
        let body = json!({
            "fan_id": fan_id,
            "older_than_token": token.as_str(),
            "count": count,
        });
        let resp = self
            .client
            .post(&url)
            .header(ACCEPT, XHR_ACCEPT)
            .json(&body)
            .send()
            .await?;
        let resp = Self::check(resp, listing.endpoint()).await?;
        Ok(resp.json().await?)
    }

    async fn hide_unhide(
        &self,
        action: Action,
        fan_id: u64,
        item_type: ItemType,
        item_id: u64,
        crumb: Option<&str>,
    ) -> Result<bool> {
        self.pace().await;
        let mut form: Vec<(&str, String)> = vec![
            ("action", action.as_str().to_string()),
            ("fan_id", fan_id.to_string()),
            ("item_type", item_type.as_str().to_string()),
            ("item_id", item_id.to_string()),
        ];
        if let Some(c) = crumb {
            form.push(("crumb", c.to_string()));
        }
        let resp = self
            .client
            .post(self.url("/api/collectionowner/1/hide_unhide_item"))
            .header(ACCEPT, XHR_ACCEPT)
            .header("x-requested-with", "XMLHttpRequest")
            .form(&form)
            .send()
            .await?;
        let resp = Self::check(resp, "hide_unhide").await?;
        let j: Value = resp.json().await?;
        if let Some(err) = j.get("error") {
            debug!("hide_unhide {} refused: {}", item_id, err);
        }
        Ok(j["ok"].as_bool().unwrap_or(false))
    }

    async fn tralbum_details(&self, item_id: u64, item_type: ItemType) -> Result<TralbumDetails> {
        let body = json!({
            "tralbum_type": item_type.code(),
            "band_id": 12345,
            "tralbum_id": item_id,
        });
        let resp = self
            .client
            .post(self.url("/api/mobile/25/tralbum_details"))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, MOBILE_USER_AGENT)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            ));
        }
        Ok(resp.json().await?)
    }

    async fn tralbum_details_from_page(&self, url: &str) -> Result<PageDetails> {
        let parsed = url::Url::parse(url).map_err(|e| anyhow!("Invalid URL {}: {}", url, e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(anyhow!("Invalid URL {}: unsupported scheme", url));
        }
        let resp = self.client.get(parsed.as_str()).send().await?;
        let resp = Self::check(resp, "item page").await?;
        let html = resp.text().await?;
        parse_page_details(&html, url)
    }

    async fn add_to_cart(&self, request: &CartAddRequest) -> Result<bool> {
        self.pace().await;
        let form = [
            ("req", "add".to_string()),
            ("item_type", request.item_type.code().to_string()),
            ("item_id", request.item_id.to_string()),
            ("unit_price", request.unit_price.to_string()),
            ("quantity", "1".to_string()),
            ("sync_num", "1".to_string()),
        ];
        let resp = self
            .client
            .post(self.url("/cart/cb"))
            .header(ACCEPT, XHR_ACCEPT)
            .header("x-requested-with", "XMLHttpRequest")
            .form(&form)
            .send()
            .await?;
        let resp = Self::check(resp, "cart add").await?;
        let j: Value = resp.json().await.unwrap_or(Value::Null);
        Ok(j.get("error").is_none())
    }
}
