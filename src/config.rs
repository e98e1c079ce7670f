use crate::executor::DispatchPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Remote site the provider talks to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Only connections opened under this name are served.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    // Listing
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_legacy_page_size")]
    pub legacy_page_size: usize,
    /// Optional guard against a listing that never runs out of full pages.
    #[serde(default)]
    pub max_pages: Option<usize>,

    // Dispatch
    /// Upper bound on in-flight hide/unhide requests. Unset launches all at once.
    #[serde(default)]
    pub collection_concurrency: Option<usize>,
    #[serde(default = "default_legacy_unhide_delay")]
    pub legacy_unhide_delay_ms: u64,
    #[serde(default = "default_import_delay")]
    pub import_delay_ms: u64,
    #[serde(default = "default_mutation_min_interval")]
    pub mutation_min_interval_ms: u64,

    /// Keep only the most recent N error strings in progress snapshots.
    #[serde(default)]
    pub max_retained_errors: Option<usize>,
}

fn default_base_url() -> String {
    std::env::var("BANDCAMP_BASE_URL").unwrap_or_else(|_| "https://bandcamp.com".into())
}
fn default_channel_name() -> String { "bes".into() }
fn default_listen_addr() -> String { "127.0.0.1:8787".into() }
fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("collection-bulk"))
        .unwrap_or_else(|| PathBuf::from("/tmp/collection-bulk"))
}
fn default_page_size() -> usize { 100 }
fn default_legacy_page_size() -> usize { 20 }
fn default_legacy_unhide_delay() -> u64 { 2000 }
fn default_import_delay() -> u64 { 250 }
fn default_mutation_min_interval() -> u64 { 100 }

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: default_base_url(),
            channel_name: default_channel_name(),
            listen_addr: default_listen_addr(),
            log_dir: default_log_dir(),
            page_size: default_page_size(),
            legacy_page_size: default_legacy_page_size(),
            max_pages: None,
            collection_concurrency: None,
            legacy_unhide_delay_ms: default_legacy_unhide_delay(),
            import_delay_ms: default_import_delay(),
            mutation_min_interval_ms: default_mutation_min_interval(),
            max_retained_errors: None,
        }
    }
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 || self.legacy_page_size == 0 {
            anyhow::bail!("page sizes must be greater than zero");
        }
        if self.collection_concurrency == Some(0) {
            anyhow::bail!("collection_concurrency must be greater than zero when set");
        }
        if self.max_retained_errors == Some(0) {
            anyhow::bail!("max_retained_errors must be greater than zero when set");
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid base_url {}: {}", self.base_url, e))?;
        Ok(())
    }

    pub fn collection_policy(&self) -> DispatchPolicy {
        DispatchPolicy::Concurrent { limit: self.collection_concurrency }
    }

    pub fn legacy_policy(&self) -> DispatchPolicy {
        DispatchPolicy::SerialDelayed { delay: Duration::from_millis(self.legacy_unhide_delay_ms) }
    }

    pub fn import_policy(&self) -> DispatchPolicy {
        DispatchPolicy::SerialDelayed { delay: Duration::from_millis(self.import_delay_ms) }
    }
}
