//! Bulk run orchestration: collect tasks, dispatch them, report progress.

use crate::api::{Listing, Provider};
use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::executor::{DispatchPolicy, Executor, ItemOutcome};
use crate::models::{currency_minimum, Action, CartAddRequest, CartItem, PageToken, TaskItem};
use crate::pagination::Collector;
use crate::protocol::{Command, ImportInput, Outbound};
use crate::state::{Operation, OperationState};
use anyhow::{anyhow, bail, Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Construction-time settings of one engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub base_url: String,
    pub page_size: usize,
    pub max_pages: Option<usize>,
    /// Policy for hide/unhide runs.
    pub collection_policy: DispatchPolicy,
    /// Policy for cart imports.
    pub import_policy: DispatchPolicy,
    pub retain_errors: Option<usize>,
}

impl EngineOptions {
    /// Hide/unhide fired all at once over 100-item pages.
    pub fn from_config(cfg: &Config) -> Self {
        EngineOptions {
            base_url: cfg.base_url.clone(),
            page_size: cfg.page_size,
            max_pages: cfg.max_pages,
            collection_policy: cfg.collection_policy(),
            import_policy: cfg.import_policy(),
            retain_errors: cfg.max_retained_errors,
        }
    }

    /// One request at a time with a pause in between, over 20-item pages.
    pub fn legacy(cfg: &Config) -> Self {
        EngineOptions {
            page_size: cfg.legacy_page_size,
            collection_policy: cfg.legacy_policy(),
            ..Self::from_config(cfg)
        }
    }
}

/// Input to one import task before resolution.
#[derive(Debug, Clone)]
enum ImportSource {
    Item(CartItem),
    Url(String),
}

/// One engine per connection. Owns the run state; nothing is shared
/// between connections.
pub struct BulkEngine {
    provider: Arc<dyn Provider>,
    options: EngineOptions,
    state: OperationState,
    broadcaster: Broadcaster,
}

impl BulkEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        options: EngineOptions,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        let state = OperationState::idle(Operation::default(), options.retain_errors);
        let broadcaster = Broadcaster::new(outbound, state.clone());
        Self { provider, options, state, broadcaster }
    }

    /// Last known state. Reading it has no side effects.
    pub fn state(&self) -> &OperationState {
        &self.state
    }

    /// Follows every snapshot the engine broadcasts, including mid-run ones.
    pub fn watch_state(&self) -> watch::Receiver<OperationState> {
        self.broadcaster.watch()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::StartBulkImport(input) => self.import(input).await,
            Command::StartBulkHide { crumb } => self.hide_all(crumb).await,
            Command::StartBulkUnhide { crumb } => self.unhide_all(crumb).await,
            Command::QueryState => self.broadcaster.send(Outbound::State(self.state.clone())),
        }
    }

    /// Hide every visible item in the collection.
    pub async fn hide_all(&mut self, crumb: Option<String>) {
        self.collection_run(Action::Hide, crumb).await
    }

    /// Unhide every hidden item.
    pub async fn unhide_all(&mut self, crumb: Option<String>) {
        self.collection_run(Action::Unhide, crumb).await
    }

    pub async fn import(&mut self, input: ImportInput) {
        let (operation, sources): (Operation, Vec<ImportSource>) = match input {
            ImportInput::Items(items) => {
                (Operation::Import, items.into_iter().map(ImportSource::Item).collect())
            }
            ImportInput::Urls(urls) => {
                (Operation::UrlImport, urls.into_iter().map(ImportSource::Url).collect())
            }
        };
        let span = info_span!("bulk_run", run_id = %Uuid::new_v4(), operation = ?operation);
        async {
            info!("Starting {:?} with {} inputs", operation, sources.len());
            let provider = self.provider.clone();
            let base_url = self.options.base_url.clone();
            let policy = self.options.import_policy;
            let attempt = move |source: ImportSource| {
                let provider = provider.clone();
                let base_url = base_url.clone();
                async move { attempt_import(provider.as_ref(), &base_url, source).await }
            };
            self.execute(operation, policy, sources, attempt).await;
        }
        .instrument(span)
        .await
    }

    async fn collection_run(&mut self, action: Action, crumb: Option<String>) {
        let operation = if action == Action::Hide { Operation::Hide } else { Operation::Unhide };
        let span = info_span!("bulk_run", run_id = %Uuid::new_v4(), operation = ?operation);
        async {
            info!("Starting {} all process", action.as_str());
            let tasks = match self.collect_tasks(action, crumb).await {
                Ok(t) => t,
                Err(e) => {
                    error!("Error in {} process: {:#}", action.as_str(), e);
                    self.broadcaster.fatal(format!("{:#}", e));
                    return;
                }
            };
            info!("Found total of {} items to {}", tasks.len(), action.as_str());

            let provider = self.provider.clone();
            let policy = self.options.collection_policy;
            let attempt = move |task: TaskItem| {
                let provider = provider.clone();
                async move { attempt_collection(provider.as_ref(), task).await }
            };
            self.execute(operation, policy, tasks, attempt).await;
        }
        .instrument(span)
        .await
    }

    /// Resolve the fan id and page through the right listing.
    async fn collect_tasks(&self, action: Action, crumb: Option<String>) -> Result<Vec<TaskItem>> {
        let summary = self
            .provider
            .collection_summary()
            .await
            .context("Failed to get collection summary")?;
        let fan_id = summary.fan_id;
        info!("Got fan_id: {}", fan_id);

        let listing = if action == Action::Hide { Listing::Collection } else { Listing::Hidden };
        let collector = Collector::new(listing, self.options.page_size).with_max_pages(self.options.max_pages);
        let records = collector
            .collect(self.provider.as_ref(), fan_id, PageToken::now())
            .await
            .with_context(|| format!("Failed to fetch {}", listing.endpoint().replace('_', " ")))?;

        Ok(records
            .iter()
            .filter(|r| collector.wants(r))
            .map(|r| TaskItem::collection(fan_id, r, action, crumb.clone(), &self.options.base_url))
            .collect())
    }

    /// Shared tail of every run: Running snapshot, dispatch, Complete.
    async fn execute<T, F, Fut>(&mut self, operation: Operation, policy: DispatchPolicy, tasks: Vec<T>, attempt: F)
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = ItemOutcome>,
    {
        if tasks.is_empty() {
            info!("Nothing to do for {:?}", operation);
            self.broadcaster.complete(OperationState::empty_message(operation));
            return;
        }

        self.state.begin(operation, tasks.len());
        info!("Starting to process {:?} operation with {} items", operation, tasks.len());
        self.broadcaster.snapshot(&self.state);

        let state = &mut self.state;
        let broadcaster = &self.broadcaster;
        Executor::new(policy)
            .run(tasks, attempt, |outcome| {
                state.record(outcome);
                broadcaster.snapshot(state);
            })
            .await;

        self.state.finish();
        info!(
            "Finished processing {:?} operation. Processed: {}, Errors: {}",
            operation, self.state.processed_count, self.state.error_count
        );
        self.broadcaster.snapshot(&self.state);
        self.broadcaster.complete(self.state.completion_message());
    }
}

async fn attempt_collection(provider: &dyn Provider, task: TaskItem) -> ItemOutcome {
    let verb = task.action.as_str();
    let fan_id = task.fan_id.unwrap_or_default();
    info!("{} item {} ({})", task.action.gerund(), task.item_id, task.item_type.as_str());
    match provider
        .hide_unhide(task.action, fan_id, task.item_type, task.item_id, task.crumb.as_deref())
        .await
    {
        Ok(true) => {
            info!("Successfully {} item {}", task.action.past(), task.item_id);
            Ok(())
        }
        Ok(false) => {
            let line = format!("Failed to {} item {} - API returned false", verb, task.item_id);
            error!("{}", line);
            Err(line)
        }
        Err(e) => {
            let line = format!("Error {} item {}: {}", task.action.gerund(), task.item_id, e);
            error!("{}", line);
            Err(line)
        }
    }
}

async fn attempt_import(provider: &dyn Provider, base_url: &str, source: ImportSource) -> ItemOutcome {
    let (kind, label) = match &source {
        ImportSource::Item(i) => ("item", i.item_id.to_string()),
        ImportSource::Url(u) => ("URL", u.clone()),
    };
    let result: Result<()> = async {
        let item = match source {
            ImportSource::Item(item) => item,
            ImportSource::Url(url) => {
                info!("Extracting info from URL: {}", url);
                provider.tralbum_details_from_page(&url).await?.into()
            }
        };
        let request = resolve_cart_request(provider, TaskItem::cart(item, base_url)).await?;
        info!("Sending cart add request for item {} with price {}", request.item_id, request.unit_price);
        if !provider.add_to_cart(&request).await? {
            bail!("Failed to add \"{}\" to cart", request.item_title);
        }
        Ok(())
    }
    .await;

    result.map_err(|e| {
        let line = format!("Error processing {} {}: {}", kind, label, e);
        error!("{}", line);
        line
    })
}

/// Price a cart task. A task that already carries a price goes straight
/// through without a detail lookup.
pub async fn resolve_cart_request(provider: &dyn Provider, task: TaskItem) -> Result<CartAddRequest> {
    let cart = task
        .cart
        .ok_or_else(|| anyhow!("task {} has no cart metadata", task.item_id))?;
    let unit_price = match task.unit_price {
        Some(p) => p,
        None => {
            info!("Fetching full details for item {} ({})", task.item_id, task.item_type.code());
            let details = provider.tralbum_details(task.item_id, task.item_type).await?;
            if !details.is_purchasable {
                bail!("Item \"{}\" is not purchasable", cart.item_title);
            }
            if details.price > 0.0 {
                details.price
            } else {
                currency_minimum(&cart.currency)
                    .ok_or_else(|| anyhow!("no minimum price known for currency {}", cart.currency))?
            }
        }
    };
    Ok(CartAddRequest {
        item_id: task.item_id,
        item_type: task.item_type,
        item_title: cart.item_title,
        band_name: cart.band_name,
        unit_price,
        currency: cart.currency,
        url: cart.url,
    })
}
