// ── Remote collection ──
//
// Owns one collection's state, its request coordinator, and its view of
// the shared result cache. Identity changes (url, query, body, reload)
// flow through `update_collection`, which triggers a fetch when the
// identity moved. Fetch results are applied only if still current.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use skein_api::{Envelope, Error, FetchClient};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::cache::{CachePolicy, CacheStore, DEFAULT_CACHE_TTL, MemoryCache, cache_key};
use crate::coordinator::{Coordinator, RequestTicket};
use crate::state::{CollectionState, UpdateAction, apply_action};
use crate::stream::CollectionStream;

/// Called with the decoded, pre-transform items after every successful
/// fetch or cache hit.
pub type DataLoadedFn<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

/// Called with the original error after every failed fetch.
pub type ErrorFn = Arc<dyn Fn(&Error) + Send + Sync>;

/// Maps decoded items before they are stored.
pub type TransformFn<T> = Arc<dyn Fn(Vec<T>) -> Vec<T> + Send + Sync>;

/// Bounds every collection item type satisfies.
pub trait Item: DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T: DeserializeOwned + Clone + Send + Sync + 'static> Item for T {}

// ── Options ──────────────────────────────────────────────────────────

/// Per-collection configuration.
pub struct CollectionOptions<T> {
    pub default_query_string: Option<String>,
    pub post_data: Option<Value>,
    pub transform_data: Option<TransformFn<T>>,
    pub on_data_loaded: Option<DataLoadedFn<T>>,
    pub on_error: Option<ErrorFn>,
    /// Fetch on first activation when the url is non-empty.
    pub auto_fetch: bool,
    /// Serve reads from the result cache.
    pub enable_cache: bool,
    pub cache_duration: Duration,
}

impl<T> Default for CollectionOptions<T> {
    fn default() -> Self {
        Self {
            default_query_string: None,
            post_data: None,
            transform_data: None,
            on_data_loaded: None,
            on_error: None,
            auto_fetch: true,
            enable_cache: false,
            cache_duration: DEFAULT_CACHE_TTL,
        }
    }
}

impl<T> fmt::Debug for CollectionOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("default_query_string", &self.default_query_string)
            .field("post_data", &self.post_data)
            .field("transform_data", &self.transform_data.is_some())
            .field("on_data_loaded", &self.on_data_loaded.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("auto_fetch", &self.auto_fetch)
            .field("enable_cache", &self.enable_cache)
            .field("cache_duration", &self.cache_duration)
            .finish()
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Builder for [`Collection`].
pub struct CollectionBuilder<T> {
    url: String,
    client: Arc<dyn FetchClient>,
    cache_store: Option<Arc<dyn CacheStore>>,
    options: CollectionOptions<T>,
}

impl<T: Item> CollectionBuilder<T> {
    pub fn query_string(mut self, query: impl Into<String>) -> Self {
        self.options.default_query_string = Some(query.into());
        self
    }

    pub fn post_data(mut self, body: Value) -> Self {
        self.options.post_data = Some(body);
        self
    }

    pub fn transform_data(mut self, f: impl Fn(Vec<T>) -> Vec<T> + Send + Sync + 'static) -> Self {
        self.options.transform_data = Some(Arc::new(f));
        self
    }

    pub fn on_data_loaded(mut self, f: impl Fn(&[T]) + Send + Sync + 'static) -> Self {
        self.options.on_data_loaded = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.options.on_error = Some(Arc::new(f));
        self
    }

    pub fn auto_fetch(mut self, enabled: bool) -> Self {
        self.options.auto_fetch = enabled;
        self
    }

    pub fn enable_cache(mut self, enabled: bool) -> Self {
        self.options.enable_cache = enabled;
        self
    }

    pub fn cache_duration(mut self, ttl: Duration) -> Self {
        self.options.cache_duration = ttl;
        self
    }

    /// Use an explicit cache store instead of the process-wide one.
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: CollectionOptions<T>) -> Self {
        self.options = options;
        self
    }

    /// Build the collection without fetching. Call
    /// [`activate`](Collection::activate) to run the initial auto-fetch.
    pub fn build(self) -> Collection<T> {
        let store = self.cache_store.unwrap_or_else(global_store);
        let cache = CachePolicy::new(
            store,
            self.options.enable_cache,
            self.options.cache_duration,
        );
        let (state, _) = watch::channel(CollectionState::new(
            self.url,
            self.options.default_query_string.clone(),
            self.options.post_data.clone(),
        ));

        Collection {
            inner: Arc::new(CollectionInner {
                client: self.client,
                cache,
                options: self.options,
                coordinator: Coordinator::new(),
                state,
                activated: AtomicBool::new(false),
            }),
        }
    }
}

// ── Collection ───────────────────────────────────────────────────────

/// A remote, paginated list with race-free fetch coordination.
///
/// Cheaply cloneable; clones share state. Only the most recently issued
/// fetch can write to state, and nothing is written after
/// [`unmount`](Self::unmount).
pub struct Collection<T> {
    inner: Arc<CollectionInner<T>>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CollectionInner<T> {
    client: Arc<dyn FetchClient>,
    cache: CachePolicy,
    options: CollectionOptions<T>,
    coordinator: Coordinator,
    state: watch::Sender<CollectionState<T>>,
    activated: AtomicBool,
}

/// A fetch that missed the cache and still has to hit the network.
struct PendingFetch {
    ticket: RequestTicket,
    full_url: String,
    cache_key: String,
    post_data: Option<Value>,
}

impl<T: Item> Collection<T> {
    pub fn builder(client: Arc<dyn FetchClient>, url: impl Into<String>) -> CollectionBuilder<T> {
        CollectionBuilder {
            url: url.into(),
            client,
            cache_store: None,
            options: CollectionOptions::default(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// First activation: fetch if `auto_fetch` is on and the url is set.
    /// Later calls are no-ops.
    pub fn activate(&self) -> Option<JoinHandle<()>> {
        if self.inner.activated.swap(true, Ordering::AcqRel) {
            return None;
        }
        if !self.inner.options.auto_fetch {
            return None;
        }
        self.trigger_fetch()
    }

    /// Stop accepting results. Any pending fetch is cancelled and its
    /// completion, whenever it comes, changes nothing.
    pub fn unmount(&self) {
        debug!(url = %self.inner.state.borrow().url, "unmounting collection");
        self.inner.coordinator.unmount();
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.coordinator.is_mounted()
    }

    // ── Observation ──────────────────────────────────────────────

    /// Clone of the current state.
    pub fn snapshot(&self) -> CollectionState<T> {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> CollectionStream<T> {
        CollectionStream::new(self.inner.state.subscribe())
    }

    pub fn cache(&self) -> &CachePolicy {
        &self.inner.cache
    }

    // ── Update protocol ──────────────────────────────────────────

    /// Merge a literal action into state. Returns the spawned fetch if the
    /// update changed the request identity.
    pub fn update_collection(&self, action: UpdateAction<T>) -> Option<JoinHandle<()>> {
        self.update_collection_with(|_| action)
    }

    /// Merge an action computed from the current state.
    ///
    /// `f` runs while state is locked; it must not call back into this
    /// collection.
    pub fn update_collection_with(
        &self,
        f: impl FnOnce(&CollectionState<T>) -> UpdateAction<T>,
    ) -> Option<JoinHandle<()>> {
        let identity_changed = self.inner.coordinator.while_mounted(|| {
            let mut changed = false;
            self.inner.state.send_modify(|state| {
                let before = state.identity();
                let action = f(state);
                apply_action(state, action);
                changed = state.identity() != before;
            });
            changed
        })?;

        if identity_changed {
            self.trigger_fetch()
        } else {
            None
        }
    }

    /// Refetch the current identity, bypassing nothing but the version.
    pub fn refresh(&self) -> Option<JoinHandle<()>> {
        self.update_collection(UpdateAction::new().reload())
    }

    pub fn set_url(&self, url: impl Into<String>) -> Option<JoinHandle<()>> {
        self.update_collection(UpdateAction::new().with_url(url))
    }

    pub fn set_query_string(&self, query: Option<String>) -> Option<JoinHandle<()>> {
        self.update_collection(UpdateAction::new().with_query_string(query))
    }

    pub fn set_post_data(&self, body: Option<Value>) -> Option<JoinHandle<()>> {
        self.update_collection(UpdateAction::new().with_post_data(body))
    }

    pub fn clear_error(&self) {
        self.update_collection(UpdateAction::new().with_error(None));
    }

    // ── Local mutation ───────────────────────────────────────────
    //
    // Local-only edits. The cache entry for the current identity is left
    // alone, so the next refresh restores server truth.

    /// Append an item.
    pub fn add_item(&self, item: T) {
        self.update_collection_with(|state| {
            let mut items = state.items.clone();
            items.push(item);
            UpdateAction::new().with_items(items)
        });
    }

    /// Drop every item matching `predicate`. Returns how many were removed.
    pub fn remove_item(&self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let mut removed = 0;
        self.update_collection_with(|state| {
            let before = state.items.len();
            let items: Vec<T> = state.items.iter().filter(|&item| !predicate(item)).cloned().collect();
            removed = before - items.len();
            UpdateAction::new().with_items(items)
        });
        removed
    }

    /// Apply `patch` to every item matching `predicate`. Returns how many
    /// were updated.
    pub fn update_item(
        &self,
        mut predicate: impl FnMut(&T) -> bool,
        mut patch: impl FnMut(&mut T),
    ) -> usize {
        let mut updated = 0;
        self.update_collection_with(|state| {
            let mut items = state.items.clone();
            for item in &mut items {
                if predicate(item) {
                    patch(item);
                    updated += 1;
                }
            }
            UpdateAction::new().with_items(items)
        });
        updated
    }

    // ── Request coordination ─────────────────────────────────────

    /// Fetch the current identity in the background.
    ///
    /// Returns `None` when nothing needs awaiting: the url is empty, the
    /// collection is unmounted, or the cache answered synchronously.
    pub fn trigger_fetch(&self) -> Option<JoinHandle<()>> {
        let pending = self.begin_fetch()?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.run_fetch(pending).await }))
    }

    /// Fetch the current identity and wait for it to settle.
    pub async fn fetch(&self) {
        if let Some(pending) = self.begin_fetch() {
            self.run_fetch(pending).await;
        }
    }

    /// Synchronous half of a fetch: supersede, consult the cache, and mark
    /// loading on a miss.
    fn begin_fetch(&self) -> Option<PendingFetch> {
        let identity = self.inner.state.borrow().identity();
        if identity.url.trim().is_empty() {
            trace!("skipping fetch: empty url");
            // Whatever was in flight belongs to the previous identity.
            let ticket = self.inner.coordinator.begin()?;
            self.commit(&ticket, UpdateAction::new().with_loading(false));
            self.inner.coordinator.settle(&ticket);
            return None;
        }

        let ticket = self.inner.coordinator.begin()?;
        let full_url = identity.full_url();
        let key = cache_key(&full_url, identity.post_data.as_ref());

        if let Some(entry) = self.inner.cache.lookup(&key) {
            trace!(key = %key, "cache hit");
            self.apply_success(&ticket, &entry.envelope);
            self.inner.coordinator.settle(&ticket);
            return None;
        }

        self.commit(
            &ticket,
            UpdateAction::new().with_loading(true).with_error(None),
        )?;

        Some(PendingFetch {
            ticket,
            full_url,
            cache_key: key,
            post_data: identity.post_data,
        })
    }

    async fn run_fetch(&self, pending: PendingFetch) {
        let PendingFetch {
            ticket,
            full_url,
            cache_key,
            post_data,
        } = pending;

        if !self.inner.coordinator.is_current(&ticket) {
            trace!(generation = ticket.generation(), "superseded before dispatch");
            return;
        }

        debug!(
            url = %full_url,
            write = post_data.is_some(),
            generation = ticket.generation(),
            "fetching collection"
        );

        let client = &self.inner.client;
        let result = match post_data {
            Some(ref body) => client.post(&full_url, body, ticket.cancel_token()).await,
            None => client.get(&full_url, ticket.cancel_token()).await,
        };

        match result {
            Ok(envelope) => {
                self.inner.cache.write(cache_key, envelope.clone());
                self.apply_success(&ticket, &envelope);
            }
            Err(err) if err.is_cancelled() => {
                trace!(generation = ticket.generation(), "fetch cancelled");
            }
            Err(err) => self.apply_failure(&ticket, &err),
        }

        self.inner.coordinator.settle(&ticket);
    }

    fn apply_success(&self, ticket: &RequestTicket, envelope: &Envelope) {
        let raw = match decode_items::<T>(&envelope.data) {
            Ok(raw) => raw,
            Err(err) => return self.apply_failure(ticket, &err),
        };

        let options = &self.inner.options;
        let loaded_payload = options.on_data_loaded.as_ref().map(|_| raw.clone());
        let items = match options.transform_data {
            Some(ref transform) => transform(raw),
            None => raw,
        };

        let mut action = UpdateAction::new()
            .with_items(items)
            .with_loaded(true)
            .with_loading(false)
            .with_error(None);
        if let Some(ref pagination) = envelope.pagination {
            action = action.with_pagination(pagination.clone());
        }
        if let Some(ref summary) = envelope.summary {
            action = action.with_summary(summary.clone());
        }

        if self.commit(ticket, action).is_none() {
            return;
        }

        if let (Some(callback), Some(raw)) = (&options.on_data_loaded, loaded_payload) {
            callback(&raw);
        }
    }

    fn apply_failure(&self, ticket: &RequestTicket, err: &Error) {
        let message = err.user_message();
        let applied = self.commit(
            ticket,
            UpdateAction::new()
                .with_loading(false)
                .with_error(Some(message)),
        );
        if applied.is_none() {
            return;
        }

        warn!(error = %err, "collection fetch failed");
        if let Some(ref callback) = self.inner.options.on_error {
            callback(err);
        }
    }

    /// Apply `action` if `ticket` is still current.
    fn commit(&self, ticket: &RequestTicket, action: UpdateAction<T>) -> Option<()> {
        self.inner.coordinator.with_current(ticket, || {
            self.inner
                .state
                .send_modify(|state| apply_action(state, action));
        })
    }
}

fn global_store() -> Arc<dyn CacheStore> {
    MemoryCache::global()
}

fn decode_items<T: DeserializeOwned>(data: &[Value]) -> Result<Vec<T>, Error> {
    data.iter()
        .map(|value| {
            serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
                message: format!("failed to decode collection item: {e}"),
                body: value.to_string(),
            })
        })
        .collect()
}
