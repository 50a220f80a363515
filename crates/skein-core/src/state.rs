// ── Collection state and the update protocol ──
//
// `CollectionState<T>` is what consumers observe. Every transition, local
// or network-driven, is expressed as an `UpdateAction<T>` and folded in by
// `apply_action`, so there is one set of merge rules for the whole crate.

use serde::Serialize;
use serde_json::Value;
use skein_api::{Pagination, Summary};

/// Externally visible state of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionState<T> {
    /// Server order, unless locally mutated.
    pub items: Vec<T>,
    /// A fetch or cache hit has landed since the last identity change.
    pub loaded: bool,
    /// A network fetch is in flight.
    pub loading: bool,
    pub error: Option<String>,
    pub pagination: Pagination,
    pub summary: Summary,
    pub url: String,
    pub query_string: Option<String>,
    /// Present means the fetch is write-shaped (POST), absent means read-shaped (GET).
    pub post_data: Option<Value>,
    /// Bumped by `reload` to force a refetch of an unchanged identity.
    pub version: u64,
}

impl<T> CollectionState<T> {
    pub(crate) fn new(url: String, query_string: Option<String>, post_data: Option<Value>) -> Self {
        Self {
            items: Vec::new(),
            loaded: false,
            loading: false,
            error: None,
            pagination: Pagination::default(),
            summary: Summary::default(),
            url,
            query_string,
            post_data,
            version: 0,
        }
    }

    /// The inputs that decide what gets fetched.
    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity {
            url: self.url.clone(),
            query_string: self.query_string.clone(),
            post_data: self.post_data.clone(),
            version: self.version,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Snapshot of the fields whose change triggers a refetch.
///
/// `post_data` compares structurally, so an equal body rebuilt from
/// scratch does not count as a change.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestIdentity {
    pub url: String,
    pub query_string: Option<String>,
    pub post_data: Option<Value>,
    pub version: u64,
}

impl RequestIdentity {
    /// `url` with `query_string` appended when non-empty.
    pub fn full_url(&self) -> String {
        let query = self
            .query_string
            .as_deref()
            .map(|q| q.trim_start_matches(['?', '&']))
            .unwrap_or_default();
        if query.is_empty() {
            return self.url.clone();
        }
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.url)
    }
}

// ── UpdateAction ─────────────────────────────────────────────────────

/// A declarative partial update. Unset fields leave state alone.
///
/// Double options (`error`, `query_string`, `post_data`) distinguish
/// "leave unchanged" (`None`) from "set to nothing" (`Some(None)`).
#[derive(Debug, Clone)]
pub struct UpdateAction<T> {
    pub items: Option<Vec<T>>,
    pub loaded: Option<bool>,
    pub loading: Option<bool>,
    pub error: Option<Option<String>>,
    pub pagination: Option<Pagination>,
    pub summary: Option<Summary>,
    pub url: Option<String>,
    pub query_string: Option<Option<String>>,
    pub post_data: Option<Option<Value>>,
    pub reload: bool,
}

impl<T> Default for UpdateAction<T> {
    fn default() -> Self {
        Self {
            items: None,
            loaded: None,
            loading: None,
            error: None,
            pagination: None,
            summary: None,
            url: None,
            query_string: None,
            post_data: None,
            reload: false,
        }
    }
}

impl<T> UpdateAction<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, items: Vec<T>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn with_loaded(mut self, loaded: bool) -> Self {
        self.loaded = Some(loaded);
        self
    }

    pub fn with_loading(mut self, loading: bool) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_summary(mut self, summary: Summary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_query_string(mut self, query_string: Option<String>) -> Self {
        self.query_string = Some(query_string);
        self
    }

    pub fn with_post_data(mut self, post_data: Option<Value>) -> Self {
        self.post_data = Some(post_data);
        self
    }

    pub fn reload(mut self) -> Self {
        self.reload = true;
        self
    }
}

/// Fold `action` into `state`.
///
/// Rules, in order:
/// 1. An explicit `loading` wins.
/// 2. Otherwise an identity change (url, query, body) or `reload` forces
///    `loading = false`; the refetch itself is started by the caller.
/// 3. An explicit `loaded` wins; otherwise it is kept while loading, reset
///    by an identity change, and kept for any other update.
/// 4. `pagination` and `summary` merge field by field.
/// 5. `items`, `error`, `url`, `query_string`, `post_data` replace.
/// 6. `reload` bumps `version`.
pub fn apply_action<T>(state: &mut CollectionState<T>, action: UpdateAction<T>) {
    let url_changed = action.url.as_ref().is_some_and(|url| *url != state.url);
    let query_changed = action
        .query_string
        .as_ref()
        .is_some_and(|query| *query != state.query_string);
    let body_changed = action
        .post_data
        .as_ref()
        .is_some_and(|body| *body != state.post_data);
    let refetch = url_changed || query_changed || body_changed || action.reload;

    let loading = match action.loading {
        Some(loading) => loading,
        None if refetch => false,
        None => state.loading,
    };

    let loaded = match action.loaded {
        Some(loaded) => loaded,
        None if loading => state.loaded,
        None => state.loaded && !refetch,
    };

    state.loading = loading;
    state.loaded = loaded;

    if let Some(ref pagination) = action.pagination {
        state.pagination.merge(pagination);
    }
    if let Some(ref summary) = action.summary {
        state.summary.merge(summary);
    }

    if let Some(items) = action.items {
        state.items = items;
    }
    if let Some(error) = action.error {
        state.error = error;
    }
    if let Some(url) = action.url {
        state.url = url;
    }
    if let Some(query_string) = action.query_string {
        state.query_string = query_string;
    }
    if let Some(post_data) = action.post_data {
        state.post_data = post_data;
    }

    if action.reload {
        state.version = state.version.wrapping_add(1);
    }
}
