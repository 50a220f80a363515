//! Race-free state management for remote, paginated collections.
//!
//! This crate sits between a [`FetchClient`](skein_api::FetchClient) and
//! whatever renders the data:
//!
//! - **[`Collection`]**: one remote list with its state, a request
//!   coordinator, and a view onto the shared result cache. Identity
//!   changes (`url`, query string, POST body, `refresh`) trigger a fetch;
//!   only the most recently issued fetch may write to state.
//!
//! - **[`UpdateAction`]**: the declarative update protocol. Every state
//!   transition, network-driven or local, is folded in by
//!   [`apply_action`].
//!
//! - **[`CacheStore`]** / **[`MemoryCache`]**: process-lifetime response
//!   cache with per-collection TTL and lazy eviction. Injected, so tests
//!   can use an isolated instance.
//!
//! - **[`ApiRequest`]**: the one-shot sibling for non-collection calls.
//!
//! - **[`CollectionStream`]**: subscription handle for observing state.

pub mod cache;
pub mod collection;
mod coordinator;
pub mod request;
pub mod state;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{CacheEntry, CachePolicy, CacheStore, DEFAULT_CACHE_TTL, MemoryCache, cache_key};
pub use collection::{
    Collection, CollectionBuilder, CollectionOptions, DataLoadedFn, ErrorFn, Item, TransformFn,
};
pub use request::{ApiRequest, ApiRequestBuilder, RequestFn, RequestState};
pub use state::{CollectionState, RequestIdentity, UpdateAction, apply_action};
pub use stream::{CollectionStream, CollectionWatchStream};

pub use skein_api::{Envelope, Error, FetchClient, FetchFuture, Pagination, Summary};
