// Response envelope types
//
// Collection endpoints answer `{ "data": [...], "pagination": {...},
// "summary": {...} }`. Some older endpoints answer with a bare array.
// Both are decoded here, once, into `Envelope`; nothing downstream
// re-inspects the raw body shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ── Pagination ──────────────────────────────────────────────────────

/// Paging metadata. Every field stays `None` until a response supplies it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub current_page: Option<u64>,
    #[serde(default)]
    pub standard_page_size: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u64>,
    #[serde(default)]
    pub total_items: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
}

impl Pagination {
    /// Overlay `newer` onto `self`. Fields absent in `newer` keep their
    /// current value.
    pub fn merge(&mut self, newer: &Pagination) {
        self.current_page = newer.current_page.or(self.current_page);
        self.standard_page_size = newer.standard_page_size.or(self.standard_page_size);
        self.total_pages = newer.total_pages.or(self.total_pages);
        self.total_items = newer.total_items.or(self.total_items);
        self.per_page = newer.per_page.or(self.per_page);
    }
}

// ── Summary ─────────────────────────────────────────────────────────

/// Aggregate counters for a collection. Endpoints may add their own keys;
/// those land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub active_count: Option<u64>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Summary {
    /// Overlay `newer` onto `self`, key by key.
    pub fn merge(&mut self, newer: &Summary) {
        self.active_count = newer.active_count.or(self.active_count);
        self.total_count = newer.total_count.or(self.total_count);
        for (key, value) in &newer.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

// ── Envelope ────────────────────────────────────────────────────────

/// Canonical decoded response for a collection fetch.
///
/// Items are kept as raw JSON so a single cached response can serve
/// collections that decode into different item types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub summary: Option<Summary>,
}

/// Wire shapes accepted from the server.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Wrapped(Envelope),
    /// Compat: the body is the item array itself.
    Bare(Vec<Value>),
}

impl From<ResponseBody> for Envelope {
    fn from(body: ResponseBody) -> Self {
        match body {
            ResponseBody::Wrapped(envelope) => envelope,
            ResponseBody::Bare(data) => Envelope {
                data,
                pagination: None,
                summary: None,
            },
        }
    }
}

impl Envelope {
    /// Decode a raw response body into an envelope.
    pub fn from_body(body: &str) -> Result<Self, Error> {
        serde_json::from_str::<ResponseBody>(body)
            .map(Envelope::from)
            .map_err(|e| {
                let preview = body.char_indices().nth(200).map_or(body, |(i, _)| &body[..i]);
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body: body.to_owned(),
                }
            })
    }

    /// Convenience constructor for tests and in-process clients.
    pub fn from_items(data: Vec<Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}
