// skein-api: async fetch client and typed response envelope for remote collections

pub mod client;
pub mod envelope;
pub mod error;
pub mod transport;

pub use client::{FetchClient, FetchFuture, HttpClient};
pub use envelope::{Envelope, Pagination, ResponseBody, Summary};
pub use error::{Error, FALLBACK_MESSAGE};
pub use transport::{TlsMode, TransportConfig};
