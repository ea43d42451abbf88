//! Concurrent search machinery.
//!
//! - [`Dispatcher`] fans a query out to every selected backend under one
//!   deadline and always returns one outcome per backend.
//! - [`DetailFetchQueue`] expands listing pages into detail-page items with a
//!   bounded number of concurrent fetches.
//! - [`aggregate`] merges outcomes and decides between partial success and
//!   total failure.

mod aggregator;
mod detail_queue;
mod dispatcher;
mod fingerprint;
mod service;

pub use aggregator::{aggregate, SearchError};
pub use detail_queue::{DetailFetchQueue, Extractor, PageFetcher};
pub use dispatcher::Dispatcher;
pub use fingerprint::FingerprintSet;
pub use service::SearchService;
