//! # reqwest-proxy-fetch
//!
//! A resilient proxy-rotating download core for reqwest.
//!
//! This library performs HTTP downloads for a crawler while rotating through
//! a bounded LIFO pool of upstream proxies with per-proxy reuse caps,
//! retrying failed attempts with multiplicative backoff, and bounding every
//! attempt with a cancellable timeout.

pub mod config;
pub mod downloader;
pub mod error;
pub mod pool;
pub mod proxy;
pub mod request;
pub mod retry;
pub mod source;

pub use config::{DownloaderConfig, DownloaderConfigBuilder};
pub use downloader::Downloader;
pub use error::FetchError;
pub use pool::ProxyPool;
pub use proxy::ProxyRecord;
pub use request::{FetchOptions, FetchRequest, FetchResponse, RequestForm};
pub use retry::Retrier;
pub use source::{Candidate, HttpProxySource, ProxySource};
