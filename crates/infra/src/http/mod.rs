//! HTTP origin access

pub mod client;
pub mod fetcher;

pub use client::{HttpClient, HttpClientBuilder};
pub use fetcher::HttpFetcher;
