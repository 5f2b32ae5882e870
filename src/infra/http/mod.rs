//! HTTP adapter for the feed server.

mod client;

pub use client::HttpFeedApi;
