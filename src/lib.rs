//! Client-side cache consistency engine for a social feed.
//!
//! Posts live once in a normalized store and are projected into paginated
//! views. Mutations patch every cached copy optimistically and undo exactly
//! those patches when the server rejects them.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
