//! Application services: fetching, mutating and the engine facade.

pub mod api;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod pipeline;
