//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod history;
pub mod reaction;
pub mod validation;
