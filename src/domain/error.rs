use thiserror::Error;

/// Local validation failures, raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a post needs text or at least one attachment")]
    Empty,
    #[error("text is {length} characters long; the limit is {limit}")]
    TooLong { length: usize, limit: usize },
    #[error("a response must name the comment thread it belongs to")]
    OrphanResponse,
    #[error("edit does not change any field")]
    NoChanges,
    #[error("post `{0}` is deleted")]
    Deleted(uuid::Uuid),
    #[error("rejected by server: {0}")]
    Rejected(String),
}

impl ValidationError {
    pub fn too_long(length: usize, limit: usize) -> Self {
        Self::TooLong { length, limit }
    }
}
