//! Local checks applied before a write leaves the client.

use crate::domain::error::ValidationError;

/// Character limits for user-authored text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLimits {
    pub post: usize,
    pub comment: usize,
}

impl TextLimits {
    /// Limit for top-level posts when `is_reply` is false, for comments and
    /// responses otherwise.
    pub fn for_reply(&self, is_reply: bool) -> usize {
        if is_reply { self.comment } else { self.post }
    }
}

/// Reject empty content and text over `limit` characters.
pub fn validate_content(
    text: &str,
    media_count: usize,
    limit: usize,
) -> Result<(), ValidationError> {
    if text.trim().is_empty() && media_count == 0 {
        return Err(ValidationError::Empty);
    }

    let length = text.chars().count();
    if length > limit {
        return Err(ValidationError::too_long(length, limit));
    }

    Ok(())
}
