//! Engine configuration.
//!
//! Text limits, the revision cache size and the page size used by the CLI.

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::domain::validation::TextLimits;

const DEFAULT_MAX_POST_CHARS: usize = 512;
const DEFAULT_MAX_COMMENT_CHARS: usize = 256;
const DEFAULT_HISTORY_LIMIT: usize = 64;
const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum characters in a top-level post.
    pub max_post_chars: usize,
    /// Maximum characters in a comment or response.
    pub max_comment_chars: usize,
    /// Folded revision histories kept in memory.
    pub history_limit: usize,
    /// Server page size, used to decide when a short page ends a list.
    pub page_size: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_post_chars: DEFAULT_MAX_POST_CHARS,
            max_comment_chars: DEFAULT_MAX_COMMENT_CHARS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            max_post_chars: settings.max_post_chars,
            max_comment_chars: settings.max_comment_chars,
            history_limit: settings.history_limit,
            page_size: settings.page_size,
        }
    }
}

impl CacheConfig {
    pub fn text_limits(&self) -> TextLimits {
        TextLimits {
            post: self.max_post_chars,
            comment: self.max_comment_chars,
        }
    }

    /// Returns the history limit as NonZeroUsize, clamping to 1 if zero.
    pub fn history_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.history_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
