//! Cache storage.
//!
//! Entity store: the normalized post copies shared by identity views.
//! History store: folded revision timelines with LRU eviction.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use lru::LruCache;

use crate::domain::entities::{Post, PostId};
use crate::domain::history::Revision;

use super::config::CacheConfig;
use super::lock::mutex_lock;
use super::patch::{Patch, PostPatch};

const SOURCE: &str = "cache::store";

// ============================================================================
// Entity Store
// ============================================================================

/// Normalized `PostId -> Post` map.
///
/// Lives inside the engine's state cell; callers hold the write guard.
#[derive(Debug, Default)]
pub struct EntityStore {
    posts: HashMap<PostId, Post>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace with server truth.
    pub fn upsert(&mut self, post: Post) {
        self.posts.insert(post.id, post);
    }

    pub fn upsert_all(&mut self, posts: impl IntoIterator<Item = Post>) {
        for post in posts {
            self.upsert(post);
        }
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.get(id)
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.posts.contains_key(id)
    }

    /// Patch the stored copy. Returns the inverse, or `None` when absent.
    pub fn update(&mut self, id: &PostId, patch: &Patch) -> Option<PostPatch> {
        self.posts.get_mut(id).map(|post| patch.apply_to(post))
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Recency order used by every post list: newest first, id breaks ties.
pub fn recency_order(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

// ============================================================================
// History Store
// ============================================================================

/// Folded revision histories, least recently read evicted first.
pub struct HistoryStore {
    entries: Mutex<LruCache<PostId, Vec<Revision>>>,
}

impl HistoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.history_limit_non_zero())),
        }
    }

    pub fn get(&self, id: &PostId) -> Option<Vec<Revision>> {
        mutex_lock(&self.entries, SOURCE, "history_get")
            .get(id)
            .cloned()
    }

    pub fn set(&self, id: PostId, revisions: Vec<Revision>) {
        mutex_lock(&self.entries, SOURCE, "history_set").put(id, revisions);
    }

    /// Drop a timeline after its post changed.
    pub fn invalidate(&self, id: &PostId) {
        mutex_lock(&self.entries, SOURCE, "history_invalidate").pop(id);
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "history_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
