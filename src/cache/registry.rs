//! View registry.
//!
//! Owns every live accumulator and tracks which entity-store posts each view
//! displays, so a change to one post can be fanned out to every view showing
//! it. Embedded copies are not indexed here; `CacheState::plan_for` finds them
//! by scanning the embedding lists.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::domain::entities::PostId;

use super::keys::ViewKey;
use super::view::ViewEntry;

#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: HashMap<ViewKey, ViewEntry>,
    /// Maps posts to the views that display them
    post_to_views: HashMap<PostId, HashSet<ViewKey>>,
    /// Maps views to the posts they display
    view_to_posts: HashMap<ViewKey, HashSet<PostId>>,
    next_generation: u64,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ViewKey) -> Option<&ViewEntry> {
        self.views.get(key)
    }

    pub fn get_mut(&mut self, key: &ViewKey) -> Option<&mut ViewEntry> {
        self.views.get_mut(key)
    }

    pub fn contains(&self, key: &ViewKey) -> bool {
        self.views.contains_key(key)
    }

    /// Return the accumulator for `key`, creating an empty one if needed.
    pub fn ensure(&mut self, key: &ViewKey) -> &mut ViewEntry {
        match self.views.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.next_generation += 1;
                entry.insert(ViewEntry::new(key, self.next_generation))
            }
        }
    }

    /// Replace the accumulator with an empty one under a new generation.
    pub fn reset(&mut self, key: &ViewKey) -> Option<u64> {
        if !self.views.contains_key(key) {
            return None;
        }
        let generation = self.bump_generation();
        self.views.insert(key.clone(), ViewEntry::new(key, generation));
        self.unregister(key);
        Some(generation)
    }

    /// Drop the accumulator entirely.
    pub fn discard(&mut self, key: &ViewKey) -> bool {
        self.unregister(key);
        self.views.remove(key).is_some()
    }

    /// Recompute the posts `key` displays from its accumulator.
    pub fn reindex(&mut self, key: &ViewKey) {
        let posts = self
            .views
            .get(key)
            .map(ViewEntry::referenced_posts)
            .unwrap_or_default();
        self.register(key.clone(), posts);
    }

    /// Views displaying the entity-store copy of `post`.
    pub fn views_for_post(&self, post: &PostId) -> HashSet<ViewKey> {
        self.post_to_views.get(post).cloned().unwrap_or_default()
    }

    pub fn posts_for_view(&self, key: &ViewKey) -> HashSet<PostId> {
        self.view_to_posts.get(key).cloned().unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ViewKey> {
        self.views.keys()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn indexed_post_count(&self) -> usize {
        self.post_to_views.len()
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn register(&mut self, key: ViewKey, posts: HashSet<PostId>) {
        self.unregister(&key);
        for post in &posts {
            self.post_to_views
                .entry(*post)
                .or_default()
                .insert(key.clone());
        }
        if !posts.is_empty() {
            self.view_to_posts.insert(key, posts);
        }
    }

    fn unregister(&mut self, key: &ViewKey) {
        if let Some(posts) = self.view_to_posts.remove(key) {
            for post in posts {
                if let Some(keys) = self.post_to_views.get_mut(&post) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.post_to_views.remove(&post);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::cache::view::ViewData;

    fn with_posts(registry: &mut ViewRegistry, key: &ViewKey, ids: &[PostId]) {
        let entry = registry.ensure(key);
        if let ViewData::Posts(list) = &mut entry.data {
            for id in ids {
                list.insert(*id);
            }
        }
        registry.reindex(key);
    }

    #[test]
    fn reindex_and_lookup() {
        let mut registry = ViewRegistry::new();
        let post = Uuid::new_v4();

        with_posts(&mut registry, &ViewKey::HomeFeed, &[post]);
        with_posts(&mut registry, &ViewKey::Favorites, &[post]);

        let views = registry.views_for_post(&post);
        assert_eq!(views.len(), 2);
        assert!(views.contains(&ViewKey::HomeFeed));
        assert!(registry.posts_for_view(&ViewKey::Favorites).contains(&post));
    }

    #[test]
    fn single_post_view_indexes_itself() {
        let mut registry = ViewRegistry::new();
        let post = Uuid::new_v4();
        registry.ensure(&ViewKey::Post(post));
        registry.reindex(&ViewKey::Post(post));

        assert!(registry.views_for_post(&post).contains(&ViewKey::Post(post)));
    }

    #[test]
    fn embedded_lists_are_not_indexed() {
        let mut registry = ViewRegistry::new();
        let key = ViewKey::TagPosts("rust".to_string());
        registry.ensure(&key);
        registry.reindex(&key);
        assert_eq!(registry.indexed_post_count(), 0);
    }

    #[test]
    fn discard_cleans_up_mappings() {
        let mut registry = ViewRegistry::new();
        let post = Uuid::new_v4();
        with_posts(&mut registry, &ViewKey::HomeFeed, &[post]);

        assert!(registry.discard(&ViewKey::HomeFeed));
        assert_eq!(registry.view_count(), 0);
        assert_eq!(registry.indexed_post_count(), 0);
    }

    #[test]
    fn reset_bumps_generation_and_empties_view() {
        let mut registry = ViewRegistry::new();
        let post = Uuid::new_v4();
        with_posts(&mut registry, &ViewKey::HomeFeed, &[post]);
        let before = registry.ensure(&ViewKey::HomeFeed).generation;

        let after = registry.reset(&ViewKey::HomeFeed);
        assert!(after.is_some_and(|generation| generation > before));
        assert!(registry.views_for_post(&post).is_empty());
        assert!(registry.reset(&ViewKey::Favorites).is_none());
    }

    #[test]
    fn recreated_view_gets_a_fresh_generation() {
        let mut registry = ViewRegistry::new();
        let first = registry.ensure(&ViewKey::Favorites).generation;
        registry.discard(&ViewKey::Favorites);
        let second = registry.ensure(&ViewKey::Favorites).generation;
        assert_ne!(first, second);
    }
}
