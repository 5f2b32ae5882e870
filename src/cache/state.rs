//! Engine state guarded by a single lock.

use std::collections::HashSet;

use crate::domain::entities::{Post, PostId, UserSummary};

use super::keys::{CopyLocation, ViewKey};
use super::origin::PostRef;
use super::patch::{Patch, PostPatch};
use super::planner::PatchPlan;
use super::registry::ViewRegistry;
use super::store::EntityStore;

#[derive(Debug, Default)]
pub struct CacheState {
    pub store: EntityStore,
    pub views: ViewRegistry,
    /// Signed-in user; mutations require one.
    pub viewer: Option<UserSummary>,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one copy of a post.
    pub fn copy(&self, location: &CopyLocation) -> Option<&Post> {
        match location {
            CopyLocation::Entity(id) => self.store.get(id),
            CopyLocation::Embedded { view, post_id } => {
                self.views.get(view)?.posts()?.embedded(post_id)
            }
            CopyLocation::Response {
                thread,
                comment_id,
                post_id,
            } => self
                .views
                .get(&ViewKey::Comments(*thread))?
                .thread()?
                .responses(comment_id)?
                .render()
                .into_iter()
                .find(|post| post.id == *post_id),
        }
    }

    /// Patch one copy of a post. Returns the inverse, or `None` when the copy
    /// is not cached.
    pub fn patch_copy(&mut self, location: &CopyLocation, patch: &Patch) -> Option<PostPatch> {
        match location {
            CopyLocation::Entity(id) => self.store.update(id, patch),
            CopyLocation::Embedded { view, post_id } => self
                .views
                .get_mut(view)?
                .posts_mut()?
                .patch_embedded(post_id, patch),
            CopyLocation::Response {
                thread,
                comment_id,
                post_id,
            } => self
                .views
                .get_mut(&ViewKey::Comments(*thread))?
                .thread_mut()?
                .responses_mut(comment_id)?
                .patch(post_id, patch),
        }
    }

    /// Every cached copy of `post`: the copies its reference names plus the
    /// private copy of any tag or search list holding it.
    pub fn plan_for(&self, post: &PostRef) -> PatchPlan {
        let mut plan = PatchPlan::for_post(post);
        plan.extend(self.embedded_copies(&post.id));
        plan
    }

    pub fn embedded_copies(&self, id: &PostId) -> Vec<CopyLocation> {
        self.views
            .keys()
            .filter(|key| {
                self.views
                    .get(key)
                    .and_then(|entry| entry.posts())
                    .is_some_and(|list| list.embedded(id).is_some())
            })
            .map(|view| CopyLocation::Embedded {
                view: view.clone(),
                post_id: *id,
            })
            .collect()
    }

    /// Views rendering the given copy.
    pub fn views_showing(&self, location: &CopyLocation) -> HashSet<ViewKey> {
        match location {
            CopyLocation::Entity(id) => self.views.views_for_post(id),
            CopyLocation::Embedded { view, .. } => HashSet::from([view.clone()]),
            CopyLocation::Response { thread, .. } => HashSet::from([ViewKey::Comments(*thread)]),
        }
    }

    /// Merge server copies into the entity store; returns the views showing
    /// any of them.
    pub fn upsert_posts(&mut self, posts: impl IntoIterator<Item = Post>) -> HashSet<ViewKey> {
        let mut touched = HashSet::new();
        for post in posts {
            touched.extend(self.views.views_for_post(&post.id));
            self.store.upsert(post);
        }
        touched
    }

    pub fn is_post_cached(&self, id: &PostId) -> bool {
        self.store.contains(id)
    }
}
