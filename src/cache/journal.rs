//! Undo journal for cache patches.
//!
//! Every change a mutation makes to the cache goes through a `PatchJournal`,
//! which records the inverse of each step and the views it touched. Rolling
//! the journal back applies the inverses newest first.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::entities::{Post, PostId, UserId, UserProfile};

use super::keys::{CopyLocation, ViewKey};
use super::patch::{Patch, ProfilePatch, PostPatch};
use super::planner::PatchPlan;
use super::state::CacheState;
use super::view::ResponseList;

#[derive(Debug)]
enum UndoStep {
    Post {
        location: CopyLocation,
        inverse: PostPatch,
    },
    Profile {
        user_id: UserId,
        inverse: ProfilePatch,
    },
    ListInsert {
        view: ViewKey,
        post_id: PostId,
    },
    FreshComment {
        thread: PostId,
        comment_id: PostId,
    },
    Response {
        thread: PostId,
        comment_id: PostId,
        post_id: PostId,
        created_list: bool,
    },
    ThreadTotal {
        thread: PostId,
        previous: u64,
    },
}

#[derive(Debug, Default)]
pub struct PatchJournal {
    steps: Vec<UndoStep>,
    touched: HashSet<ViewKey>,
}

impl PatchJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch one copy. Returns false when the copy is not cached.
    pub fn patch_post(
        &mut self,
        state: &mut CacheState,
        location: &CopyLocation,
        patch: &Patch,
    ) -> bool {
        let Some(inverse) = state.patch_copy(location, patch) else {
            return false;
        };
        self.touched.extend(state.views_showing(location));
        self.steps.push(UndoStep::Post {
            location: location.clone(),
            inverse,
        });
        true
    }

    /// Patch every location in `plan`. Returns how many copies were cached.
    pub fn patch_plan(&mut self, state: &mut CacheState, plan: &PatchPlan, patch: &Patch) -> usize {
        plan.locations
            .iter()
            .filter(|location| self.patch_post(state, location, patch))
            .count()
    }

    /// Patch a loaded profile with a patch computed from its current values.
    pub fn patch_profile<F>(&mut self, state: &mut CacheState, user_id: UserId, patch: F) -> bool
    where
        F: FnOnce(&UserProfile) -> ProfilePatch,
    {
        let key = ViewKey::UserProfile(user_id);
        let Some(profile) = state.views.get_mut(&key).and_then(|entry| entry.profile_mut()) else {
            return false;
        };
        let inverse = patch(profile).apply(profile);
        self.touched.insert(key);
        self.steps.push(UndoStep::Profile { user_id, inverse });
        true
    }

    /// Insert an entity-store post into an identity list.
    pub fn insert_post(&mut self, state: &mut CacheState, view: &ViewKey, post_id: PostId) -> bool {
        let inserted = state
            .views
            .get_mut(view)
            .and_then(|entry| entry.posts_mut())
            .is_some_and(|list| list.insert(post_id));
        if inserted {
            state.views.reindex(view);
            self.touched.insert(view.clone());
            self.steps.push(UndoStep::ListInsert {
                view: view.clone(),
                post_id,
            });
        }
        inserted
    }

    /// Insert a new top-level comment at the front of its thread.
    pub fn insert_comment(
        &mut self,
        state: &mut CacheState,
        thread: PostId,
        comment_id: PostId,
    ) -> bool {
        let key = ViewKey::Comments(thread);
        let inserted = state
            .views
            .get_mut(&key)
            .and_then(|entry| entry.thread_mut())
            .is_some_and(|comments| comments.insert_fresh(comment_id));
        if inserted {
            state.views.reindex(&key);
            self.touched.insert(key);
            self.steps.push(UndoStep::FreshComment { thread, comment_id });
        }
        inserted
    }

    /// Insert a response after `after`, or at the front when `after` is not
    /// shown. When the comment's responses were never fetched, the list is
    /// created with the comment's cached response count as its total.
    pub fn insert_response(
        &mut self,
        state: &mut CacheState,
        thread: PostId,
        comment_id: PostId,
        post: Post,
        after: Option<PostId>,
    ) -> bool {
        let key = ViewKey::Comments(thread);
        let post_id = post.id;
        let known = state
            .store
            .get(&comment_id)
            .map_or(0, |comment| u64::from(comment.response_count));
        let Some(comments) = state.views.get_mut(&key).and_then(|entry| entry.thread_mut()) else {
            return false;
        };
        let created_list = comments.responses(&comment_id).is_none();
        let responses = comments.responses_entry(comment_id);
        if created_list {
            *responses = ResponseList::unfetched(known);
        }
        let inserted = responses.insert(post, after);
        if inserted {
            self.touched.insert(key);
            self.steps.push(UndoStep::Response {
                thread,
                comment_id,
                post_id,
                created_list,
            });
        }
        inserted
    }

    /// Adjust a thread's comment total, never below zero.
    pub fn adjust_thread_total(
        &mut self,
        state: &mut CacheState,
        thread: PostId,
        delta: i64,
    ) -> bool {
        let key = ViewKey::Comments(thread);
        let Some(comments) = state.views.get_mut(&key).and_then(|entry| entry.thread_mut()) else {
            return false;
        };
        let next = comments.total().saturating_add_signed(delta);
        let previous = comments.set_total(next);
        self.touched.insert(key);
        self.steps.push(UndoStep::ThreadTotal { thread, previous });
        true
    }

    /// Record a view changed by a step that is never rolled back.
    pub fn touch(&mut self, key: ViewKey) {
        self.touched.insert(key);
    }

    pub fn touched(&self) -> &HashSet<ViewKey> {
        &self.touched
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Undo every recorded step, newest first. Returns the views to notify.
    pub fn rollback(self, state: &mut CacheState) -> HashSet<ViewKey> {
        let steps = self.steps.len();
        for step in self.steps.into_iter().rev() {
            match step {
                UndoStep::Post { location, inverse } => {
                    state.patch_copy(&location, &Patch::Fields(inverse));
                }
                UndoStep::Profile { user_id, inverse } => {
                    if let Some(profile) = state
                        .views
                        .get_mut(&ViewKey::UserProfile(user_id))
                        .and_then(|entry| entry.profile_mut())
                    {
                        inverse.apply(profile);
                    }
                }
                UndoStep::ListInsert { view, post_id } => {
                    let list = state.views.get_mut(&view).and_then(|entry| entry.posts_mut());
                    if let Some(list) = list {
                        list.remove_inserted(&post_id);
                    }
                    state.views.reindex(&view);
                }
                UndoStep::FreshComment { thread, comment_id } => {
                    let key = ViewKey::Comments(thread);
                    if let Some(comments) =
                        state.views.get_mut(&key).and_then(|entry| entry.thread_mut())
                    {
                        comments.remove_fresh(&comment_id);
                    }
                    state.views.reindex(&key);
                }
                UndoStep::Response {
                    thread,
                    comment_id,
                    post_id,
                    created_list,
                } => {
                    let comments = state
                        .views
                        .get_mut(&ViewKey::Comments(thread))
                        .and_then(|entry| entry.thread_mut());
                    if let Some(comments) = comments {
                        if created_list {
                            comments.remove_responses(&comment_id);
                        } else if let Some(responses) = comments.responses_mut(&comment_id) {
                            responses.remove_local(&post_id);
                        }
                    }
                }
                UndoStep::ThreadTotal { thread, previous } => {
                    if let Some(comments) = state
                        .views
                        .get_mut(&ViewKey::Comments(thread))
                        .and_then(|entry| entry.thread_mut())
                    {
                        comments.set_total(previous);
                    }
                }
            }
        }

        debug!(steps, views = self.touched.len(), "Cache patches rolled back");
        self.touched
    }
}
