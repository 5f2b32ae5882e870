//! Mutation dispatcher.
//!
//! Every write follows one shape: validate locally, plan the copies to patch,
//! patch them under one lock, call the server, and on failure undo exactly
//! what was applied. Reactions, favorites and follows patch before the
//! network call; edit, delete and create patch after it succeeds.

use std::sync::Arc;

use feedsync_api_types::{CreatePostRequest, MediaDto, ReactionRequest, UpdatePostRequest};
use metrics::counter;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::api::FeedApi;
use crate::application::error::EngineError;
use crate::cache::{
    CacheConfig, CopyLocation, HistoryStore, Patch, PatchJournal, PostPatch, PostRef, ProfilePatch,
    ViewCache, ViewKey,
};
use crate::domain::entities::{
    Author, Media, Post, PostBody, PostId, PostKind, UserId, UserSummary,
};
use crate::domain::error::ValidationError;
use crate::domain::reaction::{Reaction, ReactionTally, Vote};
use crate::domain::validation::{TextLimits, validate_content};

const METRIC_MUTATION_TOTAL: &str = "feedsync_mutation_total";
const METRIC_ROLLBACK_TOTAL: &str = "feedsync_rollback_total";

/// Content of a post to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub text: String,
    pub media: Vec<Media>,
    pub can_comment: bool,
    /// Reposted post for a top-level post; the response being answered for a
    /// response.
    pub original: Option<PostRef>,
    pub comment_to_id: Option<PostId>,
    pub response_to_id: Option<PostId>,
}

impl NewPost {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: Vec::new(),
            can_comment: true,
            original: None,
            comment_to_id: None,
            response_to_id: None,
        }
    }

    pub fn repost_of(mut self, original: PostRef) -> Self {
        self.original = Some(original);
        self
    }

    pub fn comment_on(mut self, post_id: PostId) -> Self {
        self.comment_to_id = Some(post_id);
        self
    }

    /// Respond inside `comment_id`'s thread, placed after `after` if given.
    pub fn respond_to(
        mut self,
        post_id: PostId,
        comment_id: PostId,
        after: Option<PostRef>,
    ) -> Self {
        self.comment_to_id = Some(post_id);
        self.response_to_id = Some(comment_id);
        self.original = after;
        self
    }

    pub fn kind(&self) -> PostKind {
        match (self.comment_to_id, self.response_to_id) {
            (_, Some(_)) => PostKind::Response,
            (Some(_), None) => PostKind::Comment,
            (None, None) => PostKind::Post,
        }
    }

    fn validate(&self, limits: &TextLimits) -> Result<(), ValidationError> {
        if self.response_to_id.is_some() && self.comment_to_id.is_none() {
            return Err(ValidationError::OrphanResponse);
        }
        let limit = limits.for_reply(self.comment_to_id.is_some());
        validate_content(&self.text, self.media.len(), limit)
    }

    fn to_request(&self) -> CreatePostRequest {
        CreatePostRequest {
            text: self.text.clone(),
            original_id: self.original.as_ref().map(|original| original.id),
            comment_to_id: self.comment_to_id,
            response_to_id: self.response_to_id,
            can_comment: self.can_comment,
            media: self.media.iter().map(MediaDto::from).collect(),
        }
    }

    fn provisional(&self, id: PostId, author: &UserSummary, now: OffsetDateTime) -> Post {
        Post {
            id,
            created_at: now,
            updated_at: None,
            original_id: self.original.as_ref().map(|original| original.id),
            comment_to_id: self.comment_to_id,
            response_to_id: self.response_to_id,
            like_count: 0,
            dislike_count: 0,
            comment_count: 0,
            response_count: 0,
            repost_count: 0,
            viewer_reaction: Reaction::None,
            is_favorite: false,
            can_comment: self.can_comment,
            body: PostBody::Live {
                text: self.text.clone(),
                author: Author::User(author.clone()),
                media: self.media.clone(),
            },
        }
    }
}

/// Fields an edit changes; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostChanges {
    pub text: Option<String>,
    pub can_comment: Option<bool>,
    pub media: Option<Vec<Media>>,
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.can_comment.is_none() && self.media.is_none()
    }

    fn to_request(&self) -> UpdatePostRequest {
        UpdatePostRequest {
            text: self.text.clone(),
            can_comment: self.can_comment,
            media: self
                .media
                .as_ref()
                .map(|media| media.iter().map(MediaDto::from).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    React { post: PostRef, vote: Vote },
    Favorite { post: PostRef },
    Edit { post: PostRef, changes: PostChanges },
    Delete { post: PostRef },
    Create(NewPost),
    Follow { user_id: UserId },
    Unfollow { user_id: UserId },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::React { .. } => "react",
            Mutation::Favorite { .. } => "favorite",
            Mutation::Edit { .. } => "edit",
            Mutation::Delete { .. } => "delete",
            Mutation::Create(_) => "create",
            Mutation::Follow { .. } => "follow",
            Mutation::Unfollow { .. } => "unfollow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    Created(PostId),
}

pub struct MutationDispatcher {
    cache: Arc<ViewCache>,
    api: Arc<dyn FeedApi>,
    history: Arc<HistoryStore>,
    limits: TextLimits,
}

impl MutationDispatcher {
    pub fn new(
        cache: Arc<ViewCache>,
        api: Arc<dyn FeedApi>,
        history: Arc<HistoryStore>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            cache,
            api,
            history,
            limits: config.text_limits(),
        }
    }

    pub async fn dispatch(&self, mutation: Mutation) -> Result<MutationOutcome, EngineError> {
        let name = mutation.name();
        let result = match mutation {
            Mutation::React { post, vote } => self.react(post, vote).await,
            Mutation::Favorite { post } => self.favorite(post).await,
            Mutation::Edit { post, changes } => self.edit(post, changes).await,
            Mutation::Delete { post } => self.delete(post).await,
            Mutation::Create(new_post) => self.create(new_post).await,
            Mutation::Follow { user_id } => self.follow(user_id, true).await,
            Mutation::Unfollow { user_id } => self.follow(user_id, false).await,
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(error) => error.kind(),
        };
        counter!(METRIC_MUTATION_TOTAL, "mutation" => name, "outcome" => outcome).increment(1);
        match &result {
            Ok(_) => info!(mutation = name, outcome, "Mutation applied"),
            Err(error) => warn!(mutation = name, outcome, error = %error, "Mutation failed"),
        }
        result
    }

    fn viewer(&self) -> Result<UserSummary, EngineError> {
        self.cache
            .read("viewer", |state| state.viewer.clone())
            .ok_or(EngineError::Unauthorized)
    }

    fn undo(&self, mutation: &'static str, id: impl std::fmt::Display, journal: PatchJournal) {
        let steps = journal.len();
        self.cache.rollback(journal);
        counter!(METRIC_ROLLBACK_TOTAL, "mutation" => mutation).increment(1);
        warn!(mutation, target_id = %id, steps, "Optimistic patch rolled back");
    }

    async fn react(&self, post: PostRef, vote: Vote) -> Result<MutationOutcome, EngineError> {
        self.viewer()?;
        let patch = Patch::computed(move |current: &Post| {
            PostPatch::reaction(
                ReactionTally {
                    reaction: current.viewer_reaction,
                    likes: current.like_count,
                    dislikes: current.dislike_count,
                }
                .toggle(vote),
            )
        });
        let (plan, journal) = self.cache.transact("react", |state, journal| {
            let plan = state.plan_for(&post);
            journal.patch_plan(state, &plan, &patch);
            plan
        });
        info!(post_id = %post.id, mutation = "react", %plan, "Optimistic patch applied");

        let request = ReactionRequest {
            post_id: post.id,
            liked: vote.is_like(),
            comment_to_id: post.comment_to_id,
            response_to_id: post.response_to_id,
        };
        if let Err(error) = self.api.react(&request).await {
            self.undo("react", post.id, journal);
            return Err(error.into());
        }
        Ok(MutationOutcome::Applied)
    }

    async fn favorite(&self, post: PostRef) -> Result<MutationOutcome, EngineError> {
        self.viewer()?;
        let patch = Patch::computed(|current: &Post| PostPatch {
            is_favorite: Some(!current.is_favorite),
            ..PostPatch::default()
        });
        let (plan, journal) = self.cache.transact("favorite", |state, journal| {
            let plan = state.plan_for(&post);
            let was_favorite = plan
                .locations
                .iter()
                .find_map(|location| state.copy(location))
                .map(|current| current.is_favorite);
            journal.patch_plan(state, &plan, &patch);
            // Un-favoriting leaves the entry in place until the next fetch.
            if was_favorite == Some(false) {
                journal.insert_post(state, &ViewKey::Favorites, post.id);
            }
            plan
        });
        info!(post_id = %post.id, mutation = "favorite", %plan, "Optimistic patch applied");

        if let Err(error) = self.api.toggle_favorite(post.id).await {
            self.undo("favorite", post.id, journal);
            return Err(error.into());
        }
        Ok(MutationOutcome::Applied)
    }

    async fn edit(
        &self,
        post: PostRef,
        changes: PostChanges,
    ) -> Result<MutationOutcome, EngineError> {
        self.viewer()?;
        if changes.is_empty() {
            return Err(ValidationError::NoChanges.into());
        }
        let cached = self
            .cache
            .read("edit_validate", |state| state.store.get(&post.id).cloned());
        if cached.as_ref().is_some_and(Post::is_deleted) {
            return Err(ValidationError::Deleted(post.id).into());
        }
        if let Some(text) = &changes.text {
            let media_count = match (&changes.media, &cached) {
                (Some(media), _) => media.len(),
                (None, Some(current)) => current.media().len(),
                (None, None) => 0,
            };
            let limit = self.limits.for_reply(post.comment_to_id.is_some());
            validate_content(text, media_count, limit)?;
        }

        self.api
            .update_post(post.id, &changes.to_request())
            .await
            .map_err(EngineError::from)?;

        let patch = Patch::from(PostPatch {
            text: changes.text,
            media: changes.media,
            can_comment: changes.can_comment,
            updated_at: Some(Some(OffsetDateTime::now_utc())),
            ..PostPatch::default()
        });
        let (plan, _) = self.cache.transact("edit", |state, journal| {
            let plan = state.plan_for(&post);
            journal.patch_plan(state, &plan, &patch);
            plan
        });
        self.history.invalidate(&post.id);
        info!(post_id = %post.id, mutation = "edit", %plan, "Server change applied");
        Ok(MutationOutcome::Applied)
    }

    async fn delete(&self, post: PostRef) -> Result<MutationOutcome, EngineError> {
        self.viewer()?;
        self.api
            .delete_post(post.id)
            .await
            .map_err(EngineError::from)?;

        let patch = Patch::from(PostPatch::tombstone());
        let (plan, _) = self.cache.transact("delete", |state, journal| {
            let plan = state.plan_for(&post);
            journal.patch_plan(state, &plan, &patch);
            plan
        });
        self.history.invalidate(&post.id);
        info!(post_id = %post.id, mutation = "delete", %plan, "Server change applied");
        Ok(MutationOutcome::Applied)
    }

    async fn create(&self, new_post: NewPost) -> Result<MutationOutcome, EngineError> {
        let viewer = self.viewer()?;
        new_post.validate(&self.limits)?;

        let id = self
            .api
            .create_post(&new_post.to_request())
            .await
            .map_err(EngineError::from)?;
        let post = new_post.provisional(id, &viewer, OffsetDateTime::now_utc());
        let kind = new_post.kind();

        self.cache.transact("create", |state, journal| {
            state.store.upsert(post.clone());
            if let Some(original) = &new_post.original {
                let plan = state.plan_for(original);
                journal.patch_plan(state, &plan, &increment(Counter::Reposts));
            }
            match (kind, new_post.comment_to_id, new_post.response_to_id) {
                (PostKind::Comment, Some(thread), _) => {
                    journal.insert_comment(state, thread, id);
                    journal.adjust_thread_total(state, thread, 1);
                    journal.patch_post(
                        state,
                        &CopyLocation::Entity(thread),
                        &increment(Counter::Comments),
                    );
                }
                (PostKind::Response, Some(thread), Some(comment_id)) => {
                    let after = new_post.original.as_ref().map(|original| original.id);
                    journal.insert_response(state, thread, comment_id, post.clone(), after);
                    journal.adjust_thread_total(state, thread, 1);
                    journal.patch_post(
                        state,
                        &CopyLocation::Entity(comment_id),
                        &increment(Counter::Responses),
                    );
                    journal.patch_post(
                        state,
                        &CopyLocation::Entity(thread),
                        &increment(Counter::Comments),
                    );
                }
                _ => {
                    journal.insert_post(state, &ViewKey::UserPosts(viewer.id), id);
                    journal.insert_post(state, &ViewKey::HomeFeed, id);
                    journal.patch_profile(state, viewer.id, |profile| ProfilePatch {
                        post_count: Some(profile.post_count.saturating_add(1)),
                        ..ProfilePatch::default()
                    });
                    if let Some(entry) = state.views.get_mut(&ViewKey::PopularTags) {
                        entry.stale = true;
                        journal.touch(ViewKey::PopularTags);
                    }
                }
            }
            // Views showing the new entity by id, e.g. a single-post view
            // opened before the create returned.
            for key in state.views.views_for_post(&id) {
                journal.touch(key);
            }
        });
        info!(post_id = %id, mutation = "create", kind = ?kind, "Server change applied");
        Ok(MutationOutcome::Created(id))
    }

    async fn follow(&self, user_id: UserId, follow: bool) -> Result<MutationOutcome, EngineError> {
        let viewer = self.viewer()?;
        let mutation = if follow { "follow" } else { "unfollow" };
        let (_, journal) = self.cache.transact(mutation, |state, journal| {
            journal.patch_profile(state, user_id, |profile| ProfilePatch {
                followers: Some(step(profile.followers, follow)),
                is_subscribed: Some(follow),
                ..ProfilePatch::default()
            });
            journal.patch_profile(state, viewer.id, |profile| ProfilePatch {
                following: Some(step(profile.following, follow)),
                ..ProfilePatch::default()
            });
        });
        info!(user_id = %user_id, mutation, "Optimistic patch applied");

        let result = if follow {
            self.api.follow(user_id).await
        } else {
            self.api.unfollow(user_id).await
        };
        if let Err(error) = result {
            self.undo(mutation, user_id, journal);
            return Err(error.into());
        }
        Ok(MutationOutcome::Applied)
    }
}

fn step(value: u32, up: bool) -> u32 {
    if up {
        value.saturating_add(1)
    } else {
        value.saturating_sub(1)
    }
}

#[derive(Clone, Copy)]
enum Counter {
    Comments,
    Responses,
    Reposts,
}

fn increment(counter: Counter) -> Patch {
    Patch::computed(move |current: &Post| match counter {
        Counter::Comments => PostPatch {
            comment_count: Some(current.comment_count.saturating_add(1)),
            ..PostPatch::default()
        },
        Counter::Responses => PostPatch {
            response_count: Some(current.response_count.saturating_add(1)),
            ..PostPatch::default()
        },
        Counter::Reposts => PostPatch {
            repost_count: Some(current.repost_count.saturating_add(1)),
            ..PostPatch::default()
        },
    })
}
