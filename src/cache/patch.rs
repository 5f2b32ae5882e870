//! Field patches over cached posts and profiles.
//!
//! Applying a patch returns its inverse: a patch holding the previous value of
//! every field it touched. Applying the inverse restores the copy exactly.

use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::domain::entities::{Media, Post, PostBody, UserProfile};
use crate::domain::reaction::{Reaction, ReactionTally};

/// Partial update of a post. `None` fields are left alone.
///
/// A `body` replacement supersedes `text` and `media`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPatch {
    pub body: Option<PostBody>,
    pub text: Option<String>,
    pub media: Option<Vec<Media>>,
    pub can_comment: Option<bool>,
    pub updated_at: Option<Option<OffsetDateTime>>,
    pub like_count: Option<u32>,
    pub dislike_count: Option<u32>,
    pub comment_count: Option<u32>,
    pub response_count: Option<u32>,
    pub repost_count: Option<u32>,
    pub viewer_reaction: Option<Reaction>,
    pub is_favorite: Option<bool>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Terminal deletion: the body is dropped, counters stay.
    pub fn tombstone() -> Self {
        Self {
            body: Some(PostBody::Deleted),
            ..Self::default()
        }
    }

    pub fn reaction(tally: ReactionTally) -> Self {
        Self {
            viewer_reaction: Some(tally.reaction),
            like_count: Some(tally.likes),
            dislike_count: Some(tally.dislikes),
            ..Self::default()
        }
    }

    /// Apply to `post`, returning the inverse patch.
    pub fn apply(&self, post: &mut Post) -> PostPatch {
        let mut inverse = PostPatch::default();

        if let Some(body) = &self.body {
            inverse.body = Some(std::mem::replace(&mut post.body, body.clone()));
        } else if let PostBody::Live { text, media, .. } = &mut post.body {
            if let Some(next) = &self.text {
                inverse.text = Some(std::mem::replace(text, next.clone()));
            }
            if let Some(next) = &self.media {
                inverse.media = Some(std::mem::replace(media, next.clone()));
            }
        }

        swap(&self.can_comment, &mut post.can_comment, &mut inverse.can_comment);
        swap(&self.updated_at, &mut post.updated_at, &mut inverse.updated_at);
        swap(&self.like_count, &mut post.like_count, &mut inverse.like_count);
        swap(
            &self.dislike_count,
            &mut post.dislike_count,
            &mut inverse.dislike_count,
        );
        swap(
            &self.comment_count,
            &mut post.comment_count,
            &mut inverse.comment_count,
        );
        swap(
            &self.response_count,
            &mut post.response_count,
            &mut inverse.response_count,
        );
        swap(
            &self.repost_count,
            &mut post.repost_count,
            &mut inverse.repost_count,
        );
        swap(
            &self.viewer_reaction,
            &mut post.viewer_reaction,
            &mut inverse.viewer_reaction,
        );
        swap(&self.is_favorite, &mut post.is_favorite, &mut inverse.is_favorite);

        inverse
    }
}

fn swap<T: Clone>(next: &Option<T>, field: &mut T, previous: &mut Option<T>) {
    if let Some(value) = next {
        *previous = Some(std::mem::replace(field, value.clone()));
    }
}

pub type PatchFn = Arc<dyn Fn(&Post) -> PostPatch + Send + Sync>;

/// A patch as requested by a mutation.
///
/// `Computed` is resolved separately against each copy, so counters derived
/// from the copy's own values stay consistent with that copy.
#[derive(Clone)]
pub enum Patch {
    Fields(PostPatch),
    Computed(PatchFn),
}

impl Patch {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Post) -> PostPatch + Send + Sync + 'static,
    {
        Patch::Computed(Arc::new(f))
    }

    pub fn resolve(&self, current: &Post) -> PostPatch {
        match self {
            Patch::Fields(patch) => patch.clone(),
            Patch::Computed(f) => f(current),
        }
    }

    /// Apply to `post`, returning the inverse.
    pub fn apply_to(&self, post: &mut Post) -> PostPatch {
        let resolved = self.resolve(post);
        resolved.apply(post)
    }
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Patch::Fields(patch) => f.debug_tuple("Fields").field(patch).finish(),
            Patch::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<PostPatch> for Patch {
    fn from(patch: PostPatch) -> Self {
        Patch::Fields(patch)
    }
}

/// Partial update of a profile's follow state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub followers: Option<u32>,
    pub following: Option<u32>,
    pub post_count: Option<u32>,
    pub is_subscribed: Option<bool>,
}

impl ProfilePatch {
    /// Apply to `profile`, returning the inverse patch.
    pub fn apply(&self, profile: &mut UserProfile) -> ProfilePatch {
        let mut inverse = ProfilePatch::default();
        swap(&self.followers, &mut profile.followers, &mut inverse.followers);
        swap(&self.following, &mut profile.following, &mut inverse.following);
        swap(&self.post_count, &mut profile.post_count, &mut inverse.post_count);
        swap(
            &self.is_subscribed,
            &mut profile.is_subscribed,
            &mut inverse.is_subscribed,
        );
        inverse
    }
}
