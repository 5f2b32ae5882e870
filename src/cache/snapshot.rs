//! Immutable renderings of a view handed to subscribers.

use serde::Serialize;

use crate::application::error::EngineError;
use crate::domain::entities::{Post, PostId, TagCount, UserProfile};

use super::keys::ViewKey;
use super::origin::{Origin, PostRef};
use super::store::EntityStore;
use super::view::{ViewData, ViewEntry};

/// A post as shown by one view, with the origin later mutations need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPost {
    pub post: Post,
    pub origin: Origin,
}

impl RenderedPost {
    fn new(post: &Post, origin: &Origin) -> Self {
        Self {
            post: post.clone(),
            origin: origin.clone(),
        }
    }

    pub fn post_ref(&self) -> PostRef {
        PostRef::of(&self.post, self.origin.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedComment {
    pub comment: RenderedPost,
    /// Created during this session and pinned above server order.
    pub is_fresh: bool,
    pub responses: Vec<RenderedPost>,
    pub responses_total: u64,
    pub responses_has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SnapshotContent {
    Posts(Vec<RenderedPost>),
    Thread(Vec<RenderedComment>),
    Post(Option<RenderedPost>),
    Profile(Option<UserProfile>),
    Tags(Vec<TagCount>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub key: ViewKey,
    pub content: SnapshotContent,
    pub loaded: bool,
    pub has_more: bool,
    pub total: Option<u64>,
    pub stale: bool,
    pub error: Option<EngineError>,
}

impl ViewSnapshot {
    pub fn render(key: &ViewKey, entry: &ViewEntry, store: &EntityStore) -> Self {
        let origin = Origin::for_view(key);
        let (content, has_more, total) = match &entry.data {
            ViewData::Posts(list) => (
                SnapshotContent::Posts(
                    list.render(store)
                        .into_iter()
                        .map(|post| RenderedPost::new(post, &origin))
                        .collect(),
                ),
                list.has_more(),
                list.total(),
            ),
            ViewData::Thread(thread) => {
                let comments = thread
                    .ordered_ids()
                    .into_iter()
                    .filter_map(|id| store.get(&id))
                    .map(|comment| {
                        let responses = thread.responses(&comment.id);
                        RenderedComment {
                            comment: RenderedPost::new(comment, &origin),
                            is_fresh: thread.is_fresh(&comment.id),
                            responses: responses
                                .map(|list| {
                                    list.render()
                                        .into_iter()
                                        .map(|post| RenderedPost::new(post, &origin))
                                        .collect()
                                })
                                .unwrap_or_default(),
                            responses_total: responses
                                .map_or(u64::from(comment.response_count), |list| list.total()),
                            responses_has_more: responses
                                .map_or(comment.response_count > 0, |list| list.has_more()),
                        }
                    })
                    .collect();
                (
                    SnapshotContent::Thread(comments),
                    thread.has_more(),
                    Some(thread.total()),
                )
            }
            ViewData::Single(id) => (
                SnapshotContent::Post(store.get(id).map(|post| RenderedPost::new(post, &origin))),
                false,
                None,
            ),
            ViewData::Profile(profile) => (SnapshotContent::Profile(profile.clone()), false, None),
            ViewData::Tags(tags) => (
                SnapshotContent::Tags(tags.clone().unwrap_or_default()),
                false,
                None,
            ),
        };

        Self {
            key: key.clone(),
            content,
            loaded: entry.loaded,
            has_more,
            total,
            stale: entry.stale,
            error: entry.error.clone(),
        }
    }

    /// Posts of a list view; empty for other kinds.
    pub fn posts(&self) -> &[RenderedPost] {
        match &self.content {
            SnapshotContent::Posts(posts) => posts,
            _ => &[],
        }
    }

    /// Comments of a thread view; empty for other kinds.
    pub fn comments(&self) -> &[RenderedComment] {
        match &self.content {
            SnapshotContent::Thread(comments) => comments,
            _ => &[],
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match &self.content {
            SnapshotContent::Profile(profile) => profile.as_ref(),
            _ => None,
        }
    }

    /// Find a rendered post anywhere in this view, responses included.
    pub fn find(&self, id: &PostId) -> Option<&RenderedPost> {
        match &self.content {
            SnapshotContent::Posts(posts) => posts.iter().find(|p| p.post.id == *id),
            SnapshotContent::Post(post) => post.as_ref().filter(|p| p.post.id == *id),
            SnapshotContent::Thread(comments) => comments.iter().find_map(|comment| {
                if comment.comment.post.id == *id {
                    Some(&comment.comment)
                } else {
                    comment.responses.iter().find(|p| p.post.id == *id)
                }
            }),
            SnapshotContent::Profile(_) | SnapshotContent::Tags(_) => None,
        }
    }

    /// Ids in display order, responses following their comment.
    pub fn post_ids(&self) -> Vec<PostId> {
        match &self.content {
            SnapshotContent::Posts(posts) => posts.iter().map(|p| p.post.id).collect(),
            SnapshotContent::Post(post) => post.iter().map(|p| p.post.id).collect(),
            SnapshotContent::Thread(comments) => comments
                .iter()
                .flat_map(|comment| {
                    std::iter::once(comment.comment.post.id)
                        .chain(comment.responses.iter().map(|p| p.post.id))
                })
                .collect(),
            SnapshotContent::Profile(_) | SnapshotContent::Tags(_) => Vec::new(),
        }
    }
}
