//! Render-time origin of a post reference.
//!
//! A post rendered out of a tag or search view is a private copy of that view.
//! The reference handed to the UI remembers which parameterized view produced
//! it, so a later mutation can reach that copy as well as the entity store.

use serde::Serialize;

use crate::cache::keys::ViewKey;
use crate::domain::entities::{Post, PostId};

/// Parameterized view a post reference was rendered from, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Origin {
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl Origin {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            search: None,
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            tag: None,
            search: Some(query.into()),
        }
    }

    /// Origin carried by posts rendered from `key`.
    pub fn for_view(key: &ViewKey) -> Self {
        match key {
            ViewKey::TagPosts(tag) => Self::tag(tag.clone()),
            ViewKey::Search(query) => Self::search(query.clone()),
            _ => Self::none(),
        }
    }

    /// Views holding private copies named by this origin.
    pub fn embedded_views(&self) -> Vec<ViewKey> {
        let mut views = Vec::new();
        if let Some(tag) = &self.tag {
            views.push(ViewKey::TagPosts(tag.clone()));
        }
        if let Some(query) = &self.search {
            views.push(ViewKey::Search(query.clone()));
        }
        views
    }

    pub fn is_none(&self) -> bool {
        self.tag.is_none() && self.search.is_none()
    }
}

/// What a mutation needs to know about the post it targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PostRef {
    pub id: PostId,
    pub comment_to_id: Option<PostId>,
    pub response_to_id: Option<PostId>,
    pub origin: Origin,
}

impl PostRef {
    pub fn of(post: &Post, origin: Origin) -> Self {
        Self {
            id: post.id,
            comment_to_id: post.comment_to_id,
            response_to_id: post.response_to_id,
            origin,
        }
    }

    /// Reference to a post known only by id; reaches the entity store only.
    pub fn id(id: PostId) -> Self {
        Self {
            id,
            comment_to_id: None,
            response_to_id: None,
            origin: Origin::none(),
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }
}
