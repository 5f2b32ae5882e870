//! View and copy-location keys.
//!
//! `ViewKey` is the identity of an accumulator: the view kind plus its static
//! parameters. The page number is never part of it. `CopyLocation` names one
//! physical copy of a post that a patch can reach.

use std::fmt;

use serde::Serialize;

use crate::domain::entities::{PostId, UserId};

/// Identity of a view accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ViewKey {
    /// Home feed, newest first.
    HomeFeed,
    /// A single post addressed by id.
    Post(PostId),
    /// Posts authored by a user.
    UserPosts(UserId),
    /// Posts carrying a tag.
    TagPosts(String),
    /// Full-text search results.
    Search(String),
    /// The viewer's favorites.
    Favorites,
    /// Comment thread of a post, with nested responses.
    Comments(PostId),
    /// A user's profile and follow counters.
    UserProfile(UserId),
    /// Most used tags.
    PopularTags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViewKind {
    HomeFeed,
    Post,
    UserPosts,
    TagPosts,
    Search,
    Favorites,
    Comments,
    UserProfile,
    PopularTags,
}

impl ViewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewKind::HomeFeed => "home_feed",
            ViewKind::Post => "post",
            ViewKind::UserPosts => "user_posts",
            ViewKind::TagPosts => "tag_posts",
            ViewKind::Search => "search",
            ViewKind::Favorites => "favorites",
            ViewKind::Comments => "comments",
            ViewKind::UserProfile => "user_profile",
            ViewKind::PopularTags => "popular_tags",
        }
    }
}

impl ViewKey {
    pub fn kind(&self) -> ViewKind {
        match self {
            ViewKey::HomeFeed => ViewKind::HomeFeed,
            ViewKey::Post(_) => ViewKind::Post,
            ViewKey::UserPosts(_) => ViewKind::UserPosts,
            ViewKey::TagPosts(_) => ViewKind::TagPosts,
            ViewKey::Search(_) => ViewKind::Search,
            ViewKey::Favorites => ViewKind::Favorites,
            ViewKey::Comments(_) => ViewKind::Comments,
            ViewKey::UserProfile(_) => ViewKind::UserProfile,
            ViewKey::PopularTags => ViewKind::PopularTags,
        }
    }

    /// Post lists whose entries are kept as private copies instead of
    /// references into the entity store.
    pub fn holds_embedded_copies(&self) -> bool {
        matches!(self, ViewKey::TagPosts(_) | ViewKey::Search(_))
    }

    /// Post lists ordered by recency and backed by a `PostList` accumulator.
    pub fn is_post_list(&self) -> bool {
        matches!(
            self,
            ViewKey::HomeFeed
                | ViewKey::UserPosts(_)
                | ViewKey::TagPosts(_)
                | ViewKey::Search(_)
                | ViewKey::Favorites
        )
    }

    /// Whether the accumulator survives its last subscriber leaving.
    pub fn retain_when_unused(&self) -> bool {
        !matches!(self, ViewKey::Favorites | ViewKey::Search(_))
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKey::HomeFeed | ViewKey::Favorites | ViewKey::PopularTags => {
                f.write_str(self.kind().as_str())
            }
            ViewKey::Post(id)
            | ViewKey::UserPosts(id)
            | ViewKey::Comments(id)
            | ViewKey::UserProfile(id) => write!(f, "{}:{id}", self.kind().as_str()),
            ViewKey::TagPosts(value) | ViewKey::Search(value) => {
                write!(f, "{}:{value}", self.kind().as_str())
            }
        }
    }
}

/// One physical copy of a post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum CopyLocation {
    /// The normalized copy in the entity store. Every identity-addressable
    /// view (home, single post, user posts, favorites, top-level comments)
    /// renders from it.
    Entity(PostId),
    /// A private copy held by a tag or search accumulator.
    Embedded { view: ViewKey, post_id: PostId },
    /// A response copy inside a comment's nested list.
    Response {
        thread: PostId,
        comment_id: PostId,
        post_id: PostId,
    },
}

impl CopyLocation {
    pub fn post_id(&self) -> PostId {
        match self {
            CopyLocation::Entity(id) => *id,
            CopyLocation::Embedded { post_id, .. } | CopyLocation::Response { post_id, .. } => {
                *post_id
            }
        }
    }
}

impl fmt::Display for CopyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyLocation::Entity(id) => write!(f, "entity:{id}"),
            CopyLocation::Embedded { view, post_id } => write!(f, "{view}/{post_id}"),
            CopyLocation::Response {
                thread,
                comment_id,
                post_id,
            } => write!(f, "comments:{thread}/{comment_id}/{post_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn identity_excludes_page_and_separates_parameters() {
        assert_eq!(
            ViewKey::TagPosts("rust".to_string()),
            ViewKey::TagPosts("rust".to_string())
        );
        assert_ne!(
            ViewKey::TagPosts("rust".to_string()),
            ViewKey::Search("rust".to_string())
        );
        assert_ne!(
            ViewKey::UserPosts(Uuid::nil()),
            ViewKey::UserPosts(Uuid::new_v4())
        );
    }

    #[test]
    fn favorites_and_search_are_not_retained() {
        assert!(!ViewKey::Favorites.retain_when_unused());
        assert!(!ViewKey::Search("q".to_string()).retain_when_unused());
        assert!(ViewKey::HomeFeed.retain_when_unused());
        assert!(ViewKey::Comments(Uuid::nil()).retain_when_unused());
    }

    #[test]
    fn only_tag_and_search_embed_copies() {
        assert!(ViewKey::TagPosts("t".to_string()).holds_embedded_copies());
        assert!(ViewKey::Search("q".to_string()).holds_embedded_copies());
        assert!(!ViewKey::HomeFeed.holds_embedded_copies());
        assert!(!ViewKey::Favorites.holds_embedded_copies());
    }

    #[test]
    fn display_names_kind_and_parameter() {
        assert_eq!(ViewKey::HomeFeed.to_string(), "home_feed");
        assert_eq!(
            ViewKey::TagPosts("rust".to_string()).to_string(),
            "tag_posts:rust"
        );
    }
}
