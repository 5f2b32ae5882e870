//! Domain entities as held by the client cache.

use feedsync_api_types::{MediaDto, PostDto, PostUserDto, TagCountDto, UserProfileDto};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::reaction::Reaction;

pub type PostId = Uuid;
pub type UserId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Author of a post. Accounts can disappear independently of their posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Author {
    User(UserSummary),
    Deleted,
}

impl Author {
    pub fn id(&self) -> Option<UserId> {
        match self {
            Author::User(user) => Some(user.id),
            Author::Deleted => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Media {
    pub id: String,
    pub url: String,
    pub url_modifiers: String,
    pub kind: String,
    pub mime: String,
    pub subtype: String,
    pub width: u32,
    pub height: u32,
}

/// Content of a post. Deletion is terminal and drops everything but identity,
/// timestamps and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PostBody {
    Live {
        text: String,
        author: Author,
        media: Vec<Media>,
    },
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PostKind {
    Post,
    Comment,
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
    pub original_id: Option<PostId>,
    pub comment_to_id: Option<PostId>,
    pub response_to_id: Option<PostId>,
    pub like_count: u32,
    pub dislike_count: u32,
    pub comment_count: u32,
    pub response_count: u32,
    pub repost_count: u32,
    pub viewer_reaction: Reaction,
    pub is_favorite: bool,
    pub can_comment: bool,
    pub body: PostBody,
}

impl Post {
    pub fn is_deleted(&self) -> bool {
        matches!(self.body, PostBody::Deleted)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            PostBody::Live { text, .. } => Some(text),
            PostBody::Deleted => None,
        }
    }

    pub fn author(&self) -> Option<&Author> {
        match &self.body {
            PostBody::Live { author, .. } => Some(author),
            PostBody::Deleted => None,
        }
    }

    pub fn author_id(&self) -> Option<UserId> {
        self.author().and_then(Author::id)
    }

    pub fn media(&self) -> &[Media] {
        match &self.body {
            PostBody::Live { media, .. } => media,
            PostBody::Deleted => &[],
        }
    }

    pub fn kind(&self) -> PostKind {
        match (self.comment_to_id, self.response_to_id) {
            (_, Some(_)) => PostKind::Response,
            (Some(_), None) => PostKind::Comment,
            (None, None) => PostKind::Post,
        }
    }
}

impl From<MediaDto> for Media {
    fn from(dto: MediaDto) -> Self {
        Self {
            id: dto.id,
            url: dto.url,
            url_modifiers: dto.url_modifiers,
            kind: dto.kind,
            mime: dto.mime,
            subtype: dto.subtype,
            width: dto.width,
            height: dto.height,
        }
    }
}

impl From<&Media> for MediaDto {
    fn from(media: &Media) -> Self {
        Self {
            id: media.id.clone(),
            url: media.url.clone(),
            url_modifiers: media.url_modifiers.clone(),
            kind: media.kind.clone(),
            mime: media.mime.clone(),
            subtype: media.subtype.clone(),
            width: media.width,
            height: media.height,
        }
    }
}

impl From<Option<PostUserDto>> for Author {
    fn from(dto: Option<PostUserDto>) -> Self {
        match dto {
            Some(PostUserDto {
                id: Some(id),
                username,
                name,
                avatar_url,
                is_deleted: false,
            }) => Author::User(UserSummary {
                id,
                username: username.unwrap_or_default(),
                name: name.unwrap_or_default(),
                avatar_url,
            }),
            _ => Author::Deleted,
        }
    }
}

impl From<PostDto> for Post {
    fn from(dto: PostDto) -> Self {
        let body = if dto.is_deleted {
            PostBody::Deleted
        } else {
            PostBody::Live {
                text: dto.text.unwrap_or_default(),
                author: Author::from(dto.user),
                media: dto.media.into_iter().map(Media::from).collect(),
            }
        };

        Self {
            id: dto.id,
            created_at: dto.created_at,
            updated_at: dto.updated_at,
            original_id: dto.original_id,
            comment_to_id: dto.comment_to_id,
            response_to_id: dto.response_to_id,
            like_count: dto.likes,
            dislike_count: dto.dislikes,
            comment_count: dto.comments,
            response_count: dto.response_count,
            repost_count: dto.reposts,
            viewer_reaction: Reaction::from_wire(dto.reaction),
            is_favorite: dto.is_favorite,
            can_comment: dto.can_comment,
            body,
        }
    }
}

/// Profile shown on a user page, with follow counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub followers: u32,
    pub following: u32,
    pub post_count: u32,
    pub is_subscribed: bool,
}

impl From<UserProfileDto> for UserProfile {
    fn from(dto: UserProfileDto) -> Self {
        Self {
            id: dto.id,
            username: dto.username,
            name: dto.name,
            avatar_url: dto.avatar_url,
            bio: dto.bio,
            followers: dto.followers,
            following: dto.following,
            post_count: dto.post_count,
            is_subscribed: dto.is_subscribed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub post_count: u64,
}

impl From<TagCountDto> for TagCount {
    fn from(dto: TagCountDto) -> Self {
        Self {
            name: dto.name,
            post_count: dto.post_count,
        }
    }
}
