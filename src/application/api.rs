//! Network trait describing the feed server.

use async_trait::async_trait;
use feedsync_api_types::{
    CreatePostRequest, PostHistoryDto, ReactionRequest, UpdatePostRequest,
};
use thiserror::Error;

use crate::domain::entities::{Post, PostId, TagCount, UserId, UserProfile};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Server-side filter behind a post list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostListQuery {
    Home,
    User(UserId),
    Tag(String),
    Search(String),
    Favorites,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostsPage {
    pub posts: Vec<Post>,
    pub has_more: bool,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentsPage {
    pub comments: Vec<Post>,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsesPage {
    pub responses: Vec<Post>,
    pub total: u64,
    pub has_more: bool,
    /// Comment count of the parent post, responses included.
    pub total_comments: u64,
}

#[async_trait]
pub trait FeedApi: Send + Sync {
    async fn list_posts(&self, query: &PostListQuery, page: u32) -> Result<PostsPage, ApiError>;

    async fn get_post(&self, id: PostId) -> Result<Post, ApiError>;

    async fn list_comments(&self, post_id: PostId, page: u32) -> Result<CommentsPage, ApiError>;

    async fn list_responses(
        &self,
        post_id: PostId,
        comment_id: PostId,
        page: u32,
    ) -> Result<ResponsesPage, ApiError>;

    async fn create_post(&self, request: &CreatePostRequest) -> Result<PostId, ApiError>;

    async fn update_post(&self, id: PostId, request: &UpdatePostRequest) -> Result<(), ApiError>;

    async fn delete_post(&self, id: PostId) -> Result<(), ApiError>;

    async fn react(&self, request: &ReactionRequest) -> Result<(), ApiError>;

    async fn toggle_favorite(&self, post_id: PostId) -> Result<(), ApiError>;

    async fn post_history(&self, id: PostId) -> Result<PostHistoryDto, ApiError>;

    async fn get_user(&self, id: UserId) -> Result<UserProfile, ApiError>;

    async fn follow(&self, id: UserId) -> Result<(), ApiError>;

    async fn unfollow(&self, id: UserId) -> Result<(), ApiError>;

    async fn popular_tags(&self) -> Result<Vec<TagCount>, ApiError>;
}
