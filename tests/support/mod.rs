//! Scripted in-memory feed server for engine tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use feedsync::application::api::{
    ApiError, CommentsPage, FeedApi, PostListQuery, PostsPage, ResponsesPage,
};
use feedsync::application::engine::FeedEngine;
use feedsync::cache::{CacheConfig, ChangeEvent, ChangeHandler, ViewSnapshot};
use feedsync::domain::entities::{
    Author, Post, PostBody, PostId, TagCount, UserId, UserProfile, UserSummary,
};
use feedsync::domain::reaction::Reaction;
use feedsync_api_types::{CreatePostRequest, PostHistoryDto, ReactionRequest, UpdatePostRequest};
use time::{Duration, OffsetDateTime, macros::datetime};
use tokio::sync::oneshot;
use uuid::Uuid;

const EPOCH: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

/// A request parked at a gate until the test releases it.
pub struct Gate {
    entered: Option<oneshot::Receiver<()>>,
    release: Option<oneshot::Sender<()>>,
}

impl Gate {
    /// Wait until the gated request has reached the server.
    pub async fn entered(&mut self) {
        if let Some(entered) = self.entered.take() {
            entered.await.expect("gated request dropped");
        }
    }

    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
    }
}

struct Held {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Script {
    lists: HashMap<(String, u32), PostsPage>,
    posts: HashMap<PostId, Post>,
    comments: HashMap<(PostId, u32), CommentsPage>,
    responses: HashMap<(PostId, u32), ResponsesPage>,
    profiles: HashMap<UserId, UserProfile>,
    tags: Vec<TagCount>,
    histories: HashMap<PostId, PostHistoryDto>,
    failures: HashMap<&'static str, ApiError>,
    held: HashMap<String, Held>,
    calls: Vec<String>,
    created: Vec<CreatePostRequest>,
    reactions: Vec<ReactionRequest>,
}

#[derive(Default)]
pub struct ScriptedApi {
    script: Mutex<Script>,
}

fn query_label(query: &PostListQuery) -> String {
    match query {
        PostListQuery::Home => "home".to_string(),
        PostListQuery::User(id) => format!("user/{id}"),
        PostListQuery::Tag(tag) => format!("tag/{tag}"),
        PostListQuery::Search(text) => format!("search/{text}"),
        PostListQuery::Favorites => "favorites".to_string(),
    }
}

fn missing() -> ApiError {
    ApiError::status(404, "missing fixture")
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        f(&mut self.script.lock().expect("script lock"))
    }

    pub fn set_page(&self, query: PostListQuery, page: u32, posts: Vec<Post>, has_more: bool) {
        for post in &posts {
            self.set_post(post.clone());
        }
        self.with(|script| {
            script.lists.insert(
                (query_label(&query), page),
                PostsPage {
                    posts,
                    has_more,
                    total: None,
                },
            )
        });
    }

    pub fn set_post(&self, post: Post) {
        self.with(|script| script.posts.insert(post.id, post));
    }

    pub fn set_comments(&self, post_id: PostId, page: u32, comments: Vec<Post>, total: u64) {
        self.with(|script| {
            script.comments.insert(
                (post_id, page),
                CommentsPage {
                    comments,
                    total,
                    has_more: false,
                },
            )
        });
    }

    pub fn set_responses(
        &self,
        comment_id: PostId,
        page: u32,
        responses: Vec<Post>,
        total: u64,
        total_comments: u64,
    ) {
        self.with(|script| {
            script.responses.insert(
                (comment_id, page),
                ResponsesPage {
                    responses,
                    total,
                    has_more: false,
                    total_comments,
                },
            )
        });
    }

    pub fn set_profile(&self, profile: UserProfile) {
        self.with(|script| script.profiles.insert(profile.id, profile));
    }

    pub fn set_tags(&self, tags: Vec<TagCount>) {
        self.with(|script| script.tags = tags);
    }

    pub fn set_history(&self, id: PostId, history: PostHistoryDto) {
        self.with(|script| script.histories.insert(id, history));
    }

    /// Make every later call of `operation` fail with `error`.
    pub fn fail(&self, operation: &'static str, error: ApiError) {
        self.with(|script| script.failures.insert(operation, error));
    }

    pub fn succeed(&self, operation: &'static str) {
        self.with(|script| script.failures.remove(operation));
    }

    /// Park the next call labelled `label` until the returned gate is released.
    pub fn hold(&self, label: impl Into<String>) -> Gate {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.with(|script| {
            script.held.insert(
                label.into(),
                Held {
                    entered: entered_tx,
                    release: release_rx,
                },
            )
        });
        Gate {
            entered: Some(entered_rx),
            release: Some(release_tx),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|script| script.calls.clone())
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        self.with(|script| {
            script
                .calls
                .iter()
                .filter(|call| call.split(':').next() == Some(operation))
                .count()
        })
    }

    pub fn created(&self) -> Vec<CreatePostRequest> {
        self.with(|script| script.created.clone())
    }

    pub fn reactions(&self) -> Vec<ReactionRequest> {
        self.with(|script| script.reactions.clone())
    }

    async fn enter(&self, operation: &'static str, detail: String) -> Result<(), ApiError> {
        let label = if detail.is_empty() {
            operation.to_string()
        } else {
            format!("{operation}:{detail}")
        };
        let held = self.with(|script| {
            script.calls.push(label.clone());
            script.held.remove(&label)
        });
        if let Some(held) = held {
            let _ = held.entered.send(());
            let _ = held.release.await;
        }
        self.with(|script| match script.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        })
    }
}

#[async_trait]
impl FeedApi for ScriptedApi {
    async fn list_posts(&self, query: &PostListQuery, page: u32) -> Result<PostsPage, ApiError> {
        let label = query_label(query);
        self.enter("list_posts", format!("{label}:{page}")).await?;
        self.with(|script| script.lists.get(&(label, page)).cloned())
            .ok_or_else(missing)
    }

    async fn get_post(&self, id: PostId) -> Result<Post, ApiError> {
        self.enter("get_post", id.to_string()).await?;
        self.with(|script| script.posts.get(&id).cloned())
            .ok_or_else(missing)
    }

    async fn list_comments(&self, post_id: PostId, page: u32) -> Result<CommentsPage, ApiError> {
        self.enter("list_comments", format!("{post_id}:{page}")).await?;
        self.with(|script| script.comments.get(&(post_id, page)).cloned())
            .ok_or_else(missing)
    }

    async fn list_responses(
        &self,
        _post_id: PostId,
        comment_id: PostId,
        page: u32,
    ) -> Result<ResponsesPage, ApiError> {
        self.enter("list_responses", format!("{comment_id}:{page}"))
            .await?;
        self.with(|script| script.responses.get(&(comment_id, page)).cloned())
            .ok_or_else(missing)
    }

    async fn create_post(&self, request: &CreatePostRequest) -> Result<PostId, ApiError> {
        self.enter("create_post", String::new()).await?;
        self.with(|script| script.created.push(request.clone()));
        Ok(Uuid::new_v4())
    }

    async fn update_post(&self, id: PostId, _request: &UpdatePostRequest) -> Result<(), ApiError> {
        self.enter("update_post", id.to_string()).await
    }

    async fn delete_post(&self, id: PostId) -> Result<(), ApiError> {
        self.enter("delete_post", id.to_string()).await
    }

    async fn react(&self, request: &ReactionRequest) -> Result<(), ApiError> {
        self.enter("react", request.post_id.to_string()).await?;
        self.with(|script| script.reactions.push(request.clone()));
        Ok(())
    }

    async fn toggle_favorite(&self, post_id: PostId) -> Result<(), ApiError> {
        self.enter("toggle_favorite", post_id.to_string()).await
    }

    async fn post_history(&self, id: PostId) -> Result<PostHistoryDto, ApiError> {
        self.enter("post_history", id.to_string()).await?;
        self.with(|script| script.histories.get(&id).cloned())
            .ok_or_else(missing)
    }

    async fn get_user(&self, id: UserId) -> Result<UserProfile, ApiError> {
        self.enter("get_user", id.to_string()).await?;
        self.with(|script| script.profiles.get(&id).cloned())
            .ok_or_else(missing)
    }

    async fn follow(&self, id: UserId) -> Result<(), ApiError> {
        self.enter("follow", id.to_string()).await
    }

    async fn unfollow(&self, id: UserId) -> Result<(), ApiError> {
        self.enter("unfollow", id.to_string()).await
    }

    async fn popular_tags(&self) -> Result<Vec<TagCount>, ApiError> {
        self.enter("popular_tags", String::new()).await?;
        Ok(self.with(|script| script.tags.clone()))
    }
}

pub fn viewer() -> UserSummary {
    UserSummary {
        id: Uuid::from_u128(0xfeed),
        username: "viewer".to_string(),
        name: "Viewer".to_string(),
        avatar_url: None,
    }
}

pub fn author() -> UserSummary {
    UserSummary {
        id: Uuid::from_u128(0xa17),
        username: "ada".to_string(),
        name: "Ada".to_string(),
        avatar_url: None,
    }
}

/// A live top-level post created `minute` minutes after a fixed epoch.
pub fn post(minute: i64) -> Post {
    Post {
        id: Uuid::new_v4(),
        created_at: EPOCH + Duration::minutes(minute),
        updated_at: None,
        original_id: None,
        comment_to_id: None,
        response_to_id: None,
        like_count: 0,
        dislike_count: 0,
        comment_count: 0,
        response_count: 0,
        repost_count: 0,
        viewer_reaction: Reaction::None,
        is_favorite: false,
        can_comment: true,
        body: PostBody::Live {
            text: format!("post #{minute}"),
            author: Author::User(author()),
            media: Vec::new(),
        },
    }
}

pub fn comment_on(minute: i64, post_id: PostId) -> Post {
    let mut comment = post(minute);
    comment.comment_to_id = Some(post_id);
    comment
}

pub fn response_to(minute: i64, post_id: PostId, comment_id: PostId) -> Post {
    let mut response = comment_on(minute, post_id);
    response.response_to_id = Some(comment_id);
    response
}

pub fn profile(id: UserId) -> UserProfile {
    UserProfile {
        id,
        username: format!("user-{id}"),
        name: "Someone".to_string(),
        avatar_url: None,
        bio: None,
        followers: 10,
        following: 3,
        post_count: 7,
        is_subscribed: false,
    }
}

pub fn engine(api: &Arc<ScriptedApi>) -> FeedEngine {
    FeedEngine::new(api.clone(), CacheConfig::default())
}

pub fn signed_in(api: &Arc<ScriptedApi>) -> FeedEngine {
    let engine = engine(api);
    engine.set_viewer(Some(viewer()));
    engine
}

pub type Deliveries = Arc<Mutex<Vec<(ChangeEvent, ViewSnapshot)>>>;

/// Handler recording every delivery it receives.
pub fn recorder() -> (ChangeHandler, Deliveries) {
    let deliveries: Deliveries = Arc::new(Mutex::new(Vec::new()));
    let sink = deliveries.clone();
    let handler: ChangeHandler = Arc::new(move |event: &ChangeEvent, snapshot: &ViewSnapshot| {
        sink.lock()
            .expect("deliveries lock")
            .push((event.clone(), snapshot.clone()));
    });
    (handler, deliveries)
}
