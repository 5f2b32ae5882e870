use async_trait::async_trait;
use feedsync_api_types::{
    CommentsPageDto, CreatePostRequest, CreatedDto, FavoriteRequest, PostDto, PostHistoryDto,
    PostsPageDto, ReactionRequest, ResponsesPageDto, TagsDto, UpdatePostRequest, UserProfileDto,
};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::application::api::{
    ApiError, CommentsPage, FeedApi, PostListQuery, PostsPage, ResponsesPage,
};
use crate::config::ApiSettings;
use crate::domain::entities::{Post, PostId, TagCount, UserId, UserProfile};
use crate::infra::error::InfraError;

/// [`FeedApi`] over the server's JSON endpoints.
#[derive(Clone, Debug)]
pub struct HttpFeedApi {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpFeedApi {
    pub fn new(settings: &ApiSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            base: settings.base_url.clone(),
            token: settings.token.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("feedsync/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| ApiError::InvalidUrl(format!("{path}: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.url(path, query)?;
        debug!(method = %method, url = %url, "Feed API request");
        let builder = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self
            .request(Method::GET, path, query)?
            .send()
            .await
            .map_err(ApiError::transport)?;
        Self::decode(response).await
    }

    async fn send_unit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await.map_err(ApiError::transport)?;
        Self::check(response).await.map(drop)
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::status(status.as_u16(), body))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(ApiError::transport)?;
        serde_json::from_slice(&bytes).map_err(ApiError::decode)
    }
}

fn page_query(page: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string())]
}

fn posts_page(dto: PostsPageDto) -> PostsPage {
    PostsPage {
        posts: dto.posts.into_iter().map(Post::from).collect(),
        has_more: dto.has_more,
        total: dto.total,
    }
}

#[async_trait]
impl FeedApi for HttpFeedApi {
    async fn list_posts(&self, query: &PostListQuery, page: u32) -> Result<PostsPage, ApiError> {
        let mut params = page_query(page);
        let path = match query {
            PostListQuery::Home => "post".to_string(),
            PostListQuery::User(id) => format!("user/{id}/posts"),
            PostListQuery::Tag(tag) => format!("tags/{tag}"),
            PostListQuery::Search(text) => {
                params.push(("q", text.clone()));
                "post/search".to_string()
            }
            PostListQuery::Favorites => "post/favorite".to_string(),
        };
        self.get_json::<PostsPageDto>(&path, &params)
            .await
            .map(posts_page)
    }

    async fn get_post(&self, id: PostId) -> Result<Post, ApiError> {
        self.get_json::<PostDto>(&format!("post/{id}"), &[])
            .await
            .map(Post::from)
    }

    async fn list_comments(&self, post_id: PostId, page: u32) -> Result<CommentsPage, ApiError> {
        let mut params = page_query(page);
        params.push(("postId", post_id.to_string()));
        let dto: CommentsPageDto = self.get_json("comment", &params).await?;
        Ok(CommentsPage {
            comments: dto.comments.into_iter().map(Post::from).collect(),
            total: dto.total,
            has_more: dto.has_more,
        })
    }

    async fn list_responses(
        &self,
        post_id: PostId,
        comment_id: PostId,
        page: u32,
    ) -> Result<ResponsesPage, ApiError> {
        let mut params = page_query(page);
        params.push(("postId", post_id.to_string()));
        let dto: ResponsesPageDto = self
            .get_json(&format!("comment/{comment_id}"), &params)
            .await?;
        Ok(ResponsesPage {
            responses: dto.comments.into_iter().map(Post::from).collect(),
            total: dto.total,
            has_more: dto.has_more,
            total_comments: dto.total_comments,
        })
    }

    async fn create_post(&self, request: &CreatePostRequest) -> Result<PostId, ApiError> {
        let path = match request.comment_to_id {
            Some(post_id) => format!("comment/{post_id}"),
            None => "post".to_string(),
        };
        let response = self
            .request(Method::POST, &path, &[])?
            .json(request)
            .send()
            .await
            .map_err(ApiError::transport)?;
        let created: CreatedDto = Self::decode(response).await?;
        Ok(created.id)
    }

    async fn update_post(&self, id: PostId, request: &UpdatePostRequest) -> Result<(), ApiError> {
        let builder = self
            .request(Method::PATCH, &format!("post/{id}"), &[])?
            .json(request);
        self.send_unit(builder).await
    }

    async fn delete_post(&self, id: PostId) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &format!("post/{id}"), &[])?;
        self.send_unit(builder).await
    }

    async fn react(&self, request: &ReactionRequest) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, "post/reaction", &[])?
            .json(request);
        self.send_unit(builder).await
    }

    async fn toggle_favorite(&self, post_id: PostId) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, "post/favorite", &[])?
            .json(&FavoriteRequest { post_id });
        self.send_unit(builder).await
    }

    async fn post_history(&self, id: PostId) -> Result<PostHistoryDto, ApiError> {
        self.get_json(&format!("post/{id}/history"), &[]).await
    }

    async fn get_user(&self, id: UserId) -> Result<UserProfile, ApiError> {
        self.get_json::<UserProfileDto>(&format!("user/{id}"), &[])
            .await
            .map(UserProfile::from)
    }

    async fn follow(&self, id: UserId) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, &format!("user/{id}/follow"), &[])?;
        self.send_unit(builder).await
    }

    async fn unfollow(&self, id: UserId) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, &format!("user/{id}/unfollow"), &[])?;
        self.send_unit(builder).await
    }

    async fn popular_tags(&self) -> Result<Vec<TagCount>, ApiError> {
        let dto: TagsDto = self.get_json("tags/popular", &[]).await?;
        Ok(dto.tags.into_iter().map(TagCount::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;

    fn api(base: &str) -> HttpFeedApi {
        HttpFeedApi::new(&ApiSettings {
            base_url: Url::parse(base).expect("valid url"),
            token: Some("secret".to_string()),
            timeout: Duration::from_secs(5),
            viewer_id: None,
        })
        .expect("client")
    }

    #[test]
    fn urls_keep_the_base_path() {
        let api = api("https://feed.example/api/");
        let url = api
            .url("post/search", &[("page", "2".to_string()), ("q", "a b".to_string())])
            .expect("url");
        assert_eq!(url.as_str(), "https://feed.example/api/post/search?page=2&q=a+b");
    }

    #[test]
    fn ids_are_interpolated_into_paths() {
        let api = api("https://feed.example/");
        let id = Uuid::nil();
        let url = api.url(&format!("post/{id}/history"), &[]).expect("url");
        assert_eq!(
            url.as_str(),
            "https://feed.example/post/00000000-0000-0000-0000-000000000000/history"
        );
    }

    #[test]
    fn user_agent_names_the_crate() {
        assert!(HttpFeedApi::user_agent().starts_with("feedsync/"));
    }
}
