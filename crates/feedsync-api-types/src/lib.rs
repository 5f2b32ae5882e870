//! Wire types for the social-feed HTTP API.
//!
//! Field names follow the server's camelCase JSON. Timestamps travel as RFC 3339
//! strings. These types carry no behavior; the engine converts them into its own
//! domain model on arrival.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Author summary embedded in a post payload.
///
/// A deleted account only carries `isDeleted: true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUserDto {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Attachment descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDto {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub url_modifiers: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub mime: String,
    #[serde(default)]
    pub subtype: String,
    pub width: u32,
    pub height: u32,
}

/// A post, comment or response as returned by list and single-entity endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub id: Uuid,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<PostUserDto>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub original_id: Option<Uuid>,
    #[serde(default)]
    pub comment_to_id: Option<Uuid>,
    #[serde(default)]
    pub response_to_id: Option<Uuid>,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub dislikes: u32,
    #[serde(default)]
    pub comments: u32,
    #[serde(default)]
    pub response_count: u32,
    #[serde(default)]
    pub reposts: u32,
    /// `1` liked, `-1` disliked, `0` none.
    #[serde(default)]
    pub reaction: i8,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default = "default_true")]
    pub can_comment: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub media: Vec<MediaDto>,
}

fn default_true() -> bool {
    true
}

/// Page of posts from the feed, user, tag, search and favorites endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsPageDto {
    pub posts: Vec<PostDto>,
    pub has_more: bool,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Page of top-level comments for a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsPageDto {
    pub comments: Vec<PostDto>,
    pub total: u64,
    pub has_more: bool,
}

/// Page of nested responses under a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsesPageDto {
    pub comments: Vec<PostDto>,
    pub total: u64,
    pub has_more: bool,
    pub total_comments: u64,
}

/// Body of `POST /post`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_to_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_to_id: Option<Uuid>,
    pub can_comment: bool,
    pub media: Vec<MediaDto>,
}

/// Response of every create endpoint. The entity body is never echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDto {
    pub id: Uuid,
}

/// Body of `POST /post/reaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub post_id: Uuid,
    pub liked: bool,
    pub comment_to_id: Option<Uuid>,
    pub response_to_id: Option<Uuid>,
}

/// Body of `POST /post/favorite`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub post_id: Uuid,
}

/// Body of `PATCH /post/{id}`; only changed fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_comment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaDto>>,
}

/// Public profile returned by `GET /user/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileDto {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    #[serde(default)]
    pub post_count: u32,
    #[serde(default)]
    pub is_subscribed: bool,
}

/// Tag with the number of posts carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCountDto {
    pub name: String,
    pub post_count: u64,
}

/// Response of `GET /tags/popular`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsDto {
    pub tags: Vec<TagCountDto>,
}

/// One stored text revision of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostChangeDto {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Attachment with its own lifecycle timestamps, as listed in a post's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMediaDto {
    #[serde(flatten)]
    pub media: MediaDto,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Response of `GET /post/{id}/history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostHistoryDto {
    pub changes: Vec<PostChangeDto>,
    pub media: Vec<HistoryMediaDto>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_post_payload_parses_without_body_fields() {
        let json = r#"{
            "id": "6a1f7a2e-2c5d-4f5e-9a43-0d7c1f3b9e11",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": null,
            "likes": 2,
            "comments": 5,
            "isDeleted": true
        }"#;

        let post: PostDto = serde_json::from_str(json).expect("deleted post parses");
        assert!(post.is_deleted);
        assert!(post.text.is_none());
        assert!(post.user.is_none());
        assert_eq!(post.comments, 5);
        assert!(post.media.is_empty());
    }

    #[test]
    fn create_request_omits_absent_targets() {
        let request = CreatePostRequest {
            text: "hello #rust".to_string(),
            original_id: None,
            comment_to_id: None,
            response_to_id: None,
            can_comment: true,
            media: Vec::new(),
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["text"], "hello #rust");
        assert_eq!(value["canComment"], true);
        assert!(value.get("originalId").is_none());
        assert!(value.get("commentToId").is_none());
    }

    #[test]
    fn update_request_only_carries_changed_fields() {
        let request = UpdatePostRequest {
            can_comment: Some(false),
            ..Default::default()
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value, serde_json::json!({ "canComment": false }));
    }

    #[test]
    fn history_media_flattens_descriptor() {
        let json = r#"{
            "id": "m1",
            "url": "https://cdn.example/m1",
            "type": "image",
            "mime": "image/png",
            "width": 10,
            "height": 20,
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-02T10:00:00Z",
            "isDeleted": true
        }"#;

        let media: HistoryMediaDto = serde_json::from_str(json).expect("history media parses");
        assert_eq!(media.media.kind, "image");
        assert!(media.is_deleted);
    }
}
