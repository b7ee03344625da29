use serde::{Deserialize, Serialize};

use crate::models::{Notification, Post, User};

// -- JWT Claims --

/// Bearer token claims shared by the REST middleware and the gateway
/// handshake. `sub` is the identity provider's user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
    pub online: usize,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkMessagesReadRequest {
    pub sender_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub message: String,
    pub updated: usize,
}

/// A user reachable from the chat sidebar (follower or followed).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPartner {
    #[serde(flatten)]
    pub user: User,
    pub has_unread_messages: bool,
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: u32,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub github_link: Option<String>,
    pub role: Option<String>,
    pub profile_pic: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub follower_count: u32,
    pub following_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OnboardingStatus {
    pub onboarded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowResponse {
    pub following: bool,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub like: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookmarkResponse {
    pub bookmarked: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub next_page: Option<u32>,
}

// -- Projects --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub github_url: String,
    pub live_url: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

// -- Blogs --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}
