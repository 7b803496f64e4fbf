use serde::Serialize;

use crate::domain::{Post, User};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public profile of a user. Never carries the email or the password hash.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub url: String,
    pub username: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: String,
    pub last_seen: String,
    pub role: Option<String>,
    pub posts_url: String,
    pub followed_posts_url: String,
    pub post_count: u64,
    pub follower_count: u64,
}

impl UserDto {
    #[must_use]
    pub fn new(user: &User, post_count: u64, follower_count: u64) -> Self {
        Self {
            id: user.id,
            url: format!("/api/v1/users/{}", user.id),
            username: user.username.clone(),
            name: user.name.clone(),
            location: user.location.clone(),
            about_me: user.about_me.clone(),
            member_since: user.member_since.clone(),
            last_seen: user.last_seen.clone(),
            role: user.role.as_ref().map(|role| role.name.clone()),
            posts_url: format!("/api/v1/users/{}/posts", user.id),
            followed_posts_url: format!("/api/v1/users/{}/timeline", user.id),
            post_count,
            follower_count,
        }
    }
}

/// The signed-in user's own view, including private fields.
#[derive(Debug, Serialize)]
pub struct AccountDto {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub confirmed: bool,
    pub role: Option<String>,
    pub permissions: i32,
    pub member_since: String,
    pub last_seen: String,
}

impl From<&User> for AccountDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            confirmed: user.confirmed,
            role: user.role.as_ref().map(|role| role.name.clone()),
            permissions: user.permissions().bits(),
            member_since: user.member_since.clone(),
            last_seen: user.last_seen.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDto {
    pub id: i32,
    pub url: String,
    pub body: String,
    pub body_html: String,
    pub timestamp: String,
    pub author_id: i32,
    pub author_url: String,
}

impl From<Post> for PostDto {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            url: format!("/api/v1/posts/{}", post.id),
            author_url: format!("/api/v1/users/{}", post.author_id),
            body: post.body,
            body_html: post.body_html,
            timestamp: post.timestamp,
            author_id: post.author_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FollowDto {
    pub user_id: i32,
    pub following: bool,
}
