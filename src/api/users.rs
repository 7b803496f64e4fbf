use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{validate_account_edit, validate_id, validate_profile};
use super::{AccountDto, ApiError, ApiResponse, AppState, FollowDto, PostDto, UserDto};
use crate::db::ProfileChanges;
use crate::domain::User;
use crate::services::AccountEdit;

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
}

impl From<ProfileRequest> for ProfileChanges {
    fn from(request: ProfileRequest) -> Self {
        Self {
            name: request.name,
            location: request.location,
            about_me: request.about_me,
        }
    }
}

#[derive(Deserialize)]
pub struct AccountRequest {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub confirmed: bool,
    pub role: String,
    #[serde(flatten)]
    pub profile: ProfileRequest,
}

async fn find_user(state: &AppState, id: i32) -> Result<User, ApiError> {
    let id = validate_id("user", id)?;
    state
        .store()
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))
}

async fn profile_of(state: &AppState, user: &User) -> Result<UserDto, ApiError> {
    let post_count = state.store().count_posts_by_author(user.id).await?;
    let follower_count = state.store().follower_count(user.id).await?;
    Ok(UserDto::new(user, post_count, follower_count))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = find_user(&state, id).await?;
    Ok(Json(ApiResponse::success(profile_of(&state, &user).await?)))
}

/// PUT /api/v1/users/me
pub async fn edit_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser { user }: CurrentUser,
    Json(payload): Json<ProfileRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    validate_profile(payload.name.as_deref(), payload.location.as_deref())?;

    let updated = state.auth().update_profile(user.id, payload.into()).await?;
    Ok(Json(ApiResponse::success(profile_of(&state, &updated).await?)))
}

/// PUT /api/v1/users/{id}
/// Administrators may rewrite email, username, confirmation, role and profile.
pub async fn edit_account(
    State(state): State<Arc<AppState>>,
    CurrentUser { user: admin }: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<AccountRequest>,
) -> Result<Json<ApiResponse<AccountDto>>, ApiError> {
    let id = validate_id("user", id)?;
    validate_account_edit(
        &payload.email,
        &payload.username,
        payload.profile.name.as_deref(),
        payload.profile.location.as_deref(),
    )?;

    let edited = state
        .auth()
        .edit_account(
            id,
            AccountEdit {
                email: payload.email,
                username: payload.username,
                confirmed: payload.confirmed,
                role: payload.role,
                profile: payload.profile.into(),
            },
        )
        .await?;

    tracing::info!(admin_id = admin.id, user_id = edited.id, "Account edited");
    Ok(Json(ApiResponse::success(AccountDto::from(&edited))))
}

/// GET /api/v1/users/{id}/posts
pub async fn get_user_posts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<PostDto>>>, ApiError> {
    let user = find_user(&state, id).await?;
    let limit = state.config().app.posts_per_page;

    let posts = state.store().posts_by_author(user.id, limit).await?;

    Ok(Json(ApiResponse::success(
        posts.into_iter().map(PostDto::from).collect(),
    )))
}

/// GET /api/v1/users/{id}/timeline
/// Newest posts from everyone the user follows, their own included.
pub async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<PostDto>>>, ApiError> {
    let user = find_user(&state, id).await?;
    let limit = state.config().app.posts_per_page;

    let posts = state.store().followed_posts(user.id, limit).await?;

    Ok(Json(ApiResponse::success(
        posts.into_iter().map(PostDto::from).collect(),
    )))
}

/// POST /api/v1/users/{id}/follow
pub async fn follow(
    State(state): State<Arc<AppState>>,
    CurrentUser { user }: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<FollowDto>>, ApiError> {
    let target = find_user(&state, id).await?;

    if state.store().follow(user.id, target.id).await? {
        tracing::info!(follower_id = user.id, followed_id = target.id, "Now following");
    }

    Ok(Json(ApiResponse::success(FollowDto {
        user_id: target.id,
        following: true,
    })))
}

/// DELETE /api/v1/users/{id}/follow
pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    CurrentUser { user }: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<FollowDto>>, ApiError> {
    let target = find_user(&state, id).await?;

    if target.id == user.id {
        return Err(ApiError::validation("You cannot unfollow yourself"));
    }

    state.store().unfollow(user.id, target.id).await?;

    Ok(Json(ApiResponse::success(FollowDto {
        user_id: target.id,
        following: false,
    })))
}
