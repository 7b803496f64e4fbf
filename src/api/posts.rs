use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{validate_id, validate_post_body};
use super::{ApiError, ApiResponse, AppState, PostDto};
use crate::domain::{Capabilities, Post};

#[derive(Deserialize)]
pub struct PostRequest {
    pub body: String,
}

/// POST /api/v1/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    CurrentUser { user }: CurrentUser,
    Json(payload): Json<PostRequest>,
) -> Result<Response, ApiError> {
    let body = validate_post_body(&payload.body)?;

    let post = state
        .store()
        .create_post(&Post::draft(user.id, body))
        .await?;

    tracing::info!(post_id = post.id, author_id = user.id, "Post created");

    let location = format!("/api/v1/posts/{}", post.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ApiResponse::success(PostDto::from(post))),
    )
        .into_response())
}

/// GET /api/v1/posts
/// Newest posts from everyone, capped at `app.posts_per_page`.
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<PostDto>>>, ApiError> {
    let limit = state.config().app.posts_per_page;
    let posts = state.store().recent_posts(limit).await?;

    Ok(Json(ApiResponse::success(
        posts.into_iter().map(PostDto::from).collect(),
    )))
}

/// GET /api/v1/posts/{id}
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let id = validate_id("post", id)?;

    let post = state
        .store()
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post", id))?;

    Ok(Json(ApiResponse::success(PostDto::from(post))))
}

/// PUT /api/v1/posts/{id}
/// Only the author or an administrator may edit.
pub async fn edit_post(
    State(state): State<Arc<AppState>>,
    CurrentUser { user }: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<PostRequest>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let id = validate_id("post", id)?;
    let body = validate_post_body(&payload.body)?;

    let mut post = state
        .store()
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post", id))?;

    if post.author_id != user.id && !user.is_admin() {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }

    post.set_body(body);
    state.store().update_post_body(&post).await?;

    Ok(Json(ApiResponse::success(PostDto::from(post))))
}
