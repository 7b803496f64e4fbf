use axum::Json;
use serde::Serialize;

use super::ApiResponse;
use crate::domain::Principal;

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub greeting: String,
    pub authenticated: bool,
}

/// GET /
pub async fn index(principal: Principal) -> Json<ApiResponse<IndexResponse>> {
    let name = principal
        .user()
        .map_or("Stranger", |user| user.username.as_str());

    Json(ApiResponse::success(IndexResponse {
        greeting: format!("Hello, {name}!"),
        authenticated: !principal.is_anonymous(),
    }))
}
