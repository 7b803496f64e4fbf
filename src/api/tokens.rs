use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::domain::{AuthMethod, Principal};
use crate::services::IssuedToken;

/// GET /api/v1/token
/// Tokens are only handed out against a password, never against another token.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<ApiResponse<IssuedToken>>, ApiError> {
    let (Some(user), Some(AuthMethod::Password)) = (principal.user(), principal.method()) else {
        return Err(ApiError::unauthorized());
    };

    let issued = state.auth().issue_auth_token(user.id).await?;
    Ok(Json(ApiResponse::success(issued)))
}
