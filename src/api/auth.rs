use axum::{
    Form, Json,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use serde::{Deserialize, Deserializer};
use std::convert::Infallible;
use std::sync::Arc;
use tower_sessions::{Expiry, Session};

use super::validation::{safe_next, validate_registration};
use super::{AccountDto, ApiError, ApiResponse, AppState, MessageResponse};
use crate::domain::{AuthMethod, Capabilities, Permission, Principal, User};
use crate::services::Registration;

/// Session key holding the signed-in user's id.
pub const SESSION_USER_KEY: &str = "user_id";

const REMEMBER_ME_DAYS: i64 = 365;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub remember_me: bool,
}

/// HTML checkboxes submit "y", "on" or "true" when ticked and nothing otherwise.
fn checkbox<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.is_some_and(|v| {
        let v = v.trim();
        !(v.is_empty()
            || v == "0"
            || v.eq_ignore_ascii_case("false")
            || v.eq_ignore_ascii_case("off"))
    }))
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub password2: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Extractors
// ============================================================================

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

/// The authenticated user behind the request; anonymous callers get 401.
pub struct CurrentUser {
    pub user: User,
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(Principal::Authenticated { user, .. }) => Ok(Self { user: user.clone() }),
            _ => Err(ApiError::Unauthorized(
                "Authentication required".to_string(),
            )),
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the caller for every request:
/// 1. Session cookie (from login)
/// 2. `Authorization: Basic` with a token or an email/username and password
/// 3. Otherwise anonymous
///
/// Presented credentials that do not resolve are rejected with 401. Signed-in
/// users who have not confirmed their email are held outside `/auth/`.
pub async fn gateway(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = match user_from_session(&state, &session).await? {
        Some(user) => Principal::authenticated(user, AuthMethod::Session),
        None => match basic_credentials(request.headers()) {
            Some(Ok((identifier, secret))) => {
                resolve_basic(&state, &identifier, &secret).await?
            }
            Some(Err(())) => return Err(ApiError::unauthorized()),
            None => Principal::Anonymous,
        },
    };

    if let Some(user) = principal.user() {
        tracing::Span::current().record("user_id", user.id);

        if let Err(e) = state.auth().ping(user.id).await {
            tracing::warn!(user_id = user.id, error = %e, "Failed to record last_seen");
        }
    }

    if principal.is_unconfirmed() {
        let path = request.uri().path();
        if !path.starts_with("/auth/") {
            if path.starts_with("/api/") {
                return Err(ApiError::forbidden("Unconfirmed account"));
            }
            return Ok(found("/auth/unconfirmed"));
        }
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Rejects anonymous callers with 401.
pub async fn login_required(
    principal: Principal,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if principal.is_anonymous() {
        return Err(ApiError::Unauthorized(
            "Authentication required".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

/// Rejects callers without every bit of `BITS` with 403, anonymous included.
pub async fn permission_required<const BITS: i32>(
    principal: Principal,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !principal.can(Permission::from_bits(BITS)) {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }
    Ok(next.run(request).await)
}

async fn user_from_session(state: &AppState, session: &Session) -> Result<Option<User>, ApiError> {
    let user_id = match session.get::<i32>(SESSION_USER_KEY).await {
        Ok(Some(id)) => id,
        Ok(None) => return Ok(None),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read session");
            return Ok(None);
        }
    };

    let user = state.auth().get_user(user_id).await?;
    if user.is_none() {
        tracing::info!(user_id, "Session refers to a deleted user, clearing it");
        if let Err(e) = session.flush().await {
            tracing::warn!(user_id, error = %e, "Failed to clear stale session");
        }
    }
    Ok(user)
}

/// `Some(Err(()))` means the header is present but unusable.
fn basic_credentials(headers: &HeaderMap) -> Option<Result<(String, String), ()>> {
    let value = headers.get(header::AUTHORIZATION)?;

    let parsed = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("basic"))
        .and_then(|(_, encoded)| {
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .ok()
        })
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|decoded| {
            decoded
                .split_once(':')
                .map(|(id, secret)| (id.to_string(), secret.to_string()))
        });

    Some(parsed.ok_or(()))
}

async fn resolve_basic(
    state: &AppState,
    identifier: &str,
    secret: &str,
) -> Result<Principal, ApiError> {
    if identifier.is_empty() {
        return Ok(Principal::Anonymous);
    }

    let auth = state.auth();

    if secret.is_empty() {
        return match auth.resolve_token(identifier).await? {
            Some(user) => Ok(Principal::authenticated(user, AuthMethod::Token)),
            None => Err(ApiError::unauthorized()),
        };
    }

    if let Some(user) = auth.resolve_token(secret).await? {
        return Ok(Principal::authenticated(user, AuthMethod::Token));
    }

    let user = auth.authenticate_password(identifier, secret).await?;
    Ok(Principal::authenticated(user, AuthMethod::Password))
}

/// 302 with a `Location` header.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if form.email.is_empty() || form.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let user = state
        .auth()
        .authenticate_password(&form.email, &form.password)
        .await
        .map_err(|e| match e {
            crate::services::AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid username or password".to_string())
            }
            other => other.into(),
        })?;

    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to rotate session: {e}")))?;
    session
        .insert(SESSION_USER_KEY, user.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    if form.remember_me {
        session.set_expiry(Some(Expiry::OnInactivity(time::Duration::days(
            REMEMBER_ME_DAYS,
        ))));
    }

    tracing::info!(user_id = user.id, "User logged in");
    Ok(found(safe_next(query.next.as_deref())))
}

/// GET|POST /auth/logout
pub async fn logout(session: Session) -> Result<Response, ApiError> {
    session
        .flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to end session: {e}")))?;
    Ok(found("/"))
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    validate_registration(&form.email, &form.username, &form.password, &form.password2)?;

    state
        .auth()
        .register(Registration {
            email: form.email,
            username: form.username,
            password: form.password,
        })
        .await?;

    Ok(found("/"))
}

/// GET /auth/confirm/{token}
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    CurrentUser { user }: CurrentUser,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    if user.confirmed {
        return Ok(found("/"));
    }

    if !state.auth().confirm(user.id, &token).await? {
        tracing::info!(user_id = user.id, "Rejected confirmation link");
    }
    Ok(found("/"))
}

/// GET /auth/confirm
pub async fn resend_confirmation(
    State(state): State<Arc<AppState>>,
    CurrentUser { user }: CurrentUser,
) -> Result<Response, ApiError> {
    state.auth().resend_confirmation(&user).await?;
    Ok(found("/"))
}

/// GET /auth/unconfirmed
pub async fn unconfirmed(principal: Principal) -> Response {
    match principal.user() {
        Some(user) if !user.confirmed => Json(ApiResponse::success(serde_json::json!({
            "username": user.username,
            "message": "You have not confirmed your account yet. Check your inbox for the confirmation link.",
        })))
        .into_response(),
        _ => found("/"),
    }
}

/// GET /auth/me
pub async fn get_current_user(
    CurrentUser { user }: CurrentUser,
) -> Json<ApiResponse<AccountDto>> {
    Json(ApiResponse::success(AccountDto::from(&user)))
}

/// PUT /auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser { user }: CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .auth()
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully",
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn basic(raw: &str) -> String {
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }

    #[test]
    fn test_no_header_is_none() {
        assert!(basic_credentials(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_basic_pair_decoded() {
        let parsed = basic_credentials(&headers_with(&basic("john@example.com:cat")));
        assert_eq!(
            parsed,
            Some(Ok(("john@example.com".to_string(), "cat".to_string())))
        );
    }

    #[test]
    fn test_token_with_empty_secret() {
        let parsed = basic_credentials(&headers_with(&basic("abc.def.ghi:")));
        assert_eq!(parsed, Some(Ok(("abc.def.ghi".to_string(), String::new()))));
    }

    #[test]
    fn test_secret_may_contain_colons() {
        let parsed = basic_credentials(&headers_with(&basic("john:a:b")));
        assert_eq!(parsed, Some(Ok(("john".to_string(), "a:b".to_string()))));
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("john:cat");
        for scheme in ["basic", "BASIC", "bAsIc"] {
            let parsed = basic_credentials(&headers_with(&format!("{scheme} {encoded}")));
            assert_eq!(parsed, Some(Ok(("john".to_string(), "cat".to_string()))));
        }
    }

    async fn parse_login(body: &str) -> LoginForm {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();
        let Form(form) = Form::<LoginForm>::from_request(request, &()).await.unwrap();
        form
    }

    #[tokio::test]
    async fn test_login_form_checkbox_values() {
        for ticked in ["y", "on", "true", "1"] {
            let form = parse_login(&format!("email=a&password=b&remember_me={ticked}")).await;
            assert!(form.remember_me, "{ticked}");
        }
        assert!(!parse_login("email=a&password=b&remember_me=false").await.remember_me);
        assert!(!parse_login("email=a&password=b").await.remember_me);
    }

    #[test]
    fn test_unusable_headers() {
        assert_eq!(basic_credentials(&headers_with("Bearer xyz")), Some(Err(())));
        assert_eq!(basic_credentials(&headers_with("Basic !!!")), Some(Err(())));
        assert_eq!(
            basic_credentials(&headers_with(&basic("no-colon"))),
            Some(Err(()))
        );
    }

    #[test]
    fn test_found_is_302() {
        let response = found("/auth/unconfirmed");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/unconfirmed"
        );
    }
}
