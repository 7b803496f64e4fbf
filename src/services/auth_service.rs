//! Domain service for accounts and authentication.
//!
//! Handles registration, password login, email confirmation, API tokens,
//! password changes and profile edits.

use serde::Serialize;
use thiserror::Error;

use crate::db::ProfileChanges;
use crate::domain::{CredentialError, User};
use crate::services::tokens::TokenError;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Username already in use")]
    DuplicateUsername,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Authentication required")]
    Unauthenticated,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Fields submitted by the registration form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// An administrator's rewrite of someone else's account.
#[derive(Debug, Clone)]
pub struct AccountEdit {
    pub email: String,
    pub username: String,
    pub confirmed: bool,
    /// Role name, e.g. "Moderator".
    pub role: String,
    pub profile: ProfileChanges,
}

/// An API token and its lifetime in seconds.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expiration: u64,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an unconfirmed account and queues its confirmation mail.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateEmail`] or [`AuthError::DuplicateUsername`]
    /// when either is already taken.
    async fn register(&self, registration: Registration) -> Result<User, AuthError>;

    /// Looks the identifier up as an email, then as a username, and checks the
    /// password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown identifier or a
    /// wrong password, without saying which.
    async fn authenticate_password(&self, identifier: &str, password: &str)
    -> Result<User, AuthError>;

    /// Confirms `user_id` if the token was issued for exactly that user.
    /// Returns whether the token was accepted; already-confirmed users stay
    /// confirmed.
    async fn confirm(&self, user_id: i32, token: &str) -> Result<bool, AuthError>;

    /// Issues a new confirmation token and mails it.
    async fn resend_confirmation(&self, user: &User) -> Result<(), AuthError>;

    async fn issue_auth_token(&self, user_id: i32) -> Result<IssuedToken, AuthError>;

    /// Resolves an auth token to its user. Any failure is `None`.
    async fn resolve_token(&self, token: &str) -> Result<Option<User>, AuthError>;

    async fn get_user(&self, user_id: i32) -> Result<Option<User>, AuthError>;

    /// Records activity for an authenticated user.
    async fn ping(&self, user_id: i32) -> Result<(), AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the current password is wrong or
    /// the new one is empty.
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Rewrites the caller's own name, location and about-me text.
    async fn update_profile(
        &self,
        user_id: i32,
        changes: ProfileChanges,
    ) -> Result<User, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateEmail`] or [`AuthError::DuplicateUsername`]
    /// when another account holds the new value, and [`AuthError::Validation`]
    /// for an unknown role.
    async fn edit_account(&self, user_id: i32, edit: AccountEdit) -> Result<User, AuthError>;
}
