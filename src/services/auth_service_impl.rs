//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{AccountChanges, NewUser, ProfileChanges, Store};
use crate::domain::{Credentials, Permission, User};
use crate::services::auth_service::{
    AccountEdit, AuthError, AuthService, IssuedToken, Registration,
};
use crate::services::mail::MailQueue;
use crate::services::tokens::TokenService;

pub struct SeaOrmAuthService {
    store: Store,
    tokens: TokenService,
    mail: MailQueue,
    config: Arc<Config>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(
        store: Store,
        tokens: TokenService,
        mail: MailQueue,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            tokens,
            mail,
            config,
        }
    }

    /// The admin email gets the all-permissions role; everyone else the default.
    async fn role_for(&self, email: &str) -> Result<Option<i32>, AuthError> {
        if self.config.is_admin_email(email) {
            if let Some(role) = self.store.get_role_by_permissions(Permission::ALL).await? {
                return Ok(Some(role.id));
            }
        }

        let role = self.store.get_default_role().await?;
        if role.is_none() {
            warn!("No default role found, was the role table seeded?");
        }
        Ok(role.map(|r| r.id))
    }

    fn send_confirmation(&self, user: &User) -> Result<(), AuthError> {
        let ttl = Duration::from_secs(self.config.security.confirmation_token_ttl_seconds);
        let token = self.tokens.issue_confirmation_token(user.id, ttl)?;
        let link = format!(
            "{}/auth/confirm/{token}",
            self.config.server.base_url.trim_end_matches('/')
        );

        let body = format!(
            "Dear {},\n\n\
             Welcome to Flasky!\n\n\
             To confirm your account please open the following link:\n\n\
             {link}\n\n\
             Sincerely,\n\nThe Flasky Team",
            user.username
        );

        self.mail.send(&user.email, "Confirm Your Account", body);
        Ok(())
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        if self.store.email_exists(&registration.email).await? {
            return Err(AuthError::DuplicateEmail);
        }
        if self.store.username_exists(&registration.username).await? {
            return Err(AuthError::DuplicateUsername);
        }

        let role_id = self.role_for(&registration.email).await?;
        let credentials =
            Credentials::from_plaintext_blocking(&registration.password, &self.config.security)
                .await?;

        let user = self
            .store
            .create_user(NewUser {
                email: registration.email,
                username: registration.username,
                password_hash: credentials.stored_hash().to_string(),
                role_id,
                confirmed: false,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "Registered new user");

        self.send_confirmation(&user)?;
        Ok(user)
    }

    async fn authenticate_password(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let Some(user) = self.store.get_user_by_login(identifier).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if user.credentials().verify_blocking(password).await {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn confirm(&self, user_id: i32, token: &str) -> Result<bool, AuthError> {
        if !self.tokens.verify_confirmation_token(token, user_id) {
            return Ok(false);
        }

        if self.store.confirm_user(user_id).await? {
            info!(user_id, "Account confirmed");
        }
        Ok(true)
    }

    async fn resend_confirmation(&self, user: &User) -> Result<(), AuthError> {
        self.send_confirmation(user)
    }

    async fn issue_auth_token(&self, user_id: i32) -> Result<IssuedToken, AuthError> {
        let ttl = self.config.security.auth_token_ttl_seconds;
        let token = self
            .tokens
            .issue_auth_token(user_id, Duration::from_secs(ttl))?;

        Ok(IssuedToken {
            token,
            expiration: ttl,
        })
    }

    async fn resolve_token(&self, token: &str) -> Result<Option<User>, AuthError> {
        match self.tokens.verify_auth_token(token) {
            Some(user_id) => Ok(self.store.get_user(user_id).await?),
            None => Ok(None),
        }
    }

    async fn get_user(&self, user_id: i32) -> Result<Option<User>, AuthError> {
        Ok(self.store.get_user(user_id).await?)
    }

    async fn ping(&self, user_id: i32) -> Result<(), AuthError> {
        Ok(self.store.touch_last_seen(user_id).await?)
    }

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::Validation(
                "New password cannot be empty".to_string(),
            ));
        }

        let mut user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.credentials().verify_blocking(current_password).await {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let credentials =
            Credentials::from_plaintext_blocking(new_password, &self.config.security).await?;
        user.replace_credentials(credentials);

        self.store
            .update_password_hash(user.id, user.credentials().stored_hash().to_string())
            .await?;

        info!(user_id, "Password changed");
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: i32,
        changes: ProfileChanges,
    ) -> Result<User, AuthError> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        let user = self.store.update_profile(user_id, changes).await?;
        info!(user_id, "Profile updated");
        Ok(user)
    }

    async fn edit_account(&self, user_id: i32, edit: AccountEdit) -> Result<User, AuthError> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        if let Some(other) = self.store.get_user_by_email(&edit.email).await?
            && other.id != user_id
        {
            return Err(AuthError::DuplicateEmail);
        }
        if let Some(other) = self.store.get_user_by_username(&edit.username).await?
            && other.id != user_id
        {
            return Err(AuthError::DuplicateUsername);
        }

        let role = self
            .store
            .get_role_by_name(&edit.role)
            .await?
            .ok_or_else(|| AuthError::Validation(format!("Unknown role: {}", edit.role)))?;

        let user = self
            .store
            .update_account(
                user_id,
                AccountChanges {
                    email: edit.email,
                    username: edit.username,
                    confirmed: edit.confirmed,
                    role_id: Some(role.id),
                    profile: edit.profile,
                },
            )
            .await?;

        info!(user_id, role = %role.name, "Account edited by administrator");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Capabilities;
    use crate::domain::user::tests::fast_security;
    use crate::services::mail::tests::RecordingTransport;

    struct Harness {
        service: SeaOrmAuthService,
        tokens: TokenService,
        mail: Arc<RecordingTransport>,
    }

    async fn harness(admin_email: Option<&str>) -> Harness {
        let mut config = Config::default();
        config.security = fast_security();
        config.app.admin_email = admin_email.map(str::to_string);

        let store = Store::new("sqlite::memory:").await.unwrap();
        store.insert_roles().await.unwrap();

        let tokens = TokenService::new(config.security.secret_key.as_bytes()).unwrap();
        let mail = Arc::new(RecordingTransport::default());
        let queue = MailQueue::start(mail.clone(), &config.mail);

        Harness {
            service: SeaOrmAuthService::new(store, tokens.clone(), queue, Arc::new(config)),
            tokens,
            mail,
        }
    }

    fn registration(email: &str, username: &str) -> Registration {
        Registration {
            email: email.to_string(),
            username: username.to_string(),
            password: "cat".to_string(),
        }
    }

    fn token_from(body: &str) -> String {
        body.lines()
            .find_map(|line| line.strip_prefix("http://localhost:5000/auth/confirm/"))
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_register_assigns_default_role_and_mails() {
        let h = harness(None).await;
        let user = h
            .service
            .register(registration("john@example.com", "john"))
            .await
            .unwrap();

        assert!(!user.confirmed);
        assert_eq!(user.role.as_ref().unwrap().name, "User");
        assert!(user.can(Permission::WRITE_ARTICLE));
        assert!(!user.can(Permission::MODERATE_COMMENTS));

        let sent = h.mail.wait_for(1).await;
        assert_eq!(sent[0].to, "john@example.com");
        assert_eq!(sent[0].subject, "[Flasky] Confirm Your Account");
        assert!(h.tokens.verify_confirmation_token(&token_from(&sent[0].body), user.id));
    }

    #[tokio::test]
    async fn test_confirmation_link_uses_base_url() {
        let mut config = Config::default();
        config.security = fast_security();
        config.server.base_url = "https://flasky.example.org/".to_string();

        let store = Store::new("sqlite::memory:").await.unwrap();
        store.insert_roles().await.unwrap();
        let tokens = TokenService::new(config.security.secret_key.as_bytes()).unwrap();
        let mail = Arc::new(RecordingTransport::default());
        let queue = MailQueue::start(mail.clone(), &config.mail);
        let service = SeaOrmAuthService::new(store, tokens, queue, Arc::new(config));

        service
            .register(registration("a@example.com", "alpha"))
            .await
            .unwrap();

        let sent = mail.wait_for(1).await;
        assert!(
            sent[0]
                .body
                .lines()
                .any(|line| line.starts_with("https://flasky.example.org/auth/confirm/"))
        );
    }

    #[tokio::test]
    async fn test_admin_email_gets_administrator() {
        let h = harness(Some("Boss@Example.com")).await;
        let admin = h
            .service
            .register(registration("boss@example.com", "boss"))
            .await
            .unwrap();
        let other = h
            .service
            .register(registration("pleb@example.com", "pleb"))
            .await
            .unwrap();

        assert_eq!(admin.role.as_ref().unwrap().name, "Administrator");
        assert!(admin.is_admin());
        assert!(!other.is_admin());
    }

    #[tokio::test]
    async fn test_duplicates_rejected() {
        let h = harness(None).await;
        h.service
            .register(registration("a@example.com", "alpha"))
            .await
            .unwrap();

        assert!(matches!(
            h.service
                .register(registration("a@example.com", "beta"))
                .await,
            Err(AuthError::DuplicateEmail)
        ));
        assert!(matches!(
            h.service
                .register(registration("b@example.com", "alpha"))
                .await,
            Err(AuthError::DuplicateUsername)
        ));
    }

    #[tokio::test]
    async fn test_email_differing_only_in_case_is_duplicate() {
        let h = harness(None).await;
        let user = h
            .service
            .register(registration("a@b.io", "alpha"))
            .await
            .unwrap();

        assert!(matches!(
            h.service.register(registration("A@B.io", "beta")).await,
            Err(AuthError::DuplicateEmail)
        ));
        let found = h.service.authenticate_password("A@b.IO", "cat").await.unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_authenticate_by_email_or_username() {
        let h = harness(None).await;
        h.service
            .register(registration("a@example.com", "alpha"))
            .await
            .unwrap();

        assert!(h.service.authenticate_password("a@example.com", "cat").await.is_ok());
        assert!(h.service.authenticate_password("alpha", "cat").await.is_ok());
        assert!(matches!(
            h.service.authenticate_password("alpha", "catx").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            h.service.authenticate_password("nobody", "cat").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_confirm_only_flips_matching_user() {
        let h = harness(None).await;
        let a = h.service.register(registration("a@x.io", "a")).await.unwrap();
        let b = h.service.register(registration("b@x.io", "b")).await.unwrap();

        let token = h
            .tokens
            .issue_confirmation_token(a.id, Duration::from_secs(60))
            .unwrap();

        assert!(!h.service.confirm(b.id, &token).await.unwrap());
        assert!(!h.service.get_user(b.id).await.unwrap().unwrap().confirmed);

        assert!(h.service.confirm(a.id, &token).await.unwrap());
        assert!(h.service.confirm(a.id, &token).await.unwrap());
        assert!(h.service.get_user(a.id).await.unwrap().unwrap().confirmed);
    }

    #[tokio::test]
    async fn test_auth_token_resolves_user() {
        let h = harness(None).await;
        let user = h.service.register(registration("a@x.io", "a")).await.unwrap();

        let issued = h.service.issue_auth_token(user.id).await.unwrap();
        assert_eq!(issued.expiration, 3600);

        let resolved = h.service.resolve_token(&issued.token).await.unwrap();
        assert_eq!(resolved.unwrap().id, user.id);
        assert!(h.service.resolve_token("bogus").await.unwrap().is_none());

        let confirm = h
            .tokens
            .issue_confirmation_token(user.id, Duration::from_secs(60))
            .unwrap();
        assert!(h.service.resolve_token(&confirm).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password() {
        let h = harness(None).await;
        let user = h.service.register(registration("a@x.io", "a")).await.unwrap();

        assert!(matches!(
            h.service.change_password(user.id, "wrong", "dog").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            h.service.change_password(user.id, "cat", "").await,
            Err(AuthError::Validation(_))
        ));

        h.service.change_password(user.id, "cat", "dog").await.unwrap();
        assert!(h.service.authenticate_password("a", "dog").await.is_ok());
        assert!(h.service.authenticate_password("a", "cat").await.is_err());
    }

    fn edit(email: &str, username: &str, role: &str) -> AccountEdit {
        AccountEdit {
            email: email.to_string(),
            username: username.to_string(),
            confirmed: true,
            role: role.to_string(),
            profile: ProfileChanges::default(),
        }
    }

    #[tokio::test]
    async fn test_edit_account_rewrites_role() {
        let h = harness(None).await;
        let user = h.service.register(registration("a@x.io", "a")).await.unwrap();

        let edited = h
            .service
            .edit_account(user.id, edit("a@x.io", "a", "Moderator"))
            .await
            .unwrap();

        assert!(edited.confirmed);
        assert_eq!(edited.role.as_ref().unwrap().name, "Moderator");
        assert!(edited.can(Permission::MODERATE_COMMENTS));
    }

    #[tokio::test]
    async fn test_edit_account_checks_other_accounts() {
        let h = harness(None).await;
        let a = h.service.register(registration("a@x.io", "a")).await.unwrap();
        h.service.register(registration("b@x.io", "b")).await.unwrap();

        assert!(matches!(
            h.service.edit_account(a.id, edit("B@x.io", "a", "User")).await,
            Err(AuthError::DuplicateEmail)
        ));
        assert!(matches!(
            h.service.edit_account(a.id, edit("a@x.io", "b", "User")).await,
            Err(AuthError::DuplicateUsername)
        ));
        assert!(matches!(
            h.service.edit_account(a.id, edit("a@x.io", "a", "Overlord")).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            h.service.edit_account(999, edit("z@x.io", "z", "User")).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let h = harness(None).await;
        let user = h.service.register(registration("a@x.io", "a")).await.unwrap();

        let updated = h
            .service
            .update_profile(
                user.id,
                ProfileChanges {
                    name: Some("Alice".to_string()),
                    location: Some("Lisbon".to_string()),
                    about_me: Some("Writes things".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("Alice"));
        assert_eq!(updated.location.as_deref(), Some("Lisbon"));
        assert_eq!(updated.about_me.as_deref(), Some("Writes things"));
        assert!(matches!(
            h.service.update_profile(999, ProfileChanges::default()).await,
            Err(AuthError::UserNotFound)
        ));
    }
}
