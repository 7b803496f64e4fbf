use serde::Serialize;

use super::credentials::{CredentialError, Credentials};
use super::permissions::{Capabilities, Permission};
use crate::config::SecurityConfig;
use crate::entities::{roles, users};

/// The role a user holds, flattened for permission checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleGrant {
    pub id: i32,
    pub name: String,
    pub permissions: Permission,
    pub is_default: bool,
}

impl From<roles::Model> for RoleGrant {
    fn from(model: roles::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            permissions: Permission::from_bits(model.permissions),
            is_default: model.is_default,
        }
    }
}

/// A registered account. The password hash is carried but never exposed.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub confirmed: bool,
    pub role: Option<RoleGrant>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: String,
    pub last_seen: String,
    credentials: Credentials,
}

impl User {
    #[must_use]
    pub fn from_model(model: users::Model, role: Option<roles::Model>) -> Self {
        Self {
            id: model.id,
            email: model.email,
            username: model.username,
            confirmed: model.confirmed,
            role: role.map(RoleGrant::from),
            name: model.name,
            location: model.location,
            about_me: model.about_me,
            member_since: model.member_since,
            last_seen: model.last_seen,
            credentials: Credentials::from_stored(model.password_hash),
        }
    }

    /// Replaces the stored hash; a new salt is drawn every time.
    pub fn set_password(
        &mut self,
        password: &str,
        config: &SecurityConfig,
    ) -> Result<(), CredentialError> {
        self.credentials = Credentials::from_plaintext(password, config)?;
        Ok(())
    }

    /// Swaps in credentials hashed elsewhere, e.g. on the blocking pool.
    pub fn replace_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        self.credentials.verify(password)
    }

    /// Passwords are write-only.
    pub const fn password(&self) -> Result<String, CredentialError> {
        self.credentials.password()
    }

    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[must_use]
    pub fn permissions(&self) -> Permission {
        self.role
            .as_ref()
            .map_or(Permission::NONE, |role| role.permissions)
    }
}

impl Capabilities for User {
    fn can(&self, permission: Permission) -> bool {
        self.role
            .as_ref()
            .is_some_and(|role| role.permissions.contains(permission))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::permissions::ROLE_SEEDS;

    pub(crate) fn fast_security() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        }
    }

    pub(crate) fn user_with_bits(id: i32, bits: Option<Permission>) -> User {
        User {
            id,
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            confirmed: false,
            role: bits.map(|permissions| RoleGrant {
                id: 1,
                name: "Test".to_string(),
                permissions,
                is_default: false,
            }),
            name: None,
            location: None,
            about_me: None,
            member_since: String::new(),
            last_seen: String::new(),
            credentials: Credentials::from_stored(String::new()),
        }
    }

    #[test]
    fn test_set_and_verify_password() {
        let mut user = user_with_bits(1, None);
        user.set_password("cat", &fast_security()).unwrap();
        assert!(user.verify_password("cat"));
        assert!(!user.verify_password("catx"));
    }

    #[test]
    fn test_reset_changes_hash() {
        let config = fast_security();
        let mut user = user_with_bits(1, None);
        user.set_password("cat", &config).unwrap();
        let first = user.credentials().stored_hash().to_string();
        user.set_password("cat", &config).unwrap();
        assert_ne!(first, user.credentials().stored_hash());
        assert!(user.verify_password("cat"));
    }

    #[test]
    fn test_password_not_readable() {
        let mut user = user_with_bits(1, None);
        user.set_password("cat", &fast_security()).unwrap();
        assert!(matches!(
            user.password(),
            Err(CredentialError::PasswordNotReadable)
        ));
    }

    #[test]
    fn test_user_role_permissions() {
        let user = user_with_bits(1, Some(ROLE_SEEDS[0].permissions));
        assert!(user.can(Permission::WRITE_ARTICLE));
        assert!(user.can(Permission::FOLLOW));
        assert!(user.can(Permission::COMMENT));
        assert!(!user.can(Permission::MODERATE_COMMENTS));
        assert!(!user.is_admin());
    }

    #[test]
    fn test_no_role_can_nothing() {
        let user = user_with_bits(1, None);
        assert!(!user.can(Permission::FOLLOW));
        assert!(!user.can(Permission::NONE));
        assert_eq!(user.permissions(), Permission::NONE);
    }

    #[test]
    fn test_admin_role() {
        let user = user_with_bits(1, Some(Permission::ALL));
        assert!(user.is_admin());
        assert!(user.can(Permission::MODERATE_COMMENTS));
    }
}
