//! Who is making the current request.

use super::permissions::{Capabilities, Permission};
use super::user::User;

/// How an authenticated principal proved who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    Password,
    Token,
}

#[derive(Debug, Clone)]
pub enum Principal {
    Authenticated { user: User, method: AuthMethod },
    Anonymous,
}

impl Principal {
    #[must_use]
    pub const fn authenticated(user: User, method: AuthMethod) -> Self {
        Self::Authenticated { user, method }
    }

    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated { user, .. } => Some(user),
            Self::Anonymous => None,
        }
    }

    #[must_use]
    pub const fn method(&self) -> Option<AuthMethod> {
        match self {
            Self::Authenticated { method, .. } => Some(*method),
            Self::Anonymous => None,
        }
    }

    /// Authenticated but the email address was never confirmed.
    #[must_use]
    pub fn is_unconfirmed(&self) -> bool {
        self.user().is_some_and(|user| !user.confirmed)
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::Anonymous
    }
}

impl Capabilities for Principal {
    fn can(&self, permission: Permission) -> bool {
        match self {
            Self::Authenticated { user, .. } => user.can(permission),
            Self::Anonymous => false,
        }
    }
}
