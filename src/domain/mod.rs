//! Domain types for accounts, roles and posts.
//!
//! Everything here is free of I/O except the blocking-pool helpers on
//! [`Credentials`], so permission and password rules can be tested without a
//! database.

pub mod credentials;
pub mod permissions;
pub mod post;
pub mod principal;
pub mod user;

pub use credentials::{CredentialError, Credentials};
pub use permissions::{Capabilities, Permission, ROLE_SEEDS, RoleSeed};
pub use post::Post;
pub use principal::{AuthMethod, Principal};
pub use user::{RoleGrant, User};
