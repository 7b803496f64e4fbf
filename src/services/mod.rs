pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AccountEdit, AuthError, AuthService, IssuedToken, Registration};
pub use auth_service_impl::SeaOrmAuthService;

pub mod mail;
pub use mail::{LogTransport, MailQueue, MailTransport, OutgoingMail};

pub mod tokens;
pub use tokens::{TokenError, TokenService};
