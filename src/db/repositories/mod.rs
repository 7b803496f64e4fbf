pub mod follow;
pub mod post;
pub mod role;
pub mod user;
