pub mod prelude;

pub mod follows;
pub mod posts;
pub mod roles;
pub mod users;
