pub use super::follows::Entity as Follows;
pub use super::posts::Entity as Posts;
pub use super::roles::Entity as Roles;
pub use super::users::Entity as Users;
