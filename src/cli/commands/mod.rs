mod init;
mod seed_roles;

pub use init::cmd_init;
pub use seed_roles::cmd_seed_roles;
