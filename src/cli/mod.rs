//! CLI module - Command-line interface for Flasky

mod commands;

use clap::{Parser, Subcommand};

/// Flasky - a small blogging and social network server
#[derive(Parser)]
#[command(name = "flasky")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server (the default)
    #[command(alias = "web", alias = "runserver")]
    Serve {
        /// Override `server.port` from the config file
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Create a default config file
    #[command(alias = "--init")]
    Init,

    /// Create or refresh the User, Moderator and Administrator roles
    #[command(alias = "insert-roles")]
    SeedRoles,
}

pub use commands::*;
