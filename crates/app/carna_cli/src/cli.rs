use carna_core::auth::config::DEFAULT_BCRYPT_COST;
use carna_core::models::auth::Role;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "carna", version, about = "Carna administration tool")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct Database {
    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the CLI version.
    Version,

    /// Print the bcrypt hash of a password.
    HashPassword {
        password: String,

        #[arg(long, default_value_t = DEFAULT_BCRYPT_COST)]
        cost: u32,
    },

    /// Apply pending database migrations.
    Migrate {
        #[command(flatten)]
        db: Database,
    },

    /// Create a user account.
    CreateUser {
        #[command(flatten)]
        db: Database,

        #[arg(long)]
        username: String,

        #[arg(long, env = "CARNA_USER_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// One of admin, editor, user.
        #[arg(long, default_value = "user")]
        role: Role,

        #[arg(long, default_value_t = DEFAULT_BCRYPT_COST)]
        cost: u32,
    },

    /// Deactivate a user account and end its session.
    DeactivateUser {
        #[command(flatten)]
        db: Database,

        #[arg(long)]
        username: String,
    },
}
