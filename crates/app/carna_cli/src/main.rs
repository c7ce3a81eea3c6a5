//! `carna` administration CLI: password hashing, migrations and account
//! management against the Carna database.

pub use self::error::{Error, Result};
mod error;

use carna_core::auth::AuthError;
use carna_core::auth::accounts::{NewAccount, create_account, deactivate_account, validate_password};
use carna_core::auth::password::hash_password;
use carna_core::auth::queries::PgCredentialStore;
use carna_core::auth::store::CredentialStore;
use clap::Parser;
use cli::{Cli, Commands, Database};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

mod cli;
mod logging;

fn main() {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let _logger = logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), carna_core::version());
        }
        Commands::HashPassword { password, cost } => {
            validate_password(&password)?;
            println!("{}", hash_password(&password, cost)?);
        }
        Commands::Migrate { db } => block_on(async {
            let pool = connect(&db).await?;
            carna_core::migrate::migrate(&pool).await?;
            Ok(())
        })?,
        Commands::CreateUser {
            db,
            username,
            password,
            first_name,
            last_name,
            role,
            cost,
        } => block_on(async {
            let store = PgCredentialStore::new(connect(&db).await?);
            let account = NewAccount {
                first_name,
                last_name,
                username,
                password,
                role,
            };
            let user = create_account(&store, account, cost).await?;
            log::info!("created {} '{}' ({})", user.role, user.username, user.id);
            println!("{}", user.id);
            Ok(())
        })?,
        Commands::DeactivateUser { db, username } => block_on(async {
            let store = PgCredentialStore::new(connect(&db).await?);
            let record = store
                .find_by_username(&username)
                .await
                .map_err(AuthError::from)?
                .ok_or_else(|| Error::Custom(format!("No user named '{username}'")))?;
            deactivate_account(&store, record.user.id).await?;
            log::info!("deactivated '{username}'");
            Ok(())
        })?,
    }

    Ok(())
}

fn block_on<F>(fut: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(fut)
}

async fn connect(db: &Database) -> Result<PgPool> {
    Ok(PgPoolOptions::new()
        .max_connections(2)
        .connect(&db.database_url)
        .await?)
}
