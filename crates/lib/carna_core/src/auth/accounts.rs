//! Account administration: validated create, update and deactivate.
//!
//! Passwords are hashed here so neither the API nor the CLI ever hands a
//! plaintext password to the store.

use tracing::info;
use uuid::Uuid;

use super::AuthError;
use super::password::hash_password_blocking;
use super::store::CredentialStore;
use crate::models::auth::{NewUser, Role, User, UserChanges};

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Partial account update with a plaintext password.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

fn validate_name(field: &str, value: &str) -> Result<String, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Usernames are non-empty and ASCII alphanumeric.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AuthError::Validation(
            "username must be non-empty and alphanumeric".into(),
        ));
    }
    Ok(())
}

/// Passwords are ASCII alphanumeric and at least [`MIN_PASSWORD_LEN`] long.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AuthError::Validation("password must be alphanumeric".into()));
    }
    Ok(())
}

/// Validate and create an active account.
pub async fn create_account(
    store: &dyn CredentialStore,
    account: NewAccount,
    bcrypt_cost: u32,
) -> Result<User, AuthError> {
    let first_name = validate_name("firstName", &account.first_name)?;
    let last_name = validate_name("lastName", &account.last_name)?;
    validate_username(&account.username)?;
    validate_password(&account.password)?;

    let password_hash = hash_password_blocking(account.password, bcrypt_cost).await?;
    let user = store
        .create(NewUser {
            first_name,
            last_name,
            username: account.username,
            password_hash,
            role: account.role,
            is_active: true,
        })
        .await?;
    info!(user_id = %user.id, username = %user.username, role = %user.role, "account created");
    Ok(user)
}

/// Validate and apply a partial update. `None` when the user does not exist.
///
/// Deactivating an account also ends its session.
pub async fn update_account(
    store: &dyn CredentialStore,
    id: Uuid,
    update: AccountUpdate,
    bcrypt_cost: u32,
) -> Result<Option<User>, AuthError> {
    let first_name = update
        .first_name
        .as_deref()
        .map(|v| validate_name("firstName", v))
        .transpose()?;
    let last_name = update
        .last_name
        .as_deref()
        .map(|v| validate_name("lastName", v))
        .transpose()?;
    if let Some(username) = &update.username {
        validate_username(username)?;
    }
    let password_hash = match update.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password_blocking(password, bcrypt_cost).await?)
        }
        None => None,
    };

    let changes = UserChanges {
        first_name,
        last_name,
        username: update.username,
        password_hash,
        role: update.role,
        is_active: update.is_active,
    };
    let deactivates = changes.deactivates();
    let user = store.update(id, changes).await?;
    if deactivates && user.is_some() {
        info!(user_id = %id, "account deactivated");
    }
    Ok(user)
}

/// Soft delete: mark the account inactive and end its session.
pub async fn deactivate_account(store: &dyn CredentialStore, id: Uuid) -> Result<Option<User>, AuthError> {
    let changes = UserChanges {
        is_active: Some(false),
        ..Default::default()
    };
    let user = store.update(id, changes).await?;
    if user.is_some() {
        info!(user_id = %id, "account deactivated");
    }
    Ok(user)
}

/// Create an admin with these credentials unless the username is taken.
///
/// Returns whether an account was created.
pub async fn ensure_admin(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
    bcrypt_cost: u32,
) -> Result<bool, AuthError> {
    if store.find_by_username(username).await?.is_some() {
        return Ok(false);
    }
    create_account(
        store,
        NewAccount {
            first_name: "Admin".into(),
            last_name: "User".into(),
            username: username.into(),
            password: password.into(),
            role: Role::Admin,
        },
        bcrypt_cost,
    )
    .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::MemoryCredentialStore;
    use crate::auth::password::verify_password;

    fn account(username: &str, password: &str) -> NewAccount {
        NewAccount {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            username: username.into(),
            password: password.into(),
            role: Role::User,
        }
    }

    #[test]
    fn username_and_password_rules() {
        assert!(validate_username("grace42").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("grace hopper").is_err());
        assert!(validate_password("abc123").is_ok());
        assert!(validate_password("abc12").is_err());
        assert!(validate_password("abc-123").is_err());
    }

    #[tokio::test]
    async fn create_hashes_password() {
        let store = MemoryCredentialStore::new();
        let user = create_account(&store, account("grace", "cobol60"), 4)
            .await
            .unwrap();
        assert!(user.is_active);

        let record = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(record.password_hash, "cobol60");
        assert!(verify_password("cobol60", &record.password_hash).unwrap());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_storage() {
        let store = MemoryCredentialStore::new();
        let err = create_account(&store, account("grace", "short"), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = MemoryCredentialStore::new();
        create_account(&store, account("grace", "cobol60"), 4)
            .await
            .unwrap();
        let err = create_account(&store, account("grace", "cobol61"), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn deactivation_ends_session() {
        let store = MemoryCredentialStore::new();
        let user = create_account(&store, account("grace", "cobol60"), 4)
            .await
            .unwrap();
        store.set_refresh_hash(user.id, Some("h")).await.unwrap();

        let updated = deactivate_account(&store, user.id).await.unwrap().unwrap();
        assert!(!updated.is_active);
        let record = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(record.refresh_token_hash, None);

        assert!(deactivate_account(&store, uuid::Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_rehashes_new_password() {
        let store = MemoryCredentialStore::new();
        let user = create_account(&store, account("grace", "cobol60"), 4)
            .await
            .unwrap();
        update_account(
            &store,
            user.id,
            AccountUpdate {
                password: Some("fortran77".into()),
                ..Default::default()
            },
            4,
        )
        .await
        .unwrap()
        .unwrap();
        let record = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(verify_password("fortran77", &record.password_hash).unwrap());
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let store = MemoryCredentialStore::new();
        assert!(ensure_admin(&store, "root", "rootpw1", 4).await.unwrap());
        assert!(!ensure_admin(&store, "root", "rootpw1", 4).await.unwrap());
        let record = store.find_by_username("root").await.unwrap().unwrap();
        assert_eq!(record.user.role, Role::Admin);
    }
}
