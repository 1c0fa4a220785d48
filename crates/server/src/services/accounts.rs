// User accounts

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    db::{models::User, now_timestamp},
    error::{AppError, Result},
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserListing {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, is_admin, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

async fn insert_user(pool: &SqlitePool, username: &str, password: &str, is_admin: bool) -> Result<User> {
    let password_hash = hash_password(password)?;
    let created_at = now_timestamp();

    let result = sqlx::query(
        "INSERT INTO users (username, password_hash, is_admin, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(&password_hash)
    .bind(is_admin)
    .bind(&created_at)
    .execute(pool)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AppError::Conflict("Username already taken.".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    Ok(User {
        id,
        username: username.to_string(),
        password_hash,
        is_admin,
        created_at,
    })
}

pub async fn register(pool: &SqlitePool, username: &str, password: &str) -> Result<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    if find_by_username(pool, username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken.".to_string()));
    }

    let user = insert_user(pool, username, password, false).await?;
    tracing::info!(user_id = user.id, username, "User registered");
    Ok(user)
}

/// Returns the user only when the password matches.
pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> Result<Option<User>> {
    let Some(user) = find_by_username(pool, username.trim()).await? else {
        return Ok(None);
    };

    if !verify_password(password, &user.password_hash)? {
        return Ok(None);
    }

    Ok(Some(user))
}

pub async fn change_password(pool: &SqlitePool, username: &str, new_password: &str) -> Result<()> {
    if new_password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    let password_hash = hash_password(new_password)?;
    let updated = sqlx::query("UPDATE users SET password_hash = ? WHERE username = ?")
        .bind(&password_hash)
        .bind(username)
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(username, "Password changed");
    Ok(())
}

/// Creates the administrator account if no user holds that name yet.
pub async fn seed_admin(pool: &SqlitePool, username: &str, password: &str) -> Result<bool> {
    if find_by_username(pool, username).await?.is_some() {
        return Ok(false);
    }

    insert_user(pool, username, password, true).await?;
    tracing::info!(username, "Seeded administrator account");
    Ok(true)
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<UserListing>> {
    let users = sqlx::query_as::<_, UserListing>(
        "SELECT id, username, is_admin FROM users ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn hashes_are_salted_argon2() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();

        assert!(first.starts_with("$argon2"));
        assert_ne!(first, second);
        assert!(verify_password("hunter22", &first).unwrap());
        assert!(!verify_password("hunter23", &first).unwrap());
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let db = Database::in_memory().await.unwrap();

        let user = register(&db.pool, "alice", "secret").await.unwrap();
        assert!(!user.is_admin);
        assert_ne!(user.password_hash, "secret");

        let err = register(&db.pool, "alice", "other").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = register(&db.pool, "  ", "other").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let db = Database::in_memory().await.unwrap();
        register(&db.pool, "alice", "secret").await.unwrap();

        assert!(authenticate(&db.pool, "alice", "secret").await.unwrap().is_some());
        assert!(authenticate(&db.pool, "alice", "wrong").await.unwrap().is_none());
        assert!(authenticate(&db.pool, "nobody", "secret").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn change_password_replaces_hash() {
        let db = Database::in_memory().await.unwrap();
        register(&db.pool, "alice", "secret").await.unwrap();

        change_password(&db.pool, "alice", "fresh").await.unwrap();
        assert!(authenticate(&db.pool, "alice", "secret").await.unwrap().is_none());
        assert!(authenticate(&db.pool, "alice", "fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn seed_admin_is_idempotent() {
        let db = Database::in_memory().await.unwrap();

        assert!(seed_admin(&db.pool, "admin", "admin123").await.unwrap());
        assert!(!seed_admin(&db.pool, "admin", "changed").await.unwrap());

        let admin = authenticate(&db.pool, "admin", "admin123").await.unwrap().unwrap();
        assert!(admin.is_admin);
        assert_eq!(list_users(&db.pool).await.unwrap().len(), 1);
    }
}
