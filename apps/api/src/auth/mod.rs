//! Demo-grade login against the remote `users` table.
//!
//! Passwords are stored as SHA-256 hex digests (or as plaintext on demo
//! accounts). This is not meant to be secure.

pub mod handlers;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::user::{UserRow, USER_COLUMNS};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    Teacher,
    Principal,
    Mentor,
    ProjectManager,
    Admin,
}

impl UserRole {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "PRINCIPAL" => UserRole::Principal,
            "MENTOR" => UserRole::Mentor,
            "PROJECT_MANAGER" => UserRole::ProjectManager,
            "ADMIN" => UserRole::Admin,
            _ => UserRole::Teacher,
        }
    }

    /// Curators review proposals.
    pub fn is_curator(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Principal)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub teacher_id: Option<String>,
    pub is_active: bool,
    pub last_login: DateTime<Utc>,
    pub is_curator: bool,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Login needs the remote store, which is not available")]
    RemoteUnavailable,

    #[error("No active account with this email")]
    UnknownAccount,

    #[error("Wrong password")]
    WrongPassword,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_active_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError>;

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_active_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_active = true LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id::text = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Accepts the stored digest, or the stored plaintext of a demo account.
pub fn verify_password(password: &str, stored: &str) -> bool {
    password == stored || hash_password(password).eq_ignore_ascii_case(stored)
}

#[derive(Clone)]
pub struct AuthService {
    directory: Option<Arc<dyn UserDirectory>>,
}

impl AuthService {
    pub fn new(directory: Option<Arc<dyn UserDirectory>>) -> Self {
        Self { directory }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let directory = self.directory.as_ref().ok_or(AuthError::RemoteUnavailable)?;
        let user = directory
            .find_active_by_email(email.trim())
            .await?
            .ok_or(AuthError::UnknownAccount)?;

        if !verify_password(password, &user.password) {
            return Err(AuthError::WrongPassword);
        }

        let now = Utc::now();
        if let Err(e) = directory.touch_last_login(&user.id, now).await {
            warn!("Could not record last login for {}: {e}", user.id);
        }
        info!("User {} logged in", user.id);

        let role = UserRole::parse(&user.role);
        Ok(AuthUser {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role,
            teacher_id: user.teacher_id,
            is_active: user.is_active,
            last_login: now,
            is_curator: role.is_curator(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeDirectory {
        users: Vec<UserRow>,
        touched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UserDirectory for FakeDirectory {
        async fn find_active_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
            Ok(self
                .users
                .iter()
                .find(|u| u.email == email && u.is_active)
                .cloned())
        }

        async fn touch_last_login(&self, id: &str, _at: DateTime<Utc>) -> Result<(), StoreError> {
            self.touched.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn user(email: &str, role: &str, password: &str, active: bool) -> UserRow {
        UserRow {
            id: format!("id-{email}"),
            email: email.into(),
            full_name: Some("ครูสมชาย".into()),
            role: role.into(),
            teacher_id: None,
            is_active: active,
            last_login: None,
            password: password.into(),
        }
    }

    fn service() -> (AuthService, Arc<FakeDirectory>) {
        let directory = Arc::new(FakeDirectory {
            users: vec![
                user("teacher@school.ac.th", "TEACHER", &hash_password("secret"), true),
                user("principal@school.ac.th", "PRINCIPAL", "demo1234", true),
                user("gone@school.ac.th", "TEACHER", "demo1234", false),
            ],
            touched: Mutex::new(Vec::new()),
        });
        let dyn_directory: Arc<dyn UserDirectory> = directory.clone();
        (AuthService::new(Some(dyn_directory)), directory)
    }

    #[test]
    fn test_hash_password_is_sha256_hex() {
        assert_eq!(
            hash_password("demo1234"),
            "0ead2060b65992dca4769af601a1b3a35ef38cfad2c2c465bb160ea764157c5d"
        );
    }

    #[test]
    fn test_curator_roles() {
        assert!(UserRole::parse("ADMIN").is_curator());
        assert!(UserRole::parse("principal").is_curator());
        assert!(!UserRole::parse("MENTOR").is_curator());
        assert_eq!(UserRole::parse("???"), UserRole::Teacher);
    }

    #[tokio::test]
    async fn test_login_with_hashed_password() {
        let (auth, directory) = service();
        let user = auth.login("teacher@school.ac.th", "secret").await.unwrap();
        assert_eq!(user.role, UserRole::Teacher);
        assert!(!user.is_curator);
        assert_eq!(directory.touched.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_login_with_demo_plaintext() {
        let (auth, _) = service();
        let user = auth.login("principal@school.ac.th", "demo1234").await.unwrap();
        assert!(user.is_curator);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (auth, _) = service();
        assert!(matches!(
            auth.login("teacher@school.ac.th", "nope").await,
            Err(AuthError::WrongPassword)
        ));
        assert!(matches!(
            auth.login("gone@school.ac.th", "demo1234").await,
            Err(AuthError::UnknownAccount)
        ));
        assert!(matches!(
            AuthService::new(None).login("a", "b").await,
            Err(AuthError::RemoteUnavailable)
        ));
    }
}
