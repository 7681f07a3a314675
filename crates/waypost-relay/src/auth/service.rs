//! Identity service: registration, login, and token verification.

use std::sync::Arc;

use tracing::{info, warn};
use waypost_protocol::UserView;

use super::claims::Claims;
use super::jwt::JwtManager;
use super::password;
use crate::storage::{DatabaseError, RelayDatabase};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email already registered")]
    Conflict,

    #[error("invalid credentials")]
    AuthFailed,

    #[error(transparent)]
    Storage(#[from] DatabaseError),

    #[error("internal auth error: {0}")]
    Internal(String),
}

/// Registration and login over the user store, plus bearer-token checks.
#[derive(Clone)]
pub struct AuthService {
    db: RelayDatabase,
    jwt: Arc<JwtManager>,
}

impl AuthService {
    pub fn new(db: RelayDatabase, jwt: Arc<JwtManager>) -> Self {
        Self { db, jwt }
    }

    pub fn jwt(&self) -> &Arc<JwtManager> {
        &self.jwt
    }

    /// Register a new account. Emails are stored lower-cased and must be
    /// unique; the password is stored as a bcrypt digest.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<(String, UserView), AuthError> {
        let email = email.trim().to_lowercase();

        if self.db.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict);
        }

        let hash = password::hash_password(password)
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))?;

        let user_id = uuid::Uuid::new_v4().to_string();
        let user = self
            .db
            .create_user(&user_id, &email, username, &hash)
            .await?;

        let token = self.issue_session(&user.id, &user.email).await?;

        info!(user_id = %user.id, email = %user.email, "User registered");

        Ok((token, user.view()))
    }

    /// Verify credentials and issue a token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, UserView), AuthError> {
        let email = email.trim().to_lowercase();

        let user = self
            .db
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::AuthFailed)?;

        let valid = password::verify_password(password, &user.password_hash)
            .map_err(|e| AuthError::Internal(format!("password verification failed: {e}")))?;

        if !valid {
            warn!(email = %email, "Failed login attempt");
            return Err(AuthError::AuthFailed);
        }

        let token = self.issue_session(&user.id, &user.email).await?;

        info!(user_id = %user.id, "User logged in");

        Ok((token, user.view()))
    }

    /// Validate a bearer token.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.jwt.validate(token).map_err(|_| AuthError::AuthFailed)
    }

    /// Look up a user's public view by id.
    pub async fn user_view(&self, user_id: &str) -> Result<Option<UserView>, AuthError> {
        Ok(self
            .db
            .get_user_profile(user_id)
            .await?
            .map(|profile| profile.view()))
    }

    /// Issue a token and record its hash in the sessions table.
    async fn issue_session(&self, user_id: &str, email: &str) -> Result<String, AuthError> {
        let token = self
            .jwt
            .issue(user_id, email)
            .map_err(|e| AuthError::Internal(format!("token creation failed: {e}")))?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let expires_at = crate::storage::unix_timestamp_ms() + self.jwt.ttl_secs() * 1_000;
        self.db
            .create_session(&session_id, user_id, &JwtManager::hash_token(&token), expires_at)
            .await?;

        Ok(token)
    }
}
