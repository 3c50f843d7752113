//! Authentication service
//!
//! Registration, login and stateless JWT session tokens (HS256). Claims
//! carry the user's ID, username and role so handlers can authorize
//! without a database round trip.

use crate::db::repositories::UserRepository;
use crate::models::{User, UserRole};
use crate::services::password::{hash_password, verify_password};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error types for authentication operations
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// Username is already registered
    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    /// Email is already registered
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// Wrong username or password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Token is missing, malformed or expired
    #[error("Invalid or expired token")]
    InvalidToken,

    /// User referenced by a token no longer exists
    #[error("User not found")]
    UserNotFound,

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub user_id: i64,
    /// Username at issue time
    pub username: String,
    /// Role at issue time
    pub role: UserRole,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Not valid before (unix seconds)
    pub nbf: i64,
}

/// A successful login or registration result
#[derive(Debug, Clone, Serialize)]
pub struct AuthToken {
    pub token: String,
    pub user: User,
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt_secret: String,
    token_ttl_hours: i64,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(users: Arc<dyn UserRepository>, jwt_secret: String, token_ttl_hours: i64) -> Self {
        Self {
            users,
            jwt_secret,
            token_ttl_hours,
        }
    }

    /// Register a new user account.
    ///
    /// Usernames and emails must be unique. New accounts get the writer
    /// role unless one is given explicitly.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Option<UserRole>,
    ) -> Result<AuthToken, AuthServiceError> {
        let username = username.trim();
        let email = email.trim();

        validate_username(username)?;
        validate_email(email)?;
        validate_password(password)?;

        if self
            .users
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(AuthServiceError::UsernameTaken(username.to_string()));
        }

        if self
            .users
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AuthServiceError::EmailTaken(email.to_string()));
        }

        let password_hash = hash_password(password).context("Failed to hash password")?;
        let user = User::new(
            username.to_string(),
            email.to_string(),
            password_hash,
            role.unwrap_or_default(),
        );

        let created = self
            .users
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, username = %created.username, "User registered");

        let token = self.issue_token(&created)?;
        Ok(AuthToken {
            token,
            user: created,
        })
    }

    /// Verify credentials and issue a token.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthToken, AuthServiceError> {
        let user = self
            .users
            .get_by_username(username.trim())
            .await
            .context("Failed to look up user")?
            .ok_or(AuthServiceError::InvalidCredentials)?;

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(AuthServiceError::InvalidCredentials);
        }

        let token = self.issue_token(&user)?;
        Ok(AuthToken { token, user })
    }

    /// Load the profile for an authenticated user.
    pub async fn get_profile(&self, user_id: i64) -> Result<User, AuthServiceError> {
        self.users
            .get_by_id(user_id)
            .await
            .context("Failed to load user")?
            .ok_or(AuthServiceError::UserNotFound)
    }

    /// Sign a token for the given user.
    pub fn issue_token(&self, user: &User) -> Result<String, AuthServiceError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            exp: (now + Duration::hours(self.token_ttl_hours)).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .context("Failed to sign token")
        .map_err(Into::into)
    }

    /// Decode and validate a token, returning its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthServiceError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AuthServiceError::InvalidToken)
    }
}

fn validate_username(username: &str) -> Result<(), AuthServiceError> {
    if username.len() < 3 || username.len() > 50 {
        return Err(AuthServiceError::ValidationError(
            "Username must be between 3 and 50 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AuthServiceError> {
    if !email.contains('@') || !email.contains('.') || email.len() > 255 {
        return Err(AuthServiceError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthServiceError> {
    if password.len() < 8 {
        return Err(AuthServiceError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}
