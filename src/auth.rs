//! Password hashing, bearer tokens and the signup/login flows.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AuthConfig, HashCost};
use crate::db::{self, DbPool};
use crate::error::{AppError, Result};
use crate::models::{User, UserId};
use crate::validation::{LoginForm, SignupForm};
use crate::AppState;

const MISSING_TOKEN: &str = "Authorization token missing or invalid";
const DUMMY_PASSWORD: &str = "dummy password for unknown accounts";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    id: i64,
    email: String,
    iat: i64,
    exp: i64,
}

/// Identity proven by a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Malformed token")]
    Malformed,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed,
            _ => TokenError::Invalid,
        }
    }
}

/// Signing keys and hashing parameters, built once at startup.
pub struct Credentials {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    params: Params,
    dummy_hash: String,
}

impl Credentials {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let secret = config.jwt_secret.as_bytes();
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.leeway = 0;

        let mut credentials = Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            token_ttl: config.token_ttl,
            params: argon2_params(config.hash_cost)?,
            dummy_hash: String::new(),
        };
        credentials.dummy_hash = credentials.hash_password(DUMMY_PASSWORD)?;
        Ok(credentials)
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Argon2id PHC string with a fresh random salt.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing: {e}")))
    }

    /// False for a wrong password and for a hash that cannot be parsed.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .hasher()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is unreadable");
                false
            }
        }
    }

    pub fn issue_token(&self, id: UserId, email: &str) -> Result<String> {
        self.issue_token_at(id, email, Utc::now())
    }

    pub fn issue_token_at(&self, id: UserId, email: &str, issued_at: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            id: id.get(),
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.token_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token signing: {e}")))
    }

    pub fn verify_token(&self, token: &str) -> std::result::Result<TokenIdentity, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(TokenIdentity {
            id: UserId::new(data.claims.id),
            email: data.claims.email,
        })
    }
}

fn argon2_params(cost: HashCost) -> Result<Params> {
    Params::new(cost.memory_kib, cost.iterations, 1, None)
        .map_err(|e| AppError::Internal(format!("argon2 parameters: {e}")))
}

async fn hash_blocking(credentials: Arc<Credentials>, password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || credentials.hash_password(&password)).await?
}

async fn verify_blocking(credentials: Arc<Credentials>, password: String, hash: String) -> Result<bool> {
    Ok(tokio::task::spawn_blocking(move || credentials.verify_password(&password, &hash)).await?)
}

// --- 注册与登录 ---

pub async fn signup(
    pool: &DbPool,
    credentials: &Arc<Credentials>,
    form: SignupForm,
) -> Result<(User, String)> {
    if db::find_user_by_email_db(pool, &form.email).await?.is_some() {
        tracing::info!(email = %form.email, "signup rejected: email taken");
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let hash = hash_blocking(Arc::clone(credentials), form.password).await?;
    let user = db::create_user_db(pool, &form.name, &form.email, &hash).await?;
    let token = credentials.issue_token(user.id, &user.email)?;

    tracing::info!(user_id = %user.id, "account created");
    Ok((user, token))
}

pub async fn login(
    pool: &DbPool,
    credentials: &Arc<Credentials>,
    form: LoginForm,
) -> Result<(User, String)> {
    let Some(user) = db::find_user_by_email_db(pool, &form.email).await? else {
        // Spend the same hashing work as a real check.
        let dummy = credentials.dummy_hash.clone();
        verify_blocking(Arc::clone(credentials), form.password, dummy).await?;
        tracing::warn!(email = %form.email, "login rejected: unknown email");
        return Err(AppError::Unauthorized(
            "No account found with this email address.".to_string(),
        ));
    };

    let matches = verify_blocking(
        Arc::clone(credentials),
        form.password,
        user.password_hash.clone(),
    )
    .await?;
    if !matches {
        tracing::warn!(user_id = %user.id, "login rejected: wrong password");
        return Err(AppError::Unauthorized(
            "The password you entered is incorrect. Please try again.".to_string(),
        ));
    }

    let token = credentials.issue_token(user.id, &user.email)?;
    tracing::info!(user_id = %user.id, "login succeeded");
    Ok((user, token))
}

/// The caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token =
            bearer_token(parts).ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.to_string()))?;
        let identity = state.credentials.verify_token(token)?;

        let user = db::get_user_db(&state.pool, identity.id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
        })
    }
}
