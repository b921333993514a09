//! Identity: argon2 password hashing, HS256 bearer tokens, and the `Caller`
//! extractor handlers use to learn who is asking.
//!
//! Token expiry is checked against the application clock rather than the
//! wall clock so fixed-clock tests stay valid.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ChildProfile, Role};
use crate::error::AppError;
use crate::state::AppState;

const DEV_SECRET: &str = "adventure-academy-dev-secret";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
  pub sub: String,
  pub role: Role,
  pub exp: i64,
}

#[derive(Clone)]
pub struct AuthKeys {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl: Duration,
}

impl AuthKeys {
  pub fn new(secret: &str, ttl_hours: i64) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl: Duration::hours(ttl_hours.max(1)),
    }
  }

  /// Read JWT_SECRET; a missing secret falls back to a development value.
  pub fn from_env(ttl_hours: i64) -> Self {
    match std::env::var("JWT_SECRET").ok().filter(|s| !s.trim().is_empty()) {
      Some(secret) => Self::new(&secret, ttl_hours),
      None => {
        warn!(target: "auth", "JWT_SECRET not set; using the development secret");
        Self::new(DEV_SECRET, ttl_hours)
      }
    }
  }

  pub fn issue(&self, sub: &str, role: Role, now: DateTime<Utc>) -> Result<String, AppError> {
    let claims = Claims { sub: sub.to_string(), role, exp: (now + self.ttl).timestamp() };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
      .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))
  }

  pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    let claims = decode::<Claims>(token, &self.decoding, &validation)
      .map_err(|_| AppError::Unauthorized("Invalid token".into()))?
      .claims;
    if claims.exp <= now.timestamp() {
      return Err(AppError::Unauthorized("Token expired".into()));
    }
    Ok(claims)
  }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// False on mismatch or an unreadable stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
  match PasswordHash::new(hash) {
    Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
    Err(_) => false,
  }
}

/// The authenticated principal behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
  pub id: String,
  pub role: Role,
}

impl Caller {
  /// Admin sees every child, a parent their own, a child only itself.
  pub fn can_access(&self, child: &ChildProfile) -> bool {
    match self.role {
      Role::Admin => true,
      Role::Parent => child.parent_id == self.id,
      Role::Child => child.id == self.id,
    }
  }

  pub fn ensure_access(&self, child: &ChildProfile) -> Result<(), AppError> {
    if self.can_access(child) {
      Ok(())
    } else {
      Err(AppError::Forbidden("Access denied".into()))
    }
  }

  pub fn require_parent(&self) -> Result<(), AppError> {
    match self.role {
      Role::Parent | Role::Admin => Ok(()),
      Role::Child => Err(AppError::Forbidden("Only parents can do this".into())),
    }
  }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
  type Rejection = AppError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    let header = parts
      .headers
      .get(axum::http::header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
    let token = header
      .strip_prefix("Bearer ")
      .ok_or_else(|| AppError::Unauthorized("Expected: Bearer <token>".into()))?;

    let claims = state.auth.verify(token.trim(), state.clock.now())?;
    Ok(Caller { id: claims.sub, role: claims.role })
  }
}
