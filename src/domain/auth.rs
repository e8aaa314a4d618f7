use crate::domain::user::PublicUser;
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, rngs::OsRng};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn expiry_from_now(ttl_secs: u64) -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() + ttl_secs
}

fn encode_claims<T: Serialize>(claims: &T, secret: &str) -> Result<String> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(|_| AppError::Internal)
}

fn decode_claims<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T> {
    decode::<T>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::AuthError)
}

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: u64,
}

impl Claims {
    #[must_use]
    pub fn new(user_id: Uuid, ttl_secs: u64) -> Self {
        Self { sub: user_id, exp: expiry_from_now(ttl_secs) }
    }

    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    pub fn encode(&self, secret: &str) -> Result<String> {
        encode_claims(self, secret)
    }

    /// # Errors
    /// Returns `AppError::AuthError` if the token is malformed, expired or signed with another key.
    pub fn decode(token: &str, secret: &str) -> Result<Self> {
        decode_claims(token, secret)
    }
}

/// Claims of the short-lived token embedded in a password reset link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetClaims {
    pub sub: Uuid,
    pub email: String,
    pub exp: u64,
}

impl ResetClaims {
    #[must_use]
    pub fn new(user_id: Uuid, email: String, ttl_secs: u64) -> Self {
        Self { sub: user_id, email, exp: expiry_from_now(ttl_secs) }
    }

    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    pub fn encode(&self, secret: &str) -> Result<String> {
        encode_claims(self, secret)
    }

    /// # Errors
    /// Returns `AppError::AuthError` if the token is malformed, expired or signed with another key.
    pub fn decode(token: &str, secret: &str) -> Result<Self> {
        decode_claims(token, secret)
    }
}

#[derive(Debug)]
pub struct Password;

impl Password {
    /// # Errors
    /// Returns `AppError::Internal` if hashing fails.
    pub fn hash(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|_| AppError::Internal)
    }

    /// # Errors
    /// Returns `AppError::Internal` if the stored hash cannot be parsed.
    pub fn verify(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::Internal)?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }
}

#[derive(Debug)]
pub struct VerificationCode;

impl VerificationCode {
    /// Six decimal digits, never starting with zero.
    #[must_use]
    pub fn generate() -> String {
        OsRng.gen_range(100_000..1_000_000u32).to_string()
    }
}

/// What a successful sign-in hands back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: u64,
    pub user: PublicUser,
}
