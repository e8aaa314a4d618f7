use crate::config::AuthConfig;
use crate::domain::auth::{AuthSession, Claims, Password, ResetClaims};
use crate::domain::user::{self, Role, User};
use crate::error::{AppError, Result};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Token issuance and credential hashing. Holds no state beyond its secrets.
#[derive(Clone, Debug)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    #[must_use]
    pub const fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    #[tracing::instrument(err, skip(self, password))]
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || Password::hash(&password)).await.map_err(|_| AppError::Internal)?
    }

    #[tracing::instrument(err, skip(self, password, password_hash))]
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || Password::verify(&password, &password_hash))
            .await
            .map_err(|_| AppError::Internal)?
    }

    /// # Errors
    /// Returns `AppError::Internal` if the token cannot be signed.
    pub fn create_session(&self, user: &User) -> Result<AuthSession> {
        let claims = Claims::new(user.id, self.config.access_token_ttl_secs);
        Ok(AuthSession { token: claims.encode(&self.config.jwt_secret)?, expires_at: claims.exp, user: user.public() })
    }

    /// Verifies an access token and returns the user ID (subject).
    ///
    /// # Errors
    /// Returns `AppError::AuthError` for any invalid, expired or foreign token.
    pub fn verify_token(&self, token: &str) -> Result<Uuid> {
        Claims::decode(token, &self.config.jwt_secret).map(|claims| claims.sub)
    }

    /// # Errors
    /// Returns `AppError::Internal` if the token cannot be signed.
    pub fn create_reset_token(&self, user: &User) -> Result<String> {
        ResetClaims::new(user.id, user.email.clone(), self.config.reset_token_ttl_secs).encode(&self.config.reset_secret)
    }

    /// # Errors
    /// Returns `AppError::AuthError` if the reset token is invalid or expired.
    pub fn verify_reset_token(&self, token: &str) -> Result<ResetClaims> {
        ResetClaims::decode(token, &self.config.reset_secret)
    }

    /// Role a newly registered account gets. Emails are compared in normalized form.
    #[must_use]
    pub fn role_for(&self, email: &str) -> Role {
        let email = user::normalize_email(email);
        if self.config.admin_emails.iter().any(|admin| user::normalize_email(admin) == email) {
            Role::Admin
        } else {
            Role::User
        }
    }

    #[must_use]
    pub fn verification_expiry(&self, now: OffsetDateTime) -> OffsetDateTime {
        now + Duration::seconds(self.config.otp_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;

    fn user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            full_name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            password_hash: String::new(),
            is_verified: true,
            role: Role::User,
            verification_code: None,
            verification_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_password_hashing() {
        let service = AuthService::new(AuthConfig::default());
        let hash = service.hash_password("password12345").await.unwrap();

        assert!(service.verify_password("password12345", &hash).await.unwrap());
        assert!(!service.verify_password("wrong_password", &hash).await.unwrap());
    }

    #[test]
    fn test_session_token_roundtrip() {
        let service = AuthService::new(AuthConfig::default());
        let user = user();

        let session = service.create_session(&user).unwrap();
        assert_eq!(service.verify_token(&session.token).unwrap(), user.id);
        assert_eq!(session.user.email, user.email);
    }

    #[test]
    fn test_reset_and_access_tokens_are_not_interchangeable() {
        let service = AuthService::new(AuthConfig::default());
        let user = user();

        let reset = service.create_reset_token(&user).unwrap();
        let claims = service.verify_reset_token(&reset).unwrap();
        assert_eq!(claims.sub, user.id);
        assert!(matches!(service.verify_token(&reset), Err(AppError::AuthError)));

        let access = service.create_session(&user).unwrap().token;
        assert!(matches!(service.verify_reset_token(&access), Err(AppError::AuthError)));
    }

    #[test]
    fn test_role_for_configured_admins() {
        let service = AuthService::new(AuthConfig {
            admin_emails: vec![" Admin@Bookswap.io ".to_string()],
            ..AuthConfig::default()
        });
        assert_eq!(service.role_for("admin@bookswap.io"), Role::Admin);
        assert_eq!(service.role_for("reader@bookswap.io"), Role::User);
    }
}
