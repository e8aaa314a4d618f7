use crate::domain::auth::{AuthSession, VerificationCode};
use crate::domain::mail::Mail;
use crate::domain::ports::{Mailer, UserStore};
use crate::domain::user::{self, NewUser, PublicUser, Role, User};
use crate::error::{AppError, Result};
use crate::services::auth_service::AuthService;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    users_registered_total: Counter<u64>,
    users_verified_total: Counter<u64>,
    login_total: Counter<u64>,
    mail_failures_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            users_registered_total: meter
                .u64_counter("users_registered_total")
                .with_description("Total number of successful user registrations")
                .build(),
            users_verified_total: meter
                .u64_counter("users_verified_total")
                .with_description("Total number of email verifications")
                .build(),
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful sign-ins")
                .build(),
            mail_failures_total: meter
                .u64_counter("mail_failures_total")
                .with_description("Total outgoing mails the mailer failed to send")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    auth_service: AuthService,
    mailer: Arc<dyn Mailer>,
    reset_link_base: String,
    metrics: Metrics,
}

/// Trimmed value, or `None` when blank. Passwords are only checked, never trimmed.
fn required(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

impl AccountService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        auth_service: AuthService,
        mailer: Arc<dyn Mailer>,
        reset_link_base: String,
    ) -> Self {
        Self { users, auth_service, mailer, reset_link_base, metrics: Metrics::new() }
    }

    #[tracing::instrument(
        skip(self, full_name, email, password),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn signup(&self, full_name: &str, email: &str, password: &str) -> Result<PublicUser> {
        let (Some(full_name), Some(email), Some(_)) = (required(full_name), required(email), required(password))
        else {
            return Err(AppError::BadRequest("fullName, email, and password are required".to_string()));
        };
        let email = user::normalize_email(email);
        if !user::is_valid_email(&email) {
            return Err(AppError::BadRequest("Email is not valid".to_string()));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = self.auth_service.hash_password(password).await?;
        let code = VerificationCode::generate();
        let role = self.auth_service.role_for(&email);
        let mut created = self
            .users
            .create(NewUser {
                full_name: full_name.to_string(),
                email,
                password_hash,
                verification_code: code.clone(),
                verification_expires_at: self.auth_service.verification_expiry(OffsetDateTime::now_utc()),
            })
            .await?;

        if role != created.role {
            created.role = role;
            created = self.users.save(&created).await?;
        }

        tracing::Span::current().record("user_id", tracing::field::display(created.id));
        tracing::info!(role = %created.role, "User registered successfully");
        self.metrics.users_registered_total.add(1, &[]);

        self.deliver(Mail::VerificationCode { to: created.email.clone(), code }).await;
        Ok(created.public())
    }

    #[tracing::instrument(skip(self, email, otp), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<AuthSession> {
        let (Some(email), Some(otp)) = (required(email), required(otp)) else {
            return Err(AppError::BadRequest("Email and verification code are required".to_string()));
        };
        let mut user = self.find_by_email(email).await?;
        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if user.is_verified {
            return Err(AppError::BadRequest("User is already verified".to_string()));
        }
        if !user.verification_code_matches(otp, OffsetDateTime::now_utc()) {
            return Err(AppError::BadRequest("Invalid or expired verification code".to_string()));
        }

        user.is_verified = true;
        user.verification_code = None;
        user.verification_expires_at = None;
        let user = self.users.save(&user).await?;

        self.metrics.users_verified_total.add(1, &[]);
        self.deliver(Mail::Welcome { to: user.email.clone(), name: user.full_name.clone() }).await;
        self.auth_service.create_session(&user)
    }

    #[tracing::instrument(skip(self, email, password), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn signin(&self, email: &str, password: &str) -> Result<AuthSession> {
        let (Some(email), Some(_)) = (required(email), required(password)) else {
            return Err(AppError::BadRequest("Email and password are required".to_string()));
        };
        let user = self.find_by_email(email).await?;
        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if !user.is_verified {
            return Err(AppError::Forbidden("Please verify your email first".to_string()));
        }
        if !self.auth_service.verify_password(password, &user.password_hash).await? {
            tracing::warn!("Login failed: invalid password");
            return Err(AppError::AuthError);
        }

        self.metrics.login_total.add(1, &[]);
        self.auth_service.create_session(&user)
    }

    #[tracing::instrument(skip(self, email), err(level = "warn"))]
    pub async fn resend_otp(&self, email: &str) -> Result<()> {
        let mut user = self.find_by_email(email).await?;
        if user.is_verified {
            return Err(AppError::BadRequest("User already verified".to_string()));
        }

        let code = VerificationCode::generate();
        user.verification_code = Some(code.clone());
        user.verification_expires_at = Some(self.auth_service.verification_expiry(OffsetDateTime::now_utc()));
        let user = self.users.save(&user).await?;

        self.deliver(Mail::VerificationCode { to: user.email, code }).await;
        Ok(())
    }

    #[tracing::instrument(skip(self, email), err(level = "warn"))]
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let user = self.find_by_email(email).await?;
        let token = self.auth_service.create_reset_token(&user)?;
        let link = format!("{}?token={token}", self.reset_link_base);

        self.deliver(Mail::PasswordReset { to: user.email, link }).await;
        Ok(())
    }

    #[tracing::instrument(skip_all, err(level = "warn"))]
    pub async fn reset_password(&self, token: &str, new_password: &str, confirm_password: &str) -> Result<()> {
        let (Some(token), Some(_), Some(_)) = (required(token), required(new_password), required(confirm_password))
        else {
            return Err(AppError::BadRequest("Token and new password are required".to_string()));
        };
        if new_password != confirm_password {
            return Err(AppError::BadRequest("Passwords do not match".to_string()));
        }

        let claims = self.auth_service.verify_reset_token(token)?;
        let mut user = self.find_by_id(claims.sub).await?;

        user.password_hash = self.auth_service.hash_password(new_password).await?;
        self.users.save(&user).await?;
        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    #[tracing::instrument(skip(self, old_password, new_password), err(level = "warn"))]
    pub async fn change_password(&self, user_id: Uuid, old_password: &str, new_password: &str) -> Result<()> {
        if required(new_password).is_none() {
            return Err(AppError::BadRequest("New password is required".to_string()));
        }
        let mut user = self.find_by_id(user_id).await?;

        if !self.auth_service.verify_password(old_password, &user.password_hash).await? {
            return Err(AppError::BadRequest("Old password is incorrect".to_string()));
        }

        user.password_hash = self.auth_service.hash_password(new_password).await?;
        self.users.save(&user).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn details(&self, user_id: Uuid) -> Result<PublicUser> {
        Ok(self.find_by_id(user_id).await?.public())
    }

    /// Admits admins only.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` if the account is gone and `AppError::Forbidden` for any other role.
    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn require_admin(&self, user_id: Uuid) -> Result<()> {
        let user = self.users.find_by_id(user_id).await?.ok_or(AppError::AuthError)?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden("Access denied: Admins only".to_string()));
        }
        Ok(())
    }

    /// Tokens are stateless and simply expire, so this only confirms the caller exists.
    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn signout(&self, user_id: Uuid) -> Result<()> {
        self.find_by_id(user_id).await?;
        tracing::info!("User signed out");
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<User> {
        self.users
            .find_by_email(&user::normalize_email(email))
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<User> {
        self.users.find_by_id(user_id).await?.ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn deliver(&self, mail: Mail) {
        let kind = mail.subject();
        if let Err(e) = self.mailer.send(mail).await {
            tracing::error!(error = %e, subject = kind, "Failed to send mail");
            self.metrics.mail_failures_total.add(1, &[KeyValue::new("subject", kind)]);
        }
    }
}
