//! Account request and response bodies. Missing string fields deserialize as
//! empty so the service can answer with its own validation message.

use crate::domain::auth::AuthSession as DomainSession;
use crate::domain::user::PublicUser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signup {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtp {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct Signin {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailOnly {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPassword {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub expires_at: u64,
    pub user: PublicUser,
}

impl From<DomainSession> for AuthSession {
    fn from(session: DomainSession) -> Self {
        Self { token: session.token, expires_at: session.expires_at, user: session.user }
    }
}

/// Body of endpoints that only confirm an action.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub message: &'static str,
}

impl Ack {
    #[must_use]
    pub const fn new(message: &'static str) -> Self {
        Self { message }
    }
}
