use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub role: Role,
    pub verification_code: Option<String>,
    pub verification_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// True when `code` is the outstanding verification code and it has not expired.
    #[must_use]
    pub fn verification_code_matches(&self, code: &str, now: OffsetDateTime) -> bool {
        match (&self.verification_code, self.verification_expires_at) {
            (Some(expected), Some(expires_at)) => expected == code.trim() && expires_at >= now,
            _ => false,
        }
    }

    #[must_use]
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            is_verified: self.is_verified,
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// The user fields that may leave the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub is_verified: bool,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub verification_code: String,
    pub verification_expires_at: OffsetDateTime,
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accepts `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the domain.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain.char_indices().any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("reader@books.io"));
        assert!(is_valid_email("a@b.c"));
        assert!(!is_valid_email("reader@books"));
        assert!(!is_valid_email("reader@.io"));
        assert!(!is_valid_email("reader@books."));
        assert!(!is_valid_email("@books.io"));
        assert!(!is_valid_email("re ader@books.io"));
        assert!(!is_valid_email("a@b@c.io"));
    }

    #[test]
    fn test_verification_code_expiry() {
        let now = OffsetDateTime::now_utc();
        let mut user = User {
            id: Uuid::new_v4(),
            full_name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            is_verified: false,
            role: Role::User,
            verification_code: Some("123456".into()),
            verification_expires_at: Some(now + Duration::minutes(10)),
            created_at: now,
            updated_at: now,
        };

        assert!(user.verification_code_matches("123456", now));
        assert!(!user.verification_code_matches("654321", now));
        assert!(!user.verification_code_matches("123456", now + Duration::minutes(11)));

        user.verification_code = None;
        assert!(!user.verification_code_matches("123456", now));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::User.to_string(), "user");
    }
}
