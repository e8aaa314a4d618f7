/// Transactional mail sent by the account workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mail {
    VerificationCode { to: String, code: String },
    Welcome { to: String, name: String },
    PasswordReset { to: String, link: String },
}

impl Mail {
    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::VerificationCode { to, .. } | Self::Welcome { to, .. } | Self::PasswordReset { to, .. } => to,
        }
    }

    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::VerificationCode { .. } => "Verify your Email",
            Self::Welcome { .. } => "Welcome to Our Community!",
            Self::PasswordReset { .. } => "Reset your password",
        }
    }

    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::VerificationCode { code, .. } => {
                format!("Your verification code is {code}.")
            }
            Self::Welcome { name, .. } => format!("Welcome aboard, {name}! Your email has been verified."),
            Self::PasswordReset { link, .. } => {
                format!("Follow this link to choose a new password: {link}")
            }
        }
    }
}
