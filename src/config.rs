use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub gateway: GatewayConfig,

    #[command(flatten)]
    pub uploads: UploadConfig,

    #[command(flatten)]
    pub mail: MailConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long = "host", env = "BOOKSWAP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long = "port", env = "BOOKSWAP_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management (health) listener
    #[arg(long = "mgmt-port", env = "BOOKSWAP_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for sessions to drain on shutdown
    #[arg(long = "shutdown-timeout-secs", env = "BOOKSWAP_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long = "trusted-proxies",
        env = "BOOKSWAP_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            mgmt_port: 9090,
            shutdown_timeout_secs: 5,
            trusted_proxies: ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "127.0.0.1/32"]
                .iter()
                .filter_map(|cidr| cidr.parse().ok())
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Postgres connection URL. Without it the server keeps users and messages in memory.
    #[arg(long = "database-url", env = "BOOKSWAP_DATABASE_URL")]
    pub url: Option<String>,

    #[arg(long = "db-max-connections", env = "BOOKSWAP_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    #[arg(long = "db-min-connections", env = "BOOKSWAP_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    #[arg(long = "db-acquire-timeout-secs", env = "BOOKSWAP_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Timeout for the readiness check query
    #[arg(long = "db-health-timeout-ms", env = "BOOKSWAP_DB_HEALTH_TIMEOUT_MS", default_value_t = 2000)]
    pub health_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, max_connections: 20, min_connections: 2, acquire_timeout_secs: 5, health_timeout_ms: 2000 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for access token signing
    #[arg(long = "jwt-secret", env = "BOOKSWAP_JWT_SECRET")]
    pub jwt_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long = "access-token-ttl-secs", env = "BOOKSWAP_ACCESS_TOKEN_TTL_SECS", default_value_t = 86_400)]
    pub access_token_ttl_secs: u64,

    /// Secret key for password reset tokens
    #[arg(long = "reset-secret", env = "BOOKSWAP_RESET_PASSWORD_SECRET")]
    pub reset_secret: String,

    /// Password reset token time-to-live in seconds
    #[arg(long = "reset-token-ttl-secs", env = "BOOKSWAP_RESET_TOKEN_TTL_SECS", default_value_t = 600)]
    pub reset_token_ttl_secs: u64,

    /// How long an email verification code stays valid
    #[arg(long = "otp-ttl-secs", env = "BOOKSWAP_OTP_TTL_SECS", default_value_t = 600)]
    pub otp_ttl_secs: i64,

    /// Comma separated emails that sign up with the admin role
    #[arg(long = "admin-emails", env = "BOOKSWAP_ADMIN_EMAILS", value_delimiter = ',')]
    pub admin_emails: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            access_token_ttl_secs: 86_400,
            reset_secret: "change-me-too".to_string(),
            reset_token_ttl_secs: 600,
            otp_ttl_secs: 600,
            admin_emails: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long = "rate-limit-per-second", env = "BOOKSWAP_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long = "rate-limit-burst", env = "BOOKSWAP_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Stricter rate limit for credential endpoints (signup/signin/otp)
    #[arg(long = "auth-rate-limit-per-second", env = "BOOKSWAP_AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub auth_per_second: u32,

    /// Burst allowance for credential endpoints
    #[arg(long = "auth-rate-limit-burst", env = "BOOKSWAP_AUTH_RATE_LIMIT_BURST", default_value_t = 3)]
    pub auth_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { per_second: 10, burst: 20, auth_per_second: 1, auth_burst: 3 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct GatewayConfig {
    /// Size of the per-connection outbound event buffer
    #[arg(long = "ws-outbound-buffer-size", env = "BOOKSWAP_WS_OUTBOUND_BUFFER_SIZE", default_value_t = 64)]
    pub outbound_buffer_size: usize,

    /// Largest inbound text frame accepted, in bytes
    #[arg(long = "ws-max-frame-bytes", env = "BOOKSWAP_WS_MAX_FRAME_BYTES", default_value_t = 65_536)]
    pub max_frame_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { outbound_buffer_size: 64, max_frame_bytes: 65_536 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct UploadConfig {
    /// Directory where uploaded chat images are written
    #[arg(long = "upload-dir", env = "BOOKSWAP_UPLOAD_DIR", default_value = "public/temp")]
    pub dir: String,

    /// Maximum size of a single uploaded image in bytes (Default: 5MB)
    #[arg(long = "upload-max-image-bytes", env = "BOOKSWAP_UPLOAD_MAX_IMAGE_BYTES", default_value_t = 5_242_880)]
    pub max_image_bytes: usize,

    /// Maximum number of images attached to one message
    #[arg(long = "upload-max-images", env = "BOOKSWAP_UPLOAD_MAX_IMAGES", default_value_t = 10)]
    pub max_images: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { dir: "public/temp".to_string(), max_image_bytes: 5_242_880, max_images: 10 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct MailConfig {
    /// Address shown in the From header of outgoing mail
    #[arg(long = "mail-from", env = "BOOKSWAP_MAIL_FROM", default_value = "Bookswap <no-reply@bookswap.local>")]
    pub from: String,

    /// Base URL of the password reset page; the token is appended as a query parameter
    #[arg(
        long = "reset-link-base",
        env = "BOOKSWAP_RESET_LINK_BASE",
        default_value = "http://localhost:5173/reset-password"
    )]
    pub reset_link_base: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "Bookswap <no-reply@bookswap.local>".to_string(),
            reset_link_base: "http://localhost:5173/reset-password".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long = "otlp-endpoint", env = "BOOKSWAP_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long = "log-format", env = "BOOKSWAP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}
