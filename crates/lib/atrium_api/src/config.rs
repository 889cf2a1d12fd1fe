//! API server configuration.
//!
//! Built once at startup and carried in `AppState`.

use std::str::FromStr;

use atrium_core::auth::jwt::{DEFAULT_SESSION_TTL_DAYS, resolve_jwt_secret};
use atrium_core::auth::lockout::{DEFAULT_LOCK_MINUTES, DEFAULT_MAX_ATTEMPTS, LockoutPolicy};
use atrium_core::auth::login::LoginPolicy;
use atrium_core::auth::otp::{DEFAULT_OTP_TTL_SECS, DEFAULT_TEMPLATE_ID, DemoLogin, OtpPolicy};
use atrium_core::auth::phone::{normalize_phone, validate_otp_format};
use chrono::Duration;
use tracing::warn;
use url::Url;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Origins allowed by CORS. Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub auth: AuthConfig,
    pub sms: SmsConfig,
    /// Master admin created at startup when none exists.
    pub seed_admin: Option<SeedAdmin>,
}

/// Login and session policy.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// `APP_ENV=production`: secure cookies, strict SMS delivery, no demo login.
    pub is_production: bool,
    pub session_ttl: Duration,
    pub otp_ttl: Duration,
    pub otp_lockout: LockoutPolicy,
    pub login_lockout: LockoutPolicy,
    pub demo: Option<DemoLogin>,
    pub sms_template_id: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            is_production: false,
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
            otp_ttl: Duration::seconds(DEFAULT_OTP_TTL_SECS),
            otp_lockout: LockoutPolicy::default(),
            login_lockout: LockoutPolicy::default(),
            demo: None,
            sms_template_id: DEFAULT_TEMPLATE_ID.to_string(),
        }
    }
}

impl AuthConfig {
    pub fn otp_policy(&self) -> OtpPolicy {
        OtpPolicy {
            code_ttl: self.otp_ttl,
            lockout: self.otp_lockout,
            template_id: self.sms_template_id.clone(),
            is_production: self.is_production,
            demo: self.demo.clone(),
        }
    }

    pub fn login_policy(&self) -> LoginPolicy {
        LoginPolicy {
            lockout: self.login_lockout,
        }
    }
}

/// Outbound SMS provider settings. No URL selects the logging gateway.
#[derive(Clone, Debug, Default)]
pub struct SmsConfig {
    pub gateway_url: Option<Url>,
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                                  | Default                             |
    /// |-------------------------------------------|-------------------------------------|
    /// | `BIND_ADDR`                               | `127.0.0.1:3100`                    |
    /// | `DATABASE_URL`                            | `postgres://localhost:5432/atrium`  |
    /// | `JWT_SECRET` / `AUTH_SECRET`              | generated & persisted to file       |
    /// | `APP_ENV`                                 | `development`                       |
    /// | `ALLOWED_ORIGINS`                         | empty (any origin)                  |
    /// | `DEMO_PHONE` / `DEMO_OTP`                 | unset                               |
    /// | `SESSION_TTL_DAYS`                        | `7`                                 |
    /// | `OTP_TTL_SECS`                            | `300`                               |
    /// | `OTP_MAX_ATTEMPTS` / `LOGIN_MAX_ATTEMPTS` | `5`                                 |
    /// | `OTP_LOCK_MINUTES` / `LOGIN_LOCK_MINUTES` | `15`                                |
    /// | `SMS_GATEWAY_URL` / `SMS_API_KEY`         | unset (log gateway)                 |
    /// | `SMS_TEMPLATE_ID`                         | `otp-login`                         |
    /// | `MASTER_ADMIN_EMAIL` / `MASTER_ADMIN_PASSWORD` | unset (no seeding)             |
    pub fn from_env() -> Self {
        let auth = AuthConfig {
            is_production: is_production_env(var("APP_ENV").as_deref()),
            session_ttl: Duration::days(parse_var("SESSION_TTL_DAYS", DEFAULT_SESSION_TTL_DAYS)),
            otp_ttl: Duration::seconds(parse_var("OTP_TTL_SECS", DEFAULT_OTP_TTL_SECS)),
            otp_lockout: lockout_from_env("OTP"),
            login_lockout: lockout_from_env("LOGIN"),
            demo: demo_from(var("DEMO_PHONE"), var("DEMO_OTP")),
            sms_template_id: var("SMS_TEMPLATE_ID").unwrap_or_else(|| DEFAULT_TEMPLATE_ID.into()),
        };

        let gateway_url = var("SMS_GATEWAY_URL").and_then(|raw| match Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("ignoring SMS_GATEWAY_URL: {e}");
                None
            }
        });

        let seed_admin = match (var("MASTER_ADMIN_EMAIL"), var("MASTER_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(SeedAdmin { email, password }),
            _ => None,
        };

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3100".into()),
            pg_connection_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/atrium".into()),
            jwt_secret: resolve_jwt_secret(),
            allowed_origins: parse_origins(var("ALLOWED_ORIGINS").as_deref().unwrap_or("")),
            auth,
            sms: SmsConfig {
                gateway_url,
                api_key: var("SMS_API_KEY"),
            },
            seed_admin,
        }
    }
}

/// Non-empty environment variable.
fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr + Copy>(key: &str, default: T) -> T {
    match var(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
        None => default,
    }
}

fn lockout_from_env(prefix: &str) -> LockoutPolicy {
    let max_attempts: i32 = parse_var(&format!("{prefix}_MAX_ATTEMPTS"), DEFAULT_MAX_ATTEMPTS);
    let minutes: i64 = parse_var(&format!("{prefix}_LOCK_MINUTES"), DEFAULT_LOCK_MINUTES);
    LockoutPolicy {
        max_attempts: max_attempts.max(1),
        lock_for: Duration::minutes(minutes.max(1)),
    }
}

fn is_production_env(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "production" | "prod"))
}

/// Comma-separated origin list; blanks are dropped.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

/// Both halves must be present and well-formed for the demo login to apply.
fn demo_from(phone: Option<String>, code: Option<String>) -> Option<DemoLogin> {
    let (phone, code) = (phone?, code?);
    let phone = match normalize_phone(&phone) {
        Ok(p) => p,
        Err(e) => {
            warn!("ignoring DEMO_PHONE: {e}");
            return None;
        }
    };
    if let Err(e) = validate_otp_format(&code) {
        warn!("ignoring DEMO_OTP: {e}");
        return None;
    }
    Some(DemoLogin { phone, code })
}
