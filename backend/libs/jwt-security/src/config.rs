use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_ISSUER: &str = "auth-service";
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 900; // 15 minutes
pub const DEFAULT_SERVICE_TOKEN_TTL_SECS: i64 = 300; // 5 minutes
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 604_800; // 7 days
/// Upper bound for any configured token lifetime
pub const MAX_TOKEN_TTL_SECS: i64 = 366 * 24 * 3600;

/// Key material and token lifetimes, read once at startup
#[derive(Clone)]
pub struct JwtSettings {
    /// PEM, present only on the issuing side
    pub private_key_pem: Option<String>,
    pub public_key_pem: Option<String>,
    /// Deprecated HS256 fallback
    pub shared_secret: Option<String>,
    pub issuer: String,
    pub access_token_ttl_secs: i64,
    pub service_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("private_key_pem", &self.private_key_pem.as_ref().map(|_| "<redacted>"))
            .field("public_key_pem", &self.public_key_pem.is_some())
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("service_token_ttl_secs", &self.service_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .finish()
    }
}

impl JwtSettings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            private_key_pem: non_empty_var("JWT_PRIVATE_KEY"),
            public_key_pem: non_empty_var("JWT_PUBLIC_KEY"),
            shared_secret: non_empty_var("JWT_SECRET"),
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string()),
            access_token_ttl_secs: parse_secs(
                "JWT_ACCESS_TOKEN_TTL_SECS",
                DEFAULT_ACCESS_TOKEN_TTL_SECS,
            )?,
            service_token_ttl_secs: parse_secs(
                "JWT_SERVICE_TOKEN_TTL_SECS",
                DEFAULT_SERVICE_TOKEN_TTL_SECS,
            )?,
            refresh_token_ttl_secs: parse_secs(
                "JWT_REFRESH_TOKEN_TTL_SECS",
                DEFAULT_REFRESH_TOKEN_TTL_SECS,
            )?,
        })
    }

    /// Settings with default lifetimes and no key material
    pub fn with_defaults() -> Self {
        Self {
            private_key_pem: None,
            public_key_pem: None,
            shared_secret: None,
            issuer: DEFAULT_ISSUER.to_string(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            service_token_ttl_secs: DEFAULT_SERVICE_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.replace("\\n", "\n"))
        .filter(|v| !v.trim().is_empty())
}

fn parse_secs(name: &str, default: i64) -> Result<i64> {
    let value: i64 = env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{name} must be a whole number of seconds"))?;
    if value <= 0 {
        anyhow::bail!("{name} must be positive");
    }
    if value > MAX_TOKEN_TTL_SECS {
        anyhow::bail!("{name} must not exceed {MAX_TOKEN_TTL_SECS} seconds");
    }
    Ok(value)
}
