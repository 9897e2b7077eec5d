//! Configuration management for the auth service
//!
//! Loaded once at startup from environment variables (and `.env` in debug
//! builds).

use anyhow::{anyhow, Context, Result};
use jwt_security::JwtSettings;
use std::collections::BTreeSet;
use std::env;
use std::fmt;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub jwt: JwtSettings,
    pub service_clients: Vec<ServiceClientSeed>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        let service_clients = match env::var("SERVICE_CLIENTS_SEED") {
            Ok(raw) => parse_service_clients(&raw).context("Invalid SERVICE_CLIENTS_SEED")?,
            Err(_) => Vec::new(),
        };

        Ok(Settings {
            server: ServerSettings::from_env()?,
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            service_clients,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid SERVER_PORT")?,
        })
    }
}

#[derive(Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
    /// Per-operation timeout for blacklist and refresh lookups
    pub op_timeout_ms: u64,
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
            op_timeout_ms: env::var("REDIS_OP_TIMEOUT_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("Invalid REDIS_OP_TIMEOUT_MS")?,
        })
    }
}

/// Service client provisioned at startup
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceClientSeed {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: BTreeSet<String>,
}

impl fmt::Debug for ServiceClientSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClientSeed")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Parse `client_id:secret:scope1|scope2;client_id:secret:scope`
pub fn parse_service_clients(raw: &str) -> Result<Vec<ServiceClientSeed>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let client_id = parts.next().map(str::trim).unwrap_or_default();
            let client_secret = parts.next().map(str::trim).unwrap_or_default();
            let scopes = parts.next().unwrap_or_default();

            if client_id.is_empty() || client_secret.is_empty() {
                return Err(anyhow!(
                    "service client entry needs client_id:secret[:scopes]"
                ));
            }

            Ok(ServiceClientSeed {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
                scopes: scopes
                    .split('|')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_service_clients() {
        let seeds =
            parse_service_clients("billing:s3cret:ledger.read|ledger.write; search:pw ;").unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].client_id, "billing");
        assert_eq!(seeds[0].client_secret, "s3cret");
        assert!(seeds[0].scopes.contains("ledger.write"));
        assert_eq!(seeds[1].client_id, "search");
        assert!(seeds[1].scopes.is_empty());

        assert!(parse_service_clients("billing").is_err());
        assert!(parse_service_clients(":secret:scope").is_err());
        assert!(parse_service_clients("").unwrap().is_empty());
    }

    #[test]
    fn test_seed_debug_hides_secret() {
        let seeds = parse_service_clients("billing:s3cret:ledger.read").unwrap();
        assert!(!format!("{:?}", seeds[0]).contains("s3cret"));
    }

    #[test]
    #[serial]
    fn test_server_defaults() {
        env::remove_var("SERVER_HOST");
        env::remove_var("SERVER_PORT");
        let server = ServerSettings::from_env().unwrap();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        env::set_var("SERVER_PORT", "not-a-port");
        assert!(ServerSettings::from_env().is_err());
        env::remove_var("SERVER_PORT");
    }

    #[test]
    #[serial]
    fn test_redis_settings() {
        env::remove_var("REDIS_URL");
        assert!(RedisSettings::from_env().is_err());

        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        env::remove_var("REDIS_OP_TIMEOUT_MS");
        let redis = RedisSettings::from_env().unwrap();
        assert_eq!(redis.op_timeout_ms, 500);
        env::remove_var("REDIS_URL");
    }
}
