use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

const DEFAULT_TOKEN_TIMEOUT_MS: u64 = 3_000;

/// How this process authenticates to other backend services
#[derive(Clone)]
pub struct ClientCredentialsConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
    pub token_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ClientCredentialsConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: env::var("SERVICE_CLIENT_ID").context("SERVICE_CLIENT_ID must be set")?,
            client_secret: env::var("SERVICE_CLIENT_SECRET")
                .context("SERVICE_CLIENT_SECRET must be set")?,
            scope: env::var("SERVICE_CLIENT_SCOPE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            token_url: env::var("SERVICE_TOKEN_URL").context("SERVICE_TOKEN_URL must be set")?,
            timeout: Duration::from_millis(
                env::var("SERVICE_TOKEN_TIMEOUT_MS")
                    .unwrap_or_else(|_| DEFAULT_TOKEN_TIMEOUT_MS.to_string())
                    .parse()
                    .context("SERVICE_TOKEN_TIMEOUT_MS must be a number")?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        for name in [
            "SERVICE_CLIENT_ID",
            "SERVICE_CLIENT_SECRET",
            "SERVICE_CLIENT_SCOPE",
            "SERVICE_TOKEN_URL",
            "SERVICE_TOKEN_TIMEOUT_MS",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear();
        env::set_var("SERVICE_CLIENT_ID", "billing-service");
        env::set_var("SERVICE_CLIENT_SECRET", "billing-secret");
        env::set_var("SERVICE_TOKEN_URL", "http://auth:8080/oauth/token");

        let config = ClientCredentialsConfig::from_env().unwrap();
        assert_eq!(config.client_id, "billing-service");
        assert_eq!(config.scope, None);
        assert_eq!(config.timeout, Duration::from_millis(3_000));
        assert!(!format!("{config:?}").contains("billing-secret"));
        clear();
    }

    #[test]
    #[serial]
    fn test_missing_client_id_is_an_error() {
        clear();
        let err = ClientCredentialsConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("SERVICE_CLIENT_ID"));
    }
}
