//! Client-credentials exchange messages

use serde::{Deserialize, Serialize};

pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";
pub const BEARER: &str = "Bearer";

/// Form body posted to the token endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentialsRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl ClientCredentialsRequest {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: Option<String>,
        audience: Option<String>,
    ) -> Self {
        Self {
            grant_type: GRANT_TYPE_CLIENT_CREDENTIALS.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope,
            audience,
        }
    }
}

impl std::fmt::Debug for ClientCredentialsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsRequest")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

/// Error body returned by the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    pub error_description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_are_omitted() {
        let req = ClientCredentialsRequest::new("billing", "s3cret", None, None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["grant_type"], "client_credentials");
        assert!(json.get("scope").is_none());
        assert!(json.get("audience").is_none());
    }

    #[test]
    fn test_debug_hides_secret() {
        let req = ClientCredentialsRequest::new("billing", "s3cret", None, Some("ledger".into()));
        assert!(!format!("{req:?}").contains("s3cret"));
    }
}
