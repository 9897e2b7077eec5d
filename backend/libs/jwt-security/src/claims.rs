use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

pub const ROLE_PREFIX: &str = "ROLE_";
pub const SERVICE_ROLE: &str = "ROLE_SERVICE";

/// Kind of principal a token was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "USER_TOKEN")]
    User,
    #[serde(rename = "SERVICE_TOKEN")]
    Service,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::User => "USER_TOKEN",
            TokenType::Service => "SERVICE_TOKEN",
        }
    }
}

/// Ordered set of role names.
///
/// Every role carries the `ROLE_` prefix in memory, so `admin` and
/// `ROLE_admin` are the same role. The comma-joined form only exists on the
/// wire (token claim and forwarded header).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Roles(BTreeSet<String>);

impl Roles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(roles.into_iter().filter_map(normalize_role).collect())
    }

    pub fn service() -> Self {
        Self::new([SERVICE_ROLE])
    }

    /// Parse the comma-joined wire form, skipping blanks
    pub fn from_wire(joined: &str) -> Self {
        Self::new(joined.split(','))
    }

    pub fn to_wire(&self) -> String {
        self.0.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }

    pub fn contains(&self, role: &str) -> bool {
        normalize_role(role).is_some_and(|r| self.0.contains(&r))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize_role(role: impl AsRef<str>) -> Option<String> {
    let role = role.as_ref().trim();
    if role.is_empty() {
        return None;
    }
    if role.starts_with(ROLE_PREFIX) {
        Some(role.to_string())
    } else {
        Some(format!("{ROLE_PREFIX}{role}"))
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl Serialize for Roles {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for Roles {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let joined = String::deserialize(deserializer)?;
        Ok(Roles::from_wire(&joined))
    }
}

/// Claim set carried by every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id for user tokens, client id for service tokens
    pub sub: String,
    pub iss: String,
    pub token_type: TokenType,
    #[serde(default)]
    pub roles: Roles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_service(&self) -> bool {
        self.token_type == TokenType::Service
    }

    /// Scope entries of a service token
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_are_prefixed_and_deduplicated() {
        let roles = Roles::new(["user", "ROLE_user", " admin ", ""]);
        assert_eq!(roles.len(), 2);
        assert!(!roles.contains("ROLE_ADMIN"));
        assert!(roles.contains("admin"));
        assert!(roles.contains("ROLE_user"));
    }

    #[test]
    fn test_roles_wire_form_is_stable() {
        let a = Roles::new(["user", "admin"]);
        let b = Roles::from_wire("ROLE_user, ROLE_admin,");
        assert_eq!(a, b);
        assert_eq!(a.to_wire(), "ROLE_admin,ROLE_user");
    }

    #[test]
    fn test_roles_serialize_as_joined_string() {
        let json = serde_json::to_string(&Roles::new(["user"])).unwrap();
        assert_eq!(json, "\"ROLE_user\"");
    }

    #[test]
    fn test_token_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&TokenType::Service).unwrap(),
            "\"SERVICE_TOKEN\""
        );
        let parsed: TokenType = serde_json::from_str("\"USER_TOKEN\"").unwrap();
        assert_eq!(parsed, TokenType::User);
    }

    #[test]
    fn test_service_scopes_split() {
        let claims = Claims {
            sub: "billing".into(),
            iss: "auth-service".into(),
            token_type: TokenType::Service,
            roles: Roles::service(),
            email: None,
            client_id: Some("billing".into()),
            scope: Some("read, write".into()),
            aud: Some("ledger".into()),
            jti: "j".into(),
            iat: 0,
            exp: 1,
        };
        assert!(claims.is_service());
        assert_eq!(claims.scopes(), vec!["read", "write"]);
    }
}
