use jwt_security::{Roles, UserIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    PendingVerification,
    Disabled,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::PendingVerification => "pending_verification",
            AccountStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "pending_verification" => Ok(AccountStatus::PendingVerification),
            "disabled" => Ok(AccountStatus::Disabled),
            other => Err(format!("unknown account status: {other}")),
        }
    }
}

/// Account as seen by the token issuer
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub status: AccountStatus,
    pub roles: Roles,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            account_id: self.id.clone(),
            email: Some(self.email.clone()),
            roles: self.roles.clone(),
        }
    }
}

/// Registered caller of the client-credentials grant
#[derive(Debug, Clone)]
pub struct ServiceClient {
    pub client_id: String,
    /// Argon2 PHC string
    pub secret_hash: String,
    pub allowed_scopes: BTreeSet<String>,
    pub enabled: bool,
}

impl ServiceClient {
    /// Exact membership; `ledger.read` does not grant `ledger.rea` or `LEDGER.READ`
    pub fn has_scope(&self, scope: &str) -> bool {
        self.allowed_scopes.contains(scope)
    }

    pub fn full_scope(&self) -> String {
        self.allowed_scopes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

// Request/Response DTOs

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub account: String,
    pub password: String,
    pub device_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub roles: String,
}

impl From<&Account> for UserInfo {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            roles: account.roles.to_wire(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    /// Delivered as a cookie by the HTTP layer, never in the body
    #[serde(skip)]
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthTokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}
