//! Login, refresh and logout
//!
//! Ties the account directory, the token issuer, the refresh credential
//! store and the revocation registry together.

use crate::db::AccountDirectory;
use crate::error::{ApiError, Result};
use crate::models::{AccountStatus, LoginResponse, UserInfo};
use crate::security::verify_password;
use crate::services::refresh_tokens::RefreshTokenStore;
use jwt_security::{AuthError, RevokeOutcome, TokenBlacklist, TokenIssuer};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_DEVICE_ID: &str = "web";
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

pub struct AuthService {
    accounts: Arc<dyn AccountDirectory>,
    issuer: Arc<TokenIssuer>,
    refresh_tokens: Arc<RefreshTokenStore>,
    blacklist: Arc<TokenBlacklist>,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        issuer: Arc<TokenIssuer>,
        refresh_tokens: Arc<RefreshTokenStore>,
        blacklist: Arc<TokenBlacklist>,
    ) -> Self {
        Self {
            accounts,
            issuer,
            refresh_tokens,
            blacklist,
        }
    }

    pub fn refresh_tokens(&self) -> &Arc<RefreshTokenStore> {
        &self.refresh_tokens
    }

    /// Authenticate by username or email and open a session
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        device_id: Option<&str>,
    ) -> Result<LoginResponse> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidCredentials);
        }

        let account = self
            .accounts
            .find_by_identifier(identifier)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash)? {
            warn!(account = %identifier, "Invalid password");
            return Err(ApiError::InvalidCredentials);
        }

        match account.status {
            AccountStatus::Active => {}
            AccountStatus::PendingVerification => {
                warn!(account = %identifier, "Account is pending verification");
                return Err(ApiError::AccountPendingVerification);
            }
            AccountStatus::Disabled => {
                warn!(account = %identifier, "Account is not active");
                return Err(ApiError::AccountNotActive);
            }
        }

        let access = self.issuer.issue_user_token(&account.identity())?;
        let device_id = device_id
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DEVICE_ID);
        let refresh = self.refresh_tokens.issue(&account.id, Some(device_id)).await?;

        info!(account_id = %account.id, device_id = %device_id, jti = %access.jti, "Login successful");

        Ok(LoginResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: access.expires_in,
            user: Some(UserInfo::from(&account)),
        })
    }

    /// Rotate a refresh credential into a new access token and credential
    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginResponse> {
        let record = self.refresh_tokens.redeem(refresh_token).await?;

        let Some(account) = self.accounts.find_by_id(&record.account_id).await? else {
            warn!(account_id = %record.account_id, "Refresh token for unknown account");
            self.refresh_tokens.revoke(refresh_token).await?;
            return Err(AuthError::RefreshNotFound.into());
        };

        if !account.is_active() {
            warn!(account_id = %account.id, status = %account.status, "Refresh for inactive account");
            self.refresh_tokens.revoke(refresh_token).await?;
            return Err(ApiError::AccountNotActive);
        }

        let access = self.issuer.issue_user_token(&account.identity())?;
        self.refresh_tokens.revoke(refresh_token).await?;
        let rotated = self
            .refresh_tokens
            .issue(&account.id, record.device_id.as_deref())
            .await?;

        info!(account_id = %account.id, jti = %access.jti, "Token refresh successful");

        Ok(LoginResponse {
            access_token: access.token,
            refresh_token: rotated.token,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: access.expires_in,
            user: None,
        })
    }

    /// End every session of an account: blacklist the presented access token
    /// and drop all of its refresh credentials
    pub async fn logout(&self, access_token: &str, account_id: &str) -> Result<()> {
        self.revoke_access_token(access_token).await?;
        let revoked = self.refresh_tokens.revoke_all(account_id).await?;

        info!(account_id = %account_id, refresh_tokens = revoked, "Logout successful");
        Ok(())
    }

    /// End the current device's session only
    pub async fn logout_device(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        self.revoke_access_token(access_token).await?;
        self.refresh_tokens.revoke(refresh_token).await?;

        info!("Device logout successful");
        Ok(())
    }

    async fn revoke_access_token(&self, access_token: &str) -> Result<()> {
        match self.blacklist.revoke(access_token).await? {
            RevokeOutcome::Revoked { jti, ttl_secs } => {
                info!(jti = %jti, ttl_secs, "Blacklisted access token");
            }
            RevokeOutcome::AlreadyExpired | RevokeOutcome::Unreadable => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryAccountDirectory;
    use crate::models::Account;
    use crate::security::hash_password;
    use chrono::Duration;
    use jwt_security::test_utils::rsa_issuer;
    use jwt_security::{ManualClock, MemoryTtlStore, Roles, SharedClock, TokenCodec, TokenType};

    struct Fixture {
        auth: AuthService,
        accounts: Arc<InMemoryAccountDirectory>,
        codec: Arc<TokenCodec>,
        blacklist: Arc<TokenBlacklist>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let (issuer, codec, clock) = rsa_issuer();
        let shared: SharedClock = clock.clone();
        let store = Arc::new(MemoryTtlStore::new(shared.clone()));
        let blacklist = Arc::new(TokenBlacklist::new(store.clone(), codec.clone()));
        let refresh = Arc::new(RefreshTokenStore::new(store, shared, 7 * 24 * 3600).unwrap());

        let accounts = Arc::new(InMemoryAccountDirectory::new());
        accounts.insert(Account {
            id: "alice-id".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: hash_password("Wonderland1!").unwrap(),
            status: AccountStatus::Active,
            roles: Roles::new(["USER"]),
        });

        Fixture {
            auth: AuthService::new(accounts.clone(), issuer, refresh, blacklist.clone()),
            accounts,
            codec,
            blacklist,
            clock,
        }
    }

    #[tokio::test]
    async fn test_login_issues_user_token_and_refresh() {
        let fx = fixture();
        let response = fx.auth.login("alice", "Wonderland1!", None).await.unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 900);
        let user = response.user.as_ref().unwrap();
        assert_eq!(user.id, "alice-id");
        assert_eq!(user.roles, "ROLE_USER");

        let claims = fx.codec.verify(&response.access_token).unwrap();
        assert_eq!(claims.token_type, TokenType::User);
        assert_eq!(claims.sub, "alice-id");
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));

        let record = fx
            .auth
            .refresh_tokens()
            .redeem(&response.refresh_token)
            .await
            .unwrap();
        assert_eq!(record.device_id.as_deref(), Some(DEFAULT_DEVICE_ID));
    }

    #[tokio::test]
    async fn test_login_by_email() {
        let fx = fixture();
        assert!(fx
            .auth
            .login("ALICE@example.com", "Wonderland1!", Some("phone"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let fx = fixture();
        assert!(matches!(
            fx.auth.login("alice", "wrong", None).await,
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            fx.auth.login("mallory", "Wonderland1!", None).await,
            Err(ApiError::InvalidCredentials)
        ));

        fx.accounts
            .set_status("alice-id", AccountStatus::PendingVerification);
        assert!(matches!(
            fx.auth.login("alice", "Wonderland1!", None).await,
            Err(ApiError::AccountPendingVerification)
        ));

        // Status is only revealed to callers holding the password
        assert!(matches!(
            fx.auth.login("alice", "wrong", None).await,
            Err(ApiError::InvalidCredentials)
        ));

        fx.accounts.set_status("alice-id", AccountStatus::Disabled);
        assert!(matches!(
            fx.auth.login("alice", "Wonderland1!", None).await,
            Err(ApiError::AccountNotActive)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_credential() {
        let fx = fixture();
        let login = fx
            .auth
            .login("alice", "Wonderland1!", Some("laptop"))
            .await
            .unwrap();

        fx.clock.advance(Duration::seconds(60));
        let refreshed = fx.auth.refresh(&login.refresh_token).await.unwrap();
        assert_ne!(refreshed.refresh_token, login.refresh_token);
        assert_ne!(refreshed.access_token, login.access_token);
        assert!(refreshed.user.is_none());

        // Old credential is gone, new one keeps the device
        assert!(matches!(
            fx.auth.refresh(&login.refresh_token).await,
            Err(ApiError::Auth(AuthError::RefreshNotFound))
        ));
        let record = fx
            .auth
            .refresh_tokens()
            .redeem(&refreshed.refresh_token)
            .await
            .unwrap();
        assert_eq!(record.device_id.as_deref(), Some("laptop"));
    }

    #[tokio::test]
    async fn test_refresh_for_disabled_account_revokes_credential() {
        let fx = fixture();
        let login = fx.auth.login("alice", "Wonderland1!", None).await.unwrap();

        fx.accounts.set_status("alice-id", AccountStatus::Disabled);
        assert!(matches!(
            fx.auth.refresh(&login.refresh_token).await,
            Err(ApiError::AccountNotActive)
        ));

        fx.accounts.set_status("alice-id", AccountStatus::Active);
        assert!(matches!(
            fx.auth.refresh(&login.refresh_token).await,
            Err(ApiError::Auth(AuthError::RefreshNotFound))
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_access_and_all_refresh_tokens() {
        let fx = fixture();
        let web = fx.auth.login("alice", "Wonderland1!", None).await.unwrap();
        let phone = fx
            .auth
            .login("alice", "Wonderland1!", Some("phone"))
            .await
            .unwrap();

        let jti = fx.codec.verify(&web.access_token).unwrap().jti;
        assert!(!fx.blacklist.is_revoked(&jti).await);

        fx.auth.logout(&web.access_token, "alice-id").await.unwrap();
        assert!(fx.blacklist.is_revoked(&jti).await);

        for token in [&web.refresh_token, &phone.refresh_token] {
            assert!(matches!(
                fx.auth.refresh(token).await,
                Err(ApiError::Auth(AuthError::RefreshNotFound))
            ));
        }
    }

    #[tokio::test]
    async fn test_logout_device_keeps_other_sessions() {
        let fx = fixture();
        let web = fx.auth.login("alice", "Wonderland1!", None).await.unwrap();
        let phone = fx
            .auth
            .login("alice", "Wonderland1!", Some("phone"))
            .await
            .unwrap();

        fx.auth
            .logout_device(&web.access_token, &web.refresh_token)
            .await
            .unwrap();

        let jti = fx.codec.verify(&web.access_token).unwrap().jti;
        assert!(fx.blacklist.is_revoked(&jti).await);
        assert!(fx.auth.refresh(&web.refresh_token).await.is_err());
        assert!(fx.auth.refresh(&phone.refresh_token).await.is_ok());
    }
}
