use crate::claims::{Claims, Roles, TokenType};
use crate::codec::TokenCodec;
use crate::config::{JwtSettings, MAX_TOKEN_TTL_SECS};
use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Account data embedded in a user token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub account_id: String,
    pub email: Option<String>,
    pub roles: Roles,
}

/// A freshly signed token and its bookkeeping
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Lifetime in seconds, for `expires_in` response fields
    pub expires_in: i64,
}

/// Builds user and service tokens; persists nothing
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    access_ttl: Duration,
    service_ttl: Duration,
}

impl TokenIssuer {
    /// Fails with [`AuthError::NoSigningKeyConfigured`] when the codec can
    /// only verify, so a misconfigured issuer never reaches request handling.
    pub fn new(codec: Arc<TokenCodec>, access_ttl_secs: i64, service_ttl_secs: i64) -> Result<Self> {
        if !codec.can_sign() {
            return Err(AuthError::NoSigningKeyConfigured);
        }
        let lifetime = |secs: i64| {
            Duration::try_seconds(secs)
                .filter(|_| secs > 0 && secs <= MAX_TOKEN_TTL_SECS)
                .ok_or_else(|| {
                    AuthError::Internal(format!(
                        "token lifetime {secs}s is outside 1..={MAX_TOKEN_TTL_SECS}"
                    ))
                })
        };
        let access_ttl = lifetime(access_ttl_secs)?;
        let service_ttl = lifetime(service_ttl_secs)?;
        if service_ttl_secs >= access_ttl_secs {
            warn!(
                service_ttl_secs,
                access_ttl_secs, "Service token lifetime is not shorter than user token lifetime"
            );
        }

        Ok(Self {
            codec,
            access_ttl,
            service_ttl,
        })
    }

    pub fn from_settings(codec: Arc<TokenCodec>, settings: &JwtSettings) -> Result<Self> {
        Self::new(
            codec,
            settings.access_token_ttl_secs,
            settings.service_token_ttl_secs,
        )
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn service_ttl(&self) -> Duration {
        self.service_ttl
    }

    pub fn issue_user_token(&self, user: &UserIdentity) -> Result<IssuedToken> {
        let issued = self.sign(
            |iat, exp, jti| Claims {
                sub: user.account_id.clone(),
                iss: self.codec.issuer().to_string(),
                token_type: TokenType::User,
                roles: user.roles.clone(),
                email: user.email.clone(),
                client_id: None,
                scope: None,
                aud: None,
                jti,
                iat,
                exp,
            },
            self.access_ttl,
        )?;

        info!(
            account_id = %user.account_id,
            jti = %issued.jti,
            "Issued user token"
        );
        Ok(issued)
    }

    pub fn issue_service_token(
        &self,
        client_id: &str,
        audience: &str,
        scope: &str,
    ) -> Result<IssuedToken> {
        let issued = self.sign(
            |iat, exp, jti| Claims {
                sub: client_id.to_string(),
                iss: self.codec.issuer().to_string(),
                token_type: TokenType::Service,
                roles: Roles::service(),
                email: None,
                client_id: Some(client_id.to_string()),
                scope: Some(scope.to_string()),
                aud: Some(audience.to_string()),
                jti,
                iat,
                exp,
            },
            self.service_ttl,
        )?;

        info!(
            client_id = %client_id,
            audience = %audience,
            jti = %issued.jti,
            "Issued service token"
        );
        Ok(issued)
    }

    fn sign<F>(&self, build: F, ttl: Duration) -> Result<IssuedToken>
    where
        F: FnOnce(i64, i64, String) -> Claims,
    {
        let issued_at = self.codec.clock().now();
        let expires_at = issued_at + ttl;
        let jti = Uuid::new_v4().to_string();

        let claims = build(issued_at.timestamp(), expires_at.timestamp(), jti.clone());
        let token = self.codec.sign(&claims)?;

        Ok(IssuedToken {
            token,
            jti,
            issued_at,
            expires_at,
            expires_in: ttl.num_seconds(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::keys::KeyProvider;
    use crate::test_utils::{alice, codec_for, rsa_codec, rsa_issuer, TEST_PUBLIC_KEY};

    #[test]
    fn test_user_token_claims() {
        let (issuer, codec, _) = rsa_issuer();
        let issued = issuer.issue_user_token(&alice()).unwrap();

        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.token_type, TokenType::User);
        assert_eq!(claims.sub, "alice-id");
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.roles.to_wire(), "ROLE_user");
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(issued.expires_in, 900);
        assert!(claims.aud.is_none());
    }

    #[test]
    fn test_service_token_claims() {
        let (issuer, codec, _) = rsa_issuer();
        let issued = issuer
            .issue_service_token("billing-service", "ledger-service", "ledger.read")
            .unwrap();

        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.token_type, TokenType::Service);
        assert_eq!(claims.sub, "billing-service");
        assert_eq!(claims.client_id.as_deref(), Some("billing-service"));
        assert_eq!(claims.aud.as_deref(), Some("ledger-service"));
        assert_eq!(claims.scope.as_deref(), Some("ledger.read"));
        assert_eq!(claims.roles, Roles::service());
        assert!(claims.email.is_none());
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn test_jti_is_fresh_per_issuance() {
        let (issuer, _, _) = rsa_issuer();
        let a = issuer.issue_user_token(&alice()).unwrap();
        let b = issuer.issue_user_token(&alice()).unwrap();
        assert_ne!(a.jti, b.jti);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_verify_only_keys_cannot_issue() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_for(KeyProvider::verify_only(TEST_PUBLIC_KEY).unwrap(), clock);
        assert!(matches!(
            TokenIssuer::new(Arc::new(codec), 900, 300),
            Err(AuthError::NoSigningKeyConfigured)
        ));
    }

    #[test]
    fn test_out_of_range_lifetimes_are_rejected() {
        let (codec, _) = rsa_codec();
        for (access, service) in [(i64::MAX, 300), (900, i64::MAX), (0, 300), (900, -1)] {
            assert!(matches!(
                TokenIssuer::new(codec.clone(), access, service),
                Err(AuthError::Internal(_))
            ));
        }
        assert!(TokenIssuer::new(codec, MAX_TOKEN_TTL_SECS, 300).is_ok());
    }
}
