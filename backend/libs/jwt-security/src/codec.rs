//! Token codec: compact three-part signed tokens
//!
//! Verification runs in a fixed order and stops at the first failure:
//! 1. structure (three base64url segments, JSON header with `alg`)
//! 2. algorithm matches the configured scheme
//! 3. signature against the configured key
//! 4. expiry, with no leeway, against the injected clock
//! 5. issuer

use crate::claims::Claims;
use crate::clock::SharedClock;
use crate::error::{AuthError, Result};
use crate::keys::KeyProvider;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

pub struct TokenCodec {
    keys: Arc<KeyProvider>,
    issuer: String,
    clock: SharedClock,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(keys: Arc<KeyProvider>, issuer: impl Into<String>, clock: SharedClock) -> Self {
        let mut validation = Validation::new(keys.algorithm());
        // Expiry and issuer are checked against the injected clock below
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            keys,
            issuer: issuer.into(),
            clock,
            validation,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn can_sign(&self) -> bool {
        self.keys.can_sign()
    }

    pub fn sign(&self, claims: &Claims) -> Result<String> {
        if claims.exp <= claims.iat {
            return Err(AuthError::Internal(
                "token expiry must be after its issue time".into(),
            ));
        }

        let key = self.keys.encoding_key()?;
        encode(&Header::new(self.keys.algorithm()), claims, key)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))
    }

    /// Full verification
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let claims = self.decode_signed(token)?;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::ExpiredToken);
        }

        self.check_issuer(&claims)?;
        Ok(claims)
    }

    /// Everything [`verify`](Self::verify) checks except expiry.
    ///
    /// Used where an expired but authentic token still has to be read, such
    /// as computing the remaining lifetime on revocation.
    pub fn inspect(&self, token: &str) -> Result<Claims> {
        let claims = self.decode_signed(token)?;
        self.check_issuer(&claims)?;
        Ok(claims)
    }

    fn decode_signed(&self, token: &str) -> Result<Claims> {
        let header_segment = split_segments(token)?;
        let alg = read_algorithm(header_segment)?;

        match Algorithm::from_str(&alg) {
            Ok(parsed) if parsed == self.keys.algorithm() => {}
            _ => return Err(AuthError::UnsupportedTokenAlgorithm(alg)),
        }

        decode::<Claims>(token, self.keys.decoding_key(), &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => AuthError::UnsupportedTokenAlgorithm(alg),
                _ => AuthError::MalformedToken(e.to_string()),
            })
    }

    fn check_issuer(&self, claims: &Claims) -> Result<()> {
        if claims.iss != self.issuer {
            return Err(AuthError::InvalidIssuer);
        }
        Ok(())
    }
}

/// Returns the header segment of a structurally valid token
fn split_segments(token: &str) -> Result<&str> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            Ok(header)
        }
        _ => Err(AuthError::MalformedToken(
            "expected three dot-separated segments".into(),
        )),
    }
}

fn read_algorithm(header_segment: &str) -> Result<String> {
    let raw = URL_SAFE_NO_PAD
        .decode(header_segment)
        .map_err(|_| AuthError::MalformedToken("header is not base64url".into()))?;
    let header: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|_| AuthError::MalformedToken("header is not JSON".into()))?;

    header
        .get("alg")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| AuthError::MalformedToken("header has no alg".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Roles, TokenType};
    use crate::clock::{Clock, ManualClock};
    use crate::test_utils::{
        rsa_codec, shared_secret_codec, FOREIGN_PRIVATE_KEY, FOREIGN_PUBLIC_KEY,
    };
    use chrono::Duration;
    use jsonwebtoken::EncodingKey;

    fn claims_at(clock: &ManualClock, ttl: i64) -> Claims {
        let now = clock.now().timestamp();
        Claims {
            sub: "alice-id".into(),
            iss: "auth-service".into(),
            token_type: TokenType::User,
            roles: Roles::new(["user", "admin"]),
            email: Some("alice@example.com".into()),
            client_id: None,
            scope: None,
            aud: None,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl,
        }
    }

    #[test]
    fn test_round_trip_rsa() {
        let (codec, clock) = rsa_codec();
        let claims = claims_at(&clock, 900);

        let token = codec.sign(&claims).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let verified = codec.verify(&token).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn test_round_trip_shared_secret() {
        let (codec, clock) = shared_secret_codec();
        let claims = claims_at(&clock, 60);
        let verified = codec.verify(&codec.sign(&claims).unwrap()).unwrap();
        assert_eq!(verified.sub, "alice-id");
        assert_eq!(verified.roles, claims.roles);
        assert_eq!(verified.jti, claims.jti);
        assert_eq!(verified.exp, claims.exp);
    }

    #[test]
    fn test_expired_token() {
        let (codec, clock) = rsa_codec();
        let token = codec.sign(&claims_at(&clock, 60)).unwrap();

        clock.advance(Duration::seconds(60));
        assert_eq!(codec.verify(&token).unwrap_err(), AuthError::ExpiredToken);

        // Expiry is not checked on inspection
        assert!(codec.inspect(&token).is_ok());
    }

    #[test]
    fn test_token_valid_until_last_second() {
        let (codec, clock) = rsa_codec();
        let token = codec.sign(&claims_at(&clock, 60)).unwrap();
        clock.advance(Duration::seconds(59));
        assert!(codec.verify(&token).is_ok());
    }

    #[test]
    fn test_malformed_tokens() {
        let (codec, _) = rsa_codec();
        for token in ["", "abc", "a.b", "a.b.c.d", "..", "!!!.e30.sig"] {
            assert!(
                matches!(codec.verify(token), Err(AuthError::MalformedToken(_))),
                "{token:?}"
            );
        }
    }

    #[test]
    fn test_payload_that_is_not_claims_is_malformed() {
        let (codec, _) = shared_secret_codec();
        let key = EncodingKey::from_secret(crate::test_utils::TEST_SHARED_SECRET.as_bytes());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({"hello": "world"}),
            &key,
        )
        .unwrap();
        assert!(matches!(
            codec.verify(&token),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_signature_from_foreign_key_is_rejected() {
        let (codec, clock) = rsa_codec();
        let foreign = crate::test_utils::codec_for(
            KeyProvider::rsa(FOREIGN_PRIVATE_KEY, FOREIGN_PUBLIC_KEY).unwrap(),
            clock.clone(),
        );
        let token = foreign.sign(&claims_at(&clock, 60)).unwrap();
        assert_eq!(codec.verify(&token).unwrap_err(), AuthError::InvalidSignature);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let (codec, clock) = rsa_codec();
        let token = codec.sign(&claims_at(&clock, 60)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["roles"] = serde_json::json!("ROLE_admin,ROLE_root");
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(codec.verify(&forged).unwrap_err(), AuthError::InvalidSignature);
    }

    #[test]
    fn test_algorithm_mismatch_is_unsupported() {
        let (rsa, clock) = rsa_codec();
        let (hmac, _) = shared_secret_codec();
        let hs_token = hmac.sign(&claims_at(&clock, 60)).unwrap();

        assert_eq!(
            rsa.verify(&hs_token).unwrap_err(),
            AuthError::UnsupportedTokenAlgorithm("HS256".into())
        );
    }

    #[test]
    fn test_alg_none_is_unsupported() {
        let (codec, clock) = rsa_codec();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims_at(&clock, 60)).unwrap());
        let token = format!("{header}.{payload}.sig");

        assert_eq!(
            codec.verify(&token).unwrap_err(),
            AuthError::UnsupportedTokenAlgorithm("none".into())
        );
    }

    #[test]
    fn test_issuer_mismatch() {
        let (codec, clock) = rsa_codec();
        let mut claims = claims_at(&clock, 60);
        claims.iss = "someone-else".into();
        let token = codec.sign(&claims).unwrap();
        assert_eq!(codec.verify(&token).unwrap_err(), AuthError::InvalidIssuer);
    }

    #[test]
    fn test_sign_rejects_non_positive_lifetime() {
        let (codec, clock) = rsa_codec();
        let claims = claims_at(&clock, 0);
        assert!(matches!(codec.sign(&claims), Err(AuthError::Internal(_))));
    }

    #[test]
    fn test_verify_only_codec_cannot_sign() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = crate::test_utils::codec_for(
            KeyProvider::verify_only(crate::test_utils::TEST_PUBLIC_KEY).unwrap(),
            clock.clone(),
        );
        assert!(!codec.can_sign());
        assert_eq!(
            codec.sign(&claims_at(&clock, 60)).unwrap_err(),
            AuthError::NoSigningKeyConfigured
        );
    }
}
