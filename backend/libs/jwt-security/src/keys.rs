//! Key provider
//!
//! The signing scheme is chosen exactly once, from configuration, and carried
//! as a tagged variant afterwards:
//! - public key configured: RS256, the private key only on the issuing side
//! - otherwise shared secret configured: HS256 (deprecated fallback)
//! - both configured: refused as ambiguous
//! - neither configured: [`AuthError::NoSigningKeyConfigured`]

use crate::config::JwtSettings;
use crate::error::{AuthError, Result};
use crate::secret_validation::{ensure_usable_secret, SecretStrength};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use tracing::{info, warn};
use zeroize::Zeroizing;

pub enum SigningScheme {
    Asymmetric {
        /// `None` on services that only verify
        encoding: Option<EncodingKey>,
        decoding: DecodingKey,
    },
    SharedSecret {
        encoding: EncodingKey,
        decoding: DecodingKey,
    },
}

impl SigningScheme {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            SigningScheme::Asymmetric { .. } => Algorithm::RS256,
            SigningScheme::SharedSecret { .. } => Algorithm::HS256,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SigningScheme::Asymmetric { .. } => "asymmetric",
            SigningScheme::SharedSecret { .. } => "shared-secret",
        }
    }
}

impl std::fmt::Debug for SigningScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningScheme::Asymmetric { encoding, .. } => f
                .debug_struct("Asymmetric")
                .field("can_sign", &encoding.is_some())
                .finish(),
            SigningScheme::SharedSecret { .. } => f.debug_struct("SharedSecret").finish(),
        }
    }
}

#[derive(Debug)]
pub struct KeyProvider {
    scheme: SigningScheme,
}

impl KeyProvider {
    /// RS256 with both halves of the key pair (issuing side)
    pub fn rsa(private_key_pem: &str, public_key_pem: &str) -> Result<Self> {
        let encoding = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(format!("private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(format!("public key: {e}")))?;

        info!(algorithm = "RS256", "Loaded RSA signing key pair");
        Ok(Self {
            scheme: SigningScheme::Asymmetric {
                encoding: Some(encoding),
                decoding,
            },
        })
    }

    /// RS256 verification only
    pub fn verify_only(public_key_pem: &str) -> Result<Self> {
        let decoding = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(format!("public key: {e}")))?;

        info!(algorithm = "RS256", "Loaded RSA verification key");
        Ok(Self {
            scheme: SigningScheme::Asymmetric {
                encoding: None,
                decoding,
            },
        })
    }

    /// HS256 with a shared secret. Weak secrets are refused.
    pub fn shared_secret(secret: &str) -> Result<Self> {
        let strength = ensure_usable_secret(secret)?;
        if strength == SecretStrength::Acceptable {
            warn!("JWT shared secret is shorter than recommended");
        }
        warn!(
            algorithm = "HS256",
            "Using deprecated shared-secret token scheme; configure JWT_PUBLIC_KEY instead"
        );

        let bytes = Zeroizing::new(secret.as_bytes().to_vec());
        Ok(Self {
            scheme: SigningScheme::SharedSecret {
                encoding: EncodingKey::from_secret(&bytes),
                decoding: DecodingKey::from_secret(&bytes),
            },
        })
    }

    pub fn from_settings(settings: &JwtSettings) -> Result<Self> {
        match (
            settings.public_key_pem.as_deref(),
            settings.shared_secret.as_deref(),
        ) {
            (Some(_), Some(_)) => Err(AuthError::InvalidKey(
                "both JWT_PUBLIC_KEY and JWT_SECRET are set; configure exactly one scheme".into(),
            )),
            (Some(public), None) => match settings.private_key_pem.as_deref() {
                Some(private) => Self::rsa(private, public),
                None => Self::verify_only(public),
            },
            (None, Some(secret)) => {
                if settings.private_key_pem.is_some() {
                    return Err(AuthError::InvalidKey(
                        "JWT_PRIVATE_KEY requires JWT_PUBLIC_KEY".into(),
                    ));
                }
                Self::shared_secret(secret)
            }
            (None, None) if settings.private_key_pem.is_some() => Err(AuthError::InvalidKey(
                "JWT_PRIVATE_KEY requires JWT_PUBLIC_KEY".into(),
            )),
            (None, None) => Err(AuthError::NoSigningKeyConfigured),
        }
    }

    pub fn scheme(&self) -> &SigningScheme {
        &self.scheme
    }

    pub fn algorithm(&self) -> Algorithm {
        self.scheme.algorithm()
    }

    pub fn can_sign(&self) -> bool {
        match &self.scheme {
            SigningScheme::Asymmetric { encoding, .. } => encoding.is_some(),
            SigningScheme::SharedSecret { .. } => true,
        }
    }

    pub fn encoding_key(&self) -> Result<&EncodingKey> {
        match &self.scheme {
            SigningScheme::Asymmetric {
                encoding: Some(key),
                ..
            } => Ok(key),
            SigningScheme::Asymmetric { encoding: None, .. } => {
                Err(AuthError::NoSigningKeyConfigured)
            }
            SigningScheme::SharedSecret { encoding, .. } => Ok(encoding),
        }
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        match &self.scheme {
            SigningScheme::Asymmetric { decoding, .. } => decoding,
            SigningScheme::SharedSecret { decoding, .. } => decoding,
        }
    }
}
