//! Signed access tokens
//!
//! A token binds a wallet address to one dataset for a limited time. Download
//! flows take the requester address from a verified token rather than from
//! an unauthenticated request parameter.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::{TokenConfig, MAX_TTL_SECS};
use crate::error::{CoreError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Wallet address the token was issued to
    pub address: String,

    /// Dataset the token grants access to
    pub dataset_id: String,

    /// Blob store locator of the dataset
    pub content_id: String,

    /// Unique token identifier
    pub token_id: Uuid,

    /// Issue time (unix seconds)
    pub issued_at: i64,

    /// Expiry time (unix seconds)
    pub expires_at: i64,
}

#[derive(Serialize, Deserialize)]
struct SignedToken {
    claims: AccessClaims,
    signature: String,
}

/// Issues and verifies HMAC-SHA256 signed access tokens
pub struct AccessTokenIssuer {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
}

impl Debug for AccessTokenIssuer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AccessTokenIssuer")
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}

impl AccessTokenIssuer {
    /// Create an issuer
    ///
    /// An empty secret or a lifetime outside `1..=MAX_TTL_SECS` is rejected.
    pub fn new(secret: &str, ttl_secs: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(CoreError::Config("token secret must not be empty".to_string()));
        }
        let ttl = Some(ttl_secs)
            .filter(|secs| (1..=MAX_TTL_SECS).contains(secs))
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
            .ok_or_else(|| CoreError::Config(format!("token ttl {} out of range", ttl_secs)))?;

        Ok(AccessTokenIssuer {
            secret: Zeroizing::new(secret.as_bytes().to_vec()),
            ttl,
        })
    }

    /// Create an issuer from configuration
    pub fn from_config(config: &TokenConfig) -> Result<Self> {
        let secret = config
            .secret
            .as_deref()
            .ok_or_else(|| CoreError::Config("token secret is not configured".to_string()))?;
        Self::new(secret, config.ttl_secs)
    }

    /// Issue a token for `address` on one dataset
    pub fn issue(&self, address: &str, dataset_id: &str, content_id: &str) -> Result<String> {
        self.issue_at(address, dataset_id, content_id, Utc::now())
    }

    /// Issue a token as of `now`
    pub fn issue_at(
        &self,
        address: &str,
        dataset_id: &str,
        content_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if address.is_empty() || dataset_id.is_empty() {
            return Err(CoreError::InvalidInput(
                "token address and dataset id are required".to_string(),
            ));
        }

        let claims = AccessClaims {
            address: address.to_string(),
            dataset_id: dataset_id.to_string(),
            content_id: content_id.to_string(),
            token_id: Uuid::new_v4(),
            issued_at: now.timestamp(),
            expires_at: now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| CoreError::Internal("token expiry out of range".to_string()))?
                .timestamp(),
        };

        let signature = hex::encode(self.sign(&claims)?);
        let token = serde_json::to_vec(&SignedToken { claims, signature })?;
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<AccessClaims> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as of `now`
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| CoreError::InvalidInput("invalid token format".to_string()))?;
        let signed: SignedToken = serde_json::from_slice(&raw)
            .map_err(|_| CoreError::InvalidInput("invalid token format".to_string()))?;
        let signature = hex::decode(&signed.signature)
            .map_err(|_| CoreError::InvalidInput("invalid token format".to_string()))?;

        let mut mac = self.mac()?;
        mac.update(&serde_json::to_vec(&signed.claims)?);
        mac.verify_slice(&signature)
            .map_err(|_| CoreError::AccessDenied("invalid token signature".to_string()))?;

        if signed.claims.expires_at < now.timestamp() {
            return Err(CoreError::AccessDenied("token expired".to_string()));
        }

        Ok(signed.claims)
    }

    fn sign(&self, claims: &AccessClaims) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(&serde_json::to_vec(claims)?);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CoreError::Internal(format!("hmac init failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn issuer() -> AccessTokenIssuer {
        AccessTokenIssuer::new("unit-test-secret", 3600).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let token = issuer.issue("0xB", "dataset_4", "QmFinancial").unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.address, "0xB");
        assert_eq!(claims.dataset_id, "dataset_4");
        assert_eq!(claims.content_id, "QmFinancial");
        assert_eq!(claims.expires_at - claims.issued_at, 3600);
    }

    #[test]
    fn test_expired_token_denied() {
        let issuer = issuer();
        let issued = Utc::now() - Duration::hours(2);
        let token = issuer.issue_at("0xB", "dataset_4", "Qm", issued).unwrap();

        let err = issuer.verify(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_foreign_secret_denied() {
        let token = issuer().issue("0xB", "dataset_4", "Qm").unwrap();
        let other = AccessTokenIssuer::new("another-secret", 3600).unwrap();

        let err = other.verify(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_tampered_claims_denied() {
        let issuer = issuer();
        let token = issuer.issue("0xB", "dataset_4", "Qm").unwrap();

        let raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let mut signed: SignedToken = serde_json::from_slice(&raw).unwrap();
        signed.claims.address = "0xC".to_string();
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&signed).unwrap());

        let err = issuer.verify(&forged).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_garbage_token_is_invalid_input() {
        let err = issuer().verify("definitely not a token").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(AccessTokenIssuer::new("", 60), Err(CoreError::Config(_))));
        assert!(AccessTokenIssuer::from_config(&TokenConfig::default()).is_err());
    }

    #[test]
    fn test_ttl_out_of_range_rejected() {
        assert!(matches!(
            AccessTokenIssuer::new("secret", u64::MAX),
            Err(CoreError::Config(_))
        ));
        assert!(matches!(
            AccessTokenIssuer::new("secret", 10_000_000_000_000),
            Err(CoreError::Config(_))
        ));
        assert!(AccessTokenIssuer::new("secret", 0).is_err());
    }

    #[test]
    fn test_issue_near_end_of_time_is_an_error() {
        let issuer = AccessTokenIssuer::new("secret", MAX_TTL_SECS).unwrap();
        let err = issuer
            .issue_at("0xA", "dataset_1", "QmTest", DateTime::<Utc>::MAX_UTC)
            .unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let shown = format!("{:?}", issuer());
        assert!(!shown.contains("unit-test-secret"));
    }
}
