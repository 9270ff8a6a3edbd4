//! Configuration for the core crate
//!
//! This module provides configuration options for the core crate,
//! including key-derivation settings, registry policy, and the endpoints
//! of the external collaborators.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Minimum PBKDF2 work factor accepted outside debug mode
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Longest lifetime any access token or signed URL may be given
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

fn default_max_signed_url_ttl() -> u64 {
    7 * 24 * 60 * 60
}

/// Content protection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// PBKDF2-HMAC-SHA256 iteration count
    pub kdf_iterations: u32,

    /// Salt length in bytes
    pub salt_len: usize,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        ProtectionConfig {
            kdf_iterations: MIN_KDF_ITERATIONS,
            salt_len: 32,
        }
    }
}

/// Registry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Trust score every dataset starts from before metadata bonuses
    pub base_trust_score: u8,

    /// Score at or above which a dataset counts as high trust
    pub high_trust_threshold: u8,

    /// Whether to seed the demo catalogue at startup
    pub seed_fixtures: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            base_trust_score: 80,
            high_trust_threshold: 90,
            seed_fixtures: false,
        }
    }
}

/// Pinning gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the pinning API
    pub api_url: String,

    /// Base URL of the retrieval gateway
    pub gateway_url: String,

    /// Bearer token for the pinning API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,

    /// Default lifetime of signed URLs in seconds
    pub default_signed_url_ttl_secs: u64,

    /// Longest lifetime a caller may request for a signed URL
    #[serde(default = "default_max_signed_url_ttl")]
    pub max_signed_url_ttl_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            api_url: "https://api.pinata.cloud".to_string(),
            gateway_url: "https://gateway.pinata.cloud".to_string(),
            jwt: None,
            default_signed_url_ttl_secs: 3600,
            max_signed_url_ttl_secs: default_max_signed_url_ttl(),
        }
    }
}

/// Chain service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Network identifier (e.g. "testnet")
    pub network: String,

    /// REST endpoint of the chain node
    pub node_url: String,

    /// Address of the dataset registry module
    pub module_address: Option<String>,

    /// Service account that signs registry transactions
    pub service_account: Option<String>,

    /// Endpoint that signs and submits transactions on our behalf
    pub relay_url: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            network: "testnet".to_string(),
            node_url: "https://fullnode.testnet.aptoslabs.com/v1".to_string(),
            module_address: None,
            service_account: None,
            relay_url: None,
        }
    }
}

impl ChainConfig {
    /// Whether enough is configured to talk to the registry module
    pub fn is_configured(&self) -> bool {
        self.module_address.as_deref().map_or(false, |a| !a.is_empty())
    }
}

/// Access token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// HMAC secret; tokens cannot be issued without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Token lifetime in seconds
    pub ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        TokenConfig {
            secret: None,
            ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Content protection configuration
    pub protection: ProtectionConfig,

    /// Registry configuration
    pub registry: RegistryConfig,

    /// Pinning gateway configuration
    pub gateway: GatewayConfig,

    /// Chain configuration
    pub chain: ChainConfig,

    /// Access token configuration
    pub tokens: TokenConfig,

    /// Log level
    pub log_level: String,

    /// Whether to enable debug mode
    pub debug_mode: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            protection: ProtectionConfig::default(),
            registry: RegistryConfig::default(),
            gateway: GatewayConfig::default(),
            chain: ChainConfig::default(),
            tokens: TokenConfig::default(),
            log_level: "info".to_string(),
            debug_mode: false,
        }
    }
}

impl CoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(file)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Overlay settings from `DATACHAIN_*` environment variables
    pub fn apply_env(mut self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok());
        self
    }

    fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATACHAIN_GATEWAY_JWT") {
            self.gateway.jwt = Some(v);
        }
        if let Some(v) = get("DATACHAIN_GATEWAY_URL") {
            self.gateway.gateway_url = v;
        }
        if let Some(v) = get("DATACHAIN_API_URL") {
            self.gateway.api_url = v;
        }
        if let Some(v) = get("DATACHAIN_CHAIN_NETWORK") {
            self.chain.network = v;
        }
        if let Some(v) = get("DATACHAIN_NODE_URL") {
            self.chain.node_url = v;
        }
        if let Some(v) = get("DATACHAIN_MODULE_ADDRESS") {
            self.chain.module_address = Some(v);
        }
        if let Some(v) = get("DATACHAIN_SERVICE_ACCOUNT") {
            self.chain.service_account = Some(v);
        }
        if let Some(v) = get("DATACHAIN_RELAY_URL") {
            self.chain.relay_url = Some(v);
        }
        if let Some(v) = get("DATACHAIN_TOKEN_SECRET") {
            self.tokens.secret = Some(v);
        }
        if let Some(v) = get("DATACHAIN_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    /// Check the configuration for values the components cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.debug_mode && self.protection.kdf_iterations < MIN_KDF_ITERATIONS {
            return Err(CoreError::Config(format!(
                "kdf_iterations must be at least {} outside debug mode, got {}",
                MIN_KDF_ITERATIONS, self.protection.kdf_iterations
            )));
        }
        if self.protection.kdf_iterations == 0 {
            return Err(CoreError::Config("kdf_iterations must be non-zero".to_string()));
        }
        if self.protection.salt_len == 0 {
            return Err(CoreError::Config("salt_len must be non-zero".to_string()));
        }
        if self.registry.high_trust_threshold > 100 || self.registry.base_trust_score > 100 {
            return Err(CoreError::Config("trust scores are bounded by 100".to_string()));
        }
        check_ttl("tokens.ttl_secs", self.tokens.ttl_secs, MAX_TTL_SECS)?;
        check_ttl(
            "gateway.max_signed_url_ttl_secs",
            self.gateway.max_signed_url_ttl_secs,
            MAX_TTL_SECS,
        )?;
        check_ttl(
            "gateway.default_signed_url_ttl_secs",
            self.gateway.default_signed_url_ttl_secs,
            self.gateway.max_signed_url_ttl_secs,
        )?;
        Ok(())
    }

    /// Create a development configuration
    pub fn development() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config.registry.seed_fixtures = true;
        config
    }

    /// Create a production configuration
    pub fn production() -> Self {
        let mut config = Self::default();
        config.debug_mode = false;
        config.log_level = "info".to_string();
        config.chain.network = "mainnet".to_string();
        config.chain.node_url = "https://fullnode.mainnet.aptoslabs.com/v1".to_string();
        config
    }

    /// Create a testing configuration
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config.protection.kdf_iterations = 1_000;
        config.tokens.secret = Some("test-token-secret".to_string());
        config
    }
}

fn check_ttl(name: &str, value: u64, max: u64) -> Result<()> {
    if value == 0 || value > max {
        return Err(CoreError::Config(format!(
            "{} must be between 1 and {}, got {}",
            name, max, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();

        assert_eq!(config.protection.kdf_iterations, 100_000);
        assert_eq!(config.protection.salt_len, 32);
        assert_eq!(config.registry.high_trust_threshold, 90);
        assert!(!config.registry.seed_fixtures);
        assert!(!config.chain.is_configured());
        assert_eq!(config.tokens.ttl_secs, 86_400);
        assert_eq!(config.log_level, "info");
        assert!(!config.debug_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_development_config() {
        let config = CoreConfig::development();

        assert!(config.debug_mode);
        assert_eq!(config.log_level, "debug");
        assert!(config.registry.seed_fixtures);
    }

    #[test]
    fn test_production_config() {
        let config = CoreConfig::production();

        assert!(!config.debug_mode);
        assert_eq!(config.chain.network, "mainnet");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_config() {
        let config = CoreConfig::testing();

        assert!(config.debug_mode);
        assert_eq!(config.protection.kdf_iterations, 1_000);
        assert!(config.tokens.secret.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_weak_kdf_outside_debug() {
        let mut config = CoreConfig::testing();
        config.debug_mode = false;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let mut config = CoreConfig::default();
        config.protection.salt_len = 0;
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.registry.high_trust_threshold = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_lifetimes() {
        let mut config = CoreConfig::testing();
        config.tokens.ttl_secs = 10_000_000_000_000;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let mut config = CoreConfig::testing();
        config.tokens.ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = CoreConfig::testing();
        config.gateway.max_signed_url_ttl_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = CoreConfig::testing();
        config.gateway.default_signed_url_ttl_secs = config.gateway.max_signed_url_ttl_secs + 1;
        assert!(config.validate().is_err());

        let mut config = CoreConfig::testing();
        config.tokens.ttl_secs = MAX_TTL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_signed_url_ttl_defaults_when_absent() {
        let gateway: GatewayConfig = serde_json::from_str(
            r#"{"api_url":"http://a","gateway_url":"http://g","default_signed_url_ttl_secs":60}"#,
        )
        .unwrap();
        assert_eq!(gateway.max_signed_url_ttl_secs, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DATACHAIN_MODULE_ADDRESS", "0xmodule"),
            ("DATACHAIN_TOKEN_SECRET", "s3cret"),
            ("DATACHAIN_GATEWAY_URL", "https://gw.example"),
            ("DATACHAIN_LOG_LEVEL", "  "),
        ]);

        let mut config = CoreConfig::default();
        config.apply_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.chain.module_address.as_deref(), Some("0xmodule"));
        assert!(config.chain.is_configured());
        assert_eq!(config.tokens.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.gateway.gateway_url, "https://gw.example");
        // Blank values are ignored
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_file_io() {
        let mut config = CoreConfig::default();
        config.chain.module_address = Some("0xabc".to_string());

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        config.to_file(path).unwrap();
        let loaded = CoreConfig::from_file(path).unwrap();

        assert_eq!(loaded.protection.kdf_iterations, config.protection.kdf_iterations);
        assert_eq!(loaded.chain.module_address, config.chain.module_address);
        assert_eq!(loaded.gateway.api_url, config.gateway.api_url);
    }
}
