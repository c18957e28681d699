//! Configuration for the ledger

use crate::types::Address;
use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Token name, also the signing domain name
    pub name: String,

    /// Token symbol
    pub symbol: String,

    /// Display decimals
    pub decimals: u8,

    /// Signing domain version
    pub version: String,

    /// Chain the signatures are bound to
    pub chain_id: u64,

    /// Address of this ledger instance (the domain's verifying contract)
    pub address: Address,

    /// Netting configuration
    pub netting: NettingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "KarmaUSD".to_string(),
            symbol: "kUSD".to_string(),
            decimals: 18,
            version: "1".to_string(),
            chain_id: 31337,
            address: Address::new([
                0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f,
                0x64, 0x2f, 0x64, 0x18, 0x0a, 0xa3,
            ]),
            netting: NettingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Netting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NettingConfig {
    /// Longest cycle accepted by one `mine_cycle` call
    pub max_cycle_length: usize,

    /// Also take the netted amount off each participant's balance
    pub reduce_balances: bool,
}

impl Default for NettingConfig {
    fn default() -> Self {
        Self {
            max_cycle_length: 64,
            reduce_balances: false,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prefix of every metric name
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: "karma_ledger".to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(name) = std::env::var("KARMA_NAME") {
            config.name = name;
        }

        if let Ok(version) = std::env::var("KARMA_VERSION") {
            config.version = version;
        }

        if let Ok(chain_id) = std::env::var("KARMA_CHAIN_ID") {
            config.chain_id = chain_id
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid KARMA_CHAIN_ID: {}", e)))?;
        }

        if let Ok(address) = std::env::var("KARMA_ADDRESS") {
            config.address = Address::from_hex(&address)
                .map_err(|e| crate::Error::Config(format!("Invalid KARMA_ADDRESS: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot form a usable signing domain
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::Error::Config("name must not be empty".to_string()));
        }
        if self.version.is_empty() {
            return Err(crate::Error::Config("version must not be empty".to_string()));
        }
        if self.netting.max_cycle_length < 2 {
            return Err(crate::Error::Config(
                "netting.max_cycle_length must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.name, "KarmaUSD");
        assert_eq!(config.version, "1");
        assert_eq!(config.chain_id, 31337);
        assert_eq!(
            config.address.to_hex(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file_partial_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
chain_id = 1
address = "0x00000000000000000000000000000000000000AA"

[netting]
max_cycle_length = 8
reduce_balances = true
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.chain_id, 1);
        assert_eq!(config.address.as_bytes()[19], 0xaa);
        assert_eq!(config.netting.max_cycle_length, 8);
        assert!(config.netting.reduce_balances);
        assert_eq!(config.name, "KarmaUSD");
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"\"").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(crate::Error::Config(_))
        ));
    }
}
