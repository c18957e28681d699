//! Configuration for the spender relay

use crate::{Error, Result};
use karma_ledger::Address;
use serde::{Deserialize, Serialize};

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Signing domain name
    pub name: String,

    /// Signing domain version
    pub version: String,

    /// Chain the signatures are bound to
    pub chain_id: u64,

    /// Address of this relay, the spender named in permits
    pub address: Address,

    /// Only account allowed to change the ledger reference and beneficiary
    pub admin: Address,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "TrustedSpender".to_string(),
            version: "1".to_string(),
            chain_id: 31337,
            address: Address::new([
                0xe7, 0xf1, 0x72, 0x5e, 0x77, 0x34, 0xce, 0x28, 0x8f, 0x83, 0x67, 0xe1, 0xbb, 0x14,
                0x3e, 0x90, 0xbb, 0x3f, 0x05, 0x12,
            ]),
            admin: Address::ZERO,
        }
    }
}

fn parse_address(var: &str, value: &str) -> Result<Address> {
    Address::from_hex(value).map_err(|e| Error::Config(format!("Invalid {}: {}", var, e)))
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(name) = std::env::var("SPENDER_NAME") {
            config.name = name;
        }

        if let Ok(version) = std::env::var("SPENDER_VERSION") {
            config.version = version;
        }

        if let Ok(chain_id) = std::env::var("SPENDER_CHAIN_ID") {
            config.chain_id = chain_id
                .parse()
                .map_err(|e| Error::Config(format!("Invalid SPENDER_CHAIN_ID: {}", e)))?;
        }

        if let Ok(address) = std::env::var("SPENDER_ADDRESS") {
            config.address = parse_address("SPENDER_ADDRESS", &address)?;
        }

        if let Ok(admin) = std::env::var("SPENDER_ADMIN") {
            config.admin = parse_address("SPENDER_ADMIN", &admin)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.version.is_empty() {
            return Err(Error::Config("name and version must not be empty".to_string()));
        }
        if self.address.is_zero() {
            return Err(Error::Config("relay address must not be zero".to_string()));
        }
        Ok(())
    }
}
