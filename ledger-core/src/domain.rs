//! EIP-712 signing domain and message schemas
//!
//! Every signature accepted by the ledger is made over
//! `keccak256(0x19 0x01 || domainSeparator || hashStruct(message))`, exactly as
//! `eth_signTypedData_v4` computes it, so wallets and off-line signing tools
//! produce signatures that verify unmodified.
//!
//! ```text
//! EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)
//! Transfer(address from,address to,uint256 amount,uint256 fee,uint256 nonce,uint256 deadline)
//! SetCycleReward(address owner,uint256 amount,uint256 nonce,uint256 deadline)
//! Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)
//! ```

use crate::crypto::keccak256;
use crate::types::{Address, Amount, Hash, Nonce, Timestamp};
use serde::{Deserialize, Serialize};

/// Type string of the domain struct
pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// A struct with a fixed EIP-712 schema
pub trait TypedMessage {
    /// `encodeType` of the struct, referenced struct types appended in name order
    const TYPE_STRING: &'static str;

    /// `encodeData`: every member as one 32-byte word, in schema order
    fn encode_data(&self) -> Vec<u8>;

    /// `typeHash`
    fn type_hash() -> Hash
    where
        Self: Sized,
    {
        keccak256(Self::TYPE_STRING)
    }

    /// `hashStruct`
    fn struct_hash(&self) -> Hash
    where
        Self: Sized,
    {
        let mut buf = Self::type_hash().to_vec();
        buf.extend_from_slice(&self.encode_data());
        keccak256(buf)
    }
}

/// Word-by-word `encodeData` writer
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    /// Create new encoder
    pub fn new() -> Self {
        Self { buffer: Vec::with_capacity(32 * 6) }
    }

    /// `address`: left-padded to 32 bytes
    pub fn address(mut self, address: &Address) -> Self {
        self.buffer.extend_from_slice(&[0u8; 12]);
        self.buffer.extend_from_slice(address.as_bytes());
        self
    }

    /// `uint256`: big-endian, left-padded
    pub fn uint(mut self, value: u128) -> Self {
        self.buffer.extend_from_slice(&[0u8; 16]);
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// `string`: keccak-256 of the UTF-8 bytes
    pub fn string(mut self, value: &str) -> Self {
        self.buffer.extend_from_slice(&keccak256(value.as_bytes()));
        self
    }

    /// `bytes32` or a nested struct hash
    pub fn word(mut self, word: &Hash) -> Self {
        self.buffer.extend_from_slice(word);
        self
    }

    /// Finish encoding
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Signing domain of one ledger (or relay) instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSeparator {
    name: String,
    version: String,
    chain_id: u64,
    verifying_contract: Address,
    hash: Hash,
}

impl DomainSeparator {
    /// Create and hash a domain
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        let name = name.into();
        let version = version.into();

        let mut buf = keccak256(EIP712_DOMAIN_TYPE).to_vec();
        buf.extend_from_slice(
            &Encoder::new()
                .string(&name)
                .string(&version)
                .uint(chain_id as u128)
                .address(&verifying_contract)
                .finish(),
        );
        let hash = keccak256(buf);

        Self {
            name,
            version,
            chain_id,
            verifying_contract,
            hash,
        }
    }

    /// Domain name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Domain version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Chain identifier
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Address of the instance signatures are bound to
    pub fn verifying_contract(&self) -> Address {
        self.verifying_contract
    }

    /// `hashStruct(domain)`
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Digest a signer signs for `message` under this domain
    pub fn digest<M: TypedMessage>(&self, message: &M) -> Hash {
        let mut buf = Vec::with_capacity(66);
        buf.extend_from_slice(&[0x19, 0x01]);
        buf.extend_from_slice(&self.hash);
        buf.extend_from_slice(&message.struct_hash());
        keccak256(buf)
    }
}

/// Signed transfer instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Issuer, and the required signer
    pub from: Address,
    /// Creditor
    pub to: Address,
    /// Amount issued to `to`
    pub amount: Amount,
    /// Amount issued to the relayer
    pub fee: Amount,
    /// Signer's nonce in the verifying instance's nonce space
    pub nonce: Nonce,
    /// Last valid ledger time
    pub deadline: Timestamp,
}

impl TypedMessage for Transfer {
    const TYPE_STRING: &'static str = "Transfer(address from,address to,uint256 amount,uint256 fee,uint256 nonce,uint256 deadline)";

    fn encode_data(&self) -> Vec<u8> {
        Encoder::new()
            .address(&self.from)
            .address(&self.to)
            .uint(self.amount)
            .uint(self.fee)
            .uint(self.nonce as u128)
            .uint(self.deadline as u128)
            .finish()
    }
}

/// Signed cycle-reward update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCycleReward {
    /// Account whose reward changes
    pub owner: Address,
    /// New reward
    pub amount: Amount,
    /// Owner's ledger nonce
    pub nonce: Nonce,
    /// Last valid ledger time
    pub deadline: Timestamp,
}

impl TypedMessage for SetCycleReward {
    const TYPE_STRING: &'static str =
        "SetCycleReward(address owner,uint256 amount,uint256 nonce,uint256 deadline)";

    fn encode_data(&self) -> Vec<u8> {
        Encoder::new()
            .address(&self.owner)
            .uint(self.amount)
            .uint(self.nonce as u128)
            .uint(self.deadline as u128)
            .finish()
    }
}

/// Signed allowance grant (EIP-2612 layout)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit {
    /// Granting account
    pub owner: Address,
    /// Account allowed to spend
    pub spender: Address,
    /// New ceiling (replaces the previous one)
    pub value: Amount,
    /// Owner's ledger nonce
    pub nonce: Nonce,
    /// Last valid ledger time
    pub deadline: Timestamp,
}

impl TypedMessage for Permit {
    const TYPE_STRING: &'static str =
        "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

    fn encode_data(&self) -> Vec<u8> {
        Encoder::new()
            .address(&self.owner)
            .address(&self.spender)
            .uint(self.value)
            .uint(self.nonce as u128)
            .uint(self.deadline as u128)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_hashes_match_solidity() {
        // keccak256 of the canonical type strings, as computed by solc
        assert_eq!(
            hex::encode(keccak256(EIP712_DOMAIN_TYPE)),
            "8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f"
        );
        assert_eq!(
            hex::encode(Permit::type_hash()),
            "6e71edae12b1b97f4d1f60370fef10105fa2faae0126114a169c64845d6126c9"
        );
    }

    #[test]
    fn test_encoder_word_layout() {
        let address = Address::new([0xaa; 20]);
        let encoded = Encoder::new().address(&address).uint(258).finish();

        assert_eq!(encoded.len(), 64);
        assert_eq!(&encoded[..12], &[0u8; 12]);
        assert_eq!(&encoded[12..32], address.as_bytes());
        assert_eq!(&encoded[32..62], &[0u8; 30]);
        assert_eq!(&encoded[62..], &[1, 2]);
    }

    #[test]
    fn test_domain_binds_every_field() {
        let contract = Address::new([0x11; 20]);
        let base = DomainSeparator::new("KarmaUSD", "1", 31337, contract);

        assert_ne!(base.hash(), DomainSeparator::new("TrustedSpender", "1", 31337, contract).hash());
        assert_ne!(base.hash(), DomainSeparator::new("KarmaUSD", "2", 31337, contract).hash());
        assert_ne!(base.hash(), DomainSeparator::new("KarmaUSD", "1", 1, contract).hash());
        assert_ne!(
            base.hash(),
            DomainSeparator::new("KarmaUSD", "1", 31337, Address::new([0x12; 20])).hash()
        );
    }

    #[test]
    fn test_schemas_are_distinct() {
        let owner = Address::new([1; 20]);
        let reward = SetCycleReward {
            owner,
            amount: 1,
            nonce: 0,
            deadline: 10,
        };
        let permit = Permit {
            owner,
            spender: Address::ZERO,
            value: 1,
            nonce: 0,
            deadline: 10,
        };
        assert_ne!(reward.struct_hash(), permit.struct_hash());
        assert_eq!(reward.encode_data().len(), 4 * 32);
        assert_eq!(permit.encode_data().len(), 5 * 32);
    }
}
