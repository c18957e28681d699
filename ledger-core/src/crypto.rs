//! Cryptographic operations for the ledger
//!
//! This module provides:
//! - Keccak-256 hashing
//! - secp256k1 public-key recovery from `(v, r, s)` signatures
//! - Signer verification over EIP-712 digests
//! - A key pair for producing fixtures and relayer-side signatures

use crate::{
    domain::{DomainSeparator, TypedMessage},
    types::{Address, Hash, Signature},
    Error, Result,
};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use std::fmt;

/// Hash arbitrary bytes using Keccak-256
pub fn keccak256(data: impl AsRef<[u8]>) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    hasher.finalize().into()
}

/// Derive the account address of a public key
///
/// Last 20 bytes of the keccak-256 hash of the uncompressed point, without the `0x04` tag.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = k256::PublicKey::from(key).to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);

    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::new(bytes)
}

/// Recover the signer of a 32-byte digest
///
/// Fails closed with `MalformedSignature` on out-of-range recovery bytes, zero or
/// out-of-range scalars, malleable high-`s` values, and points that do not recover.
pub fn recover(digest: &Hash, signature: &Signature) -> Result<Address> {
    let recovery_byte = signature.recovery_id()?;
    let recovery_id = RecoveryId::from_byte(recovery_byte).ok_or_else(|| {
        Error::MalformedSignature(format!("recovery id {} out of range", recovery_byte))
    })?;

    let mut scalars = [0u8; 64];
    scalars[..32].copy_from_slice(signature.r());
    scalars[32..].copy_from_slice(signature.s());
    let ecdsa = EcdsaSignature::from_slice(&scalars)
        .map_err(|e| Error::MalformedSignature(format!("invalid scalars: {}", e)))?;

    if ecdsa.normalize_s().is_some() {
        return Err(Error::MalformedSignature("s is in the upper half order".to_string()));
    }

    let key = VerifyingKey::recover_from_prehash(digest, &ecdsa, recovery_id)
        .map_err(|e| Error::MalformedSignature(format!("recovery failed: {}", e)))?;

    Ok(address_of(&key))
}

/// Verify that `expected` signed `message` under `domain`
pub fn verify<M: TypedMessage>(
    expected: &Address,
    message: &M,
    domain: &DomainSeparator,
    signature: &Signature,
) -> Result<()> {
    let digest = domain.digest(message);
    let recovered = recover(&digest, signature)?;

    if recovered != *expected {
        tracing::debug!(expected = %expected, recovered = %recovered, "Signer mismatch");
        return Err(Error::BadSignature { signer: *expected });
    }

    Ok(())
}

/// Boolean form of [`verify`]
pub fn verify_signature<M: TypedMessage>(
    expected: &Address,
    message: &M,
    domain: &DomainSeparator,
    signature: &Signature,
) -> bool {
    verify(expected, message, domain, signature).is_ok()
}

/// Replay-registry key for a signature: keccak-256 of `r || s`
pub fn fingerprint(signature: &Signature) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(signature.r());
    hasher.update(signature.s());
    hasher.finalize().into()
}

/// secp256k1 key pair
pub struct KeyPair {
    signing_key: SigningKey,
    address: Address,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Create from a 32-byte secret
    pub fn from_secret(secret: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(secret)
            .map_err(|e| Error::InvalidInput(format!("invalid secret key: {}", e)))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// Account address controlled by this key
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest, producing `v` in `{27, 28}`
    pub fn sign_digest(&self, digest: &Hash) -> Result<Signature> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| Error::InvalidInput(format!("signing failed: {}", e)))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        Ok(Signature::from_vrs(27 + recovery_id.to_byte(), r, s))
    }

    /// Sign a typed message the way `eth_signTypedData_v4` does
    pub fn sign_typed<M: TypedMessage>(
        &self,
        domain: &DomainSeparator,
        message: &M,
    ) -> Result<Signature> {
        self.sign_digest(&domain.digest(message))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair").field("address", &self.address).finish()
    }
}
