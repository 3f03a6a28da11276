use std::{fmt, str::FromStr};

use base58::{FromBase58, ToBase58};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

const PUBLIC_KEY_VERSION: u8 = 0xcb;
const PRIVATE_KEY_VERSION: u8 = 0x5a;
const CHECKSUM_LEN: usize = 4;
const KEY_LEN: usize = 32;

pub const NANOMINA_PER_MINA: u64 = 1_000_000_000;
const NANOMINA_DIGITS: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid base58 encoding: {0}")]
    Base58(String),
    #[error("checksum mismatch")]
    Checksum,
    #[error("unexpected version byte {found:#04x}, expected {expected:#04x}")]
    Version { expected: u8, found: u8 },
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("bytes do not encode a valid public key")]
    InvalidPoint,
    #[error("invalid amount '{0}'")]
    Amount(String),
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

/// Base58check: version byte, body, first four bytes of a double SHA-256.
pub fn encode_base58_check(version: u8, body: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + body.len() + CHECKSUM_LEN);
    payload.push(version);
    payload.extend_from_slice(body);
    let sum = checksum(&payload);
    payload.extend_from_slice(&sum);
    payload.to_base58()
}

fn decode_base58_check(version: u8, encoded: &str) -> Result<[u8; KEY_LEN], DomainError> {
    let raw = encoded
        .trim()
        .from_base58()
        .map_err(|err| DomainError::Base58(format!("{err:?}")))?;

    let expected = 1 + KEY_LEN + CHECKSUM_LEN;
    if raw.len() != expected {
        return Err(DomainError::Length {
            expected,
            actual: raw.len(),
        });
    }

    let (payload, sum) = raw.split_at(1 + KEY_LEN);
    if checksum(payload)[..] != *sum {
        return Err(DomainError::Checksum);
    }
    if payload[0] != version {
        return Err(DomainError::Version {
            expected: version,
            found: payload[0],
        });
    }

    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&payload[1..]);
    Ok(out)
}

/// An account address. Contracts and users share the same address space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Result<Self, DomainError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| DomainError::InvalidPoint)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, DomainError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| DomainError::InvalidPoint)
    }

    pub fn to_base58(&self) -> String {
        encode_base58_check(PUBLIC_KEY_VERSION, &self.0)
    }
}

impl FromStr for PublicKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(decode_base58_check(PUBLIC_KEY_VERSION, s)?)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PublicKey> for String {
    fn from(value: PublicKey) -> Self {
        value.to_base58()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base58())
    }
}

/// Secret key material. Zeroed on drop and redacted from debug output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrivateKey([u8; KEY_LEN]);

impl PrivateKey {
    pub fn random() -> Self {
        let mut seed = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut seed);
        let key = Self(seed);
        seed.zeroize();
        key
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.0)
    }

    pub fn to_public_key(&self) -> PublicKey {
        PublicKey(self.signing_key().verifying_key().to_bytes())
    }

    pub fn to_base58(&self) -> String {
        encode_base58_check(PRIVATE_KEY_VERSION, &self.0)
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl FromStr for PrivateKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58_check(PRIVATE_KEY_VERSION, s).map(Self)
    }
}

impl TryFrom<String> for PrivateKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PrivateKey> for String {
    fn from(value: PrivateKey) -> Self {
        value.to_base58()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(<redacted> for {})", self.to_public_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A MINA amount held in nanomina. Parsed from and displayed as a decimal MINA string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_nanomina(nanomina: u64) -> Self {
        Self(nanomina)
    }

    pub const fn from_mina(mina: u64) -> Self {
        Self(mina.saturating_mul(NANOMINA_PER_MINA))
    }

    pub const fn nanomina(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::Amount(s.to_string());
        let trimmed = s.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if fraction.len() > NANOMINA_DIGITS
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let fraction: u64 = if fraction.is_empty() {
            0
        } else {
            format!("{fraction:0<width$}", width = NANOMINA_DIGITS)
                .parse()
                .map_err(|_| invalid())?
        };

        whole
            .checked_mul(NANOMINA_PER_MINA)
            .and_then(|nano| nano.checked_add(fraction))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / NANOMINA_PER_MINA;
        let fraction = self.0 % NANOMINA_PER_MINA;
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{fraction:0>width$}", width = NANOMINA_DIGITS);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// The contract's numeric state as last observed by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractNumber {
    #[default]
    Unset,
    Known(u64),
}

impl ContractNumber {
    pub const UNSET_SENTINEL: i128 = -1;

    pub fn sentinel(self) -> i128 {
        match self {
            ContractNumber::Unset => Self::UNSET_SENTINEL,
            ContractNumber::Known(value) => i128::from(value),
        }
    }
}

impl fmt::Display for ContractNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractNumber::Unset => f.write_str("unknown"),
            ContractNumber::Known(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_round_trips_through_base58() {
        let key = PrivateKey::random().to_public_key();
        let encoded = key.to_base58();
        assert_eq!(encoded.parse::<PublicKey>().expect("parse"), key);
    }

    #[test]
    fn public_key_rejects_corrupted_checksum() {
        let encoded = PrivateKey::random().to_public_key().to_base58();
        let mut raw = encoded.from_base58().expect("decode");
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let corrupted = raw.to_base58();
        assert_eq!(
            corrupted.parse::<PublicKey>().unwrap_err(),
            DomainError::Checksum
        );
    }

    #[test]
    fn private_key_does_not_parse_as_address() {
        let secret = PrivateKey::random().to_base58();
        assert!(matches!(
            secret.parse::<PublicKey>().unwrap_err(),
            DomainError::Version { .. }
        ));
    }

    #[test]
    fn private_key_debug_output_is_redacted() {
        let secret = PrivateKey::random();
        let debug = format!("{secret:?}");
        assert!(!debug.contains(&secret.to_base58()));
        assert!(debug.contains(&secret.to_public_key().to_base58()));
    }

    #[test]
    fn rejects_garbage_address() {
        assert!(matches!(
            "not-an-address!".parse::<PublicKey>().unwrap_err(),
            DomainError::Base58(_)
        ));
        assert!(matches!(
            "3yZe7d".parse::<PublicKey>().unwrap_err(),
            DomainError::Length { .. }
        ));
    }

    #[test]
    fn parses_decimal_fee() {
        assert_eq!(
            "0.1".parse::<Amount>().expect("fee"),
            Amount::from_nanomina(100_000_000)
        );
        assert_eq!("2".parse::<Amount>().expect("fee"), Amount::from_mina(2));
        assert_eq!(
            ".5".parse::<Amount>().expect("fee"),
            Amount::from_nanomina(500_000_000)
        );
        assert!("0.0000000001".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
    }

    #[test]
    fn displays_amount_without_trailing_zeros() {
        assert_eq!(Amount::from_nanomina(100_000_000).to_string(), "0.1");
        assert_eq!(Amount::from_mina(3).to_string(), "3");
        assert_eq!(Amount::from_nanomina(1_000_000_001).to_string(), "1.000000001");
    }

    #[test]
    fn unset_number_uses_negative_sentinel() {
        assert_eq!(ContractNumber::default().sentinel(), -1);
        assert_eq!(ContractNumber::Known(3).sentinel(), 3);
        assert_eq!(ContractNumber::Unset.to_string(), "unknown");
    }
}
