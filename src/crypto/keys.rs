//! secp256k1 key material and signatures.
//!
//! Private keys are held in `Zeroizing` buffers so decrypted scalar bytes are
//! overwritten when dropped. Cleartext key material never leaves this module
//! except through the WIF export path, which the vault gates behind its lock
//! state.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use rand::RngCore;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, Secp256k1, SecretKey};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use crate::core::errors::WalletError;

/// Prefix for the human-readable public key encoding.
pub const PUBLIC_KEY_PREFIX: &str = "QRM";

/// WIF version byte (Bitcoin-compatible private key encoding).
const WIF_VERSION: u8 = 0x80;

static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Compressed secp256k1 public key (33 bytes).
///
/// Rendered as `QRM` + base58(key bytes + 4-byte SHA-256 checksum) in
/// human-readable formats and as raw bytes in binary formats.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(pub(crate) [u8; 33]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self, WalletError> {
        secp256k1::PublicKey::from_slice(&bytes)
            .map_err(|e| WalletError::Crypto(format!("invalid public key: {e}")))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    fn checksum(bytes: &[u8; 33]) -> [u8; 4] {
        let digest = Sha256::digest(bytes);
        let mut check = [0u8; 4];
        check.copy_from_slice(&digest[..4]);
        check
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = [0u8; 37];
        payload[..33].copy_from_slice(&self.0);
        payload[33..].copy_from_slice(&Self::checksum(&self.0));
        write!(f, "{}{}", PUBLIC_KEY_PREFIX, bs58::encode(payload).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for PublicKey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix(PUBLIC_KEY_PREFIX)
            .ok_or_else(|| WalletError::Crypto(format!("public key missing {PUBLIC_KEY_PREFIX} prefix")))?;
        let payload = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| WalletError::Crypto(format!("invalid public key encoding: {e}")))?;
        if payload.len() != 37 {
            return Err(WalletError::Crypto("invalid public key length".into()));
        }
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&payload[..33]);
        if payload[33..] != Self::checksum(&bytes) {
            return Err(WalletError::Crypto("public key checksum mismatch".into()));
        }
        Self::from_bytes(bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(D::Error::custom)
        } else {
            let bytes: Vec<u8> = serde_bytes_vec(deserializer)?;
            let arr: [u8; 33] = bytes
                .try_into()
                .map_err(|_| D::Error::custom("expected 33 byte public key"))?;
            PublicKey::from_bytes(arr).map_err(D::Error::custom)
        }
    }
}

/// secp256k1 private scalar, zeroized on drop.
#[derive(Clone)]
pub struct PrivateKey(Zeroizing<[u8; 32]>);

impl PrivateKey {
    /// Builds a key from raw scalar bytes, rejecting zero and out-of-order
    /// scalars.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, WalletError> {
        SecretKey::from_slice(&bytes)
            .map_err(|e| WalletError::Crypto(format!("invalid private key: {e}")))?;
        Ok(Self(Zeroizing::new(bytes)))
    }

    /// Generates a fresh key from OS randomness.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        loop {
            let mut bytes = Zeroizing::new([0u8; 32]);
            rng.fill_bytes(&mut bytes[..]);
            if SecretKey::from_slice(&bytes[..]).is_ok() {
                return Self(bytes);
            }
        }
    }

    /// Derives a key by hashing arbitrary seed bytes onto the curve. The
    /// digest is re-hashed until it lands on a valid scalar, which in
    /// practice never takes a second round.
    pub fn from_seed_digest(digest: [u8; 32]) -> Self {
        let mut candidate = digest;
        loop {
            if SecretKey::from_slice(&candidate).is_ok() {
                return Self(Zeroizing::new(candidate));
            }
            candidate = Sha256::digest(candidate).into();
        }
    }

    pub fn public_key(&self) -> PublicKey {
        let sk = SecretKey::from_slice(&self.0[..]).expect("validated on construction");
        PublicKey(sk.public_key(&SECP).serialize())
    }

    /// Imports a base58check (WIF) private key.
    pub fn from_wif(wif: &str) -> Result<Self, WalletError> {
        let payload = bs58::decode(wif)
            .with_check(Some(WIF_VERSION))
            .into_vec()
            .map_err(|e| WalletError::Crypto(format!("invalid WIF key: {e}")))?;
        if payload.len() != 33 {
            return Err(WalletError::Crypto("invalid WIF payload length".into()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&payload[1..]);
        Self::from_bytes(bytes)
    }

    /// Exports the key as base58check (WIF).
    pub fn to_wif(&self) -> String {
        let mut payload = Zeroizing::new([0u8; 33]);
        payload[0] = WIF_VERSION;
        payload[1..].copy_from_slice(&self.0[..]);
        bs58::encode(&payload[..]).with_check().into_string()
    }

    /// Signs a 32-byte digest, producing a compact recoverable signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> CompactSignature {
        let sk = SecretKey::from_slice(&self.0[..]).expect("validated on construction");
        let msg = Message::from_slice(digest).expect("digest is 32 bytes");
        let sig = SECP.sign_ecdsa_recoverable(&msg, &sk);
        CompactSignature::from_recoverable(&sig)
    }

    /// ECDH shared secret: SHA-512 of the x-coordinate of the scalar-point
    /// product. Both ends of a memo derive the same value.
    pub fn shared_secret(&self, other: &PublicKey) -> Result<Zeroizing<[u8; 64]>, WalletError> {
        let sk = SecretKey::from_slice(&self.0[..]).expect("validated on construction");
        let pk = secp256k1::PublicKey::from_slice(&other.0)
            .map_err(|e| WalletError::Crypto(format!("invalid public key: {e}")))?;
        let point = secp256k1::ecdh::shared_secret_point(&pk, &sk);
        let digest = Sha512::digest(&point[..32]);
        let mut out = Zeroizing::new([0u8; 64]);
        out.copy_from_slice(&digest[..]);
        Ok(out)
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print scalar bytes.
        write!(f, "PrivateKey(for {})", self.public_key())
    }
}

/// Compact recoverable ECDSA signature: recovery byte followed by r and s.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompactSignature(pub(crate) [u8; 65]);

impl CompactSignature {
    fn from_recoverable(sig: &RecoverableSignature) -> Self {
        let (recid, data) = sig.serialize_compact();
        let mut bytes = [0u8; 65];
        // 27 marks a compact signature, 4 marks a compressed public key.
        bytes[0] = 27 + 4 + recid.to_i32() as u8;
        bytes[1..].copy_from_slice(&data);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Recovers the signing public key from the digest.
    pub fn recover(&self, digest: &[u8; 32]) -> Result<PublicKey, WalletError> {
        let recid = RecoveryId::from_i32(i32::from(self.0[0]) - 27 - 4)
            .map_err(|e| WalletError::Crypto(format!("invalid recovery id: {e}")))?;
        let sig = RecoverableSignature::from_compact(&self.0[1..], recid)
            .map_err(|e| WalletError::Crypto(format!("invalid signature: {e}")))?;
        let msg = Message::from_slice(digest).expect("digest is 32 bytes");
        let pk = SECP
            .recover_ecdsa(&msg, &sig)
            .map_err(|e| WalletError::Crypto(format!("signature recovery failed: {e}")))?;
        Ok(PublicKey(pk.serialize()))
    }
}

impl fmt::Debug for CompactSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompactSignature({})", hex::encode(self.0))
    }
}

impl Serialize for CompactSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for CompactSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s).map_err(D::Error::custom)?
        } else {
            serde_bytes_vec(deserializer)?
        };
        let arr: [u8; 65] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected 65 byte signature"))?;
        Ok(CompactSignature(arr))
    }
}

/// Deserializes a binary byte string without pulling in a dedicated bytes
/// crate; postcard encodes `serialize_bytes` as length-prefixed raw bytes.
fn serde_bytes_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    struct BytesVisitor;

    impl<'de> serde::de::Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a byte string")
        }

        fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(b) = seq.next_element::<u8>()? {
                out.push(b);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_byte_buf(BytesVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wif_round_trip() {
        let key = PrivateKey::generate();
        let wif = key.to_wif();
        let restored = PrivateKey::from_wif(&wif).unwrap();
        assert_eq!(key, restored);
        assert_eq!(key.public_key(), restored.public_key());
    }

    #[test]
    fn wif_rejects_tampering() {
        let key = PrivateKey::generate();
        let mut wif = key.to_wif();
        // Flip a character in the middle of the encoding.
        let replacement = if wif.as_bytes()[10] == b'2' { '3' } else { '2' };
        wif.replace_range(10..11, &replacement.to_string());
        assert!(PrivateKey::from_wif(&wif).is_err());
    }

    #[test]
    fn public_key_string_round_trip() {
        let key = PrivateKey::generate().public_key();
        let s = key.to_string();
        assert!(s.starts_with(PUBLIC_KEY_PREFIX));
        let parsed: PublicKey = s.parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn public_key_string_rejects_bad_checksum() {
        let key = PrivateKey::generate().public_key();
        let mut s = key.to_string();
        let tail = s.pop().unwrap();
        s.push(if tail == 'a' { 'b' } else { 'a' });
        assert!(s.parse::<PublicKey>().is_err());
    }

    #[test]
    fn signature_recovers_signer() {
        let key = PrivateKey::generate();
        let digest = Sha256::digest(b"payload").into();
        let sig = key.sign_digest(&digest);
        assert_eq!(sig.recover(&digest).unwrap(), key.public_key());
    }

    #[test]
    fn shared_secret_is_symmetric() {
        let alice = PrivateKey::generate();
        let bob = PrivateKey::generate();
        let ab = alice.shared_secret(&bob.public_key()).unwrap();
        let ba = bob.shared_secret(&alice.public_key()).unwrap();
        assert_eq!(*ab, *ba);
    }

    #[test]
    fn seed_digest_is_deterministic() {
        let digest: [u8; 32] = Sha256::digest(b"seed material").into();
        let a = PrivateKey::from_seed_digest(digest);
        let b = PrivateKey::from_seed_digest(digest);
        assert_eq!(a, b);
    }
}
