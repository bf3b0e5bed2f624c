//! Confidential memo encryption.
//!
//! Privacy is opt-in: only text starting with the `#` sentinel is encrypted,
//! and everything else passes through untouched. Encryption derives an ECDH
//! shared secret between the sender's memo private key and the recipient's
//! memo public key, mixes in a monotonically increasing nonce, and carries a
//! 32-bit checksum so decryption can tell "not for me" apart from garbage.
//!
//! Decoding is strictly best-effort: every failure path returns the original
//! text unchanged, so history rendering never breaks on foreign or tampered
//! envelopes.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use chrono::Utc;
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::errors::WalletError;
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::vault::KeyVault;

/// Leading character marking text as confidential.
pub const MEMO_SENTINEL: char = '#';

/// Packed envelope layout: from ‖ to ‖ nonce ‖ check, then the ciphertext.
const ENVELOPE_HEADER_LEN: usize = 33 + 33 + 8 + 4;

static LAST_NONCE: AtomicU64 = AtomicU64::new(0);

/// Strictly increasing nonce seeded from the microsecond clock. Uniqueness
/// matters (it feeds the AEAD nonce); wall-clock accuracy does not.
fn next_nonce() -> u64 {
    let now = Utc::now().timestamp_micros().max(0) as u64;
    loop {
        let last = LAST_NONCE.load(Ordering::SeqCst);
        let candidate = now.max(last + 1);
        if LAST_NONCE
            .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return candidate;
        }
    }
}

/// Wire form of an encrypted memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoEnvelope {
    pub from: PublicKey,
    pub to: PublicKey,
    pub nonce: u64,
    pub check: u32,
    pub encrypted: Vec<u8>,
}

impl fmt::Display for MemoEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut packed = Vec::with_capacity(ENVELOPE_HEADER_LEN + self.encrypted.len());
        packed.extend_from_slice(self.from.as_bytes());
        packed.extend_from_slice(self.to.as_bytes());
        packed.extend_from_slice(&self.nonce.to_le_bytes());
        packed.extend_from_slice(&self.check.to_le_bytes());
        packed.extend_from_slice(&self.encrypted);
        write!(f, "{}{}", MEMO_SENTINEL, bs58::encode(packed).into_string())
    }
}

impl FromStr for MemoEnvelope {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(MEMO_SENTINEL)
            .ok_or_else(|| WalletError::Validation("memo envelope missing sentinel".into()))?;
        let packed = bs58::decode(body)
            .into_vec()
            .map_err(|e| WalletError::Validation(format!("memo envelope encoding: {e}")))?;
        if packed.len() < ENVELOPE_HEADER_LEN {
            return Err(WalletError::Validation("memo envelope truncated".into()));
        }
        let mut from = [0u8; 33];
        let mut to = [0u8; 33];
        from.copy_from_slice(&packed[..33]);
        to.copy_from_slice(&packed[33..66]);
        let nonce = u64::from_le_bytes(packed[66..74].try_into().expect("8 bytes"));
        let check = u32::from_le_bytes(packed[74..78].try_into().expect("4 bytes"));
        Ok(Self {
            from: PublicKey::from_bytes(from)?,
            to: PublicKey::from_bytes(to)?,
            nonce,
            check,
            encrypted: packed[ENVELOPE_HEADER_LEN..].to_vec(),
        })
    }
}

/// Symmetric key for one envelope: SHA-512 over the packed nonce and the
/// shared secret. The first 32 bytes key the cipher, the next 12 are the
/// AEAD nonce.
fn envelope_key(
    local: &PrivateKey,
    remote: &PublicKey,
    nonce: u64,
) -> Result<Zeroizing<[u8; 64]>, WalletError> {
    let shared = local.shared_secret(remote)?;
    let mut hasher = Sha512::new();
    hasher.update(nonce.to_le_bytes());
    hasher.update(&shared[..]);
    let mut key = Zeroizing::new([0u8; 64]);
    let digest = hasher.finalize();
    key.copy_from_slice(&digest[..]);
    Ok(key)
}

fn envelope_check(key: &[u8; 64]) -> u32 {
    let digest = Sha256::digest(key);
    u32::from_le_bytes(digest[..4].try_into().expect("4 bytes"))
}

/// Encrypts `memo` from the sender's memo key to the recipient's memo key.
///
/// Text without the sentinel is returned unchanged. The sender's memo
/// private key must be available in the unlocked vault.
pub fn encrypt_memo(
    vault: &KeyVault,
    from: &PublicKey,
    to: &PublicKey,
    memo: &str,
) -> Result<String, WalletError> {
    let Some(plaintext) = memo.strip_prefix(MEMO_SENTINEL) else {
        return Ok(memo.to_string());
    };

    let from_key = vault.private_key(from)?;
    let nonce = next_nonce();
    let key = envelope_key(from_key, to, nonce)?;

    let cipher = Aes256Gcm::new_from_slice(&key[..32])
        .map_err(|e| WalletError::Crypto(format!("cipher init failed: {e}")))?;
    let encrypted = cipher
        .encrypt(Nonce::from_slice(&key[32..44]), plaintext.as_bytes())
        .map_err(|_| WalletError::Crypto("memo encryption failed".into()))?;

    let envelope =
        MemoEnvelope { from: *from, to: *to, nonce, check: envelope_check(&key), encrypted };
    Ok(envelope.to_string())
}

/// Decrypts an encrypted memo if one of the two memo keys is in the vault.
///
/// Never fails: unknown keys, a locked vault, malformed envelopes, checksum
/// mismatches, and cipher failures all yield the input unchanged.
pub fn decrypt_memo(vault: &KeyVault, memo: &str) -> String {
    if !memo.starts_with(MEMO_SENTINEL) {
        return memo.to_string();
    }
    let Ok(envelope) = memo.parse::<MemoEnvelope>() else {
        return memo.to_string();
    };

    // Prefer the sender's key, fall back to the recipient's.
    let key = if let Some(from_key) = vault.try_private_key(&envelope.from) {
        envelope_key(from_key, &envelope.to, envelope.nonce)
    } else if let Some(to_key) = vault.try_private_key(&envelope.to) {
        envelope_key(to_key, &envelope.from, envelope.nonce)
    } else {
        return memo.to_string();
    };
    let Ok(key) = key else {
        return memo.to_string();
    };

    if envelope_check(&key) != envelope.check {
        debug!("memo checksum mismatch, leaving envelope untouched");
        return memo.to_string();
    }

    let Ok(cipher) = Aes256Gcm::new_from_slice(&key[..32]) else {
        return memo.to_string();
    };
    match cipher.decrypt(Nonce::from_slice(&key[32..44]), envelope.encrypted.as_slice()) {
        Ok(plaintext) => String::from_utf8(plaintext).unwrap_or_else(|_| memo.to_string()),
        Err(_) => memo.to_string(),
    }
}
