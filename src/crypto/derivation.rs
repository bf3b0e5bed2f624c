//! Deterministic sequential key derivation and brain-key generation.

use bip39::Language;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use crate::core::errors::WalletError;
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::vault::KeyVault;

/// Number of words drawn for a suggested brain key.
pub const BRAIN_KEY_WORD_COUNT: usize = 16;

/// How many consecutive unused child indices confirm the end of the used
/// range. Historical constant, kept for behavioral compatibility with
/// existing wallets; a scan terminates once a run exceeds it.
pub const KEY_GAP_TOLERANCE: u32 = 5;

/// A freshly suggested brain key with its first derived keypair.
#[derive(Debug, Clone)]
pub struct BrainKeyInfo {
    pub brain_key: String,
    pub wif_private_key: String,
    pub public_key: PublicKey,
}

/// Derives a child private key from a seed string and a sequence number.
///
/// Pure function of its inputs: SHA-256 of the SHA-512 of `"{seed} {index}"`,
/// mapped onto the curve.
pub fn derive_private_key(seed: &str, index: u32) -> PrivateKey {
    let material = Zeroizing::new(format!("{seed} {index}"));
    let wide = Sha512::digest(material.as_bytes());
    PrivateKey::from_seed_digest(Sha256::digest(wide).into())
}

/// Recovers the keypair a login scheme assigns to `account`/`role` under
/// `password`.
pub fn private_key_from_password(account: &str, role: &str, password: &str) -> PrivateKey {
    let seed = Zeroizing::new(format!("{account}{role}{password}"));
    PrivateKey::from_seed_digest(Sha256::digest(seed.as_bytes()).into())
}

/// Scans child indices of `parent` for the first index not present in the
/// vault.
///
/// The scan keeps probing until it has seen more than [`KEY_GAP_TOLERANCE`]
/// consecutive unused indices, so a short gap caused by a failed
/// registration does not end the search early; a used key found later
/// resets the confirmation run. Returns the earliest unused index observed.
pub fn find_first_unused(vault: &KeyVault, parent: &PrivateKey) -> Result<u32, WalletError> {
    if vault.is_locked() {
        return Err(WalletError::Auth("vault must be unlocked to scan derived keys".into()));
    }
    let seed = Zeroizing::new(parent.to_wif());
    let mut first_unused: Option<u32> = None;
    let mut consecutive_unused = 0u32;
    for index in 0u32.. {
        let derived = derive_private_key(&seed, index);
        if vault.contains(&derived.public_key()) {
            consecutive_unused = 0;
        } else {
            let first = *first_unused.get_or_insert(index);
            consecutive_unused += 1;
            if consecutive_unused > KEY_GAP_TOLERANCE {
                return Ok(first);
            }
        }
    }
    unreachable!("scan terminates within gap tolerance of the last used index")
}

/// Canonical form of a brain key: ASCII letters upper-cased, whitespace runs
/// collapsed to single interior spaces, no leading or trailing whitespace.
pub fn normalize_brain_key(phrase: &str) -> String {
    let mut result = String::with_capacity(phrase.len());
    let mut pending_space = false;
    for c in phrase.chars() {
        if c.is_whitespace() {
            pending_space = !result.is_empty();
        } else {
            if pending_space {
                result.push(' ');
                pending_space = false;
            }
            result.push(c.to_ascii_uppercase());
        }
    }
    result
}

/// Suggests a fresh brain key from two independent 256-bit entropy draws.
///
/// The draws are concatenated into one large integer and reduced word by
/// word modulo the dictionary size, dividing the remainder out after each
/// selection. The normalized phrase is what the seed derivation hashes.
pub fn suggest_brain_key() -> BrainKeyInfo {
    let mut entropy = Zeroizing::new([0u8; 64]);
    rand::rngs::OsRng.fill_bytes(&mut entropy[..32]);
    rand::rngs::OsRng.fill_bytes(&mut entropy[32..]);

    let dictionary = Language::English.word_list();
    let mut words = Vec::with_capacity(BRAIN_KEY_WORD_COUNT);
    for _ in 0..BRAIN_KEY_WORD_COUNT {
        words.push(dictionary[next_word_index(&mut entropy)]);
    }

    let brain_key = normalize_brain_key(&words.join(" "));
    let private_key = derive_private_key(&brain_key, 0);
    BrainKeyInfo {
        wif_private_key: private_key.to_wif(),
        public_key: private_key.public_key(),
        brain_key,
    }
}

/// Takes `entropy % dictionary_size` and divides the remaining integer down.
/// The dictionary holds 2048 words, so one selection consumes eleven bits of
/// the little-endian integer.
fn next_word_index(entropy: &mut [u8; 64]) -> usize {
    let index = (usize::from(entropy[0]) | (usize::from(entropy[1]) << 8)) & 0x07ff;

    // Divide by 2048: drop a whole byte, then three more bits.
    for i in 0..63 {
        entropy[i] = entropy[i + 1];
    }
    entropy[63] = 0;
    let mut carry = 0u8;
    for byte in entropy.iter_mut().rev() {
        let value = *byte;
        *byte = (value >> 3) | (carry << 5);
        carry = value & 0x07;
    }

    index
}
