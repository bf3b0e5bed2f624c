//! Encrypted-at-rest private key store with a locked/unlocked state machine.
//!
//! Plaintext keys exist only in memory while the vault is unlocked; the
//! persisted form is always the AES-256-GCM blob produced at the
//! serialization boundary. Locking re-encrypts, drops the plaintext map
//! (zeroizing each scalar), and swaps the password checksum for the zero
//! sentinel. A failed unlock leaves the vault untouched.

use std::collections::{BTreeSet, HashMap};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::errors::WalletError;
use crate::crypto::keys::{PrivateKey, PublicKey};

/// Sentinel checksum held while locked; a real checksum is SHA-512 of the
/// password and never all zeroes.
const LOCKED_SENTINEL: [u8; 64] = [0u8; 64];

const BLOB_SALT_LEN: usize = 32;
const BLOB_NONCE_LEN: usize = 12;
const HKDF_INFO: &[u8] = b"vault-cipher-key-v1";

/// Decrypted vault payload; exists transiently at the serialization
/// boundary.
#[derive(Serialize, Deserialize)]
struct PlainKeys {
    checksum: Vec<u8>,
    keys: Vec<(PublicKey, String)>,
}

type LockObserver = Box<dyn Fn(bool) + Send + Sync>;

/// Private key store owned by one wallet session.
pub struct KeyVault {
    keys: HashMap<PublicKey, PrivateKey>,
    checksum: Zeroizing<[u8; 64]>,
    cipher_keys: Vec<u8>,
    observers: Vec<LockObserver>,
}

impl KeyVault {
    /// An empty vault with no password set.
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            checksum: Zeroizing::new(LOCKED_SENTINEL),
            cipher_keys: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Rebuilds a locked vault around a persisted cipher blob.
    pub fn from_cipher_blob(cipher_keys: Vec<u8>) -> Self {
        Self {
            keys: HashMap::new(),
            checksum: Zeroizing::new(LOCKED_SENTINEL),
            cipher_keys,
            observers: Vec::new(),
        }
    }

    /// The encrypted blob for persistence. Callers re-encrypt via [`lock`]
    /// or [`Self::encrypt_keys`] before saving an unlocked vault.
    pub fn cipher_blob(&self) -> &[u8] {
        &self.cipher_keys
    }

    pub fn is_locked(&self) -> bool {
        *self.checksum == LOCKED_SENTINEL
    }

    /// True until a password has ever been set on this vault.
    pub fn is_new(&self) -> bool {
        self.cipher_keys.is_empty() && self.keys.is_empty() && self.is_locked()
    }

    /// Registers a callback invoked with the new state on every lock/unlock
    /// transition (`true` = locked).
    pub fn on_lock_change(&mut self, observer: impl Fn(bool) + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&self, locked: bool) {
        for observer in &self.observers {
            observer(locked);
        }
    }

    fn derive_blob_key(checksum: &[u8; 64], salt: &[u8]) -> Zeroizing<[u8; 32]> {
        let hk = Hkdf::<Sha256>::new(Some(salt), checksum);
        let mut okm = Zeroizing::new([0u8; 32]);
        hk.expand(HKDF_INFO, &mut okm[..]).expect("fixed-length HKDF output");
        okm
    }

    /// Re-encrypts the in-memory keys into the cipher blob. Only touches the
    /// blob; the plaintext map stays in place until [`lock`] clears it.
    pub fn encrypt_keys(&mut self) -> Result<(), WalletError> {
        if self.is_locked() {
            return Ok(());
        }
        let plain = PlainKeys {
            checksum: self.checksum.to_vec(),
            keys: self.keys.iter().map(|(pk, sk)| (*pk, sk.to_wif())).collect(),
        };
        let packed = Zeroizing::new(
            postcard::to_allocvec(&plain)
                .map_err(|e| WalletError::Crypto(format!("vault encoding failed: {e}")))?,
        );

        let mut salt = [0u8; BLOB_SALT_LEN];
        let mut nonce_bytes = [0u8; BLOB_NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let key = Self::derive_blob_key(&self.checksum, &salt);
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| WalletError::Crypto(format!("cipher init failed: {e}")))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), packed.as_slice())
            .map_err(|_| WalletError::Crypto("vault encryption failed".into()))?;

        let mut blob = Vec::with_capacity(BLOB_SALT_LEN + BLOB_NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        self.cipher_keys = blob;
        Ok(())
    }

    /// Re-encrypts, clears plaintext keys, and transitions to `Locked`.
    pub fn lock(&mut self) -> Result<(), WalletError> {
        if self.is_locked() {
            return Err(WalletError::Auth("vault is already locked".into()));
        }
        self.encrypt_keys()?;
        self.keys.clear();
        *self.checksum = LOCKED_SENTINEL;
        debug!("vault locked");
        self.notify(true);
        Ok(())
    }

    /// Decrypts the cipher blob and installs the key map. On any failure the
    /// vault stays locked and unchanged.
    pub fn unlock(&mut self, password: &str) -> Result<(), WalletError> {
        if !self.is_locked() {
            return Err(WalletError::Auth("vault is already unlocked".into()));
        }
        if password.is_empty() {
            return Err(WalletError::Auth("password must not be empty".into()));
        }
        if self.cipher_keys.len() <= BLOB_SALT_LEN + BLOB_NONCE_LEN {
            return Err(WalletError::Auth("vault has no encrypted keys".into()));
        }

        let mut pw = Zeroizing::new([0u8; 64]);
        let digest = Sha512::digest(password.as_bytes());
        pw.copy_from_slice(&digest[..]);

        let (salt, rest) = self.cipher_keys.split_at(BLOB_SALT_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(BLOB_NONCE_LEN);
        let key = Self::derive_blob_key(&pw, salt);
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| WalletError::Crypto(format!("cipher init failed: {e}")))?;
        let packed = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
                .map_err(|_| WalletError::Auth("wrong password".into()))?,
        );

        let plain: PlainKeys = postcard::from_bytes(&packed)
            .map_err(|e| WalletError::Crypto(format!("vault decoding failed: {e}")))?;
        if plain.checksum[..] != pw[..] {
            return Err(WalletError::Auth("wrong password".into()));
        }

        let mut keys = HashMap::with_capacity(plain.keys.len());
        for (public, wif) in &plain.keys {
            keys.insert(*public, PrivateKey::from_wif(wif)?);
        }

        self.keys = keys;
        self.checksum = pw;
        debug!(key_count = self.keys.len(), "vault unlocked");
        self.notify(false);
        Ok(())
    }

    /// Sets the password and immediately locks. Allowed only on a vault that
    /// has never had a password, or while unlocked.
    pub fn set_password(&mut self, password: &str) -> Result<(), WalletError> {
        if !self.is_new() && self.is_locked() {
            return Err(WalletError::Auth(
                "vault must be unlocked before the password can be changed".into(),
            ));
        }
        if password.is_empty() {
            return Err(WalletError::Auth("password must not be empty".into()));
        }
        let digest = Sha512::digest(password.as_bytes());
        self.checksum.copy_from_slice(&digest[..]);
        self.lock()
    }

    /// Inserts a key, keyed by its derived public key. Overwrites silently;
    /// returns whether the entry was newly inserted.
    pub fn import(&mut self, private_key: PrivateKey) -> Result<bool, WalletError> {
        if self.is_locked() {
            return Err(WalletError::Auth("vault must be unlocked to import keys".into()));
        }
        let public = private_key.public_key();
        let inserted = self.keys.insert(public, private_key).is_none();
        debug!(%public, inserted, "imported private key");
        Ok(inserted)
    }

    /// Exports a key in WIF form.
    pub fn export_wif(&self, public: &PublicKey) -> Result<String, WalletError> {
        if self.is_locked() {
            return Err(WalletError::Auth("vault must be unlocked to export keys".into()));
        }
        self.keys
            .get(public)
            .map(PrivateKey::to_wif)
            .ok_or_else(|| WalletError::NotFound(format!("no private key for {public}")))
    }

    /// The private key for `public`, if the vault is unlocked and holds it.
    pub fn try_private_key(&self, public: &PublicKey) -> Option<&PrivateKey> {
        self.keys.get(public)
    }

    pub fn private_key(&self, public: &PublicKey) -> Result<&PrivateKey, WalletError> {
        if self.is_locked() {
            return Err(WalletError::Auth("vault is locked".into()));
        }
        self.keys
            .get(public)
            .ok_or_else(|| WalletError::NotFound(format!("no private key for {public}")))
    }

    /// True when the unlocked vault holds a key for `public`. Always false
    /// while locked.
    pub fn contains(&self, public: &PublicKey) -> bool {
        self.keys.contains_key(public)
    }

    /// The set of public keys whose private halves are currently available.
    pub fn public_keys(&self) -> Result<BTreeSet<PublicKey>, WalletError> {
        if self.is_locked() {
            return Err(WalletError::Auth("vault is locked".into()));
        }
        Ok(self.keys.keys().copied().collect())
    }
}

impl Default for KeyVault {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn unlocked_vault() -> KeyVault {
        let mut vault = KeyVault::new();
        vault.set_password("correct horse").unwrap();
        vault.unlock("correct horse").unwrap();
        vault
    }

    #[test]
    fn new_vault_is_locked_and_new() {
        let vault = KeyVault::new();
        assert!(vault.is_locked());
        assert!(vault.is_new());
    }

    #[test]
    fn set_password_locks() {
        let mut vault = KeyVault::new();
        vault.set_password("pw").unwrap();
        assert!(vault.is_locked());
        assert!(!vault.is_new());
    }

    #[test]
    fn unlock_requires_matching_password() {
        let mut vault = KeyVault::new();
        vault.set_password("right").unwrap();

        assert!(matches!(vault.unlock("wrong"), Err(WalletError::Auth(_))));
        assert!(vault.is_locked());

        vault.unlock("right").unwrap();
        assert!(!vault.is_locked());
    }

    #[test]
    fn failed_unlock_leaves_no_keys_exposed() {
        let mut vault = unlocked_vault();
        vault.import(PrivateKey::generate()).unwrap();
        vault.lock().unwrap();

        assert!(vault.unlock("nope").is_err());
        assert!(vault.is_locked());
        assert!(vault.public_keys().is_err());
    }

    #[test]
    fn lock_unlock_round_trips_keys() {
        let mut vault = unlocked_vault();
        let a = PrivateKey::generate();
        let b = PrivateKey::generate();
        vault.import(a.clone()).unwrap();
        vault.import(b.clone()).unwrap();
        let before = vault.public_keys().unwrap();

        vault.lock().unwrap();
        vault.unlock("correct horse").unwrap();

        assert_eq!(vault.public_keys().unwrap(), before);
        assert_eq!(vault.export_wif(&a.public_key()).unwrap(), a.to_wif());
        assert_eq!(vault.export_wif(&b.public_key()).unwrap(), b.to_wif());
    }

    #[test]
    fn lock_is_not_reentrant() {
        let mut vault = unlocked_vault();
        vault.lock().unwrap();
        assert!(matches!(vault.lock(), Err(WalletError::Auth(_))));
    }

    #[test]
    fn unlock_is_not_reentrant() {
        let mut vault = unlocked_vault();
        assert!(matches!(vault.unlock("correct horse"), Err(WalletError::Auth(_))));
    }

    #[test]
    fn import_requires_unlock() {
        let mut vault = KeyVault::new();
        vault.set_password("pw").unwrap();
        assert!(matches!(vault.import(PrivateKey::generate()), Err(WalletError::Auth(_))));
    }

    #[test]
    fn import_is_idempotent() {
        let mut vault = unlocked_vault();
        let key = PrivateKey::generate();
        assert!(vault.import(key.clone()).unwrap());
        assert!(!vault.import(key).unwrap());
        assert_eq!(vault.public_keys().unwrap().len(), 1);
    }

    #[test]
    fn export_missing_key_is_not_found() {
        let vault = unlocked_vault();
        let absent = PrivateKey::generate().public_key();
        assert!(matches!(vault.export_wif(&absent), Err(WalletError::NotFound(_))));
    }

    #[test]
    fn set_password_rejected_while_locked() {
        let mut vault = KeyVault::new();
        vault.set_password("first").unwrap();
        assert!(matches!(vault.set_password("second"), Err(WalletError::Auth(_))));

        vault.unlock("first").unwrap();
        vault.set_password("second").unwrap();
        assert!(vault.is_locked());
        vault.unlock("second").unwrap();
    }

    #[test]
    fn password_change_preserves_keys() {
        let mut vault = unlocked_vault();
        let key = PrivateKey::generate();
        vault.import(key.clone()).unwrap();

        vault.set_password("next password").unwrap();
        vault.unlock("next password").unwrap();
        assert!(vault.contains(&key.public_key()));
    }

    #[test]
    fn observers_see_transitions() {
        let locks = Arc::new(AtomicUsize::new(0));
        let unlocks = Arc::new(AtomicUsize::new(0));
        let mut vault = KeyVault::new();
        let (l, u) = (locks.clone(), unlocks.clone());
        vault.on_lock_change(move |locked| {
            if locked {
                l.fetch_add(1, Ordering::SeqCst);
            } else {
                u.fetch_add(1, Ordering::SeqCst);
            }
        });

        vault.set_password("pw").unwrap();
        vault.unlock("pw").unwrap();
        vault.lock().unwrap();

        assert_eq!(locks.load(Ordering::SeqCst), 2);
        assert_eq!(unlocks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blob_round_trip_restores_vault() {
        let mut vault = unlocked_vault();
        let key = PrivateKey::generate();
        vault.import(key.clone()).unwrap();
        vault.lock().unwrap();

        let mut restored = KeyVault::from_cipher_blob(vault.cipher_blob().to_vec());
        restored.unlock("correct horse").unwrap();
        assert!(restored.contains(&key.public_key()));
    }
}
