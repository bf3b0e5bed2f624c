pub mod derivation;
pub mod keys;
pub mod memo;

pub use self::derivation::{suggest_brain_key, BrainKeyInfo};
pub use self::keys::{CompactSignature, PrivateKey, PublicKey};
pub use self::memo::{MemoEnvelope, MEMO_SENTINEL};
