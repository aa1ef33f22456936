use chrono::Utc;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::TransactionError;

/// Sender used by transactions that mint new value (block rewards and genesis
/// allocations).  Never a valid key, so the pool cannot be tricked into
/// accepting one.
pub const COINBASE: &str = "coinbase";

/// A transfer of `amount` units from `sender` to `recipient`.
///
/// Addresses are the hex-encoded ed25519 verifying key of the owning wallet.
/// A transaction is immutable once signed: any change to the signed fields
/// invalidates `signature`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier for this transaction.
    pub id: Uuid,

    /// Address of the paying wallet, or [`COINBASE`].
    pub sender: String,

    /// Address credited with `amount`.
    pub recipient: String,

    /// Amount in the smallest unit.
    pub amount: u64,

    /// Unix timestamp (seconds) when this transaction was created.
    pub timestamp: i64,

    /// ed25519 signature over [`Transaction::signing_bytes`].
    /// Empty for coinbase transactions.
    pub signature: Vec<u8>,
}

/// The signed portion of a transaction, in canonical field order.
#[derive(Serialize)]
struct SigningPayload<'a> {
    id: &'a Uuid,
    sender: &'a str,
    recipient: &'a str,
    amount: u64,
    timestamp: i64,
}

impl Transaction {
    /// Create a new unsigned transfer.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            timestamp: Utc::now().timestamp(),
            signature: Vec::new(),
        }
    }

    /// Create a coinbase transaction crediting `recipient` with freshly minted
    /// value.
    pub fn coinbase(recipient: impl Into<String>, amount: u64) -> Self {
        Self::new(COINBASE, recipient, amount)
    }

    pub fn is_coinbase(&self) -> bool {
        self.sender == COINBASE
    }

    /// Canonical bytes covered by the signature: bincode of
    /// `(id, sender, recipient, amount, timestamp)`.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        let payload = SigningPayload {
            id: &self.id,
            sender: &self.sender,
            recipient: &self.recipient,
            amount: self.amount,
            timestamp: self.timestamp,
        };
        Ok(bincode::serialize(&payload)?)
    }

    /// Compute the SHA-256 hash of the canonical byte representation of this
    /// transaction, signature included.  Used as the leaf value in the Merkle
    /// tree.
    pub fn hash(&self) -> Result<[u8; 32], TransactionError> {
        let bytes = bincode::serialize(self)?;
        let digest = Sha256::digest(&bytes);
        Ok(digest.into())
    }

    /// Hex-encoded hash, useful for display and logging.
    pub fn hash_hex(&self) -> Result<String, TransactionError> {
        Ok(hex::encode(self.hash()?))
    }

    /// Attach a pre-computed signature.
    pub fn attach_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    /// True when a signature has been attached.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Check that `signature` was produced by the key behind `sender`.
    ///
    /// Coinbase and unsigned transactions always fail.
    pub fn verify_signature(&self) -> Result<(), TransactionError> {
        if self.is_coinbase() || !self.is_signed() {
            return Err(TransactionError::InvalidSignature);
        }

        let key = verifying_key_from_address(&self.sender)
            .map_err(|_| TransactionError::InvalidSignature)?;
        let signature = Signature::from_slice(&self.signature)
            .map_err(|_| TransactionError::InvalidSignature)?;

        key.verify(&self.signing_bytes()?, &signature)
            .map_err(|_| TransactionError::InvalidSignature)
    }
}

/// Decode a hex address back into the ed25519 key it names.
pub fn verifying_key_from_address(address: &str) -> Result<VerifyingKey, TransactionError> {
    let bytes = hex::decode(address)
        .map_err(|e| TransactionError::InvalidAddress(format!("{address}: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| TransactionError::InvalidAddress(format!("{address}: expected 32 bytes")))?;

    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| TransactionError::InvalidAddress(format!("{address}: {e}")))
}
