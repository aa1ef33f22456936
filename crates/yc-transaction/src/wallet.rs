use std::{fmt, fs, path::Path};

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use crate::{Transaction, TransactionError};

/// An ed25519 keypair able to sign transfers on behalf of its address.
///
/// The address is the lowercase hex encoding of the 32-byte verifying key.
pub struct Wallet {
    signing_key: SigningKey,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl Wallet {
    /// Generate a fresh keypair from the OS random number generator.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let secret: [u8; 32] = bytes.try_into().map_err(|_| {
            TransactionError::InvalidKey(format!("secret key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    pub fn from_secret_hex(secret: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| TransactionError::InvalidKey(e.to_string()))?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn address(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign `tx` in place.  The transaction must name this wallet as sender.
    pub fn sign(&self, tx: &mut Transaction) -> Result<(), TransactionError> {
        let signature = self.signing_key.sign(&tx.signing_bytes()?);
        tx.attach_signature(signature.to_bytes().to_vec());
        Ok(())
    }

    /// Build and sign a transfer from this wallet.
    pub fn transfer(
        &self,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<Transaction, TransactionError> {
        let mut tx = Transaction::new(self.address(), recipient, amount);
        self.sign(&mut tx)?;
        Ok(tx)
    }

    /// Read a hex-encoded secret key from `path`.
    pub fn load(path: &Path) -> Result<Self, TransactionError> {
        Self::from_secret_hex(&fs::read_to_string(path)?)
    }

    /// Write the hex-encoded secret key to `path`, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), TransactionError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.secret_hex())?;
        Ok(())
    }

    /// Load the wallet at `path`, or generate a new one when the file is
    /// missing or empty.  The flag is `true` when a new wallet was generated.
    pub fn load_or_generate(path: &Path) -> Result<(Self, bool), TransactionError> {
        match fs::read_to_string(path) {
            Ok(contents) if !contents.trim().is_empty() => {
                Ok((Self::from_secret_hex(&contents)?, false))
            }
            Ok(_) => Ok((Self::generate(), true)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((Self::generate(), true)),
            Err(e) => Err(e.into()),
        }
    }
}
