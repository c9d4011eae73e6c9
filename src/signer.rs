//! Signer capability
//!
//! The engine only ever holds an `Arc<dyn SwapSigner>`: it can ask for a
//! signature and for the signing account, never for key material. Hardware or
//! service-backed signers plug in behind the same trait.

use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use zeroize::Zeroizing;

use crate::errors::SwapError;
use crate::types::{SignedTransaction, UnsignedTransaction};

/// Async signer trait for swap transactions
#[async_trait]
pub trait SwapSigner: Send + Sync {
    /// Account that pays for and sends the swap
    fn account(&self) -> Pubkey;

    /// Sign a transaction; fails with `SigningError`
    async fn sign(&self, transaction: UnsignedTransaction) -> Result<SignedTransaction, SwapError>;
}

/// Local keypair signer (for development and testing)
pub struct LocalKeypairSigner {
    keypair: Keypair,
}

impl LocalKeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load from a keypair file (JSON byte array or 64 raw bytes)
    pub fn from_file(path: &str) -> Result<Self, SwapError> {
        let contents = Zeroizing::new(std::fs::read(path).map_err(|e| {
            SwapError::SigningError(format!("failed to read keypair file {}: {}", path, e))
        })?);

        if contents.len() == 64 {
            return Self::from_bytes(&contents);
        }

        let json: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_slice(&contents)
                .map_err(|e| SwapError::SigningError(format!("failed to parse keypair JSON: {}", e)))?,
        );
        Self::from_bytes(&json)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SwapError> {
        if bytes.len() != 64 {
            return Err(SwapError::SigningError(format!(
                "invalid keypair length: expected 64 bytes, got {}",
                bytes.len()
            )));
        }
        if bytes.iter().all(|&b| b == 0) {
            return Err(SwapError::SigningError(
                "invalid keypair: all-zero key rejected".to_string(),
            ));
        }
        Keypair::try_from(bytes)
            .map(Self::new)
            .map_err(|e| SwapError::SigningError(format!("invalid keypair bytes: {}", e)))
    }
}

impl std::fmt::Debug for LocalKeypairSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeypairSigner")
            .field("account", &self.keypair.pubkey())
            .finish()
    }
}

#[async_trait]
impl SwapSigner for LocalKeypairSigner {
    fn account(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign(&self, transaction: UnsignedTransaction) -> Result<SignedTransaction, SwapError> {
        if transaction.sender != self.keypair.pubkey() {
            return Err(SwapError::SigningError(format!(
                "transaction sender {} does not match signer {}",
                transaction.sender,
                self.keypair.pubkey()
            )));
        }

        let message = transaction.message_bytes()?;
        let signature = self
            .keypair
            .try_sign_message(&message)
            .map_err(|e| SwapError::SigningError(e.to_string()))?;

        let mut raw = Vec::with_capacity(64 + message.len());
        raw.extend_from_slice(signature.as_ref());
        raw.extend_from_slice(&message);

        Ok(SignedTransaction::new(
            signature,
            raw,
            transaction.sender,
            transaction.nonce,
        ))
    }
}
