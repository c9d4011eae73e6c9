//! Encoding of the swap contract's `swap` call
//!
//! Layout: 8-byte discriminator (`sha256("global:swap")[..8]`) followed by
//! the little-endian fixed-width arguments
//! `(token_in: [u8; 32], token_out: [u8; 32], amount_in: u64, min_amount_out: u64)`.

use once_cell::sync::Lazy;
use serde::Serialize;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

use crate::errors::SwapError;

/// Name of the contract operation invoked by every swap
pub const SWAP_METHOD: &str = "swap";

static SWAP_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| {
    let digest = Sha256::digest(format!("global:{}", SWAP_METHOD).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
});

/// Discriminator prefixed to every encoded `swap` call
pub fn swap_discriminator() -> [u8; 8] {
    *SWAP_DISCRIMINATOR
}

/// Arguments of `swap(tokenIn, tokenOut, amountIn, minAmountOut)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapCall {
    pub token_in: Pubkey,
    pub token_out: Pubkey,
    pub amount_in: u64,
    /// Slippage-adjusted minimum output
    pub min_amount_out: u64,
}

impl SwapCall {
    /// Encode the call data
    pub fn encode(&self) -> Result<Vec<u8>, SwapError> {
        let args = bincode::serialize(self)
            .map_err(|e| SwapError::BuildError(format!("failed to encode swap call: {}", e)))?;
        let mut data = Vec::with_capacity(8 + args.len());
        data.extend_from_slice(&swap_discriminator());
        data.extend_from_slice(&args);
        Ok(data)
    }
}
