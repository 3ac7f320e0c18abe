use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;

use crate::config::Cluster;
use crate::error::{MintkitError, Result};

/// Characters kept at each end of a shortened address.
const ADDRESS_EDGE: usize = 4;

/// Decimal places of the native currency.
pub const SOL_DECIMALS: u8 = 9;

/// Check whether `s` is a well-formed base58 account address.
pub fn is_valid_address(s: &str) -> bool {
    Pubkey::from_str(s).is_ok()
}

/// Parse an address, naming the offending input on failure.
pub fn parse_address(s: &str) -> Result<Pubkey> {
    Pubkey::from_str(s.trim()).map_err(|_| MintkitError::InvalidAddress(s.to_string()))
}

/// Shorten an address to `abcd...wxyz` for display.
///
/// Strings already at most 11 characters long are returned unchanged.
pub fn format_address(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= ADDRESS_EDGE * 2 + 3 {
        return s.to_string();
    }
    let head: String = chars[..ADDRESS_EDGE].iter().collect();
    let tail: String = chars[chars.len() - ADDRESS_EDGE..].iter().collect();
    format!("{head}...{tail}")
}

/// Block explorer URL for a transaction signature.
pub fn explorer_tx_url(signature: &str, cluster: Cluster) -> String {
    format!(
        "https://explorer.solana.com/tx/{signature}?cluster={}",
        cluster.explorer_param()
    )
}

/// Map a raw failure message to the text shown to the user.
///
/// Unknown messages pass through verbatim.
pub fn describe_failure(message: &str) -> String {
    MintkitError::from_remote(message).to_string()
}

/// Convert a human-unit amount to base units, rounding half away from zero.
///
/// # Errors
///
/// Returns `MintkitError::InvalidAmount` for negative amounts and
/// `MintkitError::Overflow` if the scaled value does not fit in a `u64`.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MintkitError::InvalidAmount(format!(
            "amount must not be negative: {amount}"
        )));
    }
    let factor = 10u64
        .checked_pow(u32::from(decimals))
        .ok_or_else(|| MintkitError::Overflow(format!("10^{decimals}")))?;
    amount
        .checked_mul(Decimal::from(factor))
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|scaled| scaled.to_u64())
        .ok_or_else(|| MintkitError::Overflow(format!("to_base_units: {amount} * 10^{decimals}")))
}

/// Convert a token amount to base units, refusing any precision the mint
/// cannot represent.
///
/// # Errors
///
/// Returns `MintkitError::InvalidAmount` if `amount` has more decimal places
/// than `decimals`, and otherwise whatever `to_base_units` returns.
pub fn exact_base_units(amount: Decimal, decimals: u8) -> Result<u64> {
    let places = amount.normalize().scale();
    if places > u32::from(decimals) {
        return Err(MintkitError::InvalidAmount(format!(
            "{amount} has {places} decimal places but the token allows {decimals}"
        )));
    }
    to_base_units(amount, decimals)
}

/// Convert base units to a human-unit amount. Exact for any `u64`.
pub fn from_base_units(amount: u64, decimals: u8) -> Decimal {
    // Scales past 28 are beyond Decimal precision; such amounts display as zero.
    Decimal::try_from_i128_with_scale(i128::from(amount), u32::from(decimals))
        .unwrap_or(Decimal::ZERO)
}

/// Lamports to SOL.
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    from_base_units(lamports, SOL_DECIMALS)
}

/// SOL to lamports.
pub fn sol_to_lamports(sol: Decimal) -> Result<u64> {
    to_base_units(sol, SOL_DECIMALS)
}

/// Parse a private key from a bs58 string (32-byte secret or 64-byte keypair).
pub fn keypair_from_private_key(key: &str) -> Result<Keypair> {
    let bytes = bs58::decode(key.trim())
        .into_vec()
        .map_err(|e| MintkitError::Signing(format!("bs58 decode error: {e}")))?;

    let keypair_bytes: [u8; 64] = match bytes.len() {
        64 => bytes
            .try_into()
            .map_err(|_| MintkitError::Signing("invalid key length".into()))?,
        32 => {
            let secret: [u8; 32] = bytes
                .try_into()
                .map_err(|_| MintkitError::Signing("invalid key length".into()))?;
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);
            let mut full = [0u8; 64];
            full[..32].copy_from_slice(&secret);
            full[32..].copy_from_slice(signing_key.verifying_key().as_bytes());
            full
        }
        n => {
            return Err(MintkitError::Signing(format!("unexpected key length: {n}")));
        }
    };

    #[allow(deprecated)]
    Keypair::from_bytes(&keypair_bytes).map_err(|e| MintkitError::Signing(e.to_string()))
}
