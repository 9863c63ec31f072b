//! Canonical signature hashing.
//!
//! A function's 4-byte selector is the first 4 bytes of
//! `keccak256("name(type1,type2,...)")` over its input types; an event's
//! 32-byte topic is the full hash over all argument types, indexed or not.

use alloy::primitives::{keccak256, FixedBytes, B256};

use bridge_data::error::{EngineError, Result};

/// Bytes per ABI word. Every static argument occupies one full slot.
pub const WORD_BYTES: usize = 32;

/// Canonical signature string, e.g. `transfer(address,uint256)`.
/// An empty type list yields `name()`.
pub fn canonical_signature(name: &str, types: &[&str]) -> String {
    format!("{}({})", name, types.join(","))
}

/// 4-byte function selector over the input types.
pub fn function_selector(name: &str, input_types: &[&str]) -> FixedBytes<4> {
    let digest = keccak256(canonical_signature(name, input_types).as_bytes());
    FixedBytes::<4>::from_slice(&digest[..4])
}

/// 32-byte event topic hash over all argument types.
pub fn event_topic(name: &str, arg_types: &[&str]) -> B256 {
    keccak256(canonical_signature(name, arg_types).as_bytes())
}

/// Significant byte width of a fixed-width ABI type.
///
/// Decoding always consumes one 32-byte slot per argument; the returned
/// width says how many of those bytes carry the value. Dynamic and unknown
/// types have no fixed width and fail with [`EngineError::TypeNotFound`].
pub fn word_width(ty: &str) -> Result<usize> {
    if ty == "address" {
        return Ok(20);
    }
    if ty == "bool" {
        return Ok(1);
    }
    if let Some(bits) = ty.strip_prefix("uint").or_else(|| ty.strip_prefix("int")) {
        if let Ok(bits) = bits.parse::<usize>() {
            if bits > 0 && bits <= 256 && bits % 8 == 0 {
                return Ok(bits / 8);
            }
        }
    }
    if let Some(len) = ty.strip_prefix("bytes") {
        if let Ok(len) = len.parse::<usize>() {
            if len > 0 && len <= 32 {
                return Ok(len);
            }
        }
    }
    Err(EngineError::TypeNotFound(ty.to_string()))
}
