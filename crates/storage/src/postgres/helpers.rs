//! Shared helper functions for PostgreSQL row conversion.

use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use rust_decimal::Decimal;

use tipjar_core::error::{StorageError, StorageResult};

/// Convert a `Vec<u8>` to a 20-byte address.
pub fn bytes_to_address(bytes: Vec<u8>, field_name: &str) -> StorageResult<Address> {
    if bytes.len() != 20 {
        return Err(StorageError::SerializationError(format!(
            "{} has invalid length: expected 20, got {}",
            field_name,
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Convert a `Vec<u8>` to a 32-byte transaction hash, rejecting all-zero
/// values as corrupt.
pub fn bytes_to_tx_hash(bytes: Vec<u8>, field_name: &str) -> StorageResult<B256> {
    let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
        StorageError::SerializationError(format!(
            "{} has invalid length: expected 32, got {}",
            field_name,
            v.len()
        ))
    })?;

    if arr == [0u8; 32] {
        return Err(StorageError::SerializationError(format!(
            "{} is all zeros, which indicates data corruption",
            field_name
        )));
    }

    Ok(B256::from(arr))
}

/// Parse a `NUMERIC(78, 0)` column read back as text.
pub fn text_to_u256(text: &str, field_name: &str) -> StorageResult<U256> {
    U256::from_str_radix(text.trim(), 10).map_err(|e| {
        StorageError::SerializationError(format!("{} is not a 256-bit integer: {}", field_name, e))
    })
}

/// Parse a `NUMERIC` column read back as text.
pub fn text_to_decimal(text: &str, field_name: &str) -> StorageResult<Decimal> {
    Decimal::from_str(text.trim()).map_err(|e| {
        StorageError::SerializationError(format!("{} is not a decimal: {}", field_name, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // Critical: detects corrupt data (all zeros = invalid hash)
    #[test]
    fn test_tx_hash_rejects_zeros() {
        let result = bytes_to_tx_hash(vec![0u8; 32], "tip.tx_hash");
        assert!(result.unwrap_err().to_string().contains("corruption"));
    }

    // Critical: errors name the field for debugging
    #[test]
    fn test_error_includes_field_name() {
        let err = bytes_to_address(vec![1u8; 16], "tip.recipient")
            .unwrap_err()
            .to_string();
        assert!(err.contains("tip.recipient"));
        assert!(err.contains("expected 20"));
    }

    #[test]
    fn test_numeric_text_parsing() {
        let max = U256::MAX.to_string();
        assert_eq!(text_to_u256(&max, "tip.amount").unwrap(), U256::MAX);
        assert!(text_to_u256("1.5", "tip.amount").is_err());
        assert_eq!(text_to_decimal("12.50", "tip.usd").unwrap(), dec!(12.50));
    }

    #[test]
    fn test_address_roundtrip_bytes() {
        let addr = Address::repeat_byte(0xab);
        assert_eq!(
            bytes_to_address(addr.to_vec(), "tip.recipient").unwrap(),
            addr
        );
    }
}
