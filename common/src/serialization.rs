use crate::constants::WIRE_RADIX;
use crate::error::ProtocolError;
use anyhow::{anyhow, Result};
use num_bigint::BigUint;

/// Converts a hexadecimal string to a BigUint. Odd-length input is left padded.
pub fn hex_to_biguint(hex: &str) -> Result<BigUint> {
    let hex = hex.trim();
    let padded = if hex.len() % 2 != 0 {
        format!("0{}", hex)
    } else {
        hex.to_string()
    };
    let decoded =
        hex::decode(&padded).map_err(|e| anyhow!("Failed to decode hex string: {}", e))?;
    Ok(BigUint::from_bytes_be(&decoded))
}

/// Converts a BigUint to the base-32 string used on the wire.
pub fn biguint_to_radix32(n: &BigUint) -> String {
    n.to_str_radix(WIRE_RADIX)
}

/// Parses a base-32 wire string into a BigUint.
pub fn radix32_to_biguint(s: &str) -> Result<BigUint> {
    BigUint::parse_bytes(s.trim().as_bytes(), WIRE_RADIX)
        .ok_or_else(|| ProtocolError::InvalidRadix(s.to_string()).into())
}

/// Encodes raw big-endian bytes as an OpenPGP MPI (bit count + magnitude).
pub fn mpi_from_be_bytes(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let value = &bytes[start..];
    let bits = match value.first() {
        Some(first) => (value.len() - 1) * 8 + (8 - first.leading_zeros() as usize),
        None => 0,
    };
    let mut out = Vec::with_capacity(2 + value.len());
    out.extend_from_slice(&(bits as u16).to_be_bytes());
    out.extend_from_slice(value);
    out
}

/// Encodes a BigUint as an OpenPGP MPI.
pub fn to_mpi_buffer(n: &BigUint) -> Vec<u8> {
    mpi_from_be_bytes(&n.to_bytes_be())
}

/// Left pads (or keeps) big-endian bytes to exactly `len` bytes.
pub fn to_fixed_be_bytes(n: &BigUint, len: usize) -> Result<Vec<u8>> {
    let bytes = n.to_bytes_be();
    if bytes.len() > len {
        return Err(anyhow!("value needs {} bytes but only {} are available", bytes.len(), len));
    }
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{One, Zero};
    use proptest::prelude::*;

    #[test]
    fn test_hex_biguint_conversion() -> Result<()> {
        let num = BigUint::parse_bytes(b"1234567890abcdef", 16).unwrap();
        assert_eq!(hex_to_biguint("1234567890abcdef")?, num);
        assert_eq!(hex_to_biguint("  00ff\n")?, BigUint::from(0xffu32));
        Ok(())
    }

    #[test]
    fn test_hex_odd_length() -> Result<()> {
        assert_eq!(hex_to_biguint("abc")?, BigUint::from(0xabcu32));
        Ok(())
    }

    #[test]
    fn test_invalid_hex() {
        let invalid_hex = "invalid-hex";
        let result = hex_to_biguint(invalid_hex);
        assert!(result.is_err());
    }

    #[test]
    fn test_radix32_boundaries() -> Result<()> {
        assert_eq!(biguint_to_radix32(&BigUint::zero()), "0");
        assert_eq!(radix32_to_biguint("0")?, BigUint::zero());
        assert_eq!(biguint_to_radix32(&BigUint::one()), "1");
        assert_eq!(radix32_to_biguint("1")?, BigUint::one());
        // 32 = "10", 31 = "v"
        assert_eq!(biguint_to_radix32(&BigUint::from(32u32)), "10");
        assert_eq!(biguint_to_radix32(&BigUint::from(31u32)), "v");

        let large = (BigUint::one() << 521) - BigUint::from(12345u32);
        assert_eq!(radix32_to_biguint(&biguint_to_radix32(&large))?, large);
        Ok(())
    }

    #[test]
    fn test_invalid_radix32() {
        let err = radix32_to_biguint("xyz!").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::InvalidRadix(_))
        ));
        assert!(radix32_to_biguint("").is_err());
    }

    #[test]
    fn test_mpi_encoding() {
        // 0 は長さ 0 の MPI
        assert_eq!(to_mpi_buffer(&BigUint::zero()), vec![0x00, 0x00]);
        // RFC 4880 3.2 の例: 1 -> 00 01 01, 511 -> 00 09 01 FF
        assert_eq!(to_mpi_buffer(&BigUint::one()), vec![0x00, 0x01, 0x01]);
        assert_eq!(
            to_mpi_buffer(&BigUint::from(511u32)),
            vec![0x00, 0x09, 0x01, 0xff]
        );
        // 先頭のゼロバイトは取り除かれる
        assert_eq!(mpi_from_be_bytes(&[0x00, 0x04, 0x01]), vec![0x00, 0x0b, 0x04, 0x01]);
    }

    #[test]
    fn test_fixed_bytes() -> Result<()> {
        assert_eq!(to_fixed_be_bytes(&BigUint::from(258u32), 4)?, vec![0, 0, 1, 2]);
        assert!(to_fixed_be_bytes(&BigUint::from(0x10000u32), 2).is_err());
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_radix32_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..96)) {
            let n = BigUint::from_bytes_be(&bytes);
            let decoded = radix32_to_biguint(&biguint_to_radix32(&n)).unwrap();
            prop_assert_eq!(decoded, n);
        }
    }
}
