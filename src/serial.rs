//! (De)serialization of stored row values.
//!
//! Row values are msgpack with explicit binary payloads:
//! the primary sub-database stores a `(valu, indx)` 2-tuple,
//! the secondary sub-databases store a `(buid,)` 1-tuple.

//---------------------------------------------------------------------------------------------------- Import
use serde::de::Error as _;
use serde_bytes::{ByteBuf, Bytes};

use crate::constants::BUID_SIZE;
use crate::error::RuntimeError;
use crate::types::Buid;

//---------------------------------------------------------------------------------------------------- Row values
/// Encode a primary row value: `(valu, indx)`.
pub(crate) fn encode_row(valu: &[u8], indx: &[u8]) -> Result<Vec<u8>, RuntimeError> {
    Ok(rmp_serde::to_vec(&(Bytes::new(valu), Bytes::new(indx)))?)
}

/// Decode a primary row value back into `(valu, indx)`.
pub(crate) fn decode_row(byts: &[u8]) -> Result<(Vec<u8>, Vec<u8>), RuntimeError> {
    let (valu, indx) = rmp_serde::from_slice::<(ByteBuf, ByteBuf)>(byts)?;
    Ok((valu.into_vec(), indx.into_vec()))
}

//---------------------------------------------------------------------------------------------------- Buid values
/// Encode a secondary index value: `(buid,)`.
pub(crate) fn encode_buid(buid: &Buid) -> Result<Vec<u8>, RuntimeError> {
    Ok(rmp_serde::to_vec(&(Bytes::new(buid),))?)
}

/// Decode a secondary index value back into a [`Buid`].
pub(crate) fn decode_buid(byts: &[u8]) -> Result<Buid, RuntimeError> {
    let (buid,) = rmp_serde::from_slice::<(ByteBuf,)>(byts)?;
    <Buid>::try_from(buid.into_vec()).map_err(|bytes| {
        RuntimeError::Decode(rmp_serde::decode::Error::custom(format!(
            "buid must be {BUID_SIZE} bytes, found {}",
            bytes.len(),
        )))
    })
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn row_roundtrip() {
        let (valu, indx) = decode_row(&encode_row(b"visi", b"\x01\x02").unwrap()).unwrap();
        assert_eq!(valu, b"visi");
        assert_eq!(indx, b"\x01\x02");
    }

    #[test]
    fn row_roundtrip_empty() {
        let (valu, indx) = decode_row(&encode_row(b"", b"").unwrap()).unwrap();
        assert!(valu.is_empty());
        assert!(indx.is_empty());
    }

    #[test]
    fn buid_roundtrip() {
        let buid = [0x41; BUID_SIZE];
        assert_eq!(decode_buid(&encode_buid(&buid).unwrap()).unwrap(), buid);
    }

    #[test]
    fn buid_bad_length() {
        let byts = rmp_serde::to_vec(&(Bytes::new(b"short"),)).unwrap();
        assert!(matches!(
            decode_buid(&byts),
            Err(RuntimeError::Decode(_))
        ));
    }
}
