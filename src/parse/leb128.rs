//! LEB128 decoding.

use crate::errors::Error;
use core::ops;

// A LEB128-decodable integral type.
pub(crate) trait Leb128:
    Copy
    + From<u8>
    + ops::BitOrAssign
    + ops::Not<Output = Self>
    + ops::Shl<u32, Output = Self>
{
    const MAX_BITS: u32;
    const IS_SIGNED: bool;
}

impl Leb128 for u32 {
    const MAX_BITS: u32 = 32;
    const IS_SIGNED: bool = false;
}

impl Leb128 for u64 {
    const MAX_BITS: u32 = 64;
    const IS_SIGNED: bool = false;
}

impl Leb128 for i32 {
    const MAX_BITS: u32 = 32;
    const IS_SIGNED: bool = true;
}

impl Leb128 for i64 {
    const MAX_BITS: u32 = 64;
    const IS_SIGNED: bool = true;
}

// Read a LEB128-encoded value using the provided byte source function.
//
// Rejects encodings longer than ceil(MAX_BITS / 7) bytes and encodings whose
// unused terminal bits are inconsistent: non-zero for unsigned types, not
// equal to the sign bit for signed types.
pub(crate) fn read<T, F>(mut read_byte: F) -> crate::Result<T>
where
    T: Leb128,
    F: FnMut() -> crate::Result<u8>,
{
    const CONTENT_MASK: u8 = 0x7f;
    const CONTINUATION_MASK: u8 = 0x80;
    const SIGN_EXTEND_MASK: u8 = 0x40;

    let mut result = T::from(0);
    let mut shift = 0;
    let mut byte;

    loop {
        if shift >= T::MAX_BITS {
            return Err(Error::malformed("invalid LEB128 encoding: too many bytes"));
        }

        byte = read_byte()?;
        let content = byte & CONTENT_MASK;

        // The final byte may not overflow the bits remaining in the target.
        if T::MAX_BITS - shift < 7 {
            let remaining_bits = T::MAX_BITS - shift;
            let valid = if T::IS_SIGNED {
                // For signed types, the unused bits must be consistent with
                // the sign bit.
                let mask = ((!0u8) << (remaining_bits - 1)) & CONTENT_MASK;
                let masked = content & mask;
                masked == 0 || masked == mask
            } else {
                // For unsigned types, the unused bits must be zero.
                content < (1u8 << remaining_bits)
            };
            if !valid {
                return Err(Error::malformed("invalid LEB128 encoding: unused bits set"));
            }
        }

        result |= T::from(content) << shift;
        shift += 7;

        if byte & CONTINUATION_MASK == 0 {
            break;
        }
    }

    // Sign extend if this is a signed type and the sign bit is set.
    if T::IS_SIGNED && shift < T::MAX_BITS && (byte & SIGN_EXTEND_MASK) != 0 {
        result |= !T::from(0) << shift;
    }
    Ok(result)
}
