use crate::types::ValType;
use core::fmt;

// Generates `get_*` and `unwrap_*` accessors for `Val` variants.
macro_rules! enum_accessors {
    ($bind:ident $(($variant:ident($ty:ty) $get:ident $unwrap:ident $cvt:expr))*) => ($(
        /// Attempt to access the underlying value of this `Val`, returning
        /// `None` if it is not the correct type.
        #[inline]
        pub fn $get(&self) -> Option<$ty> {
            if let Self::$variant($bind) = self {
                Some($cvt)
            } else {
                None
            }
        }

        /// Returns the underlying value of this `Val`, panicking if it's the
        /// wrong type.
        ///
        /// # Panics
        ///
        /// Panics if `self` is not of the right type.
        #[inline]
        pub fn $unwrap(&self) -> $ty {
            self.$get().expect(concat!("expected ", stringify!($ty)))
        }
    )*)
}

/// A raw 64-bit value cell with no runtime type tag.
///
/// The static type of the cell comes from the surrounding function or global
/// signature; the cell itself is opaque bits. 32-bit values occupy the low
/// half, floats are stored as their IEEE-754 bit patterns.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct VMVal(u64);

impl fmt::Debug for VMVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VMVal({:#018x})", self.0)
    }
}

impl VMVal {
    #[inline]
    pub fn i32(value: i32) -> VMVal {
        VMVal::u32(value as u32)
    }

    #[inline]
    pub fn i64(value: i64) -> VMVal {
        VMVal::u64(value as u64)
    }

    #[inline]
    pub fn u32(value: u32) -> VMVal {
        VMVal(u64::from(value))
    }

    #[inline]
    pub fn u64(value: u64) -> VMVal {
        VMVal(value)
    }

    #[inline]
    pub fn f32(value: f32) -> VMVal {
        VMVal::u32(value.to_bits())
    }

    #[inline]
    pub fn f64(value: f64) -> VMVal {
        VMVal::u64(value.to_bits())
    }

    #[inline]
    pub fn get_i32(self) -> i32 {
        self.0 as u32 as i32
    }

    #[inline]
    pub fn get_i64(self) -> i64 {
        self.0 as i64
    }

    #[inline]
    pub fn get_u32(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn get_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn get_f32(self) -> f32 {
        f32::from_bits(self.get_u32())
    }

    #[inline]
    pub fn get_f64(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl From<i32> for VMVal {
    #[inline]
    fn from(value: i32) -> VMVal {
        VMVal::i32(value)
    }
}

impl From<u32> for VMVal {
    #[inline]
    fn from(value: u32) -> VMVal {
        VMVal::u32(value)
    }
}

impl From<i64> for VMVal {
    #[inline]
    fn from(value: i64) -> VMVal {
        VMVal::i64(value)
    }
}

impl From<u64> for VMVal {
    #[inline]
    fn from(value: u64) -> VMVal {
        VMVal::u64(value)
    }
}

impl From<f32> for VMVal {
    #[inline]
    fn from(value: f32) -> VMVal {
        VMVal::f32(value)
    }
}

impl From<f64> for VMVal {
    #[inline]
    fn from(value: f64) -> VMVal {
        VMVal::f64(value)
    }
}

/// A typed value that a WebAssembly function can consume or produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Val {
    /// A 32-bit integer.
    I32(i32),
    /// A 64-bit integer.
    I64(i64),
    /// A 32-bit float.
    ///
    /// Note that the raw bits of the float are stored here, and you can use
    /// `f32::from_bits` to create an `f32` value.
    F32(u32),
    /// A 64-bit float.
    ///
    /// Note that the raw bits of the float are stored here, and you can use
    /// `f64::from_bits` to create an `f64` value.
    F64(u64),
}

impl Val {
    /// The type of this value.
    #[inline]
    pub fn ty(&self) -> ValType {
        match self {
            Val::I32(_) => ValType::I32,
            Val::I64(_) => ValType::I64,
            Val::F32(_) => ValType::F32,
            Val::F64(_) => ValType::F64,
        }
    }

    /// Convenience method to convert this [`Val`] into a raw [`VMVal`].
    #[inline]
    pub fn as_vmval(&self) -> VMVal {
        match self {
            Val::I32(i) => VMVal::i32(*i),
            Val::I64(i) => VMVal::i64(*i),
            Val::F32(u) => VMVal::u32(*u),
            Val::F64(u) => VMVal::u64(*u),
        }
    }

    /// Convenience method to convert a raw [`VMVal`] into a [`Val`].
    #[inline]
    pub fn from_vmval(raw: VMVal, ty: ValType) -> Self {
        match ty {
            ValType::I32 => Self::I32(raw.get_i32()),
            ValType::I64 => Self::I64(raw.get_i64()),
            ValType::F32 => Self::F32(raw.get_u32()),
            ValType::F64 => Self::F64(raw.get_u64()),
        }
    }

    enum_accessors! {
        e
        (I32(i32) get_i32 unwrap_i32 *e)
        (I64(i64) get_i64 unwrap_i64 *e)
        (F32(f32) get_f32 unwrap_f32 f32::from_bits(*e))
        (F64(f64) get_f64 unwrap_f64 f64::from_bits(*e))
    }
}

impl From<i32> for Val {
    #[inline]
    fn from(val: i32) -> Val {
        Val::I32(val)
    }
}

impl From<i64> for Val {
    #[inline]
    fn from(val: i64) -> Val {
        Val::I64(val)
    }
}

impl From<f32> for Val {
    #[inline]
    fn from(val: f32) -> Val {
        Val::F32(val.to_bits())
    }
}

impl From<f64> for Val {
    #[inline]
    fn from(val: f64) -> Val {
        Val::F64(val.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_two_bit_values_occupy_the_low_half() {
        assert_eq!(VMVal::i32(-1).get_u64(), 0x0000_0000_ffff_ffff);
        assert_eq!(VMVal::u32(0xdead_beef).get_i32(), 0xdead_beefu32 as i32);
    }

    #[test]
    fn float_round_trips_preserve_bits() {
        // A signaling NaN must survive the cell unchanged.
        let snan = 0x7f80_0001u32;
        assert_eq!(VMVal::u32(snan).get_f32().to_bits(), snan);
        assert_eq!(VMVal::f64(-0.0).get_f64().to_bits(), 0x8000_0000_0000_0000);
    }

    #[test]
    fn typed_value_conversion() {
        let val = Val::from(1.5f32);
        assert_eq!(val.ty(), ValType::F32);
        assert_eq!(val.as_vmval().get_f32(), 1.5);
        assert_eq!(Val::from_vmval(VMVal::i64(-7), ValType::I64), Val::I64(-7));
    }
}
