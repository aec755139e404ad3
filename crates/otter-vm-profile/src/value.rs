//! NaN-boxed values as stored in profile buckets
//!
//! Profiles record values in their encoded 64-bit form so that generated code
//! and the interpreter write identical bits.
//!
//! ## Encoding Scheme
//!
//! ```text
//! - Double:     stored directly (except NaN)
//! - NaN:        0x7FFA_0000_0000_0000 (canonical NaN, distinct from undefined)
//! - Integer:    0x7FF8_0001_XXXX_XXXX (32-bit signed in lower bits)
//! - Pointer:    0x7FFC_XXXX_XXXX_XXXX (48-bit pointer)
//! - Undefined:  0x7FF8_0000_0000_0000
//! - Null:       0x7FF8_0000_0000_0001
//! - True:       0x7FF8_0000_0000_0002
//! - False:      0x7FF8_0000_0000_0003
//! ```
//!
//! On targets that keep values in two 32-bit registers the high word is the
//! tag word and the low word is the payload word.

use std::fmt;

/// Raw bucket contents.
pub type EncodedJsValue = i64;

/// Bucket contents before anything has been recorded.
///
/// No constructor produces these bits: `+0.0` is boxed as int32 zero.
pub const EMPTY_VALUE: EncodedJsValue = 0;

/// Quiet NaN prefix shared by every boxed (non-double) value.
pub const QUIET_NAN: u64 = 0x7FF8_0000_0000_0000;
/// Mask selecting the high 16 bits.
pub const TAG_MASK: u64 = 0xFFFF_0000_0000_0000;
/// Mask selecting the 48-bit pointer payload.
pub const PAYLOAD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;
/// Mask selecting the int32 tag word.
pub const INT32_TAG_MASK: u64 = 0xFFFF_FFFF_0000_0000;

/// Boxed `undefined`.
pub const TAG_UNDEFINED: u64 = 0x7FF8_0000_0000_0000;
/// Boxed `null`.
pub const TAG_NULL: u64 = 0x7FF8_0000_0000_0001;
/// Boxed `true`.
pub const TAG_TRUE: u64 = 0x7FF8_0000_0000_0002;
/// Boxed `false`.
pub const TAG_FALSE: u64 = 0x7FF8_0000_0000_0003;
/// Canonical NaN.
pub const TAG_NAN: u64 = 0x7FFA_0000_0000_0000;
/// Int32 tag word (high 32 bits).
pub const TAG_INT32: u64 = 0x7FF8_0001_0000_0000;
/// Cell pointer tag.
pub const TAG_POINTER: u64 = 0x7FFC_0000_0000_0000;
/// Bits of `-0.0`.
pub const NEG_ZERO_BITS: u64 = 0x8000_0000_0000_0000;

/// A JavaScript value reduced to its 64-bit encoding.
///
/// Heap values are carried as untraced cell addresses; profiles only ever
/// inspect their bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct JsValue {
    bits: u64,
}

impl JsValue {
    /// Create undefined value
    #[inline]
    pub const fn undefined() -> Self {
        Self {
            bits: TAG_UNDEFINED,
        }
    }

    /// Create null value
    #[inline]
    pub const fn null() -> Self {
        Self { bits: TAG_NULL }
    }

    /// Create boolean value
    #[inline]
    pub const fn boolean(b: bool) -> Self {
        Self {
            bits: if b { TAG_TRUE } else { TAG_FALSE },
        }
    }

    /// Create 32-bit integer value
    #[inline]
    pub const fn int32(n: i32) -> Self {
        Self {
            bits: TAG_INT32 | (n as u32 as u64),
        }
    }

    /// Create number value, boxing integral values as int32
    pub fn number(n: f64) -> Self {
        if n.is_nan() {
            return Self { bits: TAG_NAN };
        }

        if n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && (n != 0.0 || n.is_sign_positive())
        {
            return Self::int32(n as i32);
        }

        Self { bits: n.to_bits() }
    }

    /// Create a cell value from a heap address (low 48 bits are kept)
    #[inline]
    pub fn cell<T>(ptr: *const T) -> Self {
        Self {
            bits: TAG_POINTER | (ptr as usize as u64 & PAYLOAD_MASK),
        }
    }

    /// Reinterpret raw bucket contents.
    ///
    /// Raw `+0.0` bits (the empty bucket encoding) become int32 zero, as
    /// [`JsValue::number`] would box them.
    #[inline]
    pub const fn from_encoded(encoded: EncodedJsValue) -> Self {
        if encoded == EMPTY_VALUE {
            return Self::int32(0);
        }
        Self {
            bits: encoded as u64,
        }
    }

    /// Encode for storage in a profile bucket
    #[inline]
    pub const fn encode(self) -> EncodedJsValue {
        self.bits as i64
    }

    /// High 32 bits (split-register tag word)
    #[inline]
    pub const fn tag_word(self) -> u32 {
        (self.bits >> 32) as u32
    }

    /// Low 32 bits (split-register payload word)
    #[inline]
    pub const fn payload_word(self) -> u32 {
        self.bits as u32
    }

    /// Check if value is an int32
    #[inline]
    pub const fn is_int32(self) -> bool {
        (self.bits & INT32_TAG_MASK) == TAG_INT32
    }

    /// Check if value is an unboxed double (canonical NaN excluded)
    #[inline]
    pub const fn is_double(self) -> bool {
        (self.bits & QUIET_NAN) != QUIET_NAN
    }

    /// Check if value is any number representation
    #[inline]
    pub const fn is_number(self) -> bool {
        self.is_int32() || self.is_double() || self.bits == TAG_NAN
    }

    /// Check if value is `-0.0`
    #[inline]
    pub const fn is_negative_zero(self) -> bool {
        self.bits == NEG_ZERO_BITS
    }

    /// Check if value is a cell pointer
    #[inline]
    pub const fn is_cell(self) -> bool {
        (self.bits & TAG_MASK) == TAG_POINTER
    }

    /// Get the int32 payload if this is an int32
    #[inline]
    pub const fn as_int32(self) -> Option<i32> {
        if self.is_int32() {
            Some(self.bits as u32 as i32)
        } else {
            None
        }
    }

    /// Get the numeric value if this is a number
    pub fn as_number(self) -> Option<f64> {
        if let Some(n) = self.as_int32() {
            Some(n as f64)
        } else if self.is_double() {
            Some(f64::from_bits(self.bits))
        } else if self.bits == TAG_NAN {
            Some(f64::NAN)
        } else {
            None
        }
    }
}

impl Default for JsValue {
    fn default() -> Self {
        Self::undefined()
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        Self::int32(n)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        Self::number(n)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        Self::boolean(b)
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bits {
            TAG_UNDEFINED => f.write_str("undefined"),
            TAG_NULL => f.write_str("null"),
            TAG_TRUE => f.write_str("true"),
            TAG_FALSE => f.write_str("false"),
            TAG_NAN => f.write_str("NaN"),
            _ if self.is_int32() => write!(f, "{}", self.bits as u32 as i32),
            _ if self.is_double() => write!(f, "{:?}", f64::from_bits(self.bits)),
            _ if self.is_cell() => write!(f, "cell({:#x})", self.bits & PAYLOAD_MASK),
            _ => write!(f, "JsValue({:#018x})", self.bits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_box_as_int32() {
        assert_eq!(JsValue::number(42.0), JsValue::int32(42));
        assert_eq!(JsValue::number(0.0), JsValue::int32(0));
        assert!(JsValue::number(-0.0).is_negative_zero());
        assert!(JsValue::number(1.5).is_double());
        assert!(JsValue::number(f64::NAN).is_number());
        assert!(!JsValue::number(f64::NAN).is_double());
    }

    #[test]
    fn no_observed_value_encodes_as_empty() {
        for value in [
            JsValue::undefined(),
            JsValue::null(),
            JsValue::boolean(false),
            JsValue::int32(0),
            JsValue::number(0.0),
            JsValue::number(-0.0),
            JsValue::number(f64::NAN),
        ] {
            assert_ne!(value.encode(), EMPTY_VALUE, "{value:?}");
        }
    }

    #[test]
    fn raw_positive_zero_normalises_to_int32() {
        let value = JsValue::from_encoded(0.0_f64.to_bits() as i64);
        assert_eq!(value, JsValue::int32(0));
        assert_ne!(value.encode(), EMPTY_VALUE);
    }

    #[test]
    fn split_words_reassemble() {
        let value = JsValue::int32(-7);
        assert_eq!(value.tag_word(), (TAG_INT32 >> 32) as u32);
        assert_eq!(value.payload_word(), -7_i32 as u32);
        let joined = ((value.tag_word() as u64) << 32) | value.payload_word() as u64;
        assert_eq!(JsValue::from_encoded(joined as i64), value);
    }

    #[test]
    fn cells_are_not_numbers() {
        let slot = 0_u64;
        let value = JsValue::cell(&slot as *const u64);
        assert!(value.is_cell());
        assert!(!value.is_number());
        assert_eq!(value.as_number(), None);
    }
}
