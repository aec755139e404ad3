//! Arithmetic profiles
//!
//! Arithmetic instructions carry their own profile instead of a value bucket.
//! The profile accumulates which result shapes were seen (int32 overflow,
//! doubles, negative zero, non-numbers) and, for the interpreter, which
//! operand types flowed in. Flags only ever get set.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::value::JsValue;

/// Result shapes observed by an arithmetic profile.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObservedResults(u32);

impl ObservedResults {
    /// Nothing but int32 results
    pub const NONE: Self = Self(0);
    /// Result left the int32 range
    pub const INT32_OVERFLOW: Self = Self(1 << 0);
    /// Double result other than `-0.0`
    pub const NON_NEG_ZERO_DOUBLE: Self = Self(1 << 1);
    /// `-0.0` result
    pub const NEG_ZERO_DOUBLE: Self = Self(1 << 2);
    /// Result was not a number
    pub const NON_NUMERIC: Self = Self(1 << 3);

    /// Raw flag bits
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Rebuild from raw bits, dropping unknown flags
    #[inline]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & 0b1111)
    }

    /// Check whether every flag in `other` is set
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check whether no flag is set
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Flags a single result contributes.
    ///
    /// Int32 results contribute nothing; generated instrumentation must
    /// compute the same flags.
    pub fn classify(value: JsValue) -> Self {
        if value.is_int32() {
            Self::NONE
        } else if value.is_number() {
            if value.is_negative_zero() {
                Self::INT32_OVERFLOW | Self::NEG_ZERO_DOUBLE
            } else {
                Self::INT32_OVERFLOW | Self::NON_NEG_ZERO_DOUBLE
            }
        } else {
            Self::NON_NUMERIC
        }
    }
}

impl BitOr for ObservedResults {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ObservedResults {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ObservedResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::INT32_OVERFLOW, "Int32Overflow"),
            (Self::NON_NEG_ZERO_DOUBLE, "NonNegZeroDouble"),
            (Self::NEG_ZERO_DOUBLE, "NegZeroDouble"),
            (Self::NON_NUMERIC, "NonNumeric"),
        ];
        let mut list = f.debug_set();
        for (flag, name) in names {
            if self.contains(flag) {
                list.entry(&format_args!("{name}"));
            }
        }
        list.finish()
    }
}

/// Operand types observed by an arithmetic profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObservedType(u8);

impl ObservedType {
    /// Nothing observed
    pub const EMPTY: Self = Self(0);
    /// Int32 operand
    pub const INT32: Self = Self(1 << 0);
    /// Non-int32 number operand
    pub const NUMBER: Self = Self(1 << 1);
    /// Non-number operand
    pub const NON_NUMBER: Self = Self(1 << 2);

    /// Flag for a single operand value
    pub fn of(value: JsValue) -> Self {
        if value.is_int32() {
            Self::INT32
        } else if value.is_number() {
            Self::NUMBER
        } else {
            Self::NON_NUMBER
        }
    }

    /// Raw flag bits
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check whether every flag in `other` is set
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check whether only int32 operands were seen
    #[inline]
    pub const fn is_only_int32(self) -> bool {
        self.0 == Self::INT32.0
    }

    /// Check whether only numbers were seen
    #[inline]
    pub const fn is_only_number(self) -> bool {
        self.0 != 0 && self.0 & Self::NON_NUMBER.0 == 0
    }
}

impl BitOr for ObservedType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Default)]
struct ResultFlags(AtomicU32);

impl ResultFlags {
    fn observe(&self, value: JsValue) {
        let flags = ObservedResults::classify(value);
        if !flags.is_empty() {
            self.0.fetch_or(flags.bits(), Ordering::Relaxed);
        }
    }

    fn load(&self) -> ObservedResults {
        ObservedResults::from_bits_truncate(self.0.load(Ordering::Relaxed))
    }

    fn as_ptr(&self) -> *mut u32 {
        self.0.as_ptr()
    }
}

fn observe_type(slot: &AtomicU8, value: JsValue) {
    slot.fetch_or(ObservedType::of(value).bits(), Ordering::Relaxed);
}

fn load_type(slot: &AtomicU8) -> ObservedType {
    ObservedType(slot.load(Ordering::Relaxed))
}

/// Profile embedded in a unary arithmetic instruction (negate, increment, ...)
#[derive(Default)]
pub struct UnaryArithProfile {
    results: ResultFlags,
    arg_type: AtomicU8,
}

impl UnaryArithProfile {
    /// Create an empty profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an instruction result
    #[inline]
    pub fn observe_result(&self, value: JsValue) {
        self.results.observe(value);
    }

    /// Record the argument value
    #[inline]
    pub fn observe_arg(&self, value: JsValue) {
        observe_type(&self.arg_type, value);
    }

    /// Result shapes seen so far
    pub fn observed_results(&self) -> ObservedResults {
        self.results.load()
    }

    /// Argument types seen so far
    pub fn arg_observed_type(&self) -> ObservedType {
        load_type(&self.arg_type)
    }

    /// Address of the result flag word, for generated code
    #[inline]
    pub fn results_ptr(&self) -> *mut u32 {
        self.results.as_ptr()
    }
}

impl fmt::Debug for UnaryArithProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryArithProfile")
            .field("results", &self.observed_results())
            .field("arg", &self.arg_observed_type())
            .finish()
    }
}

/// Profile embedded in a binary arithmetic instruction (add, sub, mul, ...)
#[derive(Default)]
pub struct BinaryArithProfile {
    results: ResultFlags,
    lhs_type: AtomicU8,
    rhs_type: AtomicU8,
}

impl BinaryArithProfile {
    /// Create an empty profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an instruction result
    #[inline]
    pub fn observe_result(&self, value: JsValue) {
        self.results.observe(value);
    }

    /// Record both operand values
    pub fn observe_lhs_and_rhs(&self, lhs: JsValue, rhs: JsValue) {
        observe_type(&self.lhs_type, lhs);
        observe_type(&self.rhs_type, rhs);
    }

    /// Result shapes seen so far
    pub fn observed_results(&self) -> ObservedResults {
        self.results.load()
    }

    /// Left operand types seen so far
    pub fn lhs_observed_type(&self) -> ObservedType {
        load_type(&self.lhs_type)
    }

    /// Right operand types seen so far
    pub fn rhs_observed_type(&self) -> ObservedType {
        load_type(&self.rhs_type)
    }

    /// Address of the result flag word, for generated code
    #[inline]
    pub fn results_ptr(&self) -> *mut u32 {
        self.results.as_ptr()
    }
}

impl fmt::Debug for BinaryArithProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryArithProfile")
            .field("results", &self.observed_results())
            .field("lhs", &self.lhs_observed_type())
            .field("rhs", &self.rhs_observed_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_result_shapes() {
        assert_eq!(ObservedResults::classify(JsValue::int32(7)), ObservedResults::NONE);
        assert_eq!(
            ObservedResults::classify(JsValue::number(2.5)),
            ObservedResults::INT32_OVERFLOW | ObservedResults::NON_NEG_ZERO_DOUBLE
        );
        assert_eq!(
            ObservedResults::classify(JsValue::number(-0.0)),
            ObservedResults::INT32_OVERFLOW | ObservedResults::NEG_ZERO_DOUBLE
        );
        assert_eq!(
            ObservedResults::classify(JsValue::number(f64::NAN)),
            ObservedResults::INT32_OVERFLOW | ObservedResults::NON_NEG_ZERO_DOUBLE
        );
        assert_eq!(
            ObservedResults::classify(JsValue::undefined()),
            ObservedResults::NON_NUMERIC
        );
    }

    #[test]
    fn results_accumulate() {
        let profile = BinaryArithProfile::new();
        profile.observe_result(JsValue::int32(1));
        assert!(profile.observed_results().is_empty());
        profile.observe_result(JsValue::number(0.5));
        profile.observe_result(JsValue::null());
        let results = profile.observed_results();
        assert!(results.contains(ObservedResults::NON_NEG_ZERO_DOUBLE));
        assert!(results.contains(ObservedResults::NON_NUMERIC));
        assert!(!results.contains(ObservedResults::NEG_ZERO_DOUBLE));
    }

    #[test]
    fn operand_types_accumulate() {
        let profile = BinaryArithProfile::new();
        profile.observe_lhs_and_rhs(JsValue::int32(1), JsValue::number(1.5));
        assert!(profile.lhs_observed_type().is_only_int32());
        assert!(profile.rhs_observed_type().is_only_number());
        profile.observe_lhs_and_rhs(JsValue::boolean(true), JsValue::int32(2));
        assert!(!profile.lhs_observed_type().is_only_number());
        assert!(profile.rhs_observed_type().contains(ObservedType::INT32));

        let unary = UnaryArithProfile::new();
        assert_eq!(unary.arg_observed_type(), ObservedType::EMPTY);
        unary.observe_arg(JsValue::number(3.25));
        assert_eq!(unary.arg_observed_type(), ObservedType::NUMBER);
    }

    #[test]
    fn debug_lists_flags() {
        let profile = UnaryArithProfile::new();
        profile.observe_result(JsValue::number(-0.0));
        let text = format!("{profile:?}");
        assert!(text.contains("NegZeroDouble"), "{text}");
        assert!(text.contains("Int32Overflow"), "{text}");
    }
}
