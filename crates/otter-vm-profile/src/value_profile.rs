//! Value profiles
//!
//! A value profile holds the last value observed where a speculation failed.
//! There is exactly one bucket and writes are last-write-wins: the interpreter
//! and JIT-emitted stores race freely and no ordering is promised between them.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::value::{EMPTY_VALUE, EncodedJsValue, JsValue};

/// Number of buckets in every value profile.
pub const VALUE_PROFILE_BUCKETS: usize = 1;

/// One recorded value slot.
///
/// Generated code stores plain 64-bit words to [`ProfileBucket::as_ptr`];
/// runtime writes use relaxed atomics on the same word.
#[repr(transparent)]
pub struct ProfileBucket(AtomicI64);

impl ProfileBucket {
    /// Create an empty bucket
    pub const fn new() -> Self {
        Self(AtomicI64::new(EMPTY_VALUE))
    }

    /// Overwrite the bucket with an encoded value
    #[inline]
    pub fn store(&self, encoded: EncodedJsValue) {
        self.0.store(encoded, Ordering::Relaxed);
    }

    /// Read the encoded contents
    #[inline]
    pub fn load(&self) -> EncodedJsValue {
        self.0.load(Ordering::Relaxed)
    }

    /// Stable address of the bucket word, for generated stores
    #[inline]
    pub fn as_ptr(&self) -> *mut EncodedJsValue {
        self.0.as_ptr()
    }
}

impl Default for ProfileBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProfileBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.load() {
            EMPTY_VALUE => f.write_str("<empty>"),
            encoded => write!(f, "{:?}", JsValue::from_encoded(encoded)),
        }
    }
}

/// A single-bucket value profile.
///
/// Owned by a [`crate::CodeBlock`], either allocated with it or created lazily
/// in its [`crate::LazyOperandValueProfileStore`]. It never moves after
/// allocation.
#[derive(Debug, Default)]
pub struct ValueProfile {
    buckets: [ProfileBucket; VALUE_PROFILE_BUCKETS],
}

impl ValueProfile {
    /// Create a profile with empty buckets
    pub const fn new() -> Self {
        Self {
            buckets: [ProfileBucket::new()],
        }
    }

    /// Number of buckets
    #[inline]
    pub const fn number_of_samples(&self) -> usize {
        VALUE_PROFILE_BUCKETS
    }

    /// Bucket that speculation failures are written to.
    ///
    /// Panics if `index` is out of range.
    #[inline]
    pub fn spec_fail_bucket(&self, index: usize) -> &ProfileBucket {
        &self.buckets[index]
    }

    /// Record a value in bucket 0
    #[inline]
    pub fn record(&self, value: JsValue) {
        self.buckets[0].store(value.encode());
    }

    /// Decode bucket 0, `None` if nothing was recorded
    pub fn read_bucket(&self) -> Option<JsValue> {
        match self.buckets[0].load() {
            EMPTY_VALUE => None,
            encoded => Some(JsValue::from_encoded(encoded)),
        }
    }

    /// Check whether every bucket is empty
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.load() == EMPTY_VALUE)
    }

    /// Reset every bucket to empty
    pub fn clear(&self) {
        for bucket in &self.buckets {
            bucket.store(EMPTY_VALUE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_profile_is_empty() {
        let profile = ValueProfile::new();
        assert!(profile.is_empty());
        assert_eq!(profile.read_bucket(), None);
        assert_eq!(profile.number_of_samples(), 1);
    }

    #[test]
    fn record_overwrites_bucket_zero() {
        let profile = ValueProfile::new();
        profile.record(JsValue::int32(42));
        assert_eq!(profile.read_bucket(), Some(JsValue::int32(42)));
        profile.record(JsValue::int32(43));
        assert_eq!(profile.read_bucket(), Some(JsValue::int32(43)));
        assert_eq!(
            profile.spec_fail_bucket(0).load(),
            JsValue::int32(43).encode()
        );
    }

    #[test]
    fn recorded_raw_zero_is_not_empty() {
        let profile = ValueProfile::new();
        profile.record(JsValue::from_encoded(0));
        assert!(!profile.is_empty());
        assert_eq!(profile.read_bucket(), Some(JsValue::int32(0)));
    }

    #[test]
    fn clear_resets_buckets() {
        let profile = ValueProfile::new();
        profile.record(JsValue::null());
        assert!(!profile.is_empty());
        profile.clear();
        assert!(profile.is_empty());
    }

    #[test]
    fn bucket_pointer_aliases_bucket() {
        let profile = ValueProfile::new();
        let bucket = profile.spec_fail_bucket(0);
        assert_eq!(
            bucket.as_ptr() as *const i64,
            bucket as *const ProfileBucket as *const i64
        );
    }
}
