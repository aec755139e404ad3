//! Lazy operand value profiles
//!
//! Some profile sites are not known when a code block is built: the optimizing
//! tier discovers that it wants feedback for a particular operand of a
//! particular instruction. Those profiles are created on first use and kept in
//! a per-code-block store keyed by `(bytecode index, operand)`.

use std::fmt;

use crate::concurrent_map::ConcurrentCreateOnceMap;
use crate::config::ProfilingConfig;
use crate::operand::{BytecodeIndex, Operand};
use crate::value::EncodedJsValue;
use crate::value_profile::ValueProfile;

/// Address of a lazily created value profile within one code block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LazyOperandValueProfileKey {
    bytecode_index: BytecodeIndex,
    operand: Operand,
}

impl LazyOperandValueProfileKey {
    /// Create a key
    #[inline]
    pub const fn new(bytecode_index: BytecodeIndex, operand: Operand) -> Self {
        Self {
            bytecode_index,
            operand,
        }
    }

    /// Instruction the operand belongs to
    #[inline]
    pub const fn bytecode_index(&self) -> BytecodeIndex {
        self.bytecode_index
    }

    /// Operand being profiled
    #[inline]
    pub const fn operand(&self) -> Operand {
        self.operand
    }
}

impl fmt::Debug for LazyOperandValueProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bytecode_index, self.operand)
    }
}

/// Per-code-block store of lazily created value profiles.
///
/// The store's lock guards only the key to profile mapping; once a profile is
/// handed out its bucket is written without locking.
#[derive(Default)]
pub struct LazyOperandValueProfileStore {
    profiles: ConcurrentCreateOnceMap<LazyOperandValueProfileKey, ValueProfile>,
}

impl LazyOperandValueProfileStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the profile for `key`, allocating it on first request.
    ///
    /// Every caller, on any thread, gets the same profile for the same key.
    pub fn get_or_create(&self, key: LazyOperandValueProfileKey) -> &ValueProfile {
        self.get_or_create_with_config(key, ProfilingConfig::global())
    }

    /// [`Self::get_or_create`] with explicit logging switches
    pub fn get_or_create_with_config(
        &self,
        key: LazyOperandValueProfileKey,
        config: &ProfilingConfig,
    ) -> &ValueProfile {
        let (profile, created) = self.profiles.get_or_create(key, ValueProfile::new);
        if created {
            crate::profile_event!(
                config,
                bytecode_index = key.bytecode_index().offset(),
                operand = %key.operand(),
                "created lazy operand value profile"
            );
        }
        profile
    }

    /// Return the profile for `key` if it was already created
    pub fn get(&self, key: LazyOperandValueProfileKey) -> Option<&ValueProfile> {
        self.profiles.get(&key)
    }

    /// Number of profiles in the store
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Check whether no profile has been created
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Number of profile allocations performed by this store
    pub fn created_count(&self) -> usize {
        self.profiles.created_count()
    }

    /// Bucket contents of every profile, sorted by key.
    ///
    /// Profiles that never recorded a value are skipped.
    pub fn snapshot(&self) -> Vec<(LazyOperandValueProfileKey, EncodedJsValue)> {
        let mut entries: Vec<_> = self
            .profiles
            .collect(|key, profile| (*key, profile.read_bucket()))
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value.encode())))
            .collect();
        entries.sort_unstable_by_key(|(key, _)| *key);
        entries
    }
}

impl fmt::Debug for LazyOperandValueProfileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyOperandValueProfileStore")
            .field("len", &self.len())
            .finish()
    }
}
