//! Per-function profile metadata
//!
//! A [`CodeBlock`] owns every profile of one function: value profiles and
//! arithmetic profiles allocated up front for specific instructions, and the
//! store of lazily created operand profiles. Profiles are addressed by
//! bytecode index and never move; the whole set is dropped together with the
//! code block.

use rustc_hash::FxHashMap;

use crate::arith_profile::{BinaryArithProfile, UnaryArithProfile};
use crate::lazy_operand::LazyOperandValueProfileStore;
use crate::operand::BytecodeIndex;
use crate::value_profile::ValueProfile;

/// Profile metadata for one function.
#[derive(Debug)]
pub struct CodeBlock {
    /// Function name (empty for anonymous)
    pub name: Option<String>,

    value_profiles: FxHashMap<BytecodeIndex, ValueProfile>,
    unary_arith_profiles: FxHashMap<BytecodeIndex, UnaryArithProfile>,
    binary_arith_profiles: FxHashMap<BytecodeIndex, BinaryArithProfile>,
    lazy_operand_value_profiles: LazyOperandValueProfileStore,
}

impl CodeBlock {
    /// Create a new code block builder
    pub fn builder() -> CodeBlockBuilder {
        CodeBlockBuilder::new()
    }

    /// Get the function name or `<anonymous>`
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Value profile allocated for the instruction at `index`
    pub fn value_profile_for_bytecode_index(&self, index: BytecodeIndex) -> Option<&ValueProfile> {
        self.value_profiles.get(&index)
    }

    /// Unary arithmetic profile of the instruction at `index`
    pub fn unary_arith_profile_for_bytecode_index(
        &self,
        index: BytecodeIndex,
    ) -> Option<&UnaryArithProfile> {
        self.unary_arith_profiles.get(&index)
    }

    /// Binary arithmetic profile of the instruction at `index`
    pub fn binary_arith_profile_for_bytecode_index(
        &self,
        index: BytecodeIndex,
    ) -> Option<&BinaryArithProfile> {
        self.binary_arith_profiles.get(&index)
    }

    /// Store of lazily created operand profiles.
    ///
    /// Its lock is this code block's profile lock.
    #[inline]
    pub fn lazy_operand_value_profiles(&self) -> &LazyOperandValueProfileStore {
        &self.lazy_operand_value_profiles
    }

    /// Number of value profiles allocated up front
    pub fn value_profile_count(&self) -> usize {
        self.value_profiles.len()
    }
}

/// Builder for creating code blocks
#[derive(Debug, Default)]
pub struct CodeBlockBuilder {
    name: Option<String>,
    value_profiles: Vec<BytecodeIndex>,
    unary_arith_profiles: Vec<BytecodeIndex>,
    binary_arith_profiles: Vec<BytecodeIndex>,
}

impl CodeBlockBuilder {
    /// Create a new code block builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set function name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Allocate a value profile for the instruction at `offset`
    pub fn value_profile(mut self, offset: u32) -> Self {
        self.value_profiles.push(BytecodeIndex::new(offset));
        self
    }

    /// Allocate a unary arithmetic profile for the instruction at `offset`
    pub fn unary_arith_profile(mut self, offset: u32) -> Self {
        self.unary_arith_profiles.push(BytecodeIndex::new(offset));
        self
    }

    /// Allocate a binary arithmetic profile for the instruction at `offset`
    pub fn binary_arith_profile(mut self, offset: u32) -> Self {
        self.binary_arith_profiles.push(BytecodeIndex::new(offset));
        self
    }

    /// Build the code block
    pub fn build(self) -> CodeBlock {
        CodeBlock {
            name: self.name,
            value_profiles: self
                .value_profiles
                .into_iter()
                .map(|index| (index, ValueProfile::new()))
                .collect(),
            unary_arith_profiles: self
                .unary_arith_profiles
                .into_iter()
                .map(|index| (index, UnaryArithProfile::new()))
                .collect(),
            binary_arith_profiles: self
                .binary_arith_profiles
                .into_iter()
                .map(|index| (index, BinaryArithProfile::new()))
                .collect(),
            lazy_operand_value_profiles: LazyOperandValueProfileStore::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_block_builder() {
        let code_block = CodeBlock::builder()
            .name("add")
            .value_profile(3)
            .value_profile(3)
            .binary_arith_profile(5)
            .unary_arith_profile(8)
            .build();

        assert_eq!(code_block.display_name(), "add");
        assert_eq!(code_block.value_profile_count(), 1);
        assert!(code_block.value_profile_for_bytecode_index(BytecodeIndex(3)).is_some());
        assert!(code_block.value_profile_for_bytecode_index(BytecodeIndex(5)).is_none());
        assert!(code_block.binary_arith_profile_for_bytecode_index(BytecodeIndex(5)).is_some());
        assert!(code_block.unary_arith_profile_for_bytecode_index(BytecodeIndex(8)).is_some());
        assert!(code_block.lazy_operand_value_profiles().is_empty());
    }

    #[test]
    fn test_anonymous_name() {
        let code_block = CodeBlock::builder().build();
        assert_eq!(code_block.display_name(), "<anonymous>");
    }
}
