//! Profile-address descriptors.
//!
//! A [`ValueProfileSite`] says how to reach the profile for one program point
//! without owning it: a profile that already exists, a lazily created operand
//! profile identified by `(code block, key)`, or an arithmetic profile. It is
//! `Copy`, so the compiler can capture it while lowering and the runtime can
//! use the same value much later.
//!
//! # Two epochs, one address
//!
//! ```text
//! ValueProfileSite ──resolve──┬─ bucket 0 of a ValueProfile
//!                             └─ flag word of an arith profile
//!
//!   emit_report_value: append IR that writes there when executed
//!   report_value:      write there now
//! ```

use std::fmt;

use cranelift_frontend::FunctionBuilder;
use otter_vm_profile::{
    BinaryArithProfile, BytecodeIndex, CodeBlock, JsValue, LazyOperandValueProfileKey, Operand,
    ProfileBucket, ProfilingConfig, UnaryArithProfile, ValueProfile, profile_event,
};

use crate::arith_profile;
use crate::value_regs::{self, JsValueRegs, ScratchRegister, TagRegistersMode};

/// How to get at the value profile of one site.
#[derive(Clone, Copy, Default)]
pub enum ValueProfileSite<'a> {
    /// No profile for this site; reporting is a no-op.
    #[default]
    None,
    /// A profile that already exists.
    Ready(&'a ValueProfile),
    /// A profile created on first use in the code block's lazy operand store.
    LazyOperand {
        /// Owner of the store
        code_block: &'a CodeBlock,
        /// Site within the code block
        key: LazyOperandValueProfileKey,
    },
    /// Profile embedded in a unary arithmetic instruction.
    UnaryArithReady(&'a UnaryArithProfile),
    /// Profile embedded in a binary arithmetic instruction.
    BinaryArithReady(&'a BinaryArithProfile),
}

/// Where a report lands once the site is resolved.
enum ReportTarget<'a> {
    Nothing,
    Bucket(&'a ProfileBucket),
    UnaryArith(&'a UnaryArithProfile),
    BinaryArith(&'a BinaryArithProfile),
}

impl<'a> ValueProfileSite<'a> {
    /// Site with no profile
    pub const fn none() -> Self {
        Self::None
    }

    /// Site backed by an existing value profile
    pub const fn from_value_profile(profile: &'a ValueProfile) -> Self {
        Self::Ready(profile)
    }

    /// Site backed by a lazily created operand profile.
    ///
    /// Does not touch the store; the profile is created on first report.
    pub const fn from_lazy_operand(
        code_block: &'a CodeBlock,
        key: LazyOperandValueProfileKey,
    ) -> Self {
        Self::LazyOperand { code_block, key }
    }

    /// Site backed by a unary arithmetic profile
    pub const fn from_unary_arith_profile(profile: &'a UnaryArithProfile) -> Self {
        Self::UnaryArithReady(profile)
    }

    /// Site backed by a binary arithmetic profile
    pub const fn from_binary_arith_profile(profile: &'a BinaryArithProfile) -> Self {
        Self::BinaryArithReady(profile)
    }

    /// Whether reporting to this site records anything
    pub const fn is_set(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Pick the site for an instruction of `code_block`.
    ///
    /// A requested operand always gets a lazy operand profile. Otherwise the
    /// instruction's own value profile wins over its arithmetic profiles.
    pub fn for_bytecode(
        code_block: &'a CodeBlock,
        index: BytecodeIndex,
        operand: Option<Operand>,
    ) -> Self {
        Self::for_bytecode_with_config(ProfilingConfig::global(), code_block, index, operand)
    }

    /// [`Self::for_bytecode`] with explicit switches
    pub fn for_bytecode_with_config(
        config: &ProfilingConfig,
        code_block: &'a CodeBlock,
        index: BytecodeIndex,
        operand: Option<Operand>,
    ) -> Self {
        if !config.value_profiling_enabled {
            return Self::None;
        }

        if let Some(operand) = operand {
            return Self::from_lazy_operand(
                code_block,
                LazyOperandValueProfileKey::new(index, operand),
            );
        }

        if let Some(profile) = code_block.value_profile_for_bytecode_index(index) {
            Self::Ready(profile)
        } else if let Some(profile) = code_block.binary_arith_profile_for_bytecode_index(index) {
            Self::BinaryArithReady(profile)
        } else if let Some(profile) = code_block.unary_arith_profile_for_bytecode_index(index) {
            Self::UnaryArithReady(profile)
        } else {
            Self::None
        }
    }

    /// Resolve to the report target, creating a lazy operand profile if needed.
    ///
    /// The code block's profile lock is held only inside `get_or_create`.
    fn resolve(self, config: &ProfilingConfig) -> ReportTarget<'a> {
        match self {
            Self::None => ReportTarget::Nothing,
            Self::Ready(profile) => ReportTarget::Bucket(profile.spec_fail_bucket(0)),
            Self::LazyOperand { code_block, key } => {
                let profile = code_block
                    .lazy_operand_value_profiles()
                    .get_or_create_with_config(key, config);
                ReportTarget::Bucket(profile.spec_fail_bucket(0))
            }
            Self::UnaryArithReady(profile) => ReportTarget::UnaryArith(profile),
            Self::BinaryArithReady(profile) => ReportTarget::BinaryArith(profile),
        }
    }

    /// Append IR that records the value in `regs` into this site's profile.
    ///
    /// Lazy operand profiles are created now, at compile time, so the emitted
    /// store targets a fixed address.
    pub fn emit_report_value(
        &self,
        builder: &mut FunctionBuilder,
        regs: JsValueRegs,
        scratch: ScratchRegister,
        mode: TagRegistersMode,
    ) {
        let config = ProfilingConfig::global();
        match self.resolve(config) {
            ReportTarget::Nothing => {}
            ReportTarget::Bucket(bucket) => {
                profile_event!(config, site = ?self, "emitting value profile store");
                let address = scratch.load_address(builder, bucket.as_ptr() as *const i64);
                value_regs::emit_store_value(builder, regs, address);
            }
            ReportTarget::UnaryArith(profile) => {
                profile_event!(config, site = ?self, "emitting arith profile observation");
                arith_profile::emit_observe_unary_result(builder, profile, regs, scratch, mode);
            }
            ReportTarget::BinaryArith(profile) => {
                profile_event!(config, site = ?self, "emitting arith profile observation");
                arith_profile::emit_observe_binary_result(builder, profile, regs, scratch, mode);
            }
        }
    }

    /// Record `value` into this site's profile immediately.
    pub fn report_value(&self, value: JsValue) {
        match self.resolve(ProfilingConfig::global()) {
            ReportTarget::Nothing => {}
            ReportTarget::Bucket(bucket) => bucket.store(value.encode()),
            ReportTarget::UnaryArith(profile) => profile.observe_result(value),
            ReportTarget::BinaryArith(profile) => profile.observe_result(value),
        }
    }
}

impl fmt::Debug for ValueProfileSite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Ready(profile) => write!(f, "Ready({:p})", *profile),
            Self::LazyOperand { code_block, key } => {
                write!(f, "LazyOperand({}, {key:?})", code_block.display_name())
            }
            Self::UnaryArithReady(profile) => write!(f, "UnaryArithReady({:p})", *profile),
            Self::BinaryArithReady(profile) => write!(f, "BinaryArithReady({:p})", *profile),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_vm_profile::ObservedResults;

    fn site_key(offset: u32, operand: &str) -> LazyOperandValueProfileKey {
        LazyOperandValueProfileKey::new(BytecodeIndex::new(offset), operand.parse().unwrap())
    }

    #[test]
    fn from_lazy_operand_does_not_allocate() {
        let code_block = CodeBlock::builder().name("f").build();
        let site = ValueProfileSite::from_lazy_operand(&code_block, site_key(10, "arg0"));
        assert!(site.is_set());
        assert!(code_block.lazy_operand_value_profiles().is_empty());
        assert_eq!(format!("{site:?}"), "LazyOperand(f, bc#10:arg0)");
    }

    #[test]
    fn lazy_operand_report_creates_then_overwrites() {
        let code_block = CodeBlock::builder().name("F").build();
        let key = site_key(10, "arg0");

        ValueProfileSite::from_lazy_operand(&code_block, key).report_value(JsValue::int32(42));
        let store = code_block.lazy_operand_value_profiles();
        assert_eq!(store.get(key).unwrap().read_bucket(), Some(JsValue::int32(42)));

        ValueProfileSite::from_lazy_operand(&code_block, key).report_value(JsValue::int32(43));
        assert_eq!(store.get(key).unwrap().read_bucket(), Some(JsValue::int32(43)));
        assert_eq!(store.created_count(), 1);
    }

    #[test]
    fn none_reports_nothing() {
        let site = ValueProfileSite::none();
        assert!(!site.is_set());
        site.report_value(JsValue::int32(1));
        assert!(matches!(ValueProfileSite::default(), ValueProfileSite::None));
    }

    #[test]
    fn ready_report_writes_bucket_zero() {
        let profile = ValueProfile::new();
        ValueProfileSite::from_value_profile(&profile).report_value(JsValue::boolean(true));
        assert_eq!(profile.read_bucket(), Some(JsValue::boolean(true)));
    }

    #[test]
    fn arith_report_classifies() {
        let unary = UnaryArithProfile::new();
        let binary = BinaryArithProfile::new();
        ValueProfileSite::from_unary_arith_profile(&unary).report_value(JsValue::number(-0.0));
        ValueProfileSite::from_binary_arith_profile(&binary).report_value(JsValue::null());
        assert!(unary
            .observed_results()
            .contains(ObservedResults::NEG_ZERO_DOUBLE));
        assert!(binary
            .observed_results()
            .contains(ObservedResults::NON_NUMERIC));
    }

    #[test]
    fn selection_order() {
        let code_block = CodeBlock::builder()
            .value_profile(1)
            .binary_arith_profile(1)
            .binary_arith_profile(2)
            .unary_arith_profile(2)
            .unary_arith_profile(3)
            .build();
        let config = ProfilingConfig::default();
        let pick = |offset, operand| {
            ValueProfileSite::for_bytecode_with_config(
                &config,
                &code_block,
                BytecodeIndex::new(offset),
                operand,
            )
        };

        assert!(matches!(pick(1, None), ValueProfileSite::Ready(_)));
        assert!(matches!(pick(2, None), ValueProfileSite::BinaryArithReady(_)));
        assert!(matches!(pick(3, None), ValueProfileSite::UnaryArithReady(_)));
        assert!(matches!(pick(4, None), ValueProfileSite::None));
        assert!(matches!(
            pick(1, Some(Operand::local(0))),
            ValueProfileSite::LazyOperand { .. }
        ));

        let disabled = ValueProfileSite::for_bytecode_with_config(
            &ProfilingConfig::disabled(),
            &code_block,
            BytecodeIndex::new(1),
            Some(Operand::local(0)),
        );
        assert!(!disabled.is_set());
    }
}
