//! Arithmetic profile instrumentation.
//!
//! Emits a branch-free classification of an arithmetic result and ORs the
//! resulting flags into the profile's flag word. The flags computed here must
//! equal [`ObservedResults::classify`] for every input.

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{InstBuilder, MemFlags, types};
use cranelift_frontend::FunctionBuilder;
use otter_vm_profile::value::{NEG_ZERO_BITS, TAG_NAN};
use otter_vm_profile::{BinaryArithProfile, ObservedResults, UnaryArithProfile};

use crate::value_regs::{self, JsValueRegs, ScratchRegister, TagRegistersMode};

/// Emit: record an arithmetic result into the flag word at `results`.
fn emit_observe_result_at(
    builder: &mut FunctionBuilder,
    results: *mut u32,
    regs: JsValueRegs,
    scratch: ScratchRegister,
    mode: TagRegistersMode,
) {
    let value = regs.to_boxed(builder);

    let is_int32 = value_regs::emit_is_int32(builder, value, mode);
    let is_double = value_regs::emit_is_double(builder, value);
    let is_nan = builder.ins().icmp_imm(IntCC::Equal, value, TAG_NAN as i64);
    let is_number = builder.ins().bor(is_double, is_nan);
    let is_neg_zero = builder
        .ins()
        .icmp_imm(IntCC::Equal, value, NEG_ZERO_BITS as i64);

    let neg_zero_flags = builder.ins().iconst(
        types::I32,
        (ObservedResults::INT32_OVERFLOW | ObservedResults::NEG_ZERO_DOUBLE).bits() as i64,
    );
    let double_flags = builder.ins().iconst(
        types::I32,
        (ObservedResults::INT32_OVERFLOW | ObservedResults::NON_NEG_ZERO_DOUBLE).bits() as i64,
    );
    let non_numeric_flags = builder
        .ins()
        .iconst(types::I32, ObservedResults::NON_NUMERIC.bits() as i64);
    let no_flags = builder.ins().iconst(types::I32, 0);

    let number_flags = builder.ins().select(is_neg_zero, neg_zero_flags, double_flags);
    let non_int32_flags = builder
        .ins()
        .select(is_number, number_flags, non_numeric_flags);
    let flags = builder.ins().select(is_int32, no_flags, non_int32_flags);

    let address = scratch.load_address(builder, results as *const u32);
    let mem = MemFlags::trusted();
    let previous = builder.ins().load(types::I32, mem, address, 0);
    let updated = builder.ins().bor(previous, flags);
    builder.ins().store(mem, updated, address, 0);
}

/// Emit: `profile.observe_result(value)` for a unary arithmetic instruction.
pub fn emit_observe_unary_result(
    builder: &mut FunctionBuilder,
    profile: &UnaryArithProfile,
    regs: JsValueRegs,
    scratch: ScratchRegister,
    mode: TagRegistersMode,
) {
    emit_observe_result_at(builder, profile.results_ptr(), regs, scratch, mode);
}

/// Emit: `profile.observe_result(value)` for a binary arithmetic instruction.
pub fn emit_observe_binary_result(
    builder: &mut FunctionBuilder,
    profile: &BinaryArithProfile,
    regs: JsValueRegs,
    scratch: ScratchRegister,
    mode: TagRegistersMode,
) {
    emit_observe_result_at(builder, profile.results_ptr(), regs, scratch, mode);
}
