//! Value locations and tag checks for profile instrumentation.
//!
//! A JS value reaches the emitter either as one boxed `i64` or as a pair of
//! `i32` words (tag, payload) on targets that split values across two
//! registers. Stores into a bucket lay the words out so the bucket reads back
//! the same 64-bit encoding either way.

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{InstBuilder, MemFlags, Value, types};
use cranelift_frontend::{FunctionBuilder, Variable};
use otter_vm_profile::value::{INT32_TAG_MASK, QUIET_NAN, TAG_INT32};

/// Byte offset of the payload word inside an encoded value.
const PAYLOAD_OFFSET: i32 = if cfg!(target_endian = "little") { 0 } else { 4 };

/// Byte offset of the tag word inside an encoded value.
const TAG_OFFSET: i32 = if cfg!(target_endian = "little") { 4 } else { 0 };

/// Where the value being reported lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsValueRegs {
    /// Tag and payload combined in one `i64`.
    Boxed(Value),
    /// Tag word and payload word in separate `i32` values.
    Split {
        /// High 32 bits of the encoding
        tag: Value,
        /// Low 32 bits of the encoding
        payload: Value,
    },
}

impl JsValueRegs {
    /// Produce the combined `i64` encoding.
    pub fn to_boxed(self, builder: &mut FunctionBuilder) -> Value {
        match self {
            Self::Boxed(value) => value,
            Self::Split { tag, payload } => {
                let high = builder.ins().uextend(types::I64, tag);
                let high = builder.ins().ishl_imm(high, 32);
                let low = builder.ins().uextend(types::I64, payload);
                builder.ins().bor(high, low)
            }
        }
    }
}

/// Tag constants already held in SSA values by the surrounding code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRegisters {
    /// `TAG_INT32`
    pub int32_tag: Value,
    /// Mask isolating the int32 tag word
    pub int32_tag_mask: Value,
}

impl TagRegisters {
    /// Materialize the tag constants once, for reuse by several emitters.
    pub fn materialize(builder: &mut FunctionBuilder) -> Self {
        Self {
            int32_tag: builder.ins().iconst(types::I64, TAG_INT32 as i64),
            int32_tag_mask: builder.ins().iconst(types::I64, INT32_TAG_MASK as i64),
        }
    }
}

/// Whether the emitter may use pinned tag constants or must build its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRegistersMode {
    /// Tag constants are available
    HaveTagRegisters(TagRegisters),
    /// Tag constants must be materialized at each use
    DoNotHaveTagRegisters,
}

impl TagRegistersMode {
    fn int32_tag_and_mask(self, builder: &mut FunctionBuilder) -> (Value, Value) {
        match self {
            Self::HaveTagRegisters(regs) => (regs.int32_tag, regs.int32_tag_mask),
            Self::DoNotHaveTagRegisters => {
                let regs = TagRegisters::materialize(builder);
                (regs.int32_tag, regs.int32_tag_mask)
            }
        }
    }
}

/// Register the emitter may clobber; holds profile addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchRegister(Variable);

impl ScratchRegister {
    /// Declare a fresh `i64` scratch variable in the function being built.
    pub fn declare(builder: &mut FunctionBuilder) -> Self {
        Self(builder.declare_var(types::I64))
    }

    /// Wrap an existing `i64` variable.
    pub fn from_variable(var: Variable) -> Self {
        Self(var)
    }

    /// Load an absolute address into the scratch register and return it.
    pub(crate) fn load_address<T>(self, builder: &mut FunctionBuilder, ptr: *const T) -> Value {
        let address = builder.ins().iconst(types::I64, ptr as usize as i64);
        builder.def_var(self.0, address);
        builder.use_var(self.0)
    }
}

/// Emit: store the value at `address`, producing its 64-bit encoding in memory.
pub(crate) fn emit_store_value(builder: &mut FunctionBuilder, regs: JsValueRegs, address: Value) {
    let flags = MemFlags::trusted();
    match regs {
        JsValueRegs::Boxed(value) => {
            builder.ins().store(flags, value, address, 0);
        }
        JsValueRegs::Split { tag, payload } => {
            builder.ins().store(flags, payload, address, PAYLOAD_OFFSET);
            builder.ins().store(flags, tag, address, TAG_OFFSET);
        }
    }
}

/// Emit: is this boxed value an int32?
///
/// Returns a Cranelift `i8` value (0 or 1).
pub(crate) fn emit_is_int32(
    builder: &mut FunctionBuilder,
    value: Value,
    mode: TagRegistersMode,
) -> Value {
    let (tag, mask) = mode.int32_tag_and_mask(builder);
    let masked = builder.ins().band(value, mask);
    builder.ins().icmp(IntCC::Equal, masked, tag)
}

/// Emit: is this boxed value a raw f64 (not a NaN-boxed tag)?
///
/// Returns a Cranelift `i8` value (0 or 1).
pub(crate) fn emit_is_double(builder: &mut FunctionBuilder, value: Value) -> Value {
    let mask = builder.ins().iconst(types::I64, QUIET_NAN as i64);
    let tag = builder.ins().band(value, mask);
    builder.ins().icmp(IntCC::NotEqual, tag, mask)
}
