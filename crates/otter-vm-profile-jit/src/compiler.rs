//! Cranelift JIT for profile report stubs.
//!
//! A report stub is a native function whose whole body is the instrumentation
//! a [`ValueProfileSite`] emits. The optimizing tier inlines the same
//! instrumentation into larger functions; stubs let generic call fallbacks and
//! tests run it in isolation.
//!
//! A stub writes to the profile it was compiled against, so a [`ReportStub`]
//! borrows that profile's owner and cannot be run after it is dropped:
//!
//! ```compile_fail
//! use otter_vm_profile::{JsValue, ValueProfile};
//! use otter_vm_profile_jit::{JitCompiler, ValueLayout, ValueProfileSite};
//!
//! let mut jit = JitCompiler::new().unwrap();
//! let profile = Box::new(ValueProfile::new());
//! let stub = jit
//!     .compile_report_stub(&ValueProfileSite::from_value_profile(&profile), ValueLayout::Boxed, false)
//!     .unwrap();
//! drop(profile); // Error: `profile` is still borrowed by `stub`
//! jit.execute_report_stub(stub, JsValue::int32(1337));
//! ```
//!
//! While the owner is alive the stub is an ordinary value:
//!
//! ```
//! use otter_vm_profile::{JsValue, ValueProfile};
//! use otter_vm_profile_jit::{JitCompiler, ValueLayout, ValueProfileSite};
//!
//! let mut jit = JitCompiler::new().unwrap();
//! let profile = Box::new(ValueProfile::new());
//! let stub = jit
//!     .compile_report_stub(&ValueProfileSite::from_value_profile(&profile), ValueLayout::Boxed, false)
//!     .unwrap();
//! jit.execute_report_stub(stub, JsValue::int32(1337));
//! assert_eq!(profile.read_bucket(), Some(JsValue::int32(1337)));
//! drop(profile);
//! ```

use std::marker::PhantomData;

use cranelift_codegen::ir::{AbiParam, InstBuilder, UserFuncName, types};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module, ModuleError, default_libcall_names};
use otter_vm_profile::JsValue;

use crate::profile_site::ValueProfileSite;
use crate::value_regs::{JsValueRegs, ScratchRegister, TagRegisters, TagRegistersMode};

/// How a stub receives the value to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueLayout {
    /// One `i64` argument
    Boxed,
    /// Two `i32` arguments: tag word, then payload word
    Split,
}

/// A compiled report stub.
///
/// Borrows the profiles its code writes to for `'a`.
#[derive(Debug, Clone, Copy)]
pub struct ReportStub<'a> {
    code_ptr: *const u8,
    layout: ValueLayout,
    _profiles: PhantomData<&'a ()>,
}

impl ReportStub<'_> {
    /// Entry pointer for compiled native code.
    #[inline]
    pub fn code_ptr(&self) -> *const u8 {
        self.code_ptr
    }

    /// Argument layout the stub was compiled for.
    #[inline]
    pub fn layout(&self) -> ValueLayout {
        self.layout
    }
}

/// Errors produced by the report stub compiler.
#[derive(Debug, thiserror::Error)]
pub enum JitError {
    /// Cranelift module-level error.
    #[error("cranelift module error: {0}")]
    Module(Box<ModuleError>),

    /// Failed to create the JIT builder.
    #[error("jit builder initialization failed: {0}")]
    Builder(String),
}

impl From<ModuleError> for JitError {
    fn from(value: ModuleError) -> Self {
        Self::Module(Box::new(value))
    }
}

/// Cranelift-backed compiler for report stubs.
pub struct JitCompiler {
    module: JITModule,
    function_builder_ctx: FunctionBuilderContext,
    context: cranelift_codegen::Context,
    next_function_id: u64,
}

impl JitCompiler {
    /// Create a compiler targeting the host.
    pub fn new() -> Result<Self, JitError> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", "speed")
            .map_err(|e| JitError::Builder(e.to_string()))?;
        let isa = cranelift_native::builder()
            .map_err(|e| JitError::Builder(e.to_string()))?
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| JitError::Builder(e.to_string()))?;

        let builder = JITBuilder::with_isa(isa, default_libcall_names());
        let module = JITModule::new(builder);
        Ok(Self {
            module,
            function_builder_ctx: FunctionBuilderContext::new(),
            context: cranelift_codegen::Context::new(),
            next_function_id: 0,
        })
    }

    /// Compile a stub that reports its argument to `site`.
    ///
    /// With `pin_tag_registers` the stub materializes tag constants up front
    /// and hands them to the emitter, as a function with pinned tag registers
    /// would.
    ///
    /// A lazy operand site gets its profile created here, during compilation.
    pub fn compile_report_stub<'a>(
        &mut self,
        site: &ValueProfileSite<'a>,
        layout: ValueLayout,
        pin_tag_registers: bool,
    ) -> Result<ReportStub<'a>, JitError> {
        let mut signature = self.module.make_signature();
        match layout {
            ValueLayout::Boxed => signature.params.push(AbiParam::new(types::I64)),
            ValueLayout::Split => {
                signature.params.push(AbiParam::new(types::I32)); // tag
                signature.params.push(AbiParam::new(types::I32)); // payload
            }
        }

        let name = format!("otter_profile_report_{}", self.next_function_id);
        self.next_function_id = self.next_function_id.saturating_add(1);

        let func_id = self
            .module
            .declare_function(&name, Linkage::Local, &signature)?;

        self.context.func = cranelift_codegen::ir::Function::with_name_signature(
            UserFuncName::user(0, func_id.as_u32()),
            signature,
        );

        {
            let mut builder =
                FunctionBuilder::new(&mut self.context.func, &mut self.function_builder_ctx);
            let entry = builder.create_block();
            builder.append_block_params_for_function_params(entry);
            builder.switch_to_block(entry);

            let params = builder.block_params(entry).to_vec();
            let regs = match layout {
                ValueLayout::Boxed => JsValueRegs::Boxed(params[0]),
                ValueLayout::Split => JsValueRegs::Split {
                    tag: params[0],
                    payload: params[1],
                },
            };
            let scratch = ScratchRegister::declare(&mut builder);
            let mode = if pin_tag_registers {
                TagRegistersMode::HaveTagRegisters(TagRegisters::materialize(&mut builder))
            } else {
                TagRegistersMode::DoNotHaveTagRegisters
            };

            site.emit_report_value(&mut builder, regs, scratch, mode);

            builder.ins().return_(&[]);
            builder.seal_all_blocks();
            builder.finalize();
        }

        self.module.define_function(func_id, &mut self.context)?;
        self.module.clear_context(&mut self.context);
        self.module.finalize_definitions()?;

        let code_ptr = self.module.get_finalized_function(func_id);
        Ok(ReportStub {
            code_ptr,
            layout,
            _profiles: PhantomData,
        })
    }

    /// Run a stub compiled by this compiler with `value`.
    ///
    /// Finalized code stays mapped until the process exits: `JITModule` only
    /// releases it through its unsafe `free_memory`, which is never called.
    pub fn execute_report_stub(&self, stub: ReportStub<'_>, value: JsValue) {
        match stub.layout {
            ValueLayout::Boxed => {
                let func: extern "C" fn(i64) = unsafe {
                    // SAFETY: Boxed stubs are compiled with signature `(i64) -> ()`.
                    // The stub's lifetime keeps the profiles it writes to alive.
                    std::mem::transmute(stub.code_ptr)
                };
                func(value.encode())
            }
            ValueLayout::Split => {
                let func: extern "C" fn(u32, u32) = unsafe {
                    // SAFETY: Split stubs are compiled with signature `(i32, i32) -> ()`.
                    // The stub's lifetime keeps the profiles it writes to alive.
                    std::mem::transmute(stub.code_ptr)
                };
                func(value.tag_word(), value.payload_word())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_vm_profile::ValueProfile;

    #[test]
    fn basic_compile() {
        let profile = ValueProfile::new();
        let site = ValueProfileSite::from_value_profile(&profile);

        let mut jit = JitCompiler::new().expect("jit initialization should succeed");
        let stub = jit
            .compile_report_stub(&site, ValueLayout::Boxed, false)
            .expect("stub compilation should succeed");

        assert!(!stub.code_ptr().is_null());
        assert_eq!(stub.layout(), ValueLayout::Boxed);
        assert!(profile.is_empty(), "compiling must not record");
    }

    #[test]
    fn ready_stub_overwrites_bucket() {
        let profile = ValueProfile::new();
        profile.record(JsValue::int32(1));
        let site = ValueProfileSite::from_value_profile(&profile);

        let mut jit = JitCompiler::new().expect("jit initialization should succeed");
        let stub = jit
            .compile_report_stub(&site, ValueLayout::Boxed, false)
            .expect("stub compilation should succeed");

        jit.execute_report_stub(stub, JsValue::int32(2));
        assert_eq!(profile.read_bucket(), Some(JsValue::int32(2)));
    }

    #[test]
    fn split_stub_reassembles_encoding() {
        let profile = ValueProfile::new();
        let site = ValueProfileSite::from_value_profile(&profile);

        let mut jit = JitCompiler::new().expect("jit initialization should succeed");
        let stub = jit
            .compile_report_stub(&site, ValueLayout::Split, true)
            .expect("stub compilation should succeed");

        let value = JsValue::number(-1234.5);
        jit.execute_report_stub(stub, value);
        assert_eq!(profile.spec_fail_bucket(0).load(), value.encode());
    }

    #[test]
    fn several_stubs_share_one_module() {
        let first = ValueProfile::new();
        let second = ValueProfile::new();

        let mut jit = JitCompiler::new().expect("jit initialization should succeed");
        let a = jit
            .compile_report_stub(&ValueProfileSite::from_value_profile(&first), ValueLayout::Boxed, false)
            .expect("stub compilation should succeed");
        let b = jit
            .compile_report_stub(&ValueProfileSite::from_value_profile(&second), ValueLayout::Boxed, false)
            .expect("stub compilation should succeed");

        jit.execute_report_stub(a, JsValue::null());
        jit.execute_report_stub(b, JsValue::undefined());
        assert_eq!(first.read_bucket(), Some(JsValue::null()));
        assert_eq!(second.read_bucket(), Some(JsValue::undefined()));
    }
}
