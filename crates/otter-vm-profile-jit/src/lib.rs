//! # Otter VM Profile JIT
//!
//! Addressing of type-feedback profiles from both execution epochs:
//!
//! - **Code generation**: [`ValueProfileSite::emit_report_value`] appends
//!   Cranelift IR that records a value when the compiled code later runs
//! - **Runtime**: [`ValueProfileSite::report_value`] records immediately
//!   from interpreter and generic slow paths
//!
//! Both resolve a site to the same profile and leave the same bits behind.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod arith_profile;
pub mod compiler;
pub mod profile_site;
pub mod value_regs;

pub use compiler::{JitCompiler, JitError, ReportStub, ValueLayout};
pub use profile_site::ValueProfileSite;
pub use value_regs::{JsValueRegs, ScratchRegister, TagRegisters, TagRegistersMode};
