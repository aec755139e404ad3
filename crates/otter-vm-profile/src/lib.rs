//! # Otter VM Profile
//!
//! Type-feedback storage shared by the interpreter and the speculative JIT.
//!
//! ## Pieces
//!
//! - **Value profiles**: single-bucket records of the last value that violated
//!   a speculation at a bytecode site
//! - **Arithmetic profiles**: result-shape classification embedded in
//!   arithmetic instructions
//! - **Lazy operand profiles**: value profiles created on first use, keyed by
//!   `(bytecode index, operand)` and stored per code block
//!
//! Profiles never move once allocated, so their bucket addresses can be baked
//! into generated machine code.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod arith_profile;
pub mod code_block;
pub mod concurrent_map;
pub mod config;
pub mod error;
pub mod lazy_operand;
pub mod operand;
pub mod value;
pub mod value_profile;

pub use arith_profile::{BinaryArithProfile, ObservedResults, ObservedType, UnaryArithProfile};
pub use code_block::{CodeBlock, CodeBlockBuilder};
pub use concurrent_map::ConcurrentCreateOnceMap;
pub use config::ProfilingConfig;
pub use error::ProfileError;
pub use lazy_operand::{LazyOperandValueProfileKey, LazyOperandValueProfileStore};
pub use operand::{BytecodeIndex, Operand};
pub use value::{EncodedJsValue, JsValue};
pub use value_profile::{ProfileBucket, ValueProfile};

/// `tracing` target for profile events.
pub const LOG_TARGET: &str = "otter::profile";

#[doc(hidden)]
pub use tracing;

/// Log a profile event at `debug` when `config.trace_events` is set, else at
/// `trace`.
#[macro_export]
macro_rules! profile_event {
    ($config:expr, $($arg:tt)+) => {
        if $config.trace_events {
            $crate::tracing::debug!(target: $crate::LOG_TARGET, $($arg)+)
        } else {
            $crate::tracing::trace!(target: $crate::LOG_TARGET, $($arg)+)
        }
    };
}
