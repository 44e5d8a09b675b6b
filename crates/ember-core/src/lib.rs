//! Ember VM Core Heap
//!
//! This crate provides the memory-management core of the Ember bytecode VM:
//! - Object model (strings, functions, natives, closures, upvalues)
//! - Heap registry with generation-checked handles
//! - Stop-the-world tri-color mark-sweep garbage collector
//! - String interning with a weak intern table
//! - VM root state (operand stack, call frames, open upvalues, globals)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod gc;
pub mod object;
pub mod stack;
pub mod table;
pub mod value;
pub mod vm;

pub use config::GcConfig;
pub use gc::{
    CompilerRootStack, CompilerRoots, GarbageCollector, GcStats, Heap, HeapStats, ObjId,
    RootSource, Tracer,
};
pub use object::{
    Chunk, HeapObject, NativeFn, ObjClosure, ObjFunction, ObjKind, ObjNative, ObjString,
    ObjUpvalue, UpvalueLocation,
};
pub use stack::{CallFrame, Stack};
pub use table::{InternTable, Table};
pub use value::Value;
pub use vm::{Vm, VmState};

/// VM execution errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    /// Stack overflow
    #[error("Stack overflow")]
    StackOverflow,

    /// Stack underflow
    #[error("Stack underflow")]
    StackUnderflow,

    /// Returned from a frame while no call frame was active
    #[error("Call frame underflow")]
    FrameUnderflow,

    /// Global variable lookup failed
    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
