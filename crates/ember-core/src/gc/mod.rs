//! Garbage collection system
//!
//! This module provides a stop-the-world, tri-color mark-sweep garbage
//! collector for the Ember VM.
//!
//! # Architecture
//!
//! The GC system consists of several components:
//!
//! - **ObjId**: Generation-checked handle to a heap object
//! - **GcHeader**: Mark bit, kind and accounted size of each object
//! - **Heap**: Slot registry owning every live object
//! - **GrayStack**: Worklist of marked objects awaiting blackening
//! - **RootSource / CompilerRoots**: Root enumeration hooks
//! - **Tracer**: Mark phase
//! - **GarbageCollector**: Allocator entry point and collection cycle
//!
//! # Example
//!
//! ```
//! use ember_core::gc::GarbageCollector;
//! use ember_core::{GcConfig, Value};
//!
//! let mut gc = GarbageCollector::new(GcConfig::default().with_stress(false));
//!
//! let kept = gc.intern(&(), "kept");
//! let _dropped = gc.intern(&(), "dropped");
//!
//! // Only `kept` is reachable from the roots
//! let roots = vec![Value::obj(kept)];
//! assert_eq!(gc.collect(&roots), 1);
//! assert!(gc.heap().contains(kept));
//! ```

pub mod alloc;
mod collector;
mod gray;
mod header;
mod heap;
mod roots;
mod trace;

// Re-export public types
pub use collector::{GarbageCollector, GcStats, HeapStats};
pub use gray::GrayStack;
pub use header::GcHeader;
pub use heap::{Heap, ObjId, ValueDisplay};
pub use roots::{CompilerRootStack, CompilerRoots, RootSource};
pub use trace::Tracer;
