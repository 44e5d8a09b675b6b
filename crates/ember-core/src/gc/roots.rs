//! GC root tracking
//!
//! Roots are the starting points for tracing. The collector does not own
//! them: whoever holds VM state implements `RootSource` and hands it to every
//! allocation that may trigger a collection. Typical roots are:
//! - Live operand stack slots
//! - The closure of every active call frame
//! - Open upvalues
//! - Global variables
//! - Functions the compiler is still building

use super::heap::ObjId;
use super::trace::Tracer;
use crate::value::Value;

/// Something that can enumerate GC roots
pub trait RootSource {
    /// Mark every object directly reachable from this source
    fn mark_roots(&self, tracer: &mut Tracer<'_>);
}

/// Hook through which a compiler marks objects it holds privately
///
/// A function under construction is not reachable from any VM root until
/// compilation finishes, so the compiler must report it itself.
pub trait CompilerRoots {
    /// Mark every heap object the compiler currently holds
    fn mark_compiler_roots(&self, tracer: &mut Tracer<'_>);
}

/// The compiler's stack of functions under construction
///
/// The front-end pushes a function when it starts compiling its body and
/// pops it once the function has been stored somewhere reachable.
#[derive(Debug, Clone, Default)]
pub struct CompilerRootStack {
    functions: Vec<ObjId>,
}

impl CompilerRootStack {
    /// Create an empty root stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Start compiling a function
    pub fn push(&mut self, function: ObjId) {
        self.functions.push(function);
    }

    /// Finish the innermost function
    pub fn pop(&mut self) -> Option<ObjId> {
        self.functions.pop()
    }

    /// Innermost function under construction
    pub fn current(&self) -> Option<ObjId> {
        self.functions.last().copied()
    }

    /// Number of functions under construction
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if nothing is being compiled
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl CompilerRoots for CompilerRootStack {
    fn mark_compiler_roots(&self, tracer: &mut Tracer<'_>) {
        for &function in &self.functions {
            tracer.mark_object(function);
        }
    }
}

impl RootSource for () {
    fn mark_roots(&self, _tracer: &mut Tracer<'_>) {}
}

impl RootSource for [Value] {
    fn mark_roots(&self, tracer: &mut Tracer<'_>) {
        tracer.mark_values(self);
    }
}

impl RootSource for Vec<Value> {
    fn mark_roots(&self, tracer: &mut Tracer<'_>) {
        tracer.mark_values(self);
    }
}
