//! VM execution context
//!
//! `Vm` pairs the garbage collector with the mutator state it must treat as
//! roots. Every allocating method hands `VmState` to the collector, so any
//! allocation may run a full collection.
//!
//! Rooting discipline: an object returned by an allocating method is not yet
//! reachable. Push it on the operand stack, store it somewhere reachable, or
//! protect it with `GarbageCollector::push_root` before allocating again.

use crate::config::GcConfig;
use crate::gc::{
    CompilerRootStack, CompilerRoots, GarbageCollector, GcStats, Heap, HeapStats, ObjId,
    RootSource, Tracer,
};
use crate::object::{NativeFn, ObjClosure, ObjFunction, ObjKind, ObjNative, ObjUpvalue, UpvalueLocation};
use crate::stack::{CallFrame, Stack};
use crate::table::Table;
use crate::value::Value;
use crate::{VmError, VmResult};

/// Mutator state the collector reads as roots
#[derive(Default)]
pub struct VmState {
    /// Operand stack and call frames
    pub stack: Stack,

    /// Head of the open-upvalue list, sorted by descending stack slot
    pub open_upvalues: Option<ObjId>,

    /// Global variables
    pub globals: Table,

    /// Functions the compiler is still building
    pub compiler: CompilerRootStack,
}

impl RootSource for VmState {
    fn mark_roots(&self, tracer: &mut Tracer<'_>) {
        tracer.mark_values(self.stack.values());

        for frame in self.stack.frames() {
            tracer.mark_object(frame.closure);
        }

        let mut upvalue = self.open_upvalues;
        while let Some(id) = upvalue {
            tracer.mark_object(id);
            upvalue = tracer.heap().upvalue(id).next;
        }

        tracer.mark_table(&self.globals);
        self.compiler.mark_compiler_roots(tracer);
    }
}

/// A virtual machine instance: collector plus root state
pub struct Vm {
    /// Garbage collector (owns the heap)
    gc: GarbageCollector,

    /// Root state
    state: VmState,
}

impl Vm {
    /// Create a VM with the default collector configuration
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create a VM with a specific collector configuration
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            gc: GarbageCollector::new(config),
            state: VmState::default(),
        }
    }

    /// Get a reference to the garbage collector
    pub fn gc(&self) -> &GarbageCollector {
        &self.gc
    }

    /// Get a mutable reference to the garbage collector
    pub fn gc_mut(&mut self) -> &mut GarbageCollector {
        &mut self.gc
    }

    /// Get the heap
    pub fn heap(&self) -> &Heap {
        self.gc.heap()
    }

    /// Get the root state
    pub fn state(&self) -> &VmState {
        &self.state
    }

    /// Get the root state mutably
    pub fn state_mut(&mut self) -> &mut VmState {
        &mut self.state
    }

    /// Get GC statistics
    pub fn gc_stats(&self) -> &GcStats {
        self.gc.stats()
    }

    /// Get heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        self.gc.heap_stats()
    }

    /// Run garbage collection; returns the number of objects freed
    pub fn collect_garbage(&mut self) -> usize {
        self.gc.collect(&self.state)
    }

    /// Free every object and reset all roots
    pub fn free_objects(&mut self) {
        self.state.stack.reset();
        self.state.open_upvalues = None;
        self.state.globals = Table::new();
        self.state.compiler = CompilerRootStack::new();
        self.gc.free_objects();
    }

    // ========================================================================
    // Operand stack
    // ========================================================================

    /// Push a value onto the operand stack
    pub fn push(&mut self, value: Value) -> VmResult<()> {
        self.state.stack.push(value)
    }

    /// Pop a value from the operand stack
    ///
    /// An open upvalue on the popped slot is closed first.
    pub fn pop(&mut self) -> VmResult<Value> {
        let top = self
            .state
            .stack
            .depth()
            .checked_sub(1)
            .ok_or(VmError::StackUnderflow)?;
        self.close_upvalues(top)?;
        self.state.stack.pop()
    }

    /// Peek at value N slots from top (0 = top)
    pub fn peek(&self, n: usize) -> VmResult<Value> {
        self.state.stack.peek(n)
    }

    // ========================================================================
    // Object construction
    // ========================================================================

    /// Intern a string, copying it
    pub fn intern(&mut self, chars: &str) -> ObjId {
        self.gc.intern(&self.state, chars)
    }

    /// Intern a string, taking ownership of the buffer
    pub fn take_string(&mut self, chars: String) -> ObjId {
        self.gc.take_string(&self.state, chars)
    }

    /// Allocate an empty function
    pub fn new_function(&mut self, name: Option<ObjId>) -> ObjId {
        let rooted = name.is_some();
        if let Some(name) = name {
            self.gc.push_root(Value::obj(name));
        }
        let function = self.gc.allocate(&self.state, ObjFunction::new(name));
        if rooted {
            self.gc.pop_root();
        }
        function
    }

    /// Allocate a native function wrapper
    pub fn new_native(&mut self, function: NativeFn) -> ObjId {
        self.gc.allocate(&self.state, ObjNative { function })
    }

    /// Allocate a closure over `function` with empty upvalue slots
    pub fn new_closure(&mut self, function: ObjId) -> ObjId {
        let upvalue_count = self.gc.heap().function(function).upvalue_count;
        self.gc.push_root(Value::obj(function));
        let closure = self.gc.allocate(&self.state, ObjClosure::new(function, upvalue_count));
        self.gc.pop_root();
        closure
    }

    /// Store a captured upvalue into a closure slot
    pub fn set_closure_upvalue(&mut self, closure: ObjId, index: usize, upvalue: ObjId) {
        self.gc.heap_mut().closure_mut(closure).upvalues[index] = Some(upvalue);
    }

    /// Bind a native function to a global name
    pub fn define_native(&mut self, name: &str, function: NativeFn) -> VmResult<()> {
        let name = self.intern(name);
        self.push(Value::obj(name))?;
        let native = self.new_native(function);
        self.push(Value::obj(native))?;

        self.state.globals.set(name, Value::obj(native));

        self.pop()?;
        self.pop()?;
        Ok(())
    }

    /// Append a constant to a function's pool; returns its index
    ///
    /// Growth of the pool is accounted through the collector and may trigger
    /// a collection.
    pub fn add_constant(&mut self, function: ObjId, value: Value) -> usize {
        let index = self
            .gc
            .heap_mut()
            .function_mut(function)
            .chunk
            .add_constant(value);
        self.reaccount_function(function);
        index
    }

    /// Append one instruction byte to a function's code
    ///
    /// Code and line-table growth is accounted like constant pool growth.
    pub fn write_chunk(&mut self, function: ObjId, byte: u8, line: u32) {
        self.gc
            .heap_mut()
            .function_mut(function)
            .chunk
            .write(byte, line);
        self.reaccount_function(function);
    }

    fn reaccount_function(&mut self, function: ObjId) {
        self.gc.push_root(Value::obj(function));
        self.gc.resize_object(&self.state, function);
        self.gc.pop_root();
    }

    // ========================================================================
    // Compiler roots
    // ========================================================================

    /// Allocate a function and register it as under construction
    pub fn begin_function(&mut self, name: Option<ObjId>) -> ObjId {
        let function = self.new_function(name);
        self.state.compiler.push(function);
        function
    }

    /// Finish the innermost function under construction
    ///
    /// The caller must make the function reachable (stack, constant, global)
    /// before the next allocation.
    pub fn end_function(&mut self) -> Option<ObjId> {
        self.state.compiler.pop()
    }

    // ========================================================================
    // Call frames
    // ========================================================================

    /// Enter `closure`, whose callee slot and `arg_count` arguments are on top
    /// of the stack
    pub fn push_frame(&mut self, closure: ObjId, arg_count: usize) -> VmResult<()> {
        if self.gc.heap().kind(closure) != ObjKind::Closure {
            return Err(VmError::TypeError(format!(
                "Can only call closures, got {}",
                self.gc.heap().display(closure)
            )));
        }
        let slot_base = self
            .state
            .stack
            .depth()
            .checked_sub(arg_count + 1)
            .ok_or(VmError::StackUnderflow)?;
        self.state.stack.push_frame(closure, slot_base)
    }

    /// Return from the current frame, closing its upvalues first
    pub fn pop_frame(&mut self) -> VmResult<CallFrame> {
        let slot_base = self
            .state
            .stack
            .current_frame()
            .map(|frame| frame.slot_base)
            .ok_or(VmError::FrameUnderflow)?;
        self.close_upvalues(slot_base)?;
        self.state.stack.pop_frame()
    }

    // ========================================================================
    // Upvalues
    // ========================================================================

    /// Find or create the open upvalue for a stack slot
    pub fn capture_upvalue(&mut self, slot: usize) -> ObjId {
        let mut prev: Option<ObjId> = None;
        let mut current = self.state.open_upvalues;

        while let Some(id) = current {
            let upvalue = self.gc.heap().upvalue(id);
            match upvalue.open_slot() {
                Some(open) if open > slot => {
                    prev = Some(id);
                    current = upvalue.next;
                }
                _ => break,
            }
        }

        if let Some(id) = current {
            if self.gc.heap().upvalue(id).open_slot() == Some(slot) {
                return id;
            }
        }

        // Neighbours are on the open list, so they stay rooted across this
        let created = self.gc.allocate(&self.state, ObjUpvalue::open(slot));
        self.gc.heap_mut().upvalue_mut(created).next = current;

        match prev {
            None => self.state.open_upvalues = Some(created),
            Some(prev) => self.gc.heap_mut().upvalue_mut(prev).next = Some(created),
        }
        created
    }

    /// Close every open upvalue at or above `last_slot`
    pub fn close_upvalues(&mut self, last_slot: usize) -> VmResult<()> {
        while let Some(id) = self.state.open_upvalues {
            let Some(slot) = self.gc.heap().upvalue(id).open_slot() else {
                break;
            };
            if slot < last_slot {
                break;
            }

            let value = self.state.stack.get(slot)?;
            let upvalue = self.gc.heap_mut().upvalue_mut(id);
            upvalue.location = UpvalueLocation::Closed(value);
            self.state.open_upvalues = upvalue.next.take();
        }
        Ok(())
    }

    /// Read the variable an upvalue refers to
    pub fn upvalue_get(&self, upvalue: ObjId) -> VmResult<Value> {
        match self.gc.heap().upvalue(upvalue).location {
            UpvalueLocation::Open(slot) => self.state.stack.get(slot),
            UpvalueLocation::Closed(value) => Ok(value),
        }
    }

    /// Write the variable an upvalue refers to
    pub fn upvalue_set(&mut self, upvalue: ObjId, value: Value) -> VmResult<()> {
        match self.gc.heap().upvalue(upvalue).location {
            UpvalueLocation::Open(slot) => self.state.stack.set(slot, value),
            UpvalueLocation::Closed(_) => {
                self.gc.heap_mut().upvalue_mut(upvalue).location = UpvalueLocation::Closed(value);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Globals
    // ========================================================================

    /// Define (or redefine) a global
    pub fn define_global(&mut self, name: ObjId, value: Value) {
        self.state.globals.set(name, value);
    }

    /// Read a global
    pub fn get_global(&self, name: ObjId) -> VmResult<Value> {
        self.state
            .globals
            .get(name)
            .ok_or_else(|| self.undefined(name))
    }

    /// Assign to an existing global
    pub fn set_global(&mut self, name: ObjId, value: Value) -> VmResult<()> {
        if !self.state.globals.contains(name) {
            return Err(self.undefined(name));
        }
        self.state.globals.set(name, value);
        Ok(())
    }

    /// Remove a global; returns true if it existed
    pub fn remove_global(&mut self, name: ObjId) -> bool {
        self.state.globals.delete(name)
    }

    /// Look up a global by name without interning
    pub fn global(&self, name: &str) -> Option<Value> {
        let name = self.gc.strings().find(name)?;
        self.state.globals.get(name)
    }

    fn undefined(&self, name: ObjId) -> VmError {
        VmError::UndefinedVariable(self.gc.heap().display(name).to_string())
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
