//! Mark phase
//!
//! `Tracer` implements tri-color marking over the heap:
//! - white: header unmarked
//! - gray: header marked, handle sitting on the worklist
//! - black: header marked, references followed by `blacken_object`

use super::gray::GrayStack;
use super::heap::{Heap, ObjId};
use crate::object::HeapObject;
use crate::table::Table;
use crate::value::Value;
use tracing::trace;

/// Marking context handed to root sources during a collection
pub struct Tracer<'a> {
    heap: &'a mut Heap,
    gray: &'a mut GrayStack,
    marked: usize,
    blackened: usize,
}

impl<'a> Tracer<'a> {
    pub(crate) fn new(heap: &'a mut Heap, gray: &'a mut GrayStack) -> Self {
        Self {
            heap,
            gray,
            marked: 0,
            blackened: 0,
        }
    }

    /// Read-only view of the heap, for root sources that need to walk objects
    #[inline]
    pub fn heap(&self) -> &Heap {
        self.heap
    }

    /// Mark an object gray. Already-marked objects are ignored.
    pub fn mark_object(&mut self, id: ObjId) {
        let header = self.heap.header_mut(id);
        if header.is_marked() {
            return;
        }
        header.mark();
        self.marked += 1;
        trace!(id = %id, object = %self.heap.display(id), "mark");
        self.gray.push(id);
    }

    /// Mark an optional reference; an empty reference is a no-op
    #[inline]
    pub fn mark_optional(&mut self, id: Option<ObjId>) {
        if let Some(id) = id {
            self.mark_object(id);
        }
    }

    /// Mark the object a value references, if any
    #[inline]
    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(id) = value {
            self.mark_object(id);
        }
    }

    /// Mark every value in a slice
    pub fn mark_values(&mut self, values: &[Value]) {
        for &value in values {
            self.mark_value(value);
        }
    }

    /// Mark every key and value of a table
    pub fn mark_table(&mut self, table: &Table) {
        for (key, value) in table.iter() {
            self.mark_object(key);
            self.mark_value(value);
        }
    }

    /// Drain the worklist, blackening each object exactly once
    pub fn trace_references(&mut self) {
        while let Some(id) = self.gray.pop() {
            self.blacken_object(id);
        }
    }

    /// Follow the outgoing references of a gray object
    fn blacken_object(&mut self, id: ObjId) {
        trace!(id = %id, object = %self.heap.display(id), "blacken");
        self.blackened += 1;

        match self.heap.get(id) {
            HeapObject::String(_) | HeapObject::Native(_) => {}
            HeapObject::Upvalue(upvalue) => {
                if let Some(closed) = upvalue.closed_value() {
                    self.mark_value(closed);
                }
            }
            HeapObject::Function(function) => {
                let name = function.name;
                let constants = function.chunk.constants.len();
                self.mark_optional(name);
                for i in 0..constants {
                    let constant = self.heap.function(id).chunk.constants[i];
                    self.mark_value(constant);
                }
            }
            HeapObject::Closure(closure) => {
                let function = closure.function;
                let upvalues = closure.upvalues.len();
                self.mark_object(function);
                for i in 0..upvalues {
                    let upvalue = self.heap.closure(id).upvalues[i];
                    self.mark_optional(upvalue);
                }
            }
        }
    }

    /// Objects marked so far in this cycle
    pub fn marked_count(&self) -> usize {
        self.marked
    }

    /// Objects blackened so far in this cycle
    pub fn blackened_count(&self) -> usize {
        self.blackened
    }
}
