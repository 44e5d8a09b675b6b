//! Gray worklist
//!
//! Objects that have been marked but whose references have not been followed
//! yet. Tracing drains this stack instead of recursing, so auxiliary memory is
//! bounded by the number of gray objects, not by the depth of the graph.

use super::alloc::{grow_capacity, reserve_exact_or_abort};
use super::heap::ObjId;

/// Non-owning stack of gray objects
#[derive(Debug, Default)]
pub struct GrayStack {
    items: Vec<ObjId>,

    /// How many times the backing storage has grown
    grow_count: usize,
}

impl GrayStack {
    /// Create an empty worklist without backing storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a freshly marked object, doubling capacity when full
    #[inline]
    pub fn push(&mut self, id: ObjId) {
        if self.items.len() == self.items.capacity() {
            let capacity = grow_capacity(self.items.capacity());
            reserve_exact_or_abort(&mut self.items, capacity);
            self.grow_count += 1;
        }
        self.items.push(id);
    }

    /// Pop the most recently pushed object
    #[inline]
    pub fn pop(&mut self) -> Option<ObjId> {
        self.items.pop()
    }

    /// Number of pending objects
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if no objects are pending
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current backing capacity
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Number of capacity growths since creation
    pub fn grow_count(&self) -> usize {
        self.grow_count
    }

    /// Release the backing storage
    pub fn release(&mut self) {
        self.items = Vec::new();
    }
}
