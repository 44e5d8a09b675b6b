//! Object registry
//!
//! The heap owns every live object in a dense slot array. Freed slots go on a
//! free list and are reused; each slot carries a generation counter so that a
//! handle to a freed (or reused) slot is detected instead of silently aliasing
//! a different object.

use super::alloc::out_of_memory;
use super::header::GcHeader;
use crate::object::{HeapObject, ObjClosure, ObjFunction, ObjKind, ObjString, ObjUpvalue};
use crate::value::Value;
use std::fmt;

/// Handle to a heap-allocated object
///
/// `index` selects the slot in the heap; `generation` detects use-after-free.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId {
    index: u32,
    generation: u32,
}

impl ObjId {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Slot generation at allocation time
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjId({}/{})", self.index, self.generation)
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}/{}", self.index, self.generation)
    }
}

/// A registered object and its GC header
#[derive(Debug)]
pub(crate) struct HeapEntry {
    pub(crate) header: GcHeader,
    pub(crate) object: HeapObject,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<HeapEntry>,
}

/// Registry of all live heap objects
#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Slot>,

    /// Indices of vacant slots
    free_list: Vec<u32>,

    /// Number of occupied slots
    live: usize,

    /// Sum of accounted sizes of live objects and their buffers
    allocated_bytes: usize,
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object and return its handle
    pub(crate) fn insert(&mut self, object: HeapObject, size: usize) -> ObjId {
        let header = GcHeader::new(object.kind(), size);
        let entry = HeapEntry { header, object };
        self.live += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.entry = Some(entry);
            ObjId::new(index, slot.generation)
        } else {
            let Ok(index) = u32::try_from(self.slots.len()) else {
                out_of_memory::<Slot>(self.slots.len() + 1)
            };
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            ObjId::new(index, 0)
        }
    }

    #[inline]
    fn entry(&self, id: ObjId) -> Option<&HeapEntry> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    #[inline]
    fn entry_mut(&mut self, id: ObjId) -> Option<&mut HeapEntry> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    #[inline]
    fn checked(&self, id: ObjId) -> &HeapEntry {
        match self.entry(id) {
            Some(entry) => entry,
            None => panic!("stale object handle: {:?}", id),
        }
    }

    #[inline]
    fn checked_mut(&mut self, id: ObjId) -> &mut HeapEntry {
        match self.entry_mut(id) {
            Some(entry) => entry,
            None => panic!("stale object handle: {:?}", id),
        }
    }

    /// Check whether a handle refers to a live object
    pub fn contains(&self, id: ObjId) -> bool {
        self.entry(id).is_some()
    }

    /// Get an object, or `None` if the handle is stale
    pub fn try_get(&self, id: ObjId) -> Option<&HeapObject> {
        self.entry(id).map(|entry| &entry.object)
    }

    /// Get an object
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn get(&self, id: ObjId) -> &HeapObject {
        &self.checked(id).object
    }

    /// Get an object mutably
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn get_mut(&mut self, id: ObjId) -> &mut HeapObject {
        &mut self.checked_mut(id).object
    }

    /// Get the GC header of an object
    pub fn header(&self, id: ObjId) -> &GcHeader {
        &self.checked(id).header
    }

    pub(crate) fn header_mut(&mut self, id: ObjId) -> &mut GcHeader {
        &mut self.checked_mut(id).header
    }

    /// Check if an object is marked
    #[inline]
    pub fn is_marked(&self, id: ObjId) -> bool {
        self.header(id).is_marked()
    }

    /// Get the variant of an object
    #[inline]
    pub fn kind(&self, id: ObjId) -> ObjKind {
        self.header(id).kind()
    }

    /// Re-account an object whose owned buffers changed size
    pub(crate) fn resize(&mut self, id: ObjId, new_size: usize) {
        self.header_mut(id).set_size(new_size);
    }

    /// Get a string object
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or not a string.
    pub fn string(&self, id: ObjId) -> &ObjString {
        match self.get(id) {
            HeapObject::String(s) => s,
            other => panic!("expected string, found {:?}", other.kind()),
        }
    }

    /// Get a function object
    pub fn function(&self, id: ObjId) -> &ObjFunction {
        match self.get(id) {
            HeapObject::Function(f) => f,
            other => panic!("expected function, found {:?}", other.kind()),
        }
    }

    /// Get a function object mutably
    pub fn function_mut(&mut self, id: ObjId) -> &mut ObjFunction {
        match self.get_mut(id) {
            HeapObject::Function(f) => f,
            other => panic!("expected function, found {:?}", other.kind()),
        }
    }

    /// Get a closure object
    pub fn closure(&self, id: ObjId) -> &ObjClosure {
        match self.get(id) {
            HeapObject::Closure(c) => c,
            other => panic!("expected closure, found {:?}", other.kind()),
        }
    }

    /// Get a closure object mutably
    pub fn closure_mut(&mut self, id: ObjId) -> &mut ObjClosure {
        match self.get_mut(id) {
            HeapObject::Closure(c) => c,
            other => panic!("expected closure, found {:?}", other.kind()),
        }
    }

    /// Get an upvalue object
    pub fn upvalue(&self, id: ObjId) -> &ObjUpvalue {
        match self.get(id) {
            HeapObject::Upvalue(u) => u,
            other => panic!("expected upvalue, found {:?}", other.kind()),
        }
    }

    /// Get an upvalue object mutably
    pub fn upvalue_mut(&mut self, id: ObjId) -> &mut ObjUpvalue {
        match self.get_mut(id) {
            HeapObject::Upvalue(u) => u,
            other => panic!("expected upvalue, found {:?}", other.kind()),
        }
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if no objects are live
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total accounted bytes
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    pub(crate) fn add_bytes(&mut self, bytes: usize) {
        self.allocated_bytes += bytes;
    }

    pub(crate) fn sub_bytes(&mut self, bytes: usize) {
        debug_assert!(bytes <= self.allocated_bytes, "accounted bytes underflow");
        self.allocated_bytes = self.allocated_bytes.saturating_sub(bytes);
    }

    /// Iterate over the handles of all live objects
    pub fn ids(&self) -> impl Iterator<Item = ObjId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry
                .as_ref()
                .map(|_| ObjId::new(index as u32, slot.generation))
        })
    }

    /// Iterate over all live objects with their headers
    pub fn iter(&self) -> impl Iterator<Item = (ObjId, &GcHeader, &HeapObject)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|entry| {
                (
                    ObjId::new(index as u32, slot.generation),
                    &entry.header,
                    &entry.object,
                )
            })
        })
    }

    /// Sweep the registry in one pass.
    ///
    /// Marked objects are unmarked and kept. Unmarked objects are unregistered
    /// and handed to `free`, which owns them from then on.
    pub(crate) fn sweep(&mut self, mut free: impl FnMut(ObjId, HeapEntry)) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };
            if entry.header.is_marked() {
                entry.header.unmark();
                continue;
            }
            if let Some(unreached) = slot.entry.take() {
                self.free_list.push(index as u32);
                self.live -= 1;
                free(ObjId::new(index as u32, slot.generation), unreached);
            }
        }
    }

    /// Unregister every object regardless of marks
    pub(crate) fn drain(&mut self, mut free: impl FnMut(ObjId, HeapEntry)) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(entry) = slot.entry.take() {
                free(ObjId::new(index as u32, slot.generation), entry);
            }
        }
        self.slots.clear();
        self.free_list.clear();
        self.live = 0;
    }

    /// Render a value for diagnostics, resolving object contents
    pub fn display_value(&self, value: Value) -> ValueDisplay<'_> {
        ValueDisplay { heap: self, value }
    }

    /// Render an object for diagnostics
    pub fn display(&self, id: ObjId) -> ValueDisplay<'_> {
        self.display_value(Value::Obj(id))
    }
}

/// Display adapter printing values the way the VM shows them
pub struct ValueDisplay<'a> {
    heap: &'a Heap,
    value: Value,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self.value {
            Value::Obj(id) => id,
            other => return write!(f, "{}", other),
        };
        match self.heap.try_get(id) {
            None => write!(f, "<freed {}>", id),
            Some(HeapObject::String(s)) => write!(f, "{}", s.as_str()),
            Some(HeapObject::Function(function)) => write_function(f, self.heap, function),
            Some(HeapObject::Native(_)) => write!(f, "<native fn>"),
            Some(HeapObject::Closure(closure)) => match self.heap.try_get(closure.function) {
                Some(HeapObject::Function(function)) => write_function(f, self.heap, function),
                _ => write!(f, "<closure {}>", id),
            },
            Some(HeapObject::Upvalue(_)) => write!(f, "upvalue"),
        }
    }
}

fn write_function(f: &mut fmt::Formatter<'_>, heap: &Heap, function: &ObjFunction) -> fmt::Result {
    match function.name.and_then(|name| heap.try_get(name)) {
        Some(HeapObject::String(name)) => write!(f, "<fn {}>", name.as_str()),
        _ => write!(f, "<script>"),
    }
}
