//! Mark-sweep garbage collector
//!
//! A collection always runs the same four steps, in order:
//!
//! 1. mark roots (caller-supplied `RootSource` plus the temporary roots)
//! 2. trace references until the gray worklist is empty
//! 3. purge unmarked strings from the intern table
//! 4. sweep: free unmarked objects and unmark the survivors
//!
//! Purging must see the mark bits, and sweeping clears them, so steps 3 and 4
//! can never swap.

use super::gray::GrayStack;
use super::heap::{Heap, HeapEntry, ObjId};
use super::roots::RootSource;
use super::trace::Tracer;
use crate::config::GcConfig;
use crate::object::{HeapObject, ObjString};
use crate::table::InternTable;
use crate::value::Value;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Garbage collector statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,

    /// Total objects freed
    pub objects_freed: usize,

    /// Total bytes freed
    pub bytes_freed: usize,

    /// Total pause time across all collections
    pub total_pause_time: Duration,

    /// Last collection duration
    pub last_pause_time: Duration,

    /// Maximum pause time
    pub max_pause_time: Duration,

    /// Objects marked in last collection
    pub last_marked_count: usize,

    /// Objects blackened in last collection
    pub last_blackened_count: usize,

    /// Objects freed in last collection
    pub last_freed_count: usize,

    /// Bytes freed in last collection
    pub last_freed_bytes: usize,

    /// Intern entries purged in last collection
    pub last_purged_strings: usize,

    /// Live objects after last collection
    pub live_objects: usize,

    /// Live bytes after last collection
    pub live_bytes: usize,
}

/// Per-cycle numbers fed into `GcStats::update`
struct CycleReport {
    pause: Duration,
    marked: usize,
    blackened: usize,
    freed: usize,
    freed_bytes: usize,
    purged: usize,
    live_objects: usize,
    live_bytes: usize,
}

impl GcStats {
    fn update(&mut self, report: CycleReport) {
        self.collections += 1;
        self.objects_freed += report.freed;
        self.bytes_freed += report.freed_bytes;
        self.total_pause_time += report.pause;
        self.last_pause_time = report.pause;
        if report.pause > self.max_pause_time {
            self.max_pause_time = report.pause;
        }

        self.last_marked_count = report.marked;
        self.last_blackened_count = report.blackened;
        self.last_freed_count = report.freed;
        self.last_freed_bytes = report.freed_bytes;
        self.last_purged_strings = report.purged;
        self.live_objects = report.live_objects;
        self.live_bytes = report.live_bytes;
    }

    /// Average pause time
    pub fn avg_pause_time(&self) -> Duration {
        if self.collections == 0 {
            return Duration::ZERO;
        }
        self.total_pause_time.div_f64(self.collections as f64)
    }
}

/// Heap statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total accounted bytes
    pub allocated_bytes: usize,

    /// Number of live objects
    pub object_count: usize,

    /// Byte count that triggers the next collection
    pub next_gc: usize,

    /// Backing capacity of the gray worklist
    pub gray_capacity: usize,

    /// Number of interned strings
    pub interned_strings: usize,
}

/// Mark-sweep garbage collector
///
/// Owns the heap, the gray worklist, the weak intern table and the temporary
/// root stack for the lifetime of one VM.
pub struct GarbageCollector {
    /// Object registry
    heap: Heap,

    /// Gray worklist, reused across cycles
    gray: GrayStack,

    /// Weak string intern table
    strings: InternTable,

    /// Values kept alive while not yet reachable from VM state
    temp_roots: Vec<Value>,

    /// Collection policy
    config: GcConfig,

    /// Byte count that triggers the next collection
    next_gc: usize,

    /// Statistics
    stats: GcStats,
}

impl GarbageCollector {
    /// Create a new garbage collector
    pub fn new(config: GcConfig) -> Self {
        Self {
            heap: Heap::new(),
            gray: GrayStack::new(),
            strings: InternTable::new(),
            temp_roots: Vec::new(),
            next_gc: config.initial_threshold,
            config,
            stats: GcStats::default(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Enable or disable stress collection
    pub fn set_stress(&mut self, stress: bool) {
        self.config.stress = stress;
    }

    /// Set the byte count that triggers the next collection
    pub fn set_threshold(&mut self, bytes: usize) {
        self.next_gc = bytes.max(1);
    }

    // ========================================================================
    // Allocator
    // ========================================================================

    /// Account for a block changing size from `old_size` to `new_size`.
    ///
    /// Growth is the only point at which a collection can start: under the
    /// stress policy on every growth, otherwise when the growth would cross
    /// the threshold. The collection runs before the new bytes are committed.
    /// `new_size == 0` releases the block.
    pub fn reallocate<R>(&mut self, roots: &R, old_size: usize, new_size: usize)
    where
        R: RootSource + ?Sized,
    {
        if new_size > old_size {
            let growth = new_size - old_size;
            if self.config.stress || self.heap.allocated_bytes() + growth > self.next_gc {
                self.collect(roots);
            }
            self.heap.add_bytes(growth);
        } else {
            self.heap.sub_bytes(old_size - new_size);
        }
    }

    /// Allocate an object and register it on the heap.
    ///
    /// The object's own references must already be reachable from `roots` or
    /// the temporary roots: a collection may run before it is registered.
    /// The returned object is unrooted; make it reachable before the next
    /// allocation.
    pub fn allocate<R>(&mut self, roots: &R, object: impl Into<HeapObject>) -> ObjId
    where
        R: RootSource + ?Sized,
    {
        let object = object.into();
        let size = object.size();
        self.reallocate(roots, 0, size);

        let kind = object.kind();
        let id = self.heap.insert(object, size);
        trace!(id = %id, ?kind, size, "allocate");
        id
    }

    /// Intern a string, copying `chars` if no equal string exists yet
    pub fn intern<R>(&mut self, roots: &R, chars: &str) -> ObjId
    where
        R: RootSource + ?Sized,
    {
        if let Some(id) = self.strings.find(chars) {
            return id;
        }
        let id = self.allocate(roots, ObjString::new(chars));
        self.strings.insert(chars, id);
        id
    }

    /// Intern a string, taking ownership of the buffer
    pub fn take_string<R>(&mut self, roots: &R, chars: String) -> ObjId
    where
        R: RootSource + ?Sized,
    {
        if let Some(id) = self.strings.find(&chars) {
            return id;
        }
        let id = self.allocate(roots, ObjString::new(chars));
        let chars = self.heap.string(id).as_str();
        self.strings.insert(chars, id);
        id
    }

    /// Re-account an object after its owned buffers changed size
    ///
    /// Growth goes through `reallocate` and may collect first, so `id` must
    /// be reachable from `roots`.
    pub fn resize_object<R>(&mut self, roots: &R, id: ObjId)
    where
        R: RootSource + ?Sized,
    {
        let old_size = self.heap.header(id).size();
        let new_size = self.heap.get(id).size();
        if old_size == new_size {
            return;
        }
        self.reallocate(roots, old_size, new_size);
        self.heap.resize(id, new_size);
    }

    // ========================================================================
    // Temporary roots
    // ========================================================================

    /// Protect a value across allocations until it is reachable from VM state
    pub fn push_root(&mut self, value: Value) {
        self.temp_roots.push(value);
    }

    /// Release the most recently pushed temporary root
    pub fn pop_root(&mut self) -> Option<Value> {
        self.temp_roots.pop()
    }

    /// Number of temporary roots
    pub fn temp_root_count(&self) -> usize {
        self.temp_roots.len()
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// Run a full collection; returns the number of objects freed
    pub fn collect<R>(&mut self, roots: &R) -> usize
    where
        R: RootSource + ?Sized,
    {
        let start = Instant::now();
        let before = self.heap.allocated_bytes();
        debug!(bytes = before, objects = self.heap.len(), "-- gc begin");

        // Mark and trace
        let mut tracer = Tracer::new(&mut self.heap, &mut self.gray);
        roots.mark_roots(&mut tracer);
        tracer.mark_values(&self.temp_roots);
        tracer.trace_references();
        let marked = tracer.marked_count();
        let blackened = tracer.blackened_count();

        // Weak references
        let purged = self.strings.remove_white(&self.heap);

        // Sweep
        let (freed, freed_bytes) = self.sweep();

        let live_bytes = self.heap.allocated_bytes();
        self.next_gc = live_bytes
            .saturating_mul(self.config.heap_grow_factor)
            .max(self.config.initial_threshold);

        self.stats.update(CycleReport {
            pause: start.elapsed(),
            marked,
            blackened,
            freed,
            freed_bytes,
            purged,
            live_objects: self.heap.len(),
            live_bytes,
        });

        debug!(
            collected = before - live_bytes,
            from = before,
            to = live_bytes,
            next = self.next_gc,
            freed,
            "-- gc end"
        );
        freed
    }

    /// Sweep phase: free unmarked objects
    /// Returns (freed_count, freed_bytes)
    fn sweep(&mut self) -> (usize, usize) {
        let mut freed_count = 0;
        let mut freed_bytes = 0;

        self.heap.sweep(|id, entry| {
            freed_bytes += entry.header.size();
            freed_count += 1;
            free_object(id, entry);
        });
        self.heap.sub_bytes(freed_bytes);

        (freed_count, freed_bytes)
    }

    /// Free every object and the worklist, unconditionally
    ///
    /// Called on VM shutdown; handles held by the caller are stale afterwards.
    pub fn free_objects(&mut self) {
        let mut freed_bytes = 0;
        self.heap.drain(|id, entry| {
            freed_bytes += entry.header.size();
            free_object(id, entry);
        });
        self.heap.sub_bytes(freed_bytes);
        self.strings.clear();
        self.temp_roots.clear();
        self.gray.release();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get read-only access to the heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Get mutable access to the heap (object contents only; registration
    /// and freeing stay with the collector)
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Get the intern table
    pub fn strings(&self) -> &InternTable {
        &self.strings
    }

    /// Get the gray worklist
    pub fn gray(&self) -> &GrayStack {
        &self.gray
    }

    /// Get GC statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Get heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        HeapStats {
            allocated_bytes: self.heap.allocated_bytes(),
            object_count: self.heap.len(),
            next_gc: self.next_gc,
            gray_capacity: self.gray.capacity(),
            interned_strings: self.strings.len(),
        }
    }
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new(GcConfig::default())
    }
}

impl Drop for GarbageCollector {
    fn drop(&mut self) {
        self.free_objects();
    }
}

/// Destroy one unreached object. Dropping the entry releases the variant's
/// owned buffers before the record itself.
fn free_object(id: ObjId, entry: HeapEntry) {
    trace!(id = %id, kind = ?entry.header.kind(), size = entry.header.size(), "free");
    drop(entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjClosure, ObjFunction};

    #[test]
    fn test_gc_creation() {
        let gc = GarbageCollector::default();
        let stats = gc.heap_stats();

        assert_eq!(stats.allocated_bytes, 0);
        assert_eq!(stats.object_count, 0);
        assert_eq!(stats.next_gc, crate::config::DEFAULT_GC_THRESHOLD);
    }

    #[test]
    fn test_gc_allocate() {
        let mut gc = GarbageCollector::new(GcConfig::default().with_stress(false));
        let id = gc.intern(&(), "hello");

        assert_eq!(gc.heap().string(id).as_str(), "hello");
        let stats = gc.heap_stats();
        assert_eq!(stats.object_count, 1);
        assert_eq!(stats.allocated_bytes, gc.heap().header(id).size());
    }

    #[test]
    fn test_intern_deduplicates() {
        let mut gc = GarbageCollector::new(GcConfig::default().with_stress(false));
        let a = gc.intern(&(), "same");
        let b = gc.take_string(&(), String::from("same"));

        assert_eq!(a, b);
        assert_eq!(gc.heap().len(), 1);
        assert_eq!(gc.strings().len(), 1);
    }

    #[test]
    fn test_gc_threshold() {
        let mut gc = GarbageCollector::new(GcConfig::default().with_stress(false));
        gc.set_threshold(1024 * 1024);

        // Allocate below threshold
        gc.intern(&(), "small");
        assert_eq!(gc.stats().collections, 0);
    }

    #[test]
    fn test_growth_past_threshold_collects() {
        let mut gc = GarbageCollector::new(GcConfig::default().with_stress(false));
        let garbage = gc.intern(&(), "garbage");
        gc.set_threshold(gc.heap().allocated_bytes());

        let kept = gc.intern(&(), "kept");
        assert_eq!(gc.stats().collections, 1);
        assert!(!gc.heap().contains(garbage));
        assert!(gc.heap().contains(kept));
    }

    #[test]
    fn test_stress_collects_on_every_growth() {
        let mut gc = GarbageCollector::new(GcConfig::stress());
        let roots: Vec<Value> = Vec::new();
        gc.intern(&roots, "a");
        gc.intern(&roots, "b");
        gc.intern(&roots, "c");
        assert_eq!(gc.stats().collections, 3);
    }

    #[test]
    fn test_shrinking_never_collects() {
        let mut gc = GarbageCollector::new(GcConfig::stress());
        gc.reallocate(&(), 0, 64);
        let collections = gc.stats().collections;

        gc.reallocate(&(), 64, 32);
        gc.reallocate(&(), 32, 0);
        assert_eq!(gc.stats().collections, collections);
        assert_eq!(gc.heap().allocated_bytes(), 0);
    }

    #[test]
    fn test_collect_empty_heap() {
        let mut gc = GarbageCollector::default();
        assert_eq!(gc.collect(&()), 0);
        assert_eq!(gc.stats().collections, 1);
        assert_eq!(gc.stats().last_freed_count, 0);
    }

    #[test]
    fn test_temp_roots_protect_objects() {
        let mut gc = GarbageCollector::new(GcConfig::stress());
        let name = gc.intern(&(), "f");
        gc.push_root(Value::obj(name));

        // This allocation collects first; `name` must survive it
        let function = gc.allocate(&(), ObjFunction::new(Some(name)));
        gc.push_root(Value::obj(function));
        assert!(gc.heap().contains(name));

        let closure = gc.allocate(&(), ObjClosure::new(function, 0));
        assert!(gc.heap().contains(function));
        assert_eq!(gc.temp_root_count(), 2);

        gc.pop_root();
        gc.pop_root();
        gc.collect(&());
        assert!(gc.heap().is_empty());
        assert!(!gc.heap().contains(closure));
    }

    #[test]
    fn test_resize_object_accounts_growth() {
        let mut gc = GarbageCollector::new(GcConfig::default().with_stress(false));
        let function = gc.allocate(&(), ObjFunction::new(None));
        let before = gc.heap().allocated_bytes();

        for i in 0..32 {
            gc.heap_mut()
                .function_mut(function)
                .chunk
                .add_constant(Value::number(i as f64));
        }
        gc.resize_object(&vec![Value::obj(function)], function);

        assert!(gc.heap().allocated_bytes() > before);
        assert_eq!(gc.heap().allocated_bytes(), gc.heap().header(function).size());
    }

    #[test]
    fn test_avg_pause_time() {
        let mut stats = GcStats::default();
        assert_eq!(stats.avg_pause_time(), Duration::ZERO);

        stats.collections = 4;
        stats.total_pause_time = Duration::from_secs(6);
        assert_eq!(stats.avg_pause_time(), Duration::from_millis(1500));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_avg_pause_time_past_u32_collections() {
        let stats = GcStats {
            collections: 1 << 33,
            total_pause_time: Duration::from_secs(1 << 33),
            ..GcStats::default()
        };
        assert_eq!(stats.avg_pause_time(), Duration::from_secs(1));
    }

    #[test]
    fn test_free_objects() {
        let mut gc = GarbageCollector::default();
        gc.intern(&(), "a");
        gc.intern(&(), "b");
        gc.free_objects();

        let stats = gc.heap_stats();
        assert_eq!(stats.object_count, 0);
        assert_eq!(stats.allocated_bytes, 0);
        assert_eq!(stats.interned_strings, 0);
        assert_eq!(stats.gray_capacity, 0);
    }
}
