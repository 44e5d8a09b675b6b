//! Property tests: survivors of a collection are exactly the objects
//! reachable from the roots

use ember_core::{
    GarbageCollector, GcConfig, Heap, HeapObject, ObjFunction, ObjId, UpvalueLocation, Value, Vm,
};
use proptest::prelude::*;
use std::collections::{HashSet, VecDeque};

/// Breadth-first walk over the object graph, independent of the tracer
fn reachable(heap: &Heap, roots: impl IntoIterator<Item = ObjId>) -> HashSet<ObjId> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<ObjId> = roots.into_iter().collect();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let mut edges = Vec::new();
        match heap.get(id) {
            HeapObject::String(_) | HeapObject::Native(_) => {}
            HeapObject::Function(function) => {
                edges.extend(function.name);
                edges.extend(function.chunk.constants.iter().filter_map(|v| v.as_obj()));
            }
            HeapObject::Closure(closure) => {
                edges.push(closure.function);
                edges.extend(closure.upvalues.iter().flatten());
            }
            HeapObject::Upvalue(upvalue) => {
                if let UpvalueLocation::Closed(value) = upvalue.location {
                    edges.extend(value.as_obj());
                }
            }
        }
        queue.extend(edges);
    }
    seen
}

#[derive(Debug, Clone)]
enum Op {
    /// Intern a string and bind it as a global
    Global(u8),
    /// Intern a string and drop it
    Garbage(u8),
    /// Add a string constant to the script
    StringConstant(u8),
    /// Add a fresh function constant to the script
    FunctionConstant,
    /// Wrap the script in a closure and bind it as a global
    Closure(u8),
    /// Remove a global
    Remove(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..16).prop_map(Op::Global),
        (0u8..16).prop_map(Op::Garbage),
        (0u8..16).prop_map(Op::StringConstant),
        Just(Op::FunctionConstant),
        (0u8..16).prop_map(Op::Closure),
        (0u8..16).prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_survivors_match_reachability(
        is_function in prop::collection::vec(any::<bool>(), 1..40),
        edges in prop::collection::vec((any::<usize>(), any::<usize>()), 0..120),
        roots in prop::collection::vec(any::<usize>(), 0..8),
    ) {
        let n = is_function.len();
        let config = GcConfig::default()
            .with_stress(false)
            .with_threshold(usize::MAX / 2);
        let mut gc = GarbageCollector::new(config);

        let ids: Vec<ObjId> = is_function
            .iter()
            .enumerate()
            .map(|(i, &function)| {
                if function {
                    gc.allocate(&(), ObjFunction::new(None))
                } else {
                    gc.take_string(&(), format!("node{}", i))
                }
            })
            .collect();

        for &(from, to) in &edges {
            let (from, to) = (from % n, to % n);
            if is_function[from] {
                gc.heap_mut()
                    .function_mut(ids[from])
                    .chunk
                    .add_constant(Value::obj(ids[to]));
            }
        }

        let roots: Vec<Value> = roots.iter().map(|&r| Value::obj(ids[r % n])).collect();
        let expected = reachable(gc.heap(), roots.iter().filter_map(|v| v.as_obj()));

        let freed = gc.collect(&roots);

        prop_assert_eq!(freed, n - expected.len());
        for &id in &ids {
            prop_assert_eq!(gc.heap().contains(id), expected.contains(&id));
        }
        for (_, header, _) in gc.heap().iter() {
            prop_assert!(!header.is_marked());
        }
        let live_strings = gc
            .heap()
            .iter()
            .filter(|(_, _, object)| object.as_string().is_some())
            .count();
        prop_assert_eq!(gc.strings().len(), live_strings);
        prop_assert_eq!(gc.stats().last_marked_count, expected.len());
        prop_assert_eq!(gc.stats().last_blackened_count, expected.len());
    }

    #[test]
    fn prop_stress_mode_keeps_roots(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut vm = Vm::with_config(GcConfig::stress());
        let script = vm.begin_function(None);

        for op in ops {
            match op {
                Op::Global(k) => {
                    let name = vm.take_string(format!("g{}", k));
                    vm.define_global(name, Value::number(f64::from(k)));
                }
                Op::Garbage(k) => {
                    vm.take_string(format!("tmp{}", k));
                }
                Op::StringConstant(k) => {
                    let s = vm.take_string(format!("c{}", k));
                    vm.add_constant(script, Value::obj(s));
                }
                Op::FunctionConstant => {
                    let f = vm.new_function(None);
                    vm.add_constant(script, Value::obj(f));
                }
                Op::Closure(k) => {
                    let closure = vm.new_closure(script);
                    vm.push(Value::obj(closure)).unwrap();
                    let name = vm.take_string(format!("g{}", k));
                    vm.define_global(name, Value::obj(closure));
                    vm.pop().unwrap();
                }
                Op::Remove(k) => {
                    let name = vm.take_string(format!("g{}", k));
                    vm.remove_global(name);
                }
            }

            // Every object a root refers to is still live
            let mut roots: Vec<ObjId> = vm.state().globals.iter().map(|(k, _)| k).collect();
            roots.extend(vm.state().globals.iter().filter_map(|(_, v)| v.as_obj()));
            roots.push(script);
            for id in reachable(vm.heap(), roots) {
                prop_assert!(vm.heap().contains(id));
            }
        }

        vm.collect_garbage();
        let mut roots: Vec<ObjId> = vm.state().globals.iter().map(|(k, _)| k).collect();
        roots.extend(vm.state().globals.iter().filter_map(|(_, v)| v.as_obj()));
        roots.push(script);
        let expected = reachable(vm.heap(), roots);
        prop_assert_eq!(vm.heap().len(), expected.len());
        for id in vm.gc().strings().ids() {
            prop_assert!(vm.heap().contains(id));
        }
    }
}
