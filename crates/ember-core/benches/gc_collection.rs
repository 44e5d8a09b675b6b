use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ember_core::{GcConfig, Value, Vm};

fn build_wide(width: usize) -> Vm {
    let config = GcConfig::default()
        .with_stress(false)
        .with_threshold(usize::MAX / 2);
    let mut vm = Vm::with_config(config);
    let root = vm.begin_function(None);
    for i in 0..width {
        let name = vm.take_string(format!("fn{}", i));
        let function = vm.new_function(Some(name));
        vm.add_constant(root, Value::obj(function));
    }
    vm
}

fn bench_collect_live(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_live");

    for width in [100, 1_000, 10_000] {
        let mut vm = build_wide(width);
        group.throughput(Throughput::Elements((2 * width + 1) as u64));
        group.bench_with_input(BenchmarkId::new("wide", width), &width, |b, _| {
            b.iter(|| black_box(vm.collect_garbage()));
        });
    }
    group.finish();
}

fn bench_collect_garbage(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_garbage");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("strings", count), &count, |b, &count| {
            b.iter(|| {
                let mut vm = Vm::with_config(GcConfig::default().with_stress(false));
                for i in 0..count {
                    vm.take_string(format!("s{}", i));
                }
                black_box(vm.collect_garbage())
            });
        });
    }
    group.finish();
}

fn bench_stress_allocation(c: &mut Criterion) {
    c.bench_function("stress_allocate_constants", |b| {
        b.iter(|| {
            let mut vm = Vm::with_config(GcConfig::stress());
            let script = vm.begin_function(None);
            for i in 0..64 {
                let s = vm.take_string(format!("k{}", i));
                vm.add_constant(script, Value::obj(s));
            }
            black_box(vm.gc_stats().collections)
        });
    });
}

criterion_group!(
    benches,
    bench_collect_live,
    bench_collect_garbage,
    bench_stress_allocation
);

criterion_main!(benches);
