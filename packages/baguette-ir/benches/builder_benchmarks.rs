//! Builder and filter benchmarks
//!
//! Synthetic traces with file, registry and idle calls spread over several
//! processes, compiled with the standard toolchain.

use baguette_ir::features::trace_source::{CallRecord, ProcessRecord, ThreadRecord, TraceReport};
use baguette_ir::{Builder, FilterRegistry};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use std::sync::Arc;

fn record(api: &str, time: f64, arguments: Value) -> Arc<CallRecord> {
    Arc::new(CallRecord {
        api: api.to_string(),
        arguments: match arguments {
            Value::Object(map) => map.into_iter().collect(),
            _ => Default::default(),
        },
        time,
        ..CallRecord::default()
    })
}

/// `processes` processes with `calls` calls each, interleaved in time
fn synthetic_trace(processes: u32, calls: u32) -> TraceReport {
    let mut report = TraceReport {
        platform: "windows".to_string(),
        ..TraceReport::default()
    };
    report.host.address = "192.168.56.101".to_string();

    for p in 0..processes {
        let pid = 100 + p * 4;
        let records = (0..calls)
            .map(|i| {
                let time = i as f64 + p as f64 / processes as f64;
                let handle = format!("{:#x}", 0x40 + i * 4);
                match i % 4 {
                    0 => record(
                        "NtCreateFile",
                        time,
                        json!({"FileHandle": handle, "FileName": format!("C:\\work\\{}\\f{}.tmp", p, i % 64)}),
                    ),
                    1 => record("NtWriteFile", time, json!({"FileHandle": format!("{:#x}", 0x40 + (i - 1) * 4), "Buffer": "data"})),
                    2 => record(
                        "NtSetValueKey",
                        time,
                        json!({"regkey": format!("HKCU\\Software\\Bench\\{}\\V{}", p, i % 16), "Type": 4, "Buffer": i % 3}),
                    ),
                    _ => record("GetTickCount", time, json!({})),
                }
            })
            .collect();
        report.processes.push(ProcessRecord {
            pid,
            executable: Some(format!("C:\\work\\p{}.exe", p)),
            start: Some(0.0),
            threads: vec![ThreadRecord {
                tid: pid + 1,
                start: Some(0.0),
                stop: None,
                calls: records,
            }],
            ..ProcessRecord::default()
        });
    }
    report.tag_locations();
    report
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(20);

    for (processes, calls) in [(1u32, 500u32), (4, 500), (8, 2000)] {
        let trace = synthetic_trace(processes, calls);
        group.throughput(Throughput::Elements((processes * calls) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", processes, calls)),
            &trace,
            |b, trace| {
                b.iter(|| {
                    let baguette = Builder::standard().build(trace).unwrap();
                    black_box(baguette.stats().unwrap())
                });
            },
        );
    }
    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let trace = synthetic_trace(4, 2000);
    let registry = FilterRegistry::standard();
    let mut group = c.benchmark_group("filters");

    for name in registry.names() {
        let filter = registry.get(name).unwrap();
        group.bench_function(name, |b| {
            let mut baguette = Builder::standard().build(&trace).unwrap();
            b.iter(|| {
                let pruned = filter.apply(&mut baguette.store, baguette.graph).unwrap();
                baguette.store.drop_graph(pruned).unwrap();
                black_box(pruned)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_filters);
criterion_main!(benches);
