//! Property-based tests for the build pipeline

mod common;

use baguette_ir::shared::models::{EdgeKind, VertexKind};
use baguette_ir::Builder;
use common::*;
use proptest::prelude::*;
use serde_json::json;

/// Calls per thread as (time in ms, API index)
fn threads_strategy() -> impl Strategy<Value = Vec<Vec<(u32, u8)>>> {
    prop::collection::vec(prop::collection::vec((0u32..1000, 0u8..4), 0..12), 1..5)
}

fn trace_from(threads: &[Vec<(u32, u8)>]) -> baguette_ir::TraceReport {
    const APIS: [&str; 4] = ["GetTickCount", "Sleep", "NtDelayExecution", "GetVersion"];
    let mut builder = TraceBuilder::new();
    for (i, calls) in threads.iter().enumerate() {
        let pid = 100 + i as u32;
        let records = calls
            .iter()
            .map(|(ms, api)| call(APIS[*api as usize], *ms as f64 / 1000.0, json!({})))
            .collect();
        builder = builder.process(
            ProcessBuilder::new(pid)
                .executable(&format!("C:\\p{}.exe", pid))
                .thread(thread(pid + 1, records)),
        );
    }
    builder.build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_calls_integrated_in_time_order(threads in threads_strategy()) {
        let trace = trace_from(&threads);
        let baguette = Builder::standard().build(&trace).unwrap();

        let expected: usize = threads.iter().map(Vec::len).sum();
        prop_assert_eq!(baguette.ordered_calls.len(), expected);
        let times: Vec<f64> = baguette
            .ordered_calls
            .iter()
            .map(|c| baguette.store.data(*c).unwrap().as_call().unwrap().time())
            .collect();
        prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn prop_thread_chains_are_complete(threads in threads_strategy()) {
        let trace = trace_from(&threads);
        let baguette = Builder::standard().build(&trace).unwrap();

        for thread in baguette.members(VertexKind::Thread) {
            let data = baguette.store.data(thread).unwrap().as_thread().unwrap();
            let mut walked = 0;
            let mut last = None;
            let mut cursor = data.first;
            while let Some(call) = cursor {
                walked += 1;
                last = Some(call);
                cursor = baguette.store.out_neighbors(call, EdgeKind::FollowedBy).first().copied();
            }
            prop_assert_eq!(walked, data.n_calls);
            prop_assert_eq!(last, data.last);
        }
    }

    #[test]
    fn prop_entry_versions_follow_value_changes(values in prop::collection::vec(0u8..3, 1..10)) {
        let calls = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                call(
                    "NtSetValueKey",
                    1.0 + i as f64,
                    json!({"regkey": "HKLM\\Software\\P\\V", "Type": 1, "Buffer": v.to_string()}),
                )
            })
            .collect();
        let trace = TraceBuilder::new()
            .process(ProcessBuilder::new(10).executable(SAMPLE).thread(thread(11, calls)))
            .build();
        let baguette = Builder::standard().build(&trace).unwrap();

        let changes = values.windows(2).filter(|w| w[0] != w[1]).count();
        prop_assert_eq!(baguette.members(VertexKind::KeyEntry).len(), changes + 1);
        prop_assert_eq!(edge_count(&baguette, EdgeKind::ChangesTowards), changes);
    }
}
