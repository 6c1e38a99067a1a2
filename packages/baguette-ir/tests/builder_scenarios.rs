//! End-to-end builds of small traces

mod common;

use baguette_ir::features::trace_source::ThreadRecord;
use baguette_ir::pipeline::{PipelineError, BUILDER_KEY, PLATFORM_KEY};
use baguette_ir::shared::models::{EdgeKind, RegValue, VertexData, VertexKind};
use baguette_ir::{BuildConfig, Builder, Toolchain};
use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn build(trace: &baguette_ir::TraceReport) -> baguette_ir::Baguette {
    Builder::standard().build(trace).expect("build succeeds")
}

#[test]
fn test_file_open_close() {
    let baguette = build(&file_open_close_trace());

    assert_vertex_count(&baguette, VertexKind::Process, 1);
    assert_vertex_count(&baguette, VertexKind::Thread, 1);
    assert_vertex_count(&baguette, VertexKind::Call, 2);
    assert_vertex_count(&baguette, VertexKind::File, 1);
    assert_vertex_count(&baguette, VertexKind::FileHandle, 1);
    assert_edge_count(&baguette, EdgeKind::FollowedBy, 1);

    let process = members(&baguette, VertexKind::Process)[0];
    let file = vertex_labelled(&baguette, VertexKind::File, "C:\\a\\b.txt");
    let handle = members(&baguette, VertexKind::FileHandle)[0];
    let create = call_named(&baguette, "NtCreateFile");
    let close = call_named(&baguette, "NtClose");

    assert_linked(&baguette, EdgeKind::FollowedBy, create, close);
    assert_linked(&baguette, EdgeKind::Designates, handle, file);
    assert_linked(&baguette, EdgeKind::OwnsHandle, process, handle);
    assert_linked(&baguette, EdgeKind::CreatesFile, create, handle);
    assert_linked(&baguette, EdgeKind::Closes, close, handle);
    assert!(baguette.store.data(handle).unwrap().as_handle().unwrap().closed);

    // no executable, but the process has calls of its own
    assert_linked(&baguette, EdgeKind::SpawnedProcess, baguette.host, process);
}

#[test]
fn test_registry_versioning() {
    let baguette = build(&registry_versioning_trace());

    let entries = members(&baguette, VertexKind::KeyEntry);
    assert_eq!(entries.len(), 2);
    let values: Vec<(u32, RegValue)> = entries
        .iter()
        .map(|e| {
            let data = baguette.store.data(*e).unwrap().as_entry().unwrap();
            (data.version, data.value.clone())
        })
        .collect();
    assert_eq!(
        values,
        vec![
            (0, RegValue::String("1".into())),
            (1, RegValue::String("2".into()))
        ]
    );
    assert_linked(&baguette, EdgeKind::ChangesTowards, entries[0], entries[1]);
    assert_edge_count(&baguette, EdgeKind::SetsEntry, 3);

    let key = vertex_labelled(&baguette, VertexKind::Key, "HKEY_LOCAL_MACHINE\\Software\\X");
    assert_linked(&baguette, EdgeKind::HasEntry, key, entries[0]);
    let hive = vertex_labelled(&baguette, VertexKind::Key, "HKEY_LOCAL_MACHINE");
    assert_linked(&baguette, EdgeKind::HasHive, baguette.host, hive);
}

#[test]
fn test_registry_delete_then_set_starts_new_version() {
    let trace = TraceBuilder::new()
        .process(
            ProcessBuilder::new(10).executable(SAMPLE).thread(thread(
                11,
                vec![
                    call(
                        "NtSetValueKey",
                        1.0,
                        json!({"regkey": "HKCU\\Software\\Y\\V", "Type": 4, "Buffer": 7}),
                    ),
                    call("NtDeleteValueKey", 2.0, json!({"regkey": "HKCU\\Software\\Y\\V"})),
                    call(
                        "NtSetValueKey",
                        3.0,
                        json!({"regkey": "HKCU\\Software\\Y\\V", "Type": 4, "Buffer": 7}),
                    ),
                    call("NtQueryValueKey", 4.0, json!({"regkey": "HKCU\\Software\\Y\\V"})),
                ],
            )),
        )
        .build();
    let baguette = build(&trace);

    let entries = members(&baguette, VertexKind::KeyEntry);
    assert_eq!(entries.len(), 2);
    let first = baguette.store.data(entries[0]).unwrap().as_entry().unwrap();
    assert!(first.deleted);
    let second = baguette.store.data(entries[1]).unwrap().as_entry().unwrap();
    assert_eq!((second.version, &second.value, second.deleted), (1, &RegValue::Int(7), false));
    assert_linked(&baguette, EdgeKind::QueriesEntry, call_named(&baguette, "NtQueryValueKey"), entries[1]);
}

#[test]
fn test_registry_delete_twice_keeps_one_version() {
    let trace = TraceBuilder::new()
        .process(
            ProcessBuilder::new(10).executable(SAMPLE).thread(thread(
                11,
                vec![
                    call(
                        "NtSetValueKey",
                        1.0,
                        json!({"regkey": "HKCU\\Software\\Y\\V", "Type": 4, "Buffer": 7}),
                    ),
                    call("NtDeleteValueKey", 2.0, json!({"regkey": "HKCU\\Software\\Y\\V"})),
                    call("NtDeleteValueKey", 3.0, json!({"regkey": "HKCU\\Software\\Y\\V"})),
                ],
            )),
        )
        .build();
    let baguette = build(&trace);

    let entries = members(&baguette, VertexKind::KeyEntry);
    assert_eq!(entries.len(), 1);
    assert!(baguette.store.data(entries[0]).unwrap().as_entry().unwrap().deleted);
    assert_edge_count(&baguette, EdgeKind::ChangesTowards, 0);
    assert_edge_count(&baguette, EdgeKind::DeletesEntry, 2);
    assert_eq!(baguette.store.in_neighbors(entries[0], EdgeKind::DeletesEntry).len(), 2);
}

#[test]
fn test_behavior_trace() {
    let baguette = build(&behavior_trace());

    // processes and the injected thread
    let sample = vertex_labelled(&baguette, VertexKind::Process, &format!("{} (10)", SAMPLE));
    let child = members(&baguette, VertexKind::Process)
        .into_iter()
        .find(|p| *p != sample)
        .unwrap();
    assert_linked(&baguette, EdgeKind::HasChildProcess, sample, child);
    assert_linked(&baguette, EdgeKind::CreatesProcess, call_named(&baguette, "CreateProcessInternalW"), child);
    let injected = vertex_labelled(&baguette, VertexKind::Thread, "tid 23");
    assert_linked(&baguette, EdgeKind::HasThread, child, injected);
    let edge = baguette
        .store
        .find_edge(EdgeKind::CreatesThread, call_named(&baguette, "CreateRemoteThread"), injected)
        .unwrap();
    assert_eq!(baguette.store.edge(edge).unwrap().attrs.get("remote"), Some(&json!(true)));

    // sample file, written payload, filesystem tree
    let sample_file = vertex_labelled(&baguette, VertexKind::File, SAMPLE);
    assert_linked(&baguette, EdgeKind::Executes, sample, sample_file);
    assert_vertex_count(&baguette, VertexKind::Data, 1);
    let drive = vertex_labelled(&baguette, VertexKind::Directory, "C:\\");
    assert_linked(&baguette, EdgeKind::HasDrive, baguette.host, drive);

    // persistence through the Run key points at the dropped file
    let dropped = vertex_labelled(&baguette, VertexKind::File, "C:\\Users\\analyst\\AppData\\drop.exe");
    let entry = members(&baguette, VertexKind::KeyEntry)[0];
    assert_linked(&baguette, EdgeKind::PointsToFile, entry, dropped);

    // imports, static and loaded
    let ws2 = vertex_labelled(&baguette, VertexKind::Import, "C:\\Windows\\System32\\ws2_32.dll");
    assert_linked(&baguette, EdgeKind::LoadsImport, call_named(&baguette, "LdrLoadDll"), ws2);
    assert_linked(&baguette, EdgeKind::Imports, sample, ws2);
    assert_vertex_count(&baguette, VertexKind::Import, 2);

    // network: the peer machine is reused, the looked up name is new
    let peer = vertex_labelled(&baguette, VertexKind::Host, "10.0.0.5");
    let connect = baguette
        .store
        .find_edge(EdgeKind::ConnectsTo, call_named(&baguette, "connect"), peer)
        .unwrap();
    assert_eq!(baguette.store.edge(connect).unwrap().attrs.get("port"), Some(&json!(443)));
    let resolved = vertex_labelled(&baguette, VertexKind::Host, "evil.example");
    assert_linked(&baguette, EdgeKind::ResolvesHost, call_named(&baguette, "getaddrinfo"), resolved);
    assert_vertex_count(&baguette, VertexKind::Host, 3);
}

#[test]
fn test_significant_calls_skip_effectless_ones() {
    let baguette = build(&behavior_trace());
    let write = call_named(&baguette, "NtWriteFile");
    let close = call_named(&baguette, "NtClose");
    let tick = call_named(&baguette, "GetTickCount");

    assert_linked(&baguette, EdgeKind::NextSignificantCall, write, close);
    assert!(baguette
        .store
        .in_neighbors(tick, EdgeKind::NextSignificantCall)
        .is_empty());
}

#[test]
fn test_chain_completeness() {
    let baguette = build(&behavior_trace());
    for thread in members(&baguette, VertexKind::Thread) {
        let data = baguette.store.data(thread).unwrap().as_thread().unwrap();
        let mut visited = Vec::new();
        let mut cursor = data.first;
        while let Some(call) = cursor {
            visited.push(call);
            cursor = baguette
                .store
                .out_neighbors(call, EdgeKind::FollowedBy)
                .first()
                .copied();
        }
        assert_eq!(visited.len(), data.n_calls);
        assert_eq!(visited.last().copied(), data.last);
    }
}

#[test]
fn test_temporal_ordering_across_processes() {
    let baguette = build(&behavior_trace());
    let times: Vec<f64> = baguette
        .ordered_calls
        .iter()
        .map(|c| baguette.store.data(*c).unwrap().as_call().unwrap().time())
        .collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    // the child's only call lands between the parent's calls
    let position = |api: &str| {
        baguette
            .ordered_calls
            .iter()
            .position(|c| *c == call_named(&baguette, api))
            .unwrap()
    };
    assert!(position("CreateProcessInternalW") < position("NtDelayExecution"));
    assert!(position("NtDelayExecution") < position("CreateRemoteThread"));
}

#[test]
fn test_unsorted_thread_calls_are_chained_by_time() {
    let trace = TraceBuilder::new()
        .process(ProcessBuilder::new(10).executable(SAMPLE).thread(thread(
            11,
            vec![
                call("B", 2.0, json!({})),
                call("A", 1.0, json!({})),
                call("C", 3.0, json!({})),
            ],
        )))
        .build();
    let baguette = build(&trace);
    assert_linked(&baguette, EdgeKind::FollowedBy, call_named(&baguette, "A"), call_named(&baguette, "B"));
    assert_linked(&baguette, EdgeKind::FollowedBy, call_named(&baguette, "B"), call_named(&baguette, "C"));
}

#[test]
fn test_phantom_process_removed() {
    let trace = TraceBuilder::new()
        .process(ProcessBuilder::new(10).executable(SAMPLE).thread(thread(
            11,
            vec![call("GetTickCount", 1.0, json!({}))],
        )))
        .process(ProcessBuilder::new(30).thread(thread(31, vec![])))
        .build();
    let baguette = build(&trace);

    assert_vertex_count(&baguette, VertexKind::Process, 1);
    assert_vertex_count(&baguette, VertexKind::Thread, 1);
    for process in members(&baguette, VertexKind::Process) {
        let data = baguette.store.data(process).unwrap().as_process().unwrap();
        assert!(data.executable.is_some());
    }
}

#[test]
fn test_opened_process_is_kept() {
    let trace = TraceBuilder::new()
        .process(ProcessBuilder::new(10).executable(SAMPLE).thread(thread(
            11,
            vec![call("NtOpenProcess", 1.0, json!({"ProcessId": 999, "ProcessHandle": "0x70"}))],
        )))
        .build();
    let baguette = build(&trace);

    assert_vertex_count(&baguette, VertexKind::Process, 2);
    assert_edge_count(&baguette, EdgeKind::OpensProcess, 1);
}

#[test]
fn test_opening_a_process_before_it_starts_targets_a_placeholder() {
    let trace = TraceBuilder::new()
        .process(ProcessBuilder::new(10).executable(SAMPLE).start(0.0).thread(thread(
            11,
            vec![call("NtOpenProcess", 1.0, json!({"ProcessId": 20, "ProcessHandle": "0x70"}))],
        )))
        .process(
            ProcessBuilder::new(20)
                .executable("C:\\Windows\\notepad.exe")
                .start(5.0)
                .thread(thread(21, vec![call("GetTickCount", 6.0, json!({}))])),
        )
        .build();
    let baguette = build(&trace);

    let opens = baguette.store.edge_extent(EdgeKind::OpensProcess)[0];
    let target = baguette.store.edge(opens).unwrap().target;
    let data = baguette.store.data(target).unwrap().as_process().unwrap();
    assert_eq!(data.pid, 20);
    assert_eq!(data.executable, None);
    assert_vertex_count(&baguette, VertexKind::Process, 3);
}

#[test]
fn test_injection_target_keeps_its_evidence() {
    let trace = TraceBuilder::new()
        .process(ProcessBuilder::new(10).executable(SAMPLE).thread(thread(
            11,
            vec![
                call("NtOpenProcess", 1.0, json!({"ProcessId": 999, "ProcessHandle": "0x70"})),
                call("CreateRemoteThread", 2.0, json!({"ProcessHandle": "0x70", "ThreadId": 5})),
            ],
        )))
        .build();
    let baguette = build(&trace);

    assert_vertex_count(&baguette, VertexKind::Process, 2);
    assert_vertex_count(&baguette, VertexKind::Thread, 2);
    assert_edge_count(&baguette, EdgeKind::OpensProcess, 1);
    assert_edge_count(&baguette, EdgeKind::CreatesThread, 1);

    let creates = baguette.store.edge_extent(EdgeKind::CreatesThread)[0];
    assert_eq!(baguette.store.edge(creates).unwrap().attrs["remote"], json!(true));
    let injected = baguette.store.edge(creates).unwrap().target;
    let owner = baguette.store.single_in(injected, EdgeKind::HasThread).unwrap();
    let data = baguette.store.data(owner).unwrap().as_process().unwrap();
    assert_eq!(data.pid, 999);
}

#[test]
fn test_same_tid_in_two_processes_stays_apart() {
    let trace = TraceBuilder::new()
        .process(ProcessBuilder::new(10).executable(SAMPLE).thread(ThreadRecord {
            tid: 5,
            start: None,
            stop: None,
            calls: vec![call("A", 1.0, json!({})), call("B", 2.0, json!({}))],
        }))
        .process(
            ProcessBuilder::new(20)
                .parent(10)
                .executable("C:\\Windows\\notepad.exe")
                .thread(ThreadRecord {
                    tid: 5,
                    start: None,
                    stop: None,
                    calls: vec![call("C", 3.0, json!({}))],
                }),
        )
        .build();
    let baguette = build(&trace);

    assert_vertex_count(&baguette, VertexKind::Thread, 2);
    assert_edge_count(&baguette, EdgeKind::FollowedBy, 1);
    let b = call_named(&baguette, "B");
    let c = call_named(&baguette, "C");
    assert!(baguette.store.find_edge(EdgeKind::FollowedBy, b, c).is_none());

    let owner = |api: &str| {
        let call = call_named(&baguette, api);
        let thread = baguette.store.data(call).unwrap().as_call().unwrap().thread.unwrap();
        baguette.store.single_in(thread, EdgeKind::HasThread).unwrap()
    };
    assert_ne!(owner("A"), owner("C"));
    assert_eq!(owner("A"), owner("B"));
}

#[test]
fn test_filesystem_tree_well_formed() {
    let baguette = build(&behavior_trace());
    let mut nodes = members(&baguette, VertexKind::File);
    nodes.extend(members(&baguette, VertexKind::Directory));
    for node in nodes {
        let data = baguette.store.data(node).unwrap().as_path().unwrap().clone();
        let path = baguette_ir::features::filesystem::FsPath::parse(&data.path, baguette.platform).unwrap();
        assert_eq!(
            baguette_ir::features::filesystem::walk(&baguette.store, baguette.host, &path),
            Some(node),
            "{} not reachable from the host",
            data.path
        );
        let parents = baguette.store.in_neighbors(node, EdgeKind::Contains).len()
            + baguette.store.in_neighbors(node, EdgeKind::HasDrive).len();
        assert_eq!(parents, 1, "{} has {} parents", data.path, parents);
    }
}

#[test]
fn test_teardown_and_graph_data() {
    let baguette = build(&file_open_close_trace());
    let view = baguette.view().unwrap();
    assert!(!view.data.contains_key(BUILDER_KEY));
    assert_eq!(view.data.get(PLATFORM_KEY), Some(&json!("windows")));
    assert!(baguette.store.active_graphs().is_empty());
}

#[test]
fn test_progress_reaches_completion() {
    let builder = Builder::standard();
    builder.build(&behavior_trace()).unwrap();
    let progress = builder.progress();
    assert_eq!(progress.done(), progress.total());
    assert!((progress.ratio() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_source_data_errors_do_not_abort() {
    let trace = TraceBuilder::new()
        .process(ProcessBuilder::new(10).executable(SAMPLE).thread(thread(
            11,
            vec![
                call("NtReadFile", 1.0, json!({"FileHandle": "0x999"})),
                call("RegEnumKeyExW", 1.1, json!({"hKey": "0x1234"})),
                call("NtCreateFile", 1.2, json!({"FileHandle": "0x40", "FileName": "relative.txt"})),
                failed_call("NtCreateFile", 1.3, json!({"FileHandle": "0x44", "FileName": "C:\\x.txt"})),
            ],
        )))
        .build();
    let baguette = build(&trace);
    assert_vertex_count(&baguette, VertexKind::Call, 4);
    assert_vertex_count(&baguette, VertexKind::FileHandle, 0);
    assert_vertex_count(&baguette, VertexKind::Key, 0);
}

#[test]
fn test_finalizers_can_be_disabled() {
    let config = BuildConfig::default().with_finalizers(false);
    let baguette = Builder::new(Toolchain::global(), config)
        .build(&file_open_close_trace())
        .unwrap();
    assert_vertex_count(&baguette, VertexKind::Directory, 0);
    assert_edge_count(&baguette, EdgeKind::HasDrive, 0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = BuildConfig {
        system_directory: String::new(),
        ..BuildConfig::default()
    };
    let err = Builder::new(Toolchain::global(), config)
        .build(&file_open_close_trace())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn test_sample_without_process_is_tolerated() {
    let trace = TraceBuilder::new()
        .sample("C:\\elsewhere\\other.exe")
        .process(ProcessBuilder::new(10).executable(SAMPLE).thread(thread(
            11,
            vec![call("GetTickCount", 1.0, json!({}))],
        )))
        .build();
    let baguette = build(&trace);
    let file = vertex_labelled(&baguette, VertexKind::File, "C:\\elsewhere\\other.exe");
    assert!(baguette.store.in_neighbors(file, EdgeKind::Executes).is_empty());
    match baguette.store.data(file).unwrap() {
        VertexData::File(data) => assert_eq!(data.exists, Some(true)),
        other => panic!("unexpected {:?}", other),
    }
}
