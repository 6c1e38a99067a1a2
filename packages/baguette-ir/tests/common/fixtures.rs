//! Ready-made traces

use super::builders::*;
use baguette_ir::features::trace_source::TraceReport;
use serde_json::json;

pub const SAMPLE: &str = "C:\\Users\\analyst\\sample.exe";

/// PID 10 creates `C:\a\b.txt` and closes the handle
pub fn file_open_close_trace() -> TraceReport {
    TraceBuilder::new()
        .process(
            ProcessBuilder::new(10).start(1.0).thread(thread(
                11,
                vec![
                    call(
                        "NtCreateFile",
                        1.1,
                        json!({"FileHandle": "0x40", "FileName": "C:\\a\\b.txt"}),
                    ),
                    call("NtClose", 1.2, json!({"Handle": "0x40"})),
                ],
            )),
        )
        .build()
}

/// HKLM\Software\X value V set to "1", "1" again, then "2"
pub fn registry_versioning_trace() -> TraceReport {
    let set = |time: f64, data: &str| {
        call(
            "RegSetValueExW",
            time,
            json!({"hKey": "0x100", "lpValueName": "V", "dwType": 1, "lpData": data}),
        )
    };
    TraceBuilder::new()
        .process(
            ProcessBuilder::new(10)
                .executable(SAMPLE)
                .start(1.0)
                .thread(thread(
                    11,
                    vec![
                        call(
                            "RegOpenKeyExW",
                            1.1,
                            json!({"hKey": "0x80000002", "lpSubKey": "Software\\X", "phkResult": "0x100"}),
                        ),
                        set(1.2, "1"),
                        set(1.3, "1"),
                        set(1.4, "2"),
                    ],
                )),
        )
        .build()
}

/// Sample (PID 10) spawning PID 20 and injecting a thread into it, writing a
/// file, persisting it through a Run key, and talking to the network
pub fn behavior_trace() -> TraceReport {
    let dropped = "C:\\Users\\analyst\\AppData\\drop.exe";
    TraceBuilder::new()
        .machine("10.0.0.5")
        .sample(SAMPLE)
        .process(
            ProcessBuilder::new(10)
                .executable(SAMPLE)
                .start(1.0)
                .import("C:\\Windows\\System32\\kernel32.dll")
                .thread(thread(
                    11,
                    vec![
                        call(
                            "NtCreateFile",
                            1.10,
                            json!({"FileHandle": "0x40", "FileName": dropped}),
                        ),
                        call(
                            "NtWriteFile",
                            1.11,
                            json!({"FileHandle": "0x40", "Buffer": "MZ\u{90}payload"}),
                        ),
                        call("NtClose", 1.12, json!({"Handle": "0x40"})),
                        call(
                            "CreateProcessInternalW",
                            1.20,
                            json!({"ProcessId": 20, "ProcessHandle": "0x60", "ApplicationName": dropped}),
                        ),
                        call(
                            "CreateRemoteThread",
                            1.30,
                            json!({"ProcessHandle": "0x60", "ThreadId": 23}),
                        ),
                        call(
                            "RegCreateKeyExW",
                            1.40,
                            json!({"hKey": "0x80000001", "lpSubKey": "Software\\Microsoft\\Windows\\CurrentVersion\\Run", "phkResult": "0x80"}),
                        ),
                        call(
                            "RegSetValueExW",
                            1.41,
                            json!({"hKey": "0x80", "lpValueName": "updater", "dwType": "REG_SZ", "lpData": format!("\"{}\" -quiet", dropped)}),
                        ),
                        call("LdrLoadDll", 1.50, json!({"FileName": "ws2_32.dll"})),
                        call("connect", 1.60, json!({"ip_address": "10.0.0.5", "port": 443})),
                        call("getaddrinfo", 1.61, json!({"hostname": "evil.example"})),
                        call("GetTickCount", 1.70, json!({})),
                    ],
                )),
        )
        .process(
            ProcessBuilder::new(20)
                .parent(10)
                .executable(dropped)
                .start(1.25)
                .thread(thread(
                    21,
                    vec![call("NtDelayExecution", 1.26, json!({"Milliseconds": 100}))],
                )),
        )
        .build()
}
