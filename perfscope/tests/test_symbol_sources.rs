//! Integration tests for external symbol sources
//!
//! `nm` is stood in for by `sh`: `sh -a -C <script>` runs the script with two
//! harmless shell options, so a script that echoes symbol lines behaves like
//! `nm -a -C <binary>`.

mod common;

use common::{fake_nm_script, PerfFileBuilder, SampleSpec, DEFAULT_SAMPLE_TYPE};
use log::Level;
use perfscope::config::SessionConfig;
use perfscope::domain::SymbolSourceError;
use perfscope::symbolization::{
    load_symbols, FunctionKind, NmProcess, SymbolFile, SymbolTable,
};
use perfscope::{ProfileSession, SessionLog};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

const APP_BASE: u64 = 0x40_0000;
const LIB_BASE: u64 = 0x7f00_0000;

fn sh_config() -> SessionConfig {
    SessionConfig {
        nm_program: "sh".to_string(),
        kernel_symbols: None,
        debug_library_root: None,
        ..SessionConfig::default()
    }
}

/// Logger that keeps every message for inspection
fn capturing_log() -> (SessionLog, Arc<Mutex<Vec<(Level, String)>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let log = SessionLog::new(move |level, message| {
        sink.lock().unwrap().push((level, message.to_string()));
    });
    (log, lines)
}

#[test]
fn test_nm_process_reads_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_nm_script(
        dir.path(),
        "app",
        &[
            "0000000000401000 T main",
            "0000000000401100 t helper",
            "0000000000402000 W weak_hook",
            "0000000000603000 D global_counter",
            "                 U printf",
        ],
    );

    let mut table = SymbolTable::new();
    let added = load_symbols(&mut NmProcess::new("sh", &binary), &mut table).unwrap();
    table.sort();

    assert_eq!(added, 3);
    let names: Vec<&str> = table.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["main", "helper", "weak_hook"]);
    assert_eq!(table.lookup(0x40_1050).unwrap().name, "main");
    assert_eq!(table.lookup(0x40_2000).unwrap().kind, FunctionKind::Weak);
}

#[test]
fn test_nm_failure_reports_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("broken");
    std::fs::write(&script, "echo '0000000000401000 T partial'\nexit 3\n").unwrap();

    let mut table = SymbolTable::new();
    let err = load_symbols(&mut NmProcess::new("sh", &script), &mut table).unwrap_err();
    assert!(matches!(err, SymbolSourceError::ProcessFailed { .. }), "got {err:?}");
    // Lines read before the failure are kept
    assert_eq!(table.len(), 1);
}

#[test]
fn test_missing_nm_program_is_a_spawn_error() {
    let mut table = SymbolTable::new();
    let mut nm = NmProcess::new("/nonexistent/bin/nm", "/bin/true");
    let err = load_symbols(&mut nm, &mut table).unwrap_err();
    assert!(matches!(err, SymbolSourceError::Spawn { .. }), "got {err:?}");
    assert!(table.is_empty());
}

#[test]
fn test_kernel_symbol_file_overrides_kind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kallsyms");
    std::fs::write(
        &path,
        "ffffffff81000000 T _stext\nffffffff81000100 t do_one_initcall\nffffffff82000000 d data\n",
    )
    .unwrap();

    let mut table = SymbolTable::new();
    let added = load_symbols(&mut SymbolFile::kernel(&path), &mut table).unwrap();
    assert_eq!(added, 2);
    assert!(table.entries().iter().all(|e| e.kind == FunctionKind::Kernel));

    let missing = load_symbols(&mut SymbolFile::new(dir.path().join("absent")), &mut table);
    assert!(matches!(missing, Err(SymbolSourceError::Open { .. })));
}

#[test]
fn test_session_uses_nm_for_the_binary() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_nm_script(dir.path(), "app", &["0000000000401000 T main", "0000000000402000 T work"]);

    let bytes = PerfFileBuilder::new(DEFAULT_SAMPLE_TYPE)
        .mmap(APP_BASE, 0x1_0000, "/usr/bin/app", 0)
        .sample(&SampleSpec::at(0, 0x40_2010, &[0x40_1010]))
        .build();

    let session = ProfileSession::builder()
        .config(sh_config())
        .logger(SessionLog::silent())
        .binary(&binary)
        .load_from(&mut Cursor::new(bytes))
        .unwrap();

    let names: Vec<&str> =
        session.function_table().iter().map(|(_, entry)| entry.name.as_str()).collect();
    assert_eq!(names, vec!["main", "work"]);
}

#[test]
fn test_debug_libraries_are_relocated_to_their_mapping() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("lib")).unwrap();
    fake_nm_script(&root.path().join("lib"), "libfoo.so", &["0000000000000100 T foo_entry"]);

    let bytes = PerfFileBuilder::new(DEFAULT_SAMPLE_TYPE)
        .mmap(LIB_BASE, 0x1_0000, "/lib/libfoo.so", 0)
        .mmap(APP_BASE, 0x1_0000, "/usr/bin/app-without-debug-info", 0)
        .sample(&SampleSpec::at(0, LIB_BASE + 0x110, &[]))
        .build();

    let config = SessionConfig {
        debug_library_root: Some(root.path().to_path_buf()),
        ..sh_config()
    };
    let session = ProfileSession::builder()
        .config(config)
        .logger(SessionLog::silent())
        .load_from(&mut Cursor::new(bytes))
        .unwrap();

    let (_, entry) = session.function_table().resolve(LIB_BASE + 0x110).unwrap();
    assert_eq!(entry.name, "foo_entry");
    assert_eq!(entry.address, LIB_BASE + 0x100);
}

#[test]
fn test_failing_sources_are_logged_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        nm_program: "/nonexistent/bin/nm".to_string(),
        kernel_symbols: Some(dir.path().join("no-kallsyms")),
        debug_library_root: None,
        ..SessionConfig::default()
    };
    let (log, lines) = capturing_log();

    let bytes = PerfFileBuilder::new(DEFAULT_SAMPLE_TYPE)
        .mmap(APP_BASE, 0x1_0000, "/usr/bin/app", 0)
        .sample(&SampleSpec::at(0, APP_BASE + 0x10, &[]))
        .build();

    let session = ProfileSession::builder()
        .config(config)
        .logger(log)
        .binary(dir.path().join("app"))
        .load_from(&mut Cursor::new(bytes))
        .expect("symbol source failures must not abort the load");

    let errors: Vec<String> = lines
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, _)| *level == Level::Error)
        .map(|(_, message)| message.clone())
        .collect();
    assert_eq!(errors.len(), 2, "got {errors:?}");
    assert!(errors[0].contains("/nonexistent/bin/nm"));
    assert!(errors[1].contains("no-kallsyms"));

    // With no symbols at all the sample still gets a placeholder
    let (_, entry) = session.function_table().resolve(APP_BASE + 0x10).unwrap();
    assert_eq!(entry.name, "app+0x10");
    assert_eq!(entry.kind, FunctionKind::Unresolved);
}
