//! End-to-End CLI Integration Tests
//!
//! Tests the complete bridge through the lua_cli Runtime API.
//! This is the highest level integration test - source code to final result.

use lua_cli::{render_error, ErrorFormat, Runtime};
use std::fs;

fn runtime() -> Runtime {
    Runtime::from_config_file(None, false)
        .expect("runtime creation failed")
        .with_echo(false)
}

/// Test: arithmetic through the interpreter
#[test]
fn test_e2e_arithmetic() {
    let mut runtime = runtime();
    let results = runtime
        .execute_string("return (10 + 20) * 2 - 18", "=e2e")
        .expect("Execution failed");
    assert_eq!(results, vec!["42"]);
}

/// Test: closures and string library
#[test]
fn test_e2e_closures() {
    let mut runtime = runtime();
    let source = r#"
        local function counter()
            local n = 0
            return function() n = n + 1 return n end
        end
        local next = counter()
        next() next()
        return string.format("%d calls", next())
    "#;
    let results = runtime.execute_string(source, "=closures").unwrap();
    assert_eq!(results, vec!["3 calls"]);
}

/// Test: host_print from inside a coroutine
#[test]
fn test_e2e_host_print_in_coroutine() {
    let mut runtime = runtime();
    let source = r#"
        local co = coroutine.wrap(function(a)
            host_print("got", a)
            local b = coroutine.yield(a + 1)
            host_print("got", b)
        end)
        co(1)
        co(10)
    "#;
    runtime.execute_string(source, "=co").unwrap();
    assert_eq!(runtime.output(), vec!["got\t1", "got\t10"]);
}

/// Test: a precompiled chunk file runs like its source
#[test]
fn test_e2e_binary_chunk_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunk.luac");

    let compiler = runtime();
    let lua = compiler.state();
    lua.load_str("return 'compiled'", "=chunk").unwrap();
    let mut file = fs::File::create(&path).unwrap();
    lua.dump(&mut file, true).unwrap();
    lua.pop(1).unwrap();
    drop(file);

    let mut runner = runtime();
    let results = runner.execute_file(path.to_str().unwrap()).unwrap();
    assert_eq!(results, vec!["compiled"]);
}

/// Test: a failure inside nested functions reports every frame
#[test]
fn test_e2e_error_report() {
    let mut runtime = runtime();
    let source = "local function inner() error('deep') end\nlocal function outer() inner() end\nouter()";
    let error = runtime.execute_string(source, "=nested").unwrap_err();
    let report = render_error(&error, ErrorFormat::Text);

    assert!(report.starts_with("Runtime error: nested:1: deep"));
    let frames: Vec<&str> = report.lines().filter(|l| l.starts_with("    at ")).collect();
    assert_eq!(frames.len(), 3);
    assert!(frames[2].contains("main chunk (nested:3)"));
}
