//! End-to-end tests that exercise the `mpascalc` binary against real
//! source files, covering the driver's own I/O surface (stdin/file
//! reading, `-o` output redirection, exit codes).

use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn mpascalc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mpascalc"))
}

fn write_source(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn compiles_to_stdout_by_default() {
    let dir = tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "prog.pas",
        "program p; var x: integer; begin x := 2 + 3 * 4; writeln(x); end.",
    );

    let output = mpascalc().arg(&src).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("START\n"));
    assert!(stdout.trim_end().ends_with("STOP"));
    assert!(stdout.contains("WRITEI"));
}

#[test]
fn writes_to_output_file_when_o_is_given() {
    let dir = tempdir().unwrap();
    let src = write_source(dir.path(), "prog.pas", "program p; begin end.");
    let out_path = dir.path().join("prog.vm");

    let status = mpascalc().arg(&src).arg("-o").arg(&out_path).status().unwrap();
    assert!(status.success());

    let contents = fs::read_to_string(&out_path).unwrap();
    assert!(contents.starts_with("START\n"));
    assert!(contents.ends_with("STOP\n"));
}

#[test]
fn rejects_undeclared_identifier_with_nonzero_exit() {
    let dir = tempdir().unwrap();
    let src = write_source(dir.path(), "bad.pas", "program p; begin x := 1; end.");

    let output = mpascalc().arg(&src).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Undeclared identifier 'x'"));
}

#[test]
fn function_call_round_trips_through_the_binary() {
    let dir = tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "fn.pas",
        "program p; function sq(n: integer): integer; begin sq := n*n; end; var x: integer; begin x := sq(7); writeln(x); end.",
    );

    let output = mpascalc().arg(&src).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("FNsq:"));
    assert!(stdout.contains("CALL"));
    assert!(stdout.contains("RETURN"));
}

#[test]
fn string_length_scenario() {
    let dir = tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "len.pas",
        "program p; var s: string; begin s := 'abc'; writeln(length(s)); end.",
    );

    let output = mpascalc().arg(&src).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("STRLEN"));
}

#[test]
fn verbose_flag_traces_phases_to_stderr() {
    let dir = tempdir().unwrap();
    let src = write_source(dir.path(), "prog.pas", "program p; begin end.");

    let output = mpascalc().arg(&src).arg("--verbose").output().unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("lexing"));
    assert!(stderr.contains("code generation"));
}

#[test]
fn syntax_error_reports_line_number() {
    let dir = tempdir().unwrap();
    let src = write_source(dir.path(), "bad.pas", "program p; begin x := ; end.");

    let output = mpascalc().arg(&src).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("syntax error at line"));
}
