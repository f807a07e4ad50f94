//! End-to-end checks of the `quasi` binary.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

/// Writes `source` to a scratch file unique to `name`.
fn scratch(name: &str, source: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("quasi-cli-{}-{name}.hy", std::process::id()));
    fs::write(&path, source).unwrap();
    path
}

fn quasi() -> Command {
    Command::cargo_bin("quasi").unwrap()
}

const MAC: &str = "(defmacro mac [a b] \"Moves a to the end of b.\" `(~@b ~a))\n(mac (a b) (mac 5))\n";

#[test]
fn gensym_prints_fresh_names() {
    quasi()
        .args(["gensym", "tmp", "-n", "3"])
        .assert()
        .success()
        .stdout("_hy_gensym_tmp_1\n_hy_gensym_tmp_2\n_hy_gensym_tmp_3\n");
}

#[test]
fn expand_and_expand_once_differ() {
    let file = scratch("expand", MAC);
    quasi()
        .arg("expand")
        .arg(&file)
        .assert()
        .success()
        .stdout("(a b 5)\n");
    quasi()
        .arg("expand-1")
        .arg(&file)
        .assert()
        .success()
        .stdout("(mac 5 (a b))\n");
    let _ = fs::remove_file(file);
}

#[test]
fn step_limit_flag_aborts_runaway_expansion() {
    let file = scratch("limit", "(defmacro forever [] `(forever))\n(forever)\n");
    quasi()
        .args(["--step-limit", "5", "expand"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("quasi::macros::step_limit"));
    let _ = fs::remove_file(file);
}

#[test]
fn trace_shows_each_step() {
    let file = scratch("trace", MAC);
    quasi()
        .arg("trace")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("Step 0: mac").and(contains("Step 1: mac")));
    let _ = fs::remove_file(file);
}

#[test]
fn disassemble_codegen_prints_host_source() {
    let file = scratch("dis", "(+ 2 2)\n");
    quasi()
        .args(["disassemble", "--codegen"])
        .arg(&file)
        .assert()
        .success()
        .stdout("2 + 2\n");
    quasi()
        .arg("disassemble")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("Module(body=[Expr(value=BinOp("));
    let _ = fs::remove_file(file);
}

#[test]
fn macros_lists_definitions_with_docs() {
    let file = scratch("macros", MAC);
    quasi()
        .arg("macros")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("mac").and(contains("Moves a to the end of b.")).and(contains("when")));
    let _ = fs::remove_file(file);
}

#[test]
fn reports_miette_diagnostics_on_error() {
    let file = scratch("bad", "(+ 1 2");
    quasi()
        .arg("expand")
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("quasi::read"));
    let _ = fs::remove_file(file);
}
