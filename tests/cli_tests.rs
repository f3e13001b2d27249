//! CLI interface tests
//!
//! Runs the supersize binary against fixture inputs and checks its output
//! and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

mod common;
use common::fixtures;

/// Helper to get the supersize binary command
fn get_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_supersize"))
}

fn parse_json(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8(stdout.to_vec()).expect("stdout should be UTF-8");
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, text))
}

#[test]
fn test_cli_help_flag_displays_usage_information() {
    get_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Binary size analysis"))
        .stdout(predicate::str::contains("archive"))
        .stdout(predicate::str::contains("diff"));
}

#[test]
fn test_cli_version_flag_displays_version_number() {
    get_bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("supersize"));
}

#[test]
fn test_cli_without_command_lists_commands() {
    get_bin()
        .assert()
        .success()
        .stdout(predicate::str::contains("method-count"));
}

#[test]
fn test_archive_without_inputs_exits_with_usage_error() {
    let temp = TempDir::new().unwrap();
    get_bin()
        .args(["archive", "out.size"])
        .current_dir(temp.path())
        .assert()
        .code(64)
        .stderr(predicate::str::contains("help:"))
        .stderr(predicate::str::contains("--apk-file"));
}

#[test]
fn test_archive_elf_without_symbols_is_rejected() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("libmain.so"), b"\x7fELF").unwrap();

    get_bin()
        .args(["archive", "out.size", "--elf-file", "libmain.so"])
        .current_dir(temp.path())
        .assert()
        .code(64)
        .stderr(predicate::str::contains("--symbols-file"));
}

#[test]
fn test_archive_then_diff_reports_changes() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fixtures::write_symbols_dump(
        dir,
        "before.json",
        &[(".text", "main", 64, 0x1000), (".text", "helper", 32, 0x1040)],
    )
    .unwrap();
    fixtures::write_symbols_dump(
        dir,
        "after.json",
        &[(".text", "main", 80, 0x1000), (".text", "fresh", 16, 0x1050)],
    )
    .unwrap();

    for name in ["before", "after"] {
        get_bin()
            .args([
                "archive",
                &format!("{}.size", name),
                "--symbols-file",
                &format!("{}.json", name),
            ])
            .current_dir(dir)
            .assert()
            .success();
        assert!(dir.join(format!("{}.size", name)).exists());
    }

    let output = get_bin()
        .args(["diff", "before.size", "after.size", "--json"])
        .current_dir(dir)
        .output()
        .expect("Command execution failed");
    assert!(output.status.success());

    let report = parse_json(&output.stdout);
    assert_eq!(report["counts"]["changed"], 1);
    assert_eq!(report["counts"]["added"], 1);
    assert_eq!(report["counts"]["removed"], 1);
    assert_eq!(report["section_deltas"][".text"], 0);
    assert_eq!(report["top_changes"][0]["full_name"], "helper");

    get_bin()
        .args(["diff", "before.size", "after.size"])
        .current_dir(dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Binary Size Diff"))
        .stdout(predicate::str::contains("1 added"));
}

#[test]
fn test_archive_json_summary_is_parseable() {
    let temp = TempDir::new().unwrap();
    fixtures::write_symbols_dump(temp.path(), "syms.json", &[(".rodata", "kTable", 400, 0x2000)])
        .unwrap();

    let output = get_bin()
        .args(["archive", "lib.size", "--symbols-file", "syms.json", "--json"])
        .current_dir(temp.path())
        .output()
        .expect("Command execution failed");
    assert!(output.status.success());

    let report = parse_json(&output.stdout);
    assert_eq!(report["symbol_count"], 1);
    assert_eq!(report["file_size"], 400);
    assert_eq!(report["top_symbols"][0]["full_name"], "kTable");
}

#[test]
fn test_diff_missing_file_exits_no_input() {
    let temp = TempDir::new().unwrap();
    get_bin()
        .args(["diff", "before.size", "after.size"])
        .current_dir(temp.path())
        .assert()
        .code(66)
        .stderr(predicate::str::contains("before.size"));
}

#[test]
fn test_diff_corrupt_file_exits_data_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("before.size"), "{}").unwrap();
    fs::write(temp.path().join("after.size"), "{}").unwrap();

    get_bin()
        .args(["diff", "before.size", "after.size"])
        .current_dir(temp.path())
        .assert()
        .code(65)
        .stderr(predicate::str::contains("caused by:"));
}

#[test]
fn test_ar_lists_regular_archive_members() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("libfoo.a"),
        fixtures::build_archive(
            false,
            &[("a.o", b"1234"), ("a_very_long_object_name.o", b"xyz")],
        ),
    )
    .unwrap();

    get_bin()
        .args(["ar", "libfoo.a"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("regular archive, 2 members"))
        .stdout(predicate::str::contains("a_very_long_object_name.o"));
}

#[test]
fn test_ar_json_marks_thin_members_without_size() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("libthin.a"),
        fixtures::build_archive(true, &[("x.o", b""), ("y.o", b"")]),
    )
    .unwrap();

    let output = get_bin()
        .args(["ar", "libthin.a", "--json"])
        .current_dir(temp.path())
        .output()
        .expect("Command execution failed");
    assert!(output.status.success());

    let members = parse_json(&output.stdout);
    assert_eq!(members[0]["name"], "x.o");
    assert!(members[0].get("size").is_none());
    assert_eq!(members[1]["name"], "y.o");
}

#[test]
fn test_expand_thin_prints_member_paths() {
    let out = fixtures::create_build_dir().unwrap();

    get_bin()
        .args([
            "expand-thin",
            "--output-directory",
            ".",
            "obj/main.o",
            "obj/base/libbase.a",
        ])
        .current_dir(out.path())
        .assert()
        .success()
        .stdout("obj/main.o\nobj/base/a.o\nobj/base/b.o\n");
}

#[test]
fn test_sources_resolves_objects_and_archive_members() {
    let out = fixtures::create_build_dir().unwrap();

    get_bin()
        .args([
            "sources",
            "--output-directory",
            ".",
            "obj/base/a.o",
            "obj/base/libbase.a(b.o)",
            "obj/unknown.o",
        ])
        .current_dir(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Parsed 2 .ninja files"))
        .stdout(predicate::str::contains("../../base/a.cc"))
        .stdout(predicate::str::contains("../../base/b.cc"))
        .stdout(predicate::str::contains("(not found)"));
}

#[test]
fn test_sources_prints_link_inputs() {
    let out = fixtures::create_build_dir().unwrap();

    get_bin()
        .args(["sources", "--output-directory", ".", "--elf-file", "libmain.so"])
        .current_dir(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 link inputs"))
        .stdout(predicate::str::contains("obj/base/libbase.a"));
}

#[test]
fn test_method_count_sums_dex_files_in_apk() {
    let temp = TempDir::new().unwrap();
    fixtures::write_zip(
        &temp.path().join("app.apk"),
        &[
            ("classes.dex", fixtures::fake_dex(10, 4, 2, 3, 100, 5)),
            ("classes2.dex", fixtures::fake_dex(1, 1, 1, 1, 20, 1)),
            ("res/raw/blob.bin", vec![0u8; 64]),
        ],
    )
    .unwrap();

    let output = get_bin()
        .args(["method-count", "app.apk", "--json"])
        .current_dir(temp.path())
        .output()
        .expect("Command execution failed");
    assert!(output.status.success());

    let report = parse_json(&output.stdout);
    assert_eq!(report["files"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["total"]["method_ids"], 120);
}

#[test]
fn test_method_count_plain_output() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("classes.dex"), fixtures::fake_dex(1, 1, 1, 1, 1234, 1)).unwrap();

    get_bin()
        .args(["method-count", "classes.dex"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1,234"));
}

#[test]
fn test_init_creates_config_file() {
    let temp = TempDir::new().unwrap();

    get_bin()
        .arg("init")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(".supersize.toml"));

    let contents = fs::read_to_string(temp.path().join(".supersize.toml")).unwrap();
    assert!(contents.contains("top-n"));
}

#[test]
fn test_invalid_config_exits_data_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(".supersize.toml"), "[report]\ntop-n = 0\n").unwrap();
    fixtures::write_symbols_dump(temp.path(), "syms.json", &[(".text", "f", 4, 0x10)]).unwrap();

    get_bin()
        .args(["archive", "a.size", "--symbols-file", "syms.json"])
        .current_dir(temp.path())
        .assert()
        .code(65)
        .stderr(predicate::str::contains("supersize init"));
}

#[test]
fn test_completions_generate_script() {
    get_bin()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("supersize"))
        .stdout(predicate::str::contains("method-count"));
}
