//! Command-line smoke tests. None of these touch the network or start
//! any program.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn goodcheck(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("goodcheck").unwrap();
    cmd.current_dir(dir.path()).env_remove("GOODCHECK_CONFIG");
    cmd
}

// =========== compile ===========

#[test]
fn test_compile_prints_configurations() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("list.txt"),
        "/ sample list\n#PROTO=TCP\n#KEY#-e1;-e2#\n#KEY#-q#\n#ENDGROUP#\n",
    )
    .unwrap();

    goodcheck(&dir)
        .args(["compile", "list.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tcp4"))
        .stdout(predicate::str::contains("-e1 -q"))
        .stdout(predicate::str::contains("-e2 -q"));
}

#[test]
fn test_compile_count() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("list.txt"),
        "#PROTO=TCP\n#KEY#a;b;c#\n#KEY#x;y#\n#ENDGROUP#\n",
    )
    .unwrap();

    goodcheck(&dir)
        .args(["-q", "compile", "list.txt", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("6\n"));
}

#[test]
fn test_compile_reports_bad_line() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("list.txt"), "#PROTO=TCP\n#KEY#a#\nnonsense\n").unwrap();

    goodcheck(&dir)
        .args(["compile", "list.txt"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("line 3"));
}

#[test]
fn test_compile_substitutes_placeholders() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("settings.toml"),
        "[payloads.fake_sni]\nmask = \"FAKESNI\"\nvalue = \"www.example.org\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("list.txt"),
        "#PROTO=TCP\n#KEY#--fake-from-hex=FAKESNI#\n#ENDGROUP#\n",
    )
    .unwrap();

    goodcheck(&dir)
        .args(["-c", "settings.toml", "compile", "list.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--fake-from-hex=www.example.org"));
}

// =========== config ===========

#[test]
fn test_config_show_defaults() {
    let dir = TempDir::new().unwrap();

    goodcheck(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[general]"))
        .stdout(predicate::str::contains("connectivity_test_url"));
}

#[test]
fn test_config_generate_then_validate() {
    let dir = TempDir::new().unwrap();

    goodcheck(&dir)
        .args(["config", "generate", "-o", "goodcheck.toml"])
        .assert()
        .success();
    assert!(dir.path().join("goodcheck.toml").exists());

    goodcheck(&dir)
        .args(["config", "validate", "goodcheck.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Settings are valid"));
}

#[test]
fn test_config_validate_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bad.toml"),
        "[general]\nmax_parallel_probes = 0\n",
    )
    .unwrap();

    goodcheck(&dir)
        .args(["config", "validate", "bad.toml"])
        .assert()
        .failure();
}

// =========== run ===========

#[test]
fn test_run_accepts_udp_in_native_mode() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("list.txt"), "#PROTO=UDP\n#KEY#--x#\n#ENDGROUP#\n").unwrap();
    fs::write(dir.path().join("check.txt"), "example.com\n").unwrap();

    // Gets past the mode checks and stops at program discovery
    goodcheck(&dir)
        .args(["-q", "run", "-f", "zapret", "-s", "list.txt", "-l", "check.txt", "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Can't find Zapret"))
        .stdout(predicate::str::contains("curl mode").not());
}

#[test]
fn test_run_rejects_proxy_in_native_mode() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("list.txt"),
        "#PROTO=TCP\n#PROXY=socks5://127.0.0.1:1080\n#KEY#-s1#\n#ENDGROUP#\n",
    )
    .unwrap();
    fs::write(dir.path().join("check.txt"), "example.com\n").unwrap();

    goodcheck(&dir)
        .args(["-q", "run", "-f", "byedpi", "-s", "list.txt", "-l", "check.txt", "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("curl mode"));
}

#[test]
fn test_run_requires_program() {
    let dir = TempDir::new().unwrap();

    goodcheck(&dir)
        .args(["run", "-s", "list.txt", "-l", "check.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--program"));
}
