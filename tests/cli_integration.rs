//! CLI integration tests for kpm.
//!
//! These tests drive the `kpm` binary over modules with local path
//! dependencies, so they run without network access.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the kpm binary command, with a private home under `root`.
fn kpm(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kpm").unwrap();
    cmd.arg("--home")
        .arg(root.join("home"))
        .env_remove("KPM_STORAGE")
        .env_remove("KPM_STRATEGY");
    cmd
}

/// Write `<root>/<dir>/kcl.mod`.
fn write_module(root: &Path, dir: &str, name: &str, version: &str, deps: &[(&str, &str)]) {
    let mut content = format!(
        "[package]\nname = \"{}\"\nedition = \"v0.11.0\"\nversion = \"{}\"\n\n[dependencies]\n",
        name, version
    );
    for (dep, spec) in deps {
        content.push_str(&format!("{} = {}\n", dep, spec));
    }
    fs::create_dir_all(root.join(dir)).unwrap();
    fs::write(root.join(dir).join("kcl.mod"), content).unwrap();
}

/// app -> (lib -> base, base)
fn diamond(root: &Path) {
    write_module(root, "base", "base", "0.1.0", &[]);
    write_module(root, "lib", "lib", "0.1.0", &[("base", r#"{ path = "../base" }"#)]);
    write_module(
        root,
        "app",
        "app",
        "0.0.1",
        &[
            ("lib", r#"{ path = "../lib" }"#),
            ("base", r#"{ path = "../base" }"#),
        ],
    );
}

// ============================================================================
// kpm resolve
// ============================================================================

#[test]
fn test_resolve_prints_one_line_per_package() {
    let tmp = TempDir::new().unwrap();
    diamond(tmp.path());

    let output = kpm(tmp.path())
        .arg("resolve")
        .current_dir(tmp.path().join("app"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let names: Vec<&str> = stdout
        .lines()
        .map(|l| l.split_once(' ').unwrap().0)
        .collect();
    assert_eq!(names, ["base", "lib"]);
    assert!(stdout.lines().all(|l| Path::new(l.split_once(' ').unwrap().1).is_dir()));

    assert!(!tmp.path().join("app/kcl.mod.lock").exists());
}

#[test]
fn test_resolve_from_subdirectory() {
    let tmp = TempDir::new().unwrap();
    diamond(tmp.path());
    fs::create_dir_all(tmp.path().join("app/sub/dir")).unwrap();

    kpm(tmp.path())
        .arg("resolve")
        .current_dir(tmp.path().join("app/sub/dir"))
        .assert()
        .success()
        .stdout(predicate::str::contains("lib "));
}

#[test]
fn test_resolve_outside_module_fails() {
    let tmp = TempDir::new().unwrap();

    kpm(tmp.path())
        .arg("resolve")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_cycle_is_reported() {
    let tmp = TempDir::new().unwrap();
    write_module(tmp.path(), "a", "a", "0.1.0", &[("b", r#"{ path = "../b" }"#)]);
    write_module(tmp.path(), "b", "b", "0.1.0", &[("a", r#"{ path = "../a" }"#)]);

    kpm(tmp.path())
        .arg("resolve")
        .current_dir(tmp.path().join("a"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle detected in dependency graph"))
        .stderr(predicate::str::contains("a -> b -> a"));
}

#[test]
fn test_invalid_strategy_is_rejected() {
    let tmp = TempDir::new().unwrap();
    diamond(tmp.path());

    kpm(tmp.path())
        .args(["--strategy", "newest", "resolve"])
        .current_dir(tmp.path().join("app"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid version strategy"));
}

// ============================================================================
// kpm metadata
// ============================================================================

#[test]
fn test_metadata_prints_summary() {
    let tmp = TempDir::new().unwrap();
    diamond(tmp.path());

    let output = kpm(tmp.path())
        .args(["--strategy", "mvs", "metadata"])
        .current_dir(tmp.path().join("app"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["packages"]["lib"]["name"], "lib");
    assert_eq!(summary["packages"]["base"]["name"], "base");
    assert!(summary["packages"].get("app").is_none());
    assert!(!tmp.path().join("app/kcl.mod.lock").exists());
}

#[test]
fn test_metadata_update_writes_lock() {
    let tmp = TempDir::new().unwrap();
    diamond(tmp.path());

    kpm(tmp.path())
        .args(["metadata", "--update"])
        .current_dir(tmp.path().join("app"))
        .assert()
        .success();

    let lock = fs::read_to_string(tmp.path().join("app/kcl.mod.lock")).unwrap();
    assert!(lock.contains("[dependencies.base]"));
    assert!(lock.contains("[dependencies.lib]"));
    assert!(lock.contains("version = \"0.1.0\""));
}

// ============================================================================
// kpm add
// ============================================================================

#[test]
fn test_add_path_dependency() {
    let tmp = TempDir::new().unwrap();
    diamond(tmp.path());
    write_module(tmp.path(), "extra", "extra", "0.2.0", &[]);

    kpm(tmp.path())
        .args(["add", "--path", "../extra"])
        .current_dir(tmp.path().join("app"))
        .assert()
        .success()
        .stderr(predicate::str::contains("adding dependency 'extra'\n"))
        .stderr(predicate::str::contains(
            "add dependency 'extra:0.2.0' successfully\n",
        ));

    let manifest = fs::read_to_string(tmp.path().join("app/kcl.mod")).unwrap();
    assert!(manifest.contains("lib = { path = \"../lib\" }\n"));
    assert!(manifest.contains("extra = { path = \"../extra\" }\n"));

    let lock = fs::read_to_string(tmp.path().join("app/kcl.mod.lock")).unwrap();
    assert!(lock.contains("[dependencies.extra]"));
}

#[test]
fn test_add_without_source_fails() {
    let tmp = TempDir::new().unwrap();
    diamond(tmp.path());

    kpm(tmp.path())
        .arg("add")
        .current_dir(tmp.path().join("app"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to add"));
}

// ============================================================================
// kpm update
// ============================================================================

#[test]
fn test_update_writes_lock() {
    let tmp = TempDir::new().unwrap();
    diamond(tmp.path());

    kpm(tmp.path())
        .arg("update")
        .current_dir(tmp.path().join("app"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Updated"));

    assert!(tmp.path().join("app/kcl.mod.lock").is_file());
}

#[test]
fn test_update_with_missing_version_leaves_files() {
    let tmp = TempDir::new().unwrap();
    write_module(tmp.path(), "base", "base", "0.1.0", &[]);
    write_module(
        tmp.path(),
        "app",
        "app",
        "0.0.1",
        &[("base", r#"{ path = "../base", version = "9.9.9" }"#)],
    );
    let before = fs::read_to_string(tmp.path().join("app/kcl.mod")).unwrap();

    kpm(tmp.path())
        .arg("update")
        .current_dir(tmp.path().join("app"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("package 'base:9.9.9' not found"));

    assert_eq!(fs::read_to_string(tmp.path().join("app/kcl.mod")).unwrap(), before);
    assert!(!tmp.path().join("app/kcl.mod.lock").exists());
}
