//! CLI integration tests for Moorage.
//!
//! Each test lays out a small workspace in a temp directory and drives the
//! `moorage` binary against it.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the moorage binary command.
fn moorage() -> Command {
    Command::cargo_bin("moorage").unwrap()
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn descriptor(extra: &str) -> String {
    format!(
        r#"{{
  "compilerOptions": {{ "composite": true }},
  "include": ["src"],{}
  "references": []
}}
"#,
        extra
    )
}

/// `server` imports `common` and `ui`; `ui` imports `common`.
fn workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write(root, "package.json", r#"{ "name": "ws", "private": true }"#);

    write(root, "packages/common/tsconfig.package.json", &descriptor(""));
    write(root, "packages/common/src/index.ts", "export const log = console.log;\n");

    write(root, "packages/ui/tsconfig.package.json", &descriptor(""));
    write(
        root,
        "packages/ui/src/Button.tsx",
        "import { log } from \"@ws/common\";\nexport const Button = () => <button onClick={log} />;\n",
    );

    write(
        root,
        "packages/server/tsconfig.package.json",
        &descriptor(
            r#"
  "scripts": { "hello": { "command": "echo", "args": ["hello from server"] } },"#,
        ),
    );
    write(
        root,
        "packages/server/src/main.ts",
        "import { log } from \"@ws/common\";\n\
         import type { Button } from \"@ws/ui/Button\";\n\
         import express from \"express\";\n\
         import { helper } from \"./helper\";\n",
    );
    write(root, "packages/server/src/helper.ts", "export const helper = 1;\n");

    tmp
}

fn references(root: &Path, package: &str) -> Vec<String> {
    let path = root.join("packages").join(package).join("tsconfig.package.json");
    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    doc["references"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["path"].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// moorage deps
// ============================================================================

#[test]
fn test_deps_lists_sibling_packages() {
    let tmp = workspace();

    moorage()
        .args(["deps", "server"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("common\nui\n");
}

#[test]
fn test_deps_mentions_show_every_reference() {
    let tmp = workspace();

    moorage()
        .args(["deps", "server", "--mentions"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("workspace\t@ws/ui/Button (type)"))
        .stdout(predicate::str::contains("external\texpress"))
        .stdout(predicate::str::contains("packages/server/src/main.ts"));
}

#[test]
fn test_deps_from_package_subdirectory() {
    let tmp = workspace();

    moorage()
        .args(["deps", "ui"])
        .current_dir(tmp.path().join("packages/server/src"))
        .assert()
        .success()
        .stdout("common\n");
}

#[test]
fn test_unknown_package_is_an_error() {
    let tmp = workspace();

    moorage()
        .args(["deps", "nope"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("package `nope` not found"))
        .stderr(predicate::str::contains("common, server, ui"));
}

#[test]
fn test_outside_workspace_is_an_error() {
    let tmp = TempDir::new().unwrap();

    moorage()
        .args(["deps", "server"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find a workspace root"));
}

// ============================================================================
// moorage sync
// ============================================================================

#[test]
fn test_sync_writes_references() {
    let tmp = workspace();

    moorage()
        .arg("sync")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Updated"));

    assert_eq!(
        references(tmp.path(), "server"),
        vec!["../common/tsconfig.package.json", "../ui/tsconfig.package.json"]
    );
    assert_eq!(references(tmp.path(), "ui"), vec!["../common/tsconfig.package.json"]);
    assert!(references(tmp.path(), "common").is_empty());

    // Other descriptor keys survive
    let server = fs::read_to_string(tmp.path().join("packages/server/tsconfig.package.json")).unwrap();
    assert!(server.contains("hello from server"));
}

#[test]
fn test_sync_is_idempotent() {
    let tmp = workspace();

    moorage().arg("sync").current_dir(tmp.path()).assert().success();
    let first = fs::read_to_string(tmp.path().join("packages/server/tsconfig.package.json")).unwrap();

    moorage()
        .arg("sync")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Updated").not());

    let second = fs::read_to_string(tmp.path().join("packages/server/tsconfig.package.json")).unwrap();
    assert_eq!(first, second);

    moorage()
        .args(["sync", "--check"])
        .current_dir(tmp.path())
        .assert()
        .success();
}

#[test]
fn test_sync_check_reports_drift_without_writing() {
    let tmp = workspace();
    let before = fs::read_to_string(tmp.path().join("packages/ui/tsconfig.package.json")).unwrap();

    moorage()
        .args(["sync", "--check"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("references of `ui` are out of date"));

    let after = fs::read_to_string(tmp.path().join("packages/ui/tsconfig.package.json")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_sync_single_package() {
    let tmp = workspace();

    moorage()
        .args(["sync", "ui"])
        .current_dir(tmp.path())
        .assert()
        .success();

    assert_eq!(references(tmp.path(), "ui"), vec!["../common/tsconfig.package.json"]);
    assert!(references(tmp.path(), "server").is_empty());
}

#[test]
fn test_sync_deep_prints_visited_mapping() {
    let tmp = workspace();

    moorage()
        .args(["sync", "server", "--deep"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("common: []\nserver: [common, ui]\nui: [common]\n");

    assert_eq!(references(tmp.path(), "ui"), vec!["../common/tsconfig.package.json"]);
}

#[test]
fn test_sync_skips_invalid_descriptor() {
    let tmp = workspace();
    write(tmp.path(), "packages/broken/tsconfig.package.json", "{ not json");
    write(tmp.path(), "packages/broken/src/index.ts", "import '@ws/common';\n");

    moorage()
        .arg("sync")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Skipped"));

    assert_eq!(references(tmp.path(), "ui"), vec!["../common/tsconfig.package.json"]);
}

#[test]
fn test_sync_accepts_commented_descriptor() {
    let tmp = workspace();
    write(
        tmp.path(),
        "packages/ui/tsconfig.package.json",
        "{\n  // ui components\n  \"include\": [\"src\"],\n  \"references\": [],\n}\n",
    );

    moorage()
        .arg("sync")
        .current_dir(tmp.path())
        .assert()
        .success();

    assert_eq!(
        references(tmp.path(), "ui"),
        vec!["../common/tsconfig.package.json"]
    );
}

// ============================================================================
// moorage tree
// ============================================================================

#[test]
fn test_tree_from_package() {
    let tmp = workspace();

    moorage()
        .args(["tree", "server"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("server\n├── common\n├── ui\n│   ├── common (*)\n");
}

#[test]
fn test_tree_depth_limit() {
    let tmp = workspace();

    moorage()
        .args(["tree", "server", "--depth", "0"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("server\n");
}

#[test]
fn test_tree_inverted() {
    let tmp = workspace();

    moorage()
        .args(["tree", "common", "--invert"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("common\n"))
        .stdout(predicate::str::contains("├── server"))
        .stdout(predicate::str::contains("├── ui"));
}

#[test]
fn test_tree_build_order() {
    let tmp = workspace();

    moorage()
        .args(["tree", "--order"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("common\nui\nserver\n");

    moorage()
        .args(["tree", "ui", "--order"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("common\nui\n");
}

#[test]
fn test_tree_build_order_rejects_cycle() {
    let tmp = workspace();
    write(
        tmp.path(),
        "packages/common/src/index.ts",
        "import \"@ws/server\";\n",
    );

    moorage()
        .args(["tree", "--order"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("dependency cycle"));
}

// ============================================================================
// moorage resolve / load
// ============================================================================

#[test]
fn test_resolve_workspace_alias() {
    let tmp = workspace();

    moorage()
        .args(["resolve", "@ws/common"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("file://"))
        .stdout(predicate::str::ends_with("packages/common/src/index.ts\n"));

    moorage()
        .args(["resolve", "@ws/ui/Button"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::ends_with("packages/ui/src/Button.tsx\n"));
}

#[test]
fn test_resolve_relative_from_module() {
    let tmp = workspace();

    moorage()
        .args(["resolve", "./helper", "--from", "packages/server/src/main.ts"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::ends_with("packages/server/src/helper.ts\n"));
}

#[test]
fn test_resolve_passes_through_external() {
    let tmp = workspace();

    moorage()
        .args(["resolve", "express"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("express\n");
}

#[test]
fn test_resolve_missing_module() {
    let tmp = workspace();

    moorage()
        .args(["resolve", "@ws/common/missing"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot find module `@ws/common/missing`"));
}

#[test]
fn test_load_redirects_tsx_to_cache() {
    let tmp = workspace();
    write(tmp.path(), ".cache/ui/Button.js", "export const Button = () => null;\n");

    moorage()
        .args(["load", "packages/ui/src/Button.tsx"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("export const Button = () => null;\n");

    moorage()
        .args(["load", "packages/server/src/main.ts"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("default\n");
}

#[test]
fn test_load_missing_artifact() {
    let tmp = workspace();

    moorage()
        .args(["load", "packages/ui/src/Button.tsx"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no compiled artifact"));
}

// ============================================================================
// moorage build / run
// ============================================================================

#[cfg(unix)]
#[test]
fn test_build_syncs_then_compiles() {
    let tmp = workspace();
    write(tmp.path(), "moorage.toml", "[compiler]\nprogram = \"true\"\nargs = []\n");

    moorage()
        .args(["build", "server"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Compiling"))
        .stderr(predicate::str::contains("Finished"));

    assert_eq!(references(tmp.path(), "ui"), vec!["../common/tsconfig.package.json"]);
}

#[cfg(unix)]
#[test]
fn test_build_failure_exits_non_zero() {
    let tmp = workspace();
    write(
        tmp.path(),
        "moorage.toml",
        "[compiler]\nprogram = \"sh\"\nargs = [\"-c\", \"echo 'src/main.ts(1,1): error TS2322: Type mismatch.'; exit 1\"]\n",
    );

    moorage()
        .args(["build", "server", "--no-sync"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("TS2322"));

    assert!(references(tmp.path(), "server").is_empty());
}

#[cfg(unix)]
#[test]
fn test_build_json_messages() {
    let tmp = workspace();
    write(tmp.path(), "moorage.toml", "[compiler]\nprogram = \"true\"\nargs = []\n");

    moorage()
        .args(["build", "server", "--message-format", "json"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""reason":"references-synced""#))
        .stdout(predicate::str::contains(r#""reason":"build-finished""#));
}

#[cfg(unix)]
#[test]
fn test_run_script_in_package() {
    let tmp = workspace();

    moorage()
        .args(["run", "server", "hello"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from server"));
}

#[test]
fn test_run_missing_script_lists_available() {
    let tmp = workspace();

    moorage()
        .args(["run", "server", "nope"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no script `nope`"))
        .stderr(predicate::str::contains("hello"));
}

// ============================================================================
// moorage completions
// ============================================================================

#[test]
fn test_completions_bash() {
    moorage()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("moorage"));
}
