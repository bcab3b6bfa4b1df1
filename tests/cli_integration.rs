//! CLI integration tests for preplib
//!
//! The index is seeded either through `preplib index` or by writing shard
//! files directly, then queried through the other commands.

use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const LIBC_MD5: &str = "0cc175b9c0f1b6a831c399e269772661";
const LD_MD5: &str = "92eb5ffee6ae2fec3ad71c777531578f";
const LIBM_MD5: &str = "4a8a08f09d37b73795649038408b5f33";

const JAMMY: &str = "sha256:1111111111111111111111111111111111111111111111111111111111111111";
const FOCAL: &str = "sha256:2222222222222222222222222222222222222222222222222222222222222222";

/// Get a command instance for the preplib binary, isolated from user config
fn preplib_cmd(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("preplib"));
    cmd.env("PREPLIB_CACHE_DIR", dir.path().join("cache-root"))
        .env("PREPLIB_CONFIG", dir.path().join("config.toml"))
        .env_remove("RUST_LOG");
    cmd
}

/// Write a digest shard the way the index stores it
fn seed_shard(dir: &TempDir, digest: &str, lines: &[&str]) {
    let shards = dir.path().join("cache-root").join("cache");
    fs::create_dir_all(&shards).unwrap();
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(shards.join(digest), content).unwrap();
}

fn seed_tags(dir: &TempDir, json: &str) {
    let root = dir.path().join("cache-root");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("image_index.json"), json).unwrap();
}

fn seed_two_images(dir: &TempDir) {
    seed_shard(
        dir,
        LIBC_MD5,
        &[&format!("ubuntu@{} /usr/lib/x86_64-linux-gnu/libc.so.6", JAMMY)],
    );
    seed_shard(
        dir,
        LD_MD5,
        &[
            &format!("ubuntu@{} /usr/lib/x86_64-linux-gnu/ld-linux-x86-64.so.2", FOCAL),
            &format!("ubuntu@{} /usr/lib/x86_64-linux-gnu/ld-linux-x86-64.so.2", JAMMY),
        ],
    );
    seed_tags(
        dir,
        &format!(
            r#"{{"ubuntu@{}": ["jammy", "22.04"], "ubuntu@{}": ["focal"]}}"#,
            JAMMY, FOCAL
        ),
    );
}

// =============================================================================
// Resolve Tests
// =============================================================================

#[test]
fn test_resolve_unique_match() {
    let dir = TempDir::new().unwrap();
    seed_two_images(&dir);

    preplib_cmd(&dir)
        .args(["resolve", LIBC_MD5, LD_MD5])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "found in image \"ubuntu\" once tagged as \"jammy\", \"22.04\" (image digest: {})",
            JAMMY
        )))
        .stdout(predicate::str::contains(format!(
            "- {} => /usr/lib/x86_64-linux-gnu/libc.so.6",
            LIBC_MD5
        )));
}

#[test]
fn test_resolve_json_output() {
    let dir = TempDir::new().unwrap();
    seed_two_images(&dir);

    let output = preplib_cmd(&dir)
        .args(["--format", "json", "resolve", LIBC_MD5, LD_MD5])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["image"], format!("ubuntu@{}", JAMMY));
    assert_eq!(value["method"], "md5");
    assert_eq!(value["ambiguous"], false);
    assert_eq!(value["tags"][0], "jammy");
    assert_eq!(
        value["paths"][LD_MD5],
        "/usr/lib/x86_64-linux-gnu/ld-linux-x86-64.so.2"
    );
}

#[test]
fn test_resolve_ambiguous_picks_last_and_warns() {
    let dir = TempDir::new().unwrap();
    seed_two_images(&dir);

    preplib_cmd(&dir)
        .args(["resolve", LD_MD5])
        .assert()
        .success()
        .stdout(predicate::str::contains(JAMMY))
        .stderr(predicate::str::contains("multiple images contain the same libraries"))
        .stderr(predicate::str::contains("\"focal\""))
        .stderr(predicate::str::contains("using the last (usually latest) one"));
}

#[test]
fn test_resolve_without_common_image_fails() {
    let dir = TempDir::new().unwrap();
    seed_two_images(&dir);
    seed_shard(
        &dir,
        LIBM_MD5,
        &[&format!("ubuntu@{} /usr/lib/x86_64-linux-gnu/libm.so.6", FOCAL)],
    );

    preplib_cmd(&dir)
        .args(["resolve", LIBC_MD5, LIBM_MD5])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no candidates found"));
}

#[test]
fn test_resolve_empty_index_fails() {
    let dir = TempDir::new().unwrap();

    preplib_cmd(&dir)
        .args(["resolve", LIBC_MD5])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no candidates found"));
}

#[test]
fn test_resolve_rejects_non_digest() {
    let dir = TempDir::new().unwrap();

    preplib_cmd(&dir)
        .args(["resolve", "not-a-file-or-digest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("neither a library file nor a digest"));
}

#[test]
fn test_resolve_order_restricts_methods() {
    let dir = TempDir::new().unwrap();
    seed_two_images(&dir);

    // A 32-hex digest also qualifies as a build ID, but the shards hold md5s
    preplib_cmd(&dir)
        .args(["resolve", "--order", "build-id", LIBC_MD5])
        .assert()
        .success()
        .stdout(predicate::str::contains(JAMMY));

    preplib_cmd(&dir)
        .args(["resolve", "--order", "sha256", LIBC_MD5])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no candidates found"));
}

// =============================================================================
// Lookup / Tags / Status Tests
// =============================================================================

#[test]
fn test_lookup_lists_records() {
    let dir = TempDir::new().unwrap();
    seed_two_images(&dir);

    preplib_cmd(&dir)
        .args(["lookup", LD_MD5])
        .assert()
        .success()
        .stdout(predicate::str::contains("(2)"))
        .stdout(predicate::str::contains(format!("ubuntu@{}", FOCAL)));
}

#[test]
fn test_lookup_unknown_digest() {
    let dir = TempDir::new().unwrap();

    preplib_cmd(&dir)
        .args(["lookup", LIBM_MD5])
        .assert()
        .success()
        .stdout(predicate::str::contains("No libraries indexed"));
}

#[test]
fn test_lookup_rejects_invalid_digest() {
    let dir = TempDir::new().unwrap();

    preplib_cmd(&dir)
        .args(["lookup", "../../etc/passwd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a digest"));
}

#[test]
fn test_tags_shows_history() {
    let dir = TempDir::new().unwrap();
    seed_two_images(&dir);

    preplib_cmd(&dir)
        .args(["tags", &format!("ubuntu@{}", JAMMY)])
        .assert()
        .success()
        .stdout(predicate::str::contains("jammy\n22.04"));
}

#[test]
fn test_corrupt_tag_index_is_quarantined() {
    let dir = TempDir::new().unwrap();
    seed_tags(&dir, "{not json");

    preplib_cmd(&dir)
        .args(["tags", &format!("ubuntu@{}", JAMMY)])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tags recorded"));

    let root = dir.path().join("cache-root");
    assert!(!root.join("image_index.json").exists());
    assert!(root.join("image_index.json.corrupt").is_file());
}

#[test]
fn test_status_empty_cache() {
    let dir = TempDir::new().unwrap();

    preplib_cmd(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Digests: 0"))
        .stdout(predicate::str::contains("Nothing indexed yet"));
}

#[test]
fn test_status_json_counts() {
    let dir = TempDir::new().unwrap();
    seed_two_images(&dir);

    preplib_cmd(&dir)
        .args(["status", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"digests\":2"))
        .stdout(predicate::str::contains("\"tagged_images\":2"));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_path_honours_env() {
    let dir = TempDir::new().unwrap();

    preplib_cmd(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_file_sets_resolve_order() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[resolve]\norder = [\"build-id\", \"md5\"]\n",
    )
    .unwrap();

    preplib_cmd(&dir)
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""order":["build-id","md5"]"#));
}

#[test]
fn test_config_init_writes_defaults_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    preplib_cmd(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote config"));

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("[resolve]"));
    assert!(content.contains("\"md5\""));

    preplib_cmd(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    preplib_cmd(&dir)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "[resolve]\norder = []\n").unwrap();

    preplib_cmd(&dir).arg("status").assert().failure();
}

// =============================================================================
// Index Tests
// =============================================================================

fn fake_rootfs(dir: &TempDir) -> std::path::PathBuf {
    let rootfs = dir.path().join("rootfs");
    let lib = rootfs.join("usr/lib/x86_64-linux-gnu");
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join("libc.so.6"), "a").unwrap();
    fs::write(lib.join("my lib.so"), "b").unwrap();
    rootfs
}

fn shard_exists(dir: &TempDir, digest: &str) -> bool {
    Path::new(&dir.path().join("cache-root/cache").join(digest)).is_file()
}

#[test]
fn test_index_requires_pinned_digest() {
    let dir = TempDir::new().unwrap();
    let rootfs = fake_rootfs(&dir);

    preplib_cmd(&dir)
        .args(["index", "ubuntu:jammy", "--rootfs"])
        .arg(&rootfs)
        .arg("/usr/lib/x86_64-linux-gnu/libc.so.6")
        .assert()
        .failure();
}

#[test]
fn test_index_rejects_whitespace_in_reference() {
    let dir = TempDir::new().unwrap();
    let rootfs = fake_rootfs(&dir);

    preplib_cmd(&dir)
        .args(["index", &format!("my repo:jammy@{}", JAMMY), "-m", "md5", "--rootfs"])
        .arg(&rootfs)
        .arg("/usr/lib/x86_64-linux-gnu/libc.so.6")
        .assert()
        .failure();

    assert!(!shard_exists(&dir, LIBC_MD5));
}

#[test]
fn test_index_missing_rootfs_fails() {
    let dir = TempDir::new().unwrap();

    preplib_cmd(&dir)
        .args(["index", &format!("ubuntu@{}", JAMMY), "--rootfs"])
        .arg(dir.path().join("missing"))
        .arg("/lib/libc.so.6")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Image filesystem not found"));
}

#[test]
fn test_index_then_resolve() {
    let dir = TempDir::new().unwrap();
    let rootfs = fake_rootfs(&dir);

    preplib_cmd(&dir)
        .args(["index", &format!("ubuntu:jammy@{}", JAMMY), "-m", "md5", "--rootfs"])
        .arg(&rootfs)
        .args([
            "/usr/lib/x86_64-linux-gnu/libc.so.6",
            "/usr/lib/x86_64-linux-gnu/my lib.so",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Indexed ubuntu@{} (2 new records)",
            JAMMY
        )));

    assert!(shard_exists(&dir, LIBC_MD5));

    // Re-indexing adds nothing but records the tag again
    preplib_cmd(&dir)
        .args(["index", &format!("ubuntu:jammy@{}", JAMMY), "-m", "md5", "--rootfs"])
        .arg(&rootfs)
        .arg("/usr/lib/x86_64-linux-gnu/libc.so.6")
        .assert()
        .success()
        .stdout(predicate::str::contains("(0 new records)"));

    let host_lib = rootfs.join("usr/lib/x86_64-linux-gnu/my lib.so");
    preplib_cmd(&dir)
        .arg("resolve")
        .arg(&host_lib)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "once tagged as \"jammy\", \"jammy\"",
        ))
        .stdout(predicate::str::contains(
            "=> /usr/lib/x86_64-linux-gnu/my lib.so",
        ));
}
