use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn arv_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("arv");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/arv.sqlite"

[archive]
root = "{}/archive"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("arv.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_arv(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = arv_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run arv binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// A notes directory: two markdown documents plus two loose image files
/// that are byte-identical under different names.
fn write_notes_fixture(root: &Path) -> PathBuf {
    let notes = root.join("notes");
    fs::create_dir_all(&notes).unwrap();
    fs::write(
        notes.join("alpha.md"),
        "# Alpha\n\nFirst note, about sourdough starters and hydration ratios.\n",
    )
    .unwrap();
    fs::write(
        notes.join("beta.md"),
        "# Beta\n\nSecond note, about bike maintenance and chain wear.\n",
    )
    .unwrap();
    // Identical bytes under two names; the store must keep one copy.
    let png = b"\x89PNG\r\n\x1a\nfakepixels-for-dedup-test";
    fs::write(notes.join("photo-a.png"), png).unwrap();
    fs::write(notes.join("photo-b.png"), png).unwrap();
    notes
}

fn write_chatgpt_fixture(root: &Path) -> PathBuf {
    let path = root.join("conversations.json");
    let json = serde_json::json!([
        {
            "conversation_id": "conv-abc",
            "title": "Weekend plans",
            "create_time": 1700000000.0,
            "mapping": {
                "n1": {
                    "message": {
                        "id": "msg-1",
                        "author": { "role": "user" },
                        "create_time": 1700000001.0,
                        "content": { "content_type": "text", "parts": ["Any hike ideas?"] }
                    }
                },
                "n2": {
                    "message": {
                        "id": "msg-2",
                        "author": { "role": "assistant" },
                        "create_time": 1700000002.0,
                        "content": { "content_type": "text", "parts": ["Try the ridge trail."] }
                    }
                }
            }
        }
    ]);
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    path
}

fn import_json(config_path: &Path, extra: &[&str]) -> serde_json::Value {
    let mut args = vec!["import"];
    args.extend_from_slice(extra);
    args.push("--progress");
    args.push("off");
    args.push("--json");
    let (stdout, stderr, success) = run_arv(config_path, &args);
    assert!(
        success,
        "import failed: stdout={}, stderr={}",
        stdout, stderr
    );
    serde_json::from_str(&stdout).expect("import --json output should be valid JSON")
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_arv(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_arv(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_arv(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_import_markdown_directory_dedups_media() {
    let (tmp, config_path) = setup_test_env();
    let notes = write_notes_fixture(tmp.path());

    run_arv(&config_path, &["init"]);
    let result = import_json(&config_path, &[notes.to_str().unwrap()]);

    assert_eq!(result["status"], "completed");
    assert_eq!(result["units_created"], 2);
    // Two references, one physical copy.
    assert_eq!(result["media_stored"], 1);
    assert_eq!(result["errors"].as_array().unwrap().len(), 0);
}

#[test]
fn test_reimport_stores_nothing_new() {
    let (tmp, config_path) = setup_test_env();
    let notes = write_notes_fixture(tmp.path());

    run_arv(&config_path, &["init"]);
    import_json(&config_path, &[notes.to_str().unwrap()]);
    let second = import_json(&config_path, &[notes.to_str().unwrap()]);

    // Stable unit ids collide on re-import; media bytes are already stored.
    assert_eq!(second["status"], "completed");
    assert_eq!(second["media_stored"], 0);
}

#[test]
fn test_import_dry_run_persists_nothing() {
    let (tmp, config_path) = setup_test_env();
    let notes = write_notes_fixture(tmp.path());

    run_arv(&config_path, &["init"]);
    let result = import_json(&config_path, &[notes.to_str().unwrap(), "--dry-run"]);

    assert_eq!(result["status"], "completed");
    assert_eq!(result["units_created"], 0);
    assert_eq!(result["media_stored"], 0);

    let (stdout, _, success) = run_arv(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Units:       0"), "stats: {}", stdout);

    // The dry run still left a job record with the parsed totals.
    let (stdout, _, success) = run_arv(&config_path, &["jobs"]);
    assert!(success);
    assert!(stdout.contains("completed"), "jobs: {}", stdout);
}

#[test]
fn test_import_chatgpt_conversations() {
    let (tmp, config_path) = setup_test_env();
    let export = write_chatgpt_fixture(tmp.path());

    run_arv(&config_path, &["init"]);
    let result = import_json(&config_path, &[export.to_str().unwrap()]);

    assert_eq!(result["status"], "completed");
    // One conversation unit plus two message units.
    assert_eq!(result["units_created"], 3);
    // Two parent edges plus one follows edge.
    assert_eq!(result["links_created"], 3);

    let (stdout, _, success) = run_arv(
        &config_path,
        &["links", "content://chatgpt/conversation/conv-abc"],
    );
    assert!(success);
    assert!(stdout.contains("parent"), "links: {}", stdout);
}

#[test]
fn test_import_missing_source_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("does-not-exist.zip");

    run_arv(&config_path, &["init"]);
    let (_, stderr, success) = run_arv(
        &config_path,
        &["import", missing.to_str().unwrap(), "--progress", "off"],
    );
    assert!(!success);
    assert!(stderr.contains("failed"), "stderr: {}", stderr);
}

#[test]
fn test_import_empty_file_fails() {
    let (tmp, config_path) = setup_test_env();
    let empty = tmp.path().join("empty.json");
    fs::write(&empty, "").unwrap();

    run_arv(&config_path, &["init"]);
    let (_, _, success) = run_arv(
        &config_path,
        &["import", empty.to_str().unwrap(), "--progress", "off"],
    );
    assert!(!success);
}

#[test]
fn test_import_unrecognized_extension_fails() {
    let (tmp, config_path) = setup_test_env();
    let odd = tmp.path().join("export.dat");
    fs::write(&odd, "not an export").unwrap();

    run_arv(&config_path, &["init"]);
    let (_, _, success) = run_arv(
        &config_path,
        &["import", odd.to_str().unwrap(), "--progress", "off"],
    );
    assert!(!success);
}

#[test]
fn test_store_reports_duplicate() {
    let (tmp, config_path) = setup_test_env();
    let photo = tmp.path().join("photo.jpg");
    fs::write(&photo, b"jpeg-ish bytes").unwrap();

    run_arv(&config_path, &["init"]);

    let (stdout, _, success) = run_arv(&config_path, &["store", photo.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("stored"), "first store: {}", stdout);

    let (stdout, _, success) = run_arv(&config_path, &["store", photo.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("duplicate"), "second store: {}", stdout);
}

#[test]
fn test_job_show_after_import() {
    let (tmp, config_path) = setup_test_env();
    let notes = write_notes_fixture(tmp.path());

    run_arv(&config_path, &["init"]);
    let result = import_json(&config_path, &[notes.to_str().unwrap()]);
    let job_id = result["job_id"].as_str().unwrap();

    let (stdout, stderr, success) = run_arv(&config_path, &["job", job_id]);
    assert!(success, "job show failed: {}", stderr);
    assert!(stdout.contains(job_id));
    assert!(stdout.contains("completed"));
    assert!(stdout.contains("markdown"));
}

#[test]
fn test_stats_after_import() {
    let (tmp, config_path) = setup_test_env();
    let notes = write_notes_fixture(tmp.path());

    run_arv(&config_path, &["init"]);
    import_json(&config_path, &[notes.to_str().unwrap()]);

    let (stdout, _, success) = run_arv(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Units:       2"), "stats: {}", stdout);
    assert!(stdout.contains("markdown"), "stats: {}", stdout);
}
