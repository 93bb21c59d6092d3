use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn codelens_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_codelens"))
}

/// Config with the model disabled, so every chunk is skipped without
/// network access.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let project = root.join("project");
    fs::create_dir_all(project.join("src")).unwrap();
    fs::write(
        project.join("src/main.py"),
        "import sys\n\ndef main():\n    print(sys.argv)\n",
    )
    .unwrap();
    fs::write(project.join("src/util.go"), "package util\n\nfunc Add(a, b int) int { return a + b }\n").unwrap();
    fs::write(project.join("notes.txt"), "not source\n").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/codelens.sqlite"

[chunking]
chunk_size = 500
chunk_overlap = 50

[llm]
provider = "disabled"

[clone]
scratch_dir = "{}/scratch"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("codelens.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_codelens(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = codelens_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run codelens binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn project_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .and_then(Path::parent)
        .unwrap()
        .join("project")
        .display()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_codelens(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/codelens.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_codelens(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_codelens(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_analyze_with_disabled_model() {
    let (_tmp, config_path) = setup_test_env();
    let project = project_dir(&config_path);

    let (stdout, stderr, success) = run_codelens(&config_path, &["analyze", &project]);
    assert!(success, "analyze failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("status: complete"));
    assert!(stdout.contains("files analyzed: 0"));
    assert!(stderr.contains("chunk analysis failed"));

    let summary_path = Path::new(&project).join("final_summary.json");
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(summary_path).unwrap()).unwrap();
    assert_eq!(summary["files"].as_array().unwrap().len(), 0);
    assert_eq!(summary["project_overview"]["total_files_analyzed"], 0);

    // Second run comes from the cache
    let (stdout, _, success) = run_codelens(&config_path, &["analyze", &project]);
    assert!(success);
    assert!(stdout.contains("status: cached"));

    let (stdout, _, success) = run_codelens(&config_path, &["analyze", &project, "--no-cache"]);
    assert!(success);
    assert!(stdout.contains("status: complete"));
}

#[test]
fn test_dump_and_clear() {
    let (_tmp, config_path) = setup_test_env();
    let project = project_dir(&config_path);

    run_codelens(&config_path, &["analyze", &project]);

    let (stdout, stderr, success) = run_codelens(&config_path, &["dump"]);
    assert!(success, "dump failed: {}", stderr);
    let dump: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(dump["codebase_files"].as_array().unwrap().len(), 2);
    assert_eq!(dump["chunks"].as_array().unwrap().len(), 2);
    assert!(dump["analysis_results"].as_array().unwrap().is_empty());
    assert!(dump["chunks"]
        .as_array()
        .unwrap()
        .iter()
        .all(|c| c["processed"] == false));

    let (stdout, _, success) = run_codelens(&config_path, &["clear"]);
    assert!(success);
    assert!(stdout.contains("cleared"));

    let (stdout, _, _) = run_codelens(&config_path, &["dump"]);
    let dump: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(dump["codebase_files"].as_array().unwrap().is_empty());

    // Cache was cleared too
    let (stdout, _, _) = run_codelens(&config_path, &["analyze", &project]);
    assert!(stdout.contains("status: complete"));
}

#[test]
fn test_tree_prints_json() {
    let (_tmp, config_path) = setup_test_env();
    let project = project_dir(&config_path);

    let (stdout, stderr, success) = run_codelens(&config_path, &["tree", &project]);
    assert!(success, "tree failed: {}", stderr);
    let tree: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(tree["name"], "project");
    assert_eq!(tree["children"][0]["name"], "notes.txt");
    assert_eq!(tree["children"][1]["type"], "folder");
}

#[test]
fn test_analyze_missing_path_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_codelens(&config_path, &["analyze", "/definitely/not/here"]);
    assert!(!success);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_codelens(&tmp.path().join("absent.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_log_dir_writes_log_file() {
    let (tmp, config_path) = setup_test_env();
    let project = project_dir(&config_path);
    let log_dir = tmp.path().join("logs");

    let (stdout, stderr, success) = run_codelens(
        &config_path,
        &["--log-dir", log_dir.to_str().unwrap(), "analyze", &project],
    );
    assert!(success, "analyze failed: stdout={}, stderr={}", stdout, stderr);

    let log_files: Vec<_> = fs::read_dir(&log_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with("codelens.log"))
        .collect();
    assert_eq!(log_files.len(), 1);
    let contents = fs::read_to_string(&log_files[0]).unwrap();
    assert!(contents.contains("chunk analysis failed"));
    assert!(!contents.contains("\u{1b}["));
}
