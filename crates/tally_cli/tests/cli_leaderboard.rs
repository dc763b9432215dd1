use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("tally-{nanos}-{file_name}"))
}

fn run(store_path: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tally"))
        .args(args)
        .env("TALLY_STORE_PATH", store_path)
        .env("TALLY_CONFIG_PATH", store_path.with_extension("config.json"))
        .env("TALLY_DISABLE_NOTIFICATIONS", "1")
        .env_remove("TALLY_USER")
        .output()
        .expect("failed to run tally")
}

fn write_users(path: &Path) {
    let content = serde_json::json!({
        "schema_version": 2,
        "users": [
            { "id": "user-1", "name": "ada", "score": 40, "created_at": "2025-12-01T00:00:00Z" },
            { "id": "user-2", "name": "guest", "is_guest": true, "score": 900, "created_at": "2025-12-01T00:00:00Z" },
            { "id": "user-3", "name": "cy", "score": 120, "created_at": "2025-12-01T00:00:00Z" }
        ],
        "tasks": [
            {
                "id": "task-1",
                "user_id": "user-3",
                "title": "done",
                "created_at": "2025-12-19T08:00:00Z",
                "deadline": "2025-12-19T23:59:59Z",
                "points": 10,
                "completed": true,
                "points_awarded": true,
                "points_credited": 10
            }
        ]
    });
    std::fs::write(path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
}

#[test]
fn leaderboard_json_orders_non_guest_users() {
    let store_path = temp_path("cli-leaderboard.json");
    write_users(&store_path);

    let output = run(&store_path, &["--json", "leaderboard"]);
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let board: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = board.as_array().expect("entries");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "cy");
    assert_eq!(entries[0]["rank"]["name"], "Expert");
    assert_eq!(entries[0]["tasks_completed"], 1);
    assert_eq!(entries[1]["name"], "ada");
    assert_eq!(entries[1]["position"], 2);
}

#[test]
fn leaderboard_table_respects_limit() {
    let store_path = temp_path("cli-leaderboard-table.json");
    write_users(&store_path);

    let output = run(&store_path, &["leaderboard", "--limit", "1"]);
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cy"));
    assert!(stdout.contains("Expert"));
    assert!(!stdout.contains("ada"));
}

#[test]
fn user_show_reports_score_and_rank() {
    let store_path = temp_path("cli-user-show.json");
    write_users(&store_path);

    let output = run(&store_path, &["user", "show", "user-3"]);
    let missing = run(&store_path, &["user", "show", "user-404"]);
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("score 120"));
    assert!(stdout.contains("Expert"));
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("ERROR: not_found"));
}
