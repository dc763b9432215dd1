use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("tally-{nanos}-{file_name}"))
}

#[test]
fn cli_smoke_help() {
    let exe = env!("CARGO_BIN_EXE_tally");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("failed to run tally --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("leaderboard"));
}

#[test]
fn commands_without_user_are_rejected() {
    let exe = env!("CARGO_BIN_EXE_tally");
    let store_path = temp_path("cli-no-user.json");
    let output = Command::new(exe)
        .args(["add", "demo task"])
        .env("TALLY_STORE_PATH", &store_path)
        .env("TALLY_CONFIG_PATH", temp_path("cli-no-user-config.json"))
        .env("TALLY_DISABLE_NOTIFICATIONS", "1")
        .env_remove("TALLY_USER")
        .output()
        .expect("failed to run add command");

    std::fs::remove_file(&store_path).ok();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}

#[test]
fn unknown_subcommand_reports_invalid_input() {
    let exe = env!("CARGO_BIN_EXE_tally");
    let output = Command::new(exe)
        .arg("frobnicate")
        .output()
        .expect("failed to run tally");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}

#[test]
fn rank_command_classifies_scores() {
    let exe = env!("CARGO_BIN_EXE_tally");
    let store_path = temp_path("cli-rank.json");

    let cases = [("0", "Novice"), ("100", "Expert"), ("-5", "Novice"), ("499", "Master")];
    for (score, expected) in cases {
        let output = Command::new(exe)
            .args(["rank", score])
            .env("TALLY_STORE_PATH", &store_path)
            .env("TALLY_CONFIG_PATH", temp_path("cli-rank-config.json"))
            .output()
            .expect("failed to run rank command");

        assert!(output.status.success(), "rank {score} failed");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.starts_with(expected), "rank {score}: {stdout}");
    }
    std::fs::remove_file(&store_path).ok();
}

#[test]
fn unreadable_config_warns_and_continues() {
    let exe = env!("CARGO_BIN_EXE_tally");
    let store_path = temp_path("cli-bad-config.json");
    let config_path = temp_path("cli-bad-config-settings.json");
    std::fs::write(&config_path, "{ not json").unwrap();

    let output = Command::new(exe)
        .args(["rank", "120"])
        .env("TALLY_STORE_PATH", &store_path)
        .env("TALLY_CONFIG_PATH", &config_path)
        .env_remove("TALLY_LOG")
        .output()
        .expect("failed to run rank command");

    std::fs::remove_file(&config_path).ok();
    std::fs::remove_file(&store_path).ok();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Expert"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("using default config"), "stderr: {stderr}");
}
