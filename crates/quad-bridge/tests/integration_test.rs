use std::path::Path;
use std::process::{Command, Output};

fn bridge_bin() -> String {
    // Prefer the test-built binary when available to avoid extra cargo builds.
    std::env::var("CARGO_BIN_EXE_quad-bridge").unwrap_or_else(|_| {
        let candidates = [
            "../../target/release/quad-bridge",
            "target/release/quad-bridge",
            "../../target/debug/quad-bridge",
            "target/debug/quad-bridge",
        ];
        for candidate in candidates {
            if Path::new(candidate).exists() {
                return candidate.to_string();
            }
        }
        panic!("Failed to locate quad-bridge binary. Expected CARGO_BIN_EXE_quad-bridge.");
    })
}

fn run_bridge(args: &[&str]) -> Output {
    Command::new(bridge_bin())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to start quad-bridge")
}

fn audit_entries(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .expect("audit log should exist")
        .lines()
        .map(|line| serde_json::from_str(line).expect("audit line should be JSON"))
        .collect()
}

#[test]
fn bounded_run_applies_every_emitted_step() {
    let dir = tempfile::tempdir().unwrap();
    let audit = dir.path().join("audit.jsonl");
    let audit_arg = audit.to_string_lossy().to_string();

    let output = run_bridge(&[
        "--run-seconds",
        "1",
        "--enc1-rate",
        "600",
        "--enc2-rate",
        "-150",
        "--reverse-every-ms",
        "300",
        "--channel-capacity",
        "4",
        "--audit-log",
        &audit_arg,
    ]);
    assert!(
        output.status.success(),
        "bridge failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let entries = audit_entries(&audit);
    let kinds: Vec<&str> = entries
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.first(), Some(&"system_start"));
    assert!(kinds.contains(&"encoder_initialized"));
    assert_eq!(kinds.last(), Some(&"system_shutdown"));

    let shutdown = &entries.last().unwrap()["details"];
    let emitted = shutdown["steps_emitted"].as_u64().unwrap();
    let applied = shutdown["steps_applied"].as_u64().unwrap();
    assert!(emitted > 0, "simulated encoders should have produced motion");
    assert_eq!(emitted, applied, "every emitted step must be applied");
    assert_eq!(shutdown["unknown_dropped"], 0);

    // Resting lines always spell the final phase.
    let phase = shutdown["final_phase"].as_u64().unwrap();
    let expected = match phase {
        0 => (false, false),
        1 => (false, true),
        2 => (true, true),
        _ => (true, false),
    };
    assert_eq!(shutdown["lines"]["a"].as_bool(), Some(expected.0));
    assert_eq!(shutdown["lines"]["b"].as_bool(), Some(expected.1));
}

#[test]
fn encoder_init_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let audit = dir.path().join("audit.jsonl");
    let audit_arg = audit.to_string_lossy().to_string();

    let output = run_bridge(&[
        "--run-seconds",
        "5",
        "--fail-encoder",
        "1",
        "--audit-log",
        &audit_arg,
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("encoder 1 failed to initialize"),
        "unexpected stderr: {stderr}"
    );

    let entries = audit_entries(&audit);
    let failure = entries
        .iter()
        .find(|e| e["event_type"] == "encoder_init_failed")
        .expect("init failure should be audited");
    assert_eq!(failure["details"]["channel"], 1);
    assert!(!entries.iter().any(|e| e["event_type"] == "system_shutdown"));
}

#[test]
fn help_exits_cleanly() {
    let output = run_bridge(&["--help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("USAGE"));
}
