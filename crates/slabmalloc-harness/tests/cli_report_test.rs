//! Integration test: harness CLI output shapes.
//!
//! Run: cargo test -p slabmalloc-harness --test cli_report_test

use std::process::Command;

fn harness() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_slabmalloc-harness"));
    cmd.env_remove("SLABMALLOC_LOG");
    cmd
}

#[test]
fn scenarios_report_is_valid_json_and_passes() {
    let output = harness().arg("scenarios").output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let cases = report["cases"].as_array().unwrap();
    assert!(!cases.is_empty());
    for case in cases {
        assert!(case["name"].is_string());
        assert_eq!(case["passed"], true, "{case}");
        assert!(case["detail"].is_string());
    }
    assert_eq!(report["passed"].as_u64().unwrap() as usize, cases.len());
    assert_eq!(report["failed"], 0);
}

#[test]
fn churn_reports_metrics() {
    let output = harness()
        .args(["churn", "--seed", "0x1234", "--ops", "2000", "--max-size", "3000"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["seed"], 0x1234);
    assert_eq!(report["ops"], 2000);
    assert_eq!(report["corrupted_blocks"], 0);
    assert_eq!(report["usable_size_violations"], 0);
    assert_eq!(report["allocations"], report["frees"]);
}

#[test]
fn churn_rejects_zero_max_size() {
    let output = harness()
        .args(["churn", "--max-size", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--max-size"));
}

#[test]
fn log_json_emits_lifecycle_lines() {
    let output = harness()
        .env("SLABMALLOC_LOG", "debug")
        .args(["--log-json", "churn", "--ops", "200", "--max-size", "256"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    let records: Vec<serde_json::Value> = stderr
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(!records.is_empty());
    for record in &records {
        assert!(record["decision_id"].is_u64());
        assert!(record["symbol"].is_string());
        assert!(record["event"].is_string());
    }
}

#[test]
fn trace_echo_reports_class_sizes_only() {
    let output = harness()
        .env("SLABMALLOC_LOG", "trace")
        .arg("scenarios")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    let mut sizes = Vec::new();
    for line in stderr.lines() {
        let rest = line.strip_prefix("malloc(").unwrap_or_else(|| panic!("stray line {line:?}"));
        let (size, ptr) = rest.split_once(") -> 0x").unwrap_or_else(|| panic!("bad line {line:?}"));
        assert!(usize::from_str_radix(ptr, 16).is_ok(), "bad pointer in {line:?}");
        sizes.push(size.parse::<usize>().unwrap());
    }
    assert!(sizes.contains(&16));
    assert!(sizes.contains(&32));
    for size in sizes {
        assert!(size.is_power_of_two() && (16..=2048).contains(&size), "echoed {size}");
    }
}

#[test]
fn churn_with_unmappable_sizes_reports_allocator_error() {
    let output = harness()
        .args(["churn", "--ops", "4", "--max-size", &usize::MAX.to_string()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("slabmalloc-harness: allocator: mmap of"), "{stderr}");
}
