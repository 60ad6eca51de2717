//! Subprocess execution bounds
//!
//! Runs small `/bin/sh` scripts through the runner to check exit handling,
//! the wall-clock deadline, the output cap and the sanitized environment.

#![cfg(unix)]

use osint_engine::tools::{
    FailureKind, ResolvedInvocation, RunLimits, ToolFailure, ToolOutput, ToolRunner,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn shell(script: &str) -> ResolvedInvocation {
    ResolvedInvocation {
        executable: PathBuf::from("/bin/sh"),
        arg_prefix: vec!["-c".to_string(), script.to_string(), "tool".to_string()],
        available: true,
    }
}

fn limits(timeout_ms: u64, max_output_bytes: usize) -> RunLimits {
    RunLimits {
        timeout: Duration::from_millis(timeout_ms),
        max_output_bytes,
    }
}

async fn run(
    script: &str,
    args: &[&str],
    limits: RunLimits,
    cwd: Option<&Path>,
) -> Result<ToolOutput, ToolFailure> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    ToolRunner::new().run(&shell(script), &args, limits, cwd).await
}

#[tokio::test]
async fn test_successful_run_captures_both_streams() {
    let output = run(
        r#"echo "found $1"; echo "progress" >&2"#,
        &["johndoe"],
        limits(5_000, 1024),
        None,
    )
    .await
    .unwrap();

    assert_eq!(output.stdout, "found johndoe\n");
    assert_eq!(output.stderr, "progress\n");
    assert_eq!(output.exit_code, Some(0));
}

#[tokio::test]
async fn test_environment_is_sanitized() {
    let output = run(
        r#"echo "$NO_COLOR|$FORCE_COLOR|$TERM|$PYTHONUNBUFFERED|$PYTHONIOENCODING""#,
        &[],
        limits(5_000, 1024),
        None,
    )
    .await
    .unwrap();
    assert_eq!(output.stdout.trim(), "1|0|dumb|1|utf-8");
}

#[tokio::test]
async fn test_nonzero_exit_is_a_failure() {
    let failure = run("echo oops >&2; exit 3", &[], limits(5_000, 1024), None)
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), FailureKind::NonZeroExit);
    match failure {
        ToolFailure::NonZeroExit { code, output } => {
            assert_eq!(code, Some(3));
            assert_eq!(output.stderr.trim(), "oops");
        }
        other => panic!("unexpected failure: {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_kills_and_keeps_partial_output() {
    let started = Instant::now();
    let failure = run(
        "echo https://github.com/johndoe; exec sleep 10",
        &[],
        limits(300, 1024),
        None,
    )
    .await
    .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(failure.kind(), FailureKind::Timeout);
    let partial = failure.partial_output().expect("partial output kept");
    assert_eq!(partial.stdout.trim(), "https://github.com/johndoe");
}

#[tokio::test]
async fn test_timeout_without_output_has_no_partial() {
    let failure = run("exec sleep 10", &[], limits(200, 1024), None)
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), FailureKind::Timeout);
    assert!(failure.partial_output().is_none());
}

#[tokio::test]
async fn test_output_cap_kills_flooding_tool() {
    let failure = run(
        "while true; do echo https://example.com/flood; done",
        &[],
        limits(10_000, 4096),
        None,
    )
    .await
    .unwrap_err();

    match &failure {
        ToolFailure::OutputTooLarge { limit, partial } => {
            assert_eq!(*limit, 4096);
            assert!(partial.stdout.len() + partial.stderr.len() <= 4096);
            assert!(partial.stdout.starts_with("https://example.com/flood"));
        }
        other => panic!("unexpected failure: {:?}", other),
    }
}

#[tokio::test]
async fn test_runs_inside_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let output = run("pwd", &[], limits(5_000, 1024), Some(dir.path()))
        .await
        .unwrap();

    let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
    assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
}

#[tokio::test]
async fn test_stdin_is_closed() {
    let output = run("cat; echo done", &[], limits(5_000, 1024), None)
        .await
        .unwrap();
    assert_eq!(output.stdout, "done\n");
}
