// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios against a real `Executor` and real `bash`
//! subprocesses (spec §8's six literal examples). These are genuine
//! integration tests, not unit tests with a `FakeSession` — the whole
//! point of spec §8 is that the tree interpreter, the shell worker pool,
//! and the sink layer compose correctly under a real shell.

use opal_core::test_support::{shell_command, step};
use opal_core::{Command, RedirectMode, StepId, TreeNode, Value};
use opal_engine::{Config, Executor};
use opal_core::TelemetryLevel;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config() -> Config {
    Config::new()
}

fn file_target(path: &std::path::Path) -> Command {
    let mut args = BTreeMap::new();
    args.insert("command".to_string(), Value::String(path.display().to_string()));
    Command { decorator: "shell".to_string(), transport_id: "local".to_string(), args, block: Vec::new() }
}

#[tokio::test]
async fn simple_shell_success() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("stdout.txt");
    let source = TreeNode::Command(shell_command("local", "echo hello"));
    let target = file_target(&out);
    let tree = TreeNode::Redirect { source: Box::new(source), target: Box::new(target), mode: RedirectMode::Overwrite };

    let executor = Executor::new(&config());
    let outcome = executor.execute(CancellationToken::new(), vec![step(1, tree)], &config()).await;

    assert!(outcome.exit_code.is_success());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello\n");
    executor.close().await;
}

#[tokio::test]
async fn sequence_fail_fast_across_steps() {
    let steps = vec![
        step(1, TreeNode::Command(shell_command("local", "echo one"))),
        step(2, TreeNode::Command(shell_command("local", "exit 42"))),
        step(3, TreeNode::Command(shell_command("local", "echo three"))),
    ];

    let executor = Executor::new(&config());
    let outcome = executor
        .execute(CancellationToken::new(), steps, &config().telemetry(TelemetryLevel::Basic))
        .await;

    assert_eq!(outcome.steps_run, 2);
    assert_eq!(outcome.exit_code.as_i32(), 42);
    assert_eq!(outcome.telemetry.unwrap().failed_step, Some(StepId::new(2)));
    executor.close().await;
}

#[yare::parameterized(
    zero_then_nine = { "exit 0", "exit 9", 9 },
    seven_then_zero = { "exit 7", "exit 0", 0 },
)]
async fn pipeline_returns_last_exit_code(first: &str, second: &str, expected: i32) {
    let tree = TreeNode::Pipeline(vec![
        TreeNode::Command(shell_command("local", first)),
        TreeNode::Command(shell_command("local", second)),
    ]);

    let executor = Executor::new(&config());
    let outcome = executor.execute(CancellationToken::new(), vec![step(1, tree)], &config()).await;

    assert_eq!(outcome.exit_code.as_i32(), expected);
    executor.close().await;
}

#[tokio::test]
async fn redirect_with_stderr_routing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let mut args = BTreeMap::new();
    args.insert("command".to_string(), Value::String("echo out && echo err 1>&2".to_string()));
    args.insert("stderr".to_string(), Value::Bool(true));
    let source = TreeNode::Command(Command {
        decorator: "shell".to_string(),
        transport_id: "local".to_string(),
        args,
        block: Vec::new(),
    });
    let target = file_target(&out);
    let tree = TreeNode::Redirect { source: Box::new(source), target: Box::new(target), mode: RedirectMode::Overwrite };

    let executor = Executor::new(&config());
    let outcome = executor.execute(CancellationToken::new(), vec![step(1, tree)], &config()).await;

    assert!(outcome.exit_code.is_success());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "err\n");
    executor.close().await;
}

#[tokio::test]
async fn worker_reuse_smoke() {
    let dir = tempfile::tempdir().unwrap();
    let file_b = dir.path().join("b.txt");
    let file_c = dir.path().join("c.txt");

    // spec §4.4: the first call on a (transport, bash) key never admits
    // to the pool, so a warm-up step is needed before two calls actually
    // share a worker.
    let warm_up = step(1, TreeNode::Command(shell_command("local", "true")));
    let write_b = step(
        2,
        TreeNode::Command(shell_command("local", &format!("echo -n \"$OPAL_INTERNAL_WORKER_INSTANCE\" > {}", file_b.display()))),
    );
    let write_c = step(
        3,
        TreeNode::Command(shell_command("local", &format!("echo -n \"$OPAL_INTERNAL_WORKER_INSTANCE\" > {}", file_c.display()))),
    );

    let executor = Executor::new(&config());
    let outcome = executor.execute(CancellationToken::new(), vec![warm_up, write_b, write_c], &config()).await;
    assert!(outcome.exit_code.is_success());

    let instance_b = std::fs::read_to_string(&file_b).unwrap();
    let instance_c = std::fs::read_to_string(&file_c).unwrap();
    assert!(!instance_b.is_empty());
    assert_eq!(instance_b, instance_c);
    executor.close().await;
}

#[tokio::test]
async fn cancellation_of_a_sleep() {
    let token = CancellationToken::new();
    let steps = vec![step(1, TreeNode::Command(shell_command("local", "sleep 10")))];

    let executor = Executor::new(&config());
    let run = executor.execute(token.clone(), steps, &config());
    let run = tokio::spawn(run);

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(1), run)
        .await
        .expect("execute returned within 1s of cancellation")
        .expect("execute task did not panic");

    assert!(outcome.exit_code.is_canceled());
    executor.close().await;
}
