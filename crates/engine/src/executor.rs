// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The public `Executor` surface (spec §6 "Executor public surface"):
//! `execute`/`execute_plan` over a [`Config`], returning an [`ExecuteOutcome`]
//! rather than an `Err` for any runtime failure (spec §7 "the executor
//! never returns an `Error` to the caller for a runtime failure" — the one
//! exception, a `ProgrammerViolation`, panics rather than returning at all).

use crate::config::Config;
use crate::interpreter::Interpreter;
use opal_core::{DebugEvent, ExecutionContext, ExitCode, Plan, Step, Telemetry, TelemetryLevel};
use opal_core::{DebugLevel, StepTelemetry};
use opal_shell::ShellWorkerPool;
use opal_session::SessionRuntime;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Result of [`Executor::execute`]/[`Executor::execute_plan`] (spec §6).
#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    pub exit_code: ExitCode,
    pub duration: Duration,
    pub steps_run: usize,
    pub telemetry: Option<Telemetry>,
    pub debug_events: Option<Vec<DebugEvent>>,
}

/// Owns the long-lived state a run of steps needs: the session cache, the
/// shell worker pool, and the decorator registry. Cheap to construct per
/// `Config`; expensive to reconstruct per step, since that would discard
/// pooled workers and cached sessions between steps (spec §4.1, §4.4).
pub struct Executor {
    sessions: Arc<SessionRuntime>,
    pool: Arc<ShellWorkerPool>,
    interpreter: Arc<Interpreter>,
}

impl Executor {
    /// Build an executor from `config`: a custom `session_factory` is used
    /// if set, otherwise [`opal_session::default_factory`] (spec §4.1).
    pub fn new(config: &Config) -> Self {
        let sessions = Arc::new(match config.session_factory() {
            Some(factory) => SessionRuntime::new(factory),
            None => SessionRuntime::with_default_factory(),
        });
        let pool = Arc::new(ShellWorkerPool::new(Arc::clone(&sessions)));
        let registry = config.registry();
        let interpreter = Interpreter::new(Arc::clone(&sessions), Arc::clone(&pool), registry, config.vault_handle());
        Self { sessions, pool, interpreter }
    }

    /// Run `steps` in order, fail-fast on the first non-success exit code
    /// (spec §4.5, §6). The root frame's env/workdir are seeded from the
    /// `local` session so a plan with no transport-changing steps sees the
    /// host's own environment.
    pub async fn execute(&self, cancel: CancellationToken, steps: Vec<Step>, config: &Config) -> ExecuteOutcome {
        let start = Instant::now();
        let local = self
            .sessions
            .session_for(opal_core::LOCAL_TRANSPORT)
            .unwrap_or_else(|e| unreachable!("the local session factory never fails: {e}"));
        let frame = ExecutionContext::root(cancel, local.env(), local.workdir());

        let mut telemetry = (config.telemetry() != TelemetryLevel::Off).then(Telemetry::default);
        let mut debug_events = (config.debug() != DebugLevel::Off).then(Vec::new);

        let step_exec = self.interpreter.step_executor();
        let mut last = ExitCode::SUCCESS;
        let mut steps_run = 0;
        for step in steps {
            if frame.is_cancelled() {
                last = ExitCode::CANCELED;
                break;
            }
            if let Some(events) = debug_events.as_mut() {
                events.push(DebugEvent::NodeEntered { description: format!("step {}", step.id) });
                if config.debug() == DebugLevel::Detailed {
                    events.push(DebugEvent::Detail { description: format!("{:?}", step.tree) });
                }
            }

            let step_start = Instant::now();
            let step_id = step.id;
            let result = (step_exec)(frame.clone(), step).await;
            steps_run += 1;

            let (code, failed) = match result {
                Ok(code) => (code, !code.is_success()),
                Err(source) => {
                    tracing::error!(step = %step_id, error = %source, "step failed");
                    (ExitCode::failure(1), true)
                }
            };
            last = code;

            if let Some(telemetry) = telemetry.as_mut() {
                if config.telemetry() == TelemetryLevel::Timing {
                    telemetry.steps.push(StepTelemetry { step_id, duration: step_start.elapsed(), failed });
                }
                if failed && telemetry.failed_step.is_none() {
                    telemetry.failed_step = Some(step_id);
                }
            }

            if failed {
                break;
            }
        }

        ExecuteOutcome { exit_code: last, duration: start.elapsed(), steps_run, telemetry, debug_events }
    }

    /// Convenience wrapper over [`Executor::execute`] that runs every step
    /// of `plan` (spec §6 "ExecutePlan").
    pub async fn execute_plan(&self, cancel: CancellationToken, plan: Plan, config: &Config) -> ExecuteOutcome {
        self.execute(cancel, plan.steps, config).await
    }

    /// Close every cached session and pooled worker. Idempotent; safe to
    /// call even if nothing was ever run.
    pub async fn close(&self) {
        self.pool.close().await;
        self.sessions.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::test_support::{shell_command, step};
    use opal_core::TreeNode;

    fn config() -> Config {
        Config::new()
    }

    #[tokio::test]
    async fn empty_plan_is_success() {
        let executor = Executor::new(&config());
        let outcome = executor.execute(CancellationToken::new(), Vec::new(), &config()).await;
        assert!(outcome.exit_code.is_success());
        assert_eq!(outcome.steps_run, 0);
        executor.close().await;
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_first_step() {
        let token = CancellationToken::new();
        token.cancel();
        let executor = Executor::new(&config());
        let steps = vec![step(1, TreeNode::Command(shell_command("local", "echo hi")))];
        let outcome = executor.execute(token, steps, &config()).await;
        assert!(outcome.exit_code.is_canceled());
        assert_eq!(outcome.steps_run, 0);
        executor.close().await;
    }

    #[tokio::test]
    async fn telemetry_off_by_default() {
        let executor = Executor::new(&config());
        let outcome = executor.execute(CancellationToken::new(), Vec::new(), &config()).await;
        assert!(outcome.telemetry.is_none());
        assert!(outcome.debug_events.is_none());
        executor.close().await;
    }

    #[tokio::test]
    async fn basic_telemetry_records_failed_step_without_timings() {
        let executor = Executor::new(&config());
        let steps = vec![step(1, TreeNode::Command(shell_command("local", "exit 3")))];
        let outcome = executor
            .execute(CancellationToken::new(), steps, &config().telemetry(TelemetryLevel::Basic))
            .await;
        let telemetry = outcome.telemetry.expect("telemetry requested");
        assert_eq!(telemetry.failed_step, Some(opal_core::StepId::new(1)));
        assert!(telemetry.steps.is_empty(), "Basic level records outcome, not per-step timings");
        executor.close().await;
    }
}
