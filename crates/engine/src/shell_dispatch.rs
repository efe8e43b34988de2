// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glue between `Command::is_shell()` nodes and `opal_shell` (spec §4.4,
//! §4.2). The interpreter hands this module a resolved `command` string
//! and a frame; this module decides worker-vs-direct, builds the right
//! argv/script, and applies the one-shot retry-on-not-started policy.

use crate::error::ExecuteError;
use crate::pipe_end::PipeEnd;
use opal_core::{ExecutionContext, ExitCode};
use opal_session::{RunIo, Session};
use opal_shell::{eligible_for_worker, RunRequest, RunSinks, ShellKind, ShellWorkerPool};
use std::sync::Arc;

/// Run a shell command node (spec §4.4/§4.2): resolves the shell kind,
/// decides worker-vs-direct eligibility, and runs it.
///
/// `explicit_shell` is the node's own `shell` arg, if any (spec §4.4
/// "explicit `shell` arg > env `OPAL_SHELL` > default `bash`").
pub async fn run_shell_command(
    frame: &ExecutionContext,
    session: &Arc<dyn Session>,
    pool: &ShellWorkerPool,
    explicit_shell: Option<&str>,
    command: &str,
    stdin: &PipeEnd,
    stdout: &PipeEnd,
) -> Result<ExitCode, ExecuteError> {
    let shell = ShellKind::resolve(explicit_shell)?;

    let stdin_provided = !matches!(stdin, PipeEnd::Inherit);
    let stdout_is_fifo = stdout.is_pipe();

    if eligible_for_worker(shell, stdin_provided, stdout_is_fifo) && pool.admit(frame.transport_id().as_str()) {
        match run_via_worker(frame, pool, command, stdout).await {
            Ok(code) => return Ok(code),
            Err(err) if err.is_cancellation() => return Ok(ExitCode::CANCELED),
            Err(err) if !err.command_started => {
                // spec §4.4 fallback policy: commandStarted=false is safe to retry direct.
                tracing::warn!(transport_id = %frame.transport_id(), error = %err, "shell worker failed before starting; falling back to direct session run");
            }
            Err(err) => return Err(err.into()),
        }
    }

    run_direct(frame, session, shell, command, stdin, stdout).await
}

async fn run_via_worker(
    frame: &ExecutionContext,
    pool: &ShellWorkerPool,
    command: &str,
    stdout: &PipeEnd,
) -> Result<ExitCode, opal_shell::ShellWorkerError> {
    let cd_target = crate::delta::cd_target(frame);
    let env_delta = crate::delta::env_delta(frame);

    let mut stdout_writer = stdout.to_async_writer().map_err(|e| {
        opal_shell::ShellWorkerError::not_started(
            frame.transport_id().as_str(),
            opal_shell::ShellWorkerCause::Spawn(e),
        )
    })?;
    let sinks = RunSinks {
        stdout: stdout_writer.as_mut().map(|f| f as &mut (dyn tokio::io::AsyncWrite + Send + Unpin)),
        stderr: None,
    };

    let outcome = pool
        .run(
            frame.cancel_token(),
            RunRequest {
                transport_id: frame.transport_id().as_str(),
                cd_target: cd_target.as_deref(),
                env_delta: &env_delta,
                command,
                sinks,
            },
        )
        .await?;
    Ok(ExitCode::from_process(outcome.exit_code))
}

async fn run_direct(
    frame: &ExecutionContext,
    session: &Arc<dyn Session>,
    shell: ShellKind,
    command: &str,
    stdin: &PipeEnd,
    stdout: &PipeEnd,
) -> Result<ExitCode, ExecuteError> {
    let argv = shell.direct_argv(command);
    let spawn_err = |source: std::io::Error| opal_session::SessionError::Spawn { command: command.to_string(), source };
    let io = RunIo {
        stdin: stdin.to_stdio().map_err(spawn_err)?,
        stdout: stdout.to_stdio().map_err(spawn_err)?,
        stderr: std::process::Stdio::inherit(),
    };
    let outcome = session.run(frame.cancel_token().clone(), &argv, io).await?;
    Ok(outcome.exit_code)
}
