// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Session` contract (spec §3): a handle to an execution endpoint.

use crate::error::SessionError;
use async_trait::async_trait;
use opal_core::ExitCode;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where a spawned process's standard streams go. Built from real OS
/// `Stdio` handles (including pipe ends from the pipeline fabric, spec
/// §4.6) rather than in-memory buffers, so child processes see genuine
/// `EPIPE`/`SIGPIPE` behavior.
pub struct RunIo {
    pub stdin: Stdio,
    pub stdout: Stdio,
    pub stderr: Stdio,
}

impl Default for RunIo {
    fn default() -> Self {
        Self { stdin: Stdio::inherit(), stdout: Stdio::inherit(), stderr: Stdio::inherit() }
    }
}

/// Outcome of a [`Session::run`] call.
#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    pub exit_code: ExitCode,
}

/// A handle to an execution endpoint: the local host, or a remote
/// transport. `with_env`/`with_workdir` return a *new* session rather than
/// mutating `self` — sessions are immutable-by-return, same as
/// `ExecutionContext`.
#[async_trait]
pub trait Session: Send + Sync {
    /// Run `argv[0]` with `argv[1..]`, blocking until exit or `cancel`
    /// fires. `cancel` firing must kill the process tree.
    async fn run(
        &self,
        cancel: CancellationToken,
        argv: &[String],
        io: RunIo,
    ) -> Result<RunOutcome, SessionError>;

    async fn put(
        &self,
        cancel: CancellationToken,
        bytes: &[u8],
        path: &Path,
        perm: u32,
    ) -> Result<(), SessionError>;

    async fn get(&self, cancel: CancellationToken, path: &Path) -> Result<Vec<u8>, SessionError>;

    fn env(&self) -> BTreeMap<String, String>;

    fn workdir(&self) -> PathBuf;

    fn with_env(&self, delta: BTreeMap<String, String>) -> Arc<dyn Session>;

    fn with_workdir(&self, dir: PathBuf) -> Arc<dyn Session>;

    /// Stable identifier — `"local"` for the host, the transport name
    /// otherwise. Never empty.
    fn id(&self) -> &str;

    /// Idempotent: safe to call more than once.
    async fn close(&self) -> Result<(), SessionError>;
}
