// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A scriptable `Session` double, gated behind `test-support`: a
//! hand-written test double rather than a mocking framework.

use crate::error::SessionError;
use crate::session::{RunIo, RunOutcome, Session};
use async_trait::async_trait;
use opal_core::ExitCode;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Records every `run` invocation's argv and returns a scripted exit code
/// (defaulting to success) without spawning anything.
pub struct FakeSession {
    id: String,
    env: BTreeMap<String, String>,
    workdir: PathBuf,
    scripted_exit: ExitCode,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl FakeSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            env: BTreeMap::new(),
            workdir: PathBuf::from("/"),
            scripted_exit: ExitCode::SUCCESS,
            calls: Arc::new(Mutex::new(Vec::new())),
            files: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn with_scripted_exit(mut self, exit_code: ExitCode) -> Self {
        self.scripted_exit = exit_code;
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn run(
        &self,
        cancel: CancellationToken,
        argv: &[String],
        _io: RunIo,
    ) -> Result<RunOutcome, SessionError> {
        self.calls.lock().push(argv.to_vec());
        if cancel.is_cancelled() {
            return Ok(RunOutcome { exit_code: ExitCode::CANCELED });
        }
        Ok(RunOutcome { exit_code: self.scripted_exit })
    }

    async fn put(
        &self,
        _cancel: CancellationToken,
        bytes: &[u8],
        path: &Path,
        _perm: u32,
    ) -> Result<(), SessionError> {
        self.files.lock().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, _cancel: CancellationToken, path: &Path) -> Result<Vec<u8>, SessionError> {
        self.files.lock().get(path).cloned().ok_or_else(|| SessionError::Get {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        })
    }

    fn env(&self) -> BTreeMap<String, String> {
        self.env.clone()
    }

    fn workdir(&self) -> PathBuf {
        self.workdir.clone()
    }

    fn with_env(&self, delta: BTreeMap<String, String>) -> Arc<dyn Session> {
        let mut env = self.env.clone();
        env.extend(delta);
        Arc::new(Self {
            id: self.id.clone(),
            env,
            workdir: self.workdir.clone(),
            scripted_exit: self.scripted_exit,
            calls: Arc::clone(&self.calls),
            files: Arc::clone(&self.files),
        })
    }

    fn with_workdir(&self, dir: PathBuf) -> Arc<dyn Session> {
        Arc::new(Self {
            id: self.id.clone(),
            env: self.env.clone(),
            workdir: dir,
            scripted_exit: self.scripted_exit,
            calls: Arc::clone(&self.calls),
            files: Arc::clone(&self.files),
        })
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn close(&self) -> Result<(), SessionError> {
        Ok(())
    }
}
