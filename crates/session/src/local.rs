// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `LocalSession`: runs commands directly on the host process.
//!
//! Env and workdir are read LIVE from the host on every call (spec §4.1:
//! the freeze-at-construction rule applies only to non-local transports).

use crate::error::SessionError;
use crate::session::{RunIo, RunOutcome, Session};
use async_trait::async_trait;
use opal_core::{ExitCode, LOCAL_TRANSPORT};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// A session bound to the local host. Carries an env delta and a workdir
/// override layered on top of the live host state, applied fresh on every
/// call rather than snapshotted once.
pub struct LocalSession {
    env_overrides: BTreeMap<String, String>,
    workdir_override: Option<PathBuf>,
}

impl LocalSession {
    pub fn new() -> Self {
        Self { env_overrides: BTreeMap::new(), workdir_override: None }
    }

    fn effective_workdir(&self) -> PathBuf {
        self.workdir_override
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    fn effective_env(&self) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = std::env::vars().collect();
        env.extend(self.env_overrides.clone());
        env
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Session for LocalSession {
    async fn run(
        &self,
        cancel: CancellationToken,
        argv: &[String],
        io: RunIo,
    ) -> Result<RunOutcome, SessionError> {
        let Some((program, rest)) = argv.split_first() else {
            return Ok(RunOutcome { exit_code: ExitCode::SUCCESS });
        };

        let mut process = tokio::process::Command::new(program);
        process.args(rest);
        process.current_dir(self.effective_workdir());
        process.env_clear();
        process.envs(self.effective_env());
        process.stdin(io.stdin);
        process.stdout(io.stdout);
        process.stderr(io.stderr);

        let mut child = process.spawn().map_err(|source| SessionError::Spawn {
            command: program.clone(),
            source,
        })?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(command = %program, "canceling local session run; killing process tree");
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(RunOutcome { exit_code: ExitCode::CANCELED })
            }
            result = child.wait() => {
                let status = result.map_err(|source| SessionError::Spawn {
                    command: program.clone(),
                    source,
                })?;
                Ok(RunOutcome { exit_code: ExitCode::from_process(status.code().unwrap_or(-1)) })
            }
        }
    }

    async fn put(
        &self,
        cancel: CancellationToken,
        bytes: &[u8],
        path: &Path,
        perm: u32,
    ) -> Result<(), SessionError> {
        let target = self.effective_workdir().join(path);
        let write = async {
            let mut file = tokio::fs::File::create(&target).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(perm);
                tokio::fs::set_permissions(&target, perms).await?;
            }
            #[cfg(not(unix))]
            {
                let _ = perm;
            }
            Ok::<(), std::io::Error>(())
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SessionError::Put {
                path: target.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Interrupted, "canceled"),
            }),
            result = write => result.map_err(|source| SessionError::Put {
                path: target.display().to_string(),
                source,
            }),
        }
    }

    async fn get(&self, cancel: CancellationToken, path: &Path) -> Result<Vec<u8>, SessionError> {
        let target = self.effective_workdir().join(path);
        let read = tokio::fs::read(&target);

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SessionError::Get {
                path: target.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Interrupted, "canceled"),
            }),
            result = read => result.map_err(|source| SessionError::Get {
                path: target.display().to_string(),
                source,
            }),
        }
    }

    fn env(&self) -> BTreeMap<String, String> {
        self.effective_env()
    }

    fn workdir(&self) -> PathBuf {
        self.effective_workdir()
    }

    fn with_env(&self, delta: BTreeMap<String, String>) -> Arc<dyn Session> {
        let mut env_overrides = self.env_overrides.clone();
        env_overrides.extend(delta);
        Arc::new(LocalSession { env_overrides, workdir_override: self.workdir_override.clone() })
    }

    fn with_workdir(&self, dir: PathBuf) -> Arc<dyn Session> {
        let workdir = if dir.is_absolute() { dir } else { self.effective_workdir().join(dir) };
        Arc::new(LocalSession {
            env_overrides: self.env_overrides.clone(),
            workdir_override: Some(workdir),
        })
    }

    fn id(&self) -> &str {
        LOCAL_TRANSPORT
    }

    async fn close(&self) -> Result<(), SessionError> {
        Ok(())
    }
}
