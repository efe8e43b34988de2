// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `file` sink (spec §4.7): the only sink the executor ships
//! unconditionally. Reads and writes a path on the local filesystem,
//! resolved against the frame's workdir if relative.

use async_trait::async_trait;
use opal_core::{AsyncReader, AsyncWriter, DynError, ExecutionContext, Io, IoCaps, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A `file` sink bound to a path. Constructed either directly — the
/// "bare-path form" produced by the `@shell(command=...)` rewrite (spec
/// §4.7) — or via the registry's unbound instance plus [`Io::with_params`]
/// for an explicit `@file(path=...)` decorator.
#[derive(Debug, Default)]
pub struct FileSink {
    path: Option<PathBuf>,
}

impl FileSink {
    /// The registry's unbound instance; only useful via `with_params`.
    pub fn unbound() -> Self {
        Self { path: None }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    /// The sink identity string used in error messages (spec §6):
    /// `"@file(<path>)"`.
    pub fn identity(&self) -> String {
        match &self.path {
            Some(path) => format!("@file({})", path.display()),
            None => "@file(<unresolved>)".to_string(),
        }
    }

    fn resolved_path(&self, ctx: &ExecutionContext) -> Result<PathBuf, DynError> {
        let path = self.path.as_ref().ok_or_else(|| -> DynError { "file sink has no path bound".into() })?;
        Ok(if path.is_absolute() { path.clone() } else { ctx.workdir().join(path) })
    }
}

#[async_trait]
impl Io for FileSink {
    fn io_caps(&self) -> IoCaps {
        IoCaps { read: true, write: true, append: true }
    }

    async fn open_read(&self, ctx: &ExecutionContext) -> Result<AsyncReader, DynError> {
        let path = self.resolved_path(ctx)?;
        let file = tokio::fs::File::open(&path).await?;
        Ok(Box::new(file))
    }

    async fn open_write(&self, ctx: &ExecutionContext, append: bool) -> Result<AsyncWriter, DynError> {
        let path = self.resolved_path(ctx)?;
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .await?;
        Ok(Box::new(file))
    }

    fn with_params(&self, params: &BTreeMap<String, Value>) -> Option<Box<dyn Io>> {
        let path = params.get("path")?.as_str()?;
        Some(Box::new(FileSink::with_path(path)))
    }
}
