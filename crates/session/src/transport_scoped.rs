// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `TransportScopedSession`: the default session for any non-local transport
//! (spec §4.1). Freezes env and workdir once, at construction, then forwards
//! every call to that frozen snapshot — only `id()` differs from the
//! session it wraps.

use crate::error::SessionError;
use crate::session::{RunIo, RunOutcome, Session};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct TransportScopedSession {
    transport_id: String,
    /// `base`, already pinned to the env/workdir snapshot taken at
    /// construction time. Re-derivations (`with_env`/`with_workdir`) layer
    /// further on top of this frozen base, never touching live host state.
    base: Arc<dyn Session>,
}

impl TransportScopedSession {
    /// Build a transport-scoped view over `base`, freezing its *current*
    /// env/workdir as the permanent snapshot for this transport.
    pub fn new(transport_id: impl Into<String>, base: Arc<dyn Session>) -> Self {
        let frozen = base.with_env(base.env()).with_workdir(base.workdir());
        Self { transport_id: transport_id.into(), base: frozen }
    }

    fn wrap(transport_id: String, base: Arc<dyn Session>) -> Arc<dyn Session> {
        Arc::new(Self { transport_id, base })
    }
}

#[async_trait]
impl Session for TransportScopedSession {
    async fn run(
        &self,
        cancel: CancellationToken,
        argv: &[String],
        io: RunIo,
    ) -> Result<RunOutcome, SessionError> {
        self.base.run(cancel, argv, io).await
    }

    async fn put(
        &self,
        cancel: CancellationToken,
        bytes: &[u8],
        path: &Path,
        perm: u32,
    ) -> Result<(), SessionError> {
        self.base.put(cancel, bytes, path, perm).await
    }

    async fn get(&self, cancel: CancellationToken, path: &Path) -> Result<Vec<u8>, SessionError> {
        self.base.get(cancel, path).await
    }

    fn env(&self) -> BTreeMap<String, String> {
        self.base.env()
    }

    fn workdir(&self) -> PathBuf {
        self.base.workdir()
    }

    fn with_env(&self, delta: BTreeMap<String, String>) -> Arc<dyn Session> {
        Self::wrap(self.transport_id.clone(), self.base.with_env(delta))
    }

    fn with_workdir(&self, dir: PathBuf) -> Arc<dyn Session> {
        Self::wrap(self.transport_id.clone(), self.base.with_workdir(dir))
    }

    fn id(&self) -> &str {
        &self.transport_id
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.base.close().await
    }
}
