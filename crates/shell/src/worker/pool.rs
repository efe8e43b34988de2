// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ShellWorkerPool` (spec §4.4): amortizes repeated short `bash`
//! invocations on the same transport behind a pool of long-lived workers.
//! The *first* call for a `(transport, bash)` key always runs direct via
//! `Session::run`; the pool only takes over from the second call.

use super::instance::{RunOutcome, RunSinks, Worker};
use crate::error::ShellWorkerError;
use opal_session::SessionRuntime;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct PoolState {
    /// Per-`(transport, bash)` call counter backing the admission test.
    counters: HashMap<String, u64>,
    /// Live workers per key; more than one can exist if several commands
    /// run concurrently on the same transport.
    workers: HashMap<String, Vec<Arc<Worker>>>,
}

pub struct ShellWorkerPool {
    sessions: Arc<SessionRuntime>,
    state: Mutex<PoolState>,
}

pub struct RunRequest<'a> {
    pub transport_id: &'a str,
    pub cd_target: Option<&'a str>,
    pub env_delta: &'a [(String, String)],
    pub command: &'a str,
    pub sinks: RunSinks<'a>,
}

impl ShellWorkerPool {
    pub fn new(sessions: Arc<SessionRuntime>) -> Self {
        Self { sessions, state: Mutex::new(PoolState::default()) }
    }

    /// The admission test (spec §4.4): increments the per-key counter
    /// under the pool mutex and returns `true` iff the post-increment
    /// count is `>= 2`.
    pub fn admit(&self, transport_id: &str) -> bool {
        let mut state = self.state.lock();
        let count = state.counters.entry(transport_id.to_string()).or_insert(0);
        *count += 1;
        *count >= 2
    }

    /// Run `request` on a pooled worker for `request.transport_id`,
    /// constructing one if none is free (spec §4.4 `pool.Run`).
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        request: RunRequest<'_>,
    ) -> Result<RunOutcome, ShellWorkerError> {
        let worker = self.acquire(request.transport_id).await?;

        let result = worker
            .run(cancel, request.cd_target, request.env_delta, request.command, request.sinks)
            .await;

        self.release(request.transport_id, &worker);
        result
    }

    async fn acquire(&self, transport_id: &str) -> Result<Arc<Worker>, ShellWorkerError> {
        let existing = {
            let mut state = self.state.lock();
            let workers = state.workers.entry(transport_id.to_string()).or_default();
            workers.iter().find(|w| w.is_alive() && !w.busy.swap(true, std::sync::atomic::Ordering::SeqCst)).cloned()
        };
        if let Some(worker) = existing {
            return Ok(worker);
        }

        let session = self
            .sessions
            .session_for(transport_id)
            .map_err(|e| ShellWorkerError::not_started(transport_id, crate::error::ShellWorkerCause::Session(e)))?;
        let worker = Worker::spawn(transport_id, &session).await?;
        worker.busy.store(true, std::sync::atomic::Ordering::SeqCst);

        let mut state = self.state.lock();
        state.workers.entry(transport_id.to_string()).or_default().push(Arc::clone(&worker));
        Ok(worker)
    }

    fn release(&self, transport_id: &str, worker: &Arc<Worker>) {
        let mut state = self.state.lock();
        if worker.is_alive() {
            worker.busy.store(false, std::sync::atomic::Ordering::SeqCst);
        } else if let Some(workers) = state.workers.get_mut(transport_id) {
            workers.retain(|w| !Arc::ptr_eq(w, worker));
        }
    }

    /// Snapshot every worker under the lock, clear the pool, then close
    /// each worker outside the lock (spec §4.4 `Pool.Close`). Idempotent:
    /// a second call simply finds nothing left to close.
    pub async fn close(&self) {
        let workers: Vec<Arc<Worker>> = {
            let mut state = self.state.lock();
            state.counters.clear();
            state.workers.drain().flat_map(|(_, workers)| workers).collect()
        };
        for worker in workers {
            worker.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_on_a_key_never_admits() {
        let pool = ShellWorkerPool::new(Arc::new(SessionRuntime::with_default_factory()));
        assert!(!pool.admit("local"));
    }

    #[test]
    fn second_call_on_the_same_key_admits() {
        let pool = ShellWorkerPool::new(Arc::new(SessionRuntime::with_default_factory()));
        assert!(!pool.admit("local"));
        assert!(pool.admit("local"));
        assert!(pool.admit("local"));
    }

    #[test]
    fn counters_are_independent_per_key() {
        let pool = ShellWorkerPool::new(Arc::new(SessionRuntime::with_default_factory()));
        assert!(!pool.admit("a"));
        assert!(!pool.admit("b"));
        assert!(pool.admit("a"));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let pool = ShellWorkerPool::new(Arc::new(SessionRuntime::with_default_factory()));
        pool.close().await;
        pool.close().await;
    }
}
