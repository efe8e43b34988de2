// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! opal-shell: the mechanical shell layer (spec §4.4, §4.6, §4.7) —
//! shell selection, the chunk pool, the long-lived worker pool, and the
//! `file` sink. Nothing here knows about `TreeNode`; tree-aware
//! orchestration (dispatch, pipeline wiring, redirect resolution, the
//! decorator registry) lives in `opal-engine`, since a pipeline element
//! can be a `Redirect` as well as a shell `Command` (spec §4.6) — a
//! distinction this crate has no business encoding.

pub mod chunk_pool;
pub mod error;
pub mod shell_kind;
pub mod sink;
pub mod worker;

pub use chunk_pool::{ChunkPool, CHUNK_SIZE};
pub use error::{ShellSelectionError, ShellWorkerCause, ShellWorkerError, SinkError, SinkOperation};
pub use shell_kind::{eligible_for_worker, ShellKind};
pub use sink::FileSink;
pub use worker::{RunOutcome, RunRequest, RunSinks, ShellWorkerPool, Worker};
