// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-frame execution context (spec §4.2).
//!
//! `ExecutionContext` is immutable: every `with_*` method consumes `self`
//! and returns a new frame, so a caller can never observe a frame changing
//! out from under it. Piped stdin/stdout are deliberately *not* frame
//! fields here — spec §3 lists them as part of the frame, but they are
//! `tokio` trait objects that cannot implement `Clone`, and the interpreter
//! needs to branch over the same frame for `Sequence`/`And`/`Or` siblings
//! (spec §4.5) while handing each child a *different* pipe pairing. We keep
//! the frame `Clone` and thread stdin/stdout as explicit dispatch
//! parameters instead (spec §4.5's own dispatch signature —
//! `(frame, node, stdin, stdout)` — already treats them this way).

use crate::ids::TransportId;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Immutable per-frame state threaded through the tree interpreter.
#[derive(Clone)]
pub struct ExecutionContext {
    cancel: CancellationToken,
    args: BTreeMap<String, crate::value::Value>,
    env: BTreeMap<String, String>,
    workdir: PathBuf,
    transport_id: TransportId,
    /// Env snapshot captured the moment this frame first bound to
    /// `transport_id`; deltas for the shell worker are computed against
    /// this, never against whatever the session's env has drifted to since
    /// (spec §9 "Transport rebind resets env and workdir").
    base_env: BTreeMap<String, String>,
    base_workdir: PathBuf,
}

impl ExecutionContext {
    /// Build the root frame: empty args, host env/cwd snapshot, `"local"`
    /// transport, cancellation derived from `root_cancel`.
    pub fn root(root_cancel: CancellationToken, env: BTreeMap<String, String>, workdir: PathBuf) -> Self {
        Self {
            cancel: root_cancel,
            args: BTreeMap::new(),
            env: env.clone(),
            workdir: workdir.clone(),
            transport_id: TransportId::local(),
            base_env: env,
            base_workdir: workdir,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn args(&self) -> &BTreeMap<String, crate::value::Value> {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn base_env(&self) -> &BTreeMap<String, String> {
        &self.base_env
    }

    pub fn base_workdir(&self) -> &Path {
        &self.base_workdir
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn transport_id(&self) -> &TransportId {
        &self.transport_id
    }

    /// Replaces the cancellation token, a child derived from `new_ctx`.
    pub fn with_context(mut self, new_ctx: CancellationToken) -> Self {
        self.cancel = new_ctx;
        self
    }

    /// Deep-copies in a new environment map, replacing the current one.
    pub fn with_environ(mut self, new_env: BTreeMap<String, String>) -> Self {
        self.env = new_env;
        self
    }

    /// Resolves `dir` against the current workdir if relative, then
    /// path-cleans the result (collapsing `.`/`..`). Always absolute
    /// afterward (spec §3, invariant 2).
    pub fn with_workdir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let resolved = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.workdir.join(dir)
        };
        self.workdir = clean_path(&resolved);
        self
    }

    /// Replaces this frame's args (the spec's `Clone(args, stdin, stdout)`
    /// operator, minus the pipe fields — see the module doc comment).
    pub fn with_args(mut self, args: BTreeMap<String, crate::value::Value>) -> Self {
        self.args = args;
        self
    }

    /// Rebinds to `transport_id`. A no-op if `transport_id` is empty or
    /// already current. Otherwise resets `env`/`workdir` (and their `base_*`
    /// counterparts) to `snapshot_env`/`snapshot_workdir` — the session's
    /// state at the moment of rebind — so the caller's local modifications
    /// never leak across a transport boundary (spec §4.2).
    pub fn with_transport_id(
        mut self,
        transport_id: impl Into<String>,
        snapshot_env: BTreeMap<String, String>,
        snapshot_workdir: PathBuf,
    ) -> Self {
        let transport_id = TransportId::new(transport_id);
        if transport_id == self.transport_id {
            return self;
        }
        self.transport_id = transport_id;
        self.env = snapshot_env.clone();
        self.workdir = snapshot_workdir.clone();
        self.base_env = snapshot_env;
        self.base_workdir = snapshot_workdir;
        self
    }
}

/// Collapse `.`/`..` components without touching the filesystem (unlike
/// `std::fs::canonicalize`, this never needs the path to exist).
fn clean_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), None | Some(Component::RootDir)) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> ExecutionContext {
        ExecutionContext::root(CancellationToken::new(), BTreeMap::new(), PathBuf::from("/work"))
    }

    #[test]
    fn with_workdir_resolves_relative_paths() {
        let f = root().with_workdir("sub/dir");
        assert_eq!(f.workdir(), Path::new("/work/sub/dir"));
    }

    #[test]
    fn with_workdir_cleans_dot_dot() {
        let f = root().with_workdir("/work/a/../b");
        assert_eq!(f.workdir(), Path::new("/work/b"));
    }

    #[test]
    fn with_workdir_is_always_absolute() {
        let f = root().with_workdir("relative");
        assert!(f.workdir().is_absolute());
    }

    #[test]
    fn original_frame_unchanged_after_with_methods() {
        let original = root();
        let mut env = BTreeMap::new();
        env.insert("X".to_string(), "1".to_string());
        let _derived = original.clone().with_environ(env);
        assert!(original.env().is_empty());
        assert_eq!(original.workdir(), Path::new("/work"));
    }

    #[test]
    fn transport_rebind_is_noop_for_empty_or_same_id() {
        let original = root();
        let same = original.clone().with_transport_id("", BTreeMap::new(), PathBuf::from("/other"));
        assert_eq!(same.workdir(), Path::new("/work"));

        let also_same =
            original.clone().with_transport_id("local", BTreeMap::new(), PathBuf::from("/other"));
        assert_eq!(also_same.workdir(), Path::new("/work"));
    }

    #[test]
    fn transport_rebind_resets_env_and_workdir_from_snapshot() {
        let mut host_env = BTreeMap::new();
        host_env.insert("LOCAL_ONLY".to_string(), "x".to_string());
        let original = ExecutionContext::root(CancellationToken::new(), host_env, PathBuf::from("/work"));

        let mut snapshot_env = BTreeMap::new();
        snapshot_env.insert("REMOTE".to_string(), "y".to_string());
        let rebound =
            original.with_transport_id("staging", snapshot_env.clone(), PathBuf::from("/srv"));

        assert_eq!(rebound.env(), &snapshot_env);
        assert_eq!(rebound.workdir(), Path::new("/srv"));
        assert_eq!(rebound.base_env(), &snapshot_env);
        assert_eq!(rebound.base_workdir(), Path::new("/srv"));
    }
}
