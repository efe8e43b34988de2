// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-command env/workdir delta computation (spec §4.4 step 3, §9
//! "Transport rebind resets env and workdir"). Always computed against the
//! frame's `base_env`/`base_workdir` — the snapshot captured at the moment
//! this frame last rebound to its current transport — never against
//! whatever the session's live state has drifted to since.

use opal_core::ExecutionContext;

/// Env entries present in `frame.env()` that differ from `frame.base_env()`,
/// sorted by key (both are `BTreeMap`s, so iteration order is already
/// sorted — spec §4.4 step 4 "sorted, name-validated").
pub fn env_delta(frame: &ExecutionContext) -> Vec<(String, String)> {
    frame
        .env()
        .iter()
        .filter(|(key, value)| frame.base_env().get(key.as_str()).map(String::as_str) != Some(value.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// The `cd` target for the worker script, or `None` if the frame's workdir
/// already equals the session's base workdir (spec §4.4 step 3: "omit
/// workdir if it equals the session cwd").
pub fn cd_target(frame: &ExecutionContext) -> Option<String> {
    if frame.workdir() == frame.base_workdir() {
        None
    } else {
        Some(frame.workdir().display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;

    fn frame_with(env: BTreeMap<String, String>, workdir: &str) -> ExecutionContext {
        ExecutionContext::root(CancellationToken::new(), env, PathBuf::from(workdir))
    }

    #[test]
    fn no_delta_when_env_and_workdir_unchanged() {
        let frame = frame_with(BTreeMap::new(), "/work");
        assert!(env_delta(&frame).is_empty());
        assert_eq!(cd_target(&frame), None);
    }

    #[test]
    fn env_delta_reports_added_and_changed_keys_sorted() {
        let mut base = BTreeMap::new();
        base.insert("KEPT".to_string(), "1".to_string());
        base.insert("CHANGED".to_string(), "old".to_string());
        let frame = frame_with(base, "/work");

        let mut updated = frame.env().clone();
        updated.insert("CHANGED".to_string(), "new".to_string());
        updated.insert("ADDED".to_string(), "2".to_string());
        let frame = frame.with_environ(updated);

        assert_eq!(
            env_delta(&frame),
            vec![("ADDED".to_string(), "2".to_string()), ("CHANGED".to_string(), "new".to_string())]
        );
    }

    #[test]
    fn cd_target_reported_when_workdir_changed() {
        let frame = frame_with(BTreeMap::new(), "/work").with_workdir("sub");
        assert_eq!(cd_target(&frame), Some("/work/sub".to_string()));
    }
}
