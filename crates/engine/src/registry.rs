// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The decorator registry (spec §4.3, §9 "Cyclic graphs: none" /
//! "supplemental behavior"): a `name -> Arc<dyn Exec>` /
//! `name -> Arc<dyn Io>` pair behind a `parking_lot::RwLock`, mirroring the
//! teacher's lock convention for shared in-memory state
//! (`oj-engine::Executor`'s `Arc<Mutex<MaterializedState>>`).
//!
//! The `shell` decorator is deliberately *not* dispatched through this
//! registry's `Exec` lookup (spec §4.3, §9 "Shell authority") — the tree
//! interpreter special-cases `Command::is_shell()` before ever consulting
//! `lookup_exec`. A registration under the name `"shell"` is still
//! accepted here (so telemetry/monitoring tooling can observe that one was
//! registered) but [`DecoratorRegistry::shell_authority_name`] is the only
//! sanctioned way anything reads it back for execution purposes.

use opal_core::{Exec, Io};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved name the shell decorator is special-cased under. A
/// registration here is consulted for telemetry counts only; the
/// interpreter never calls its `wrap` (spec §4.3, §9).
pub const SHELL_DECORATOR_NAME: &str = "shell";

#[derive(Default)]
pub struct DecoratorRegistry {
    exec: RwLock<HashMap<String, Arc<dyn Exec>>>,
    io: RwLock<HashMap<String, Arc<dyn Io>>>,
}

impl DecoratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a decorator name by trimming a leading `@` (spec §4.3).
    pub fn normalize(name: &str) -> &str {
        name.strip_prefix('@').unwrap_or(name)
    }

    pub fn register_exec(&self, name: impl Into<String>, decorator: Arc<dyn Exec>) {
        self.exec.write().insert(name.into(), decorator);
    }

    pub fn register_io(&self, name: impl Into<String>, decorator: Arc<dyn Io>) {
        self.io.write().insert(name.into(), decorator);
    }

    /// Look up an `Exec`-role decorator by name (already normalized by the
    /// caller). Returns `None` rather than erroring — an unregistered name
    /// is a [`opal_core::ProgrammerViolation::UnregisteredDecorator`] that
    /// the caller (the interpreter) raises, not this lookup.
    pub fn lookup_exec(&self, name: &str) -> Option<Arc<dyn Exec>> {
        self.exec.read().get(name).cloned()
    }

    pub fn lookup_io(&self, name: &str) -> Option<Arc<dyn Io>> {
        self.io.read().get(name).cloned()
    }

    pub fn exec_registered(&self, name: &str) -> bool {
        self.exec.read().contains_key(name)
    }

    pub fn io_registered(&self, name: &str) -> bool {
        self.io.read().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opal_core::{DynError, ExecNode, ExecutionContext, ExitCode, Value};
    use std::collections::BTreeMap;

    struct NoopExec;
    impl Exec for NoopExec {
        fn wrap(
            &self,
            _next: Option<Box<dyn ExecNode>>,
            _params: &BTreeMap<String, Value>,
        ) -> Result<Box<dyn ExecNode>, DynError> {
            struct Node;
            #[async_trait]
            impl ExecNode for Node {
                async fn execute(&self, _ctx: &ExecutionContext) -> Result<ExitCode, DynError> {
                    Ok(ExitCode::SUCCESS)
                }
            }
            Ok(Box::new(Node))
        }
    }

    #[test]
    fn leading_at_is_trimmed() {
        assert_eq!(DecoratorRegistry::normalize("@retry"), "retry");
        assert_eq!(DecoratorRegistry::normalize("retry"), "retry");
    }

    #[test]
    fn unregistered_decorator_returns_none() {
        let registry = DecoratorRegistry::new();
        assert!(registry.lookup_exec("retry").is_none());
    }

    #[test]
    fn registered_decorator_is_found_by_name() {
        let registry = DecoratorRegistry::new();
        registry.register_exec("retry", Arc::new(NoopExec));
        assert!(registry.lookup_exec("retry").is_some());
        assert!(registry.exec_registered("retry"));
    }

    #[test]
    fn shell_registration_is_accepted_but_not_authoritative() {
        let registry = DecoratorRegistry::new();
        registry.register_exec(SHELL_DECORATOR_NAME, Arc::new(NoopExec));
        // The registration is observable...
        assert!(registry.exec_registered(SHELL_DECORATOR_NAME));
        // ...but the interpreter never calls lookup_exec("shell") for
        // execution; see interpreter::dispatch_command's is_shell() guard.
    }
}
