// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell selection and argv construction (spec §4.4).
//!
//! Precedence is explicit `shell` arg > `OPAL_SHELL` env > default `bash`.
//! Only `bash` is ever pooled by the [`crate::worker::ShellWorkerPool`];
//! `pwsh`/`cmd` always go through `Session::run` directly (spec §9 Open
//! Questions — pooling them is explicitly out of scope, not an oversight).

use crate::error::ShellSelectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellKind {
    Bash,
    Pwsh,
    Cmd,
}

impl ShellKind {
    pub fn parse(value: &str) -> Result<Self, ShellSelectionError> {
        match value {
            "bash" => Ok(ShellKind::Bash),
            "pwsh" => Ok(ShellKind::Pwsh),
            "cmd" => Ok(ShellKind::Cmd),
            other => Err(ShellSelectionError { value: other.to_string() }),
        }
    }

    /// Resolve `OPAL_SHELL`, falling back to [`ShellKind::Bash`] when unset.
    pub fn from_env() -> Result<Self, ShellSelectionError> {
        match std::env::var("OPAL_SHELL") {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(ShellKind::Bash),
        }
    }

    /// Apply the full precedence: explicit arg, then env, then default.
    pub fn resolve(explicit: Option<&str>) -> Result<Self, ShellSelectionError> {
        match explicit {
            Some(value) => Self::parse(value),
            None => Self::from_env(),
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            ShellKind::Bash => "bash",
            ShellKind::Pwsh => "pwsh",
            ShellKind::Cmd => "cmd",
        }
    }

    /// Only `bash` worker is ever pooled (spec §4.4, §9).
    pub fn poolable(self) -> bool {
        matches!(self, ShellKind::Bash)
    }

    /// Build the argv used to run `command` directly via `Session::run`
    /// (the one-shot / non-worker path).
    pub fn direct_argv(self, command: &str) -> Vec<String> {
        match self {
            ShellKind::Bash => {
                vec!["bash".to_string(), "-c".to_string(), command.to_string()]
            }
            ShellKind::Pwsh => vec![
                "pwsh".to_string(),
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                command.to_string(),
            ],
            ShellKind::Cmd => vec!["cmd".to_string(), "/C".to_string(), command.to_string()],
        }
    }

    /// Argv used to start a long-lived worker shell. Only meaningful for
    /// `bash`; callers must check [`ShellKind::poolable`] first.
    pub fn worker_argv(self) -> Vec<String> {
        debug_assert!(self.poolable());
        vec!["bash".to_string(), "--noprofile".to_string(), "--norc".to_string()]
    }
}

/// True iff the worker path is eligible for this command (spec §4.4's
/// "non-worker path conditions" — all must hold to use the pool):
/// `bash`, no caller stdin, and a stdout that is not a named pipe.
pub fn eligible_for_worker(shell: ShellKind, stdin_provided: bool, stdout_is_fifo: bool) -> bool {
    shell.poolable() && !stdin_provided && !stdout_is_fifo
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // `OPAL_SHELL` is process-wide state; serialize these against each
    // other so one test's value isn't observed mid-mutation by another.
    #[test]
    #[serial]
    fn explicit_arg_wins_over_env() {
        std::env::set_var("OPAL_SHELL", "cmd");
        let resolved = ShellKind::resolve(Some("bash")).unwrap();
        std::env::remove_var("OPAL_SHELL");
        assert_eq!(resolved, ShellKind::Bash);
    }

    #[test]
    #[serial]
    fn default_is_bash_when_nothing_set() {
        std::env::remove_var("OPAL_SHELL");
        assert_eq!(ShellKind::resolve(None).unwrap(), ShellKind::Bash);
    }

    #[test]
    #[serial]
    fn invalid_env_value_errors_with_expected_message() {
        std::env::set_var("OPAL_SHELL", "zsh");
        let err = ShellKind::resolve(None).unwrap_err();
        std::env::remove_var("OPAL_SHELL");
        assert_eq!(err.to_string(), "invalid OPAL_SHELL \"zsh\": expected one of bash, pwsh, cmd");
    }

    #[test]
    fn only_bash_is_poolable() {
        assert!(ShellKind::Bash.poolable());
        assert!(!ShellKind::Pwsh.poolable());
        assert!(!ShellKind::Cmd.poolable());
    }

    #[test]
    fn worker_eligibility_requires_bash_no_stdin_no_fifo_stdout() {
        assert!(eligible_for_worker(ShellKind::Bash, false, false));
        assert!(!eligible_for_worker(ShellKind::Bash, true, false));
        assert!(!eligible_for_worker(ShellKind::Bash, false, true));
        assert!(!eligible_for_worker(ShellKind::Pwsh, false, false));
    }

    #[test]
    fn direct_argv_shapes_match_spec() {
        assert_eq!(
            ShellKind::Bash.direct_argv("echo hi"),
            vec!["bash".to_string(), "-c".to_string(), "echo hi".to_string()]
        );
        assert_eq!(
            ShellKind::Cmd.direct_argv("dir"),
            vec!["cmd".to_string(), "/C".to_string(), "dir".to_string()]
        );
    }
}
