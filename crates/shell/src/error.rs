// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised by shell selection, the worker pool, and the sink layer
//! (spec §4.4, §4.7, §7).

use thiserror::Error;

/// `OPAL_SHELL`/explicit `shell` arg resolved to something other than
/// `bash`, `pwsh`, or `cmd` (spec §4.4).
#[derive(Debug, Error)]
#[error("invalid OPAL_SHELL \"{value}\": expected one of bash, pwsh, cmd")]
pub struct ShellSelectionError {
    pub value: String,
}

/// A shell worker pool failure (spec §4.4, §7). `command_started` governs
/// whether the caller may retry the command via `Session::run` directly:
/// `false` means nothing observable happened yet, `true` means side
/// effects may already exist and a retry would double-run the command.
#[derive(Debug, Error)]
#[error("shell worker error on transport {transport_id}: {source}")]
pub struct ShellWorkerError {
    pub transport_id: String,
    pub command_started: bool,
    #[source]
    pub source: ShellWorkerCause,
}

#[derive(Debug, Error)]
pub enum ShellWorkerCause {
    #[error("canceled before a status line arrived")]
    Canceled,
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to map control pipe onto child fd 3: {0}")]
    ControlPipe(String),
    #[error("worker did not report ready before bootstrap timed out")]
    BootstrapTimeout,
    #[error("control pipe closed before a status line arrived")]
    ControlPipeClosed,
    #[error("stream read failed: {0}")]
    StreamRead(#[source] std::io::Error),
    #[error("failed to write script to worker stdin: {0}")]
    StdinWrite(#[source] std::io::Error),
    #[error("environment variable name {0:?} is not a valid shell identifier")]
    InvalidEnvName(String),
    #[error("session error: {0}")]
    Session(#[from] opal_session::SessionError),
}

impl ShellWorkerError {
    pub fn started(transport_id: impl Into<String>, source: ShellWorkerCause) -> Self {
        Self { transport_id: transport_id.into(), command_started: true, source }
    }

    pub fn not_started(transport_id: impl Into<String>, source: ShellWorkerCause) -> Self {
        Self { transport_id: transport_id.into(), command_started: false, source }
    }

    /// `true` iff this failure originated from cancellation rather than a
    /// genuine I/O or protocol error (spec §5 "cancellation never leaks as
    /// an error ... surfaced as a canonical Canceled exit code").
    pub fn is_cancellation(&self) -> bool {
        matches!(self.source, ShellWorkerCause::Canceled)
    }
}

/// A redirect/sink-layer failure (spec §4.7, §7). Formats exactly as
/// `"sink <id> <operation> failed on transport <tid>[: <cause>]"`.
#[derive(Debug, Error)]
pub struct SinkError {
    pub sink_id: String,
    pub operation: SinkOperation,
    pub transport_id: String,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOperation {
    Validate,
    Open,
    Write,
    Close,
}

impl std::fmt::Display for SinkOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SinkOperation::Validate => "validate",
            SinkOperation::Open => "open",
            SinkOperation::Write => "write",
            SinkOperation::Close => "close",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sink {} {} failed on transport {}", self.sink_id, self.operation, self.transport_id)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SinkError {}

impl SinkError {
    pub fn new(
        sink_id: impl Into<String>,
        operation: SinkOperation,
        transport_id: impl Into<String>,
        cause: Option<String>,
    ) -> Self {
        Self { sink_id: sink_id.into(), operation, transport_id: transport_id.into(), cause }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_selection_error_message_matches_spec() {
        let err = ShellSelectionError { value: "zsh".to_string() };
        assert_eq!(err.to_string(), "invalid OPAL_SHELL \"zsh\": expected one of bash, pwsh, cmd");
    }

    #[test]
    fn sink_error_display_contains_id_operation_transport() {
        let err = SinkError::new("@file(out.txt)", SinkOperation::Close, "local", Some("disk full".into()));
        let rendered = err.to_string();
        assert!(rendered.contains("@file(out.txt)"));
        assert!(rendered.contains("close"));
        assert!(rendered.contains("local"));
        assert!(rendered.contains("disk full"));
    }

    #[test]
    fn sink_error_without_cause_omits_colon() {
        let err = SinkError::new("@file(out.txt)", SinkOperation::Validate, "local", None);
        assert_eq!(err.to_string(), "sink @file(out.txt) validate failed on transport local");
    }
}
