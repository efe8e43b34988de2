// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors the engine surfaces. Per spec §7, almost none of these ever
//! reach a caller of [`crate::Executor::execute`] as an `Err` — they are
//! logged and folded into an [`opal_core::ExitCode`] instead.
//! `ProgrammerViolation` is raised by panicking (`opal_core::error`), not
//! by returning this type, so it has no variant here. This type exists
//! only so crate-boundary errors (`SessionError`, `ShellWorkerError`,
//! `SinkError`, `SecretResolutionError`) have one place to compose via
//! `#[from]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("session error: {0}")]
    Session(#[from] opal_session::SessionError),

    #[error(transparent)]
    ShellWorker(#[from] opal_shell::ShellWorkerError),

    #[error(transparent)]
    Sink(#[from] opal_shell::SinkError),

    #[error(transparent)]
    Secret(#[from] opal_secrets::SecretResolutionError),

    #[error("shell selection error: {0}")]
    ShellSelection(#[from] opal_shell::ShellSelectionError),

    #[error("decorator {decorator:?} returned an error: {source}")]
    Command {
        decorator: String,
        #[source]
        source: opal_core::DynError,
    },

    #[error("try/catch/finally is not implemented")]
    NotImplemented,
}
