// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session and session-runtime errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn {command}: {source}")]
    Spawn { command: String, #[source] source: std::io::Error },

    #[error("failed to write {path}: {source}")]
    Put { path: String, #[source] source: std::io::Error },

    #[error("failed to read {path}: {source}")]
    Get { path: String, #[source] source: std::io::Error },

    #[error("session {id} already closed")]
    Closed { id: String },

    #[error("failed to create session for transport {transport_id}: {source}")]
    FactoryFailed {
        transport_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
