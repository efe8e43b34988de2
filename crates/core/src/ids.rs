// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable identifiers threaded through the plan and executor.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Sentinel transport ID representing the host process itself.
pub const LOCAL_TRANSPORT: &str = "local";

/// Numeric ID of a [`crate::plan::Step`] within its plan.
///
/// Assigned by the (external) planner; the executor only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u64);

impl StepId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StepId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifies a [`Session`](crate) target: `"local"` or a named transport.
///
/// Empty strings are never stored — callers normalize to [`LOCAL_TRANSPORT`]
/// before constructing one (see `Session Runtime`, spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportId(String);

impl TransportId {
    /// Normalize `id`: empty becomes [`LOCAL_TRANSPORT`].
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.is_empty() {
            Self(LOCAL_TRANSPORT.to_string())
        } else {
            Self(id)
        }
    }

    pub fn local() -> Self {
        Self(LOCAL_TRANSPORT.to_string())
    }

    pub fn is_local(&self) -> bool {
        self.0 == LOCAL_TRANSPORT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TransportId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TransportId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for TransportId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TransportId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
