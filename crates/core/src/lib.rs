// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! opal-core: shared data model for the plan executor.
//!
//! This crate defines the immutable types the rest of the executor is built
//! around — [`Value`], [`TreeNode`], [`Plan`]/[`Step`], the per-frame
//! [`ExecutionContext`], the [`Capability`] token, and the `Exec`/`IO`
//! decorator traits. It has no knowledge of how a tree is actually run; that
//! lives in `opal-engine`.

pub mod capability;
pub mod error;
pub mod exit;
pub mod frame;
pub mod ids;
pub mod macros;
pub mod plan;
pub mod telemetry;
pub mod traits;
pub mod tree;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use capability::{Capability, DebugMode};
pub use error::ProgrammerViolation;
pub use exit::ExitCode;
pub use frame::ExecutionContext;
pub use ids::{StepId, TransportId, LOCAL_TRANSPORT};
pub use plan::{Plan, Step};
pub use telemetry::{DebugEvent, DebugLevel, StepTelemetry, Telemetry, TelemetryLevel};
pub use traits::{AsyncReader, AsyncWriter, DynError, Exec, ExecNode, Io, IoCaps};
pub use tree::{Command, RedirectMode, TreeNode};
pub use value::{Value, DISPLAY_ID_REGEX_SOURCE};
