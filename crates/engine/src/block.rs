// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared step-loop used by decorator blocks, `Logic`, and the
//! top-level plan loop (spec §4.5): fail-fast across steps, recording the
//! last exit code. `BlockNode` packages this loop as an `ExecNode` so it
//! can be handed to `Exec::wrap` as the `next` argument (spec §4.3) — a
//! decorator's block is just another `ExecNode` from its point of view.
//!
//! Neither this module nor the interpreter module can own the other: the
//! step loop needs to recurse into full node dispatch, and dispatch needs
//! to wrap blocks. The recursion is broken by a callback (`StepExecutor`)
//! the interpreter supplies rather than a direct function call.

use async_trait::async_trait;
use opal_core::{DynError, ExecNode, ExecutionContext, ExitCode, Step};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Runs one step against a frame, returning its exit code. Supplied by
/// `crate::interpreter` so this module never needs to import it.
pub type StepExecutor =
    Arc<dyn Fn(ExecutionContext, Step) -> Pin<Box<dyn Future<Output = Result<ExitCode, DynError>> + Send>> + Send + Sync>;

/// A decorator block, or a `Logic` node's block, as a callable `ExecNode`.
pub struct BlockNode {
    steps: Vec<Step>,
    run_step: StepExecutor,
}

impl BlockNode {
    pub fn new(steps: Vec<Step>, run_step: StepExecutor) -> Self {
        Self { steps, run_step }
    }
}

#[async_trait]
impl ExecNode for BlockNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ExitCode, DynError> {
        run_steps(&self.steps, ctx, &self.run_step).await
    }
}

/// Run `steps` against `ctx` in order, stopping at the first non-zero exit
/// (spec §4.5 "Logic: ... a loop of child steps, fail-fast on non-zero").
/// An already-cancelled frame short-circuits before the first step with
/// the canonical `ExitCode::CANCELED`, same as every other non-trivial
/// dispatch (spec §4.5 "Cancellation").
pub async fn run_steps(
    steps: &[Step],
    ctx: &ExecutionContext,
    run_step: &StepExecutor,
) -> Result<ExitCode, DynError> {
    let mut last = ExitCode::SUCCESS;
    for step in steps {
        if ctx.is_cancelled() {
            return Ok(ExitCode::CANCELED);
        }
        last = (run_step)(ctx.clone(), step.clone()).await?;
        if !last.is_success() {
            break;
        }
    }
    Ok(last)
}
