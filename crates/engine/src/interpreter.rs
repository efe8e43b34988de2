// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tree interpreter (spec §4.5): one dispatching function that drives
//! a `TreeNode` with `(frame, node, stdin, stdout)`.
//!
//! `dispatch` takes everything by value and returns a `'static` boxed
//! future so a `Pipeline`'s stages can run as independent `tokio::spawn`
//! tasks (spec §4.6) — the same function serves both the ordinary
//! recursive call (cheap, no spawn) and the concurrent pipeline case.

use crate::block::{self, BlockNode};
use crate::error::ExecuteError;
use crate::pipe_end::{self, PipeEnd};
use crate::registry::DecoratorRegistry;
use opal_core::{Command, DynError, ExecNode, ExecutionContext, ExitCode, ProgrammerViolation, RedirectMode, TreeNode, Value};
use opal_secrets::Vault;
use opal_session::SessionRuntime;
use opal_shell::{ShellWorkerPool, SinkError, SinkOperation};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Everything dispatch needs besides the frame/node/stdio being processed.
pub struct Interpreter {
    pub(crate) sessions: Arc<SessionRuntime>,
    pub(crate) pool: Arc<ShellWorkerPool>,
    pub(crate) registry: Arc<DecoratorRegistry>,
    pub(crate) vault: Option<Arc<dyn Vault>>,
}

impl Interpreter {
    pub fn new(
        sessions: Arc<SessionRuntime>,
        pool: Arc<ShellWorkerPool>,
        registry: Arc<DecoratorRegistry>,
        vault: Option<Arc<dyn Vault>>,
    ) -> Arc<Self> {
        Arc::new(Self { sessions, pool, registry, vault })
    }

    /// A callback that runs one step to completion, for `BlockNode`/`Logic`
    /// to call back into full dispatch without importing this module.
    pub(crate) fn step_executor(self: &Arc<Self>) -> block::StepExecutor {
        let interp = Arc::clone(self);
        Arc::new(move |frame: ExecutionContext, step: opal_core::Step| {
            let interp = Arc::clone(&interp);
            Box::pin(async move {
                dispatch(interp, frame, step.tree, PipeEnd::Inherit, PipeEnd::Inherit)
                    .await
                    .map_err(|e| Box::new(e) as DynError)
            })
        })
    }
}

/// Dispatch `node` against `frame`. Checked for cancellation before every
/// node (spec §4.5 "Cancellation: before dispatch on every non-trivial
/// node").
pub fn dispatch(
    interp: Arc<Interpreter>,
    frame: ExecutionContext,
    node: TreeNode,
    stdin: PipeEnd,
    stdout: PipeEnd,
) -> Pin<Box<dyn Future<Output = Result<ExitCode, ExecuteError>> + Send + 'static>> {
    Box::pin(async move {
        if frame.is_cancelled() {
            return Ok(ExitCode::CANCELED);
        }

        match node {
            TreeNode::Command(command) => dispatch_command(interp, frame, command, stdin, stdout).await,
            TreeNode::Pipeline(elements) => dispatch_pipeline(interp, frame, elements, stdin, stdout).await,
            TreeNode::And(left, right) => dispatch_and_or(interp, frame, *left, *right, stdout, true).await,
            TreeNode::Or(left, right) => dispatch_and_or(interp, frame, *left, *right, stdout, false).await,
            TreeNode::Sequence(children) => dispatch_sequence(interp, frame, children, stdin, stdout).await,
            TreeNode::Redirect { source, target, mode } => {
                dispatch_redirect(interp, frame, *source, *target, mode, stdin, stdout).await
            }
            TreeNode::Logic(steps) => {
                let step_exec = interp.step_executor();
                block::run_steps(&steps, &frame, &step_exec)
                    .await
                    .map_err(|source| ExecuteError::Command { decorator: "logic".to_string(), source })
            }
            TreeNode::Try(_) => Err(ExecuteError::NotImplemented),
        }
    })
}

async fn dispatch_command(
    interp: Arc<Interpreter>,
    frame: ExecutionContext,
    command: Command,
    stdin: PipeEnd,
    stdout: PipeEnd,
) -> Result<ExitCode, ExecuteError> {
    let transport = command.transport();
    let session = interp.sessions.session_for(transport.as_str())?;
    let rebound = frame.with_transport_id(transport.as_str(), session.env(), session.workdir());

    let resolved_args = crate::params::resolve_params(interp.vault.as_deref(), &command.args, rebound.transport_id()).await?;

    for value in resolved_args.values() {
        if let Some(reference) = value.first_placeholder() {
            ProgrammerViolation::UnresolvedPlaceholder { reference: reference.to_string() }.raise();
        }
    }

    if command.is_shell() {
        let command_string = resolved_args.get("command").and_then(Value::as_str).unwrap_or_else(|| {
            ProgrammerViolation::MissingRequiredArg { decorator: "shell".to_string(), arg: "command".to_string() }.raise()
        });
        let explicit_shell = resolved_args.get("shell").and_then(Value::as_str);
        let exit = crate::shell_dispatch::run_shell_command(
            &rebound,
            &session,
            &interp.pool,
            explicit_shell,
            command_string,
            &stdin,
            &stdout,
        )
        .await?;
        Ok(exit)
    } else {
        let name = command.normalized_decorator().to_string();
        let exec = interp
            .registry
            .lookup_exec(&name)
            .unwrap_or_else(|| ProgrammerViolation::UnregisteredDecorator { name: name.clone() }.raise());

        let next: Option<Box<dyn ExecNode>> = if command.block.is_empty() {
            None
        } else {
            Some(Box::new(BlockNode::new(command.block.clone(), interp.step_executor())))
        };

        let node = exec
            .wrap(next, &resolved_args)
            .map_err(|source| ExecuteError::Command { decorator: name.clone(), source })?;
        let ctx = rebound.with_args(resolved_args);
        let exit = node.execute(&ctx).await.map_err(|source| ExecuteError::Command { decorator: name, source })?;
        Ok(exit)
    }
}

async fn dispatch_and_or(
    interp: Arc<Interpreter>,
    frame: ExecutionContext,
    left: TreeNode,
    right: TreeNode,
    stdout: PipeEnd,
    stop_on_failure: bool,
) -> Result<ExitCode, ExecuteError> {
    let left_code = dispatch(Arc::clone(&interp), frame.clone(), left, PipeEnd::Inherit, stdout.clone()).await?;
    if left_code.is_canceled() {
        return Ok(left_code);
    }
    let continue_to_right = if stop_on_failure { left_code.is_success() } else { !left_code.is_success() };
    if continue_to_right {
        dispatch(interp, frame, right, PipeEnd::Inherit, stdout).await
    } else {
        Ok(left_code)
    }
}

async fn dispatch_sequence(
    interp: Arc<Interpreter>,
    frame: ExecutionContext,
    children: Vec<TreeNode>,
    stdin: PipeEnd,
    stdout: PipeEnd,
) -> Result<ExitCode, ExecuteError> {
    let last_index = children.len().saturating_sub(1);
    let mut last = ExitCode::SUCCESS;
    for (i, child) in children.into_iter().enumerate() {
        if frame.is_cancelled() {
            return Ok(ExitCode::CANCELED);
        }
        let child_stdin = if i == last_index { stdin.clone() } else { PipeEnd::Inherit };
        last = dispatch(Arc::clone(&interp), frame.clone(), child, child_stdin, stdout.clone()).await?;
    }
    Ok(last)
}

async fn dispatch_pipeline(
    interp: Arc<Interpreter>,
    frame: ExecutionContext,
    elements: Vec<TreeNode>,
    stdin: PipeEnd,
    stdout: PipeEnd,
) -> Result<ExitCode, ExecuteError> {
    for element in &elements {
        if !element.is_valid_pipeline_element() {
            ProgrammerViolation::InvalidPipelineElement { description: format!("{element:?}") }.raise();
        }
    }

    let n = elements.len();
    if n == 0 {
        return Ok(ExitCode::SUCCESS);
    }
    if n == 1 {
        let only = elements.into_iter().next().unwrap_or_else(|| unreachable!("length checked above"));
        return dispatch(interp, frame, only, stdin, stdout).await;
    }

    let mut read_ends = Vec::with_capacity(n - 1);
    let mut write_ends = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        let (read, write) = pipe_end::pipe_pair().map_err(|source| {
            opal_session::SessionError::Spawn { command: "pipeline".to_string(), source }
        })?;
        read_ends.push(read);
        write_ends.push(write);
    }

    let mut handles = Vec::with_capacity(n);
    for (i, element) in elements.into_iter().enumerate() {
        let this_stdin = if i == 0 { stdin.clone() } else { read_ends[i - 1].clone() };
        let this_stdout = if i == n - 1 { stdout.clone() } else { write_ends[i].clone() };
        let interp = Arc::clone(&interp);
        let frame = frame.clone();
        handles.push(tokio::spawn(dispatch(interp, frame, element, this_stdin, this_stdout)));
    }
    drop(read_ends);
    drop(write_ends);

    let mut results = Vec::with_capacity(n);
    for handle in handles {
        results.push(handle.await.unwrap_or_else(|_| Ok(ExitCode::CANCELED)));
    }
    results
        .into_iter()
        .next_back()
        .unwrap_or(Ok(ExitCode::SUCCESS))
}

async fn dispatch_redirect(
    interp: Arc<Interpreter>,
    frame: ExecutionContext,
    source: TreeNode,
    target: Command,
    mode: RedirectMode,
    stdin: PipeEnd,
    stdout: PipeEnd,
) -> Result<ExitCode, ExecuteError> {
    let transport = leftmost_transport(&source).unwrap_or_else(|| frame.transport_id().as_str().to_string());
    let session = interp.sessions.session_for(&transport)?;
    let redirect_frame = frame.with_transport_id(transport, session.env(), session.workdir());

    let resolved = crate::redirect::resolve_sink(&interp.registry, &target);
    crate::redirect::check_capability(&resolved, mode, redirect_frame.transport_id().as_str())?;

    let source = rewrite_source_for_stderr(source);
    let transport_id = redirect_frame.transport_id().as_str().to_string();

    match mode {
        RedirectMode::Input => {
            let reader = resolved.io.open_read(&redirect_frame).await.map_err(|cause| {
                SinkError::new(resolved.identity.clone(), SinkOperation::Open, transport_id.clone(), Some(cause.to_string()))
            })?;
            let bridge = pipe_end::bridge_reader(reader).map_err(|cause| {
                SinkError::new(resolved.identity.clone(), SinkOperation::Open, transport_id.clone(), Some(cause.to_string()))
            })?;
            let exit = dispatch(interp, redirect_frame, source, bridge.pipe_end.clone(), stdout).await?;
            drop(bridge.pipe_end);
            bridge.task.await.unwrap_or(Ok(())).map_err(|cause| {
                SinkError::new(resolved.identity.clone(), SinkOperation::Close, transport_id, Some(cause.to_string()))
            })?;
            Ok(exit)
        }
        RedirectMode::Overwrite | RedirectMode::Append => {
            let append = mode == RedirectMode::Append;
            let writer = resolved.io.open_write(&redirect_frame, append).await.map_err(|cause| {
                SinkError::new(resolved.identity.clone(), SinkOperation::Open, transport_id.clone(), Some(cause.to_string()))
            })?;
            let bridge = pipe_end::bridge_writer(writer).map_err(|cause| {
                SinkError::new(resolved.identity.clone(), SinkOperation::Open, transport_id.clone(), Some(cause.to_string()))
            })?;
            let exit = dispatch(interp, redirect_frame, source, stdin, bridge.pipe_end.clone()).await?;
            drop(bridge.pipe_end);
            bridge.task.await.unwrap_or(Ok(())).map_err(|cause| {
                SinkError::new(resolved.identity.clone(), SinkOperation::Close, transport_id, Some(cause.to_string()))
            })?;
            Ok(exit)
        }
    }
}

/// The transport of the leftmost `Command` reachable from `node` (spec
/// §4.7 "the redirect runs in the source's transport ... not the
/// wrapper's"). `None` for node shapes with no leftmost command (`Logic`,
/// `Try`) — callers fall back to the current frame's transport.
fn leftmost_transport(node: &TreeNode) -> Option<String> {
    match node {
        TreeNode::Command(command) => Some(command.transport_id.clone()),
        TreeNode::Pipeline(elements) | TreeNode::Sequence(elements) => elements.first().and_then(leftmost_transport),
        TreeNode::And(left, _) | TreeNode::Or(left, _) => leftmost_transport(left),
        TreeNode::Redirect { source, .. } => leftmost_transport(source),
        TreeNode::Logic(_) | TreeNode::Try(_) => None,
    }
}

/// Apply the stderr-routing rewrite (spec §4.7) to `source` if it is a
/// `shell` command with `stderr=true`. A no-op for every other shape.
fn rewrite_source_for_stderr(source: TreeNode) -> TreeNode {
    if let TreeNode::Command(command) = &source {
        if crate::redirect::wants_stderr_routing(command) {
            if let Some(original) = command.args.get("command").and_then(Value::as_str) {
                let mut rewritten = command.clone();
                rewritten.args.insert("command".to_string(), Value::String(crate::redirect::apply_stderr_routing(original)));
                return TreeNode::Command(rewritten);
            }
        }
    }
    source
}

#[cfg(test)]
mod tests {
    use crate::{Config, Executor};
    use opal_core::test_support::step;
    use opal_core::{Command, TreeNode, Value};
    use std::collections::BTreeMap;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    #[should_panic(expected = "unresolved placeholder")]
    async fn unresolved_placeholder_surviving_to_dispatch_panics() {
        let mut args = BTreeMap::new();
        args.insert("command".to_string(), Value::Placeholder("steps.build.output".to_string()));
        let command = Command { decorator: "shell".to_string(), transport_id: "local".to_string(), args, block: Vec::new() };

        let executor = Executor::new(&Config::new());
        let _ = executor.execute(CancellationToken::new(), vec![step(1, TreeNode::Command(command))], &Config::new()).await;
    }
}
