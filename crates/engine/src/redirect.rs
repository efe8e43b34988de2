// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sink resolution and the redirect capability gate (spec §4.7). The
//! interpreter (`crate::interpreter`) owns the actual open/execute/close
//! sequencing — it needs to recurse back into dispatch for the redirect's
//! `source` subtree, which this module has no business doing. This module
//! only resolves *which* sink a `Redirect` targets and whether it is legal
//! to open it in the requested mode.

use crate::registry::DecoratorRegistry;
use opal_core::{Command, ProgrammerViolation, RedirectMode};
use opal_shell::{FileSink, SinkError, SinkOperation};
use std::sync::Arc;

/// A sink resolved from a `Redirect`'s `target` command: the identity
/// string used in error messages (spec §4.7) paired with the `Io` object
/// itself.
pub struct ResolvedSink {
    pub identity: String,
    pub io: Arc<dyn opal_core::Io>,
}

/// Resolve `target` to a sink (spec §4.7 "Sink resolution").
///
/// The `shell` + bare `command` arg rewrite takes priority: a redirect
/// target written as `@shell(command="out.txt")` is reinterpreted as a
/// `file` sink bound to that path, not as a shell invocation.
pub fn resolve_sink(registry: &DecoratorRegistry, target: &Command) -> ResolvedSink {
    let name = target.normalized_decorator();
    if name == "shell" {
        if let Some(path) = target.args.get("command").and_then(opal_core::Value::as_str) {
            let sink = FileSink::with_path(path);
            return ResolvedSink { identity: sink.identity(), io: Arc::new(sink) };
        }
    }

    let io = registry
        .lookup_io(name)
        .unwrap_or_else(|| ProgrammerViolation::UnregisteredDecorator { name: name.to_string() }.raise());
    let io = io.with_params(&target.args).map(Arc::from).unwrap_or(io);

    let identity = match target.args.get("command").and_then(opal_core::Value::as_str) {
        Some(command) => format!("{name}({command})"),
        None => name.to_string(),
    };
    ResolvedSink { identity, io }
}

/// Capability gate (spec §4.7): `Input` requires `Read`, `Overwrite`
/// requires `Write`, `Append` requires `Append`. Checked before the sink
/// is ever opened.
pub fn check_capability(
    sink: &ResolvedSink,
    mode: RedirectMode,
    transport_id: &str,
) -> Result<(), SinkError> {
    let caps = sink.io.io_caps();
    let satisfied = match mode {
        RedirectMode::Input => caps.read,
        RedirectMode::Overwrite => caps.write,
        RedirectMode::Append => caps.append,
    };
    if satisfied {
        Ok(())
    } else {
        Err(SinkError::new(
            sink.identity.clone(),
            SinkOperation::Validate,
            transport_id.to_string(),
            Some(format!("sink does not support {}", mode_name(mode))),
        ))
    }
}

fn mode_name(mode: RedirectMode) -> &'static str {
    match mode {
        RedirectMode::Input => "input",
        RedirectMode::Overwrite => "overwrite",
        RedirectMode::Append => "append",
    }
}

/// Stderr routing rewrite (spec §4.7): when a redirect's source is a
/// `shell` command with `stderr=true`, its command string is rewritten so
/// the descriptor currently capturing stdout receives stderr instead. A
/// plain `2>file` fragment the user wrote themselves is left untouched —
/// this rewrite only ever swaps fds 1 and 2 around the sink pipe.
pub fn apply_stderr_routing(command: &str) -> String {
    format!("({command}) 3>&1 1>&2 2>&3 3>&-")
}

/// `true` iff `command`'s `stderr` arg is the literal boolean `true` (spec
/// §4.7's condition for applying [`apply_stderr_routing`]).
pub fn wants_stderr_routing(command: &Command) -> bool {
    command.is_shell() && command.args.get("stderr").and_then(opal_core::Value::as_bool) == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::Value;
    use std::collections::BTreeMap;

    fn shell_command(args: BTreeMap<String, Value>) -> Command {
        Command { decorator: "shell".to_string(), transport_id: "local".to_string(), args, block: Vec::new() }
    }

    #[test]
    fn shell_with_command_arg_rewrites_to_file_sink() {
        let registry = DecoratorRegistry::new();
        let mut args = BTreeMap::new();
        args.insert("command".to_string(), Value::String("out.txt".to_string()));
        let target = shell_command(args);

        let resolved = resolve_sink(&registry, &target);
        assert_eq!(resolved.identity, "@file(out.txt)");
        assert!(resolved.io.io_caps().write);
    }

    #[test]
    fn registered_sink_identity_includes_command_arg() {
        let registry = DecoratorRegistry::new();
        registry.register_io("syslog", Arc::new(FileSink::with_path("/dev/null")));
        let mut args = BTreeMap::new();
        args.insert("command".to_string(), Value::String("alert".to_string()));
        let target = Command { decorator: "syslog".to_string(), transport_id: "local".to_string(), args, block: Vec::new() };

        let resolved = resolve_sink(&registry, &target);
        assert_eq!(resolved.identity, "syslog(alert)");
    }

    #[test]
    fn registered_sink_without_command_arg_uses_bare_name() {
        let registry = DecoratorRegistry::new();
        registry.register_io("syslog", Arc::new(FileSink::with_path("/dev/null")));
        let target = Command { decorator: "syslog".to_string(), transport_id: "local".to_string(), args: BTreeMap::new(), block: Vec::new() };

        let resolved = resolve_sink(&registry, &target);
        assert_eq!(resolved.identity, "syslog");
    }

    #[test]
    fn capability_gate_rejects_unsupported_mode() {
        struct ReadOnlySink;
        #[async_trait::async_trait]
        impl opal_core::Io for ReadOnlySink {
            fn io_caps(&self) -> opal_core::IoCaps {
                opal_core::IoCaps { read: true, write: false, append: false }
            }
            async fn open_read(&self, _ctx: &opal_core::ExecutionContext) -> Result<opal_core::AsyncReader, opal_core::DynError> {
                unreachable!()
            }
            async fn open_write(
                &self,
                _ctx: &opal_core::ExecutionContext,
                _append: bool,
            ) -> Result<opal_core::AsyncWriter, opal_core::DynError> {
                unreachable!()
            }
        }

        let sink = ResolvedSink { identity: "@ro".to_string(), io: Arc::new(ReadOnlySink) };
        assert!(check_capability(&sink, RedirectMode::Input, "local").is_ok());
        let err = check_capability(&sink, RedirectMode::Overwrite, "local").unwrap_err();
        assert_eq!(err.operation, SinkOperation::Validate);
    }

    #[test]
    fn stderr_routing_wraps_command_with_fd_swap() {
        assert_eq!(apply_stderr_routing("echo hi"), "(echo hi) 3>&1 1>&2 2>&3 3>&-");
    }

    #[test]
    fn stderr_routing_only_applies_to_shell_commands_with_stderr_true() {
        let mut args = BTreeMap::new();
        args.insert("stderr".to_string(), Value::Bool(true));
        let command = shell_command(args.clone());
        assert!(wants_stderr_routing(&command));

        args.insert("stderr".to_string(), Value::Bool(false));
        assert!(!wants_stderr_routing(&shell_command(args)));

        let non_shell = Command { decorator: "retry".to_string(), transport_id: "local".to_string(), args: BTreeMap::new(), block: Vec::new() };
        assert!(!wants_stderr_routing(&non_shell));
    }
}
