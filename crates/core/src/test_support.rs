// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders, gated behind `test-support` for other crates' tests.

use crate::ids::StepId;
use crate::plan::Step;
use crate::tree::{Command, TreeNode};
use crate::value::Value;
use std::collections::BTreeMap;

/// Build a `@shell(command="...")` command node on the given transport.
pub fn shell_command(transport_id: &str, command: &str) -> Command {
    let mut args = BTreeMap::new();
    args.insert("command".to_string(), Value::String(command.to_string()));
    Command {
        decorator: "shell".to_string(),
        transport_id: transport_id.to_string(),
        args,
        block: Vec::new(),
    }
}

/// Build a single-step plan wrapping `tree`.
pub fn step(id: u64, tree: TreeNode) -> Step {
    Step::new(StepId::new(id), tree)
}
