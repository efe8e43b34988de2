// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control-pipe wire format (spec §6): the only two line shapes ever
//! written to FD 3, and the parsing that tolerates a rogue user command
//! writing garbage to the same descriptor.

/// Bootstrap marker prefix: `__OPAL_WORKER_READY_<seq>__`.
pub const READY_PREFIX: &str = "__OPAL_WORKER_READY_";
/// Per-command status marker prefix: `__OPAL_STATUS_<marker>:<code>`.
pub const STATUS_PREFIX: &str = "__OPAL_STATUS_";

/// The bootstrap script a freshly spawned worker runs before its first
/// command: exports the instance ID and prints the ready marker to FD 3.
pub fn bootstrap_script(instance_id: &str, seq: u64) -> String {
    format!(
        "export OPAL_INTERNAL_WORKER_INSTANCE={}; printf '{}{}__\\n' >&3\n",
        shell_quote(instance_id),
        READY_PREFIX,
        seq
    )
}

/// `true` iff `line` is exactly the ready marker for `seq`.
pub fn is_ready_line(line: &str, seq: u64) -> bool {
    line == format!("{READY_PREFIX}{seq}__")
}

/// Wrap `command` so its exit status is reported on FD 3 under `marker`,
/// after an optional `cd` and exported env deltas (spec §4.4 step 4).
///
/// `cd_target` is `None` when the desired workdir already equals the
/// session's cwd (the delta is empty, so no `cd` line is emitted).
pub fn build_script(
    cd_target: Option<&str>,
    env_delta: &[(String, String)],
    command: &str,
    marker: u64,
) -> String {
    let mut script = String::new();
    script.push_str("(\n");
    if let Some(dir) = cd_target {
        script.push_str(&format!("  cd -- {} || exit 1\n", shell_quote(dir)));
    }
    for (key, value) in env_delta {
        script.push_str(&format!("  export {}={}\n", key, shell_quote(value)));
    }
    script.push_str("  ");
    script.push_str(command);
    script.push('\n');
    script.push_str(")\n");
    script.push_str("__opal_status=$?\n");
    script.push_str(&format!("printf '{STATUS_PREFIX}{marker}:%d\\n' \"$__opal_status\" >&3\n"));
    script
}

/// Parse a status line for `marker`, returning the exit code if it matches.
/// Lines for a different marker, or that don't match the shape at all, are
/// ignored (defense against rogue writes to FD 3).
pub fn parse_status_line(line: &str, marker: u64) -> Option<i32> {
    let prefix = format!("{STATUS_PREFIX}{marker}:");
    let rest = line.strip_prefix(&prefix)?;
    rest.trim().parse::<i32>().ok()
}

/// Single-quote `value` for inclusion in the generated script, escaping
/// any embedded `'` as `'"'"'`.
pub fn shell_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\"'\"'");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// `true` iff `name` is a valid POSIX shell identifier
/// (`[A-Za-z_][A-Za-z0-9_]*`), the gate applied to every env delta key
/// before it is interpolated into the script (spec §4.4 step 4).
pub fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
