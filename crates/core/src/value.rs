// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tagged value type carried by command arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Regex source matching an unresolved secret display-ID: `opal:xxxx...`.
///
/// Any occurrence of this pattern in a resolved arg reaching the shell path
/// is an invariant violation (spec §3, invariant 4). `opal-secrets` owns the
/// compiled `Regex`; this crate only owns the pattern string so it can be
/// asserted on in tests without a `regex` dependency.
pub const DISPLAY_ID_REGEX_SOURCE: &str = r"opal:[A-Za-z0-9_-]{22}";

/// A command argument value.
///
/// `Placeholder` must never reach the executor — its presence on any arg
/// flowing into the tree interpreter is a [`crate::ProgrammerViolation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    #[serde(with = "duration_ms")]
    Duration(Duration),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// An unresolved reference the planner has not yet substituted.
    Placeholder(String),
}

impl Value {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Value::Placeholder(_))
    }

    /// Borrow the inner string if this is a `Value::String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Recursively search for the first unresolved placeholder contained in
    /// this value, returning its reference. Used by the interpreter (spec
    /// §3, invariant 4) to detect a `Placeholder` that survived param
    /// resolution before it reaches command dispatch.
    pub fn first_placeholder(&self) -> Option<&str> {
        match self {
            Value::Placeholder(reference) => Some(reference.as_str()),
            Value::Array(items) => items.iter().find_map(Value::first_placeholder),
            Value::Map(map) => map.values().find_map(Value::first_placeholder),
            Value::String(_) | Value::Int(_) | Value::Bool(_) | Value::Float(_) | Value::Duration(_) => None,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
