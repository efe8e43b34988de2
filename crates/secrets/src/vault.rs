// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret Vault Bridge (spec §4.3, §4.8): scans resolved args for
//! display-IDs and substitutes the real value, enforcing the transport
//! boundary each display-ID was minted for.

use crate::error::SecretResolutionError;
use crate::handle::Handle;
use async_trait::async_trait;
use opal_core::{TransportId, Value, DISPLAY_ID_REGEX_SOURCE};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn display_id_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(DISPLAY_ID_REGEX_SOURCE).unwrap_or_else(|_| {
            unreachable!("DISPLAY_ID_REGEX_SOURCE is a fixed, known-valid pattern")
        })
    })
}

/// Backs `Handle` resolution. A real vault looks display-IDs up against
/// whatever minted them (an in-memory map for `Plan` mode, a secrets
/// backend for `Run` mode); this trait is the seam between that and the
/// executor.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Resolve `display_id` for use on `transport_id`. Implementations
    /// must reject the call if `display_id` was minted for a different
    /// transport (spec §4.8's transport boundary enforcement).
    async fn resolve_with_transport(
        &self,
        display_id: &str,
        transport_id: &TransportId,
    ) -> Result<Handle, SecretResolutionError>;
}

/// Walk every string in `args`, substituting each display-ID occurrence
/// with its resolved value (spec §4.3's param resolution pipeline).
/// Non-string args pass through untouched. Aborts on the first
/// unresolvable display-ID.
pub async fn resolve_args(
    vault: &dyn Vault,
    args: &BTreeMap<String, Value>,
    transport_id: &TransportId,
) -> Result<BTreeMap<String, Value>, SecretResolutionError> {
    let mut resolved = args.clone();
    for value in resolved.values_mut() {
        resolve_value(vault, value, transport_id).await?;
    }
    Ok(resolved)
}

async fn resolve_value(
    vault: &dyn Vault,
    value: &mut Value,
    transport_id: &TransportId,
) -> Result<(), SecretResolutionError> {
    match value {
        Value::String(s) => {
            *s = substitute_display_ids(vault, s, transport_id).await?;
        }
        Value::Array(items) => {
            for item in items {
                Box::pin(resolve_value(vault, item, transport_id)).await?;
            }
        }
        Value::Map(map) => {
            for item in map.values_mut() {
                Box::pin(resolve_value(vault, item, transport_id)).await?;
            }
        }
        Value::Int(_) | Value::Bool(_) | Value::Float(_) | Value::Duration(_) | Value::Placeholder(_) => {}
    }
    Ok(())
}

async fn substitute_display_ids(
    vault: &dyn Vault,
    input: &str,
    transport_id: &TransportId,
) -> Result<String, SecretResolutionError> {
    let matches: Vec<(usize, usize)> =
        display_id_regex().find_iter(input).map(|m| (m.start(), m.end())).collect();
    if matches.is_empty() {
        return Ok(input.to_string());
    }

    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;
    for (start, end) in matches {
        output.push_str(&input[cursor..start]);
        let display_id = &input[start..end];
        let handle = vault.resolve_with_transport(display_id, transport_id).await?;
        output.push_str(&handle.raw_for_substitution());
        cursor = end;
    }
    output.push_str(&input[cursor..]);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;
    use std::sync::Mutex;

    struct FakeVault {
        store: Mutex<Map<String, (Vec<u8>, TransportId)>>,
    }

    impl FakeVault {
        fn new() -> Self {
            Self { store: Mutex::new(Map::new()) }
        }

        fn insert(&self, display_id: &str, value: &str, transport_id: TransportId) {
            self.store.lock().unwrap().insert(display_id.to_string(), (value.as_bytes().to_vec(), transport_id));
        }
    }

    #[async_trait]
    impl Vault for FakeVault {
        async fn resolve_with_transport(
            &self,
            display_id: &str,
            transport_id: &TransportId,
        ) -> Result<Handle, SecretResolutionError> {
            let store = self.store.lock().unwrap();
            let Some((value, minted_for)) = store.get(display_id) else {
                return Err(SecretResolutionError::NotFound { display_id: display_id.to_string() });
            };
            if minted_for != transport_id {
                return Err(SecretResolutionError::TransportBoundary {
                    display_id: display_id.to_string(),
                    minted_for: minted_for.as_str().to_string(),
                    requested: transport_id.as_str().to_string(),
                });
            }
            Ok(Handle::new(value.clone(), display_id.to_string()))
        }
    }

    fn local() -> TransportId {
        TransportId::local()
    }

    #[tokio::test]
    async fn substitutes_single_display_id() {
        let vault = FakeVault::new();
        vault.insert("opal:ab12ab12ab12ab12ab12ab", "sk-live-value", local());
        let mut args = Map::new();
        args.insert("command".to_string(), Value::String("echo opal:ab12ab12ab12ab12ab12ab".to_string()));

        let resolved = resolve_args(&vault, &args, &local()).await.unwrap();
        assert_eq!(resolved["command"].as_str(), Some("echo sk-live-value"));
    }

    #[tokio::test]
    async fn non_string_values_pass_through() {
        let vault = FakeVault::new();
        let mut args = Map::new();
        args.insert("count".to_string(), Value::Int(3));
        args.insert("flag".to_string(), Value::Bool(true));

        let resolved = resolve_args(&vault, &args, &local()).await.unwrap();
        assert_eq!(resolved, args);
    }

    #[tokio::test]
    async fn unresolvable_display_id_aborts() {
        let vault = FakeVault::new();
        let mut args = Map::new();
        args.insert("command".to_string(), Value::String("echo opal:doesnotexistYYYYYYYYYY".to_string()));

        let err = resolve_args(&vault, &args, &local()).await.unwrap_err();
        assert!(matches!(err, SecretResolutionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn transport_boundary_is_enforced() {
        let vault = FakeVault::new();
        vault.insert("opal:ab12ab12ab12ab12ab12ab", "sk-live-value", TransportId::new("staging-1"));
        let mut args = Map::new();
        args.insert("command".to_string(), Value::String("echo opal:ab12ab12ab12ab12ab12ab".to_string()));

        let err = resolve_args(&vault, &args, &local()).await.unwrap_err();
        assert!(matches!(err, SecretResolutionError::TransportBoundary { .. }));
    }

    #[tokio::test]
    async fn nested_array_and_map_values_are_walked() {
        let vault = FakeVault::new();
        vault.insert("opal:ab12ab12ab12ab12ab12ab", "nested-value", local());
        let mut inner = Map::new();
        inner.insert("key".to_string(), Value::String("opal:ab12ab12ab12ab12ab12ab".to_string()));
        let mut args = Map::new();
        args.insert(
            "list".to_string(),
            Value::Array(vec![Value::String("opal:ab12ab12ab12ab12ab12ab".to_string())]),
        );
        args.insert("map".to_string(), Value::Map(inner));

        let resolved = resolve_args(&vault, &args, &local()).await.unwrap();
        let Value::Array(items) = &resolved["list"] else { panic!("expected array") };
        assert_eq!(items[0].as_str(), Some("nested-value"));
        let Value::Map(map) = &resolved["map"] else { panic!("expected map") };
        assert_eq!(map["key"].as_str(), Some("nested-value"));
    }
}
