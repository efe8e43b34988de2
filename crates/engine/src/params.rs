// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Param resolution pipeline (spec §4.3): copy a command's args and, if a
//! vault is configured, substitute every display-ID occurrence in every
//! string arg with its resolved value. Errors abort the command with exit
//! code 1 and the `"Error resolving secrets"` message — `opal_secrets`
//! already formats that message; this module just decides whether to call
//! it at all.

use opal_core::{TransportId, Value};
use opal_secrets::{SecretResolutionError, Vault};
use std::collections::BTreeMap;

/// Resolve `args` for `transport_id`. With no vault configured, args pass
/// through unchanged — a plan with no secrets is legal to run without one.
pub async fn resolve_params(
    vault: Option<&dyn Vault>,
    args: &BTreeMap<String, Value>,
    transport_id: &TransportId,
) -> Result<BTreeMap<String, Value>, SecretResolutionError> {
    match vault {
        Some(vault) => opal_secrets::resolve_args(vault, args, transport_id).await,
        None => Ok(args.clone()),
    }
}
