// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory `Vault` double, gated behind `test-support`, for
//! `opal-engine`'s tests to resolve scripted display-IDs without a real
//! secrets backend.

use crate::error::SecretResolutionError;
use crate::handle::Handle;
use crate::vault::Vault;
use async_trait::async_trait;
use opal_core::TransportId;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub struct FakeVault {
    entries: Mutex<BTreeMap<String, (Vec<u8>, TransportId)>>,
}

impl FakeVault {
    pub fn new() -> Self {
        Self { entries: Mutex::new(BTreeMap::new()) }
    }

    /// Register `display_id` to resolve to `value` when requested on
    /// `transport_id`.
    pub fn register(&self, display_id: impl Into<String>, value: impl Into<Vec<u8>>, transport_id: TransportId) {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).insert(
            display_id.into(),
            (value.into(), transport_id),
        );
    }
}

impl Default for FakeVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Vault for FakeVault {
    async fn resolve_with_transport(
        &self,
        display_id: &str,
        transport_id: &TransportId,
    ) -> Result<Handle, SecretResolutionError> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some((value, minted_for)) = entries.get(display_id) else {
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
