// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Config` (spec §6): the options `Executor::execute` recognizes. A plain
//! builder-style struct with fluent setters (`opal_core::setters!`) rather
//! than a derive-macro config crate — the executor has no file-based
//! configuration of its own.

use crate::registry::DecoratorRegistry;
use opal_core::{Capability, DebugLevel, TelemetryLevel};
use opal_secrets::Vault;
use opal_session::SessionFactory;
use std::sync::Arc;

/// Options recognized by [`crate::Executor::execute`]/`execute_plan`
/// (spec §6).
#[derive(Clone, Default)]
pub struct Config {
    debug: DebugLevel,
    telemetry: TelemetryLevel,
    session_factory: Option<SessionFactory>,
    capability: Option<Capability>,
    registry: Option<Arc<DecoratorRegistry>>,
    vault: Option<Arc<dyn Vault>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    opal_core::setters! {
        set {
            debug: DebugLevel,
            telemetry: TelemetryLevel,
        }
        option {
            session_factory: SessionFactory,
            capability: Capability,
            registry: Arc<DecoratorRegistry>,
        }
    }

    /// Not generated by `setters!`: `Arc<dyn Vault>` doesn't unsize-coerce
    /// through a generic `impl Into<_>` bound, so this one is written by
    /// hand rather than declared in the macro invocation above.
    pub fn vault(mut self, vault: Arc<dyn Vault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn debug(&self) -> DebugLevel {
        self.debug
    }

    pub fn telemetry(&self) -> TelemetryLevel {
        self.telemetry
    }

    pub fn session_factory(&self) -> Option<SessionFactory> {
        self.session_factory.clone()
    }

    pub fn capability(&self) -> Capability {
        self.capability.unwrap_or_default()
    }

    pub fn registry(&self) -> Arc<DecoratorRegistry> {
        self.registry.clone().unwrap_or_default()
    }

    pub fn vault_handle(&self) -> Option<Arc<dyn Vault>> {
        self.vault.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_off() {
        let config = Config::new();
        assert_eq!(config.debug(), DebugLevel::Off);
        assert_eq!(config.telemetry(), TelemetryLevel::Off);
    }

    #[test]
    fn fluent_setters_compose() {
        let config = Config::new().debug(DebugLevel::Detailed).telemetry(TelemetryLevel::Timing);
        assert_eq!(config.debug(), DebugLevel::Detailed);
        assert_eq!(config.telemetry(), TelemetryLevel::Timing);
    }
}
