// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit authorization token for unsafe secret unwraps.
//!
//! The source represents this as a mutable process-wide global. Spec §9
//! calls for an explicit value instead: `Capability` is constructed once
//! alongside the executor and threaded everywhere an unsafe unwrap can
//! happen, rather than consulted through global state.

/// Whether unsafe secret unwraps should panic instead of returning the
/// value. Debug mode exists to catch accidental plaintext handling in
/// development; it is never silently enabled — see
/// [`Capability::from_env`] for the one sanctioned env-driven path, which
/// mirrors how `OPAL_SECRET_DEBUG` is documented in spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMode {
    Off,
    Strict,
}

/// Authorizes `opal_secrets::Handle`'s unsafe unwrap operations.
///
/// Holding a `Capability` is the only way to call `UnsafeUnwrap`, `Bytes`,
/// or `ForEnv` on a secret handle. Constructed once at executor startup and
/// passed by reference into every call site that needs it — never stored in
/// a global.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    debug: DebugMode,
}

impl Capability {
    pub fn new(debug: DebugMode) -> Self {
        Self { debug }
    }

    /// Read `OPAL_SECRET_DEBUG` (spec §6): `"1"` forces [`DebugMode::Strict`].
    pub fn from_env() -> Self {
        let debug = match std::env::var("OPAL_SECRET_DEBUG") {
            Ok(v) if v == "1" => DebugMode::Strict,
            _ => DebugMode::Off,
        };
        Self::new(debug)
    }

    pub fn debug_mode(&self) -> DebugMode {
        self.debug
    }

    pub fn is_strict(&self) -> bool {
        self.debug == DebugMode::Strict
    }
}

impl Default for Capability {
    fn default() -> Self {
        Self::new(DebugMode::Off)
    }
}
