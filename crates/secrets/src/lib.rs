// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! opal-secrets: the secret vault bridge (spec §4.3, §4.8) — display-ID
//! minting, the capability-gated `Handle`, and the `Vault` trait the
//! resolution pipeline resolves display-IDs against.

pub mod display_id;
pub mod error;
pub mod handle;
pub mod vault;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use display_id::{DisplayIdFactory, DisplayIdMode, MIN_KEY_LEN};
pub use error::SecretResolutionError;
pub use handle::Handle;
pub use vault::{resolve_args, Vault};
