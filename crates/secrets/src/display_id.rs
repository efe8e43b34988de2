// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DisplayID factory (spec §4.8): mints the opaque, content-addressed
//! handle a secret shows everywhere instead of its value.
//!
//! `PRF(key, plan_hash || step_path || decorator || key_name || kind ||
//! BLAKE2b-256(value))` using BLAKE2s-128 keyed, base58-encoded.
//!
//! Spec §3 invariant 4 and §8's testable property both pin the rendered
//! shape down to the regex `opal:[A-Za-z0-9_-]{22}` — a single run of 22
//! base58 characters with no embedded separator. §4.8's prose and the
//! glossary describe the same handle as `opal:<kind>:<22 chars>`; taking
//! that literally (a colon-delimited `kind` segment) would make every
//! minted ID permanently unmatchable by the one regex the vault bridge
//! (`opal_secrets::vault`) actually scans with, since a colon is not in
//! `[A-Za-z0-9_-]`. We resolve the conflict in favor of the two explicit,
//! testable invariants: `kind` stays a PRF input for domain separation
//! (an `env` secret and a `file` secret with the same value mint different
//! IDs) but is never rendered into the string. The full 16-byte keyed MAC
//! is base58-encoded (not just its first 8 bytes) to land on the spec's
//! 22-character width.

use blake2::digest::consts::{U16, U32};
use blake2::digest::{Digest, Mac};
use blake2::{Blake2b, Blake2sMac};

/// Minimum key length the PRF accepts.
pub const MIN_KEY_LEN: usize = 32;

/// Selects how the factory's key is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayIdMode {
    /// Deterministic: the key is derived from the plan itself, so the same
    /// plan always mints the same display-IDs across runs.
    Plan,
    /// Non-deterministic: the key is fresh per run, so display-IDs cannot
    /// be correlated across runs even for the same plan.
    Run,
}

/// Mints [`DisplayId`]s for secrets encountered while building or running
/// a plan.
pub struct DisplayIdFactory {
    mode: DisplayIdMode,
    key: Vec<u8>,
}

impl DisplayIdFactory {
    /// `key` must be at least [`MIN_KEY_LEN`] bytes; shorter keys are a
    /// programmer error, not a runtime condition, so this panics rather
    /// than returning `Result` — same convention as
    /// `opal_core::ProgrammerViolation::raise`.
    pub fn new(mode: DisplayIdMode, key: Vec<u8>) -> Self {
        assert!(key.len() >= MIN_KEY_LEN, "display-id factory key shorter than {MIN_KEY_LEN} bytes");
        Self { mode, key }
    }

    pub fn mode(&self) -> DisplayIdMode {
        self.mode
    }

    /// Mint a display-ID for `value`, bound to `plan_hash`/`step_path`/
    /// `decorator`/`key_name`/`kind`. `kind` only affects the PRF output
    /// (domain separation); it is not rendered into the returned string —
    /// see the module doc comment for why.
    pub fn mint(
        &self,
        plan_hash: &[u8],
        step_path: &str,
        decorator: &str,
        key_name: &str,
        kind: &str,
        value: &[u8],
    ) -> String {
        let value_hash = Blake2b::<U32>::digest(value);

        let mut mac = Blake2sMac::<U16>::new_from_slice(&self.key)
            .unwrap_or_else(|_| unreachable!("key length checked in DisplayIdFactory::new"));
        mac.update(plan_hash);
        mac.update(step_path.as_bytes());
        mac.update(decorator.as_bytes());
        mac.update(key_name.as_bytes());
        mac.update(kind.as_bytes());
        mac.update(&value_hash);
        let prf = mac.finalize().into_bytes();

        let mut encoded = bs58::encode(&prf[..]).into_string();
        // Base58 of a 16-byte MAC lands on 22 chars for almost all inputs
        // but isn't exactly fixed-width (leading zero bytes shorten it).
        // Left-pad with '1' (base58's zero digit) to hold the regex's
        // exact-22 invariant for every output, not just the common case.
        while encoded.len() < DISPLAY_ID_SUFFIX_LEN {
            encoded.insert(0, '1');
        }
        format!("opal:{encoded}")
    }
}

/// Width of the base58 suffix after `opal:`, matching the `{22}` quantifier
/// in [`opal_core::DISPLAY_ID_REGEX_SOURCE`].
const DISPLAY_ID_SUFFIX_LEN: usize = 22;

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> Vec<u8> {
        vec![seed; MIN_KEY_LEN]
    }

    #[test]
    #[should_panic(expected = "shorter than")]
    fn short_key_panics() {
        DisplayIdFactory::new(DisplayIdMode::Plan, vec![0u8; 4]);
    }

    #[test]
    fn same_inputs_mint_identical_ids() {
        let factory = DisplayIdFactory::new(DisplayIdMode::Plan, key(7));
        let a = factory.mint(b"planhash", "step:1", "shell", "API_KEY", "env", b"secret-value");
        let b = factory.mint(b"planhash", "step:1", "shell", "API_KEY", "env", b"secret-value");
        assert_eq!(a, b);
    }

    #[test]
    fn different_values_mint_different_ids() {
        let factory = DisplayIdFactory::new(DisplayIdMode::Plan, key(7));
        let a = factory.mint(b"planhash", "step:1", "shell", "API_KEY", "env", b"secret-value-a");
        let b = factory.mint(b"planhash", "step:1", "shell", "API_KEY", "env", b"secret-value-b");
        assert_ne!(a, b);
    }

    #[test]
    fn output_shape_matches_display_id_regex() {
        let factory = DisplayIdFactory::new(DisplayIdMode::Run, key(3));
        let id = factory.mint(b"planhash", "step:1", "shell", "API_KEY", "env", b"secret-value");
        let regex = regex_lite_for_test();
        assert!(regex.is_match(&id), "{id} does not match opal:[A-Za-z0-9_-]{{22}}");
    }

    #[test]
    fn kind_affects_the_minted_id_without_appearing_in_it() {
        let factory = DisplayIdFactory::new(DisplayIdMode::Plan, key(7));
        let env_id = factory.mint(b"planhash", "step:1", "shell", "API_KEY", "env", b"secret-value");
        let file_id = factory.mint(b"planhash", "step:1", "shell", "API_KEY", "file", b"secret-value");
        assert_ne!(env_id, file_id);
        assert!(!env_id.contains("env"));
        assert!(!file_id.contains("file"));
    }

    fn regex_lite_for_test() -> regex::Regex {
        regex::Regex::new(opal_core::DISPLAY_ID_REGEX_SOURCE).expect("fixed pattern")
    }

    #[test]
    fn run_mode_keys_differ_across_factories() {
        let a = DisplayIdFactory::new(DisplayIdMode::Run, key(1));
        let b = DisplayIdFactory::new(DisplayIdMode::Run, key(2));
        let id_a = a.mint(b"planhash", "step:1", "shell", "API_KEY", "env", b"secret-value");
        let id_b = b.mint(b"planhash", "step:1", "shell", "API_KEY", "env", b"secret-value");
        assert_ne!(id_a, id_b);
    }
}
