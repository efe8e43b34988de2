// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Handle` (spec §4.8): the only way the rest of the executor ever
//! touches a secret value. Every formatting path — `Display`, `Debug`,
//! serde — emits the display-ID, never the value.

use blake2::digest::consts::U32;
use blake2::digest::Mac;
use blake2::Blake2bMac;
use opal_core::{Capability, DebugMode};
use serde::{Serialize, Serializer};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// A secret value plus the display-ID minted for it. Cloning clones the
/// bytes (zeroized on drop) so a `Handle` can be threaded through resolved
/// args without aliasing.
pub struct Handle {
    value: Vec<u8>,
    display_id: String,
    tainted: bool,
}

impl Handle {
    pub fn new(value: Vec<u8>, display_id: impl Into<String>) -> Self {
        Self { value, display_id: display_id.into(), tainted: true }
    }

    pub fn display_id(&self) -> &str {
        &self.display_id
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// Safe unwrapper: first `n` bytes replaced with `*`, rest visible.
    /// Never requires a capability — it leaks at most a prefix, by design
    /// of the caller asking for `n`.
    pub fn mask(&self, n: usize) -> String {
        let n = n.min(self.value.len());
        let masked: String = std::iter::repeat('*').take(n).collect();
        let visible = String::from_utf8_lossy(&self.value[n..]);
        format!("{masked}{visible}")
    }

    /// Safe unwrapper: last 4 bytes, or fewer if the secret is shorter.
    pub fn unwrap_last4(&self) -> String {
        let start = self.value.len().saturating_sub(4);
        String::from_utf8_lossy(&self.value[start..]).into_owned()
    }

    /// Safe unwrapper: all but the last `visible` bytes masked.
    pub fn unwrap_with_mask(&self, visible: usize) -> String {
        let visible = visible.min(self.value.len());
        let mask_len = self.value.len() - visible;
        let masked: String = std::iter::repeat('*').take(mask_len).collect();
        let tail = String::from_utf8_lossy(&self.value[mask_len..]);
        format!("{masked}{tail}")
    }

    /// Raw bytes, lossy-decoded. Only for the vault bridge's own
    /// substitution pipeline (spec §4.3) — never exposed outside this
    /// crate; external callers go through [`Handle::unsafe_unwrap`] and
    /// its capability gate.
    pub(crate) fn raw_for_substitution(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Unsafe unwrapper: the raw value as a lossy string. Holding `cap` is
    /// the authorization itself — no separate flag to check — but panics
    /// in `DebugMode::Strict` regardless, per spec §4.8 ("debug mode makes
    /// every unsafe unwrap panic").
    pub fn unsafe_unwrap(&self, cap: &Capability) -> String {
        self.check_debug_mode(cap);
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Unsafe unwrapper: the raw bytes.
    pub fn bytes(&self, cap: &Capability) -> &[u8] {
        self.check_debug_mode(cap);
        &self.value
    }

    /// Unsafe unwrapper: `(key, value)` suitable for direct injection into
    /// a child process's environment.
    pub fn for_env(&self, key: &str, cap: &Capability) -> (String, String) {
        self.check_debug_mode(cap);
        (key.to_string(), String::from_utf8_lossy(&self.value).into_owned())
    }

    #[allow(clippy::panic)]
    fn check_debug_mode(&self, cap: &Capability) {
        if cap.debug_mode() == DebugMode::Strict {
            panic!("unsafe secret unwrap attempted in strict debug mode");
        }
    }

    /// Constant-time equality against another handle's raw value.
    pub fn equal(&self, other: &Handle) -> bool {
        self.value.ct_eq(&other.value).into()
    }

    /// BLAKE2b-256 keyed fingerprint. `key` must be at least 32 bytes.
    pub fn fingerprint(&self, key: &[u8]) -> [u8; 32] {
        assert!(key.len() >= 32, "fingerprint key shorter than 32 bytes");
        let mut mac = Blake2bMac::<U32>::new_from_slice(key)
            .unwrap_or_else(|_| unreachable!("key length checked above"));
        mac.update(&self.value);
        let out = mac.finalize().into_bytes();
        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&out);
        fingerprint
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        Self { value: self.value.clone(), display_id: self.display_id.clone(), tainted: self.tainted }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_id)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("display_id", &self.display_id).finish()
    }
}

impl Serialize for Handle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.display_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_replaces_prefix_only() {
        let handle = Handle::new(b"sk-1234567890".to_vec(), "opal:env:abcdefgh12345678");
        assert_eq!(handle.mask(4), "****567890");
    }

    #[test]
    fn unwrap_last4_handles_short_secrets() {
        let handle = Handle::new(b"ab".to_vec(), "opal:env:abcdefgh12345678");
        assert_eq!(handle.unwrap_last4(), "ab");
    }

    #[test]
    fn display_never_leaks_value() {
        let handle = Handle::new(b"super-secret".to_vec(), "opal:env:abcdefgh12345678");
        assert_eq!(format!("{handle}"), "opal:env:abcdefgh12345678");
        assert_eq!(format!("{handle:?}"), "Handle { display_id: \"opal:env:abcdefgh12345678\" }");
    }

    #[test]
    fn unsafe_unwrap_succeeds_with_capability() {
        let handle = Handle::new(b"value".to_vec(), "opal:env:abcdefgh12345678");
        let cap = Capability::default();
        assert_eq!(handle.unsafe_unwrap(&cap), "value");
    }

    #[test]
    #[should_panic(expected = "strict debug mode")]
    fn unsafe_unwrap_panics_in_strict_debug_mode() {
        let handle = Handle::new(b"value".to_vec(), "opal:env:abcdefgh12345678");
        let cap = Capability::new(DebugMode::Strict);
        let _ = handle.unsafe_unwrap(&cap);
    }

    #[test]
    fn equal_is_true_for_same_value() {
        let a = Handle::new(b"same".to_vec(), "opal:env:aaaaaaaa11111111");
        let b = Handle::new(b"same".to_vec(), "opal:env:bbbbbbbb22222222");
        assert!(a.equal(&b));
    }

    #[test]
    fn fingerprint_is_stable_for_same_value_and_key() {
        let handle = Handle::new(b"value".to_vec(), "opal:env:abcdefgh12345678");
        let key = [9u8; 32];
        assert_eq!(handle.fingerprint(&key), handle.fingerprint(&key));
    }
}
