// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit code sentinel used everywhere in the executor.
//!
//! Only three shapes are valid per spec §6: success (`0`), a process exit
//! (`1..255`), or the cancellation sentinel (`-1`). Nothing in this crate
//! constructs any other value.

use std::fmt;

/// Canonical sentinel for a cancelled command or step.
pub const CANCELED: i32 = -1;

/// An executor exit code: success, a failure code, or [`CANCELED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const CANCELED: ExitCode = ExitCode(CANCELED);

    /// Build from a raw process exit code, clamping to the `0..=255` range
    /// the OS can actually report. Values outside that range (e.g. a `-1`
    /// from a killed process with no reportable code) collapse to `255`.
    pub fn from_process(code: i32) -> Self {
        if (0..=255).contains(&code) {
            ExitCode(code)
        } else {
            ExitCode(255)
        }
    }

    /// Build a failure code known to be in range already (e.g. from a
    /// constant like `1` for "error resolving secrets").
    pub fn failure(code: u8) -> Self {
        ExitCode(i32::from(code))
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    pub fn is_canceled(self) -> bool {
        self.0 == CANCELED
    }

    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_zero() {
        assert!(ExitCode::SUCCESS.is_success());
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
    }

    #[test]
    fn canceled_is_negative_one() {
        assert!(ExitCode::CANCELED.is_canceled());
        assert_eq!(ExitCode::CANCELED.as_i32(), -1);
    }

    #[test]
    fn out_of_range_process_code_clamps_to_255() {
        assert_eq!(ExitCode::from_process(300).as_i32(), 255);
        assert_eq!(ExitCode::from_process(-7).as_i32(), 255);
    }

    #[test]
    fn in_range_process_code_preserved() {
        assert_eq!(ExitCode::from_process(42).as_i32(), 42);
    }
}
