//! Closed-form difficulty estimates, used only for progress display.

use std::time::Duration;

use crate::kernel::base58::MAX_ENCODED_LEN;
use crate::pattern::{MatchMode, Pattern};

/// Case-insensitive Base58 collapses to 34 classes: nine digits plus the
/// folded letters (I, O and l are absent from the alphabet).
const FOLDED_ALPHABET_SIZE: f64 = 34.0;
const ALPHABET_SIZE: f64 = 58.0;

/// Expected attempts until the first match.
pub fn expected_attempts(pattern: &Pattern) -> f64 {
    let a = if pattern.ignore_case {
        FOLDED_ALPHABET_SIZE
    } else {
        ALPHABET_SIZE
    };
    let e = a.powi(pattern.effective_len() as i32);
    match pattern.mode {
        MatchMode::Anywhere if pattern.len() < MAX_ENCODED_LEN => {
            // anchors over a nominal 44-character address
            e / (MAX_ENCODED_LEN - pattern.len() + 1) as f64
        }
        _ => e,
    }
}

/// Median of the geometric distribution with success probability 1/E.
pub fn p50_attempts(expected: f64) -> f64 {
    expected * std::f64::consts::LN_2
}

/// Time until the P50 attempt count at the measured rate.
pub fn eta_to_p50(expected: f64, attempts: u64, rate: f64) -> Option<Duration> {
    if rate <= 0.0 {
        return None;
    }
    let remaining = (p50_attempts(expected) - attempts as f64).max(0.0);
    Some(Duration::from_secs_f64(remaining / rate))
}
