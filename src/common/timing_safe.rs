//! Constant-time comparison of byte strings

use subtle::ConstantTimeEq;

/// Compares two byte strings without short-circuiting on the first
/// difference.
///
/// Inputs of different lengths are unequal. Only the lengths are compared in
/// variable time.
#[must_use]
pub fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}
