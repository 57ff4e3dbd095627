// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable cryptograpy traits.
//!
//! Manifest and recovery-image verification need a hash engine and a
//! signature engine. This module provides object-safe traits that abstract
//! over those operations; the algorithms themselves live in hardware or in a
//! software library.
//!
//! It is recommended to not import the traits in this module directly, since
//! a lot of them have the same name. Instead, use imports like
//! `use pfr::crypto::hash;` and partially-qualified names like
//! `hash::Engine`.
//!
//! Software implementations of these traits are provided under the
//! [`ring` module], based on the [`ring`] crate. Their presence is controlled
//! by the `ring` feature flag; some operations require `std` as well.
//!
//! None of the engines here are assumed to be safe for concurrent use. Wrap a
//! shared engine in [`crate::sync::Exclusive`] to serialize its users.
//!
//! [`ring` module]: ring/index.html

pub mod hash;
pub mod key;
pub mod sig;

#[cfg(feature = "ring")]
pub mod ring;

/// Compares two byte strings without short-circuiting on the first
/// differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
