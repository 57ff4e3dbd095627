// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Signature traits.
//!
//! Every signature in a PFM or recovery image is an RSA PKCS#1 v1.5
//! signature using SHA-256, taken over a *digest*: the caller first hashes
//! the covered bytes with a [`crate::crypto::hash::Engine`] and then passes
//! the digest to [`Verify::verify()`] as the message.

use crate::crypto::key::PublicKey;
use crate::Result;

/// An error returned by a signature operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The signature does not match the message under the given key.
    BadSignature,

    /// The key is not usable by this engine.
    UnsupportedKey,

    /// Indicates an unspecified, internal error.
    Unspecified,
}

status_codes!(Error: Crypto {
    BadSignature => 0x10,
    UnsupportedKey => 0x11,
    Unspecified => 0x12,
});

/// A signature-verification engine.
pub trait Verify {
    /// Verifies that `signature` is a signature of `message` under `key`.
    ///
    /// If the underlying cryptographic operation succeeds, returns `Ok(())`.
    /// Failures, including signature check failures, are included in the
    /// `Err` variant.
    fn verify(
        &mut self,
        key: &PublicKey,
        signature: &[u8],
        message: &[u8],
    ) -> Result<(), Error>;
}

// Ensure Verify is object-safe.
impl dyn Verify {}

/// An signing engine, already primed with a keypair.
///
/// There is no way to extract the keypair back out of a `Sign` value.
pub trait Sign {
    /// Returns the number of bytes a signature produced by this signer needs.
    fn sig_bytes(&self) -> usize;

    /// Uses this signer to create a signature value for `message`.
    fn sign(&mut self, message: &[u8], signature: &mut [u8])
        -> Result<(), Error>;
}
