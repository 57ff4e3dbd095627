// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Known-answer vectors for hashing.

/// A plaintext to hash.
pub const PLAIN_TEXT: &[u8] = include_bytes!("misc/plain.txt");

/// The SHA-256 digest of [`PLAIN_TEXT`].
pub const PLAIN_SHA256: &[u8; 32] = include_bytes!("misc/plain_sha256.bin");
