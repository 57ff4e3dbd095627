// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Test data: signing keys and known-answer hash vectors.

pub mod keys;
pub mod misc_crypto;
