// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `pfr` is a Platform Firmware Resilience engine for a root-of-trust
//! controller sitting between a host and its firmware flash.
//!
//! The crate authenticates Platform Firmware Manifests (PFMs) stored in
//! flash, derives which flash and bus regions an untrusted host may write,
//! and produces the hardware bus-filter configuration that enforces those
//! decisions in silicon. It also sequences bounds-checked firmware updates
//! into flash.
//!
//! The pipeline is:
//! 1. [`manifest::pfm`] parses one of the two supported PFM layouts.
//! 2. [`manifest::reader::PfmFlash`] caches a manifest out of flash and
//!    gates every query on a successful verification.
//! 3. [`update::FlashUpdater`] streams a verified update into a region.
//! 4. [`filter`] turns a verified manifest into SPI and I2C filter tables.
//!
//! [`session::RotSession`] ties the pieces together for one
//! verify-then-update cycle.
//!
//! Hardware and cryptography are abstracted behind the traits in
//! [`hardware`], [`crypto`] and [`filter::driver`]; software implementations
//! based on `ring` are provided behind the `ring` feature.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![deny(warnings)]
#![deny(unused)]
#![deny(unsafe_code)]

#[cfg(feature = "log")]
extern crate log as __raw_log;

#[macro_use]
mod debug;

#[macro_use]
pub mod status;

#[macro_use]
pub mod wire;

pub mod crypto;
pub mod filter;
pub mod hardware;
pub mod io;
pub mod manifest;
pub mod recovery;
pub mod session;
pub mod sync;
pub mod update;

#[cfg(feature = "serde")]
mod serde;

pub use debug::Error;

/// A result type carrying a wrapped [`Error`].
pub type Result<T, E> = core::result::Result<T, Error<E>>;
