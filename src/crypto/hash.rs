// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Cryptographic hashing.
//!
//! In general, users of this module should be pulling in [`EngineExt`],
//! adds functions to [`Engine`] for more ergonomic usage, but which would
//! otherwise make it object-unsafe.
//!
//! An [`Engine`] holds at most one hashing session. A session is opened with
//! [`Engine::start_raw()`] and must be closed by exactly one of
//! [`Engine::finish_raw()`] or [`Engine::cancel_raw()`] before another one
//! can be opened.

#[cfg(feature = "arbitrary-derive")]
use libfuzzer_sys::arbitrary::{self, Arbitrary};

use crate::Result;

wire_enum! {
    /// A cryptographic hashing algorithm, as encoded in a manifest.
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    #[cfg_attr(feature = "arbitrary-derive", derive(Arbitrary))]
    pub enum Algo: u8 {
        /// 256-bit SHA-2.
        Sha256 = 0,
        /// 384-bit SHA-2.
        Sha384 = 1,
        /// 512-bit SHA-2.
        Sha512 = 2,
    }
}

impl Algo {
    /// The number of bits in a digest of this strength.
    #[inline]
    pub const fn bits(self) -> usize {
        match self {
            Self::Sha256 => 256,
            Self::Sha384 => 384,
            Self::Sha512 => 512,
        }
    }

    /// The number of bytes in a digest of this strength.
    #[inline]
    pub const fn bytes(self) -> usize {
        self.bits() / 8
    }
}

/// The largest digest any [`Algo`] produces.
pub const MAX_DIGEST_LEN: usize = Algo::Sha512.bytes();

/// An error returned by a hashing function.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates that the wrong size of digest was provided to
    /// [`Engine::finish_raw()`].
    WrongSize,

    /// Indicates that the engine was idle, but a write or finish
    /// operation was requested.
    Idle,

    /// Indicates that a session was started while another one was open.
    Busy,

    /// Indicates that the requested algorithm is not supported.
    Unsupported,

    /// Indicates an unspecified, internal error.
    Unspecified,
}

status_codes!(Error: Crypto {
    WrongSize => 0x00,
    Idle => 0x01,
    Busy => 0x02,
    Unsupported => 0x03,
    Unspecified => 0x04,
});

/// A hashing engine, which maintains the state for one digest.
///
/// Callers should not use the `raw` API directly; [`Hasher`] is a type-safe
/// wrapper that manages a session with an `Engine`.
///
/// Implementers only need to provide the "raw" form of the API; the remaining
/// functions are convenience helpers.
pub trait Engine {
    /// Returns whether this engine supports the given algorithm.
    fn supports(&mut self, algo: Algo) -> bool;

    /// Begins a new hashing operation.
    ///
    /// Returns [`Error::Busy`] if a session is already open.
    fn start_raw(&mut self, algo: Algo) -> Result<(), Error>;

    /// Adds `data` to the hashing state.
    ///
    /// Returns [`Error::Idle`] if no session is open.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Completes the hashing operation, closing the session.
    ///
    /// `out` must be exactly as long as the digest. Returns
    /// [`Error::Idle`] if no session is open.
    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), Error>;

    /// Abandons the current session, if any.
    fn cancel_raw(&mut self);
}

/// Helpers for creating a [`Hasher`] from an [`Engine`].
#[extend::ext(name = EngineExt)]
pub impl<E: Engine + ?Sized> E {
    /// Begins a new hashing operation.
    ///
    /// Implementers do not need to implement this function themselves.
    #[inline]
    fn new_hash(&mut self, algo: Algo) -> Result<Hasher<'_, E>, Error> {
        self.start_raw(algo)?;
        Ok(Hasher {
            engine: self,
            algo,
            done: false,
        })
    }

    /// Convenience helper for hashing a contiguous memory region.
    ///
    /// Implementers do not need to implement this function themselves.
    #[inline]
    fn contiguous_hash(
        &mut self,
        algo: Algo,
        buf: &[u8],
        out: &mut [u8],
    ) -> Result<(), Error> {
        let mut h = self.new_hash(algo)?;
        h.write(buf)?;
        h.finish(out)
    }
}

// Ensure Engine is object-safe.
impl dyn Engine {}

/// A helper for managing a hashing operation with an [`Engine`].
///
/// Users should prefer to use this instead of calling [`Engine`]'s raw API
/// directly. Dropping an unfinished `Hasher` cancels its session.
pub struct Hasher<'a, E: Engine + ?Sized> {
    engine: &'a mut E,
    algo: Algo,
    done: bool,
}

impl<E: Engine + ?Sized> Hasher<'_, E> {
    /// The algorithm this hasher was started with.
    pub fn algo(&self) -> Algo {
        self.algo
    }

    /// Adds `data` to the hashing state.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.write_raw(data)
    }

    /// Completes the hashing operation, writing the result to `out`.
    pub fn finish(mut self, out: &mut [u8]) -> Result<(), Error> {
        self.done = true;
        if out.len() != self.algo.bytes() {
            self.engine.cancel_raw();
            return Err(fail!(Error::WrongSize));
        }
        self.engine.finish_raw(out)
    }

    /// Completes the hashing operation, comparing the result to `expected`
    /// in constant time.
    ///
    /// A mismatch is reported as [`Error::Unspecified`].
    pub fn expect(self, expected: &[u8]) -> Result<(), Error> {
        let mut digest = [0; MAX_DIGEST_LEN];
        let digest = &mut digest[..self.algo.bytes()];
        self.finish(digest)?;
        check!(
            super::constant_time_eq(digest, expected),
            Error::Unspecified
        );
        Ok(())
    }
}

impl<E: Engine + ?Sized> Drop for Hasher<'_, E> {
    fn drop(&mut self) {
        if !self.done {
            self.engine.cancel_raw();
        }
    }
}
