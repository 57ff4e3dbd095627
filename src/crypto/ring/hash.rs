// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of [`crypto::hash`] based on `ring`.

use core::mem;

use ring::digest;

use crate::crypto::hash;
use crate::Result;

#[cfg(doc)]
use crate::crypto;

/// A `ring`-based [`hash::Engine`].
pub struct Engine {
    inner: Inner,
}

enum Inner {
    Idle,
    Hash(digest::Context),
}

impl Engine {
    /// Creates a new `Engine`.
    pub fn new() -> Self {
        Self { inner: Inner::Idle }
    }

    /// Returns whether a session is currently open.
    pub fn is_busy(&self) -> bool {
        !matches!(self.inner, Inner::Idle)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl hash::Engine for Engine {
    fn supports(&mut self, _: hash::Algo) -> bool {
        true
    }

    fn start_raw(&mut self, algo: hash::Algo) -> Result<(), hash::Error> {
        check!(!self.is_busy(), hash::Error::Busy);
        self.inner = Inner::Hash(digest::Context::new(match algo {
            hash::Algo::Sha256 => &digest::SHA256,
            hash::Algo::Sha384 => &digest::SHA384,
            hash::Algo::Sha512 => &digest::SHA512,
        }));
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), hash::Error> {
        match &mut self.inner {
            Inner::Idle => return Err(fail!(hash::Error::Idle)),
            Inner::Hash(c) => c.update(data),
        }
        Ok(())
    }

    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), hash::Error> {
        match mem::replace(&mut self.inner, Inner::Idle) {
            Inner::Idle => return Err(fail!(hash::Error::Idle)),
            Inner::Hash(c) => {
                check!(
                    out.len() == c.algorithm().output_len,
                    hash::Error::WrongSize
                );
                let digest = c.finish();
                out.copy_from_slice(digest.as_ref());
            }
        }
        Ok(())
    }

    fn cancel_raw(&mut self) {
        self.inner = Inner::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::Algo::Sha256;
    use crate::crypto::hash::Engine as _;
    use crate::crypto::hash::EngineExt as _;
    use testutil::data::misc_crypto;

    #[test]
    #[cfg_attr(miri, ignore)]
    fn hash256() {
        let mut e = Engine::new();
        let mut digest = [0; Sha256.bytes()];

        let mut ctx = e.new_hash(Sha256).unwrap();
        ctx.write(misc_crypto::PLAIN_TEXT).unwrap();
        ctx.finish(&mut digest).unwrap();
        assert_eq!(&digest, misc_crypto::PLAIN_SHA256);

        let mut ctx = e.new_hash(Sha256).unwrap();
        ctx.write(&misc_crypto::PLAIN_TEXT[..16]).unwrap();
        ctx.write(&misc_crypto::PLAIN_TEXT[16..]).unwrap();
        ctx.expect(misc_crypto::PLAIN_SHA256).unwrap();
    }

    #[test]
    fn session_discipline() {
        let mut e = Engine::new();
        assert_eq!(
            e.write_raw(b"x").unwrap_err().into_inner(),
            hash::Error::Idle
        );

        e.start_raw(Sha256).unwrap();
        assert_eq!(
            e.start_raw(Sha256).unwrap_err().into_inner(),
            hash::Error::Busy
        );
        e.cancel_raw();
        assert!(!e.is_busy());

        let mut digest = [0; 32];
        assert_eq!(
            e.finish_raw(&mut digest).unwrap_err().into_inner(),
            hash::Error::Idle
        );
    }

    #[test]
    fn dropped_hasher_cancels() {
        let mut e = Engine::new();
        {
            let mut h = e.new_hash(Sha256).unwrap();
            h.write(b"abandoned").unwrap();
        }
        assert!(!e.is_busy());

        let mut wrong = [0; 16];
        let h = e.new_hash(Sha256).unwrap();
        assert_eq!(
            h.finish(&mut wrong).unwrap_err().into_inner(),
            hash::Error::WrongSize
        );
        assert!(!e.is_busy());
    }

    #[test]
    fn expect_mismatch() {
        let mut e = Engine::new();
        let mut h = e.new_hash(Sha256).unwrap();
        h.write(misc_crypto::PLAIN_TEXT).unwrap();
        assert_eq!(
            h.expect(&[0; 32]).unwrap_err().into_inner(),
            hash::Error::Unspecified
        );
    }
}
