// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Provides the [`Write`] trait, the encoding counterpart of [`io::Read`].
//!
//! [`io::Read`]: crate::io::Read

use core::mem;

use static_assertions::assert_obj_safe;

use crate::io;
use crate::io::endian::BeInt;
use crate::io::endian::LeInt;
use crate::Result;

/// A sink for encoded records, such as a `&mut [u8]`.
///
/// Writes are all-or-nothing: a `Write` either accepts every byte it is
/// given or fails.
pub trait Write {
    /// Writes all of `buf`.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error>;

    /// Writes a little-endian integer.
    #[inline]
    fn write_le<I: LeInt>(&mut self, val: I) -> Result<(), io::Error>
    where
        Self: Sized,
    {
        val.write_to(self)
    }

    /// Writes a big-endian integer, as used for image region bounds.
    #[inline]
    fn write_be<I: BeInt>(&mut self, val: I) -> Result<(), io::Error>
    where
        Self: Sized,
    {
        val.write_be_to(self)
    }

    /// Writes `n` copies of `byte`; used for padding.
    fn write_fill(&mut self, byte: u8, mut n: usize) -> Result<(), io::Error> {
        let chunk = [byte; 16];
        while n > 0 {
            let len = n.min(chunk.len());
            self.write_bytes(&chunk[..len])?;
            n -= len;
        }
        Ok(())
    }
}
assert_obj_safe!(Write);

impl<W: Write + ?Sized> Write for &'_ mut W {
    #[inline]
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        W::write_bytes(*self, buf)
    }
}

impl Write for &'_ mut [u8] {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        if self.len() < buf.len() {
            return Err(fail!(io::Error::BufferExhausted));
        }
        let (dest, rest) = mem::take(self).split_at_mut(buf.len());
        dest.copy_from_slice(buf);
        *self = rest;
        Ok(())
    }
}

/// Adapts a [`std::io::Write`] into a [`Write`], mapping every failure to
/// [`io::Error::Internal`].
#[cfg(feature = "std")]
pub struct StdWrite<W>(pub W);

#[cfg(feature = "std")]
impl<W: std::io::Write> Write for StdWrite<W> {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        self.0
            .write_all(buf)
            .map_err(|_| fail!(io::Error::Internal))
    }
}
