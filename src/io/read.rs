// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Provides the [`Read`] trait, analogous to [`std::io::Read`].

use core::mem;

use static_assertions::assert_obj_safe;

use crate::io;
use crate::io::endian::BeInt;
use crate::io::endian::LeInt;
use crate::Result;

/// Represents a place that bytes can be read from, such as a `&[u8]`.
///
/// # Relation with [`std::io::Read`]
/// [`std::io::Read`] is distinct from `Read`, since `Read` must know,
/// a-priori, the total length of the underlying buffer.
pub trait Read {
    /// Reads exactly `n` bytes from `self`.
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error>;

    /// Returns the number of bytes still available to read.
    fn remaining_data(&self) -> usize;

    /// Reads a little-endian integer.
    ///
    /// # Note
    /// Do not implement this function yourself. Callers are not required to
    /// call it in order to actually perform a read, so whether or not it is
    /// called is an implementation detail.
    #[inline]
    fn read_le<I: LeInt>(&mut self) -> Result<I, io::Error>
    where
        Self: Sized,
    {
        I::read_from(self)
    }

    /// Reads a big-endian integer.
    ///
    /// The same caveats as for [`Read::read_le()`] apply.
    #[inline]
    fn read_be<I: BeInt>(&mut self) -> Result<I, io::Error>
    where
        Self: Sized,
    {
        I::read_be_from(self)
    }

    /// Discards exactly `n` bytes.
    fn skip(&mut self, mut n: usize) -> Result<(), io::Error> {
        let mut scratch = [0; 16];
        while n > 0 {
            let len = n.min(scratch.len());
            self.read_bytes(&mut scratch[..len])?;
            n -= len;
        }
        Ok(())
    }
}
assert_obj_safe!(Read);

/// A [`Read`] that can lend out the bytes it is reading from, without
/// copying them.
///
/// The lifetime `'a` is the lifetime of the underlying buffer.
pub trait ReadZero<'a>: Read {
    /// Reads exactly `n` bytes, returning a reference into the underlying
    /// buffer.
    fn read_slice(&mut self, n: usize) -> Result<&'a [u8], io::Error>;
}

impl<R: Read + ?Sized> Read for &'_ mut R {
    #[inline]
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error> {
        R::read_bytes(*self, out)
    }

    #[inline]
    fn remaining_data(&self) -> usize {
        R::remaining_data(*self)
    }
}

impl<'a, R: ReadZero<'a> + ?Sized> ReadZero<'a> for &'_ mut R {
    #[inline]
    fn read_slice(&mut self, n: usize) -> Result<&'a [u8], io::Error> {
        R::read_slice(*self, n)
    }
}

impl Read for &[u8] {
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error> {
        let n = out.len();
        if self.len() < n {
            return Err(fail!(io::Error::BufferExhausted));
        }

        out.copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(())
    }

    fn remaining_data(&self) -> usize {
        self.len()
    }
}

impl<'a> ReadZero<'a> for &'a [u8] {
    fn read_slice(&mut self, n: usize) -> Result<&'a [u8], io::Error> {
        if self.len() < n {
            return Err(fail!(io::Error::BufferExhausted));
        }

        let (out, rest) = self.split_at(n);
        *self = rest;
        Ok(out)
    }
}

impl Read for &mut [u8] {
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error> {
        let n = out.len();
        if self.len() < n {
            return Err(fail!(io::Error::BufferExhausted));
        }

        out.copy_from_slice(&self[..n]);
        let buf = mem::take(self);
        *self = &mut buf[n..];
        Ok(())
    }

    fn remaining_data(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_bytes() {
        let mut bytes: &[u8] = b"Hello!";
        let mut three_bytes = [0; 3];
        bytes.read_bytes(&mut three_bytes).unwrap();
        assert_eq!(&three_bytes[..], b"Hel");
        assert_eq!(bytes.len(), 3);
        assert_eq!(bytes.read_le::<u16>().unwrap(), 0x6f6c);
        assert_eq!(bytes.len(), 1);
        assert!(bytes.read_le::<u32>().is_err());
    }

    #[test]
    fn read_big_endian() {
        let mut bytes: &[u8] = &[0x00, 0x01, 0x20, 0x00, 0xff];
        assert_eq!(bytes.read_be::<u32>().unwrap(), 0x0001_2000);
        assert_eq!(bytes.remaining_data(), 1);
        assert!(bytes.read_be::<u16>().is_err());
    }

    #[test]
    fn read_slice_borrows() {
        let buf = [1, 2, 3, 4, 5];
        let mut r = &buf[..];
        let head = r.read_slice(2).unwrap();
        r.skip(1).unwrap();
        assert_eq!(head, &[1, 2]);
        assert_eq!(r, &[4, 5]);
        assert_eq!(
            r.read_slice(3).unwrap_err().into_inner(),
            io::Error::BufferExhausted
        );
    }
}
