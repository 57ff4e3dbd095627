// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! External, remote flash abstraction.
//!
//! This crate provides the [`Flash`] (and related) traits, which represent
//! *abstract flash devices*. An abstract flash device is a region of memory
//! that can be read, programmed and erased. Such a "device" can range from a
//! simple Rust slice to a remote SPI flash device (or even a subregion of
//! it!).
//!
//! Flash follows NOR semantics: erasing sets bytes to `0xff`, and erases are
//! only possible in units of the device's sector or block size.
//!
//! [`Flash`]: trait.Flash.html

use core::convert::TryInto;

use static_assertions::assert_obj_safe;

#[cfg(feature = "arbitrary-derive")]
use libfuzzer_sys::arbitrary::{self, Arbitrary};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Result;

/// The value of an erased flash byte.
pub const ERASED_BYTE: u8 = 0xff;

/// A [`Flash`] error.
///
/// All of these errors are non-retryable; a [`Flash`] implementation should
/// block until the operation succeeds.
///
/// [`Flash`]: trait.Flash.html
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates that an operation failed because the requested
    /// operation was outside of the device's address space.
    OutOfRange,

    /// Indicates that an erase was not aligned to the erase granularity.
    Misaligned,

    /// Indicates that the device is locked in some manner and cannot
    /// be affected by the operation.
    Locked,

    /// Indicates that an internal invariant was violated.
    Internal,

    /// Indicates that an unspecified error occured.
    Unspecified,
}

status_codes!(Error: Flash {
    OutOfRange => 0x00,
    Misaligned => 0x01,
    Locked => 0x02,
    Internal => 0x03,
    Unspecified => 0x04,
});

/// Provides access to a flash-like storage device.
///
/// This trait provides abstract operations on a device, as if it were a
/// block of random-access memory. It is the implementation's responsibility
/// to implement these operations efficiently with respect to the underlying
/// device. Operations may block for as long as the device is busy; they must
/// not be called from interrupt context.
pub trait Flash {
    /// Returns the size, in bytes, of this device.
    fn size(&self) -> Result<u32, Error>;

    /// Attempts to read `out.len()` bytes starting at `offset`.
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error>;

    /// Attempts to program `buf` starting at `offset`, returning the number
    /// of bytes actually written.
    ///
    /// A return value smaller than `buf.len()` indicates a partial write;
    /// callers decide whether that is an error.
    ///
    /// Note that this function is not guaranteed to succeed (and be
    /// reflected in the return value of `read`) until `flush()` is called.
    /// This is to permit a `Flash` implementation to buffer writes before
    /// sending them out.
    fn program(&mut self, offset: Ptr, buf: &[u8]) -> Result<usize, Error>;

    /// Erases `region`, which must be aligned to [`Flash::sector_size()`].
    fn erase(&mut self, region: Region) -> Result<(), Error>;

    /// The smallest erasable unit, in bytes.
    fn sector_size(&self) -> u32 {
        0x1000
    }

    /// The large erasable unit, in bytes.
    fn block_size(&self) -> u32 {
        0x10000
    }

    /// Flushes any pending `program()` operations.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
assert_obj_safe!(Flash);

impl<F: Flash + ?Sized> Flash for &F {
    #[inline]
    fn size(&self) -> Result<u32, Error> {
        F::size(self)
    }

    #[inline]
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error> {
        F::read(self, offset, out)
    }

    #[inline]
    fn program(&mut self, _: Ptr, _: &[u8]) -> Result<usize, Error> {
        Err(fail!(Error::Locked))
    }

    #[inline]
    fn erase(&mut self, _: Region) -> Result<(), Error> {
        Err(fail!(Error::Locked))
    }

    #[inline]
    fn sector_size(&self) -> u32 {
        F::sector_size(self)
    }

    #[inline]
    fn block_size(&self) -> u32 {
        F::block_size(self)
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        Err(fail!(Error::Locked))
    }
}

impl<F: Flash + ?Sized> Flash for &mut F {
    #[inline]
    fn size(&self) -> Result<u32, Error> {
        F::size(self)
    }

    #[inline]
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error> {
        F::read(self, offset, out)
    }

    #[inline]
    fn program(&mut self, offset: Ptr, buf: &[u8]) -> Result<usize, Error> {
        F::program(self, offset, buf)
    }

    #[inline]
    fn erase(&mut self, region: Region) -> Result<(), Error> {
        F::erase(self, region)
    }

    #[inline]
    fn sector_size(&self) -> u32 {
        F::sector_size(self)
    }

    #[inline]
    fn block_size(&self) -> u32 {
        F::block_size(self)
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        F::flush(self)
    }
}

/// Adapter for working with a sub-region of a [`Flash`] type.
///
/// Reads and writes on the device will be constrained to a given [`Region`].
/// This is especially useful for operating on a blob contained within another
/// region of flash.
#[derive(Copy, Clone, Debug)]
pub struct SubFlash<F>(pub F, pub Region);

impl<F> SubFlash<F> {
    fn translate(&self, offset: Ptr, len: usize) -> Result<Ptr, Error> {
        let len: u32 = len.try_into().map_err(|_| fail!(Error::OutOfRange))?;
        let end = offset
            .address
            .checked_add(len)
            .ok_or_else(|| fail!(Error::OutOfRange))?;
        check!(end <= self.1.len, Error::OutOfRange);
        Ok(Ptr::new(self.1.ptr.address + offset.address))
    }
}

impl<F: Flash> Flash for SubFlash<F> {
    #[inline]
    fn size(&self) -> Result<u32, Error> {
        Ok(self.1.len)
    }

    #[inline]
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error> {
        let ptr = self.translate(offset, out.len())?;
        self.0.read(ptr, out)
    }

    #[inline]
    fn program(&mut self, offset: Ptr, buf: &[u8]) -> Result<usize, Error> {
        let ptr = self.translate(offset, buf.len())?;
        self.0.program(ptr, buf)
    }

    #[inline]
    fn erase(&mut self, region: Region) -> Result<(), Error> {
        let ptr = self.translate(region.ptr, region.len as usize)?;
        self.0.erase(Region::new(ptr.address, region.len))
    }

    #[inline]
    fn sector_size(&self) -> u32 {
        self.0.sector_size()
    }

    #[inline]
    fn block_size(&self) -> u32 {
        self.0.block_size()
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        self.0.flush()
    }
}

fn ram_range(len: usize, offset: Ptr, n: usize) -> Result<(usize, usize), Error> {
    let start = offset.address as usize;
    let end = start
        .checked_add(n)
        .ok_or_else(|| fail!(Error::OutOfRange))?;
    check!(end <= len, Error::OutOfRange);
    Ok((start, end))
}

/// Adapter for converting RAM-backed storage into a read-only [`Flash`].
///
/// For the purposes of this type, "RAM-backed" means that `AsRef<[u8]>`
/// is implemented.
///
/// [`Flash`]: traits.Flash.html
#[derive(Copy, Clone, Debug)]
pub struct Ram<Bytes>(pub Bytes);

impl<Bytes: AsRef<[u8]>> Flash for Ram<Bytes> {
    fn size(&self) -> Result<u32, Error> {
        self.0
            .as_ref()
            .len()
            .try_into()
            .map_err(|_| fail!(Error::Unspecified))
    }

    #[inline]
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error> {
        let bytes = self.0.as_ref();
        let (start, end) = ram_range(bytes.len(), offset, out.len())?;
        out.copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    fn program(&mut self, _: Ptr, _: &[u8]) -> Result<usize, Error> {
        Err(fail!(Error::Locked))
    }

    fn erase(&mut self, _: Region) -> Result<(), Error> {
        Err(fail!(Error::Locked))
    }
}

/// Adapter for converting mutable, RAM-backed storage into a [`Flash`].
///
/// For the purposes of this type, "RAM-backed" means that `AsRef<[u8]>`
/// and `AsMut<[u8]>` are implemented.
///
/// Programming overwrites bytes directly rather than AND-ing them into the
/// erased state.
///
/// [`Flash`]: traits.Flash.html
#[derive(Copy, Clone, Debug)]
pub struct RamMut<Bytes>(pub Bytes);

impl<Bytes: AsRef<[u8]> + AsMut<[u8]>> Flash for RamMut<Bytes> {
    fn size(&self) -> Result<u32, Error> {
        self.0
            .as_ref()
            .len()
            .try_into()
            .map_err(|_| fail!(Error::Unspecified))
    }

    #[inline]
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error> {
        let bytes = self.0.as_ref();
        let (start, end) = ram_range(bytes.len(), offset, out.len())?;
        out.copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    fn program(&mut self, offset: Ptr, buf: &[u8]) -> Result<usize, Error> {
        let bytes = self.0.as_mut();
        let (start, end) = ram_range(bytes.len(), offset, buf.len())?;
        bytes[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn erase(&mut self, region: Region) -> Result<(), Error> {
        let sector = self.sector_size();
        check!(
            region.ptr.address % sector == 0 && region.len % sector == 0,
            Error::Misaligned
        );
        let bytes = self.0.as_mut();
        let (start, end) =
            ram_range(bytes.len(), region.ptr, region.len as usize)?;
        for b in &mut bytes[start..end] {
            *b = ERASED_BYTE;
        }
        Ok(())
    }
}

/// An abstract pointer into a [`Flash`] type.
///
/// A `Ptr` needs to be used in conjunction with a [`Flash`]
/// implementation to be read from or written to.
///
/// [`Flash`]: trait.Flash.html
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
#[cfg_attr(feature = "arbitrary-derive", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ptr {
    /// The abstract address of this pointer.
    pub address: u32,
}

impl Ptr {
    /// Convenience method for creating a `Ptr` without having to use
    /// a struct literal.
    pub const fn new(address: u32) -> Self {
        Self { address }
    }
}

/// A region within  a [`Flash`] type.
///
/// Much like a [`Ptr`], a `Region` needs to be interpreted with
/// respect to a [`Flash`] implementation.
///
/// [`Flash`]: trait.Flash.html
/// [`Ptr`]: struct.Ptr.html
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "arbitrary-derive", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    /// The base pointer for this slice.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub ptr: Ptr,
    /// The length of the slice, in bytes.
    pub len: u32,
}

impl Region {
    /// Convenience method for creating a `Region` without having to use
    /// a struct literal.
    pub const fn new(ptr: u32, len: u32) -> Self {
        Self {
            ptr: Ptr::new(ptr),
            len,
        }
    }

    /// Creates a region out of a half-open `[start, end)` pair.
    ///
    /// Returns `None` unless `start < end`.
    pub fn from_bounds(start: u32, end: u32) -> Option<Self> {
        if start >= end {
            return None;
        }
        Some(Self::new(start, end - start))
    }

    /// Returns the first address past the end of this region, if it fits in
    /// a `u32`.
    pub fn end(self) -> Option<u32> {
        self.ptr.address.checked_add(self.len)
    }

    /// Returns whether `self` lies entirely within `other`.
    pub fn is_within(self, other: Region) -> bool {
        match (self.end(), other.end()) {
            (Some(end), Some(other_end)) => {
                self.ptr.address >= other.ptr.address && end <= other_end
            }
            _ => false,
        }
    }

    /// Returns whether `self` and `other` share at least one byte.
    pub fn overlaps(self, other: Region) -> bool {
        let a_end = self.ptr.address as u64 + self.len as u64;
        let b_end = other.ptr.address as u64 + other.len as u64;
        (self.ptr.address as u64) < b_end && (other.ptr.address as u64) < a_end
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ram_mut_program_and_erase() {
        let mut buf = vec![0u8; 0x2000];
        let mut flash = RamMut(&mut buf[..]);
        assert_eq!(flash.program(Ptr::new(0x10), b"hello").unwrap(), 5);

        let mut out = [0; 5];
        flash.read(Ptr::new(0x10), &mut out).unwrap();
        assert_eq!(&out, b"hello");

        assert_eq!(
            flash.erase(Region::new(0x10, 0x1000)).unwrap_err().into_inner(),
            Error::Misaligned
        );
        flash.erase(Region::new(0, 0x1000)).unwrap();
        flash.read(Ptr::new(0x10), &mut out).unwrap();
        assert_eq!(out, [ERASED_BYTE; 5]);

        assert_eq!(
            flash.program(Ptr::new(0x1ffe), b"abc").unwrap_err().into_inner(),
            Error::OutOfRange
        );
    }

    #[test]
    fn read_only_views() {
        let buf = [7u8; 16];
        let mut ram = Ram(&buf[..]);
        assert_eq!(ram.size().unwrap(), 16);
        assert!(ram.program(Ptr::new(0), &[1]).is_err());

        let mut shared = &ram;
        assert!(shared.erase(Region::new(0, 16)).is_err());
    }

    #[test]
    fn sub_flash_bounds() {
        let mut buf = vec![0u8; 64];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = i as u8;
        }
        let sub = SubFlash(Ram(&buf[..]), Region::new(16, 16));
        let mut out = [0; 4];
        sub.read(Ptr::new(12), &mut out).unwrap();
        assert_eq!(out, [28, 29, 30, 31]);
        assert!(sub.read(Ptr::new(13), &mut out).is_err());
    }

    #[test]
    fn regions() {
        assert_eq!(Region::from_bounds(0x1000, 0x1000), None);
        let r = Region::from_bounds(0x1000, 0x2000).unwrap();
        assert_eq!(r.end(), Some(0x2000));
        assert!(Region::new(0x1800, 0x800).is_within(r));
        assert!(!Region::new(0x1800, 0x801).is_within(r));
        assert!(r.overlaps(Region::new(0x1fff, 1)));
        assert!(!r.overlaps(Region::new(0x2000, 1)));
    }
}
