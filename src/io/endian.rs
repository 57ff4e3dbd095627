// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Traits for converting integers to and from byte representations.
//!
//! Most on-flash fields are little-endian. A few, such as the image region
//! bounds in a PFM, are stored big-endian; [`BeInt`] covers those.

use core::mem;

use byteorder::ByteOrder as _;

use crate::io;
use crate::io::Read;
use crate::io::Write;
use crate::Result;

/// A little-endian integer, which can be read and written.
///
/// This trait can be used for operating generically over little-endian integer
/// I/O.
pub trait LeInt: Sized + Copy {
    /// Reads a value of type `Self`, in little-endian order.
    fn read_from<R: Read>(r: R) -> Result<Self, io::Error>;

    /// Writes a value of type `Self`, in little-endian order.
    fn write_to<W: Write>(self, w: W) -> Result<(), io::Error>;
}

/// A big-endian integer, which can be read and written.
pub trait BeInt: Sized + Copy {
    /// Reads a value of type `Self`, in big-endian order.
    fn read_be_from<R: Read>(r: R) -> Result<Self, io::Error>;

    /// Writes a value of type `Self`, in big-endian order.
    fn write_be_to<W: Write>(self, w: W) -> Result<(), io::Error>;
}

impl LeInt for u8 {
    #[inline]
    fn read_from<R: Read>(mut r: R) -> Result<Self, io::Error> {
        let mut bytes = [0; 1];
        r.read_bytes(&mut bytes)?;
        Ok(bytes[0])
    }

    #[inline]
    fn write_to<W: Write>(self, mut w: W) -> Result<(), io::Error> {
        w.write_bytes(&[self])
    }
}

macro_rules! impl_int {
    ($($ty:ty: $read:ident, $write:ident;)*) => {$(
        impl LeInt for $ty {
            #[inline]
            fn read_from<R: Read>(mut r: R) -> Result<Self, io::Error> {
                let mut bytes = [0; mem::size_of::<Self>()];
                r.read_bytes(&mut bytes)?;
                Ok(byteorder::LE::$read(&bytes))
            }

            #[inline]
            fn write_to<W: Write>(self, mut w: W) -> Result<(), io::Error> {
                let mut bytes = [0; mem::size_of::<Self>()];
                byteorder::LE::$write(&mut bytes, self);
                w.write_bytes(&bytes)
            }
        }

        impl BeInt for $ty {
            #[inline]
            fn read_be_from<R: Read>(mut r: R) -> Result<Self, io::Error> {
                let mut bytes = [0; mem::size_of::<Self>()];
                r.read_bytes(&mut bytes)?;
                Ok(byteorder::BE::$read(&bytes))
            }

            #[inline]
            fn write_be_to<W: Write>(self, mut w: W) -> Result<(), io::Error> {
                let mut bytes = [0; mem::size_of::<Self>()];
                byteorder::BE::$write(&mut bytes, self);
                w.write_bytes(&bytes)
            }
        }
    )*};
}

impl_int! {
    u16: read_u16, write_u16;
    u32: read_u32, write_u32;
    u64: read_u64, write_u64;
}
