// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! RSA public key blobs.
//!
//! Manifests embed public keys in a compact, length-prefixed encoding:
//! ```text
//! mod_length: u16 (LE), modulus: [u8; mod_length] (BE),
//! exp_length: u8, exponent: [u8; exp_length] (BE)
//! ```
//! Inside a signature-verified image record, the blob is zero-padded out to
//! [`IMAGE_KEY_LEN`] bytes.

use crate::io;
use crate::io::Read as _;
use crate::io::ReadZero as _;
use crate::io::Write;
use crate::Result;

/// The size of the zero-padded key field in an image record.
pub const IMAGE_KEY_LEN: usize = 450;

/// The largest signature (and modulus) this crate handles.
pub const MAX_SIG_LEN: usize = 512;

/// A sanctioned RSA modulus length.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ModulusLength {
    /// A 2048-bit modulus.
    Bits2048,
    /// A 3072-bit modulus.
    Bits3072,
    /// A 4096-bit modulus.
    Bits4096,
}

impl ModulusLength {
    /// Returns the length in bytes of this modulus, which is also the length
    /// of a signature made with it.
    pub const fn byte_len(self) -> usize {
        match self {
            Self::Bits2048 => 256,
            Self::Bits3072 => 384,
            Self::Bits4096 => 512,
        }
    }

    /// Parses a byte length into a `ModulusLength`.
    pub fn from_byte_len(len: usize) -> Option<Self> {
        match len {
            256 => Some(Self::Bits2048),
            384 => Some(Self::Bits3072),
            512 => Some(Self::Bits4096),
            _ => None,
        }
    }
}

/// An error from decoding a key blob.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The blob was truncated.
    Truncated,
    /// The modulus is not of a sanctioned length, or the exponent is empty.
    BadLength,
}

status_codes!(Error: Crypto {
    Truncated => 0x20,
    BadLength => 0x21,
});

impl From<io::Error> for Error {
    fn from(_: io::Error) -> Self {
        Self::Truncated
    }
}

debug_from!(Error => io::Error);

/// A borrowed RSA public key.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct PublicKey<'a> {
    modulus: &'a [u8],
    exponent: &'a [u8],
}

impl<'a> PublicKey<'a> {
    /// Creates a key out of its big-endian components.
    pub fn new(modulus: &'a [u8], exponent: &'a [u8]) -> Result<Self, Error> {
        check!(
            ModulusLength::from_byte_len(modulus.len()).is_some(),
            Error::BadLength
        );
        check!(
            !exponent.is_empty() && exponent.len() <= u8::MAX as usize,
            Error::BadLength
        );
        Ok(Self { modulus, exponent })
    }

    /// Decodes a key blob from the front of `bytes`, ignoring any trailing
    /// bytes (such as padding).
    pub fn from_blob(mut bytes: &'a [u8]) -> Result<Self, Error> {
        let r = &mut bytes;
        let mod_len = r.read_le::<u16>()?;
        let modulus = r.read_slice(mod_len as usize)?;
        let exp_len = r.read_le::<u8>()?;
        let exponent = r.read_slice(exp_len as usize)?;
        Self::new(modulus, exponent)
    }

    /// The big-endian modulus.
    pub fn modulus(&self) -> &'a [u8] {
        self.modulus
    }

    /// The big-endian public exponent.
    pub fn exponent(&self) -> &'a [u8] {
        self.exponent
    }

    /// The modulus length of this key.
    pub fn len(&self) -> ModulusLength {
        match self.modulus.len() {
            256 => ModulusLength::Bits2048,
            384 => ModulusLength::Bits3072,
            _ => ModulusLength::Bits4096,
        }
    }

    /// The length of the unpadded blob encoding of this key.
    pub fn blob_len(&self) -> usize {
        2 + self.modulus.len() + 1 + self.exponent.len()
    }

    /// Encodes this key as a blob.
    pub fn write_blob<W: Write>(&self, mut w: W) -> Result<(), io::Error> {
        w.write_le(self.modulus.len() as u16)?;
        w.write_bytes(self.modulus)?;
        w.write_le(self.exponent.len() as u8)?;
        w.write_bytes(self.exponent)
    }

    /// Compares two keys by value, in constant time with respect to their
    /// contents.
    pub fn ct_eq(&self, other: &PublicKey) -> bool {
        let m = super::constant_time_eq(self.modulus, other.modulus);
        let e = super::constant_time_eq(self.exponent, other.exponent);
        m & e
    }
}
