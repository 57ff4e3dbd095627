// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Manifest containers.
//!
//! A container is the envelope shared by every manifest format: a fixed
//! header, a format-specific body, and a trailing signature. This module
//! only interprets the envelope; the body is handed to [`super::pfm`].

use crate::crypto::key::ModulusLength;
use crate::io;
use crate::io::Read;
use crate::io::Write;
use crate::manifest::Error;
use crate::manifest::ManifestType;
use crate::wire::WireEnum as _;
use crate::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

wire_enum! {
    /// A manifest signature scheme.
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub enum SigType: u8 {
        /// RSA PKCS#1 v1.5 over a SHA-256 digest.
        RsaPkcs1Sha256 = 0x00,
    }
}

/// The length of an encoded [`Header`].
pub const HEADER_LEN: usize = 12;

/// A decoded manifest header.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Header {
    /// The total length of the manifest, including the header and the
    /// signature.
    pub length: u16,
    /// The manifest format.
    pub manifest_type: ManifestType,
    /// The manifest's monotonic id.
    pub id: u32,
    /// The length of the trailing signature.
    pub sig_length: u16,
    /// The signature scheme.
    pub sig_type: SigType,
}

impl Header {
    /// Decodes a header from `r`.
    ///
    /// Both the magic number and the lengths are validated; a header that is
    /// returned here describes a manifest that is at least large enough to
    /// hold itself and its signature.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self, Error> {
        let length = r.read_le::<u16>()?;
        let magic = r.read_le::<u16>()?;
        let id = r.read_le::<u32>()?;
        let sig_length = r.read_le::<u16>()?;
        let sig_type = r.read_le::<u8>()?;
        let _reserved = r.read_le::<u8>()?;

        let manifest_type = ManifestType::from_wire_value(magic)
            .ok_or_else(|| fail!(Error::BadMagic(magic)))?;
        let sig_type = SigType::from_wire_value(sig_type)
            .ok_or_else(|| fail!(Error::UnsupportedSignature(sig_type)))?;

        check!(
            ModulusLength::from_byte_len(sig_length as usize).is_some(),
            Error::BadSignatureLen
        );
        check!(
            length as usize >= HEADER_LEN + sig_length as usize,
            Error::BadLength
        );

        Ok(Self {
            length,
            manifest_type,
            id,
            sig_length,
            sig_type,
        })
    }

    /// Encodes this header into `w`.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), io::Error> {
        w.write_le(self.length)?;
        w.write_le(self.manifest_type.to_wire_value())?;
        w.write_le(self.id)?;
        w.write_le(self.sig_length)?;
        w.write_le(self.sig_type.to_wire_value())?;
        w.write_le(0u8)
    }

    /// The number of bytes covered by the signature.
    pub fn signed_len(&self) -> usize {
        self.length as usize - self.sig_length as usize
    }
}

/// A manifest envelope over an in-memory buffer.
#[derive(Copy, Clone, Debug)]
pub struct Container<'m> {
    header: Header,
    bytes: &'m [u8],
}

impl<'m> Container<'m> {
    /// Parses the envelope out of `bytes`.
    ///
    /// `bytes` must be exactly as long as the header claims.
    pub fn parse(bytes: &'m [u8]) -> Result<Self, Error> {
        let header = Header::read_from(bytes)?;
        check!(header.length as usize <= bytes.len(), Error::Truncated);
        check!(header.length as usize == bytes.len(), Error::TrailingBytes);
        Ok(Self { header, bytes })
    }

    /// The decoded header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The whole manifest.
    pub fn bytes(&self) -> &'m [u8] {
        self.bytes
    }

    /// The bytes covered by the signature: everything before it.
    pub fn signed_bytes(&self) -> &'m [u8] {
        &self.bytes[..self.header.signed_len()]
    }

    /// The signature.
    pub fn signature(&self) -> &'m [u8] {
        &self.bytes[self.header.signed_len()..]
    }

    /// The format-specific body between the header and the signature.
    pub fn body(&self) -> &'m [u8] {
        &self.bytes[HEADER_LEN..self.header.signed_len()]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn header_bytes(len: u16, magic: u16, sig_len: u16) -> [u8; HEADER_LEN] {
        let mut buf = [0; HEADER_LEN];
        buf[0..2].copy_from_slice(&len.to_le_bytes());
        buf[2..4].copy_from_slice(&magic.to_le_bytes());
        buf[4..8].copy_from_slice(&7u32.to_le_bytes());
        buf[8..10].copy_from_slice(&sig_len.to_le_bytes());
        buf
    }

    #[test]
    fn split() {
        let mut bytes = vec![0xaa; 12 + 4 + 256];
        bytes[..12].copy_from_slice(&header_bytes(272, 0x706d, 256));

        let c = Container::parse(&bytes).unwrap();
        assert_eq!(c.header().manifest_type, ManifestType::V2);
        assert_eq!(c.header().id, 7);
        assert_eq!(c.body(), &[0xaa; 4]);
        assert_eq!(c.signed_bytes().len(), 16);
        assert_eq!(c.signature().len(), 256);
    }

    #[test]
    fn bad_headers() {
        let h = header_bytes(300, 0xffff, 256);
        assert_eq!(
            Header::read_from(&h[..]).unwrap_err().into_inner(),
            Error::BadMagic(0xffff)
        );

        let h = header_bytes(300, 0x504d, 100);
        assert_eq!(
            Header::read_from(&h[..]).unwrap_err().into_inner(),
            Error::BadSignatureLen
        );

        let h = header_bytes(200, 0x504d, 256);
        assert_eq!(
            Header::read_from(&h[..]).unwrap_err().into_inner(),
            Error::BadLength
        );

        assert_eq!(
            Header::read_from(&h[..4]).unwrap_err().into_inner(),
            Error::Truncated
        );
    }

    #[test]
    fn length_mismatch() {
        let mut bytes = vec![0; 300];
        bytes[..12].copy_from_slice(&header_bytes(290, 0x504d, 256));
        assert_eq!(
            Container::parse(&bytes).unwrap_err().into_inner(),
            Error::TrailingBytes
        );
        assert_eq!(
            Container::parse(&bytes[..280]).unwrap_err().into_inner(),
            Error::Truncated
        );
    }
}
