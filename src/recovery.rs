// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Recovery images.
//!
//! A recovery image packages known-good firmware for restoring a component.
//! It is a sequence of sections, each destined for a flash address, wrapped
//! in a signed envelope:
//!
//! ```ignore
//! struct RecoveryImage {
//!     header_len: u16, // Always 48.
//!     format: u16,
//!     magic: u32,
//!     version_id: [u8; 32],
//!     image_len: u32, // Everything, signature included.
//!     sig_len: u32,
//!
//!     platform_id_len: u8,
//!     platform_id: [u8; self.platform_id_len],
//!
//!     sections: [Section],
//!     signature: [u8; self.sig_len],
//! }
//!
//! struct Section {
//!     header_len: u16, // Always 16.
//!     format: u16,
//!     magic: u32,
//!     address: u32,
//!     len: u32,
//!     data: [u8; self.len],
//! }
//! ```
//!
//! All integers are little-endian. The signature is an RSA signature of the
//! SHA-256 digest of everything before it.

use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::crypto::key::PublicKey;
use crate::crypto::sig;
use crate::hardware::flash::Region;
use crate::io;
use crate::io::Read as _;
use crate::io::ReadZero as _;
use crate::Result;

/// Magic number of an ordinary recovery image header.
pub const RECOVERY_HEADER_MAGIC: u32 = 0x8a14_7c29;

/// Magic number of a key cancellation or decommission header.
pub const CANCELLATION_HEADER_MAGIC: u32 = 0xb6ea_fd19;

/// Magic number of a section header.
pub const RECOVERY_SECTION_MAGIC: u32 = 0x4b17_2f31;

/// Header `format` of a key cancellation image.
pub const FORMAT_KEY_CANCELLATION: u16 = 4;

/// Header `format` of a decommission image.
pub const FORMAT_DECOMMISSION: u16 = 5;

/// Length of a [`RecoveryImageHeader`].
pub const HEADER_LEN: usize = 48;

/// Length of a [`SectionHeader`].
pub const SECTION_HEADER_LEN: usize = 16;

/// Length of the version id.
pub const VERSION_ID_LEN: usize = 32;

/// A recovery image error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates a header with the wrong magic number for its format.
    BadMagic(u32),

    /// Indicates a length field that is inconsistent with the image.
    BadLength,

    /// Indicates that the image is shorter than it claims.
    Truncated,

    /// Indicates an unsupported signature length.
    BadSignatureLen,

    /// Indicates a malformed section header.
    BadSection,

    /// Indicates that signature verification failed.
    VerifyFailed,
}

impl From<io::Error> for Error {
    fn from(_: io::Error) -> Self {
        Self::Truncated
    }
}

debug_from!(Error => io::Error);

status_codes!(Error: Recovery {
    BadMagic(_) => 0x00,
    BadLength => 0x01,
    Truncated => 0x02,
    BadSignatureLen => 0x03,
    BadSection => 0x04,
    VerifyFailed => 0x05,
});

/// The fixed header at the start of a recovery image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecoveryImageHeader<'a> {
    /// The image format.
    pub format: u16,
    /// The magic number.
    pub magic: u32,
    /// The image's version id.
    pub version_id: &'a [u8],
    /// The length of the whole image, signature included.
    pub image_len: u32,
    /// The length of the trailing signature.
    pub sig_len: u32,
}

impl<'a> RecoveryImageHeader<'a> {
    /// Reads a header from `r`, checking its length and magic.
    pub fn read_from(r: &mut &'a [u8]) -> Result<Self, Error> {
        let header_len = r.read_le::<u16>()?;
        let format = r.read_le::<u16>()?;
        let magic = r.read_le::<u32>()?;
        let version_id = r.read_slice(VERSION_ID_LEN)?;
        let image_len = r.read_le::<u32>()?;
        let sig_len = r.read_le::<u32>()?;

        check!(header_len as usize == HEADER_LEN, Error::BadLength);
        let header = Self {
            format,
            magic,
            version_id,
            image_len,
            sig_len,
        };
        check!(magic == header.expected_magic(), Error::BadMagic(magic));
        Ok(header)
    }

    /// Returns whether this header is for a key cancellation or decommission
    /// image rather than for firmware.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.format, FORMAT_KEY_CANCELLATION | FORMAT_DECOMMISSION)
    }

    fn expected_magic(&self) -> u32 {
        if self.is_cancellation() {
            CANCELLATION_HEADER_MAGIC
        } else {
            RECOVERY_HEADER_MAGIC
        }
    }
}

/// The header of one section of a recovery image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SectionHeader {
    /// The section format.
    pub format: u16,
    /// Where the section's data belongs in flash.
    pub address: u32,
    /// The length of the section's data.
    pub len: u32,
}

impl SectionHeader {
    /// Reads a section header from `r`.
    pub fn read_from(r: &mut impl io::Read) -> Result<Self, Error> {
        let header_len = r.read_le::<u16>()?;
        let format = r.read_le::<u16>()?;
        let magic = r.read_le::<u32>()?;
        let address = r.read_le::<u32>()?;
        let len = r.read_le::<u32>()?;

        check!(header_len as usize == SECTION_HEADER_LEN, Error::BadSection);
        check!(magic == RECOVERY_SECTION_MAGIC, Error::BadSection);
        check!(address.checked_add(len).is_some(), Error::BadSection);
        Ok(Self {
            format,
            address,
            len,
        })
    }

    /// The flash region this section restores.
    pub fn region(&self) -> Region {
        Region::new(self.address, self.len)
    }
}

/// A section of a recovery image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Section<'a> {
    /// The section's header.
    pub header: SectionHeader,
    /// The section's data.
    pub data: &'a [u8],
}

fn read_section<'a>(r: &mut &'a [u8]) -> Result<Section<'a>, Error> {
    let header = SectionHeader::read_from(r)?;
    let data = r.read_slice(header.len as usize)?;
    Ok(Section { header, data })
}

/// A parsed recovery image.
#[derive(Copy, Clone, Debug)]
pub struct RecoveryImage<'a> {
    header: RecoveryImageHeader<'a>,
    platform_id: &'a [u8],
    sections: &'a [u8],
    signed: &'a [u8],
    signature: &'a [u8],
}

impl<'a> RecoveryImage<'a> {
    /// Parses and validates a recovery image.
    ///
    /// `bytes` may extend past the end of the image; the header determines
    /// how much of it is used.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let mut r = bytes;
        let header = RecoveryImageHeader::read_from(&mut r)?;

        let image_len = header.image_len as usize;
        let sig_len = header.sig_len as usize;
        check!(
            matches!(sig_len, 256 | 384 | 512),
            Error::BadSignatureLen
        );
        check!(image_len <= bytes.len(), Error::Truncated);
        check!(image_len >= HEADER_LEN + 1 + sig_len, Error::BadLength);

        let (signed, signature) = bytes[..image_len].split_at(image_len - sig_len);
        let mut body = &signed[HEADER_LEN..];
        let platform_id_len = body.read_le::<u8>()?;
        let platform_id = body.read_slice(platform_id_len as usize)?;

        let sections = body;
        while !body.is_empty() {
            read_section(&mut body)?;
        }

        Ok(Self {
            header,
            platform_id,
            sections,
            signed,
            signature,
        })
    }

    /// The image header.
    pub fn header(&self) -> &RecoveryImageHeader<'a> {
        &self.header
    }

    /// The platform id this image is for.
    pub fn platform_id(&self) -> &'a [u8] {
        self.platform_id
    }

    /// The bytes covered by the signature.
    pub fn signed_bytes(&self) -> &'a [u8] {
        self.signed
    }

    /// The image signature.
    pub fn signature(&self) -> &'a [u8] {
        self.signature
    }

    /// Returns an iterator over the image's sections.
    pub fn sections(&self) -> Sections<'a> {
        Sections {
            rest: self.sections,
        }
    }

    /// Checks the image signature under `key`.
    pub fn verify<H, V>(
        &self,
        hasher: &mut H,
        verifier: &mut V,
        key: &PublicKey,
    ) -> Result<(), Error>
    where
        H: hash::Engine + ?Sized,
        V: sig::Verify + ?Sized,
    {
        let mut digest = [0; 32];
        hasher
            .contiguous_hash(hash::Algo::Sha256, self.signed, &mut digest)
            .map_err(|_| fail!(Error::VerifyFailed))?;
        verifier
            .verify(key, self.signature, &digest)
            .map_err(|_| fail!(Error::VerifyFailed))?;
        info!("recovery image verified");
        Ok(())
    }
}

/// An iterator over the [`Section`]s of a [`RecoveryImage`].
#[derive(Clone, Debug)]
pub struct Sections<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Sections<'a> {
    type Item = Section<'a>;

    fn next(&mut self) -> Option<Section<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        // Sections were validated by `RecoveryImage::parse()`.
        read_section(&mut self.rest).ok()
    }
}
