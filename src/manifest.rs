// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Platform Firmware Manifest handling.
//!
//! A Platform Firmware Manifest (PFM) is a signed description of the firmware
//! a platform is allowed to run: which versions, where their images live in
//! the host's flash, how to check them, and which flash regions the host may
//! write at runtime.
//!
//! # Wire Format
//!
//! On flash every manifest has the following layout, expressed as a
//! pseudo-Rust struct. Integers are encoded in little-endian order, and `_`
//! indicates reserved fields or padding that should be set to 0.
//! ```ignore
//! struct Manifest {
//!     // Overall header.
//!     total_len: u16,
//!     magic: u16, // See `ManifestType`.
//!     id: u32,
//!     signature_len: u16,
//!     signature_type: u8,
//!     _: u8,
//!
//!     body: [u8], // See `pfm`.
//!
//!     signature: [u8; self.signature_len],
//! }
//! ```
//!
//! The signature covers the SHA-256 digest of everything before it. A
//! [`ManifestType::V2`] manifest is immediately followed in flash by the
//! public key its signature is made with; see [`verifier`].
//!
//! # Parsing and Encoding APIs
//!
//! [`pfm::Manifest::parse()`] decodes and fully validates a manifest held in
//! memory, producing zero-copy views over it. [`reader::PfmFlash`] caches a
//! manifest out of flash and gates access to those views on signature
//! verification.
//!
//! This module also provides an "owned" API for building manifests, which
//! requires the `std` feature and is intended for use by tooling. The
//! [`owned::Pfm`] type is the relevant entry point.

use crate::hardware::flash;
use crate::io;
use crate::status::Module;
use crate::status::Status;

pub mod container;
pub use container::Container;
pub use container::Header;

#[cfg(feature = "std")]
pub mod owned;
pub mod pfm;
pub mod reader;
pub mod verifier;

/// The magic number of a legacy-format PFM.
pub const PFM_MAGIC_NUM: u16 = 0x504d;

/// The magic number of a V2-format PFM.
pub const PFM_V2_MAGIC_NUM: u16 = 0x706d;

wire_enum! {
    /// A PFM format.
    ///
    /// This enum represents the "magic number" `u16` value in a manifest
    /// header. Any other value is rejected.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub enum ManifestType: u16 {
        /// The legacy format, which describes a single, unnamed firmware.
        Legacy = 0x504d,
        /// The V2 format, which describes any number of named firmware
        /// components and carries its own public key.
        V2 = 0x706d,
    }
}

/// An error returned by a manifest operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates that no verified manifest is available for the requested
    /// operation.
    NoManifest,

    /// Indicates that a caller passed an unusable argument, such as a
    /// firmware id to a legacy manifest query that requires none.
    InvalidArgument,

    /// Indicates that the requested firmware is not in the manifest.
    UnknownFirmware,

    /// Indicates that the requested version is not allowed by the manifest.
    UnknownVersion,

    /// Indicates that a caller-provided cache buffer is too small.
    BufferTooSmall,

    /// Indicates that an error occured in a [`flash`] type.
    Flash(flash::Error),

    /// Indicates that a manifest's magic value is not one of the supported
    /// ones.
    ///
    /// Contains the bad value found.
    BadMagic(u16),

    /// Indicates that a manifest, or a record nested in it, claims to be
    /// longer than the bytes available to it.
    Truncated,

    /// Indicates that a length field holds an impossible value.
    BadLength,

    /// Indicates that a region has `start >= end`.
    BadRange,

    /// Indicates that two regions of one image overlap.
    OverlappingRegions,

    /// Indicates that a manifest's signature type is not supported.
    UnsupportedSignature(u8),

    /// Indicates that an image uses an unsupported hash type.
    UnsupportedHashType(u8),

    /// Indicates that the signature length is incompatible with either the
    /// given manifest length or the signature algorithm.
    BadSignatureLen,

    /// Indicates that a platform or firmware id is empty or not printable
    /// ASCII.
    BadId,

    /// Indicates that a public key blob could not be decoded.
    BadKey,

    /// Indicates that a firmware's flags disagree with its contents.
    BadFlags,

    /// Indicates that an SMBus rule is malformed.
    BadSmbusRule,

    /// Indicates that a legacy manifest contains a signature-verified image.
    SignedImageInLegacy,

    /// Indicates that bytes were left over after the last record.
    TrailingBytes,

    /// Indicates that hash or signature verification failed.
    ///
    /// Which of the two failed is deliberately not reported.
    VerifyFailed,
}

impl From<io::Error> for Error {
    fn from(_: io::Error) -> Self {
        Self::Truncated
    }
}

impl From<flash::Error> for Error {
    fn from(e: flash::Error) -> Self {
        Self::Flash(e)
    }
}

impl From<crate::crypto::key::Error> for Error {
    fn from(_: crate::crypto::key::Error) -> Self {
        Self::BadKey
    }
}

debug_from!(Error => io::Error, flash::Error, crate::crypto::key::Error);

impl Status for Error {
    fn module(&self) -> Module {
        match self {
            Self::InvalidArgument
            | Self::UnknownFirmware
            | Self::UnknownVersion
            | Self::BufferTooSmall => Module::Pfm,
            _ => Module::Manifest,
        }
    }

    fn local_code(&self) -> u8 {
        match self {
            Self::NoManifest => 0x00,
            Self::Flash(_) => 0x01,
            Self::BadMagic(_) => 0x02,
            Self::Truncated => 0x03,
            Self::BadLength => 0x04,
            Self::BadRange => 0x05,
            Self::OverlappingRegions => 0x06,
            Self::UnsupportedSignature(_) => 0x07,
            Self::UnsupportedHashType(_) => 0x08,
            Self::BadSignatureLen => 0x09,
            Self::BadId => 0x0a,
            Self::BadKey => 0x0b,
            Self::BadFlags => 0x0c,
            Self::BadSmbusRule => 0x0d,
            Self::SignedImageInLegacy => 0x0e,
            Self::TrailingBytes => 0x0f,
            Self::VerifyFailed => 0x10,

            Self::InvalidArgument => 0x00,
            Self::UnknownFirmware => 0x01,
            Self::UnknownVersion => 0x02,
            Self::BufferTooSmall => 0x03,
        }
    }
}
