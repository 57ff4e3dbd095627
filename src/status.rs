// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Integer status codes.
//!
//! Callers outside of Rust (firmware glue, host tooling, logs shipped off the
//! device) see errors as small integers. A status code is
//! `(module << 8) | code`, where the module byte namespaces the code.
//!
//! Every error enum in this crate implements [`Status`]; the wrapped
//! [`crate::Error`] forwards to it through [`crate::Error::code()`].

/// A module namespace for status codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Module {
    /// Generic manifest errors (`MANIFEST_*`).
    Manifest = 0x01,
    /// PFM-specific errors (`PFM_*`).
    Pfm = 0x02,
    /// Flash update sequencer errors (`FLASH_UPDATER_*`).
    FlashUpdater = 0x03,
    /// Bus filter errors.
    Filter = 0x04,
    /// Crypto engine errors.
    Crypto = 0x05,
    /// Flash device errors.
    Flash = 0x06,
    /// Recovery image errors.
    Recovery = 0x07,
    /// Session errors.
    Session = 0x08,
    /// Low-level I/O errors.
    Io = 0x09,
}

impl Module {
    /// Builds a full status code out of this module and a module-local code.
    pub const fn code(self, local: u8) -> u16 {
        (self as u16) << 8 | local as u16
    }
}

/// A type that can be reported as an integer status code.
pub trait Status {
    /// The module this status belongs to.
    fn module(&self) -> Module;

    /// The module-local code, in the range `0..=0xff`.
    fn local_code(&self) -> u8;

    /// The full status code.
    fn code(&self) -> u16 {
        self.module().code(self.local_code())
    }
}

/// The expected manifest is missing, unparseable or not verified.
pub const MANIFEST_NO_MANIFEST: u16 = Module::Manifest.code(0x00);
/// A manifest query was made with an invalid argument.
pub const PFM_INVALID_ARGUMENT: u16 = Module::Pfm.code(0x00);
/// The update sequencer was misused.
pub const FLASH_UPDATER_INVALID_ARGUMENT: u16 = Module::FlashUpdater.code(0x00);
/// A declared update does not fit its region.
pub const FLASH_UPDATER_TOO_LARGE: u16 = Module::FlashUpdater.code(0x02);
/// The flash device wrote fewer bytes than requested.
pub const FLASH_UPDATER_INCOMPLETE_WRITE: u16 = Module::FlashUpdater.code(0x03);
/// A write would overrun the declared update size.
pub const FLASH_UPDATER_OUT_OF_SPACE: u16 = Module::FlashUpdater.code(0x04);

/// Implements [`Status`] for a fieldless error enum.
macro_rules! status_codes {
    ($ty:ty: $module:ident { $($variant:ident $(($($_f:tt)*))? => $code:literal,)* }) => {
        impl $crate::status::Status for $ty {
            fn module(&self) -> $crate::status::Module {
                $crate::status::Module::$module
            }

            fn local_code(&self) -> u8 {
                match self {
                    $(Self::$variant $(($($_f)*))? => $code,)*
                }
            }
        }
    };
}
