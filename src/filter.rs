// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Bus filter configuration.
//!
//! The host reaches its firmware flash over SPI, and its management devices
//! over I2C. Both buses pass through filter hardware that drops transactions
//! not allowed by a programmed table. This module turns a verified manifest
//! into those tables:
//!
//! - [`spi::CommandTable`] lists the SPI opcodes the host may issue. Only
//!   opcodes on a fixed list of safe commands can ever be added.
//! - [`spi::AddressPrivileges`] records which flash addresses the host may
//!   read and write.
//! - [`i2c::I2cPolicy`] holds per-device bitmaps of allowed register
//!   offsets.
//!
//! [`synthesize()`] derives a [`Policy`] from a manifest, starting from
//! deny-all; [`apply_spi()`] and [`apply_i2c()`] program it through a
//! [`driver::BusFilterDriver`]. Filter tables can be locked until the next
//! hardware reset; once they are, every attempt to reprogram them fails with
//! [`Error::Locked`].
//!
//! Transactions dropped by the hardware are reported through an
//! [`event::EventQueue`].

use crate::manifest;
use crate::status::Module;
use crate::status::Status;

pub mod driver;
pub mod event;
pub mod i2c;
pub mod spi;

mod synth;
pub use synth::apply_i2c;
pub use synth::apply_spi;
pub use synth::synthesize;
pub use synth::Policy;
pub use synth::Target;

/// A bus filter error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates an attempt to change a locked table or entry.
    Locked,

    /// Indicates that an SPI opcode is not on the safe list.
    CommandNotAllowed(u8),

    /// Indicates that the SPI command table has no free slot.
    TableFull,

    /// Indicates that a command to be locked or removed is not in the
    /// table.
    NotPresent,

    /// Indicates an address, device or bus outside the hardware's range.
    OutOfRange,

    /// Indicates that a range set has no room for another range.
    TooManyRanges,

    /// Indicates an I2C re-map slot or device address that does not exist.
    BadSlot,

    /// Indicates that an event queue is full.
    Full,

    /// Indicates that the filter driver failed.
    Driver,

    /// Indicates that the manifest could not be queried.
    Manifest(manifest::Error),
}

impl From<manifest::Error> for Error {
    fn from(e: manifest::Error) -> Self {
        Self::Manifest(e)
    }
}

debug_from!(Error => manifest::Error);

impl Status for Error {
    fn module(&self) -> Module {
        match self {
            Self::Manifest(e) => e.module(),
            _ => Module::Filter,
        }
    }

    fn local_code(&self) -> u8 {
        match self {
            Self::Locked => 0x00,
            Self::CommandNotAllowed(_) => 0x01,
            Self::TableFull => 0x02,
            Self::NotPresent => 0x03,
            Self::OutOfRange => 0x04,
            Self::TooManyRanges => 0x05,
            Self::BadSlot => 0x06,
            Self::Full => 0x07,
            Self::Driver => 0x08,
            Self::Manifest(e) => e.local_code(),
        }
    }
}
