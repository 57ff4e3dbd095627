// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! I2C filter tables.
//!
//! Each filtered bus has [`REMAP_SLOTS`] re-map slots. A slot binds a 7-bit
//! device address to a 256-bit [`Bitmap`] of register offsets the host may
//! access on that device. Devices without a slot are fully blocked.

use crate::filter::Error;
use crate::Result;

/// The number of re-map slots per bus.
pub const REMAP_SLOTS: usize = 16;

/// The number of filtered buses.
pub const BUS_COUNT: usize = 5;

/// A 256-bit offset bitmap; bit `n` permits offset `n`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Bitmap(pub [u32; 8]);

impl Bitmap {
    /// Blocks every offset.
    pub const DENY_ALL: Self = Self([0; 8]);

    /// Permits every offset.
    pub const ALLOW_ALL: Self = Self([!0; 8]);

    /// Returns whether `offset` is permitted.
    pub fn permits(&self, offset: u8) -> bool {
        self.0[offset as usize / 32] >> (offset % 32) & 1 != 0
    }

    /// Permits `offset`.
    pub fn allow(&mut self, offset: u8) {
        self.0[offset as usize / 32] |= 1 << (offset % 32);
    }

    /// Blocks `offset`.
    pub fn deny(&mut self, offset: u8) {
        self.0[offset as usize / 32] &= !(1 << (offset % 32));
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::DENY_ALL
    }
}

/// A device binding in a re-map slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    /// The 7-bit device address.
    pub address: u8,
    /// The offsets the host may access.
    pub bitmap: Bitmap,
}

/// The I2C half of a filter policy, for one bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct I2cPolicy {
    bus: u8,
    slots: [Option<Slot>; REMAP_SLOTS],
}

impl I2cPolicy {
    /// Creates a deny-all policy for `bus`.
    pub fn deny_all(bus: u8) -> Self {
        Self {
            bus,
            slots: [None; REMAP_SLOTS],
        }
    }

    /// The bus this policy is for.
    pub fn bus(&self) -> u8 {
        self.bus
    }

    /// Binds `address` to `bitmap` in re-map slot `index`.
    ///
    /// An address may only occupy one slot.
    pub fn set(
        &mut self,
        index: usize,
        address: u8,
        bitmap: Bitmap,
    ) -> Result<(), Error> {
        check!(index < REMAP_SLOTS && address <= 0x7f, Error::BadSlot);
        let taken = self.slots.iter().enumerate().any(|(i, s)| {
            i != index && matches!(s, Some(s) if s.address == address)
        });
        check!(!taken, Error::BadSlot);

        self.slots[index] = Some(Slot { address, bitmap });
        Ok(())
    }

    /// Empties re-map slot `index`.
    pub fn clear(&mut self, index: usize) -> Result<(), Error> {
        check!(index < REMAP_SLOTS, Error::BadSlot);
        self.slots[index] = None;
        Ok(())
    }

    /// Returns the contents of each re-map slot.
    pub fn slots(&self) -> &[Option<Slot>; REMAP_SLOTS] {
        &self.slots
    }

    /// Returns the bitmap applied to `address`; unmapped devices get
    /// [`Bitmap::DENY_ALL`].
    pub fn bitmap_for(&self, address: u8) -> Bitmap {
        self.slots
            .iter()
            .flatten()
            .find(|s| s.address == address)
            .map(|s| s.bitmap)
            .unwrap_or(Bitmap::DENY_ALL)
    }

    /// Returns whether the host may access `offset` on `address`.
    pub fn permits(&self, address: u8, offset: u8) -> bool {
        self.bitmap_for(address).permits(offset)
    }
}
