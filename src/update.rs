// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Sequential flash updates.
//!
//! A [`FlashUpdater`] streams an update, received in pieces, into
//! consecutive locations of a fixed flash region. It never writes outside
//! the region, never writes past the size declared for the update, and
//! erases flash ahead of the writes that need it.
//!
//! The expected call sequence is:
//! 1. [`FlashUpdater::init()`] or [`FlashUpdater::init_sector()`].
//! 2. [`FlashUpdater::prepare_for_update()`] or
//!    [`FlashUpdater::prepare_for_update_erase_all()`], which fix the size
//!    of the update.
//! 3. Any number of [`FlashUpdater::write_update_data()`] calls.
//! 4. [`FlashUpdater::release()`], after which the updater may be prepared
//!    again.
//!
//! A write that fails for lack of space or because the device wrote short
//! poisons the session: further writes are refused until `release()`.
//! Already-written data is never rolled back.

use core::convert::TryFrom;

use crate::hardware::flash;
use crate::hardware::flash::Flash;
use crate::hardware::flash::Ptr;
use crate::hardware::flash::Region;
use crate::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A flash update error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates misuse: a bad region, a call in the wrong phase, or a
    /// write to a poisoned session.
    InvalidArgument,
    /// Indicates that a declared update does not fit the region.
    TooLarge,
    /// Indicates that the flash device wrote fewer bytes than requested.
    IncompleteWrite,
    /// Indicates that a write would run past the declared update size.
    OutOfSpace,
    /// Indicates that an error occured in a [`flash`] operation.
    Flash(flash::Error),
}

impl From<flash::Error> for Error {
    fn from(e: flash::Error) -> Self {
        Self::Flash(e)
    }
}

debug_from!(Error => flash::Error);

status_codes!(Error: FlashUpdater {
    InvalidArgument => 0x00,
    TooLarge => 0x02,
    IncompleteWrite => 0x03,
    OutOfSpace => 0x04,
    Flash(_) => 0x05,
});

/// The lifecycle phase of a [`FlashUpdater`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No update is in progress.
    Idle,
    /// An update has been prepared and is accepting data.
    Writing,
    /// A write failed; the updater must be released.
    Poisoned,
}

/// The erase unit an update uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EraseGranularity {
    /// The device's sector size.
    Sector,
    /// The device's block size.
    Block,
}

impl EraseGranularity {
    /// The size of this unit on `flash`.
    pub fn size_on<F: Flash>(self, flash: &F) -> u32 {
        match self {
            Self::Sector => flash.sector_size(),
            Self::Block => flash.block_size(),
        }
    }
}

/// Streams updates into a region of flash.
#[derive(Debug)]
pub struct FlashUpdater<F> {
    flash: F,
    base: u32,
    max_size: u32,
    granularity: u32,
    update_size: u32,
    write_offset: u32,
    erased_to: u32,
    phase: Phase,
}

impl<F: Flash> FlashUpdater<F> {
    /// Creates an updater for `[base, base + max_size)` that erases in
    /// units of the device's block size.
    ///
    /// Both `base` and `max_size` must be block-aligned.
    pub fn init(flash: F, base: u32, max_size: u32) -> Result<Self, Error> {
        Self::try_init(flash, base, max_size, EraseGranularity::Block)
            .map_err(|(_, e)| e)
    }

    /// Creates an updater for `[base, base + max_size)` that erases in
    /// units of the device's sector size.
    ///
    /// Both `base` and `max_size` must be sector-aligned.
    pub fn init_sector(
        flash: F,
        base: u32,
        max_size: u32,
    ) -> Result<Self, Error> {
        Self::try_init(flash, base, max_size, EraseGranularity::Sector)
            .map_err(|(_, e)| e)
    }

    /// Creates an updater for `[base, base + max_size)` that erases in units
    /// of `unit`.
    ///
    /// If the region is rejected, `flash` is handed back along with the
    /// error.
    pub fn try_init(
        flash: F,
        base: u32,
        max_size: u32,
        unit: EraseGranularity,
    ) -> core::result::Result<Self, (F, crate::Error<Error>)> {
        let granularity = unit.size_on(&flash);
        match Self::check_region(&flash, base, max_size, granularity) {
            Ok(end) => {
                info!(
                    "flash updater: region {:#x}..{:#x}, erase unit {:#x}",
                    base, end, granularity
                );
                Ok(Self {
                    flash,
                    base,
                    max_size,
                    granularity,
                    update_size: 0,
                    write_offset: 0,
                    erased_to: 0,
                    phase: Phase::Idle,
                })
            }
            Err(e) => Err((flash, e)),
        }
    }

    /// Checks that `[base, base + max_size)` is aligned to `granularity` and
    /// lies within `flash`, returning its end.
    fn check_region(
        flash: &F,
        base: u32,
        max_size: u32,
        granularity: u32,
    ) -> Result<u32, Error> {
        check!(granularity != 0, Error::InvalidArgument);
        check!(
            base % granularity == 0 && max_size % granularity == 0,
            Error::InvalidArgument
        );
        let end = base
            .checked_add(max_size)
            .ok_or_else(|| fail!(Error::InvalidArgument))?;
        check!(end <= flash.size()?, Error::InvalidArgument);
        Ok(end)
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The region updates are written to.
    pub fn region(&self) -> Region {
        Region::new(self.base, self.max_size)
    }

    /// Returns a reference to the underlying flash.
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Consumes the updater, returning the underlying flash.
    pub fn into_flash(self) -> F {
        self.flash
    }

    /// Moves the start of the update region forward by `offset` bytes,
    /// shrinking it accordingly.
    ///
    /// Only allowed while idle; `offset` must be a multiple of the erase
    /// granularity.
    pub fn apply_update_offset(&mut self, offset: u32) -> Result<(), Error> {
        check!(self.phase == Phase::Idle, Error::InvalidArgument);
        check!(
            offset % self.granularity == 0 && offset <= self.max_size,
            Error::InvalidArgument
        );
        self.base += offset;
        self.max_size -= offset;
        Ok(())
    }

    /// Checks that an update of `total_len` bytes fits the region.
    pub fn check_update_size(&self, total_len: u32) -> Result<(), Error> {
        check!(total_len <= self.max_size, Error::TooLarge);
        Ok(())
    }

    fn begin(&mut self, total_len: u32) -> Result<(), Error> {
        check!(self.phase == Phase::Idle, Error::InvalidArgument);
        self.check_update_size(total_len)?;
        self.update_size = total_len;
        self.write_offset = 0;
        self.erased_to = 0;
        Ok(())
    }

    /// Begins an update of `total_len` bytes, erasing flash as writes reach
    /// it.
    pub fn prepare_for_update(&mut self, total_len: u32) -> Result<(), Error> {
        self.begin(total_len)?;
        self.phase = Phase::Writing;
        info!("update of {} bytes prepared", total_len);
        Ok(())
    }

    /// Begins an update of `total_len` bytes, erasing the whole region up
    /// front.
    pub fn prepare_for_update_erase_all(
        &mut self,
        total_len: u32,
    ) -> Result<(), Error> {
        self.begin(total_len)?;
        if self.max_size > 0 {
            self.flash.erase(self.region())?;
        }
        self.erased_to = self.max_size;
        self.phase = Phase::Writing;
        info!("update of {} bytes prepared; region erased", total_len);
        Ok(())
    }

    /// Writes the next piece of the update.
    ///
    /// On success, the write offset advances by exactly `data.len()`.
    pub fn write_update_data(&mut self, data: &[u8]) -> Result<(), Error> {
        check!(self.phase == Phase::Writing, Error::InvalidArgument);

        let end = match self.fits(data.len()) {
            Some(end) => end,
            None => {
                self.phase = Phase::Poisoned;
                return Err(fail!(
                    Error::OutOfSpace,
                    "update overflow: {} + {} > {}",
                    self.write_offset,
                    data.len(),
                    self.update_size
                ));
            }
        };

        if end > self.erased_to {
            let erase_end = round_up(end, self.granularity);
            let erase = Region::new(
                self.base + self.erased_to,
                erase_end - self.erased_to,
            );
            if let Err(e) = self.flash.erase(erase) {
                self.phase = Phase::Poisoned;
                return Err(e.into());
            }
            self.erased_to = erase_end;
        }

        let at = Ptr::new(self.base + self.write_offset);
        let written = match self.flash.program(at, data) {
            Ok(n) => n.min(data.len()),
            Err(e) => {
                self.phase = Phase::Poisoned;
                return Err(e.into());
            }
        };
        self.write_offset += written as u32;

        if written < data.len() {
            self.phase = Phase::Poisoned;
            return Err(fail!(
                Error::IncompleteWrite,
                "short write: {} of {} bytes",
                written,
                data.len()
            ));
        }
        Ok(())
    }

    /// Returns the offset the write would end at, if it fits the update.
    fn fits(&self, len: usize) -> Option<u32> {
        let len = u32::try_from(len).ok()?;
        let end = self.write_offset.checked_add(len)?;
        if end > self.update_size {
            return None;
        }
        Some(end)
    }

    /// The number of bytes written so far in this update.
    pub fn get_bytes_written(&self) -> u32 {
        self.write_offset
    }

    /// The number of bytes left to write in this update.
    pub fn get_remaining_bytes(&self) -> u32 {
        self.update_size - self.write_offset
    }

    /// Ends the current update, if any.
    ///
    /// Flash contents are left as they are. Calling this more than once is
    /// harmless.
    pub fn release(&mut self) {
        if self.phase != Phase::Idle {
            info!(
                "update released after {} of {} bytes",
                self.write_offset, self.update_size
            );
        }
        self.update_size = 0;
        self.write_offset = 0;
        self.erased_to = 0;
        self.phase = Phase::Idle;
    }
}

/// Rounds `x` up to a multiple of `unit`, saturating at `u32::MAX`.
fn round_up(x: u32, unit: u32) -> u32 {
    match x % unit {
        0 => x,
        r => x.saturating_add(unit - r),
    }
}
