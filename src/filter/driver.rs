// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Bus filter hardware abstraction.
//!
//! [`BusFilterDriver`] is the register-level contract this crate needs from
//! the SPI monitors and I2C filters. [`SoftFilter`] is a software model of
//! that hardware, including its lock semantics, for tests and host tooling.

use static_assertions::assert_obj_safe;

use crate::filter::i2c;
use crate::filter::i2c::Bitmap;
use crate::filter::spi;
use crate::filter::spi::PrivilegeImage;
use crate::filter::spi::CMD_TABLE_LEN;
use crate::filter::spi::PRIV_WORDS;
use crate::filter::Error;
use crate::Result;

/// Lock register bit for an SPI monitor's read privilege table.
pub const SPI_LOCK_READ_TABLE: u32 = 1 << 31;
/// Lock register bit for an SPI monitor's write privilege table.
pub const SPI_LOCK_WRITE_TABLE: u32 = 1 << 30;

/// Programs and locks bus filter hardware.
///
/// Once locked, a table stays locked until hardware reset; implementations
/// must refuse to program a locked table with [`Error::Locked`].
pub trait BusFilterDriver {
    /// Returns whether any table of SPI monitor `device` is locked.
    fn spi_locked(&self, device: u8) -> Result<bool, Error>;

    /// Programs the allow-command table of `device`.
    fn write_spi_commands(
        &mut self,
        device: u8,
        table: &[u32; CMD_TABLE_LEN],
    ) -> Result<(), Error>;

    /// Programs the read and write address privilege tables of `device`.
    fn write_spi_privileges(
        &mut self,
        device: u8,
        read: &PrivilegeImage,
        write: &PrivilegeImage,
    ) -> Result<(), Error>;

    /// Locks every table of `device`.
    fn lock_spi(&mut self, device: u8) -> Result<(), Error>;

    /// Returns whether the filter on `bus` is locked.
    fn i2c_locked(&self, bus: u8) -> Result<bool, Error>;

    /// Programs re-map slot `slot` of `bus`.
    fn write_i2c_slot(
        &mut self,
        bus: u8,
        slot: usize,
        address: u8,
        bitmap: &Bitmap,
    ) -> Result<(), Error>;

    /// Turns filtering on `bus` on or off.
    fn enable_i2c(&mut self, bus: u8, enable: bool) -> Result<(), Error>;

    /// Locks the filter on `bus`.
    fn lock_i2c(&mut self, bus: u8) -> Result<(), Error>;
}
assert_obj_safe!(BusFilterDriver);

/// The number of SPI monitors in a [`SoftFilter`].
pub const SPI_DEVICES: usize = 2;

/// Register state of one modelled SPI monitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftSpi {
    /// The allow-command table.
    pub commands: [u32; CMD_TABLE_LEN],
    /// The read privilege table.
    pub read: PrivilegeImage,
    /// The write privilege table.
    pub write: PrivilegeImage,
    /// The lock register.
    pub lock: u32,
}

impl Default for SoftSpi {
    fn default() -> Self {
        Self {
            commands: [0; CMD_TABLE_LEN],
            read: [0; PRIV_WORDS],
            write: [0; PRIV_WORDS],
            lock: 0,
        }
    }
}

impl SoftSpi {
    fn is_locked(&self) -> bool {
        self.lock != 0 || self.commands.iter().any(|w| w & spi::LOCK != 0)
    }
}

/// Register state of one modelled I2C filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SoftI2c {
    /// Re-map slots, as `(address, bitmap)`.
    pub slots: [(u8, Bitmap); i2c::REMAP_SLOTS],
    /// Whether filtering is on.
    pub enabled: bool,
    /// Whether the filter is locked.
    pub locked: bool,
}

/// A software model of the bus filter hardware.
#[derive(Clone, Debug, Default)]
pub struct SoftFilter {
    /// SPI monitor state.
    pub spi: [SoftSpi; SPI_DEVICES],
    /// I2C filter state.
    pub i2c: [SoftI2c; i2c::BUS_COUNT],
}

impl SoftFilter {
    /// Creates a model in its reset state: nothing allowed, nothing locked.
    pub fn new() -> Self {
        Self::default()
    }

    fn spi(&self, device: u8) -> Result<&SoftSpi, Error> {
        self.spi
            .get(device as usize)
            .ok_or_else(|| fail!(Error::OutOfRange))
    }

    fn spi_mut(&mut self, device: u8) -> Result<&mut SoftSpi, Error> {
        self.spi
            .get_mut(device as usize)
            .ok_or_else(|| fail!(Error::OutOfRange))
    }

    fn i2c(&self, bus: u8) -> Result<&SoftI2c, Error> {
        self.i2c
            .get(bus as usize)
            .ok_or_else(|| fail!(Error::OutOfRange))
    }

    fn i2c_mut(&mut self, bus: u8) -> Result<&mut SoftI2c, Error> {
        let dev = self
            .i2c
            .get_mut(bus as usize)
            .ok_or_else(|| fail!(Error::OutOfRange))?;
        check!(!dev.locked, Error::Locked);
        Ok(dev)
    }
}

impl BusFilterDriver for SoftFilter {
    fn spi_locked(&self, device: u8) -> Result<bool, Error> {
        Ok(self.spi(device)?.is_locked())
    }

    fn write_spi_commands(
        &mut self,
        device: u8,
        table: &[u32; CMD_TABLE_LEN],
    ) -> Result<(), Error> {
        let dev = self.spi_mut(device)?;
        check!(
            dev.commands.iter().all(|w| w & spi::LOCK == 0),
            Error::Locked
        );
        dev.commands = *table;
        Ok(())
    }

    fn write_spi_privileges(
        &mut self,
        device: u8,
        read: &PrivilegeImage,
        write: &PrivilegeImage,
    ) -> Result<(), Error> {
        let dev = self.spi_mut(device)?;
        check!(dev.lock & SPI_LOCK_READ_TABLE == 0, Error::Locked);
        check!(dev.lock & SPI_LOCK_WRITE_TABLE == 0, Error::Locked);
        dev.read = *read;
        dev.write = *write;
        Ok(())
    }

    fn lock_spi(&mut self, device: u8) -> Result<(), Error> {
        let dev = self.spi_mut(device)?;
        dev.lock |= SPI_LOCK_READ_TABLE | SPI_LOCK_WRITE_TABLE;
        for w in &mut dev.commands {
            *w |= spi::LOCK;
        }
        info!("spi monitor {} locked", device);
        Ok(())
    }

    fn i2c_locked(&self, bus: u8) -> Result<bool, Error> {
        Ok(self.i2c(bus)?.locked)
    }

    fn write_i2c_slot(
        &mut self,
        bus: u8,
        slot: usize,
        address: u8,
        bitmap: &Bitmap,
    ) -> Result<(), Error> {
        let dev = self.i2c_mut(bus)?;
        let entry = dev
            .slots
            .get_mut(slot)
            .ok_or_else(|| fail!(Error::BadSlot))?;
        *entry = (address, *bitmap);
        Ok(())
    }

    fn enable_i2c(&mut self, bus: u8, enable: bool) -> Result<(), Error> {
        self.i2c_mut(bus)?.enabled = enable;
        Ok(())
    }

    fn lock_i2c(&mut self, bus: u8) -> Result<(), Error> {
        self.i2c_mut(bus)?.locked = true;
        info!("i2c filter {} locked", bus);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn locks_stick() {
        let mut hw = SoftFilter::new();
        assert!(!hw.spi_locked(0).unwrap());
        hw.write_spi_commands(0, &[1; CMD_TABLE_LEN]).unwrap();
        hw.lock_spi(0).unwrap();
        assert!(hw.spi_locked(0).unwrap());
        assert!(!hw.spi_locked(1).unwrap());

        assert_eq!(
            hw.write_spi_commands(0, &[0; CMD_TABLE_LEN])
                .unwrap_err()
                .into_inner(),
            Error::Locked
        );
        let image = [0; PRIV_WORDS];
        assert!(hw.write_spi_privileges(0, &image, &image).is_err());
        assert_eq!(hw.spi[0].commands[0], 1 | spi::LOCK);

        hw.lock_i2c(2).unwrap();
        assert!(hw.enable_i2c(2, true).is_err());
        assert!(hw.enable_i2c(1, true).is_ok());
    }

    #[test]
    fn out_of_range() {
        let mut hw = SoftFilter::new();
        assert_eq!(
            hw.spi_locked(SPI_DEVICES as u8).unwrap_err().into_inner(),
            Error::OutOfRange
        );
        assert!(hw.i2c_locked(i2c::BUS_COUNT as u8).is_err());
        assert_eq!(
            hw.write_i2c_slot(0, i2c::REMAP_SLOTS, 0x10, &Bitmap::ALLOW_ALL)
                .unwrap_err()
                .into_inner(),
            Error::BadSlot
        );
    }
}
