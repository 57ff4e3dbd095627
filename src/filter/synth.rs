// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Policy synthesis and application.

use crate::filter::driver::BusFilterDriver;
use crate::filter::i2c::Bitmap;
use crate::filter::i2c::I2cPolicy;
use crate::filter::i2c::REMAP_SLOTS;
use crate::filter::spi::SpiPolicy;
use crate::filter::spi::Validity;
use crate::filter::spi::SAFE_COMMANDS;
use crate::filter::Error;
use crate::manifest::pfm;
use crate::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The filter hardware a policy is synthesized for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Target {
    /// The SPI monitor in front of the firmware flash.
    pub spi_device: u8,
    /// The filtered I2C bus.
    pub i2c_bus: u8,
}

/// A complete bus filter configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    /// The SPI monitor configuration.
    pub spi: SpiPolicy,
    /// The I2C filter configuration.
    pub i2c: I2cPolicy,
}

impl Policy {
    /// Creates a policy that blocks everything.
    pub fn deny_all(target: Target) -> Self {
        Self {
            spi: SpiPolicy::deny_all(target.spi_device),
            i2c: I2cPolicy::deny_all(target.i2c_bus),
        }
    }

    /// Returns whether the host may write flash address `addr`.
    ///
    /// RW regions are granted byte for byte here, but the programmed table
    /// only enables whole 16 KiB blocks; see [`Policy::is_write_enforced()`].
    pub fn is_write_allowed(&self, addr: u32) -> bool {
        self.spi.privileges.is_write_allowed(addr)
    }

    /// Returns whether the programmed write table lets the host write flash
    /// address `addr`.
    pub fn is_write_enforced(&self, addr: u32) -> bool {
        self.spi.privileges.is_write_enforced(addr)
    }

    /// Returns whether the host may read flash address `addr`.
    pub fn is_read_allowed(&self, addr: u32) -> bool {
        self.spi.privileges.is_read_allowed(addr)
    }
}

/// Derives the filter policy for version `version` of firmware `fw` from a
/// verified manifest.
///
/// The host may write exactly the version's read-write regions, and read
/// those plus its image regions. Every command on the safe list is allowed.
/// I2C slots are filled from the manifest's SMBus rules for the target bus.
///
/// Fails with [`Error::Locked`] if the target hardware has already been
/// locked.
pub fn synthesize<D: BusFilterDriver + ?Sized>(
    manifest: &pfm::Manifest,
    fw: Option<&[u8]>,
    version: &[u8],
    target: Target,
    driver: &D,
) -> Result<Policy, Error> {
    if driver.spi_locked(target.spi_device)?
        || driver.i2c_locked(target.i2c_bus)?
    {
        warn!(
            "refusing to synthesize for locked filters: spi {}, i2c {}",
            target.spi_device, target.i2c_bus
        );
        return Err(fail!(Error::Locked));
    }

    let mut policy = Policy::deny_all(target);
    let version = manifest.find_version(fw, version)?;

    for cmd in SAFE_COMMANDS {
        policy.spi.commands.add(*cmd as u8, Validity::Always)?;
    }

    let privs = &mut policy.spi.privileges;
    for rw in version.rw_regions() {
        let rw = rw?;
        privs.allow_write(rw.region)?;
        privs.allow_read(rw.region)?;
    }
    for image in version.images() {
        for region in image?.regions() {
            privs.allow_read(region?)?;
        }
    }

    for rule in manifest.smbus_rules() {
        let rule = rule?;
        if rule.bus_id() != target.i2c_bus {
            continue;
        }
        policy.i2c.set(
            rule.rule_id() as usize,
            rule.device_address() >> 1,
            Bitmap(rule.passlist_words()),
        )?;
    }

    info!(
        "synthesized filter policy for version {:?}",
        version.version()
    );
    Ok(policy)
}

/// Programs the SPI half of `policy`, then locks it if `lock` is set.
pub fn apply_spi<D: BusFilterDriver + ?Sized>(
    policy: &SpiPolicy,
    driver: &mut D,
    lock: bool,
) -> Result<(), Error> {
    check!(!driver.spi_locked(policy.device)?, Error::Locked);

    driver.write_spi_commands(policy.device, policy.commands.words())?;
    driver.write_spi_privileges(
        policy.device,
        &policy.privileges.read_image(),
        &policy.privileges.write_image(),
    )?;
    if lock {
        driver.lock_spi(policy.device)?;
    }
    Ok(())
}

/// Programs the I2C half of `policy`, enables filtering, then locks it if
/// `lock` is set.
///
/// Unused re-map slots are programmed to deny everything.
pub fn apply_i2c<D: BusFilterDriver + ?Sized>(
    policy: &I2cPolicy,
    driver: &mut D,
    lock: bool,
) -> Result<(), Error> {
    let bus = policy.bus();
    check!(!driver.i2c_locked(bus)?, Error::Locked);

    for (i, slot) in policy.slots().iter().enumerate().take(REMAP_SLOTS) {
        match slot {
            Some(s) => driver.write_i2c_slot(bus, i, s.address, &s.bitmap)?,
            None => driver.write_i2c_slot(bus, i, 0, &Bitmap::DENY_ALL)?,
        }
    }
    driver.enable_i2c(bus, true)?;
    if lock {
        driver.lock_i2c(bus)?;
    }
    Ok(())
}

#[cfg(all(test, feature = "serde"))]
mod test {
    use super::*;

    use crate::filter::driver::SoftFilter;
    use crate::filter::spi;
    use crate::manifest::owned;

    const TARGET: Target = Target {
        spi_device: 0,
        i2c_bus: 1,
    };

    fn manifest_bytes() -> Vec<u8> {
        #[rustfmt::skip]
        let pfm: owned::Pfm = serde_json::from_str(r#"{
            "format": "V2",
            "id": 3,
            "platform_id": "board",
            "firmware": [{
                "id": "bmc",
                "versions": [{
                    "version": "2.0",
                    "address": "0x0",
                    "rw_regions": [{ "start": "0x1000", "end": "0x2000" }],
                    "images": [{
                        "hash_type": "Sha256",
                        "hash": "0000000000000000000000000000000000000000000000000000000000000000",
                        "regions": [
                            { "start": "0x8000", "end": "0x9000" },
                            { "start": "0x10000", "end": "0x20000" }
                        ]
                    }]
                }]
            }],
            "smbus_rules": [
                {
                    "bus_id": 1,
                    "rule_id": 2,
                    "device_address": "0xa0",
                    "passlist": "0100000000000000000000000000000000000000000000000000000000000000"
                },
                {
                    "bus_id": 3,
                    "rule_id": 0,
                    "device_address": "0xb0",
                    "passlist": "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
                }
            ]
        }"#).unwrap();
        pfm.encode_with_signature(&[0; 256]).unwrap()
    }

    #[test]
    fn write_window() {
        let bytes = manifest_bytes();
        let pfm = pfm::Manifest::parse(&bytes).unwrap();
        let hw = SoftFilter::new();
        let policy =
            synthesize(&pfm, Some(b"bmc"), b"2.0", TARGET, &hw).unwrap();

        assert!(!policy.is_write_allowed(0x0fff));
        assert!(policy.is_write_allowed(0x1000));
        assert!(policy.is_write_allowed(0x1fff));
        assert!(!policy.is_write_allowed(0x2000));
        // The 4 KiB RW region is narrower than a privilege block.
        assert!(!policy.is_write_enforced(0x1000));

        // Image regions are readable, not writable.
        assert!(policy.is_read_allowed(0x8000));
        assert!(policy.is_read_allowed(0x1ffff));
        assert!(!policy.is_write_allowed(0x8000));
        assert!(!policy.is_read_allowed(0x9000));

        assert!(policy.spi.commands.contains(0x02));
        assert!(!policy.spi.commands.contains(0xc7));
    }

    #[test]
    fn i2c_rules_for_target_bus() {
        let bytes = manifest_bytes();
        let pfm = pfm::Manifest::parse(&bytes).unwrap();
        let policy = synthesize(
            &pfm,
            Some(b"bmc"),
            b"2.0",
            TARGET,
            &SoftFilter::new(),
        )
        .unwrap();

        assert!(policy.i2c.permits(0x50, 0));
        assert!(!policy.i2c.permits(0x50, 1));
        // Rule for bus 3 is ignored; device 0x58 stays blocked.
        assert_eq!(policy.i2c.bitmap_for(0x58), Bitmap::DENY_ALL);
        assert_eq!(policy.i2c.slots()[2].unwrap().address, 0x50);
    }

    #[test]
    fn unknown_version() {
        let bytes = manifest_bytes();
        let pfm = pfm::Manifest::parse(&bytes).unwrap();
        let hw = SoftFilter::new();
        let err =
            synthesize(&pfm, Some(b"bmc"), b"9.9", TARGET, &hw).unwrap_err();
        assert!(matches!(err.into_inner(), Error::Manifest(_)));
    }

    #[test]
    fn apply_then_lock() {
        let bytes = manifest_bytes();
        let pfm = pfm::Manifest::parse(&bytes).unwrap();
        let mut hw = SoftFilter::new();
        let policy =
            synthesize(&pfm, Some(b"bmc"), b"2.0", TARGET, &hw).unwrap();

        apply_spi(&policy.spi, &mut hw, true).unwrap();
        apply_i2c(&policy.i2c, &mut hw, true).unwrap();

        assert_eq!(hw.spi[0].commands[4] & 0xff, 0x03);
        assert!(hw.spi[0].commands.iter().all(|w| w & spi::LOCK != 0));
        // [0x10000, 0x20000) spans read blocks 4 through 7.
        assert_eq!(hw.spi[0].read[0] & 0xf0, 0xf0);
        assert_eq!(hw.spi[0].write, [0; spi::PRIV_WORDS]);
        assert!(hw.i2c[1].enabled && hw.i2c[1].locked);
        assert_eq!(hw.i2c[1].slots[2].0, 0x50);
        assert_eq!(hw.i2c[1].slots[0].1, Bitmap::DENY_ALL);

        // Locked hardware refuses both resynthesis and reprogramming.
        assert_eq!(
            synthesize(&pfm, Some(b"bmc"), b"2.0", TARGET, &hw)
                .unwrap_err()
                .into_inner(),
            Error::Locked
        );
        assert_eq!(
            apply_spi(&policy.spi, &mut hw, false).unwrap_err().into_inner(),
            Error::Locked
        );
        assert!(apply_i2c(&policy.i2c, &mut hw, false).is_err());
    }
}
