// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! SPI filter tables.
//!
//! The SPI monitor sits between the host and its flash. It checks every
//! transaction against two tables:
//!
//! - An allow-command table of [`CMD_TABLE_LEN`] words, one opcode per slot.
//!   A slot describes the opcode's shape (address length, dummy cycles, data
//!   direction) so the monitor can find the address it carries.
//! - Read and write address privilege tables, [`PRIV_WORDS`] words each,
//!   one bit per [`PRIV_BLOCK`] bytes of flash. A set bit grants access.
//!
//! Both are modelled here byte-precisely and rendered to their hardware
//! encodings on demand.

use arrayvec::ArrayVec;

use crate::filter::Error;
use crate::hardware::flash::Region;
use crate::Result;

/// The number of slots in the allow-command table.
pub const CMD_TABLE_LEN: usize = 32;

/// The first slot handed out to commands other than `EN4B` and `EX4B`.
pub const FIRST_GENERIC_SLOT: usize = 4;

/// Slot bit: the command may be issued once, then becomes invalid.
pub const VALID_ONCE: u32 = 1 << 31;
/// Slot bit: the command may be issued.
pub const VALID: u32 = 1 << 30;
/// Slot bit: the slot cannot change until reset.
pub const LOCK: u32 = 1 << 23;

const VALID_MASK: u32 = VALID_ONCE | VALID;
const CMD_MASK: u32 = 0xff;

/// Opcode for entering 4-byte address mode.
pub const CMD_EN4B: u8 = 0xb7;
/// Opcode for leaving 4-byte address mode.
pub const CMD_EX4B: u8 = 0xe9;

/// Encodes the static part of a command slot.
///
/// `g`, `w`, `r` and `m` mark generic, write, read and memory commands.
#[allow(clippy::too_many_arguments)]
const fn slot(
    g: u32,
    w: u32,
    r: u32,
    m: u32,
    data_mode: u32,
    dummy: u32,
    program_size: u32,
    addr_len: u32,
    addr_mode: u32,
    cmd: u8,
) -> u32 {
    g << 29
        | w << 28
        | r << 27
        | m << 26
        | data_mode << 24
        | dummy << 16
        | program_size << 13
        | addr_len << 10
        | addr_mode << 8
        | cmd as u32
}

/// Every command the filter may ever allow, with its slot encoding.
///
/// Chip erase (`0xc7`, `0x60`) is deliberately absent.
#[rustfmt::skip]
pub const SAFE_COMMANDS: &[u32] = &[
    // Reads, 3- and 4-byte addressed.
    slot(1, 0, 1, 1, 1, 0, 0, 3, 1, 0x03),
    slot(1, 0, 1, 1, 1, 0, 0, 4, 1, 0x13),
    slot(1, 0, 1, 1, 1, 8, 0, 3, 1, 0x0b),
    slot(1, 0, 1, 1, 1, 8, 0, 4, 1, 0x0c),
    slot(1, 0, 1, 1, 2, 8, 0, 3, 1, 0x3b),
    slot(1, 0, 1, 1, 2, 8, 0, 4, 1, 0x3c),
    slot(1, 0, 1, 1, 3, 8, 0, 3, 1, 0x6b),
    slot(1, 0, 1, 1, 3, 8, 0, 4, 1, 0x6c),
    // Page programs.
    slot(1, 1, 0, 1, 1, 0, 1, 3, 1, 0x02),
    slot(1, 1, 0, 1, 1, 0, 1, 4, 1, 0x12),
    slot(1, 1, 0, 1, 3, 0, 1, 3, 1, 0x32),
    slot(1, 1, 0, 1, 3, 0, 1, 4, 1, 0x34),
    // 4 KiB sector and 64 KiB block erases.
    slot(1, 1, 0, 1, 0, 0, 1, 3, 1, 0x20),
    slot(1, 1, 0, 1, 0, 0, 1, 4, 1, 0x21),
    slot(1, 1, 0, 1, 0, 0, 5, 3, 1, 0xd8),
    slot(1, 1, 0, 1, 0, 0, 5, 4, 1, 0xdc),
    // WREN, WRDI.
    slot(1, 0, 0, 0, 0, 0, 0, 0, 0, 0x06),
    slot(1, 0, 0, 0, 0, 0, 0, 0, 0, 0x04),
    // Status and configuration registers.
    slot(1, 0, 1, 0, 1, 0, 0, 0, 0, 0x05),
    slot(1, 0, 1, 0, 1, 0, 0, 0, 0, 0x35),
    slot(1, 1, 0, 0, 1, 0, 0, 0, 0, 0x01),
    slot(1, 1, 0, 0, 1, 0, 0, 0, 0, 0x31),
    slot(1, 0, 1, 0, 1, 0, 0, 0, 0, 0x15),
    // Address mode switches.
    slot(0, 0, 0, 0, 0, 0, 0, 0, 0, CMD_EN4B),
    slot(0, 0, 0, 0, 0, 0, 0, 0, 0, CMD_EX4B),
    // SFDP, RDID.
    slot(1, 0, 1, 0, 1, 8, 0, 3, 1, 0x5a),
    slot(1, 0, 1, 0, 1, 0, 0, 0, 0, 0x9f),
];

/// Returns the slot encoding of `cmd`, if it is on the safe list.
pub fn safe_slot(cmd: u8) -> Option<u32> {
    SAFE_COMMANDS
        .iter()
        .copied()
        .find(|&w| w & CMD_MASK == cmd as u32)
}

/// How long an allowed command stays allowed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Validity {
    /// Until it is removed.
    Always,
    /// For a single transaction.
    Once,
}

impl Validity {
    fn bits(self) -> u32 {
        match self {
            Self::Always => VALID,
            Self::Once => VALID_ONCE,
        }
    }
}

/// An allow-command table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommandTable {
    words: [u32; CMD_TABLE_LEN],
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    /// Creates an empty table, which allows nothing.
    pub const fn new() -> Self {
        Self {
            words: [0; CMD_TABLE_LEN],
        }
    }

    /// Creates a table from its hardware encoding.
    pub const fn from_words(words: [u32; CMD_TABLE_LEN]) -> Self {
        Self { words }
    }

    /// The hardware encoding of this table.
    pub fn words(&self) -> &[u32; CMD_TABLE_LEN] {
        &self.words
    }

    fn find(&self, cmd: u8) -> Option<usize> {
        self.words
            .iter()
            .position(|&w| w & !LOCK != 0 && w & CMD_MASK == cmd as u32)
    }

    /// Allows `cmd`, returning the slot it occupies.
    ///
    /// Re-adding a present command updates its validity. Fails if `cmd` is
    /// not on the safe list, if its slot is locked, or if the table is full.
    pub fn add(&mut self, cmd: u8, validity: Validity) -> Result<usize, Error> {
        let encoded = safe_slot(cmd)
            .ok_or_else(|| fail!(Error::CommandNotAllowed(cmd)))?;

        let idx = match (self.find(cmd), cmd) {
            (Some(idx), _) => idx,
            (None, CMD_EN4B) => 0,
            (None, CMD_EX4B) => 1,
            (None, _) => self.words[FIRST_GENERIC_SLOT..]
                .iter()
                .position(|&w| w & !LOCK == 0)
                .map(|i| i + FIRST_GENERIC_SLOT)
                .ok_or_else(|| fail!(Error::TableFull))?,
        };

        let word = &mut self.words[idx];
        if *word & LOCK != 0 {
            return Err(fail!(
                Error::Locked,
                "spi command {:#04x} is locked in slot {}",
                cmd,
                idx
            ));
        }
        *word = encoded | validity.bits();
        Ok(idx)
    }

    /// Removes `cmd` from the table.
    ///
    /// Removing an absent command is a no-op.
    pub fn remove(&mut self, cmd: u8) -> Result<(), Error> {
        let idx = match self.find(cmd) {
            Some(idx) => idx,
            None => return Ok(()),
        };
        check!(self.words[idx] & LOCK == 0, Error::Locked);
        self.words[idx] = 0;
        Ok(())
    }

    /// Locks the slot holding `cmd`.
    pub fn lock(&mut self, cmd: u8) -> Result<(), Error> {
        let idx = self.find(cmd).ok_or_else(|| fail!(Error::NotPresent))?;
        self.words[idx] |= LOCK;
        Ok(())
    }

    /// Locks every slot, including empty ones.
    pub fn lock_all(&mut self) {
        for w in &mut self.words {
            *w |= LOCK;
        }
    }

    /// Returns whether `cmd` is currently allowed.
    pub fn contains(&self, cmd: u8) -> bool {
        self.find(cmd)
            .map(|idx| self.words[idx] & VALID_MASK != 0)
            .unwrap_or(false)
    }

    /// Returns whether the slot holding `cmd` is locked.
    pub fn is_locked(&self, cmd: u8) -> bool {
        self.find(cmd)
            .map(|idx| self.words[idx] & LOCK != 0)
            .unwrap_or(false)
    }
}

/// The granularity of the address privilege tables.
pub const PRIV_BLOCK: u32 = 16 * 1024;

/// The number of words in each address privilege table.
pub const PRIV_WORDS: usize = 512;

/// The size of the address space the privilege tables cover (256 MiB).
pub const ADDRESS_SPACE: u32 = PRIV_BLOCK * 32 * PRIV_WORDS as u32;

/// The maximum number of ranges in a [`RangeSet`].
pub const MAX_RANGES: usize = 64;

/// A hardware address privilege table.
pub type PrivilegeImage = [u32; PRIV_WORDS];

/// Returns whether `image` enables the block containing `addr`.
pub fn image_grants(image: &PrivilegeImage, addr: u32) -> bool {
    let block = (addr / PRIV_BLOCK) as usize;
    image
        .get(block / 32)
        .map_or(false, |w| w >> (block % 32) & 1 != 0)
}

/// A set of byte ranges within [`ADDRESS_SPACE`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeSet {
    ranges: ArrayVec<(u32, u32), MAX_RANGES>,
}

#[derive(Copy, Clone)]
enum Rounding {
    /// Enable every block that any range touches.
    Widen,
    /// Enable only blocks that are fully covered.
    Narrow,
}

impl RangeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `region` to the set.
    pub fn insert(&mut self, region: Region) -> Result<(), Error> {
        let end = region.end().ok_or_else(|| fail!(Error::OutOfRange))?;
        check!(end <= ADDRESS_SPACE, Error::OutOfRange);
        if region.len == 0 {
            return Ok(());
        }
        self.ranges
            .try_push((region.ptr.address, end))
            .map_err(|_| fail!(Error::TooManyRanges))
    }

    /// Returns whether `addr` is in the set.
    pub fn contains(&self, addr: u32) -> bool {
        self.ranges.iter().any(|&(s, e)| s <= addr && addr < e)
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns the ranges in this set, in insertion order.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.ranges.iter().map(|&(s, e)| Region::new(s, e - s))
    }

    /// Sorts and coalesces the ranges.
    fn merged(&self) -> ArrayVec<(u32, u32), MAX_RANGES> {
        let mut sorted = self.ranges.clone();
        sorted.sort_unstable_by_key(|&(s, _)| s);

        let mut merged = ArrayVec::<(u32, u32), MAX_RANGES>::new();
        for (s, e) in sorted {
            match merged.last_mut() {
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                // Cannot overflow: `merged` is no longer than `sorted`.
                _ => merged.push((s, e)),
            }
        }
        merged
    }

    fn image(&self, rounding: Rounding) -> PrivilegeImage {
        let mut words = [0; PRIV_WORDS];
        for (s, e) in self.merged() {
            let (first, last) = match rounding {
                Rounding::Widen => (s / PRIV_BLOCK, (e + PRIV_BLOCK - 1) / PRIV_BLOCK),
                Rounding::Narrow => ((s + PRIV_BLOCK - 1) / PRIV_BLOCK, e / PRIV_BLOCK),
            };
            for block in first..last {
                words[block as usize / 32] |= 1 << (block % 32);
            }
        }
        words
    }
}

/// Read and write privileges over the SPI flash address space.
///
/// Everything is denied until allowed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressPrivileges {
    read: RangeSet,
    write: RangeSet,
}

impl AddressPrivileges {
    /// Creates a deny-all table pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows the host to read `region`.
    pub fn allow_read(&mut self, region: Region) -> Result<(), Error> {
        self.read.insert(region)
    }

    /// Allows the host to write `region`.
    pub fn allow_write(&mut self, region: Region) -> Result<(), Error> {
        self.write.insert(region)
    }

    /// Returns whether the host may read `addr`.
    pub fn is_read_allowed(&self, addr: u32) -> bool {
        self.read.contains(addr)
    }

    /// Returns whether the host may write `addr`.
    ///
    /// This is byte precise. The programmed write table only grants whole
    /// [`PRIV_BLOCK`]s, so hardware refuses writes to a range that does not
    /// cover its block; see [`AddressPrivileges::is_write_enforced()`].
    pub fn is_write_allowed(&self, addr: u32) -> bool {
        self.write.contains(addr)
    }

    /// Returns whether the rendered write table lets the host write `addr`.
    pub fn is_write_enforced(&self, addr: u32) -> bool {
        image_grants(&self.write_image(), addr)
    }

    /// The readable ranges.
    pub fn readable(&self) -> &RangeSet {
        &self.read
    }

    /// The writable ranges.
    pub fn writable(&self) -> &RangeSet {
        &self.write
    }

    /// Renders the read table; any block touched by a readable range is
    /// enabled.
    pub fn read_image(&self) -> PrivilegeImage {
        self.read.image(Rounding::Widen)
    }

    /// Renders the write table; only blocks entirely covered by writable
    /// ranges are enabled.
    pub fn write_image(&self) -> PrivilegeImage {
        self.write.image(Rounding::Narrow)
    }
}

/// The SPI half of a filter policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpiPolicy {
    /// The SPI monitor this policy is for.
    pub device: u8,
    /// The allowed opcodes.
    pub commands: CommandTable,
    /// The allowed addresses.
    pub privileges: AddressPrivileges,
}

impl SpiPolicy {
    /// Creates a deny-all policy for `device`.
    pub fn deny_all(device: u8) -> Self {
        Self {
            device,
            commands: CommandTable::new(),
            privileges: AddressPrivileges::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bit(image: &PrivilegeImage, block: u32) -> bool {
        image[block as usize / 32] >> (block % 32) & 1 != 0
    }

    #[test]
    fn chip_erase_is_never_allowed() {
        let mut table = CommandTable::new();
        for &cmd in &[0xc7, 0x60] {
            assert_eq!(
                table.add(cmd, Validity::Always).unwrap_err().into_inner(),
                Error::CommandNotAllowed(cmd)
            );
            assert!(!table.contains(cmd));
        }
        assert_eq!(table.words(), &[0; CMD_TABLE_LEN]);
    }

    #[test]
    fn slot_assignment() {
        let mut table = CommandTable::new();
        assert_eq!(table.add(0x03, Validity::Always).unwrap(), 4);
        assert_eq!(table.add(CMD_EX4B, Validity::Always).unwrap(), 1);
        assert_eq!(table.add(CMD_EN4B, Validity::Once).unwrap(), 0);
        assert_eq!(table.add(0x02, Validity::Always).unwrap(), 5);
        // Re-adding reuses the slot.
        assert_eq!(table.add(0x03, Validity::Once).unwrap(), 4);

        let w = table.words()[4];
        assert_eq!(w & 0xff, 0x03);
        assert_eq!(w & (VALID | VALID_ONCE), VALID_ONCE);
        assert_eq!(table.words()[0], CMD_EN4B as u32 | VALID_ONCE);
        assert!(table.contains(0x02));
        assert!(!table.contains(0x20));
    }

    #[test]
    fn every_safe_command_fits() {
        let mut table = CommandTable::new();
        for w in SAFE_COMMANDS {
            table.add(*w as u8, Validity::Always).unwrap();
        }
        for w in SAFE_COMMANDS {
            assert!(table.contains(*w as u8));
        }
    }

    #[test]
    fn locking() {
        let mut table = CommandTable::new();
        table.add(0x06, Validity::Always).unwrap();
        table.add(0x04, Validity::Always).unwrap();
        table.lock(0x06).unwrap();
        assert!(table.is_locked(0x06));
        assert!(!table.is_locked(0x04));

        assert_eq!(
            table.add(0x06, Validity::Once).unwrap_err().into_inner(),
            Error::Locked
        );
        assert_eq!(table.remove(0x06).unwrap_err().into_inner(), Error::Locked);
        assert!(table.contains(0x06));

        table.remove(0x04).unwrap();
        assert!(!table.contains(0x04));
        assert_eq!(table.lock(0x04).unwrap_err().into_inner(), Error::NotPresent);

        table.lock_all();
        assert_eq!(
            table.add(0x05, Validity::Always).unwrap_err().into_inner(),
            Error::Locked
        );
    }

    #[test]
    fn table_full() {
        let mut table = CommandTable::from_words([0x9f | VALID; CMD_TABLE_LEN]);
        assert_eq!(
            table.add(0x03, Validity::Always).unwrap_err().into_inner(),
            Error::TableFull
        );
    }

    #[test]
    fn byte_precise_privileges() {
        let mut privs = AddressPrivileges::new();
        privs.allow_write(Region::new(0x1000, 0x1000)).unwrap();

        assert!(!privs.is_write_allowed(0x0fff));
        assert!(privs.is_write_allowed(0x1000));
        assert!(privs.is_write_allowed(0x1fff));
        assert!(!privs.is_write_allowed(0x2000));
        assert!(!privs.is_read_allowed(0x1000));

        // Too small to cover any 16 KiB block.
        assert_eq!(privs.write_image(), [0; PRIV_WORDS]);
        assert!(!privs.is_write_enforced(0x1000));
    }

    #[test]
    fn enforced_writes_need_whole_blocks() {
        let mut privs = AddressPrivileges::new();
        privs.allow_write(Region::new(0x4000, 0x5000)).unwrap();

        for addr in [0x4000, 0x7fff] {
            assert!(privs.is_write_allowed(addr));
            assert!(privs.is_write_enforced(addr));
        }
        // [0x8000, 0x9000) is allowed but its block is not fully covered.
        assert!(privs.is_write_allowed(0x8000));
        assert!(!privs.is_write_enforced(0x8000));
        assert!(!privs.is_write_enforced(0x3fff));
        assert!(!privs.is_write_enforced(ADDRESS_SPACE));
    }

    #[test]
    fn images_round_outwards_for_reads() {
        let mut privs = AddressPrivileges::new();
        privs.allow_read(Region::new(0x3000, 0x6000)).unwrap();
        privs.allow_write(Region::new(0x3000, 0x6000)).unwrap();

        let read = privs.read_image();
        assert!(bit(&read, 0));
        assert!(bit(&read, 1));
        assert!(bit(&read, 2));
        assert!(!bit(&read, 3));

        // Only [0x4000, 0x8000) is fully covered.
        let write = privs.write_image();
        assert!(!bit(&write, 0));
        assert!(bit(&write, 1));
        assert!(!bit(&write, 2));
    }

    #[test]
    fn adjacent_ranges_merge() {
        let mut privs = AddressPrivileges::new();
        privs.allow_write(Region::new(0x6000, 0x2000)).unwrap();
        privs.allow_write(Region::new(0x4000, 0x2000)).unwrap();
        privs.allow_write(Region::new(0x7000, 0x1000)).unwrap();
        assert!(bit(&privs.write_image(), 1));

        privs
            .allow_write(Region::new(ADDRESS_SPACE - PRIV_BLOCK, PRIV_BLOCK))
            .unwrap();
        assert_eq!(privs.write_image()[PRIV_WORDS - 1], 1 << 31);
    }

    #[test]
    fn range_limits() {
        let mut set = RangeSet::new();
        assert_eq!(
            set.insert(Region::new(ADDRESS_SPACE, 1))
                .unwrap_err()
                .into_inner(),
            Error::OutOfRange
        );
        for i in 0..MAX_RANGES as u32 {
            set.insert(Region::new(i * 0x10, 8)).unwrap();
        }
        assert_eq!(
            set.insert(Region::new(0x10000, 8)).unwrap_err().into_inner(),
            Error::TooManyRanges
        );
        assert_eq!(set.regions().count(), MAX_RANGES);
    }
}
