// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Platform Firmware Manifest bodies.
//!
//! A PFM body lists the firmware a platform may run. Two layouts exist,
//! distinguished by the container's magic number:
//!
//! - [`Legacy`] manifests describe a single firmware with no id, and only
//!   support hash-verified images.
//! - [`V2`] manifests describe any number of named firmware components,
//!   followed by a list of SMBus filtering rules.
//!
//! Both layouts share the same records below the firmware level. Encoded as
//! pseudo-Rust, with little-endian integers unless noted and `_` for reserved
//! or padding bytes:
//!
//! ```ignore
//! struct Version {
//!     image_count: u8,
//!     rw_count: u8,
//!     version_len: u8,
//!     _: u8,
//!     version_addr: u32,
//!     version: [u8; self.version_len],
//!     _: [u8; /* pad to 4 */],
//!     rw_regions: [RwRegion; self.rw_count],
//!     images: [Image; self.image_count],
//! }
//!
//! struct RwRegion {
//!     flags: u8,
//!     _: [u8; 3],
//!     start: u32,
//!     end: u32,
//! }
//!
//! struct Image {
//!     hash_type: u8,
//!     region_count: u8,
//!     flags: u8,
//!     _: u8,
//!     // If `flags` has `ImageFlag::Signed`:
//!     signature: [u8; 256],
//!     key: [u8; 450],
//!     // Otherwise:
//!     hash: [u8; /* digest length */],
//!
//!     regions: [(u32be, u32be); self.region_count],
//! }
//! ```
//!
//! [`Manifest::parse()`] validates an entire manifest up front, so a
//! [`Manifest`] value is known to be well-formed. The views it hands out
//! borrow from the underlying buffer and are decoded on demand.

use core::marker::PhantomData;

use enumflags2::bitflags;
use enumflags2::BitFlags;

use crate::crypto::hash;
use crate::crypto::key::PublicKey;
use crate::crypto::key::IMAGE_KEY_LEN;
use crate::hardware::flash::Region;
use crate::io::Read as _;
use crate::io::ReadZero as _;
use crate::manifest::Container;
use crate::manifest::Error;
use crate::manifest::ManifestType;
use crate::wire::WireEnum;
use crate::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use crate::manifest::verifier::verify_image;

/// The firmware id reported for the single firmware of a legacy manifest.
pub const NO_FW_IDS: Option<&[u8]> = None;

/// The length of an image signature.
pub const IMAGE_SIG_LEN: usize = 256;

/// The length of an encoded [`RwRegion`].
pub const RW_REGION_LEN: usize = 12;

/// The length of an encoded image region.
pub const IMAGE_REGION_LEN: usize = 8;

/// The length of an encoded [`SmbusRule`].
pub const SMBUS_RULE_LEN: usize = 40;

/// The only supported SMBus rule definition type.
pub const SMBUS_RULE_DEFINITION: u8 = 2;

/// Firmware flag: some version of this firmware has a signature-verified
/// image.
pub const FW_FLAG_SIGNED_IMAGES: u8 = 0b1;

/// Skips the zero padding that follows a `len`-byte record prefix.
fn skip_pad(r: &mut &[u8], len: usize) -> Result<(), Error> {
    r.skip((4 - len % 4) % 4)?;
    Ok(())
}

fn check_id(id: &[u8]) -> Result<(), Error> {
    check!(
        !id.is_empty() && id.iter().all(|&b| b == b' ' || b.is_ascii_graphic()),
        Error::BadId
    );
    Ok(())
}

/// A record that can be decoded from the front of a manifest body.
pub trait Record<'m>: Sized {
    /// Decodes and validates a record, advancing `r` past it.
    fn read(r: &mut &'m [u8]) -> Result<Self, Error>;
}

/// An iterator over `count` consecutive records.
///
/// Iteration stops after the first error.
#[derive(Debug)]
pub struct Records<'m, T> {
    bytes: &'m [u8],
    count: usize,
    _ph: PhantomData<fn() -> T>,
}

impl<'m, T> Records<'m, T> {
    fn new(bytes: &'m [u8], count: usize) -> Self {
        Self {
            bytes,
            count,
            _ph: PhantomData,
        }
    }

    /// Returns an iterator over no records.
    pub fn empty() -> Self {
        Self::new(&[], 0)
    }
}

impl<T> Clone for Records<'_, T> {
    fn clone(&self) -> Self {
        Self::new(self.bytes, self.count)
    }
}

impl<'m, T: Record<'m>> Iterator for Records<'m, T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.count == 0 {
            return None;
        }
        self.count -= 1;
        let item = T::read(&mut self.bytes);
        if item.is_err() {
            self.count = 0;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count))
    }
}

/// Reads `count` records of `T`, returning the bytes they span.
fn walk<'m, T: Record<'m>>(
    r: &mut &'m [u8],
    count: usize,
    mut each: impl FnMut(T) -> Result<(), Error>,
) -> Result<&'m [u8], Error> {
    let start = *r;
    for _ in 0..count {
        each(T::read(r)?)?;
    }
    Ok(&start[..start.len() - r.len()])
}

/// A parsed PFM.
#[derive(Copy, Clone, Debug)]
pub enum Manifest<'m> {
    /// A legacy-format manifest.
    Legacy(Legacy<'m>),
    /// A V2-format manifest.
    V2(V2<'m>),
}

/// The body of a legacy-format manifest.
#[derive(Copy, Clone, Debug)]
pub struct Legacy<'m> {
    container: Container<'m>,
    platform_id: &'m [u8],
    version_count: u8,
    versions: &'m [u8],
}

/// The body of a V2-format manifest.
#[derive(Copy, Clone, Debug)]
pub struct V2<'m> {
    container: Container<'m>,
    platform_id: &'m [u8],
    blank: u8,
    fw_count: u8,
    firmware: &'m [u8],
    rule_count: u8,
    rules: &'m [u8],
}

impl<'m> Manifest<'m> {
    /// Parses and fully validates a manifest.
    ///
    /// `bytes` must be exactly the manifest, signature included. The
    /// signature itself is not checked; see [`super::reader::PfmFlash`].
    pub fn parse(bytes: &'m [u8]) -> Result<Self, Error> {
        let container = Container::parse(bytes)?;
        let mut r = container.body();

        let id_len = r.read_le::<u8>()? as usize;
        let _ = r.read_le::<u8>()?;
        let platform_id = r.read_slice(id_len)?;
        check_id(platform_id)?;
        skip_pad(&mut r, 2 + id_len)?;

        let manifest = match container.header().manifest_type {
            ManifestType::Legacy => {
                let version_count = r.read_le::<u8>()?;
                r.skip(3)?;
                let versions = walk(
                    &mut r,
                    version_count as usize,
                    |v: Version| {
                        check!(
                            !v.has_signed_images(),
                            Error::SignedImageInLegacy
                        );
                        Ok(())
                    },
                )?;
                Manifest::Legacy(Legacy {
                    container,
                    platform_id,
                    version_count,
                    versions,
                })
            }
            ManifestType::V2 => {
                let blank = r.read_le::<u8>()?;
                let fw_count = r.read_le::<u8>()?;
                r.skip(2)?;
                let firmware =
                    walk(&mut r, fw_count as usize, |_: Firmware| Ok(()))?;

                let mut fws = Records::<Firmware>::new(firmware, 0);
                for fw in Records::<Firmware>::new(firmware, fw_count as usize) {
                    let id = fw?.id;
                    for other in fws.clone() {
                        check!(other?.id != id, Error::BadId);
                    }
                    fws.count += 1;
                }

                let rule_count = r.read_le::<u8>()?;
                r.skip(3)?;
                let rules =
                    walk(&mut r, rule_count as usize, |_: SmbusRule| Ok(()))?;

                Manifest::V2(V2 {
                    container,
                    platform_id,
                    blank,
                    fw_count,
                    firmware,
                    rule_count,
                    rules,
                })
            }
        };

        check!(r.is_empty(), Error::TrailingBytes);
        Ok(manifest)
    }

    /// The container this manifest was parsed from.
    pub fn container(&self) -> &Container<'m> {
        match self {
            Self::Legacy(m) => &m.container,
            Self::V2(m) => &m.container,
        }
    }

    /// The manifest format.
    pub fn manifest_type(&self) -> ManifestType {
        match self {
            Self::Legacy(_) => ManifestType::Legacy,
            Self::V2(_) => ManifestType::V2,
        }
    }

    /// The manifest's id.
    pub fn id(&self) -> u32 {
        self.container().header().id
    }

    /// The platform id, without any terminator.
    pub fn platform_id(&self) -> &'m [u8] {
        match self {
            Self::Legacy(m) => m.platform_id,
            Self::V2(m) => m.platform_id,
        }
    }

    /// The value of an erased byte on the protected flash.
    pub fn blank_byte(&self) -> u8 {
        match self {
            Self::Legacy(_) => crate::hardware::flash::ERASED_BYTE,
            Self::V2(m) => m.blank,
        }
    }

    /// Returns whether this manifest authorizes nothing.
    ///
    /// A legacy manifest is empty if it lists no versions; a V2 manifest is
    /// empty if it lists no firmware.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Legacy(m) => m.version_count == 0,
            Self::V2(m) => m.fw_count == 0,
        }
    }

    /// Returns an iterator over the firmware this manifest describes.
    pub fn firmware(&self) -> Firmwares<'m> {
        match self {
            Self::Legacy(m) => Firmwares::Legacy(Some(m.implicit_firmware())),
            Self::V2(m) => Firmwares::V2(Records::new(
                m.firmware,
                m.fw_count as usize,
            )),
        }
    }

    /// Looks up a firmware by id.
    ///
    /// Legacy manifests have exactly one firmware and ignore `id`. V2
    /// manifests require one.
    pub fn find_firmware(&self, id: Option<&[u8]>) -> Result<Firmware<'m>, Error> {
        match (self, id) {
            (Self::Legacy(m), _) => Ok(m.implicit_firmware()),
            (Self::V2(_), None) => Err(fail!(Error::InvalidArgument)),
            (Self::V2(_), Some(id)) => {
                for fw in self.firmware() {
                    let fw = fw?;
                    if fw.id == Some(id) {
                        return Ok(fw);
                    }
                }
                Err(fail!(Error::UnknownFirmware))
            }
        }
    }

    /// Returns the versions allowed for a firmware.
    pub fn supported_versions(
        &self,
        fw: Option<&[u8]>,
    ) -> Result<Records<'m, Version<'m>>, Error> {
        Ok(self.find_firmware(fw)?.versions())
    }

    /// Looks up a specific version of a firmware.
    pub fn find_version(
        &self,
        fw: Option<&[u8]>,
        version: &[u8],
    ) -> Result<Version<'m>, Error> {
        self.find_firmware(fw)?.find_version(version)
    }

    /// Returns the read-write regions of a firmware version.
    pub fn read_write_regions(
        &self,
        fw: Option<&[u8]>,
        version: &[u8],
    ) -> Result<Records<'m, RwRegion>, Error> {
        Ok(self.find_version(fw, version)?.rw_regions())
    }

    /// Returns the images of a firmware version.
    pub fn firmware_images(
        &self,
        fw: Option<&[u8]>,
        version: &[u8],
    ) -> Result<Records<'m, Image<'m>>, Error> {
        Ok(self.find_version(fw, version)?.images())
    }

    /// Returns the SMBus filtering rules. Legacy manifests have none.
    pub fn smbus_rules(&self) -> Records<'m, SmbusRule<'m>> {
        match self {
            Self::Legacy(_) => Records::empty(),
            Self::V2(m) => Records::new(m.rules, m.rule_count as usize),
        }
    }
}

impl<'m> Legacy<'m> {
    fn implicit_firmware(&self) -> Firmware<'m> {
        Firmware {
            id: NO_FW_IDS,
            flags: 0,
            version_count: self.version_count,
            versions: self.versions,
        }
    }
}

/// An iterator over the firmware of a [`Manifest`].
#[derive(Debug)]
pub enum Firmwares<'m> {
    /// The single firmware of a legacy manifest.
    Legacy(Option<Firmware<'m>>),
    /// The firmware list of a V2 manifest.
    V2(Records<'m, Firmware<'m>>),
}

impl<'m> Iterator for Firmwares<'m> {
    type Item = Result<Firmware<'m>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Legacy(fw) => fw.take().map(Ok),
            Self::V2(fws) => fws.next(),
        }
    }
}

/// A firmware component.
#[derive(Copy, Clone, Debug)]
pub struct Firmware<'m> {
    id: Option<&'m [u8]>,
    flags: u8,
    version_count: u8,
    versions: &'m [u8],
}

impl<'m> Record<'m> for Firmware<'m> {
    fn read(r: &mut &'m [u8]) -> Result<Self, Error> {
        let version_count = r.read_le::<u8>()?;
        let id_len = r.read_le::<u8>()? as usize;
        let flags = r.read_le::<u8>()?;
        let _ = r.read_le::<u8>()?;

        let id = r.read_slice(id_len)?;
        check_id(id)?;
        skip_pad(r, id_len)?;

        let mut has_signed = false;
        let versions = walk(r, version_count as usize, |v: Version| {
            has_signed |= v.has_signed_images();
            Ok(())
        })?;
        check!(
            (flags & FW_FLAG_SIGNED_IMAGES != 0) == has_signed,
            Error::BadFlags
        );

        Ok(Self {
            id: Some(id),
            flags,
            version_count,
            versions,
        })
    }
}

impl<'m> Firmware<'m> {
    /// The firmware id; `None` for the firmware of a legacy manifest.
    pub fn id(&self) -> Option<&'m [u8]> {
        self.id
    }

    /// The raw firmware flags. Bits other than [`FW_FLAG_SIGNED_IMAGES`]
    /// are vendor-defined.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Returns an iterator over this firmware's allowed versions.
    pub fn versions(&self) -> Records<'m, Version<'m>> {
        Records::new(self.versions, self.version_count as usize)
    }

    /// Looks up a version by its version string.
    pub fn find_version(&self, version: &[u8]) -> Result<Version<'m>, Error> {
        for v in self.versions() {
            let v = v?;
            if v.version == version {
                return Ok(v);
            }
        }
        Err(fail!(Error::UnknownVersion))
    }
}

/// An allowed firmware version.
#[derive(Copy, Clone, Debug)]
pub struct Version<'m> {
    address: u32,
    version: &'m [u8],
    rw_count: u8,
    rw: &'m [u8],
    image_count: u8,
    images: &'m [u8],
    has_signed: bool,
}

impl<'m> Record<'m> for Version<'m> {
    fn read(r: &mut &'m [u8]) -> Result<Self, Error> {
        let image_count = r.read_le::<u8>()?;
        let rw_count = r.read_le::<u8>()?;
        let version_len = r.read_le::<u8>()? as usize;
        let _ = r.read_le::<u8>()?;
        check!(version_len > 0, Error::BadLength);

        let address = r.read_le::<u32>()?;
        let version = r.read_slice(version_len)?;
        skip_pad(r, version_len)?;

        let rw = walk(r, rw_count as usize, |_: RwRegion| Ok(()))?;

        let mut has_signed = false;
        let images = walk(r, image_count as usize, |i: Image| {
            has_signed |= i.is_signed();
            Ok(())
        })?;

        Ok(Self {
            address,
            version,
            rw_count,
            rw,
            image_count,
            images,
            has_signed,
        })
    }
}

impl<'m> Version<'m> {
    /// The address at which the running firmware reports its version.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// The version string.
    pub fn version(&self) -> &'m [u8] {
        self.version
    }

    /// Returns an iterator over the regions the host may write while running
    /// this version.
    pub fn rw_regions(&self) -> Records<'m, RwRegion> {
        Records::new(self.rw, self.rw_count as usize)
    }

    /// Returns an iterator over the images making up this version.
    pub fn images(&self) -> Records<'m, Image<'m>> {
        Records::new(self.images, self.image_count as usize)
    }

    /// Returns whether any image of this version is signature-verified.
    pub fn has_signed_images(&self) -> bool {
        self.has_signed
    }
}

wire_enum! {
    /// What to do when a read-write region fails validation.
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub enum RwFailurePolicy: u8 {
        /// Leave the region alone.
        DoNothing = 0b00,
        /// Restore the region from the recovery image.
        RestoreFromRecovery = 0b01,
        /// Erase the region.
        Erase = 0b10,
    }
}

/// RW region flag: writable only while an update is in progress.
pub const RW_FLAG_UPDATE_ONLY: u8 = 0b100;

/// A region the host may write.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RwRegion {
    /// What to do if this region fails validation.
    pub policy: RwFailurePolicy,
    /// Whether the region is writable only during an update.
    pub update_only: bool,
    /// The region itself.
    pub region: Region,
}

impl<'m> Record<'m> for RwRegion {
    fn read(r: &mut &'m [u8]) -> Result<Self, Error> {
        let flags = r.read_le::<u8>()?;
        r.skip(3)?;
        let start = r.read_le::<u32>()?;
        let end = r.read_le::<u32>()?;

        check!(flags & !0b111 == 0, Error::BadFlags);
        let policy = RwFailurePolicy::from_wire_value(flags & 0b11)
            .ok_or_else(|| fail!(Error::BadFlags))?;
        let region = Region::from_bounds(start, end)
            .ok_or_else(|| fail!(Error::BadRange))?;

        Ok(Self {
            policy,
            update_only: flags & RW_FLAG_UPDATE_ONLY != 0,
            region,
        })
    }
}

/// A flag on an [`Image`].
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImageFlag {
    /// The image must be validated on every boot.
    ValidateOnBoot = 0b01,
    /// The image is signature-verified rather than hash-verified.
    Signed = 0b10,
}

/// How an [`Image`] is checked.
#[derive(Copy, Clone, Debug)]
pub enum ImageVerification<'m> {
    /// The digest of the image regions must equal this value.
    Hash(&'m [u8]),
    /// The digest of the image regions must be signed by `key`.
    Signature {
        /// The RSA signature over the digest.
        signature: &'m [u8],
        /// The key the signature is made with.
        key: PublicKey<'m>,
    },
}

/// A firmware image: a set of flash regions checked as a unit.
#[derive(Copy, Clone, Debug)]
pub struct Image<'m> {
    hash_type: hash::Algo,
    flags: BitFlags<ImageFlag>,
    verification: ImageVerification<'m>,
    region_count: u8,
    regions: &'m [u8],
}

impl<'m> Record<'m> for Image<'m> {
    fn read(r: &mut &'m [u8]) -> Result<Self, Error> {
        let raw_hash_type = r.read_le::<u8>()?;
        let region_count = r.read_le::<u8>()?;
        let raw_flags = r.read_le::<u8>()?;
        let _ = r.read_le::<u8>()?;

        let hash_type = hash::Algo::from_wire_value(raw_hash_type)
            .ok_or_else(|| fail!(Error::UnsupportedHashType(raw_hash_type)))?;
        let flags = BitFlags::<ImageFlag>::from_bits(raw_flags)
            .map_err(|_| fail!(Error::BadFlags))?;
        check!(region_count > 0, Error::BadLength);

        let verification = if flags.contains(ImageFlag::Signed) {
            let signature = r.read_slice(IMAGE_SIG_LEN)?;
            let key = PublicKey::from_blob(r.read_slice(IMAGE_KEY_LEN)?)?;
            check!(key.modulus().len() == IMAGE_SIG_LEN, Error::BadKey);
            ImageVerification::Signature { signature, key }
        } else {
            ImageVerification::Hash(r.read_slice(hash_type.bytes())?)
        };

        let regions = r.read_slice(region_count as usize * IMAGE_REGION_LEN)?;
        let mut seen = 0;
        for region in Records::<Region>::new(regions, region_count as usize) {
            let region = region?;
            for other in Records::<Region>::new(regions, seen) {
                check!(!other?.overlaps(region), Error::OverlappingRegions);
            }
            seen += 1;
        }

        Ok(Self {
            hash_type,
            flags,
            verification,
            region_count,
            regions,
        })
    }
}

/// Image regions are stored as big-endian `[start, end)` pairs.
impl<'m> Record<'m> for Region {
    fn read(r: &mut &'m [u8]) -> Result<Self, Error> {
        let start = r.read_be::<u32>()?;
        let end = r.read_be::<u32>()?;
        Region::from_bounds(start, end).ok_or_else(|| fail!(Error::BadRange))
    }
}

impl<'m> Image<'m> {
    /// The hash function used to digest the image.
    pub fn hash_type(&self) -> hash::Algo {
        self.hash_type
    }

    /// The image flags.
    pub fn flags(&self) -> BitFlags<ImageFlag> {
        self.flags
    }

    /// Returns whether the image must be validated on every boot.
    pub fn validate_on_boot(&self) -> bool {
        self.flags.contains(ImageFlag::ValidateOnBoot)
    }

    /// Returns whether this image is signature-verified.
    pub fn is_signed(&self) -> bool {
        self.flags.contains(ImageFlag::Signed)
    }

    /// How this image is checked.
    pub fn verification(&self) -> &ImageVerification<'m> {
        &self.verification
    }

    /// Returns an iterator over the flash regions making up this image.
    pub fn regions(&self) -> Records<'m, Region> {
        Records::new(self.regions, self.region_count as usize)
    }
}

/// An SMBus filtering rule: which register offsets of one device the host
/// may write.
#[derive(Copy, Clone, Debug)]
pub struct SmbusRule<'m> {
    bus_id: u8,
    rule_id: u8,
    device_address: u8,
    passlist: &'m [u8],
}

impl<'m> Record<'m> for SmbusRule<'m> {
    fn read(r: &mut &'m [u8]) -> Result<Self, Error> {
        let definition = r.read_le::<u8>()?;
        r.skip(4)?;
        let bus_id = r.read_le::<u8>()?;
        let rule_id = r.read_le::<u8>()?;
        let device_address = r.read_le::<u8>()?;
        let passlist = r.read_slice(32)?;

        check!(definition == SMBUS_RULE_DEFINITION, Error::BadSmbusRule);
        check!(device_address & 1 == 0, Error::BadSmbusRule);

        Ok(Self {
            bus_id,
            rule_id,
            device_address,
            passlist,
        })
    }
}

impl<'m> SmbusRule<'m> {
    /// The bus this rule applies to.
    pub fn bus_id(&self) -> u8 {
        self.bus_id
    }

    /// The rule's index in the hardware re-map table.
    pub fn rule_id(&self) -> u8 {
        self.rule_id
    }

    /// The device address, in 8-bit (write address) form.
    pub fn device_address(&self) -> u8 {
        self.device_address
    }

    /// The 256-bit command passlist, LSB-first within each byte.
    pub fn passlist(&self) -> &'m [u8] {
        self.passlist
    }

    /// Returns whether `offset` is on the passlist.
    pub fn permits(&self, offset: u8) -> bool {
        let byte = self.passlist[offset as usize / 8];
        byte >> (offset % 8) & 1 != 0
    }

    /// The passlist as eight little-endian words, as the I2C filter expects.
    pub fn passlist_words(&self) -> [u32; 8] {
        let mut words = [0; 8];
        for (word, bytes) in words.iter_mut().zip(self.passlist.chunks(4)) {
            *word = bytes
                .iter()
                .rev()
                .fold(0, |acc, &b| acc << 8 | b as u32);
        }
        words
    }
}

#[cfg(all(test, feature = "serde"))]
mod test {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::manifest::owned;

    fn parse_json(json: &str) -> Vec<u8> {
        let pfm: owned::Pfm = serde_json::from_str(json).unwrap();
        pfm.encode_with_signature(&[0x5a; 256]).unwrap()
    }

    fn collect<'m, T: Record<'m>>(r: Records<'m, T>) -> Vec<T> {
        r.collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn legacy() {
        #[rustfmt::skip]
        let bytes = parse_json(r#"{
            "format": "Legacy",
            "id": 7,
            "platform_id": "legacy platform",
            "firmware": [{
                "versions": [{
                    "version": "v1.0.0",
                    "address": "0x1000",
                    "rw_regions": [{
                        "policy": "Erase",
                        "start": "0x20000",
                        "end": "0x30000"
                    }],
                    "images": [{
                        "hash_type": "Sha256",
                        "hash": "000102030405060708090a0b0c0d0e0f000102030405060708090a0b0c0d0e0f",
                        "regions": [{ "start": "0x0", "end": "0x10000" }]
                    }]
                }]
            }]
        }"#);

        let pfm = Manifest::parse(&bytes).unwrap();
        assert_eq!(pfm.manifest_type(), ManifestType::Legacy);
        assert_eq!(pfm.id(), 7);
        assert_eq!(pfm.platform_id(), b"legacy platform");
        assert!(!pfm.is_empty());

        let fw = pfm.find_firmware(NO_FW_IDS).unwrap();
        assert_eq!(fw.id(), None);
        // Legacy manifests ignore the requested id.
        assert!(pfm.find_firmware(Some(b"anything")).is_ok());

        let rws = collect(pfm.read_write_regions(None, b"v1.0.0").unwrap());
        assert_eq!(
            rws,
            vec![RwRegion {
                policy: RwFailurePolicy::Erase,
                update_only: false,
                region: Region::new(0x20000, 0x10000),
            }]
        );

        let images = collect(pfm.firmware_images(None, b"v1.0.0").unwrap());
        assert_eq!(images.len(), 1);
        assert!(!images[0].is_signed());
        assert_eq!(collect(images[0].regions()), vec![Region::new(0, 0x10000)]);

        assert_eq!(
            pfm.find_version(None, b"v2").unwrap_err().into_inner(),
            Error::UnknownVersion
        );
        assert_eq!(pfm.smbus_rules().count(), 0);
    }

    #[test]
    fn v2_lookups() {
        #[rustfmt::skip]
        let bytes = parse_json(r#"{
            "format": "V2",
            "id": 1,
            "platform_id": "SKU-1",
            "blank": "0xff",
            "firmware": [
                {
                    "id": "bmc",
                    "versions": [
                        { "version": "1.0", "address": "0x0", "rw_regions": [], "images": [] },
                        { "version": "1.1", "address": "0x0", "rw_regions": [], "images": [] }
                    ]
                },
                {
                    "id": "pch",
                    "flags": "0x80",
                    "versions": []
                }
            ],
            "smbus_rules": [{
                "bus_id": 1,
                "rule_id": 0,
                "device_address": "0xa0",
                "passlist": "0300000000000000000000000000000000000000000000000000000000000080"
            }]
        }"#);

        let pfm = Manifest::parse(&bytes).unwrap();
        assert_eq!(pfm.manifest_type(), ManifestType::V2);
        assert_eq!(pfm.firmware().count(), 2);

        let versions = collect(pfm.supported_versions(Some(b"bmc")).unwrap());
        let names = versions.iter().map(|v| v.version()).collect::<Vec<_>>();
        assert_eq!(names, vec![&b"1.0"[..], &b"1.1"[..]]);

        let pch = pfm.find_firmware(Some(b"pch")).unwrap();
        assert_eq!(pch.flags(), 0x80);
        assert_eq!(pch.versions().count(), 0);

        assert_eq!(
            pfm.find_firmware(None).unwrap_err().into_inner(),
            Error::InvalidArgument
        );
        assert_eq!(
            pfm.find_firmware(Some(b"me")).unwrap_err().into_inner(),
            Error::UnknownFirmware
        );

        let rules = collect(pfm.smbus_rules());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].device_address(), 0xa0);
        assert!(rules[0].permits(0) && rules[0].permits(1));
        assert!(!rules[0].permits(2));
        assert!(rules[0].permits(255));
        assert_eq!(rules[0].passlist_words()[0], 0x0000_0003);
        assert_eq!(rules[0].passlist_words()[7], 0x8000_0000);
    }

    #[test]
    fn empty() {
        let bytes = parse_json(
            r#"{ "format": "V2", "id": 1, "platform_id": "p", "firmware": [] }"#,
        );
        assert!(Manifest::parse(&bytes).unwrap().is_empty());

        let bytes = parse_json(
            r#"{ "format": "Legacy", "id": 1, "platform_id": "p", "firmware": [{ "versions": [] }] }"#,
        );
        assert!(Manifest::parse(&bytes).unwrap().is_empty());
    }

    fn legacy_with_region(start: u32, end: u32) -> Vec<u8> {
        let json = format!(
            r#"{{
            "format": "Legacy", "id": 1, "platform_id": "p",
            "firmware": [{{ "versions": [{{
                "version": "1", "address": "0x0", "rw_regions": [],
                "images": [{{
                    "hash_type": "Sha256",
                    "hash": "{}",
                    "regions": [{{ "start": {}, "end": {} }}]
                }}]
            }}] }}]
        }}"#,
            "00".repeat(32),
            start,
            end
        );
        parse_json(&json)
    }

    /// Offset of the single image region in `legacy_with_region()`:
    /// header, platform header, version count, version header, address,
    /// version + pad, image header, hash.
    const REGION_OFFSET: usize = 12 + 4 + 4 + 4 + 4 + 4 + 4 + 32;

    #[test]
    fn rejects_bad_ranges() {
        let mut bytes = legacy_with_region(0x100, 0x200);
        assert!(Manifest::parse(&bytes).is_ok());
        assert_eq!(&bytes[REGION_OFFSET..REGION_OFFSET + 4], &[0, 0, 1, 0]);

        // end := start
        bytes[REGION_OFFSET + 4..REGION_OFFSET + 8]
            .copy_from_slice(&[0, 0, 1, 0]);
        assert_eq!(
            Manifest::parse(&bytes).unwrap_err().into_inner(),
            Error::BadRange
        );
    }

    #[test]
    fn rejects_truncation_and_magic() {
        let bytes = legacy_with_region(0x100, 0x200);
        assert_eq!(
            Manifest::parse(&bytes[..bytes.len() - 1])
                .unwrap_err()
                .into_inner(),
            Error::Truncated
        );

        let mut bad = bytes.clone();
        bad[2..4].copy_from_slice(&[0xff, 0xff]);
        assert_eq!(
            Manifest::parse(&bad).unwrap_err().into_inner(),
            Error::BadMagic(0xffff)
        );

        // A version count that runs past the end of the body.
        let mut bad = bytes.clone();
        bad[16] = 2;
        assert_eq!(
            Manifest::parse(&bad).unwrap_err().into_inner(),
            Error::Truncated
        );
    }

    #[test]
    fn rejects_overlapping_regions() {
        #[rustfmt::skip]
        let pfm: owned::Pfm = serde_json::from_str(r#"{
            "format": "V2", "id": 1, "platform_id": "p",
            "firmware": [{ "id": "fw", "versions": [{
                "version": "1", "address": "0x0", "rw_regions": [],
                "images": [{
                    "hash_type": "Sha256",
                    "hash": "0000000000000000000000000000000000000000000000000000000000000000",
                    "regions": [
                        { "start": "0x0", "end": "0x2000" },
                        { "start": "0x1000", "end": "0x3000" }
                    ]
                }]
            }] }]
        }"#).unwrap();
        let bytes = pfm.encode_with_signature(&[0; 256]).unwrap();
        assert_eq!(
            Manifest::parse(&bytes).unwrap_err().into_inner(),
            Error::OverlappingRegions
        );
    }
}
