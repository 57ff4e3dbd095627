// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Root-of-trust sessions.
//!
//! A [`RotSession`] owns everything one verify-then-update cycle needs: the
//! manifest cache, the in-progress update, and the synthesized filter policy.
//! The crypto engines are process-wide singletons, so the session only
//! borrows them through [`Exclusive`] and claims them for the duration of a
//! verification; a session that finds an engine already claimed fails with
//! [`Error::Busy`] instead of waiting.

use crate::crypto::hash;
use crate::crypto::sig;
use crate::filter;
use crate::filter::driver::BusFilterDriver;
use crate::filter::Policy;
use crate::filter::Target;
use crate::hardware::flash::Flash;
use crate::hardware::flash::Region;
use crate::manifest;
use crate::manifest::reader::Caches;
use crate::manifest::reader::PfmFlash;
use crate::manifest::verifier::Anchor;
use crate::manifest::verifier::State;
use crate::status::Module;
use crate::status::Status;
use crate::sync;
use crate::sync::Exclusive;
use crate::update;
use crate::update::FlashUpdater;
use crate::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use crate::update::EraseGranularity;

/// Options for a [`RotSession`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Options {
    /// Where the manifest lives in the manifest store.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub manifest_addr: u32,
    /// The largest manifest the session will cache.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub max_manifest_len: u32,
    /// The longest platform id, including its terminator.
    pub max_platform_id: u32,
    /// The longest manifest signature.
    pub max_signature: u32,
    /// The part of host flash updates may target. Every update also has to
    /// land in a read-write region of the verified manifest.
    pub update_region: Region,
    /// The erase unit for updates.
    pub erase_granularity: EraseGranularity,
    /// Whether to erase the whole target region before the first write,
    /// rather than erasing ahead of each write.
    #[cfg_attr(feature = "serde", serde(default))]
    pub erase_all: bool,
    /// The SPI monitor guarding host flash.
    #[cfg_attr(feature = "serde", serde(default))]
    pub spi_device: u8,
    /// The filtered I2C bus.
    #[cfg_attr(feature = "serde", serde(default))]
    pub i2c_bus: u8,
}

/// A session error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates bad options or caches.
    InvalidArgument,

    /// Indicates that a shared engine was already claimed.
    Busy,

    /// Indicates an operation that requires a verified manifest.
    NotVerified,

    /// Indicates an attempt to apply a policy before synthesizing one.
    NotSynthesized,

    /// Indicates an attempt to start a second update.
    UpdateInProgress,

    /// Indicates an update target that is not a permitted read-write region.
    RegionNotWritable,

    /// Indicates a manifest error.
    Manifest(manifest::Error),

    /// Indicates a flash update error.
    Update(update::Error),

    /// Indicates a bus filter error.
    Filter(filter::Error),
}

impl From<sync::Error> for Error {
    fn from(e: sync::Error) -> Self {
        match e {
            sync::Error::Busy => Self::Busy,
        }
    }
}

impl From<manifest::Error> for Error {
    fn from(e: manifest::Error) -> Self {
        Self::Manifest(e)
    }
}

impl From<update::Error> for Error {
    fn from(e: update::Error) -> Self {
        Self::Update(e)
    }
}

impl From<filter::Error> for Error {
    fn from(e: filter::Error) -> Self {
        Self::Filter(e)
    }
}

debug_from!(Error => sync::Error, manifest::Error, update::Error, filter::Error);

impl Status for Error {
    fn module(&self) -> Module {
        match self {
            Self::Manifest(e) => e.module(),
            Self::Update(e) => e.module(),
            Self::Filter(e) => e.module(),
            _ => Module::Session,
        }
    }

    fn local_code(&self) -> u8 {
        match self {
            Self::InvalidArgument => 0x00,
            Self::Busy => 0x01,
            Self::NotVerified => 0x02,
            Self::NotSynthesized => 0x03,
            Self::UpdateInProgress => 0x04,
            Self::RegionNotWritable => 0x05,
            Self::Manifest(e) => e.local_code(),
            Self::Update(e) => e.local_code(),
            Self::Filter(e) => e.local_code(),
        }
    }
}

fn trim(buf: &mut [u8], len: u32) -> Result<&mut [u8], Error> {
    let have = buf.len();
    match buf.get_mut(..len as usize) {
        Some(buf) => Ok(buf),
        None => Err(fail!(
            Error::InvalidArgument,
            "cache of {} bytes is smaller than {}",
            have,
            len
        )),
    }
}

/// One verify-then-update cycle of a root of trust.
///
/// `F` is the manifest store, `U` the host flash updates are written to, and
/// `H` and `V` the shared hash and signature engines.
pub struct RotSession<'s, F, U, H, V> {
    opts: Options,
    pfm: PfmFlash<'s, F>,
    hasher: &'s Exclusive<H>,
    verifier: &'s Exclusive<V>,
    // Exactly one of `host` and `update` holds the host flash.
    host: Option<U>,
    update: Option<FlashUpdater<U>>,
    policy: Option<Policy>,
}

impl<'s, F, U, H, V> RotSession<'s, F, U, H, V>
where
    F: Flash,
    U: Flash,
    H: hash::Engine,
    V: sig::Verify,
{
    /// Creates a session.
    ///
    /// Each cache must be at least as large as the corresponding limit in
    /// `opts`; the session only ever uses that much of it.
    pub fn new(
        opts: Options,
        store: F,
        host: U,
        caches: Caches<'s>,
        hasher: &'s Exclusive<H>,
        verifier: &'s Exclusive<V>,
    ) -> Result<Self, Error> {
        check!(opts.update_region.end().is_some(), Error::InvalidArgument);
        let caches = Caches {
            manifest: trim(caches.manifest, opts.max_manifest_len)?,
            platform_id: trim(caches.platform_id, opts.max_platform_id)?,
            signature: trim(caches.signature, opts.max_signature)?,
            key: caches.key,
        };

        let pfm = PfmFlash::init(store, opts.manifest_addr, caches);
        Ok(Self {
            opts,
            pfm,
            hasher,
            verifier,
            host: Some(host),
            update: None,
            policy: None,
        })
    }

    /// The options this session was created with.
    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// The manifest reader.
    pub fn pfm(&self) -> &PfmFlash<'s, F> {
        &self.pfm
    }

    /// The host flash, unless an update currently holds it.
    pub fn host(&self) -> Option<&U> {
        self.host.as_ref()
    }

    /// Loads the manifest from the store and verifies it against `anchor`.
    ///
    /// Both engines are claimed before anything else happens; if either is
    /// taken, the session is left untouched. Otherwise a new cycle begins:
    /// any in-progress update is released and any synthesized policy is
    /// discarded, whether or not verification then succeeds.
    pub fn load_and_verify(&mut self, anchor: &Anchor) -> Result<(), Error> {
        let (hasher, verifier) = (self.hasher, self.verifier);
        let mut hasher = hasher.try_claim()?;
        let mut verifier = verifier.try_claim()?;

        self.end_update();
        self.policy = None;
        self.pfm.load()?;
        self.pfm.verify(&mut *hasher, &mut *verifier, anchor, None)?;
        Ok(())
    }

    fn require_valid(&self) -> Result<(), Error> {
        if self.pfm.state() != State::Valid {
            return Err(fail!(Error::NotVerified));
        }
        Ok(())
    }

    fn update_target(
        &self,
        fw: Option<&[u8]>,
        version: &[u8],
        region_index: usize,
    ) -> Result<Region, Error> {
        self.require_valid()?;
        check!(self.update.is_none(), Error::UpdateInProgress);

        let rw = match self
            .pfm
            .get_read_write_regions(fw, version)?
            .nth(region_index)
        {
            Some(rw) => rw?,
            None => return Err(fail!(Error::RegionNotWritable)),
        };
        check!(
            rw.region.is_within(self.opts.update_region),
            Error::RegionNotWritable
        );
        Ok(rw.region)
    }

    /// Starts an update of `len` bytes into the `region_index`th read-write
    /// region of version `version` of firmware `fw`.
    ///
    /// The region must also lie inside the configured update region.
    ///
    /// If the update cannot be prepared, for example because `len` does not
    /// fit the region, the session keeps the half-started update; it must
    /// be ended with [`RotSession::end_update()`] before another can begin.
    pub fn begin_update(
        &mut self,
        fw: Option<&[u8]>,
        version: &[u8],
        region_index: usize,
        len: u32,
    ) -> Result<&mut FlashUpdater<U>, Error> {
        let region = self.update_target(fw, version, region_index)?;
        let base = region.ptr.address;

        let flash = match self.host.take() {
            Some(flash) => flash,
            None => return Err(fail!(Error::UpdateInProgress)),
        };
        let updater = match FlashUpdater::try_init(
            flash,
            base,
            region.len,
            self.opts.erase_granularity,
        ) {
            Ok(updater) => updater,
            Err((flash, e)) => {
                self.host = Some(flash);
                return Err(e.cast());
            }
        };

        let erase_all = self.opts.erase_all;
        let updater = self.update.insert(updater);
        if erase_all {
            updater.prepare_for_update_erase_all(len)?;
        } else {
            updater.prepare_for_update(len)?;
        }

        info!("update of {} bytes into {:#x} started", len, base);
        Ok(updater)
    }

    /// The in-progress update, if any.
    pub fn updater(&mut self) -> Option<&mut FlashUpdater<U>> {
        self.update.as_mut()
    }

    /// Releases the in-progress update, if any, and takes back its flash.
    ///
    /// Returns whether there was an update to release. Data already written
    /// stays in flash.
    pub fn end_update(&mut self) -> bool {
        match self.update.take() {
            Some(mut updater) => {
                updater.release();
                self.host = Some(updater.into_flash());
                info!("update ended");
                true
            }
            None => false,
        }
    }

    /// Derives the filter policy for version `version` of firmware `fw` and
    /// stores it in the session.
    pub fn synthesize<D: BusFilterDriver + ?Sized>(
        &mut self,
        fw: Option<&[u8]>,
        version: &[u8],
        driver: &D,
    ) -> Result<&Policy, Error> {
        self.require_valid()?;
        let target = Target {
            spi_device: self.opts.spi_device,
            i2c_bus: self.opts.i2c_bus,
        };
        let policy =
            filter::synthesize(&self.pfm.manifest()?, fw, version, target, driver)?;
        Ok(self.policy.insert(policy))
    }

    /// Programs the stored policy into `driver`, locking it if `lock` is set.
    pub fn apply<D: BusFilterDriver + ?Sized>(
        &self,
        driver: &mut D,
        lock: bool,
    ) -> Result<(), Error> {
        let policy = match &self.policy {
            Some(p) => p,
            None => return Err(fail!(Error::NotSynthesized)),
        };
        filter::apply_spi(&policy.spi, driver, lock)?;
        filter::apply_i2c(&policy.i2c, driver, lock)?;
        Ok(())
    }

    /// The synthesized policy, if any.
    pub fn policy(&self) -> Option<&Policy> {
        self.policy.as_ref()
    }

    /// Ends the cycle: drops the cached manifest, releases any update, and
    /// forgets the policy.
    pub fn reset(&mut self) {
        self.pfm.reset();
        self.end_update();
        self.policy = None;
        trace!("session reset");
    }
}
