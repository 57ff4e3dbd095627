// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Flash-backed PFM access.
//!
//! [`PfmFlash`] caches a manifest out of a flash device into caller-provided
//! buffers and tracks whether it has been verified. Every query about the
//! manifest's contents requires a successful [`PfmFlash::verify()`]; only
//! the header-level data (id, platform id, signature) is available before
//! that.

use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::crypto::key::PublicKey;
use crate::crypto::key::MAX_SIG_LEN;
use crate::crypto::sig;
use crate::hardware::flash;
use crate::hardware::flash::Flash;
use crate::hardware::flash::Ptr;
use crate::manifest::container::Header;
use crate::manifest::container::HEADER_LEN;
use crate::manifest::pfm;
use crate::manifest::verifier;
use crate::manifest::verifier::Anchor;
use crate::manifest::verifier::State;
use crate::manifest::Error;
use crate::manifest::ManifestType;
use crate::Result;

/// The largest possible encoded public key blob.
pub const MAX_KEY_BLOB_LEN: usize = 2 + MAX_SIG_LEN + 1 + 0xff;

/// Caller-provided storage for a [`PfmFlash`].
pub struct Caches<'c> {
    /// Holds the whole manifest.
    pub manifest: &'c mut [u8],
    /// Holds the platform id plus a NUL terminator.
    pub platform_id: &'c mut [u8],
    /// Holds the manifest signature.
    pub signature: &'c mut [u8],
    /// Holds the V2 signing key blob; see [`MAX_KEY_BLOB_LEN`].
    pub key: &'c mut [u8],
}

/// A PFM stored in flash.
pub struct PfmFlash<'c, F> {
    flash: F,
    base: u32,
    caches: Caches<'c>,
    header: Option<Header>,
    id_len: usize,
    state: State,
}

impl<'c, F: Flash> PfmFlash<'c, F> {
    /// Creates a new, [`State::Empty`] reader for the manifest at `base` in
    /// `flash`.
    pub fn init(flash: F, base: u32, caches: Caches<'c>) -> Self {
        Self {
            flash,
            base,
            caches,
            header: None,
            id_len: 0,
            state: State::Empty,
        }
    }

    /// The current verification state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns whether the cached manifest has been verified.
    pub fn is_valid(&self) -> bool {
        self.state == State::Valid
    }

    /// Drops any cached manifest, returning to [`State::Empty`].
    pub fn reset(&mut self) {
        for cache in [
            &mut *self.caches.manifest,
            &mut *self.caches.platform_id,
            &mut *self.caches.signature,
            &mut *self.caches.key,
        ] {
            cache.iter_mut().for_each(|b| *b = 0);
        }
        self.header = None;
        self.id_len = 0;
        if self.state != State::Empty {
            trace!("pfm cache reset");
        }
        self.state = State::Empty;
    }

    fn addr(&self, offset: usize) -> Result<Ptr, Error> {
        let offset = offset as u32;
        self.base
            .checked_add(offset)
            .map(Ptr::new)
            .ok_or_else(|| fail!(Error::Flash(flash::Error::OutOfRange)))
    }

    /// Reads the manifest out of flash into the caches.
    ///
    /// Any previously cached manifest is discarded first, even if this
    /// function fails. On success, the reader is [`State::Loaded`].
    ///
    /// If the flash does not hold a manifest header at all, this fails with
    /// [`Error::NoManifest`] and the reader becomes [`State::Invalid`].
    pub fn load(&mut self) -> Result<(), Error> {
        self.reset();

        let mut raw = [0; HEADER_LEN];
        self.flash.read(self.addr(0)?, &mut raw)?;
        let base = self.base;
        let header = match Header::read_from(&raw[..]) {
            Ok(header) => header,
            Err(e) => {
                let e = match e.into_inner() {
                    Error::BadMagic(magic) => fail!(
                        Error::NoManifest,
                        "no manifest at {:#x} (magic {:#06x})",
                        base,
                        magic
                    ),
                    e => fail!(e),
                };
                if *e.as_ref() == Error::NoManifest {
                    self.state = State::Invalid;
                }
                return Err(e);
            }
        };

        let len = header.length as usize;
        check!(len <= self.caches.manifest.len(), Error::BufferTooSmall);
        let base = self.addr(0)?;
        let bytes = &mut self.caches.manifest[..len];
        self.flash.read(base, bytes)?;

        let body = &bytes[HEADER_LEN..header.signed_len()];
        let id_len = *body.first().ok_or_else(|| fail!(Error::Truncated))?;
        let id = body
            .get(2..2 + id_len as usize)
            .ok_or_else(|| fail!(Error::Truncated))?;
        let id_cache = self
            .caches
            .platform_id
            .get_mut(..id.len() + 1)
            .ok_or_else(|| fail!(Error::BufferTooSmall))?;
        id_cache[..id.len()].copy_from_slice(id);
        id_cache[id.len()] = 0;

        let sig = &bytes[header.signed_len()..];
        let sig_cache = self
            .caches
            .signature
            .get_mut(..sig.len())
            .ok_or_else(|| fail!(Error::BufferTooSmall))?;
        sig_cache.copy_from_slice(sig);

        self.id_len = id_len as usize;
        self.header = Some(header);
        self.state = State::Loaded;
        info!(
            "loaded pfm: id = {}, {} bytes at {:#x}",
            header.id, len, self.base
        );
        Ok(())
    }

    /// Reads the V2 signing key blob that follows the manifest in flash.
    fn load_key(&mut self, manifest_len: usize) -> Result<usize, Error> {
        let mut len = [0; 2];
        self.flash.read(self.addr(manifest_len)?, &mut len)?;
        let mod_len = u16::from_le_bytes(len) as usize;
        check!(mod_len <= MAX_SIG_LEN, Error::BadKey);

        let exp_len_at = 2 + mod_len;
        let mut exp_len = [0; 1];
        self.flash
            .read(self.addr(manifest_len + exp_len_at)?, &mut exp_len)?;
        let blob_len = exp_len_at + 1 + exp_len[0] as usize;

        let addr = self.addr(manifest_len)?;
        let blob = self
            .caches
            .key
            .get_mut(..blob_len)
            .ok_or_else(|| fail!(Error::BufferTooSmall))?;
        self.flash.read(addr, blob)?;
        Ok(blob_len)
    }

    /// Verifies the cached manifest.
    ///
    /// The SHA-256 digest of the signed extent must match `expected_hash`, if
    /// one is given, and must be signed by a key `anchor` trusts. The
    /// manifest must then parse successfully. On success the reader becomes
    /// [`State::Valid`]; on any failure, [`State::Invalid`].
    ///
    /// Legacy manifests can only be checked against [`Anchor::RootKey`].
    pub fn verify(
        &mut self,
        hasher: &mut impl hash::Engine,
        verifier: &mut impl sig::Verify,
        anchor: &Anchor,
        expected_hash: Option<&[u8]>,
    ) -> Result<(), Error> {
        let header = match (self.state, self.header) {
            (State::Loaded, Some(header)) => header,
            _ => return Err(fail!(Error::NoManifest)),
        };

        let result = self.verify_inner(
            &header,
            hasher,
            verifier,
            anchor,
            expected_hash,
        );
        match result {
            Ok(()) => {
                info!("pfm {} verified", header.id);
                self.state = State::Valid;
            }
            Err(_) => {
                warn!("pfm {} failed verification", header.id);
                self.state = State::Invalid;
            }
        }
        result
    }

    fn verify_inner(
        &mut self,
        header: &Header,
        hasher: &mut impl hash::Engine,
        verifier: &mut impl sig::Verify,
        anchor: &Anchor,
        expected_hash: Option<&[u8]>,
    ) -> Result<(), Error> {
        let len = header.length as usize;
        let key_len = match header.manifest_type {
            ManifestType::Legacy => None,
            ManifestType::V2 => Some(self.load_key(len)?),
        };

        let key = match (key_len, anchor) {
            (None, Anchor::RootKey(root)) => *root,
            (None, Anchor::KeyDigest(_)) => {
                return Err(fail!(Error::InvalidArgument))
            }
            (Some(key_len), anchor) => {
                let key = PublicKey::from_blob(&self.caches.key[..key_len])?;
                anchor.admits(&key, hasher)?;
                key
            }
        };

        let bytes = &self.caches.manifest[..len];
        let mut digest = [0; 32];
        verifier::verify_signed(
            hasher,
            verifier,
            &key,
            &bytes[..header.signed_len()],
            &bytes[header.signed_len()..],
            expected_hash,
            &mut digest,
        )?;

        pfm::Manifest::parse(bytes)?;
        Ok(())
    }

    fn loaded_header(&self) -> Result<&Header, Error> {
        match (self.state, &self.header) {
            (State::Loaded, Some(h)) | (State::Valid, Some(h)) => Ok(h),
            _ => Err(fail!(Error::NoManifest)),
        }
    }

    /// The manifest id. Available once loaded.
    pub fn get_id(&self) -> Result<u32, Error> {
        Ok(self.loaded_header()?.id)
    }

    /// The platform id, without its terminator. Available once loaded.
    pub fn get_platform_id(&self) -> Result<&[u8], Error> {
        self.loaded_header()?;
        Ok(&self.caches.platform_id[..self.id_len])
    }

    /// The manifest signature. Available once loaded.
    pub fn get_signature(&self) -> Result<&[u8], Error> {
        let sig_len = self.loaded_header()?.sig_length as usize;
        Ok(&self.caches.signature[..sig_len])
    }

    /// Computes the SHA-256 digest of the signed extent of the cached
    /// manifest, verified or not.
    pub fn get_hash(
        &self,
        hasher: &mut impl hash::Engine,
        out: &mut [u8],
    ) -> Result<(), Error> {
        let header = self
            .header
            .as_ref()
            .ok_or_else(|| fail!(Error::NoManifest))?;
        hasher
            .contiguous_hash(
                hash::Algo::Sha256,
                &self.caches.manifest[..header.signed_len()],
                out,
            )
            .map_err(|_| fail!(Error::InvalidArgument))
    }

    /// Returns the verified manifest.
    pub fn manifest(&self) -> Result<pfm::Manifest<'_>, Error> {
        match (self.state, &self.header) {
            (State::Valid, Some(h)) => {
                pfm::Manifest::parse(&self.caches.manifest[..h.length as usize])
            }
            _ => Err(fail!(Error::NoManifest)),
        }
    }

    /// Returns whether the verified manifest authorizes nothing.
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.manifest()?.is_empty())
    }

    /// Returns the firmware of the verified manifest.
    pub fn get_firmware(&self) -> Result<pfm::Firmwares<'_>, Error> {
        Ok(self.manifest()?.firmware())
    }

    /// Returns the versions a firmware may run.
    pub fn get_supported_versions(
        &self,
        fw: Option<&[u8]>,
    ) -> Result<pfm::Records<'_, pfm::Version<'_>>, Error> {
        self.manifest()?.supported_versions(fw)
    }

    /// Returns the regions the host may write while running a version.
    pub fn get_read_write_regions(
        &self,
        fw: Option<&[u8]>,
        version: &[u8],
    ) -> Result<pfm::Records<'_, pfm::RwRegion>, Error> {
        self.manifest()?.read_write_regions(fw, version)
    }

    /// Returns the images making up a version.
    pub fn get_firmware_images(
        &self,
        fw: Option<&[u8]>,
        version: &[u8],
    ) -> Result<pfm::Records<'_, pfm::Image<'_>>, Error> {
        self.manifest()?.firmware_images(fw, version)
    }

    /// Returns the underlying flash.
    pub fn flash(&self) -> &F {
        &self.flash
    }
}

#[cfg(all(test, feature = "serde"))]
mod test {
    use super::*;

    use testutil::data::keys;

    use crate::crypto::ring;
    use crate::hardware::fake;
    use crate::manifest::owned;

    const BASE: usize = 0x1000;

    struct Bufs {
        manifest: [u8; 2048],
        platform_id: [u8; 32],
        signature: [u8; 512],
        key: [u8; MAX_KEY_BLOB_LEN],
    }

    impl Bufs {
        fn new() -> Self {
            Self {
                manifest: [0; 2048],
                platform_id: [0; 32],
                signature: [0; 512],
                key: [0; MAX_KEY_BLOB_LEN],
            }
        }

        fn caches(&mut self) -> Caches<'_> {
            Caches {
                manifest: &mut self.manifest,
                platform_id: &mut self.platform_id,
                signature: &mut self.signature,
                key: &mut self.key,
            }
        }
    }

    fn signed(format: &str) -> (Vec<u8>, Vec<u8>) {
        #[rustfmt::skip]
        let pfm: owned::Pfm = serde_json::from_str(&format!(r#"{{
            "format": "{}",
            "id": 3,
            "platform_id": "rot-test",
            "firmware": [{{
                {}
                "versions": [{{
                    "version": "1.0",
                    "address": "0x0",
                    "rw_regions": [{{ "start": "0x1000", "end": "0x2000" }}],
                    "images": []
                }}]
            }}]
        }}"#, format, if format == "V2" { r#""id": "bmc","# } else { "" })).unwrap();

        let mut hasher = ring::hash::Engine::new();
        let mut signer =
            ring::rsa::Signer::from_pkcs8(keys::KEY1_RSA_KEYPAIR).unwrap();
        let bytes = pfm.sign(&mut hasher, &mut signer).unwrap();
        (bytes, signer.public_key_blob())
    }

    fn flash_with(bytes: &[u8], key: &[u8]) -> fake::Flash {
        let mut image = bytes.to_vec();
        image.extend_from_slice(key);
        fake::Flash::with_contents(0x4000, BASE, &image)
    }

    #[test]
    fn v2_root_key() {
        let (bytes, blob) = signed("V2");
        let key = PublicKey::from_blob(&blob).unwrap();
        let mut bufs = Bufs::new();
        let mut pfm =
            PfmFlash::init(flash_with(&bytes, &blob), BASE as u32, bufs.caches());
        assert_eq!(pfm.state(), State::Empty);
        assert!(pfm.get_id().is_err());

        pfm.load().unwrap();
        assert_eq!(pfm.state(), State::Loaded);
        assert_eq!(pfm.get_id().unwrap(), 3);
        assert_eq!(pfm.get_platform_id().unwrap(), b"rot-test");
        assert_eq!(pfm.get_signature().unwrap(), &bytes[bytes.len() - 256..]);
        assert_eq!(
            pfm.is_empty().unwrap_err().into_inner(),
            Error::NoManifest
        );

        let mut hasher = ring::hash::Engine::new();
        let mut verifier = ring::rsa::Verifier::new();
        pfm.verify(&mut hasher, &mut verifier, &Anchor::RootKey(key), None)
            .unwrap();
        assert!(pfm.is_valid());
        assert!(!pfm.is_empty().unwrap());

        let rws = pfm
            .get_read_write_regions(Some(b"bmc"), b"1.0")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rws[0].region, flash::Region::new(0x1000, 0x1000));
        assert_eq!(
            pfm.get_supported_versions(None).unwrap_err().into_inner(),
            Error::InvalidArgument
        );

        let mut hash = [0; 32];
        pfm.get_hash(&mut hasher, &mut hash).unwrap();
        pfm.verify(&mut hasher, &mut verifier, &Anchor::RootKey(key), None)
            .unwrap_err();

        pfm.load().unwrap();
        pfm.verify(
            &mut hasher,
            &mut verifier,
            &Anchor::RootKey(key),
            Some(&hash),
        )
        .unwrap();
    }

    #[test]
    fn v2_key_digest() {
        let (bytes, blob) = signed("V2");
        let mut hasher = ring::hash::Engine::new();
        let mut verifier = ring::rsa::Verifier::new();
        let mut digest = [0; 32];
        hasher
            .contiguous_hash(hash::Algo::Sha256, &blob, &mut digest)
            .unwrap();

        let mut bufs = Bufs::new();
        let mut pfm =
            PfmFlash::init(flash_with(&bytes, &blob), BASE as u32, bufs.caches());
        pfm.load().unwrap();
        pfm.verify(&mut hasher, &mut verifier, &Anchor::KeyDigest(&digest), None)
            .unwrap();
        assert!(pfm.is_valid());
    }

    #[test]
    fn bit_flips_invalidate() {
        let (bytes, blob) = signed("V2");
        let key = PublicKey::from_blob(&blob).unwrap();
        let mut hasher = ring::hash::Engine::new();
        let mut verifier = ring::rsa::Verifier::new();

        // Covered bytes, the signature, and the stored key.
        for &flip in &[20, bytes.len() - 1, bytes.len() + 40] {
            let mut flash = flash_with(&bytes, &blob);
            flash.contents_mut()[BASE + flip] ^= 0x01;

            let mut bufs = Bufs::new();
            let mut pfm = PfmFlash::init(flash, BASE as u32, bufs.caches());
            pfm.load().unwrap();
            let err = pfm
                .verify(&mut hasher, &mut verifier, &Anchor::RootKey(key), None)
                .unwrap_err();
            assert_eq!(err.into_inner(), Error::VerifyFailed);
            assert_eq!(pfm.state(), State::Invalid);
            assert_eq!(
                pfm.manifest().unwrap_err().into_inner(),
                Error::NoManifest
            );
            assert!(!hasher.is_busy());
        }
    }

    #[test]
    fn legacy_bit_flips_invalidate() {
        let (bytes, blob) = signed("Legacy");
        let key = PublicKey::from_blob(&blob).unwrap();
        let mut hasher = ring::hash::Engine::new();
        let mut verifier = ring::rsa::Verifier::new();

        for &flip in &[20, bytes.len() - 1] {
            let mut flash = flash_with(&bytes, &[]);
            flash.contents_mut()[BASE + flip] ^= 0x80;

            let mut bufs = Bufs::new();
            let mut pfm = PfmFlash::init(flash, BASE as u32, bufs.caches());
            pfm.load().unwrap();
            let err = pfm
                .verify(&mut hasher, &mut verifier, &Anchor::RootKey(key), None)
                .unwrap_err();
            assert_eq!(err.into_inner(), Error::VerifyFailed);
            assert_eq!(pfm.state(), State::Invalid);
            assert!(pfm.get_firmware().is_err());
        }
    }

    #[test]
    fn wrong_key() {
        let (bytes, blob) = signed("Legacy");
        let other =
            ring::rsa::Signer::from_pkcs8(keys::KEY2_RSA_KEYPAIR).unwrap();
        let other_blob = other.public_key_blob();
        let other_key = PublicKey::from_blob(&other_blob).unwrap();
        let key = PublicKey::from_blob(&blob).unwrap();
        let mut hasher = ring::hash::Engine::new();
        let mut verifier = ring::rsa::Verifier::new();

        let mut bufs = Bufs::new();
        let mut pfm =
            PfmFlash::init(flash_with(&bytes, &[]), BASE as u32, bufs.caches());
        pfm.load().unwrap();
        pfm.verify(
            &mut hasher,
            &mut verifier,
            &Anchor::RootKey(other_key),
            None,
        )
        .unwrap_err();
        assert_eq!(pfm.state(), State::Invalid);

        // A failed cycle does not leak into the next one.
        pfm.load().unwrap();
        assert_eq!(pfm.state(), State::Loaded);
        pfm.verify(&mut hasher, &mut verifier, &Anchor::RootKey(key), None)
            .unwrap();
        let fw = pfm.get_firmware().unwrap().next().unwrap().unwrap();
        assert_eq!(fw.id(), pfm::NO_FW_IDS);

        // Legacy manifests have no key to compare to a digest.
        pfm.load().unwrap();
        let err = pfm
            .verify(&mut hasher, &mut verifier, &Anchor::KeyDigest(&[0; 32]), None)
            .unwrap_err();
        assert_eq!(err.into_inner(), Error::InvalidArgument);
    }

    #[test]
    fn missing_manifest() {
        let mut bufs = Bufs::new();
        let mut pfm =
            PfmFlash::init(fake::Flash::new(0x4000), BASE as u32, bufs.caches());
        let err = pfm.load().unwrap_err();
        assert_eq!(err.code(), crate::status::MANIFEST_NO_MANIFEST);
        assert_eq!(err.into_inner(), Error::NoManifest);
        assert_eq!(pfm.state(), State::Invalid);
        assert_eq!(
            pfm.is_empty().unwrap_err().code(),
            crate::status::MANIFEST_NO_MANIFEST
        );

        // Garbage that is not a manifest header is reported the same way.
        let mut flash = fake::Flash::new(0x4000);
        flash.contents_mut()[BASE..BASE + 4]
            .copy_from_slice(&[0x00, 0x02, 0x34, 0x12]);
        let mut bufs = Bufs::new();
        let mut pfm = PfmFlash::init(flash, BASE as u32, bufs.caches());
        assert_eq!(pfm.load().unwrap_err().into_inner(), Error::NoManifest);
        assert_eq!(pfm.state(), State::Invalid);
    }

    #[test]
    fn small_buffers() {
        let (bytes, blob) = signed("V2");
        let mut manifest = [0; 64];
        let mut platform_id = [0; 32];
        let mut signature = [0; 512];
        let mut key = [0; 8];
        let caches = Caches {
            manifest: &mut manifest,
            platform_id: &mut platform_id,
            signature: &mut signature,
            key: &mut key,
        };
        let mut pfm = PfmFlash::init(flash_with(&bytes, &blob), BASE as u32, caches);
        assert_eq!(
            pfm.load().unwrap_err().into_inner(),
            Error::BufferTooSmall
        );
        assert_eq!(pfm.state(), State::Empty);
    }
}
