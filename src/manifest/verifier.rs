// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Manifest and image verification.
//!
//! A manifest is trusted once the SHA-256 digest of its signed extent has
//! been signed by a trusted key. Legacy manifests are checked directly
//! against a root key. V2 manifests carry their own key, stored in flash
//! right after the manifest, which must itself be vouched for by an
//! [`Anchor`].
//!
//! Failures are reported as a single [`Error::VerifyFailed`], whichever
//! check actually failed.

use crate::crypto;
use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::crypto::key::PublicKey;
use crate::crypto::sig;
use crate::hardware::flash::Flash;
use crate::hardware::flash::Ptr;
use crate::manifest::pfm::Image;
use crate::manifest::pfm::ImageVerification;
use crate::manifest::Error;
use crate::Result;

/// The verification state of a cached manifest.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Nothing is cached.
    Empty,
    /// A manifest header and platform id have been cached, but the manifest
    /// has not been verified.
    Loaded,
    /// The cached manifest has been verified and parsed.
    Valid,
    /// Verification of the cached manifest failed.
    Invalid,
}

/// A trust anchor for manifest verification.
#[derive(Copy, Clone, Debug)]
pub enum Anchor<'k> {
    /// A root public key. The manifest's signing key must be this key.
    RootKey(PublicKey<'k>),
    /// The SHA-256 digest of the encoded blob of the expected signing key.
    KeyDigest(&'k [u8]),
}

impl Anchor<'_> {
    /// Checks that `key` is vouched for by this anchor.
    pub fn admits(
        &self,
        key: &PublicKey,
        hasher: &mut impl hash::Engine,
    ) -> Result<(), Error> {
        match self {
            Self::RootKey(root) => {
                check!(root.ct_eq(key), Error::VerifyFailed);
                Ok(())
            }
            Self::KeyDigest(digest) => {
                let mut h = hasher
                    .new_hash(hash::Algo::Sha256)
                    .map_err(|_| fail!(Error::VerifyFailed))?;
                let modulus = key.modulus();
                let exponent = key.exponent();
                let hashed = h
                    .write(&(modulus.len() as u16).to_le_bytes())
                    .and_then(|_| h.write(modulus))
                    .and_then(|_| h.write(&[exponent.len() as u8]))
                    .and_then(|_| h.write(exponent));
                hashed
                    .and_then(|_| h.expect(digest))
                    .map_err(|_| fail!(Error::VerifyFailed))
            }
        }
    }
}

/// Checks `signature` over the SHA-256 digest of `signed`.
///
/// If `expected_hash` is given, the digest must also match it. The digest is
/// written to `digest`.
pub(crate) fn verify_signed(
    hasher: &mut impl hash::Engine,
    verifier: &mut impl sig::Verify,
    key: &PublicKey,
    signed: &[u8],
    signature: &[u8],
    expected_hash: Option<&[u8]>,
    digest: &mut [u8; 32],
) -> Result<(), Error> {
    hasher
        .contiguous_hash(hash::Algo::Sha256, signed, digest)
        .map_err(|_| fail!(Error::VerifyFailed))?;
    if let Some(expected) = expected_hash {
        check!(
            crypto::constant_time_eq(&digest[..], expected),
            Error::VerifyFailed
        );
    }
    verifier
        .verify(key, signature, &digest[..])
        .map_err(|_| fail!(Error::VerifyFailed))
}

/// Verifies a firmware image against the contents of `host_flash`.
///
/// The image regions are hashed in order with the image's hash type. A
/// hash-verified image must match its expected digest; a signature-verified
/// image must carry a valid signature of the digest under its embedded key.
pub fn verify_image<F, H, V>(
    image: &Image,
    host_flash: &F,
    hasher: &mut H,
    verifier: &mut V,
) -> Result<(), Error>
where
    F: Flash + ?Sized,
    H: hash::Engine + ?Sized,
    V: sig::Verify + ?Sized,
{
    let algo = image.hash_type();
    let mut digest = [0; hash::MAX_DIGEST_LEN];
    let digest = &mut digest[..algo.bytes()];

    let mut h = hasher
        .new_hash(algo)
        .map_err(|_| fail!(Error::VerifyFailed))?;
    let mut buf = [0; 64];
    for region in image.regions() {
        let region = region?;
        let mut offset = 0;
        while offset < region.len {
            let len = (region.len - offset).min(buf.len() as u32);
            let chunk = &mut buf[..len as usize];
            host_flash.read(Ptr::new(region.ptr.address + offset), chunk)?;
            h.write(chunk).map_err(|_| fail!(Error::VerifyFailed))?;
            offset += len;
        }
    }
    h.finish(digest).map_err(|_| fail!(Error::VerifyFailed))?;

    match image.verification() {
        ImageVerification::Hash(expected) => {
            check!(
                crypto::constant_time_eq(digest, expected),
                Error::VerifyFailed
            );
            Ok(())
        }
        ImageVerification::Signature { signature, key } => {
            info!("checking image signature");
            verifier
                .verify(key, signature, digest)
                .map_err(|_| fail!(Error::VerifyFailed))
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod test {
    use super::*;

    use testutil::data::keys;

    use crate::crypto::ring;
    use crate::crypto::sig::Sign as _;
    use crate::hardware::flash::Ram;
    use crate::manifest::owned;
    use crate::manifest::pfm::Manifest;

    fn firmware() -> Vec<u8> {
        (0..0x3000u32).map(|i| (i * 7 % 251) as u8).collect()
    }

    fn manifest_with(image: owned::Image) -> Vec<u8> {
        let pfm = owned::Pfm {
            format: crate::manifest::ManifestType::V2,
            id: 1,
            platform_id: b"p".to_vec(),
            blank: 0xff,
            firmware: vec![owned::Firmware {
                id: Some("fw".into()),
                flags: 0,
                versions: vec![owned::Version {
                    version: b"1".to_vec(),
                    address: 0,
                    rw_regions: vec![],
                    images: vec![image],
                }],
            }],
            smbus_rules: vec![],
        };
        pfm.encode_with_signature(&[0; 256]).unwrap()
    }

    fn regions() -> Vec<owned::ImageRegion> {
        vec![
            owned::ImageRegion { start: 0x0, end: 0x100 },
            owned::ImageRegion { start: 0x2000, end: 0x2f03 },
        ]
    }

    fn digest_of(fw: &[u8]) -> Vec<u8> {
        let mut hasher = ring::hash::Engine::new();
        let mut h = hasher.new_hash(hash::Algo::Sha256).unwrap();
        h.write(&fw[0x0..0x100]).unwrap();
        h.write(&fw[0x2000..0x2f03]).unwrap();
        let mut out = vec![0; 32];
        h.finish(&mut out).unwrap();
        out
    }

    #[test]
    fn hashed_image() {
        let fw = firmware();
        let bytes = manifest_with(owned::Image {
            hash_type: hash::Algo::Sha256,
            validate_on_boot: true,
            hash: digest_of(&fw),
            signature: vec![],
            key: vec![],
            regions: regions(),
        });
        let pfm = Manifest::parse(&bytes).unwrap();
        let image = pfm.firmware_images(Some(b"fw"), b"1").unwrap().next();
        let image = image.unwrap().unwrap();

        let mut hasher = ring::hash::Engine::new();
        let mut verifier = ring::rsa::Verifier::new();
        verify_image(&image, &Ram(&fw), &mut hasher, &mut verifier).unwrap();

        let mut tampered = fw.clone();
        tampered[0x2f02] ^= 1;
        let err = verify_image(&image, &Ram(&tampered), &mut hasher, &mut verifier)
            .unwrap_err();
        assert_eq!(err.into_inner(), Error::VerifyFailed);
        assert!(!hasher.is_busy());
    }

    #[test]
    fn signed_image() {
        let fw = firmware();
        let mut signer =
            ring::rsa::Signer::from_pkcs8(keys::KEY1_RSA_KEYPAIR).unwrap();
        let mut signature = vec![0; 256];
        signer.sign(&digest_of(&fw), &mut signature).unwrap();

        let bytes = manifest_with(owned::Image {
            hash_type: hash::Algo::Sha256,
            validate_on_boot: false,
            hash: vec![],
            signature,
            key: signer.public_key_blob(),
            regions: regions(),
        });
        let pfm = Manifest::parse(&bytes).unwrap();
        let image = pfm.firmware_images(Some(b"fw"), b"1").unwrap().next();
        let image = image.unwrap().unwrap();
        assert!(image.is_signed());

        let mut hasher = ring::hash::Engine::new();
        let mut verifier = ring::rsa::Verifier::new();
        verify_image(&image, &Ram(&fw), &mut hasher, &mut verifier).unwrap();

        let mut tampered = fw.clone();
        tampered[0x10] ^= 0x80;
        let err = verify_image(&image, &Ram(&tampered), &mut hasher, &mut verifier)
            .unwrap_err();
        assert_eq!(err.into_inner(), Error::VerifyFailed);
    }

    #[test]
    fn anchors() {
        let signer =
            ring::rsa::Signer::from_pkcs8(keys::KEY1_RSA_KEYPAIR).unwrap();
        let other =
            ring::rsa::Signer::from_pkcs8(keys::KEY2_RSA_KEYPAIR).unwrap();
        let blob = signer.public_key_blob();
        let other_blob = other.public_key_blob();
        let key = PublicKey::from_blob(&blob).unwrap();
        let other_key = PublicKey::from_blob(&other_blob).unwrap();

        let mut hasher = ring::hash::Engine::new();
        let mut digest = [0; 32];
        hasher
            .contiguous_hash(hash::Algo::Sha256, &blob, &mut digest)
            .unwrap();

        assert!(Anchor::RootKey(key).admits(&key, &mut hasher).is_ok());
        assert!(Anchor::RootKey(key).admits(&other_key, &mut hasher).is_err());
        assert!(Anchor::KeyDigest(&digest).admits(&key, &mut hasher).is_ok());
        assert!(Anchor::KeyDigest(&digest)
            .admits(&other_key, &mut hasher)
            .is_err());
        assert!(!hasher.is_busy());
    }
}
