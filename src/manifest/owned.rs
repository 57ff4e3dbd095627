// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Owned manifests.
//!
//! This module provides a heap-allocated PFM, intended for tooling: it makes
//! building, signing and pretty-printing arbitrary manifests easy and
//! straight-forward. See [`super::pfm`] for zero-copy parsing.
//!
//! When the `serde` feature is enabled, owned manifests can be de/serialized.

use std::convert::TryInto;

use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::crypto::key::IMAGE_KEY_LEN;
use crate::crypto::sig;
use crate::io;
use crate::io::write::StdWrite;
use crate::io::Write;
use crate::manifest;
use crate::manifest::container::Header;
use crate::manifest::container::SigType;
use crate::manifest::container::HEADER_LEN;
use crate::manifest::pfm;
use crate::manifest::pfm::ImageVerification;
use crate::manifest::pfm::RwFailurePolicy;
use crate::manifest::pfm::FW_FLAG_SIGNED_IMAGES;
use crate::manifest::pfm::IMAGE_SIG_LEN;
use crate::manifest::pfm::RW_FLAG_UPDATE_ONLY;
use crate::manifest::pfm::SMBUS_RULE_DEFINITION;
use crate::manifest::ManifestType;
use crate::status::Module;
use crate::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An error returned while encoding an owned manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingError {
    /// Indicates that a string was longer than its length prefix allows.
    StringTooLong,
    /// Indicates that a list was longer than its count prefix allows, or the
    /// manifest as a whole exceeds the 64 KiB a container can describe.
    TooManyElements,
    /// Indicates that a V2 firmware has no id, or a legacy one has one.
    BadFirmwareId,
    /// Indicates that a legacy manifest does not have exactly one firmware.
    BadLegacyLayout,
    /// Indicates that a hash does not match its `hash_type`.
    BadHashLength,
    /// Indicates that an image signature is not [`IMAGE_SIG_LEN`] bytes.
    BadSignatureLength,
    /// Indicates that an image key blob does not fit in [`IMAGE_KEY_LEN`]
    /// bytes.
    KeyTooLong,
    /// Indicates that an SMBus passlist is not 32 bytes.
    BadPasslist,
    /// Indicates that writing the encoded bytes failed.
    Io(io::Error),
    /// Indicates that hashing the manifest failed.
    Hash(hash::Error),
    /// Indicates that signing the manifest failed.
    Sig(sig::Error),
    /// Indicates that a manifest being converted was invalid.
    Manifest(manifest::Error),
}

impl From<io::Error> for EncodingError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<hash::Error> for EncodingError {
    fn from(e: hash::Error) -> Self {
        Self::Hash(e)
    }
}

impl From<sig::Error> for EncodingError {
    fn from(e: sig::Error) -> Self {
        Self::Sig(e)
    }
}

impl From<manifest::Error> for EncodingError {
    fn from(e: manifest::Error) -> Self {
        Self::Manifest(e)
    }
}

debug_from!(EncodingError => io::Error, hash::Error, sig::Error, manifest::Error);

impl crate::status::Status for EncodingError {
    fn module(&self) -> Module {
        Module::Manifest
    }

    fn local_code(&self) -> u8 {
        match self {
            Self::StringTooLong => 0x80,
            Self::TooManyElements => 0x81,
            Self::BadFirmwareId => 0x82,
            Self::BadLegacyLayout => 0x83,
            Self::BadHashLength => 0x84,
            Self::BadSignatureLength => 0x85,
            Self::KeyTooLong => 0x86,
            Self::BadPasslist => 0x87,
            Self::Io(_) => 0x88,
            Self::Hash(_) => 0x89,
            Self::Sig(_) => 0x8a,
            Self::Manifest(e) => crate::status::Status::local_code(e),
        }
    }
}

fn default_blank() -> u8 {
    0xff
}

fn default_policy() -> RwFailurePolicy {
    RwFailurePolicy::DoNothing
}

/// A heap-allocated PFM.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pfm {
    /// The manifest layout to encode.
    pub format: ManifestType,
    /// The manifest id.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub id: u32,
    /// The platform id.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_bytestring",
            serialize_with = "crate::serde::se_bytestring",
        )
    )]
    pub platform_id: Vec<u8>,
    /// The erased value of the protected flash. Ignored for legacy
    /// manifests.
    #[cfg_attr(
        feature = "serde",
        serde(
            default = "default_blank",
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub blank: u8,
    /// The firmware components. Legacy manifests have exactly one, with no
    /// id.
    #[cfg_attr(feature = "serde", serde(default))]
    pub firmware: Vec<Firmware>,
    /// SMBus filtering rules. Must be empty for legacy manifests.
    #[cfg_attr(feature = "serde", serde(default))]
    pub smbus_rules: Vec<SmbusRule>,
}

/// A firmware component.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Firmware {
    /// The firmware id; required for V2 manifests.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub id: Option<String>,
    /// Vendor-defined firmware flags.
    ///
    /// [`FW_FLAG_SIGNED_IMAGES`] is computed during encoding and need not be
    /// set by hand.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub flags: u8,
    /// The allowed versions.
    #[cfg_attr(feature = "serde", serde(default))]
    pub versions: Vec<Version>,
}

/// An allowed firmware version.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Version {
    /// The version string.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_bytestring",
            serialize_with = "crate::serde::se_bytestring",
        )
    )]
    pub version: Vec<u8>,
    /// The address the running firmware reports its version at.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub address: u32,
    /// Regions the host may write.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rw_regions: Vec<RwRegion>,
    /// The images making up this version.
    #[cfg_attr(feature = "serde", serde(default))]
    pub images: Vec<Image>,
}

/// A region the host may write.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RwRegion {
    /// The failure policy.
    #[cfg_attr(feature = "serde", serde(default = "default_policy"))]
    pub policy: RwFailurePolicy,
    /// Whether the region is writable only during updates.
    #[cfg_attr(feature = "serde", serde(default))]
    pub update_only: bool,
    /// The first address of the region.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub start: u32,
    /// The first address past the end of the region.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub end: u32,
}

/// A contiguous piece of an [`Image`].
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageRegion {
    /// The first address of the region.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub start: u32,
    /// The first address past the end of the region.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub end: u32,
}

/// A firmware image.
///
/// An image with a non-empty `signature` is signature-verified, and must
/// also carry a `key`; otherwise it is verified against `hash`.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Image {
    /// The hash function used to digest the image.
    pub hash_type: hash::Algo,
    /// Whether the image must be validated on every boot.
    #[cfg_attr(feature = "serde", serde(default))]
    pub validate_on_boot: bool,
    /// The expected digest, for hash-verified images.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            skip_serializing_if = "Vec::is_empty",
            deserialize_with = "crate::serde::de_hex_bytes",
            serialize_with = "crate::serde::se_hex_bytes",
        )
    )]
    pub hash: Vec<u8>,
    /// The signature over the digest, for signature-verified images.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            skip_serializing_if = "Vec::is_empty",
            deserialize_with = "crate::serde::de_hex_bytes",
            serialize_with = "crate::serde::se_hex_bytes",
        )
    )]
    pub signature: Vec<u8>,
    /// The encoded public key blob, for signature-verified images.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            skip_serializing_if = "Vec::is_empty",
            deserialize_with = "crate::serde::de_hex_bytes",
            serialize_with = "crate::serde::se_hex_bytes",
        )
    )]
    pub key: Vec<u8>,
    /// The flash regions making up the image.
    pub regions: Vec<ImageRegion>,
}

impl Image {
    /// Returns whether this image is signature-verified.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

/// An SMBus filtering rule.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmbusRule {
    /// The bus the rule applies to.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub bus_id: u8,
    /// The rule's slot in the re-map table.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub rule_id: u8,
    /// The 8-bit device address.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_radix",
            serialize_with = "crate::serde::se_hex",
        )
    )]
    pub device_address: u8,
    /// The 32-byte command passlist.
    #[cfg_attr(
        feature = "serde",
        serde(
            deserialize_with = "crate::serde::de_hex_bytes",
            serialize_with = "crate::serde::se_hex_bytes",
        )
    )]
    pub passlist: Vec<u8>,
}

fn len_u8(len: usize, e: EncodingError) -> Result<u8, EncodingError> {
    len.try_into().map_err(|_| fail!(e))
}

fn write_pad(w: &mut impl Write, len: usize) -> Result<(), EncodingError> {
    w.write_fill(0, (4 - len % 4) % 4)?;
    Ok(())
}

impl Pfm {
    /// Encodes the body of this manifest: everything between the header and
    /// the signature.
    pub fn encode_body(&self) -> Result<Vec<u8>, EncodingError> {
        let mut bytes = Vec::new();
        let mut w = StdWrite(&mut bytes);

        let id_len = len_u8(self.platform_id.len(), EncodingError::StringTooLong)?;
        w.write_le(id_len)?;
        w.write_le(0u8)?;
        w.write_bytes(&self.platform_id)?;
        write_pad(&mut w, 2 + id_len as usize)?;

        match self.format {
            ManifestType::Legacy => {
                let fw = match self.firmware.as_slice() {
                    [fw] if self.smbus_rules.is_empty() => fw,
                    _ => return Err(fail!(EncodingError::BadLegacyLayout)),
                };
                check!(fw.id.is_none(), EncodingError::BadFirmwareId);
                encode_versions(&mut w, &fw.versions)?;
            }
            ManifestType::V2 => {
                w.write_le(self.blank)?;
                w.write_le(len_u8(
                    self.firmware.len(),
                    EncodingError::TooManyElements,
                )?)?;
                w.write_le(0u16)?;

                for fw in &self.firmware {
                    let id = fw
                        .id
                        .as_ref()
                        .ok_or_else(|| fail!(EncodingError::BadFirmwareId))?;
                    let has_signed = fw
                        .versions
                        .iter()
                        .flat_map(|v| &v.images)
                        .any(Image::is_signed);
                    let flags = if has_signed {
                        fw.flags | FW_FLAG_SIGNED_IMAGES
                    } else {
                        fw.flags & !FW_FLAG_SIGNED_IMAGES
                    };

                    let id_len =
                        len_u8(id.len(), EncodingError::StringTooLong)?;
                    w.write_le(len_u8(
                        fw.versions.len(),
                        EncodingError::TooManyElements,
                    )?)?;
                    w.write_le(id_len)?;
                    w.write_le(flags)?;
                    w.write_le(0u8)?;
                    w.write_bytes(id.as_bytes())?;
                    write_pad(&mut w, id_len as usize)?;
                    for v in &fw.versions {
                        encode_version(&mut w, v)?;
                    }
                }

                w.write_le(len_u8(
                    self.smbus_rules.len(),
                    EncodingError::TooManyElements,
                )?)?;
                w.write_fill(0, 3)?;
                for rule in &self.smbus_rules {
                    check!(rule.passlist.len() == 32, EncodingError::BadPasslist);
                    w.write_le(SMBUS_RULE_DEFINITION)?;
                    w.write_le(0u32)?;
                    w.write_le(rule.bus_id)?;
                    w.write_le(rule.rule_id)?;
                    w.write_le(rule.device_address)?;
                    w.write_bytes(&rule.passlist)?;
                }
            }
        }

        Ok(bytes)
    }

    fn header(&self, body_len: usize, sig_len: usize) -> Result<Vec<u8>, EncodingError> {
        let length = (HEADER_LEN + body_len + sig_len)
            .try_into()
            .map_err(|_| fail!(EncodingError::TooManyElements))?;
        let sig_length = sig_len
            .try_into()
            .map_err(|_| fail!(EncodingError::BadSignatureLength))?;
        let header = Header {
            length,
            manifest_type: self.format,
            id: self.id,
            sig_length,
            sig_type: SigType::RsaPkcs1Sha256,
        };

        let mut bytes = Vec::with_capacity(length as usize);
        header.write_to(StdWrite(&mut bytes))?;
        Ok(bytes)
    }

    /// Encodes this manifest with an explicit signature value.
    ///
    /// This is mostly useful for producing deliberately unsigned manifests,
    /// such as parser test vectors.
    pub fn encode_with_signature(
        &self,
        signature: &[u8],
    ) -> Result<Vec<u8>, EncodingError> {
        let body = self.encode_body()?;
        let mut bytes = self.header(body.len(), signature.len())?;
        bytes.extend_from_slice(&body);
        bytes.extend_from_slice(signature);
        Ok(bytes)
    }

    /// Encodes and signs this manifest.
    ///
    /// The signature is made over the SHA-256 digest of everything before
    /// it.
    pub fn sign(
        &self,
        hasher: &mut impl hash::Engine,
        signer: &mut impl sig::Sign,
    ) -> Result<Vec<u8>, EncodingError> {
        let body = self.encode_body()?;
        let sig_len = signer.sig_bytes();
        let mut bytes = self.header(body.len(), sig_len)?;
        bytes.extend_from_slice(&body);

        let mut digest = [0; 32];
        hasher.contiguous_hash(hash::Algo::Sha256, &bytes, &mut digest)?;

        let mut sig = vec![0; sig_len];
        signer.sign(&digest, &mut sig)?;
        bytes.extend_from_slice(&sig);
        Ok(bytes)
    }

    /// Converts a parsed manifest back into an owned one.
    pub fn from_manifest(
        manifest: &pfm::Manifest,
    ) -> Result<Self, EncodingError> {
        let mut firmware = Vec::new();
        for fw in manifest.firmware() {
            let fw = fw?;
            let mut versions = Vec::new();
            for v in fw.versions() {
                versions.push(Version::from_view(&v?)?);
            }
            firmware.push(Firmware {
                id: fw.id().map(|id| String::from_utf8_lossy(id).into_owned()),
                flags: fw.flags(),
                versions,
            });
        }

        let mut smbus_rules = Vec::new();
        for rule in manifest.smbus_rules() {
            let rule = rule?;
            smbus_rules.push(SmbusRule {
                bus_id: rule.bus_id(),
                rule_id: rule.rule_id(),
                device_address: rule.device_address(),
                passlist: rule.passlist().to_vec(),
            });
        }

        Ok(Self {
            format: manifest.manifest_type(),
            id: manifest.id(),
            platform_id: manifest.platform_id().to_vec(),
            blank: manifest.blank_byte(),
            firmware,
            smbus_rules,
        })
    }
}

impl Version {
    fn from_view(v: &pfm::Version) -> Result<Self, EncodingError> {
        let mut rw_regions = Vec::new();
        for rw in v.rw_regions() {
            let rw = rw?;
            rw_regions.push(RwRegion {
                policy: rw.policy,
                update_only: rw.update_only,
                start: rw.region.ptr.address,
                end: rw.region.ptr.address + rw.region.len,
            });
        }

        let mut images = Vec::new();
        for image in v.images() {
            let image = image?;
            let mut regions = Vec::new();
            for region in image.regions() {
                let region = region?;
                regions.push(ImageRegion {
                    start: region.ptr.address,
                    end: region.ptr.address + region.len,
                });
            }

            let (hash, signature, key) = match image.verification() {
                ImageVerification::Hash(hash) => {
                    (hash.to_vec(), Vec::new(), Vec::new())
                }
                ImageVerification::Signature { signature, key } => {
                    let mut blob = Vec::with_capacity(key.blob_len());
                    key.write_blob(StdWrite(&mut blob))?;
                    (Vec::new(), signature.to_vec(), blob)
                }
            };

            images.push(Image {
                hash_type: image.hash_type(),
                validate_on_boot: image.validate_on_boot(),
                hash,
                signature,
                key,
                regions,
            });
        }

        Ok(Self {
            version: v.version().to_vec(),
            address: v.address(),
            rw_regions,
            images,
        })
    }
}

fn encode_versions(
    w: &mut impl Write,
    versions: &[Version],
) -> Result<(), EncodingError> {
    w.write_le(len_u8(versions.len(), EncodingError::TooManyElements)?)?;
    w.write_fill(0, 3)?;
    for v in versions {
        encode_version(w, v)?;
    }
    Ok(())
}

fn encode_version(w: &mut impl Write, v: &Version) -> Result<(), EncodingError> {
    let version_len = len_u8(v.version.len(), EncodingError::StringTooLong)?;
    w.write_le(len_u8(v.images.len(), EncodingError::TooManyElements)?)?;
    w.write_le(len_u8(v.rw_regions.len(), EncodingError::TooManyElements)?)?;
    w.write_le(version_len)?;
    w.write_le(0u8)?;
    w.write_le(v.address)?;
    w.write_bytes(&v.version)?;
    write_pad(w, version_len as usize)?;

    for rw in &v.rw_regions {
        let mut flags = rw.policy as u8;
        if rw.update_only {
            flags |= RW_FLAG_UPDATE_ONLY;
        }
        w.write_le(flags)?;
        w.write_fill(0, 3)?;
        w.write_le(rw.start)?;
        w.write_le(rw.end)?;
    }

    for image in &v.images {
        let mut flags = 0u8;
        if image.validate_on_boot {
            flags |= pfm::ImageFlag::ValidateOnBoot as u8;
        }
        if image.is_signed() {
            flags |= pfm::ImageFlag::Signed as u8;
        }

        w.write_le(image.hash_type as u8)?;
        w.write_le(len_u8(
            image.regions.len(),
            EncodingError::TooManyElements,
        )?)?;
        w.write_le(flags)?;
        w.write_le(0u8)?;

        if image.is_signed() {
            check!(
                image.signature.len() == IMAGE_SIG_LEN,
                EncodingError::BadSignatureLength
            );
            check!(image.key.len() <= IMAGE_KEY_LEN, EncodingError::KeyTooLong);
            w.write_bytes(&image.signature)?;
            w.write_bytes(&image.key)?;
            w.write_fill(0, IMAGE_KEY_LEN - image.key.len())?;
        } else {
            check!(
                image.hash.len() == image.hash_type.bytes(),
                EncodingError::BadHashLength
            );
            w.write_bytes(&image.hash)?;
        }

        for region in &image.regions {
            w.write_be(region.start)?;
            w.write_be(region.end)?;
        }
    }
    Ok(())
}

#[cfg(all(test, feature = "serde"))]
mod test {
    use super::*;

    use pretty_assertions::assert_eq;
    use serde_json::from_str;
    use testutil::data::keys;

    use crate::crypto::ring;
    use crate::crypto::sig::Verify as _;
    use crate::manifest::Container;

    #[test]
    fn sign_and_reparse() {
        #[rustfmt::skip]
        let pfm: Pfm = from_str(r#"{
            "format": "V2",
            "id": "0x10",
            "platform_id": "platform",
            "firmware": [{
                "id": "bmc",
                "flags": "0b10",
                "versions": [{
                    "version": "1.2.3",
                    "address": "0x40",
                    "rw_regions": [
                        { "policy": "RestoreFromRecovery", "update_only": true, "start": "0x8000", "end": "0x9000" }
                    ],
                    "images": [{
                        "hash_type": "Sha384",
                        "validate_on_boot": true,
                        "hash": "111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111",
                        "regions": [{ "start": "0x0", "end": "0x8000" }]
                    }]
                }]
            }]
        }"#).unwrap();

        let mut hasher = ring::hash::Engine::new();
        let mut signer =
            ring::rsa::Signer::from_pkcs8(keys::KEY1_RSA_KEYPAIR).unwrap();
        let bytes = pfm.sign(&mut hasher, &mut signer).unwrap();

        let container = Container::parse(&bytes).unwrap();
        let mut digest = [0; 32];
        hasher
            .contiguous_hash(hash::Algo::Sha256, container.signed_bytes(), &mut digest)
            .unwrap();
        let blob = signer.public_key_blob();
        let key = crate::crypto::key::PublicKey::from_blob(&blob).unwrap();
        ring::rsa::Verifier::new()
            .verify(&key, container.signature(), &digest)
            .unwrap();

        let parsed = pfm::Manifest::parse(&bytes).unwrap();
        assert_eq!(Pfm::from_manifest(&parsed).unwrap(), pfm);
    }

    #[test]
    fn encode_errors() {
        let mut pfm: Pfm = from_str(
            r#"{ "format": "V2", "id": 1, "platform_id": "p", "firmware": [{ "versions": [] }] }"#,
        )
        .unwrap();
        assert_eq!(
            pfm.encode_body().unwrap_err().into_inner(),
            EncodingError::BadFirmwareId
        );

        pfm.format = ManifestType::Legacy;
        assert!(pfm.encode_body().is_ok());
        pfm.firmware.push(pfm.firmware[0].clone());
        assert_eq!(
            pfm.encode_body().unwrap_err().into_inner(),
            EncodingError::BadLegacyLayout
        );

        pfm.firmware.truncate(1);
        pfm.firmware[0].versions.push(Version {
            version: b"1".to_vec(),
            address: 0,
            rw_regions: vec![],
            images: vec![Image {
                hash_type: hash::Algo::Sha256,
                validate_on_boot: false,
                hash: vec![0; 20],
                signature: vec![],
                key: vec![],
                regions: vec![ImageRegion { start: 0, end: 1 }],
            }],
        });
        assert_eq!(
            pfm.encode_body().unwrap_err().into_inner(),
            EncodingError::BadHashLength
        );
    }
}
