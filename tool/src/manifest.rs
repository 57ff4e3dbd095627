// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Manifest manipulation commands.

use std::io::Write as _;
use std::path::PathBuf;

use pfr::crypto::hash;
use pfr::crypto::hash::EngineExt as _;
use pfr::crypto::key::PublicKey;
use pfr::crypto::ring;
use pfr::crypto::sig::Verify as _;
use pfr::manifest::owned;
use pfr::manifest::pfm;
use pfr::manifest::Container;
use pfr::manifest::Header;
use pfr::manifest::ManifestType;

/// Commands for building and inspecting PFMs.
#[derive(structopt::StructOpt)]
#[structopt(author)]
pub enum Manifest {
    /// Encode and sign a PFM described in JSON.
    SignManifest {
        /// PKCS#8-encoded RSA signing key to sign with.
        #[structopt(long, parse(from_os_str))]
        key: PathBuf,

        /// Append the public key blob after the manifest, as V2 manifests
        /// are stored in flash.
        #[structopt(long)]
        append_key: bool,

        /// Input file, defaults to stdin.
        #[structopt(short = "i", long, parse(from_os_str))]
        input: Option<PathBuf>,

        /// Output file, defaults to stdout.
        #[structopt(short = "o", long, parse(from_os_str))]
        output: Option<PathBuf>,
    },

    /// Decode a binary PFM into JSON.
    ShowManifest {
        /// PKCS#8-encoded RSA key to check the signature with. Without it,
        /// a V2 manifest followed by its key blob is checked against that
        /// key.
        #[structopt(long, parse(from_os_str))]
        key: Option<PathBuf>,

        /// Whether to pretty-print the resulting JSON.
        #[structopt(long)]
        pretty: bool,

        /// Input file, defaults to stdin.
        #[structopt(short = "i", long, parse(from_os_str))]
        input: Option<PathBuf>,

        /// Output file, defaults to stdout.
        #[structopt(short = "o", long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
}

impl Manifest {
    pub fn run(self) {
        match self {
            Self::SignManifest {
                key,
                append_key,
                input,
                output,
            } => {
                let (r, mut w) =
                    crate::util::stdio(input.as_deref(), output.as_deref());
                let mut signer = crate::util::signer(&key);
                let mut hasher = ring::hash::Engine::new();

                let pfm: owned::Pfm = check!(
                    serde_json::from_slice(&crate::util::read_all(r)),
                    "failed to parse PFM"
                );
                let mut bytes = check!(
                    pfm.sign(&mut hasher, &mut signer),
                    "failed to sign PFM"
                );
                if append_key {
                    bytes.extend_from_slice(&signer.public_key_blob());
                }

                check!(w.write_all(&bytes), "failed to write manifest");
            }

            Self::ShowManifest {
                key,
                pretty,
                input,
                output,
            } => {
                let (r, w) =
                    crate::util::stdio(input.as_deref(), output.as_deref());
                let bytes = crate::util::read_all(r);

                let header =
                    check!(Header::read_from(&bytes[..]), "bad manifest header");
                let len = header.length as usize;
                if len > bytes.len() {
                    check!(
                        Err(format!("{} < {}", bytes.len(), len)),
                        "manifest truncated"
                    );
                }
                let (manifest, trailer) = bytes.split_at(len);

                let blob = match key {
                    Some(path) => {
                        Some(crate::util::signer(&path).public_key_blob())
                    }
                    None if header.manifest_type == ManifestType::V2 => {
                        Some(trailer.to_vec())
                    }
                    None => None,
                };
                match blob {
                    Some(blob) => check_signature(manifest, &blob),
                    None => eprintln!("warning: signature not checked"),
                }

                let parsed =
                    check!(pfm::Manifest::parse(manifest), "failed to parse PFM");
                let pfm = check!(
                    owned::Pfm::from_manifest(&parsed),
                    "failed to convert PFM"
                );

                let r = match pretty {
                    true => serde_json::to_writer_pretty(w, &pfm),
                    false => serde_json::to_writer(w, &pfm),
                };
                check!(r, "failed to serialize PFM");
            }
        }
    }
}

/// Warns if `manifest` is not signed by the key in `blob`.
fn check_signature(manifest: &[u8], blob: &[u8]) {
    let key = match PublicKey::from_blob(blob) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("warning: unusable key blob: {:?}", e);
            return;
        }
    };
    let container =
        check!(Container::parse(manifest), "failed to parse envelope");

    let mut hasher = ring::hash::Engine::new();
    let mut digest = [0; 32];
    check!(
        hasher.contiguous_hash(
            hash::Algo::Sha256,
            container.signed_bytes(),
            &mut digest
        ),
        "failed to hash manifest"
    );

    let mut verifier = ring::rsa::Verifier::new();
    if verifier
        .verify(&key, container.signature(), &digest)
        .is_err()
    {
        eprintln!("warning: signature verification failed");
    }
}
