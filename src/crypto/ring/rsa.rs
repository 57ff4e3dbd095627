// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! RSA signature engines based on `ring`.
//!
//! Requires the `std` feature flag to be enabled.

use ring::signature::KeyPair as _;
use ring::signature::RsaPublicKeyComponents;

use crate::crypto::key::ModulusLength;
use crate::crypto::key::PublicKey;
use crate::crypto::sig;
use crate::Result;

#[cfg(doc)]
use crate::crypto;

/// A `ring`-based [`sig::Verify`] for RSA PKCS#1 v1.5 with SHA-256.
#[derive(Default)]
pub struct Verifier {
    _priv: (),
}

impl Verifier {
    /// Creates a new `Verifier`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl sig::Verify for Verifier {
    fn verify(
        &mut self,
        key: &PublicKey,
        signature: &[u8],
        message: &[u8],
    ) -> Result<(), sig::Error> {
        let scheme = &ring::signature::RSA_PKCS1_2048_8192_SHA256;
        let key = RsaPublicKeyComponents {
            n: key.modulus(),
            e: key.exponent(),
        };
        key.verify(scheme, message, signature)
            .map_err(|_| fail!(sig::Error::BadSignature))
    }
}

/// A `ring`-based [`sig::Sign`], backed by an RSA keypair.
pub struct Signer {
    keypair: ring::signature::RsaKeyPair,
}

impl Signer {
    /// Creates a new `Signer` from the given PKCS#8-encoded private key.
    ///
    /// This function will return `None` if parsing fails or if it is not one
    /// of the sanctioned sizes in [`ModulusLength`].
    pub fn from_pkcs8(pkcs8: &[u8]) -> Option<Self> {
        let keypair = ring::signature::RsaKeyPair::from_pkcs8(pkcs8).ok()?;
        ModulusLength::from_byte_len(keypair.public_modulus_len())
            .map(|_| Self { keypair })
    }

    /// Returns the public half of this keypair, as an encoded key blob.
    pub fn public_key_blob(&self) -> Vec<u8> {
        let public = self.keypair.public_key();
        let n = public.modulus().big_endian_without_leading_zero();
        let e = public.exponent().big_endian_without_leading_zero();

        let mut blob = Vec::with_capacity(2 + n.len() + 1 + e.len());
        blob.extend_from_slice(&(n.len() as u16).to_le_bytes());
        blob.extend_from_slice(n);
        blob.push(e.len() as u8);
        blob.extend_from_slice(e);
        blob
    }
}

impl sig::Sign for Signer {
    fn sig_bytes(&self) -> usize {
        self.keypair.public_modulus_len()
    }

    fn sign(
        &mut self,
        message: &[u8],
        signature: &mut [u8],
    ) -> Result<(), sig::Error> {
        let scheme = &ring::signature::RSA_PKCS1_SHA256;
        let rng = ring::rand::SystemRandom::new();
        self.keypair
            .sign(scheme, &rng, message, signature)
            .map_err(|_| fail!(sig::Error::Unspecified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sig::Sign as _;
    use crate::crypto::sig::Verify as _;
    use testutil::data::keys;
    use testutil::data::misc_crypto;

    #[test]
    fn rsa() {
        let mut signer = Signer::from_pkcs8(keys::KEY1_RSA_KEYPAIR).unwrap();
        assert_eq!(signer.sig_bytes(), 256);

        let blob = signer.public_key_blob();
        let key = PublicKey::from_blob(&blob).unwrap();
        assert_eq!(key.len(), ModulusLength::Bits2048);

        let mut sig = vec![0; signer.sig_bytes()];
        signer.sign(misc_crypto::PLAIN_SHA256, &mut sig).unwrap();

        let mut verifier = Verifier::new();
        verifier
            .verify(&key, &sig, misc_crypto::PLAIN_SHA256)
            .unwrap();

        sig[17] ^= 0x40;
        assert_eq!(
            verifier
                .verify(&key, &sig, misc_crypto::PLAIN_SHA256)
                .unwrap_err()
                .into_inner(),
            sig::Error::BadSignature
        );
    }

    #[test]
    fn wrong_key() {
        let mut signer = Signer::from_pkcs8(keys::KEY1_RSA_KEYPAIR).unwrap();
        let other = Signer::from_pkcs8(keys::KEY2_RSA_KEYPAIR).unwrap();
        let other_blob = other.public_key_blob();
        let other_key = PublicKey::from_blob(&other_blob).unwrap();

        let mut sig = vec![0; signer.sig_bytes()];
        signer.sign(misc_crypto::PLAIN_TEXT, &mut sig).unwrap();
        assert!(Verifier::new()
            .verify(&other_key, &sig, misc_crypto::PLAIN_TEXT)
            .is_err());
    }
}
