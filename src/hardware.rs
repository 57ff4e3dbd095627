// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable hardware functionality
//!
//! This module provides traits for plugging in the storage devices the engine
//! reads manifests from and streams updates into. Bus-filter hardware is
//! abstracted separately, in [`crate::filter::driver`].

pub mod flash;

#[cfg(test)]
pub(crate) mod fake {
    use crate::hardware::flash;
    use crate::hardware::flash::Ptr;
    use crate::hardware::flash::RamMut;
    use crate::hardware::flash::Region;

    /// A RAM-backed flash that records erases and can be told to misbehave.
    #[derive(Debug)]
    pub struct Flash {
        ram: RamMut<Vec<u8>>,
        /// Every erase performed, in order.
        pub erases: Vec<Region>,
        /// Every program performed, as `(offset, len)`.
        pub programs: Vec<(u32, usize)>,
        /// If set, programs write at most this many bytes.
        pub short_writes: Option<usize>,
        /// If set, every operation fails with this error.
        pub fail_with: Option<flash::Error>,
    }

    impl Flash {
        /// Creates a new, fully erased fake flash of `len` bytes.
        pub fn new(len: usize) -> Self {
            Self {
                ram: RamMut(vec![flash::ERASED_BYTE; len]),
                erases: Vec::new(),
                programs: Vec::new(),
                short_writes: None,
                fail_with: None,
            }
        }

        /// Creates a fake flash holding `bytes` at `offset`, padded with
        /// erased bytes out to `len`.
        pub fn with_contents(len: usize, offset: usize, bytes: &[u8]) -> Self {
            let mut f = Self::new(len);
            f.ram.0[offset..offset + bytes.len()].copy_from_slice(bytes);
            f
        }

        /// The raw contents of the fake.
        pub fn contents(&self) -> &[u8] {
            &self.ram.0
        }

        /// Mutable raw contents, bypassing erase semantics.
        pub fn contents_mut(&mut self) -> &mut [u8] {
            &mut self.ram.0
        }

        fn check(&self) -> crate::Result<(), flash::Error> {
            match self.fail_with {
                Some(e) => Err(fail!(e)),
                None => Ok(()),
            }
        }
    }

    impl flash::Flash for Flash {
        fn size(&self) -> crate::Result<u32, flash::Error> {
            flash::Flash::size(&self.ram)
        }

        fn read(
            &self,
            offset: Ptr,
            out: &mut [u8],
        ) -> crate::Result<(), flash::Error> {
            self.check()?;
            flash::Flash::read(&self.ram, offset, out)
        }

        fn program(
            &mut self,
            offset: Ptr,
            buf: &[u8],
        ) -> crate::Result<usize, flash::Error> {
            self.check()?;
            let len = match self.short_writes {
                Some(n) => buf.len().min(n),
                None => buf.len(),
            };
            self.programs.push((offset.address, len));
            flash::Flash::program(&mut self.ram, offset, &buf[..len])
        }

        fn erase(&mut self, region: Region) -> crate::Result<(), flash::Error> {
            self.check()?;
            self.erases.push(region);
            flash::Flash::erase(&mut self.ram, region)
        }
    }
}
