// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::arbitrary;
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use pfr::filter::spi::AddressPrivileges;
use pfr::filter::spi::image_grants;
use pfr::hardware::flash::Region;

#[derive(Debug, Arbitrary)]
struct Input {
    reads: Vec<Region>,
    writes: Vec<Region>,
    addrs: Vec<u32>,
}

fuzz_target!(|input: Input| {
    let mut privs = AddressPrivileges::new();
    for r in input.reads {
        let _ = privs.allow_read(r);
    }
    for w in input.writes {
        let _ = privs.allow_write(w);
    }

    let read = privs.read_image();
    let write = privs.write_image();
    for addr in input.addrs {
        // The hardware may over-grant reads, never writes.
        if privs.is_read_allowed(addr) {
            assert!(image_grants(&read, addr));
        }
        if image_grants(&write, addr) {
            assert!(privs.is_write_allowed(addr));
        }
    }
});
