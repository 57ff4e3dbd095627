// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;

use pfr::manifest::pfm::Manifest;

fuzz_target!(|data: &[u8]| {
    let manifest = match Manifest::parse(data) {
        Ok(m) => m,
        Err(_) => return,
    };

    // Every record a successful parse admits must also be walkable.
    for fw in manifest.firmware() {
        let fw = match fw {
            Ok(fw) => fw,
            Err(_) => return,
        };
        for version in fw.versions().flatten() {
            for rw in version.rw_regions() {
                let _ = rw;
            }
            for image in version.images().flatten() {
                for region in image.regions() {
                    let _ = region;
                }
            }
        }
    }
    for rule in manifest.smbus_rules() {
        let _ = rule;
    }
});
