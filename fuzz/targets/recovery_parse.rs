// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;

use pfr::recovery::RecoveryImage;

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = RecoveryImage::parse(data) {
        let _ = image.platform_id();
        for section in image.sections() {
            let _ = section.header.region();
        }
    }
});
