// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! I/O utilities.

use std::fs;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::path::Path;

/// Like `?`, but exits the binary with an error message.
macro_rules! check {
    ($result:expr, $fmt:literal $(, $args:expr)* $(,)?) => {
        match $result {
            Ok(x) => x,
            Err(e) => {
                eprintln!("error: {}: {:?}", format_args!($fmt, $($args,)*), e);
                std::process::exit(2)
            }
        }
    }
}

/// Opens the given input and output files.
///
/// A missing input reads stdin; a missing output writes stdout.
pub fn stdio(
    input_file: Option<&Path>,
    output_file: Option<&Path>,
) -> (Box<dyn Read>, Box<dyn Write>) {
    let input: Box<dyn Read> = match input_file {
        Some(path) => {
            let file = check!(
                File::open(path),
                "failed to open {}",
                path.display()
            );
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin()),
    };

    let output: Box<dyn Write> = match output_file {
        Some(path) => Box::new(check!(
            File::create(path),
            "failed to create {}",
            path.display()
        )),
        None => Box::new(io::stdout()),
    };

    (input, output)
}

/// Reads all of `r`.
pub fn read_all(mut r: impl Read) -> Vec<u8> {
    let mut buf = Vec::new();
    check!(r.read_to_end(&mut buf), "failed to read input");
    buf
}

/// Reads a PKCS#8 RSA keypair from `path`.
pub fn signer(path: &Path) -> pfr::crypto::ring::rsa::Signer {
    let pkcs8 = check!(fs::read(path), "failed to open {}", path.display());
    check!(
        pfr::crypto::ring::rsa::Signer::from_pkcs8(&pkcs8).ok_or(()),
        "failed to parse key"
    )
}
