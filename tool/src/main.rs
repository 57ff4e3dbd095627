// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `pfr-tool` is a simple command-line tool for building and inspecting
//! platform firmware manifests.

#![deny(missing_docs)]
#![deny(warnings)]
#![deny(unused)]
#![deny(unsafe_code)]

use structopt::StructOpt as _;

#[macro_use]
mod util;

mod manifest;

/// A command-line tool for working with PFR manifests.
#[allow(missing_docs)]
#[derive(structopt::StructOpt)]
#[structopt(author)]
enum CliCommand {
    #[structopt(flatten)]
    Manifest(manifest::Manifest),
}

fn main() {
    match CliCommand::from_args() {
        CliCommand::Manifest(m) => m.run(),
    }
}
