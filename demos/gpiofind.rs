// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Print the chip name and offset of a named line, like libgpiod's
//! `gpiofind`. Exits with status 1 when no line has that name.

use gpio_lines::find_line;
use quicli::prelude::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The name of the GPIO line
    name: String,
}

fn do_main(args: Cli) -> anyhow::Result<bool> {
    match find_line(&args.name)? {
        Some(line) => {
            println!("{} {}", line.chip().name(), line.offset());
            Ok(true)
        }
        None => Ok(false),
    }
}

fn main() -> CliResult {
    let args = Cli::from_args();
    match do_main(args) {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1)
        }
    }
}
