// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The `gpio-lines` crate provides access to GPIO lines through the [GPIO
//! character device
//! ABI](https://www.kernel.org/doc/Documentation/ABI/testing/gpio-cdev).
//!
//! A [`Chip`] is one open `/dev/gpiochipN` device. Each offset on it is a
//! [`Line`], and lines of one chip can be grouped into a [`LineBulk`] of up
//! to [`MAX_LINES`] lines so they are requested, read and written together.
//!
//! A line is always in exactly one of three states: free, requested for
//! values, or requested for edge events. Lines requested together for values
//! share one kernel handle, which stays open until the last of them is
//! released. Lines requested for events each get their own handle and are
//! waited on together with [`LineBulk::event_wait`].
//!
//! # Examples
//!
//! Mirror an input onto an output:
//!
//! ```no_run
//! use gpio_lines::{Chip, EventKind};
//!
//! # fn main() -> Result<(), gpio_lines::Error> {
//! let chip = Chip::open("/dev/gpiochip0")?;
//! let input = chip.get_line(4)?;
//! let output = chip.get_line(5)?;
//!
//! output.request_output("mirror-gpio", 0)?;
//! input.request_both_edges_events("mirror-gpio")?;
//!
//! loop {
//!     if input.event_wait(None)? {
//!         let event = input.event_read()?;
//!         match event.kind() {
//!             EventKind::Rising => output.set_value(1)?,
//!             EventKind::Falling => output.set_value(0)?,
//!         }
//!     }
//! }
//! # }
//! ```
//!
//! Drive three lines at once:
//!
//! ```no_run
//! use gpio_lines::{Chip, RequestConfig, RequestFlags};
//!
//! # fn main() -> Result<(), gpio_lines::Error> {
//! let chip = Chip::open_lookup("0")?;
//! let leds = chip.get_lines(&[17, 27, 22])?;
//!
//! let config = RequestConfig::new("leds")
//!     .output()
//!     .with_flags(RequestFlags::ACTIVE_LOW);
//! leds.request(&config, Some(&[1, 0, 1]))?;
//! leds.set_values(&[0, 1, 0])?;
//! println!("{:?}", leds.get_values()?);
//!
//! leds.release();
//! # Ok(()) }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod device;
mod errors;

pub mod fixed_str;

#[allow(non_camel_case_types)]
pub mod uapi;

pub mod chip;

pub mod line;

#[cfg(test)]
mod mock;

pub use chip::{chips, find_line, is_gpiochip_device, Chip};
pub use errors::{Error, IoctlKind, Result};
pub use line::options::{Active, Bias, Direction, Drive, RequestConfig, RequestFlags, RequestType};
pub use line::{EventKind, Line, LineBulk, LineEvent, LineInfo, LineValues, MAX_LINES};
