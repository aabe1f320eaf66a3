//! Raw bindings for the GPIO character device ABI v1 ([gpio.h]).
//!
//! [gpio.h]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h

mod common;

pub use common::*;

pub mod v1;
