// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use bitflags::bitflags;
use nix::ioctl_readwrite;

use super::{GPIO_IOC_MAGIC, GPIO_MAX_NAME_SIZE};

/// Maximum number of lines in one handle request.
pub const GPIOHANDLES_MAX: usize = 64;

bitflags! {
    /// Informational Flags
    ///
    /// Maps to kernel [`GPIOLINE_FLAG_*`] flags.
    ///
    /// [`GPIOLINE_FLAG_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct GPIOLINE_FLAG: u32 {
        const KERNEL = (1 << 0);
        const IS_OUT = (1 << 1);
        const ACTIVE_LOW = (1 << 2);
        const OPEN_DRAIN = (1 << 3);
        const OPEN_SOURCE = (1 << 4);
        const BIAS_PULL_UP = (1 << 5);
        const BIAS_PULL_DOWN = (1 << 6);
        const BIAS_DISABLE = (1 << 7);
    }
}

/// Information about a certain GPIO line
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpioline_info {
    /// The local offset on this GPIO device, fill this in when
    /// requesting the line information from the kernel.
    pub line_offset: u32,
    /// various flags for this line, see [`GPIOLINE_FLAG`]
    pub flags: u32,
    // the name of this GPIO line, such as the output pin of the line on the
    // chip, a rail or a pin header name on a board, as specified by the gpio
    // chip, may be empty (i.e. name[0] == '\0')
    pub name: [u8; GPIO_MAX_NAME_SIZE],
    /// a functional name for the consumer of this GPIO line as set by
    /// whatever is using it, will be empty if there is no current user but may
    /// also be empty if the consumer doesn't set this up
    pub consumer: [u8; GPIO_MAX_NAME_SIZE],
}

impl gpioline_info {
    pub const fn new(line_offset: u32) -> Self {
        Self {
            line_offset,
            flags: 0,
            name: [0; GPIO_MAX_NAME_SIZE],
            consumer: [0; GPIO_MAX_NAME_SIZE],
        }
    }
}

bitflags! {
    /// Line Request Flags
    ///
    /// Maps to kernel [`GPIOHANDLE_REQUEST_*`] flags.
    ///
    /// [`GPIOHANDLE_REQUEST_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h#L58
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct GPIOHANDLE_REQUEST_FLAGS: u32 {
        const INPUT = (1 << 0);
        const OUTPUT = (1 << 1);
        const ACTIVE_LOW = (1 << 2);
        const OPEN_DRAIN = (1 << 3);
        const OPEN_SOURCE = (1 << 4);
        const BIAS_PULL_UP = (1 << 5);
        const BIAS_PULL_DOWN = (1 << 6);
        const BIAS_DISABLE = (1 << 7);
    }
}

/// Information about a GPIO handle request
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpiohandle_request {
    ///an array of desired lines, specified by offset index for the associated GPIO device
    pub lineoffsets: [u32; GPIOHANDLES_MAX],
    /// desired flags for the desired GPIO lines, see [`GPIOHANDLE_REQUEST_FLAGS`].
    ///
    /// Note that even if multiple lines are requested, the same flags
    /// must be applicable to all of them, if you want lines with individual
    /// flags set, request them one by one. It is possible to select
    /// a batch of input or output lines, but they must all have the same
    /// characteristics, i.e. all inputs or all outputs, all active low etc
    pub flags: u32,
    /// if [GPIOHANDLE_REQUEST_FLAGS::OUTPUT] is set for a requested
    /// line, this specifies the default output value, should be 0 (low) or
    /// 1 (high), anything else than 0 or 1 will be interpreted as 1 (high)
    pub default_values: [u8; GPIOHANDLES_MAX],
    /// a desired consumer label for the selected GPIO line(s)
    /// such as "my-bitbanged-relay"
    pub consumer_label: [u8; GPIO_MAX_NAME_SIZE],
    /// number of lines requested in this request, i.e. the number of
    /// valid fields in the above arrays, set to 1 to request a single line
    pub lines: u32,
    ///  if successful this field will contain a valid anonymous file handle
    ///  after a [gpio_get_linehandle] operation, zero or negative value
    ///  means error.
    pub fd: libc::c_int,
}

impl gpiohandle_request {
    pub const fn zeroed() -> Self {
        Self {
            lineoffsets: [0; GPIOHANDLES_MAX],
            flags: 0,
            default_values: [0; GPIOHANDLES_MAX],
            consumer_label: [0; GPIO_MAX_NAME_SIZE],
            lines: 0,
            fd: -1,
        }
    }

    /// The requested offsets, in request order.
    pub fn offsets(&self) -> &[u32] {
        let n = (self.lines as usize).min(GPIOHANDLES_MAX);
        &self.lineoffsets[..n]
    }
}

/// Configuration for a GPIO handle request
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpiohandle_config {
    /// updated flags for the requested GPIO lines
    pub flags: u32,
    /// if the [GPIOHANDLE_REQUEST_FLAGS::OUTPUT] is set in flags,
    ///  this specifies the default output value, should be 0 (low) or
    ///  1 (high), anything else than 0 or 1 will be interpreted as 1 (high)
    pub default_values: [u8; GPIOHANDLES_MAX],
    pub _padding: [u32; 4],
}

impl gpiohandle_config {
    pub const fn zeroed() -> Self {
        Self {
            flags: 0,
            default_values: [0; GPIOHANDLES_MAX],
            _padding: [0; 4],
        }
    }
}

/// Information of values on a GPIO handle
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpiohandle_data {
    /// When getting the state of lines this contains the current
    /// state of a line
    ///
    /// When setting the state of lines these should contain
    /// the desired target state
    pub values: [u8; GPIOHANDLES_MAX],
}

impl gpiohandle_data {
    pub const fn zeroed() -> Self {
        Self {
            values: [0; GPIOHANDLES_MAX],
        }
    }
}

bitflags! {
    /// Event request flags
    ///
    /// Maps to kernel [`GPIOEVENT_REQUEST_*`] flags.
    ///
    /// [`GPIOEVENT_REQUEST_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct GPIOEVENT_REQUEST_FLAGS: u32 {
        const RISING_EDGE = (1 << 0);
        const FALLING_EDGE = (1 << 1);
        const BOTH_EDGES = Self::RISING_EDGE.bits() | Self::FALLING_EDGE.bits();
    }
}

/// Information about a GPIO event request
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpioevent_request {
    /// the desired line to subscribe to events from, specified by
    /// offset index for the associated GPIO device
    pub lineoffset: u32,
    /// desired handle flags for the desired GPIO line
    pub handleflags: u32,
    /// desired flags for the desired GPIO event line
    pub eventflags: u32,
    /// a desired consumer label for the selected GPIO line(s) such as "my-listener"
    pub consumer_label: [u8; GPIO_MAX_NAME_SIZE],
    /// if successful this field will contain a valid anonymous file handle
    /// after a [gpio_get_lineevent] operation, zero or negative value
    /// means error
    pub fd: libc::c_int,
}

impl gpioevent_request {
    pub const fn new(lineoffset: u32) -> Self {
        Self {
            lineoffset,
            handleflags: 0,
            eventflags: 0,
            consumer_label: [0; GPIO_MAX_NAME_SIZE],
            fd: -1,
        }
    }
}

/// `GPIOEVENT_EVENT_RISING_EDGE`
pub const GPIOEVENT_EVENT_RISING_EDGE: u32 = 0x01;
/// `GPIOEVENT_EVENT_FALLING_EDGE`
pub const GPIOEVENT_EVENT_FALLING_EDGE: u32 = 0x02;

/// The actual event being pushed to userspace
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct gpioevent_data {
    /// best estimate of time of event occurrence, in nanoseconds
    pub timestamp: u64,
    /// event identifier
    pub id: u32,
}

impl gpioevent_data {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Decode one record as laid out by the kernel (native endian).
    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        let mut ts = [0; 8];
        let mut id = [0; 4];
        ts.copy_from_slice(&buf[0..8]);
        id.copy_from_slice(&buf[8..12]);
        Self {
            timestamp: u64::from_ne_bytes(ts),
            id: u32::from_ne_bytes(id),
        }
    }

    /// Encode one record, padding included.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];
        buf[0..8].copy_from_slice(&self.timestamp.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.id.to_ne_bytes());
        buf
    }
}

ioctl_readwrite!(gpio_get_lineinfo, GPIO_IOC_MAGIC, 0x02, gpioline_info);
ioctl_readwrite!(gpio_get_linehandle, GPIO_IOC_MAGIC, 0x03, gpiohandle_request);
ioctl_readwrite!(gpio_get_lineevent, GPIO_IOC_MAGIC, 0x04, gpioevent_request);

ioctl_readwrite!(gpiohandle_get_line_values, GPIO_IOC_MAGIC, 0x08, gpiohandle_data);
ioctl_readwrite!(gpiohandle_set_line_values, GPIO_IOC_MAGIC, 0x09, gpiohandle_data);
ioctl_readwrite!(gpiohandle_set_config, GPIO_IOC_MAGIC, 0x0A, gpiohandle_config);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn struct_layouts_match_the_kernel() {
        assert_eq!(core::mem::size_of::<gpioline_info>(), 72);
        assert_eq!(core::mem::size_of::<gpiohandle_request>(), 364);
        assert_eq!(core::mem::size_of::<gpiohandle_config>(), 84);
        assert_eq!(core::mem::size_of::<gpiohandle_data>(), 64);
        assert_eq!(core::mem::size_of::<gpioevent_request>(), 48);
        assert_eq!(gpioevent_data::SIZE, 16);
        assert_eq!(core::mem::size_of::<crate::uapi::gpiochip_info>(), 68);
    }

    #[test]
    fn event_record_ignores_padding() {
        let mut buf = [0xAA; gpioevent_data::SIZE];
        buf[0..8].copy_from_slice(&1_500_000_123u64.to_ne_bytes());
        buf[8..12].copy_from_slice(&GPIOEVENT_EVENT_FALLING_EDGE.to_ne_bytes());

        let data = gpioevent_data::from_bytes(&buf);
        assert_eq!(data.timestamp, 1_500_000_123);
        assert_eq!(data.id, GPIOEVENT_EVENT_FALLING_EDGE);
    }
}
