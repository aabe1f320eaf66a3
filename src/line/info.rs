use crate::{fixed_str::FixedStr, uapi};

use super::options::{Active, Bias, Direction, Drive};

use uapi::v1::GPIOLINE_FLAG;

/// A snapshot of what the kernel reports about a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo {
    name: FixedStr<{ uapi::GPIO_MAX_NAME_SIZE }>,
    consumer: FixedStr<{ uapi::GPIO_MAX_NAME_SIZE }>,
    offset: u32,
    flags: GPIOLINE_FLAG,
}

impl LineInfo {
    pub(crate) const fn empty(offset: u32) -> Self {
        Self {
            name: FixedStr::empty(),
            consumer: FixedStr::empty(),
            offset,
            flags: GPIOLINE_FLAG::empty(),
        }
    }

    pub(crate) fn from_v1(info: uapi::v1::gpioline_info) -> Self {
        Self {
            name: FixedStr::from_byte_array(info.name),
            consumer: FixedStr::from_byte_array(info.consumer),
            offset: info.line_offset,
            flags: GPIOLINE_FLAG::from_bits_truncate(info.flags),
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Name of the line as set by the chip driver or device tree.
    pub fn name(&self) -> Option<String> {
        self.name.to_option_string()
    }

    /// Label given by whoever holds the line.
    pub fn consumer(&self) -> Option<String> {
        self.consumer.to_option_string()
    }

    pub fn flags(&self) -> GPIOLINE_FLAG {
        self.flags
    }

    /// Lines are considered to be inputs if not explicitly
    /// marked as outputs in the line info flags by the kernel.
    pub fn direction(&self) -> Direction {
        if self.flags.contains(GPIOLINE_FLAG::IS_OUT) {
            Direction::Output
        } else {
            Direction::Input
        }
    }

    pub fn active(&self) -> Active {
        if self.flags.contains(GPIOLINE_FLAG::ACTIVE_LOW) {
            Active::Low
        } else {
            Active::High
        }
    }

    pub fn bias(&self) -> Bias {
        if self.flags.contains(GPIOLINE_FLAG::BIAS_DISABLE) {
            Bias::Disabled
        } else if self.flags.contains(GPIOLINE_FLAG::BIAS_PULL_UP) {
            Bias::PullUp
        } else if self.flags.contains(GPIOLINE_FLAG::BIAS_PULL_DOWN) {
            Bias::PullDown
        } else {
            Bias::AsIs
        }
    }

    pub fn drive(&self) -> Drive {
        if self.flags.contains(GPIOLINE_FLAG::OPEN_DRAIN) {
            Drive::OpenDrain
        } else if self.flags.contains(GPIOLINE_FLAG::OPEN_SOURCE) {
            Drive::OpenSource
        } else {
            Drive::PushPull
        }
    }

    /// True if the line is held by the kernel or by any consumer
    pub fn is_used_by_kernel(&self) -> bool {
        self.flags.contains(GPIOLINE_FLAG::KERNEL)
    }

    pub fn is_active_low(&self) -> bool {
        self.flags.contains(GPIOLINE_FLAG::ACTIVE_LOW)
    }

    pub fn is_open_drain(&self) -> bool {
        self.flags.contains(GPIOLINE_FLAG::OPEN_DRAIN)
    }

    pub fn is_open_source(&self) -> bool {
        self.flags.contains(GPIOLINE_FLAG::OPEN_SOURCE)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_kernel_info() {
        let mut raw = uapi::v1::gpioline_info::new(7);
        raw.flags = (GPIOLINE_FLAG::KERNEL
            | GPIOLINE_FLAG::IS_OUT
            | GPIOLINE_FLAG::OPEN_SOURCE
            | GPIOLINE_FLAG::BIAS_PULL_DOWN)
            .bits();
        raw.name[..4].copy_from_slice(b"LED0");

        let info = LineInfo::from_v1(raw);
        assert_eq!(info.offset(), 7);
        assert_eq!(info.name().as_deref(), Some("LED0"));
        assert_eq!(info.consumer(), None);
        assert_eq!(info.direction(), Direction::Output);
        assert_eq!(info.active(), Active::High);
        assert_eq!(info.bias(), Bias::PullDown);
        assert_eq!(info.drive(), Drive::OpenSource);
        assert!(info.is_used_by_kernel());
    }

    #[test]
    fn empty_info_is_an_unused_input() {
        let info = LineInfo::empty(3);
        assert_eq!(info.direction(), Direction::Input);
        assert_eq!(info.bias(), Bias::AsIs);
        assert_eq!(info.drive(), Drive::PushPull);
        assert!(!info.is_used_by_kernel());
    }
}
