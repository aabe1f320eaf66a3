use crate::{errors::Result, fixed_str::FixedStr, uapi};

use super::options::*;

use uapi::v1::{GPIOEVENT_REQUEST_FLAGS, GPIOHANDLE_REQUEST_FLAGS};

/// Everything needed to request a set of lines.
///
/// ```
/// use gpio_lines::line::options::{Bias, RequestConfig, RequestType};
///
/// const BUTTON: RequestConfig = RequestConfig::new("doorbell")
///     .falling_edge()
///     .active_low()
///     .with_bias(Bias::PullUp);
///
/// assert_eq!(BUTTON.request_type(), RequestType::EventFallingEdge);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestConfig<'a> {
    pub(super) consumer: &'a str,
    pub(super) request_type: RequestType,
    pub(super) flags: RequestFlags,
}

impl<'a> RequestConfig<'a> {
    /// An as-is request labelled with `consumer`.
    pub const fn new(consumer: &'a str) -> Self {
        Self {
            consumer,
            request_type: RequestType::AsIs,
            flags: RequestFlags::empty(),
        }
    }

    pub const fn with_type(self, request_type: RequestType) -> Self {
        Self {
            request_type,
            ..self
        }
    }

    pub const fn as_is(self) -> Self {
        self.with_type(RequestType::AsIs)
    }

    pub const fn input(self) -> Self {
        self.with_type(RequestType::Input)
    }

    pub const fn output(self) -> Self {
        self.with_type(RequestType::Output)
    }

    pub const fn rising_edge(self) -> Self {
        self.with_type(RequestType::EventRisingEdge)
    }

    pub const fn falling_edge(self) -> Self {
        self.with_type(RequestType::EventFallingEdge)
    }

    pub const fn both_edges(self) -> Self {
        self.with_type(RequestType::EventBothEdges)
    }

    pub const fn with_flags(self, flags: RequestFlags) -> Self {
        Self {
            flags: self.flags.union(flags),
            ..self
        }
    }

    pub const fn active_low(self) -> Self {
        self.with_flags(RequestFlags::ACTIVE_LOW)
    }

    pub const fn with_active(self, active: Active) -> Self {
        let flags = self.flags.difference(RequestFlags::ACTIVE_LOW);
        let flags = match active {
            Active::Low => flags.union(RequestFlags::ACTIVE_LOW),
            Active::High => flags,
        };
        Self { flags, ..self }
    }

    /// Replaces any bias set earlier.
    pub const fn with_bias(self, bias: Bias) -> Self {
        let flags = self.flags.difference(RequestFlags::BIAS);
        let flags = match bias {
            Bias::AsIs => flags,
            Bias::Disabled => flags.union(RequestFlags::BIAS_DISABLED),
            Bias::PullUp => flags.union(RequestFlags::BIAS_PULL_UP),
            Bias::PullDown => flags.union(RequestFlags::BIAS_PULL_DOWN),
        };
        Self { flags, ..self }
    }

    /// Replaces any drive mode set earlier.
    pub const fn with_drive(self, drive: Drive) -> Self {
        let flags = self.flags.difference(RequestFlags::DRIVE);
        let flags = match drive {
            Drive::PushPull => flags,
            Drive::OpenDrain => flags.union(RequestFlags::OPEN_DRAIN),
            Drive::OpenSource => flags.union(RequestFlags::OPEN_SOURCE),
        };
        Self { flags, ..self }
    }

    pub const fn consumer(&self) -> &'a str {
        self.consumer
    }

    pub const fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub const fn flags(&self) -> RequestFlags {
        self.flags
    }

    pub fn validate(&self) -> Result<()> {
        self.flags.validate(self.request_type)
    }

    pub(crate) fn consumer_label(&self) -> [u8; uapi::GPIO_MAX_NAME_SIZE] {
        FixedStr::truncated(self.consumer).into_byte_array()
    }

    pub(crate) const fn handle_flags(&self) -> GPIOHANDLE_REQUEST_FLAGS {
        handle_flags(self.request_type, self.flags)
    }

    pub(crate) const fn event_flags(&self) -> GPIOEVENT_REQUEST_FLAGS {
        match self.request_type {
            RequestType::EventRisingEdge => GPIOEVENT_REQUEST_FLAGS::RISING_EDGE,
            RequestType::EventFallingEdge => GPIOEVENT_REQUEST_FLAGS::FALLING_EDGE,
            RequestType::EventBothEdges => GPIOEVENT_REQUEST_FLAGS::BOTH_EDGES,
            _ => GPIOEVENT_REQUEST_FLAGS::empty(),
        }
    }
}

/// Translate a request type and modifiers to kernel handle flags. Event
/// requests always read their line as an input.
pub(crate) const fn handle_flags(ty: RequestType, flags: RequestFlags) -> GPIOHANDLE_REQUEST_FLAGS {
    use GPIOHANDLE_REQUEST_FLAGS as F;

    let out = match ty {
        RequestType::AsIs => F::empty(),
        RequestType::Output => F::OUTPUT,
        RequestType::Input
        | RequestType::EventRisingEdge
        | RequestType::EventFallingEdge
        | RequestType::EventBothEdges => F::INPUT,
    };

    let out = if flags.contains(RequestFlags::ACTIVE_LOW) {
        out.union(F::ACTIVE_LOW)
    } else {
        out
    };

    let out = if flags.contains(RequestFlags::OPEN_DRAIN) {
        out.union(F::OPEN_DRAIN)
    } else if flags.contains(RequestFlags::OPEN_SOURCE) {
        out.union(F::OPEN_SOURCE)
    } else {
        out
    };

    if flags.contains(RequestFlags::BIAS_DISABLED) {
        out.union(F::BIAS_DISABLE)
    } else if flags.contains(RequestFlags::BIAS_PULL_UP) {
        out.union(F::BIAS_PULL_UP)
    } else if flags.contains(RequestFlags::BIAS_PULL_DOWN) {
        out.union(F::BIAS_PULL_DOWN)
    } else {
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use uapi::v1::GPIOHANDLE_REQUEST_FLAGS as F;

    #[test]
    fn input_flags() {
        let config = RequestConfig::new("test")
            .input()
            .active_low()
            .with_bias(Bias::PullDown);

        assert_eq!(
            config.handle_flags(),
            F::INPUT | F::ACTIVE_LOW | F::BIAS_PULL_DOWN
        );
        assert_eq!(config.event_flags(), GPIOEVENT_REQUEST_FLAGS::empty());
    }

    #[test]
    fn output_flags() {
        let config = RequestConfig::new("test")
            .output()
            .with_drive(Drive::OpenSource)
            .with_drive(Drive::OpenDrain);

        assert_eq!(config.handle_flags(), F::OUTPUT | F::OPEN_DRAIN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn event_requests_read_as_input() {
        let config = RequestConfig::new("test").both_edges().with_bias(Bias::Disabled);

        assert_eq!(config.handle_flags(), F::INPUT | F::BIAS_DISABLE);
        assert_eq!(config.event_flags(), GPIOEVENT_REQUEST_FLAGS::BOTH_EDGES);
    }

    #[test]
    fn as_is_sets_no_direction() {
        let config = RequestConfig::new("test").active_low();
        assert_eq!(config.handle_flags(), F::ACTIVE_LOW);
    }

    #[test]
    fn active_and_bias_replace() {
        let config = RequestConfig::new("test")
            .input()
            .active_low()
            .with_active(Active::High)
            .with_bias(Bias::PullUp)
            .with_bias(Bias::AsIs);

        assert_eq!(config.flags(), RequestFlags::empty());
    }

    #[test]
    fn long_consumer_is_truncated() {
        let label = RequestConfig::new("a-consumer-label-that-is-far-too-long-for-the-kernel")
            .consumer_label();
        assert_eq!(&label[..31], b"a-consumer-label-that-is-far-to");
        assert_eq!(label[31], 0);
    }
}
