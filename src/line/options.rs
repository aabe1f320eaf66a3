use bitflags::bitflags;

use crate::errors::Error;

pub use super::option_builder::RequestConfig;

/// How a set of lines is requested from the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    /// Keep whatever direction the line currently has.
    AsIs,
    Input,
    Output,
    EventRisingEdge,
    EventFallingEdge,
    EventBothEdges,
}

impl RequestType {
    pub const fn is_event(self) -> bool {
        matches!(
            self,
            RequestType::EventRisingEdge
                | RequestType::EventFallingEdge
                | RequestType::EventBothEdges
        )
    }

    pub const fn is_output(self) -> bool {
        matches!(self, RequestType::Output)
    }
}

impl TryFrom<i32> for RequestType {
    type Error = Error;

    /// Numeric codes used by binding layers: 1 = as-is up to 6 = both edges.
    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(RequestType::AsIs),
            2 => Ok(RequestType::Input),
            3 => Ok(RequestType::Output),
            4 => Ok(RequestType::EventFallingEdge),
            5 => Ok(RequestType::EventRisingEdge),
            6 => Ok(RequestType::EventBothEdges),
            other => Err(Error::InvalidRequestType(other)),
        }
    }
}

impl From<RequestType> for i32 {
    fn from(ty: RequestType) -> i32 {
        match ty {
            RequestType::AsIs => 1,
            RequestType::Input => 2,
            RequestType::Output => 3,
            RequestType::EventFallingEdge => 4,
            RequestType::EventRisingEdge => 5,
            RequestType::EventBothEdges => 6,
        }
    }
}

bitflags! {
    /// Modifiers applied on top of a [`RequestType`].
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestFlags: u32 {
        const OPEN_DRAIN = (1 << 0);
        const OPEN_SOURCE = (1 << 1);
        const ACTIVE_LOW = (1 << 2);
        const BIAS_DISABLED = (1 << 3);
        const BIAS_PULL_DOWN = (1 << 4);
        const BIAS_PULL_UP = (1 << 5);

        const DRIVE = Self::OPEN_DRAIN.bits() | Self::OPEN_SOURCE.bits();
        const BIAS = Self::BIAS_DISABLED.bits()
            | Self::BIAS_PULL_DOWN.bits()
            | Self::BIAS_PULL_UP.bits();
    }
}

impl RequestFlags {
    /// Reject combinations the kernel would refuse, before any call is made.
    pub fn validate(self, ty: RequestType) -> Result<(), Error> {
        if self.contains(RequestFlags::DRIVE) {
            return Err(Error::InvalidFlags("open-drain and open-source are exclusive"));
        }

        if self.intersection(RequestFlags::BIAS).bits().count_ones() > 1 {
            return Err(Error::InvalidFlags("only one bias setting may be given"));
        }

        if self.intersects(RequestFlags::DRIVE) && !ty.is_output() {
            return Err(Error::InvalidFlags("drive settings require an output request"));
        }

        if self.intersects(RequestFlags::BIAS) && ty == RequestType::AsIs {
            return Err(Error::InvalidFlags("bias settings require an explicit direction"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Active {
    #[default]
    High,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Drive {
    #[default]
    PushPull,
    OpenDrain,
    OpenSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bias {
    /// Whatever the hardware or device tree configured.
    #[default]
    AsIs,
    Disabled,
    PullUp,
    PullDown,
}

impl From<Bias> for RequestFlags {
    fn from(bias: Bias) -> Self {
        match bias {
            Bias::AsIs => RequestFlags::empty(),
            Bias::Disabled => RequestFlags::BIAS_DISABLED,
            Bias::PullUp => RequestFlags::BIAS_PULL_UP,
            Bias::PullDown => RequestFlags::BIAS_PULL_DOWN,
        }
    }
}

impl From<Drive> for RequestFlags {
    fn from(drive: Drive) -> Self {
        match drive {
            Drive::PushPull => RequestFlags::empty(),
            Drive::OpenDrain => RequestFlags::OPEN_DRAIN,
            Drive::OpenSource => RequestFlags::OPEN_SOURCE,
        }
    }
}
