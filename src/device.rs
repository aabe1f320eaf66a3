//! The kernel boundary.
//!
//! Every control call the crate makes goes through [`GpioDevice`]. The
//! character-device implementation issues the ioctls directly; tests swap
//! in a simulated chip.

use std::{
    fs::File,
    os::fd::{AsRawFd, FromRawFd},
};

use crate::{
    errors::{ioctl_err, IoctlKind, Result},
    uapi::{self, v1},
};

pub(crate) trait GpioDevice: Send + Sync {
    fn chip_info(&self) -> Result<uapi::gpiochip_info>;

    fn line_info(&self, offset: u32) -> Result<v1::gpioline_info>;

    /// Request a value handle; on success the returned file owns the new
    /// descriptor.
    fn line_handle(&self, req: &mut v1::gpiohandle_request) -> Result<File>;

    /// Request an event handle for a single line.
    fn line_event(&self, req: &mut v1::gpioevent_request) -> Result<File>;

    fn get_values(&self, handle: &File, data: &mut v1::gpiohandle_data) -> Result<()>;

    fn set_values(&self, handle: &File, data: &mut v1::gpiohandle_data) -> Result<()>;

    fn set_config(&self, handle: &File, config: &mut v1::gpiohandle_config) -> Result<()>;
}

/// An open `/dev/gpiochipN` node.
#[derive(Debug)]
pub(crate) struct Cdev {
    file: File,
}

impl Cdev {
    pub(crate) fn new(file: File) -> Self {
        Self { file }
    }
}

impl GpioDevice for Cdev {
    fn chip_info(&self) -> Result<uapi::gpiochip_info> {
        let mut info = uapi::gpiochip_info::zeroed();
        unsafe { uapi::gpio_get_chipinfo(self.file.as_raw_fd(), &mut info) }
            .map_err(|e| ioctl_err(IoctlKind::ChipInfo, e))?;
        Ok(info)
    }

    fn line_info(&self, offset: u32) -> Result<v1::gpioline_info> {
        let mut info = v1::gpioline_info::new(offset);
        unsafe { v1::gpio_get_lineinfo(self.file.as_raw_fd(), &mut info) }
            .map_err(|e| ioctl_err(IoctlKind::LineInfo, e))?;
        Ok(info)
    }

    fn line_handle(&self, req: &mut v1::gpiohandle_request) -> Result<File> {
        unsafe { v1::gpio_get_linehandle(self.file.as_raw_fd(), req) }
            .map_err(|e| ioctl_err(IoctlKind::LineHandle, e))?;
        // SAFETY: the kernel just created this descriptor and nothing else owns it
        Ok(unsafe { File::from_raw_fd(req.fd) })
    }

    fn line_event(&self, req: &mut v1::gpioevent_request) -> Result<File> {
        unsafe { v1::gpio_get_lineevent(self.file.as_raw_fd(), req) }
            .map_err(|e| ioctl_err(IoctlKind::LineEvent, e))?;
        // SAFETY: as above
        Ok(unsafe { File::from_raw_fd(req.fd) })
    }

    fn get_values(&self, handle: &File, data: &mut v1::gpiohandle_data) -> Result<()> {
        unsafe { v1::gpiohandle_get_line_values(handle.as_raw_fd(), data) }
            .map_err(|e| ioctl_err(IoctlKind::GetValues, e))?;
        Ok(())
    }

    fn set_values(&self, handle: &File, data: &mut v1::gpiohandle_data) -> Result<()> {
        unsafe { v1::gpiohandle_set_line_values(handle.as_raw_fd(), data) }
            .map_err(|e| ioctl_err(IoctlKind::SetValues, e))?;
        Ok(())
    }

    fn set_config(&self, handle: &File, config: &mut v1::gpiohandle_config) -> Result<()> {
        unsafe { v1::gpiohandle_set_config(handle.as_raw_fd(), config) }
            .map_err(|e| ioctl_err(IoctlKind::SetConfig, e))?;
        Ok(())
    }
}
