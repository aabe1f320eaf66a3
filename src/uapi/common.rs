use nix::ioctl_read;

pub const GPIO_MAX_NAME_SIZE: usize = 32;
pub(crate) const GPIO_IOC_MAGIC: u8 = 0xB4;

/// Information about a certain GPIO chip
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpiochip_info {
    /// the Linux kernel name of this GPIO chip
    pub name: [u8; GPIO_MAX_NAME_SIZE],
    /// a functional name for this GPIO chip, such as a product number, may
    /// be empty (i.e. label[0] == '\0')
    pub label: [u8; GPIO_MAX_NAME_SIZE],
    /// number of GPIO lines on this chip
    pub lines: u32,
}

impl gpiochip_info {
    pub const fn zeroed() -> Self {
        Self {
            name: [0; GPIO_MAX_NAME_SIZE],
            label: [0; GPIO_MAX_NAME_SIZE],
            lines: 0,
        }
    }
}

ioctl_read!(gpio_get_chipinfo, GPIO_IOC_MAGIC, 0x01, gpiochip_info);
