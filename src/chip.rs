use std::{
    fs::{self, OpenOptions},
    os::unix::{
        ffi::OsStrExt,
        fs::{FileTypeExt, MetadataExt},
    },
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, Weak},
};

use bstr::ByteSlice;
use itertools::Itertools;
use log::debug;
use nix::sys::stat::{major, minor};

use crate::{
    device::{Cdev, GpioDevice},
    errors::{io_err, open_err, Error, Result},
    fixed_str::FixedStr,
    line::{Line, LineBulk, LineInfo, LineInner, MAX_LINES},
};

pub(crate) struct ChipInner {
    pub(crate) path: PathBuf,
    pub(crate) device: Box<dyn GpioDevice>,
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) num_lines: u32,
    /// Lines handed out so far, so that one offset maps to one `Line`.
    lines: Mutex<Vec<Weak<LineInner>>>,
}

/// A GPIO Chip maps to the actual device driver instance in hardware that
/// one interacts with to interact with individual GPIOs.  Often these chips
/// map to IP chunks on an SoC but could also be enumerated within the kernel
/// via something like a PCI or USB bus.
///
/// It is best not to assume that a device will always be enumerated in the
/// same order (especially if it is connected via a bus).  In order to reliably
/// find the correct chip, either create a udev rule that sets up a stable
/// symlink, or iterate over [`chips()`] and match on [`Chip::label`].
///
/// Cloning a `Chip` shares the open device. The device stays open while any
/// clone, or any [`Line`] obtained from it, is alive.
#[derive(Clone)]
pub struct Chip {
    inner: Arc<ChipInner>,
}

impl Chip {
    /// Open the GPIO Chip at the provided path (e.g. `/dev/gpiochip<N>`)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let meta = fs::metadata(path).map_err(open_err)?;
        if !meta.file_type().is_char_device() {
            return Err(Error::NotAGpioChip);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(open_err)?;

        Self::from_device(path.to_path_buf(), Box::new(Cdev::new(file)))
    }

    /// Open a chip by number (`"0"`), by device name (`"gpiochip0"`), by
    /// path, or by label.
    pub fn open_lookup(desc: &str) -> Result<Self> {
        if !desc.is_empty() && desc.bytes().all(|b| b.is_ascii_digit()) {
            return Self::open(format!("/dev/gpiochip{desc}"));
        }

        if desc.contains('/') {
            return Self::open(desc);
        }

        let by_name = Path::new("/dev").join(desc);
        if by_name.exists() {
            return Self::open(by_name);
        }

        chips()?
            .flatten()
            .find(|chip| chip.label() == desc)
            .ok_or(Error::NotFound)
    }

    pub(crate) fn from_device(path: PathBuf, device: Box<dyn GpioDevice>) -> Result<Self> {
        let info = device.chip_info().map_err(|e| match e.errno() {
            Some(libc::ENOTTY) | Some(libc::EINVAL) => Error::NotAGpioChip,
            _ => e,
        })?;

        let name = FixedStr::from_byte_array(info.name).to_str_lossy().into_owned();
        let label = FixedStr::from_byte_array(info.label)
            .to_str_lossy()
            .into_owned();

        debug!(
            "opened GPIO chip {} ('{}') at {} with {} lines",
            name,
            label,
            path.display(),
            info.lines
        );

        Ok(Self {
            inner: Arc::new(ChipInner {
                path,
                device,
                name,
                label,
                num_lines: info.lines,
                lines: Mutex::new(vec![Weak::new(); info.lines as usize]),
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<ChipInner>) -> Self {
        Self { inner }
    }

    /// The path this chip was opened from
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// The name of the device driving this GPIO chip in the kernel
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// A functional name for this GPIO chip, such as a product number.  Might
    /// be an empty string.
    ///
    /// As an example, the SoC GPIO chip on a Raspberry Pi is "pinctrl-bcm2835"
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// The number of lines/pins indexable through this chip
    ///
    /// Not all of these may be usable depending on how the hardware is
    /// configured/muxed.
    pub fn num_lines(&self) -> u32 {
        self.inner.num_lines
    }

    /// Get the line at a given offset.
    ///
    /// The actual physical line corresponding to a given offset
    /// is completely dependent on how the driver/hardware for
    /// the chip works as well as the associated board layout.
    ///
    /// While a `Line` for `offset` is alive, this returns that same line. A
    /// new line reads its info from the kernel and fails if that read fails.
    pub fn get_line(&self, offset: u32) -> Result<Line> {
        let out_of_range = Error::OffsetOutOfRange {
            offset,
            num_lines: self.inner.num_lines,
        };
        if offset >= self.inner.num_lines {
            return Err(out_of_range);
        }

        let mut cache = self
            .inner
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = cache.get_mut(offset as usize).ok_or(out_of_range)?;

        if let Some(inner) = slot.upgrade() {
            return Ok(Line::from_inner(inner));
        }

        let inner = Arc::new(LineInner::new(Arc::clone(&self.inner), offset));
        {
            let mut state = inner.lock();
            inner.refresh(&mut state)?;
        }
        *slot = Arc::downgrade(&inner);

        Ok(Line::from_inner(inner))
    }

    /// Get the lines at the given offsets, in that order.
    pub fn get_lines(&self, offsets: &[u32]) -> Result<LineBulk> {
        let mut bulk = LineBulk::new();
        for &offset in offsets {
            bulk.append(self.get_line(offset)?)?;
        }
        Ok(bulk)
    }

    /// Get every line of the chip; fails for chips with more than
    /// [`MAX_LINES`] lines.
    pub fn get_all_lines(&self) -> Result<LineBulk> {
        if self.inner.num_lines as usize > MAX_LINES {
            return Err(Error::CapacityExceeded);
        }

        let offsets: Vec<u32> = (0..self.inner.num_lines).collect();
        self.get_lines(&offsets)
    }

    /// Iterate over all lines of the chip
    pub fn lines(&self) -> impl Iterator<Item = Result<Line>> + '_ {
        (0..self.inner.num_lines).map(move |offset| self.get_line(offset))
    }

    /// Find the first line called `name`. Lines whose info cannot be read
    /// are skipped.
    pub fn find_line(&self, name: &str) -> Option<Line> {
        (0..self.inner.num_lines).find_map(|offset| {
            let info = match self.inner.device.line_info(offset) {
                Ok(info) => LineInfo::from_v1(info),
                Err(e) => {
                    debug!("skipping line {} of {}: {}", offset, self.inner.name, e);
                    return None;
                }
            };
            if info.name().as_deref() != Some(name) {
                return None;
            }

            self.get_line(offset)
                .map_err(|e| debug!("skipping line {} of {}: {}", offset, self.inner.name, e))
                .ok()
        })
    }
}

impl PartialEq for Chip {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Chip {}

impl std::fmt::Debug for Chip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chip")
            .field("path", &self.inner.path)
            .field("name", &self.inner.name)
            .field("label", &self.inner.label)
            .field("num_lines", &self.inner.num_lines)
            .finish()
    }
}

/// True if `path` is a GPIO character device known to the GPIO bus in sysfs.
pub fn is_gpiochip_device(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();

    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.file_type().is_char_device() {
        return false;
    }

    // symlinks made by udev rules point at the real node
    let Ok(real) = fs::canonicalize(path) else {
        return false;
    };
    let Some(name) = real.file_name() else {
        return false;
    };

    let sysfs = Path::new("/sys/bus/gpio/devices").join(name).join("dev");
    let Ok(dev) = fs::read_to_string(sysfs) else {
        return false;
    };

    let rdev = meta.rdev();
    dev.trim() == format!("{}:{}", major(rdev), minor(rdev))
}

/// Iterate over all GPIO chips currently present on this system, sorted by
/// path
pub fn chips() -> Result<ChipIterator> {
    let paths = fs::read_dir("/dev")
        .map_err(io_err)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .map_or(false, |f| f.as_bytes().starts_with_str("gpiochip"))
        })
        .filter(|p| is_gpiochip_device(p))
        .sorted()
        .collect::<Vec<_>>();

    Ok(ChipIterator {
        paths: paths.into_iter(),
    })
}

/// Iterator over chips
#[derive(Debug)]
pub struct ChipIterator {
    paths: std::vec::IntoIter<PathBuf>,
}

impl Iterator for ChipIterator {
    type Item = Result<Chip>;

    fn next(&mut self) -> Option<Result<Chip>> {
        self.paths.next().map(Chip::open)
    }
}

/// Find a line by name on any chip of the system. Chips that cannot be
/// opened are skipped.
pub fn find_line(name: &str) -> Result<Option<Line>> {
    Ok(find_line_in(chips()?, name))
}

fn find_line_in(chips: impl IntoIterator<Item = Result<Chip>>, name: &str) -> Option<Line> {
    chips.into_iter().find_map(|chip| match chip {
        Ok(chip) => chip.find_line(name),
        Err(e) => {
            debug!("skipping chip: {}", e);
            None
        }
    })
}

#[cfg(test)]
mod test {
    use crate::mock::MockChip;

    use super::*;

    #[test]
    fn line_offsets_match() {
        let chip = MockChip::new("gpiochip0", "offsets", 16).chip();
        for offset in 0..chip.num_lines() {
            assert_eq!(chip.get_line(offset).unwrap().offset(), offset);
        }

        assert!(matches!(
            chip.get_line(16),
            Err(Error::OffsetOutOfRange {
                offset: 16,
                num_lines: 16
            })
        ));
    }

    #[test]
    fn same_offset_same_line() {
        let mock = MockChip::new("gpiochip0", "cache", 4);
        let chip = mock.chip();

        let a = chip.get_line(1).unwrap();
        let b = chip.get_line(1).unwrap();
        assert_eq!(a, b);

        a.request_input("cache").unwrap();
        assert!(b.is_requested());
        assert_ne!(a, chip.get_line(2).unwrap());
    }

    #[test]
    fn metadata_is_cached_at_open() {
        let chip = MockChip::new("gpiochip3", "pinctrl-test", 54).chip();
        assert_eq!(chip.name(), "gpiochip3");
        assert_eq!(chip.label(), "pinctrl-test");
        assert_eq!(chip.num_lines(), 54);
        assert_eq!(chip.path(), Path::new("/dev/gpiochip3"));
        assert_eq!(chip.clone(), chip);
    }

    #[test]
    fn find_line_by_name() {
        let mock = MockChip::new("gpiochip0", "names", 8);
        mock.set_name(3, "RESET");
        mock.set_name(6, "RESET");
        let chip = mock.chip();

        let line = chip.find_line("RESET").unwrap();
        assert_eq!(line.offset(), 3);
        assert!(chip.find_line("MISSING").is_none());
    }

    #[test]
    fn find_line_skips_unreadable_lines() {
        let mock = MockChip::new("gpiochip0", "names", 8);
        mock.set_name(2, "RESET");
        mock.set_name(5, "RESET");
        mock.break_line(1);
        mock.break_line(2);
        let chip = mock.chip();

        assert_eq!(chip.find_line("RESET").unwrap().offset(), 5);
    }

    #[test]
    fn find_line_skips_unopenable_chips() {
        let first = MockChip::new("gpiochip0", "first", 4);
        first.set_name(1, "LED");
        let second = MockChip::new("gpiochip1", "second", 4);
        second.set_name(3, "LED");
        second.set_name(0, "BUTTON");

        let chips = vec![
            Err(Error::PermissionDenied),
            Ok(second.chip()),
            Ok(first.chip()),
        ];
        let line = find_line_in(chips, "LED").unwrap();
        assert_eq!(line.chip().name(), "gpiochip1");
        assert_eq!(line.offset(), 3);

        let chips = vec![Err(Error::NotFound), Ok(first.chip())];
        assert!(find_line_in(chips, "BUTTON").is_none());
    }

    #[test]
    fn all_lines() {
        let chip = MockChip::new("gpiochip0", "small", 5).chip();
        let bulk = chip.get_all_lines().unwrap();
        assert_eq!(bulk.offsets().as_slice(), &[0, 1, 2, 3, 4]);
        assert_eq!(chip.lines().count(), 5);

        let big = MockChip::new("gpiochip1", "big", 65).chip();
        assert!(matches!(big.get_all_lines(), Err(Error::CapacityExceeded)));
    }

    #[test]
    fn failed_line_info_fails_get_line() {
        let mock = MockChip::new("gpiochip0", "broken", 4);
        let chip = mock.chip();
        mock.fail_line_info(true);
        assert!(matches!(chip.get_line(0), Err(Error::Ioctl { .. })));

        mock.fail_line_info(false);
        assert!(!chip.get_line(0).unwrap().needs_update());
    }

    #[test]
    fn open_errors() {
        assert!(matches!(
            Chip::open("/dev/this-gpiochip-does-not-exist"),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            Chip::open(env!("CARGO_MANIFEST_DIR")),
            Err(Error::NotAGpioChip)
        ));
        assert!(matches!(Chip::open("/dev/null"), Err(Error::NotAGpioChip)));
        assert!(!is_gpiochip_device("/dev/null"));
        assert!(matches!(
            Chip::open_lookup("/no/such/chip"),
            Err(Error::NotFound)
        ));
    }
}
