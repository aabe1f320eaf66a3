//! A simulated chip implementing the kernel boundary in-process.
//!
//! Handles are real descriptors (one end of a Unix socket pair) so closing,
//! polling and reading them behave as they would against the kernel. The
//! simulator keeps the other end: it writes event records into it and notices
//! a closed handle when reading from it returns end-of-file.

use std::{
    fs::File,
    io::{ErrorKind, Read, Write},
    os::{
        fd::{AsRawFd, OwnedFd},
        unix::{fs::MetadataExt, net::UnixStream},
    },
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use nix::errno::Errno;

use crate::{
    device::GpioDevice,
    errors::{ioctl_err, IoctlKind, Result},
    fixed_str::FixedStr,
    uapi::{
        self,
        v1::{self, GPIOHANDLE_REQUEST_FLAGS, GPIOLINE_FLAG},
    },
    Chip,
};

#[derive(Debug, Default, Clone)]
struct MockLine {
    name: Option<String>,
    consumer: Option<String>,
    requested: bool,
    output: bool,
    active_low: bool,
    /// Bias and drive bits as reported in line info.
    config: GPIOLINE_FLAG,
    input_level: u8,
    driven_level: u8,
}

impl MockLine {
    fn configure(&mut self, flags: GPIOHANDLE_REQUEST_FLAGS, value: u8) {
        use GPIOHANDLE_REQUEST_FLAGS as F;

        self.active_low = flags.contains(F::ACTIVE_LOW);
        if flags.contains(F::OUTPUT) {
            self.output = true;
            self.driven_level = u8::from(value != 0) ^ u8::from(self.active_low);
        } else if flags.contains(F::INPUT) {
            self.output = false;
        }

        let mut config = GPIOLINE_FLAG::empty();
        config.set(GPIOLINE_FLAG::OPEN_DRAIN, flags.contains(F::OPEN_DRAIN));
        config.set(GPIOLINE_FLAG::OPEN_SOURCE, flags.contains(F::OPEN_SOURCE));
        config.set(GPIOLINE_FLAG::BIAS_DISABLE, flags.contains(F::BIAS_DISABLE));
        config.set(GPIOLINE_FLAG::BIAS_PULL_UP, flags.contains(F::BIAS_PULL_UP));
        config.set(GPIOLINE_FLAG::BIAS_PULL_DOWN, flags.contains(F::BIAS_PULL_DOWN));
        self.config = config;
    }

    fn logical_value(&self) -> u8 {
        let physical = if self.output {
            self.driven_level
        } else {
            self.input_level
        };
        physical ^ u8::from(self.active_low)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleKind {
    Values { output: bool },
    Event,
}

struct MockHandle {
    peer: UnixStream,
    ino: u64,
    offsets: Vec<u32>,
    kind: HandleKind,
}

struct MockState {
    name: String,
    label: String,
    lines: Vec<MockLine>,
    handles: Vec<MockHandle>,
    fail_line_info: bool,
    broken_lines: Vec<u32>,
}

impl MockState {
    /// Forget handles whose user end has been closed and free their lines.
    fn sweep(&mut self) {
        let mut closed = Vec::new();
        self.handles.retain_mut(|h| {
            let mut buf = [0u8; 1];
            let alive = match h.peer.read(&mut buf) {
                Ok(0) => false,
                Ok(_) => true,
                Err(e) => e.kind() == ErrorKind::WouldBlock,
            };
            if !alive {
                closed.extend(h.offsets.iter().copied());
            }
            alive
        });

        for offset in closed {
            let line = &mut self.lines[offset as usize];
            line.requested = false;
            line.consumer = None;
            line.active_low = false;
            line.config = GPIOLINE_FLAG::empty();
        }
    }

    fn claim(
        &mut self,
        kind: IoctlKind,
        offsets: &[u32],
        flags: GPIOHANDLE_REQUEST_FLAGS,
        values: &[u8],
        label: [u8; uapi::GPIO_MAX_NAME_SIZE],
    ) -> Result<()> {
        self.sweep();

        for &offset in offsets {
            match self.lines.get(offset as usize) {
                None => return Err(ioctl_err(kind, Errno::EINVAL)),
                Some(line) if line.requested => return Err(ioctl_err(kind, Errno::EBUSY)),
                Some(_) => {}
            }
        }

        let consumer = FixedStr::from_byte_array(label).to_option_string();
        for (i, &offset) in offsets.iter().enumerate() {
            let line = &mut self.lines[offset as usize];
            line.requested = true;
            line.consumer = consumer.clone();
            line.configure(flags, values.get(i).copied().unwrap_or(0));
        }
        Ok(())
    }

    fn open_handle(&mut self, offsets: Vec<u32>, kind: HandleKind) -> Result<File> {
        let (ours, peer) = UnixStream::pair()?;
        peer.set_nonblocking(true)?;
        let file = File::from(OwnedFd::from(ours));
        let ino = file.metadata()?.ino();

        self.handles.push(MockHandle {
            peer,
            ino,
            offsets,
            kind,
        });
        Ok(file)
    }

    fn handle_index(&mut self, kind: IoctlKind, file: &File) -> Result<usize> {
        self.sweep();
        let ino = file.metadata()?.ino();
        self.handles
            .iter()
            .position(|h| h.ino == ino)
            .ok_or(ioctl_err(kind, Errno::EBADF))
    }

    fn event_handle(&mut self, offset: u32) -> &mut MockHandle {
        self.sweep();
        self.handles
            .iter_mut()
            .find(|h| h.kind == HandleKind::Event && h.offsets == [offset])
            .expect("line has no event handle")
    }
}

#[derive(Clone)]
pub(crate) struct MockChip {
    state: Arc<Mutex<MockState>>,
}

impl MockChip {
    pub(crate) fn new(name: &str, label: &str, num_lines: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                name: name.to_owned(),
                label: label.to_owned(),
                lines: vec![MockLine::default(); num_lines as usize],
                handles: Vec::new(),
                fail_line_info: false,
                broken_lines: Vec::new(),
            })),
        }
    }

    pub(crate) fn chip(&self) -> Chip {
        let path = PathBuf::from(format!("/dev/{}", self.lock().name));
        Chip::from_device(path, Box::new(self.clone())).expect("mock chip opens")
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub(crate) fn set_name(&self, offset: u32, name: &str) {
        self.lock().lines[offset as usize].name = Some(name.to_owned());
    }

    /// Mark a line as held by someone outside this process.
    pub(crate) fn set_kernel_consumer(&self, offset: u32, consumer: &str) {
        let mut state = self.lock();
        let line = &mut state.lines[offset as usize];
        line.requested = true;
        line.consumer = Some(consumer.to_owned());
    }

    /// Level seen on the line while it is an input.
    pub(crate) fn set_pull(&self, offset: u32, high: bool) {
        self.lock().lines[offset as usize].input_level = u8::from(high);
    }

    pub(crate) fn fail_line_info(&self, fail: bool) {
        self.lock().fail_line_info = fail;
    }

    /// Make info queries for one line fail from now on.
    pub(crate) fn break_line(&self, offset: u32) {
        self.lock().broken_lines.push(offset);
    }

    pub(crate) fn is_line_requested(&self, offset: u32) -> bool {
        let mut state = self.lock();
        state.sweep();
        state.lines[offset as usize].requested
    }

    pub(crate) fn open_handles(&self) -> usize {
        let mut state = self.lock();
        state.sweep();
        state.handles.len()
    }

    /// Physical level driven by an output line.
    pub(crate) fn driven_level(&self, offset: u32) -> Option<u8> {
        let state = self.lock();
        let line = &state.lines[offset as usize];
        line.output.then_some(line.driven_level)
    }

    pub(crate) fn push_event(&self, offset: u32, id: u32, timestamp: u64) {
        let record = v1::gpioevent_data { timestamp, id };
        self.push_raw(offset, &record.to_bytes());
    }

    pub(crate) fn push_raw(&self, offset: u32, bytes: &[u8]) {
        let mut state = self.lock();
        let handle = state.event_handle(offset);
        handle.peer.write_all(bytes).expect("event write");
    }
}

impl GpioDevice for MockChip {
    fn chip_info(&self) -> Result<uapi::gpiochip_info> {
        let state = self.lock();
        let mut info = uapi::gpiochip_info::zeroed();
        info.name = FixedStr::truncated(&state.name).into_byte_array();
        info.label = FixedStr::truncated(&state.label).into_byte_array();
        info.lines = state.lines.len() as u32;
        Ok(info)
    }

    fn line_info(&self, offset: u32) -> Result<v1::gpioline_info> {
        let mut state = self.lock();
        if state.fail_line_info || state.broken_lines.contains(&offset) {
            return Err(ioctl_err(IoctlKind::LineInfo, Errno::EIO));
        }
        state.sweep();

        let line = state
            .lines
            .get(offset as usize)
            .ok_or(ioctl_err(IoctlKind::LineInfo, Errno::EINVAL))?;

        let mut flags = line.config;
        flags.set(GPIOLINE_FLAG::KERNEL, line.requested);
        flags.set(GPIOLINE_FLAG::IS_OUT, line.output);
        flags.set(GPIOLINE_FLAG::ACTIVE_LOW, line.active_low);

        let mut info = v1::gpioline_info::new(offset);
        info.flags = flags.bits();
        if let Some(name) = &line.name {
            info.name = FixedStr::truncated(name).into_byte_array();
        }
        if let Some(consumer) = &line.consumer {
            info.consumer = FixedStr::truncated(consumer).into_byte_array();
        }
        Ok(info)
    }

    fn line_handle(&self, req: &mut v1::gpiohandle_request) -> Result<File> {
        let mut state = self.lock();
        let flags = GPIOHANDLE_REQUEST_FLAGS::from_bits_truncate(req.flags);
        let offsets = req.offsets().to_vec();

        state.claim(
            IoctlKind::LineHandle,
            &offsets,
            flags,
            &req.default_values[..offsets.len()],
            req.consumer_label,
        )?;

        let output = flags.contains(GPIOHANDLE_REQUEST_FLAGS::OUTPUT);
        let file = state.open_handle(offsets, HandleKind::Values { output })?;
        req.fd = file.as_raw_fd();
        Ok(file)
    }

    fn line_event(&self, req: &mut v1::gpioevent_request) -> Result<File> {
        let mut state = self.lock();
        let flags = GPIOHANDLE_REQUEST_FLAGS::from_bits_truncate(req.handleflags);

        state.claim(
            IoctlKind::LineEvent,
            &[req.lineoffset],
            flags,
            &[],
            req.consumer_label,
        )?;

        let file = state.open_handle(vec![req.lineoffset], HandleKind::Event)?;
        req.fd = file.as_raw_fd();
        Ok(file)
    }

    fn get_values(&self, handle: &File, data: &mut v1::gpiohandle_data) -> Result<()> {
        let mut state = self.lock();
        let index = state.handle_index(IoctlKind::GetValues, handle)?;

        let state = &*state;
        for (slot, &offset) in data.values.iter_mut().zip(&state.handles[index].offsets) {
            *slot = state.lines[offset as usize].logical_value();
        }
        Ok(())
    }

    fn set_values(&self, handle: &File, data: &mut v1::gpiohandle_data) -> Result<()> {
        let mut state = self.lock();
        let index = state.handle_index(IoctlKind::SetValues, handle)?;
        if state.handles[index].kind != (HandleKind::Values { output: true }) {
            return Err(ioctl_err(IoctlKind::SetValues, Errno::EPERM));
        }

        let offsets = state.handles[index].offsets.clone();
        for (&value, offset) in data.values.iter().zip(offsets) {
            let line = &mut state.lines[offset as usize];
            line.driven_level = u8::from(value != 0) ^ u8::from(line.active_low);
        }
        Ok(())
    }

    fn set_config(&self, handle: &File, config: &mut v1::gpiohandle_config) -> Result<()> {
        let mut state = self.lock();
        let index = state.handle_index(IoctlKind::SetConfig, handle)?;
        if state.handles[index].kind == HandleKind::Event {
            return Err(ioctl_err(IoctlKind::SetConfig, Errno::EINVAL));
        }

        let flags = GPIOHANDLE_REQUEST_FLAGS::from_bits_truncate(config.flags);
        let offsets = state.handles[index].offsets.clone();
        for (&value, offset) in config.default_values.iter().zip(offsets) {
            state.lines[offset as usize].configure(flags, value);
        }

        let output = flags.contains(GPIOHANDLE_REQUEST_FLAGS::OUTPUT);
        state.handles[index].kind = HandleKind::Values { output };
        Ok(())
    }
}
