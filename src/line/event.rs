use std::{
    io::{self, Read},
    os::fd::{AsFd, AsRawFd, RawFd},
    time::Duration,
};

use nix::{
    poll::{ppoll, PollFd, PollFlags},
    sys::time::TimeSpec,
};

use crate::{
    errors::{errno_err, io_err, Error, Result},
    uapi::v1::{gpioevent_data, GPIOEVENT_EVENT_FALLING_EDGE, GPIOEVENT_EVENT_RISING_EDGE},
};

use super::{bulk::lock_states, Line, LineBulk, RequestState, MAX_LINES};

/// Most records returned by one [`Line::event_read_multiple`].
pub const MAX_EVENTS_PER_READ: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Rising,
    Falling,
}

/// One edge seen on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEvent {
    line: Line,
    timestamp_ns: u64,
    kind: EventKind,
}

impl LineEvent {
    fn from_record(line: Line, data: gpioevent_data) -> Result<Self> {
        let kind = match data.id {
            GPIOEVENT_EVENT_RISING_EDGE => EventKind::Rising,
            GPIOEVENT_EVENT_FALLING_EDGE => EventKind::Falling,
            other => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown GPIO event id {other}"),
                )))
            }
        };

        Ok(Self {
            line,
            timestamp_ns: data.timestamp,
            kind,
        })
    }

    /// The line the event was read from
    pub fn line(&self) -> &Line {
        &self.line
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Best estimate of when the edge happened, on the kernel's monotonic
    /// clock.
    pub fn timestamp(&self) -> Duration {
        Duration::from_nanos(self.timestamp_ns)
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }
}

impl LineBulk {
    /// Block until at least one line has an event pending or `timeout`
    /// passes; `None` waits forever.
    ///
    /// Returns the lines with pending events in bulk order. An empty bulk
    /// means the timeout expired. A signal delivered during the wait ends it
    /// with [`Error::Interrupted`].
    ///
    /// A descriptor reporting an error or hang-up also counts as ready, so
    /// the following read surfaces the failure.
    pub fn event_wait(&self, timeout: Option<Duration>) -> Result<LineBulk> {
        let lines = self.checked_lines()?;
        let states = lock_states(lines);

        let mut fds: heapless::Vec<PollFd<'_>, MAX_LINES> = heapless::Vec::new();
        for (line, state) in lines.iter().zip(&states) {
            let RequestState::Events(file) = &state.request else {
                return Err(Error::NotRequested(line.offset()));
            };
            fds.push(PollFd::new(
                file.as_fd(),
                PollFlags::POLLIN | PollFlags::POLLPRI,
            ))
            .map_err(|_| Error::CapacityExceeded)?;
        }

        let ready = ppoll(&mut fds, timeout.map(TimeSpec::from), None).map_err(errno_err)?;

        let mut bulk = LineBulk::new();
        if ready > 0 {
            for (line, fd) in lines.iter().zip(fds.iter()) {
                if fd.revents().map_or(false, |ev| !ev.is_empty()) {
                    bulk.append(line.clone())?;
                }
            }
        }

        Ok(bulk)
    }
}

impl Line {
    /// Wait for an event on this line. `Ok(false)` means the timeout passed.
    pub fn event_wait(&self, timeout: Option<Duration>) -> Result<bool> {
        let ready = LineBulk::from(self.clone()).event_wait(timeout)?;
        Ok(!ready.is_empty())
    }

    /// Read exactly one event, blocking until one is available.
    pub fn event_read(&self) -> Result<LineEvent> {
        let mut buf = [0u8; gpioevent_data::SIZE];
        let n = self.read_event_records(&mut buf)?;
        if n != buf.len() {
            return Err(short_read());
        }

        LineEvent::from_record(self.clone(), gpioevent_data::from_bytes(&buf))
    }

    /// Read every pending event, up to [`MAX_EVENTS_PER_READ`], with a single
    /// read.
    pub fn event_read_multiple(&self) -> Result<Vec<LineEvent>> {
        let mut buf = [0u8; gpioevent_data::SIZE * MAX_EVENTS_PER_READ];
        let n = self.read_event_records(&mut buf)?;
        if n == 0 || n % gpioevent_data::SIZE != 0 {
            return Err(short_read());
        }

        buf[..n]
            .chunks_exact(gpioevent_data::SIZE)
            .map(|chunk| {
                let mut record = [0u8; gpioevent_data::SIZE];
                record.copy_from_slice(chunk);
                LineEvent::from_record(self.clone(), gpioevent_data::from_bytes(&record))
            })
            .collect()
    }

    /// The event descriptor, for use in an external poll loop. It stays
    /// owned by the line and is closed on release.
    pub fn event_fd(&self) -> Result<RawFd> {
        match &self.inner.lock().request {
            RequestState::Events(file) => Ok(file.as_raw_fd()),
            _ => Err(Error::NotRequested(self.offset())),
        }
    }

    fn read_event_records(&self, buf: &mut [u8]) -> Result<usize> {
        let state = self.inner.lock();
        let RequestState::Events(file) = &state.request else {
            return Err(Error::NotRequested(self.offset()));
        };

        let mut reader: &std::fs::File = file;
        reader.read(buf).map_err(io_err)
    }
}

/// Event records are fixed size; anything else breaks the protocol.
fn short_read() -> Error {
    Error::Io(io::Error::from_raw_os_error(libc::EIO))
}
