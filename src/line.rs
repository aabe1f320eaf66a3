use std::{
    fs::File,
    os::fd::AsRawFd,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::{debug, warn};

use crate::{chip::ChipInner, errors::Result, uapi, Chip};

mod bulk;
mod event;
mod info;
mod option_builder;
pub mod options;
mod request;

pub use bulk::LineBulk;
pub use event::{EventKind, LineEvent};
pub use info::LineInfo;

use options::{Active, Bias, Direction, Drive, RequestFlags, RequestType};

/// Maximum number of lines in one [`LineBulk`] and one kernel request.
pub const MAX_LINES: usize = uapi::v1::GPIOHANDLES_MAX;

/// Values read from a bulk, one per line in bulk order.
pub type LineValues = heapless::Vec<u8, MAX_LINES>;

/// The descriptor behind a multi-line value request.
///
/// Every line requested together holds one `Arc` to the same handle; the
/// descriptor is closed when the last of them lets go.
pub(crate) struct ValueHandle {
    pub(crate) file: File,
    pub(crate) num_lines: usize,
    pub(crate) config: Mutex<HandleConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HandleConfig {
    pub(crate) request_type: RequestType,
    pub(crate) flags: RequestFlags,
}

impl ValueHandle {
    pub(crate) fn config(&self) -> HandleConfig {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_config(&self, config: HandleConfig) {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

impl Drop for ValueHandle {
    fn drop(&mut self) {
        debug!(
            "closing value handle fd {} for {} line(s)",
            self.file.as_raw_fd(),
            self.num_lines
        );
    }
}

pub(crate) enum RequestState {
    Free,
    Values {
        handle: Arc<ValueHandle>,
        /// Position of the line within the handle's request.
        index: usize,
    },
    Events(File),
}

impl RequestState {
    pub(crate) fn is_requested(&self) -> bool {
        !matches!(self, RequestState::Free)
    }
}

pub(crate) struct LineState {
    pub(crate) info: LineInfo,
    pub(crate) up_to_date: bool,
    pub(crate) request: RequestState,
}

pub(crate) struct LineInner {
    pub(crate) chip: Arc<ChipInner>,
    pub(crate) offset: u32,
    state: Mutex<LineState>,
}

impl LineInner {
    pub(crate) fn new(chip: Arc<ChipInner>, offset: u32) -> Self {
        Self {
            chip,
            offset,
            state: Mutex::new(LineState {
                info: LineInfo::empty(offset),
                up_to_date: false,
                request: RequestState::Free,
            }),
        }
    }

    /// A poisoned lock only means another thread panicked mid-operation; the
    /// state itself is always consistent.
    pub(crate) fn lock(&self) -> MutexGuard<'_, LineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn refresh(&self, state: &mut LineState) -> Result<()> {
        match self.chip.device.line_info(self.offset) {
            Ok(raw) => {
                state.info = LineInfo::from_v1(raw);
                state.up_to_date = true;
                Ok(())
            }
            Err(e) => {
                state.up_to_date = false;
                Err(e)
            }
        }
    }

    /// Refresh after a state change. Failure leaves the cache marked stale.
    pub(crate) fn refresh_or_mark_stale(&self, state: &mut LineState) {
        if let Err(e) = self.refresh(state) {
            warn!(
                "failed to refresh info for line {} on {}: {}",
                self.offset, self.chip.name, e
            );
        }
    }
}

/// One line on a chip.
///
/// Cloning a `Line` is cheap and every clone shares the same request state,
/// as does every `Line` the chip hands out for the same offset while one is
/// alive. Accessors read the cached line info, which may be stale; call
/// [`Line::update`] to re-read it from the kernel.
///
/// When the last clone is dropped any request it holds is released.
#[derive(Clone)]
pub struct Line {
    pub(crate) inner: Arc<LineInner>,
}

impl Line {
    pub(crate) fn from_inner(inner: Arc<LineInner>) -> Self {
        Self { inner }
    }

    /// Offset of this line within its chip
    pub fn offset(&self) -> u32 {
        self.inner.offset
    }

    /// The chip this line belongs to
    pub fn chip(&self) -> Chip {
        Chip::from_inner(self.inner.chip.clone())
    }

    /// A copy of the cached line info
    pub fn info(&self) -> LineInfo {
        self.inner.lock().info
    }

    pub fn name(&self) -> Option<String> {
        self.info().name()
    }

    pub fn consumer(&self) -> Option<String> {
        self.info().consumer()
    }

    pub fn direction(&self) -> Direction {
        self.info().direction()
    }

    pub fn active(&self) -> Active {
        self.info().active()
    }

    pub fn bias(&self) -> Bias {
        self.info().bias()
    }

    pub fn drive(&self) -> Drive {
        self.info().drive()
    }

    pub fn is_used_by_kernel(&self) -> bool {
        self.info().is_used_by_kernel()
    }

    pub fn is_active_low(&self) -> bool {
        self.info().is_active_low()
    }

    pub fn is_open_drain(&self) -> bool {
        self.info().is_open_drain()
    }

    pub fn is_open_source(&self) -> bool {
        self.info().is_open_source()
    }

    /// True if this process holds the line, for values or for events
    pub fn is_requested(&self) -> bool {
        self.inner.lock().request.is_requested()
    }

    /// True if the last refresh failed or the line was never read.
    pub fn needs_update(&self) -> bool {
        !self.inner.lock().up_to_date
    }

    /// Re-read the line info from the kernel.
    ///
    /// On failure the cache is marked stale and keeps its last known values.
    pub fn update(&self) -> Result<()> {
        let mut state = self.inner.lock();
        self.inner.refresh(&mut state)
    }
}

impl PartialEq for Line {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Line {}

impl std::fmt::Debug for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("chip", &self.inner.chip.name)
            .field("offset", &self.inner.offset)
            .finish()
    }
}
