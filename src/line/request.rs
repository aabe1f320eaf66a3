//! Requesting, reconfiguring and releasing lines, and reading and writing
//! their values.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

use crate::{
    device::GpioDevice,
    errors::{Error, Result},
    uapi::v1,
};

use super::{
    bulk::lock_states,
    option_builder::{handle_flags, RequestConfig},
    options::{Direction, RequestFlags, RequestType},
    HandleConfig, Line, LineBulk, LineState, LineValues, RequestState, ValueHandle,
};

type Guards<'a> = Vec<MutexGuard<'a, LineState>>;

impl LineBulk {
    /// Request every line in the bulk.
    ///
    /// Value requests (as-is, input, output) are made with one kernel call
    /// and share one handle. Event requests are made line by line; if one
    /// fails, the lines requested before it are released again and the
    /// original error is returned.
    ///
    /// `default_values`, when given, must hold one value per line and sets
    /// the initial level of output lines.
    pub fn request(&self, config: &RequestConfig<'_>, default_values: Option<&[u8]>) -> Result<()> {
        let lines = self.checked_lines()?;
        config.validate()?;
        if let Some(values) = default_values {
            check_size(lines, values)?;
        }

        let mut states = lock_states(lines);
        if let Some((line, _)) = lines
            .iter()
            .zip(&states)
            .find(|(_, state)| state.request.is_requested())
        {
            return Err(Error::AlreadyRequested(line.offset()));
        }

        if config.request_type().is_event() {
            request_events(lines, &mut states, config)
        } else {
            request_values(lines, &mut states, config, default_values)
        }
    }

    pub fn request_input(&self, consumer: &str) -> Result<()> {
        self.request(&RequestConfig::new(consumer).input(), None)
    }

    pub fn request_output(&self, consumer: &str, default_values: &[u8]) -> Result<()> {
        self.request(&RequestConfig::new(consumer).output(), Some(default_values))
    }

    pub fn request_rising_edge_events(&self, consumer: &str) -> Result<()> {
        self.request(&RequestConfig::new(consumer).rising_edge(), None)
    }

    pub fn request_falling_edge_events(&self, consumer: &str) -> Result<()> {
        self.request(&RequestConfig::new(consumer).falling_edge(), None)
    }

    pub fn request_both_edges_events(&self, consumer: &str) -> Result<()> {
        self.request(&RequestConfig::new(consumer).both_edges(), None)
    }

    /// Return every line to the free state. Lines that are already free
    /// are left alone, so this never fails.
    pub fn release(&self) {
        for line in self.iter() {
            release_line(line);
        }
    }

    /// Read one value per line, in bulk order. Lines sharing a handle are
    /// read with a single kernel call.
    pub fn get_values(&self) -> Result<LineValues> {
        let lines = self.checked_lines()?;
        let states = lock_states(lines);
        read_values(lines, &states)
    }

    /// Write one value per line. Any non-zero value is written as 1.
    ///
    /// Lines of a handle that are not in this bulk keep their current value.
    pub fn set_values(&self, values: &[u8]) -> Result<()> {
        let lines = self.checked_lines()?;
        check_size(lines, values)?;
        let states = lock_states(lines);
        write_values(lines, &states, values)
    }

    /// Change the configuration of lines requested together without
    /// releasing them.
    ///
    /// With `values` set to `None`, output lines keep their current level.
    pub fn set_config(
        &self,
        request_type: RequestType,
        flags: RequestFlags,
        values: Option<&[u8]>,
    ) -> Result<()> {
        let lines = self.checked_lines()?;
        if request_type.is_event() {
            return Err(Error::InvalidRequestType(request_type.into()));
        }
        if let Some(values) = values {
            check_size(lines, values)?;
        }

        let mut states = lock_states(lines);
        apply_config(lines, &mut states, request_type, flags, values)
    }

    /// Change the flags, keeping the current direction and output values.
    pub fn set_flags(&self, flags: RequestFlags) -> Result<()> {
        let lines = self.checked_lines()?;
        let mut states = lock_states(lines);
        let (handle, _) = shared_handle(lines, &states)?;

        let request_type = match handle.config().request_type {
            RequestType::AsIs => match states[0].info.direction() {
                Direction::Input => RequestType::Input,
                Direction::Output => RequestType::Output,
            },
            other => other,
        };

        apply_config(lines, &mut states, request_type, flags, None)
    }

    /// Switch to input, keeping the current flags.
    pub fn set_direction_input(&self) -> Result<()> {
        let lines = self.checked_lines()?;
        let mut states = lock_states(lines);
        let (handle, _) = shared_handle(lines, &states)?;
        let flags = handle.config().flags.difference(RequestFlags::DRIVE);

        apply_config(lines, &mut states, RequestType::Input, flags, None)
    }

    /// Switch to output driving `values`, keeping the current flags.
    pub fn set_direction_output(&self, values: &[u8]) -> Result<()> {
        let lines = self.checked_lines()?;
        check_size(lines, values)?;
        let mut states = lock_states(lines);
        let (handle, _) = shared_handle(lines, &states)?;
        let flags = handle.config().flags;

        apply_config(lines, &mut states, RequestType::Output, flags, Some(values))
    }
}

impl Line {
    /// Request this line on its own; `default_value` is the initial level of
    /// an output.
    pub fn request(&self, config: &RequestConfig<'_>, default_value: u8) -> Result<()> {
        LineBulk::from(self.clone()).request(config, Some(&[default_value]))
    }

    pub fn request_input(&self, consumer: &str) -> Result<()> {
        LineBulk::from(self.clone()).request_input(consumer)
    }

    pub fn request_output(&self, consumer: &str, default_value: u8) -> Result<()> {
        LineBulk::from(self.clone()).request_output(consumer, &[default_value])
    }

    pub fn request_rising_edge_events(&self, consumer: &str) -> Result<()> {
        LineBulk::from(self.clone()).request_rising_edge_events(consumer)
    }

    pub fn request_falling_edge_events(&self, consumer: &str) -> Result<()> {
        LineBulk::from(self.clone()).request_falling_edge_events(consumer)
    }

    pub fn request_both_edges_events(&self, consumer: &str) -> Result<()> {
        LineBulk::from(self.clone()).request_both_edges_events(consumer)
    }

    /// Release this line's share of its request. Lines requested together
    /// with it stay usable until they are released as well.
    pub fn release(&self) {
        LineBulk::from(self.clone()).release()
    }

    pub fn get_value(&self) -> Result<u8> {
        let values = LineBulk::from(self.clone()).get_values()?;
        values.first().copied().ok_or(Error::EmptySet)
    }

    pub fn set_value(&self, value: u8) -> Result<()> {
        LineBulk::from(self.clone()).set_values(&[value])
    }

    pub fn set_config(&self, request_type: RequestType, flags: RequestFlags, value: u8) -> Result<()> {
        LineBulk::from(self.clone()).set_config(request_type, flags, Some(&[value]))
    }

    pub fn set_flags(&self, flags: RequestFlags) -> Result<()> {
        LineBulk::from(self.clone()).set_flags(flags)
    }

    pub fn set_direction_input(&self) -> Result<()> {
        LineBulk::from(self.clone()).set_direction_input()
    }

    pub fn set_direction_output(&self, value: u8) -> Result<()> {
        LineBulk::from(self.clone()).set_direction_output(&[value])
    }
}

fn check_size(lines: &[Line], values: &[u8]) -> Result<()> {
    if values.len() != lines.len() {
        return Err(Error::SizeMismatch {
            expected: lines.len(),
            actual: values.len(),
        });
    }
    Ok(())
}

#[inline]
fn normalise(value: u8) -> u8 {
    u8::from(value != 0)
}

fn refresh_all(lines: &[Line], states: &mut Guards<'_>) {
    for (line, state) in lines.iter().zip(states.iter_mut()) {
        line.inner.refresh_or_mark_stale(state);
    }
}

fn request_values(
    lines: &[Line],
    states: &mut Guards<'_>,
    config: &RequestConfig<'_>,
    default_values: Option<&[u8]>,
) -> Result<()> {
    let chip = &lines[0].inner.chip;

    let mut req = v1::gpiohandle_request::zeroed();
    for (slot, line) in req.lineoffsets.iter_mut().zip(lines) {
        *slot = line.offset();
    }
    req.lines = lines.len() as u32;
    req.flags = config.handle_flags().bits();
    req.consumer_label = config.consumer_label();
    if let (RequestType::Output, Some(values)) = (config.request_type(), default_values) {
        for (slot, value) in req.default_values.iter_mut().zip(values) {
            *slot = normalise(*value);
        }
    }

    let file = chip.device.line_handle(&mut req)?;
    let handle = Arc::new(ValueHandle {
        file,
        num_lines: lines.len(),
        config: Mutex::new(HandleConfig {
            request_type: config.request_type(),
            flags: config.flags(),
        }),
    });

    for (index, state) in states.iter_mut().enumerate() {
        state.request = RequestState::Values {
            handle: Arc::clone(&handle),
            index,
        };
    }

    debug!(
        "requested lines {:?} on {} as {:?} ({:?}) for '{}'",
        req.offsets(),
        chip.name,
        config.request_type(),
        config.flags(),
        config.consumer()
    );

    refresh_all(lines, states);
    Ok(())
}

fn request_events(lines: &[Line], states: &mut Guards<'_>, config: &RequestConfig<'_>) -> Result<()> {
    let chip = &lines[0].inner.chip;

    for (i, line) in lines.iter().enumerate() {
        let mut req = v1::gpioevent_request::new(line.offset());
        req.handleflags = config.handle_flags().bits();
        req.eventflags = config.event_flags().bits();
        req.consumer_label = config.consumer_label();

        match chip.device.line_event(&mut req) {
            Ok(file) => states[i].request = RequestState::Events(file),
            Err(e) => {
                warn!(
                    "event request for line {} on {} failed, releasing {} line(s) requested before it: {}",
                    line.offset(),
                    chip.name,
                    i,
                    e
                );
                for state in states[..i].iter_mut() {
                    state.request = RequestState::Free;
                }
                return Err(e);
            }
        }

        debug!(
            "requested {:?} events on line {} of {} for '{}'",
            config.request_type(),
            line.offset(),
            chip.name,
            config.consumer()
        );
    }

    refresh_all(lines, states);
    Ok(())
}

fn release_line(line: &Line) {
    let mut state = line.inner.lock();
    let previous = std::mem::replace(&mut state.request, RequestState::Free);
    if previous.is_requested() {
        debug!("released line {} on {}", line.offset(), line.inner.chip.name);
    }
}

/// Value handle and handle index of every line; all must hold values.
fn value_targets<'g>(
    lines: &[Line],
    states: &'g [MutexGuard<'_, LineState>],
) -> Result<Vec<(&'g Arc<ValueHandle>, usize)>> {
    lines
        .iter()
        .zip(states)
        .map(|(line, state)| match &state.request {
            RequestState::Values { handle, index } => Ok((handle, *index)),
            _ => Err(Error::NotRequested(line.offset())),
        })
        .collect()
}

/// The one handle every line was requested with, and each line's index in it.
fn shared_handle(
    lines: &[Line],
    states: &[MutexGuard<'_, LineState>],
) -> Result<(Arc<ValueHandle>, Vec<usize>)> {
    let targets = value_targets(lines, states)?;
    let first = targets[0].0;
    if targets.iter().any(|(handle, _)| !Arc::ptr_eq(handle, first)) {
        return Err(Error::HandleMismatch);
    }

    Ok((
        Arc::clone(first),
        targets.into_iter().map(|(_, index)| index).collect(),
    ))
}

/// Current values of a handle when only `covered` of its lines are about to
/// be written, zeros when all of them are.
fn current_or_zeroed(
    device: &dyn GpioDevice,
    handle: &ValueHandle,
    covered: usize,
) -> Result<v1::gpiohandle_data> {
    let mut data = v1::gpiohandle_data::zeroed();
    if covered < handle.num_lines {
        device.get_values(&handle.file, &mut data)?;
    }
    Ok(data)
}

fn read_values(lines: &[Line], states: &[MutexGuard<'_, LineState>]) -> Result<LineValues> {
    if let Some((line, _)) = lines
        .iter()
        .zip(states)
        .find(|(_, state)| !state.request.is_requested())
    {
        return Err(Error::NotRequested(line.offset()));
    }

    let device = lines[0].inner.chip.device.as_ref();
    let mut reads: Vec<(&Arc<ValueHandle>, v1::gpiohandle_data)> = Vec::new();
    let mut values = LineValues::new();

    for (line, state) in lines.iter().zip(states) {
        let value = match &state.request {
            RequestState::Values { handle, index } => {
                let pos = match reads.iter().position(|(h, _)| Arc::ptr_eq(h, handle)) {
                    Some(pos) => pos,
                    None => {
                        let mut data = v1::gpiohandle_data::zeroed();
                        device.get_values(&handle.file, &mut data)?;
                        reads.push((handle, data));
                        reads.len() - 1
                    }
                };
                reads[pos].1.values[*index]
            }
            RequestState::Events(file) => {
                let mut data = v1::gpiohandle_data::zeroed();
                device.get_values(file, &mut data)?;
                data.values[0]
            }
            RequestState::Free => return Err(Error::NotRequested(line.offset())),
        };

        values
            .push(normalise(value))
            .map_err(|_| Error::CapacityExceeded)?;
    }

    Ok(values)
}

fn write_values(lines: &[Line], states: &[MutexGuard<'_, LineState>], values: &[u8]) -> Result<()> {
    let device = lines[0].inner.chip.device.as_ref();
    let targets = value_targets(lines, states)?;

    let mut groups: Vec<(&Arc<ValueHandle>, Vec<(usize, u8)>)> = Vec::new();
    for ((handle, index), value) in targets.into_iter().zip(values) {
        match groups.iter_mut().find(|(h, _)| Arc::ptr_eq(h, handle)) {
            Some((_, members)) => members.push((index, *value)),
            None => groups.push((handle, vec![(index, *value)])),
        }
    }

    for (handle, members) in groups {
        let mut data = current_or_zeroed(device, handle, members.len())?;
        for (index, value) in members {
            data.values[index] = normalise(value);
        }
        device.set_values(&handle.file, &mut data)?;
    }

    Ok(())
}

fn apply_config(
    lines: &[Line],
    states: &mut Guards<'_>,
    request_type: RequestType,
    flags: RequestFlags,
    values: Option<&[u8]>,
) -> Result<()> {
    flags.validate(request_type)?;

    let chip = &lines[0].inner.chip;
    let (handle, indices) = shared_handle(lines, states)?;

    let mut config = v1::gpiohandle_config::zeroed();
    config.flags = handle_flags(request_type, flags).bits();
    if request_type.is_output() {
        let covered = values.map_or(0, |_| indices.len());
        let current = current_or_zeroed(chip.device.as_ref(), &handle, covered)?;
        config.default_values = current.values;
        if let Some(values) = values {
            for (index, value) in indices.iter().zip(values) {
                config.default_values[*index] = normalise(*value);
            }
        }
    }

    chip.device.set_config(&handle.file, &mut config)?;
    handle.set_config(HandleConfig {
        request_type,
        flags,
    });

    debug!(
        "reconfigured lines {:?} on {} as {:?} ({:?})",
        lines.iter().map(Line::offset).collect::<Vec<_>>(),
        chip.name,
        request_type,
        flags
    );

    refresh_all(lines, states);
    Ok(())
}
