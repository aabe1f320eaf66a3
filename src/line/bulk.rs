use std::{
    ops::Index,
    sync::{Arc, MutexGuard},
};

use itertools::Itertools;

use crate::{
    errors::{Error, Result},
    Chip,
};

use super::{Line, LineState, MAX_LINES};

/// An ordered group of up to [`MAX_LINES`] lines from one chip, acted on
/// with a single kernel operation where the kernel allows it.
///
/// Building a bulk never touches the kernel. An empty bulk is valid, but
/// every kernel-facing operation on it fails with [`Error::EmptySet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBulk {
    lines: heapless::Vec<Line, MAX_LINES>,
}

impl LineBulk {
    pub const fn new() -> Self {
        Self {
            lines: heapless::Vec::new(),
        }
    }

    pub fn from_lines(lines: impl IntoIterator<Item = Line>) -> Result<Self> {
        let mut bulk = Self::new();
        for line in lines {
            bulk.append(line)?;
        }
        Ok(bulk)
    }

    /// Add a line to the end of the bulk.
    ///
    /// Fails without modifying the bulk if it is full or if the line belongs
    /// to another chip.
    pub fn append(&mut self, line: Line) -> Result<()> {
        if let Some(first) = self.lines.first() {
            if !Arc::ptr_eq(&first.inner.chip, &line.inner.chip) {
                return Err(Error::ChipMismatch);
            }
        }

        self.lines.push(line).map_err(|_| Error::CapacityExceeded)
    }

    pub fn get(&self, index: usize) -> Result<&Line> {
        self.lines.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.lines.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Line> {
        self.lines.iter()
    }

    pub fn as_slice(&self) -> &[Line] {
        &self.lines
    }

    /// The chip shared by every line, `None` for an empty bulk.
    pub fn chip(&self) -> Option<Chip> {
        self.lines.first().map(Line::chip)
    }

    pub fn offsets(&self) -> heapless::Vec<u32, MAX_LINES> {
        self.lines.iter().map(Line::offset).collect()
    }

    /// The lines of a bulk that a kernel operation may be issued on.
    pub(crate) fn checked_lines(&self) -> Result<&[Line]> {
        if self.lines.is_empty() {
            return Err(Error::EmptySet);
        }

        if let Some(dup) = self.lines.iter().map(Line::offset).duplicates().next() {
            return Err(Error::DuplicateOffset(dup));
        }

        Ok(&self.lines)
    }
}

/// Lock the state of every line, in offset order, returning the guards in
/// bulk order. The lines must be unique.
pub(crate) fn lock_states(lines: &[Line]) -> Vec<MutexGuard<'_, LineState>> {
    let mut guards: Vec<Option<MutexGuard<'_, LineState>>> =
        lines.iter().map(|_| None).collect();

    for (index, line) in lines.iter().enumerate().sorted_by_key(|(_, l)| l.offset()) {
        guards[index] = Some(line.inner.lock());
    }

    guards.into_iter().flatten().collect()
}

impl Index<usize> for LineBulk {
    type Output = Line;

    /// Panics if `index` is out of range; see [`LineBulk::get`].
    fn index(&self, index: usize) -> &Line {
        &self.lines[index]
    }
}

impl From<Line> for LineBulk {
    fn from(line: Line) -> Self {
        let mut lines = heapless::Vec::new();
        // a fresh vector always has room for one line
        let _ = lines.push(line);
        Self { lines }
    }
}

impl<'a> IntoIterator for &'a LineBulk {
    type Item = &'a Line;
    type IntoIter = std::slice::Iter<'a, Line>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

impl IntoIterator for LineBulk {
    type Item = Line;
    type IntoIter = <heapless::Vec<Line, MAX_LINES> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}
