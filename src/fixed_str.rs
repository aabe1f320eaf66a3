use std::borrow::Cow;

use bstr::ByteSlice;

/// A NUL-terminated string stored in a fixed-size byte array, as used by the
/// kernel for chip names, line names and consumer labels.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedStr<const N: usize> {
    s: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    #[inline]
    pub const fn empty() -> Self {
        Self { s: [0; N] }
    }

    /// Copy `s`, truncating at a character boundary so that the terminating
    /// NUL always fits.
    pub fn truncated(s: &str) -> Self {
        let mut end = s.len().min(N.saturating_sub(1));
        while !s.is_char_boundary(end) {
            end -= 1;
        }

        let mut f = Self::empty();
        f.s[..end].copy_from_slice(&s.as_bytes()[..end]);
        f
    }

    /// Take a byte array filled in by the kernel. Anything after the first
    /// NUL is cleared.
    pub fn from_byte_array(mut bytes: [u8; N]) -> Self {
        let nul = find_nul(&bytes);
        if nul < N {
            bytes[nul..].fill(0);
        }

        FixedStr { s: bytes }
    }

    pub const fn into_byte_array(self) -> [u8; N] {
        self.s
    }

    #[inline]
    pub fn len(&self) -> usize {
        find_nul(&self.s)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        N == 0 || self.s[0] == 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.s[..self.len()]
    }

    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        self.as_bytes().to_str_lossy()
    }

    /// `None` when the kernel left the field empty.
    pub fn to_option_string(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.to_str_lossy().into_owned())
        }
    }
}

impl<const N: usize> Default for FixedStr<N> {
    #[inline(always)]
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> std::fmt::Debug for FixedStr<N> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FixedStr").field(&self.to_str_lossy()).finish()
    }
}

impl<const N: usize> std::fmt::Display for FixedStr<N> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_str_lossy().fmt(f)
    }
}

#[inline]
fn find_nul(s: &[u8]) -> usize {
    s.find_byte(0).unwrap_or(s.len())
}
