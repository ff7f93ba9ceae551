use std::{fmt, ops::Range, str::FromStr};

use crate::error::{LoaderError, RangeError};

/// A span requested by the player. `length: None` means "to the end of the
/// resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self { offset, length }
    }

    pub fn to_end(offset: u64) -> Self {
        Self::new(offset, None)
    }

    pub fn is_to_end(&self) -> bool {
        self.length.is_none()
    }

    /// Resolves the span against a body of `total` bytes.
    ///
    /// The end is clamped to `total`, the start never is: a span that starts
    /// past the end of the body is a protocol violation of the caller.
    pub fn resolve(&self, total: u64) -> Result<Range<usize>, RangeError> {
        let start = self.offset;
        let end = match self.length {
            Some(length) => start.saturating_add(length).min(total),
            None => total,
        };

        if start > total || end < start {
            return Err(RangeError::OutOfBounds {
                offset: self.offset,
                length: self.length,
                total,
            });
        }

        Ok(start as usize..end as usize)
    }
}

impl FromStr for ByteRange {
    type Err = LoaderError;

    /// Parses `OFFSET:LENGTH` or `OFFSET:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LoaderError::InvalidRange(s.to_string());

        let (offset, length) = s.split_once(':').ok_or_else(invalid)?;
        let offset = offset.trim().parse().map_err(|_| invalid())?;
        let length = match length.trim() {
            "" => None,
            length => Some(length.parse().map_err(|_| invalid())?),
        };

        Ok(Self::new(offset, length))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.length {
            Some(length) => write!(f, "{}:{}", self.offset, length),
            None => write!(f, "{}:", self.offset),
        }
    }
}
