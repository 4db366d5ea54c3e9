use std::fmt;

use crate::error::InvalidRangeHeader;

/// An inclusive byte interval `[start, end]`, or `[start, ∞)` when `end`
/// is `None`. Produced by [`parse_byte_range`], so `end >= start` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    start: u64,
    end: Option<u64>,
}

impl ByteRange {
    /// Returns `None` if `end` is before `start`.
    pub fn new(start: u64, end: Option<u64>) -> Option<Self> {
        match end {
            Some(end) if end < start => None,
            _ => Some(ByteRange { start, end }),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte position, inclusive.
    pub fn end(&self) -> Option<u64> {
        self.end
    }

    /// Number of bytes covered, `None` for an open-ended range.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| (end - self.start).saturating_add(1))
    }
}

/// Formats as a `Range` request header value, for forwarding the slice
/// to a backend.
impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "bytes={}-{}", self.start, end),
            None => write!(f, "bytes={}-", self.start),
        }
    }
}

/// Parses the value of a `Range` request header into an inclusive
/// [`ByteRange`].
///
/// `Ok(None)` means the whole resource: the header was absent, empty, not
/// a `bytes` range we understand, or a multi-range request. Those are not
/// client errors. A range with no start (this includes the suffix form
/// `bytes=-N`), or whose end is before its start, is rejected with
/// [`InvalidRangeHeader`].
///
/// ```
/// use range_relay::{parse_byte_range, ByteRange};
///
/// assert_eq!(parse_byte_range("bytes=0-499").unwrap(), ByteRange::new(0, Some(499)));
/// assert_eq!(parse_byte_range("bytes=500-").unwrap(), ByteRange::new(500, None));
/// assert_eq!(parse_byte_range(None).unwrap(), None);
/// assert!(parse_byte_range("bytes=-500").is_err());
/// ```
pub fn parse_byte_range<'a>(
    header: impl Into<Option<&'a str>>,
) -> Result<Option<ByteRange>, InvalidRangeHeader> {
    let Some(header) = header.into() else {
        return Ok(None);
    };

    let (start, end) = match parse_request_range(header) {
        None | Some((None, None)) => return Ok(None),
        Some((Some(start), end)) if start >= 0 => match u64::try_from(start) {
            Ok(start) => (start, end),
            // past any addressable offset
            Err(_) => return Ok(None),
        },
        Some(_) => return Err(InvalidRangeHeader::new(header)),
    };

    let end = match end {
        // exclusive from the syntactic stage, inclusive from here on
        Some(end) => match u64::try_from(end - 1) {
            Ok(end) if end >= start => Some(end),
            Ok(_) => return Err(InvalidRangeHeader::new(header)),
            Err(_) if end > 0 => return Ok(None),
            Err(_) => return Err(InvalidRangeHeader::new(header)),
        },
        None => None,
    };

    Ok(Some(ByteRange { start, end }))
}

/// Syntactic stage. Returns `(start, end_exclusive)` in slice terms, so
/// `bytes=0-1` is `(0, 2)` and `bytes=-5` is `(-5, None)`. `None` for
/// anything that is not a single `bytes` range.
fn parse_request_range(header: &str) -> Option<(Option<i128>, Option<i128>)> {
    let (unit, value) = header.split_once('=').unwrap_or((header, ""));
    if unit.trim() != "bytes" {
        return None;
    }

    let value = value.trim();
    let (start, end) = value.split_once('-').unwrap_or((value, ""));
    let start = int_or_none(start)?;
    let end = int_or_none(end)?;

    match (start, end) {
        (None, Some(end)) if end != 0 => Some((end.checked_neg(), None)),
        (Some(start), Some(end)) => Some((Some(start), Some(end.checked_add(1)?))),
        other => Some(other),
    }
}

/// Outer `None` is a parse failure, inner `None` an empty field. `i128`
/// holds every `u64` offset along with its sign.
fn int_or_none(field: &str) -> Option<Option<i128>> {
    let field = field.trim();
    if field.is_empty() {
        return Some(None);
    }
    field.parse().ok().map(Some)
}
