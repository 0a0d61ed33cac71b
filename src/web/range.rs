/// A single byte range from a `Range: bytes=...` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=a-b`
    Bounded(u64, u64),
    /// `bytes=a-`
    From(u64),
    /// `bytes=-n`, the last n bytes.
    Suffix(u64),
}

/// Parses a Range header. Malformed values and multi-range requests yield
/// `None`, which callers treat as "no range" and answer with the full body.
pub fn parse_range_header(value: &str) -> Option<RangeSpec> {
    let spec = value.trim().strip_prefix("bytes=")?.trim();
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        (true, true) => None,
        (true, false) => end.parse().ok().map(RangeSpec::Suffix),
        (false, true) => start.parse().ok().map(RangeSpec::From),
        (false, false) => {
            let start = start.parse().ok()?;
            let end = end.parse().ok()?;
            Some(RangeSpec::Bounded(start, end))
        }
    }
}

impl RangeSpec {
    /// Inclusive `(start, end)` within an object of `size` bytes, or `None`
    /// when the range cannot be satisfied (answered with 416).
    pub fn resolve(self, size: u64) -> Option<(u64, u64)> {
        if size == 0 {
            return None;
        }
        let last = size - 1;
        match self {
            RangeSpec::Bounded(start, end) => {
                if start > end || start > last {
                    None
                } else {
                    Some((start, end.min(last)))
                }
            }
            RangeSpec::From(start) => (start <= last).then_some((start, last)),
            RangeSpec::Suffix(0) => None,
            RangeSpec::Suffix(n) => Some((size.saturating_sub(n), last)),
        }
    }
}
