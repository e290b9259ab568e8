//! HTTP `Range` header handling for archive downloads.
//!
//! Only single `bytes=` ranges are understood. Multi-range requests and
//! other units are treated as if no range was sent.

/// A parsed `Range: bytes=...` value, before it is checked against a size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=start-end` (inclusive).
    Bounded { start: u64, end: u64 },
    /// `bytes=start-`
    From { start: u64 },
    /// `bytes=-length`: the last `length` bytes.
    Suffix { length: u64 },
}

/// The range cannot be served for a resource of this size (HTTP 416).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("requested range not satisfiable for {size} bytes")]
pub struct RangeNotSatisfiable {
    pub size: u64,
}

/// An inclusive byte window that lies inside the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    pub start: u64,
    pub end: u64,
}

impl ByteWindow {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// `Content-Range` header value for a 206 response.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{size}", self.start, self.end)
    }
}

impl RangeNotSatisfiable {
    /// `Content-Range` header value for a 416 response.
    pub fn content_range(&self) -> String {
        format!("bytes */{}", self.size)
    }
}

/// Parse a `Range` header value. Returns `None` for anything that is not a
/// single well-formed byte range.
pub fn parse_range_header(value: &str) -> Option<RangeSpec> {
    let spec = value.trim().strip_prefix("bytes=")?.trim();
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        (true, true) => None,
        (true, false) => Some(RangeSpec::Suffix {
            length: end.parse().ok()?,
        }),
        (false, true) => Some(RangeSpec::From {
            start: start.parse().ok()?,
        }),
        (false, false) => Some(RangeSpec::Bounded {
            start: start.parse().ok()?,
            end: end.parse().ok()?,
        }),
    }
}

/// Clip a range against the resource size.
pub fn resolve(spec: RangeSpec, size: u64) -> Result<ByteWindow, RangeNotSatisfiable> {
    let unsatisfiable = RangeNotSatisfiable { size };
    if size == 0 {
        return Err(unsatisfiable);
    }
    let last = size - 1;

    match spec {
        RangeSpec::Bounded { start, end } => {
            if start >= size || end < start {
                return Err(unsatisfiable);
            }
            Ok(ByteWindow {
                start,
                end: end.min(last),
            })
        }
        RangeSpec::From { start } => {
            if start >= size {
                return Err(unsatisfiable);
            }
            Ok(ByteWindow { start, end: last })
        }
        RangeSpec::Suffix { length } => {
            if length == 0 {
                return Err(unsatisfiable);
            }
            Ok(ByteWindow {
                start: size.saturating_sub(length),
                end: last,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // -- parsing ---------------------------------------------------------

    #[test]
    fn parses_all_three_forms() {
        assert_eq!(
            parse_range_header("bytes=100-199"),
            Some(RangeSpec::Bounded { start: 100, end: 199 })
        );
        assert_eq!(
            parse_range_header("bytes=500-"),
            Some(RangeSpec::From { start: 500 })
        );
        assert_eq!(
            parse_range_header("bytes=-50"),
            Some(RangeSpec::Suffix { length: 50 })
        );
    }

    #[test]
    fn rejects_unsupported_values() {
        assert_eq!(parse_range_header("items=0-1"), None);
        assert_eq!(parse_range_header("bytes=0-1,5-6"), None);
        assert_eq!(parse_range_header("bytes=-"), None);
        assert_eq!(parse_range_header("bytes=a-b"), None);
    }

    // -- resolution ------------------------------------------------------

    #[test]
    fn bounded_window_in_middle() {
        let window = resolve(RangeSpec::Bounded { start: 100, end: 199 }, 1000).unwrap();
        assert_eq!(window.len(), 100);
        assert_eq!(window.content_range(1000), "bytes 100-199/1000");
    }

    #[test]
    fn end_is_clipped_to_size() {
        let window = resolve(RangeSpec::Bounded { start: 900, end: 5000 }, 1000).unwrap();
        assert_eq!(window, ByteWindow { start: 900, end: 999 });
    }

    #[test]
    fn open_and_suffix_ranges() {
        assert_eq!(
            resolve(RangeSpec::From { start: 10 }, 20).unwrap(),
            ByteWindow { start: 10, end: 19 }
        );
        assert_eq!(
            resolve(RangeSpec::Suffix { length: 5 }, 20).unwrap(),
            ByteWindow { start: 15, end: 19 }
        );
        assert_eq!(
            resolve(RangeSpec::Suffix { length: 50 }, 20).unwrap(),
            ByteWindow { start: 0, end: 19 }
        );
    }

    #[test]
    fn unsatisfiable_ranges() {
        assert_matches!(resolve(RangeSpec::Bounded { start: 1000, end: 1100 }, 1000), Err(_));
        assert_matches!(resolve(RangeSpec::Bounded { start: 10, end: 5 }, 1000), Err(_));
        assert_matches!(resolve(RangeSpec::Suffix { length: 0 }, 1000), Err(_));
        let err = resolve(RangeSpec::From { start: 0 }, 0).unwrap_err();
        assert_eq!(err.content_range(), "bytes */0");
    }
}
