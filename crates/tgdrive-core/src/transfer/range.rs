//! `Content-Range` / `Range` header codecs for the resumable protocol.

/// Status probe: asks the backend how much of the session it holds.
pub const PROBE_CONTENT_RANGE: &str = "bytes */*";

/// `bytes {start}-{end}/{total}` with an inclusive `end`.
pub fn content_range(start: u64, end_inclusive: u64, total: u64) -> String {
    format!("bytes {start}-{end_inclusive}/{total}")
}

/// Parse a `Range: bytes=0-N` reply into the number of confirmed bytes (`N + 1`).
///
/// Only ranges anchored at 0 are meaningful: the backend always persists a
/// contiguous prefix.
pub fn parse_confirmed_range(header: &str) -> Option<u64> {
    let ranges = header.trim().strip_prefix("bytes=")?;
    // Multi-range reply: the first range is the persisted prefix.
    let first = ranges.split(',').next()?.trim();
    let (start, end) = first.split_once('-')?;
    if start.trim().parse::<u64>().ok()? != 0 {
        return None;
    }
    end.trim().parse::<u64>().ok()?.checked_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_inclusive_content_range() {
        assert_eq!(content_range(0, 1023, 4096), "bytes 0-1023/4096");
        assert_eq!(
            content_range(20_971_520, 26_214_399, 26_214_400),
            "bytes 20971520-26214399/26214400"
        );
    }

    #[test]
    fn parses_confirmed_prefix() {
        assert_eq!(parse_confirmed_range("bytes=0-1048575"), Some(1_048_576));
        assert_eq!(parse_confirmed_range(" bytes=0-0 "), Some(1));
    }

    #[test]
    fn rejects_unusable_ranges() {
        assert_eq!(parse_confirmed_range(""), None);
        assert_eq!(parse_confirmed_range("bytes=0-"), None);
        assert_eq!(parse_confirmed_range("bytes=10-20"), None);
        assert_eq!(parse_confirmed_range("0-20"), None);
        assert_eq!(parse_confirmed_range("bytes=0-abc"), None);
        assert_eq!(parse_confirmed_range("bytes=0-18446744073709551615"), None);
    }
}
