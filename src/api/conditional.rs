//! Conditional and range request evaluation for proxied downloads
//!
//! Follows RFC 7232/7233 precedence: If-Match, then If-Unmodified-Since,
//! then If-None-Match, then If-Modified-Since, then If-Range and Range.
//! Objects are served with a synthetic modification time, since the real one
//! is not tracked by the gateway.
//!
//! A request naming several satisfiable ranges is answered with the whole
//! object and 200. `multipart/byteranges` responses are never produced.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap};

use crate::storage::{ByteRange, ObjectInfo};

/// How to answer a GET/HEAD for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServePlan {
    /// 200 with the whole object
    Full,
    /// 206 with one byte range
    Partial(ByteRange),
    /// 304
    NotModified,
    /// 412
    PreconditionFailed,
    /// 416
    Unsatisfiable,
}

/// Truncate to whole seconds, the resolution of HTTP dates
pub fn http_time(time: SystemTime) -> SystemTime {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn opaque_tag(tag: &str) -> &str {
    tag.trim_start_matches("W/")
}

/// Check an entity-tag list header (`*` or comma separated tags) against `etag`
fn etag_list_matches(list: &str, etag: Option<&str>, weak: bool) -> bool {
    list.split(',').map(str::trim).any(|candidate| {
        if candidate == "*" {
            return etag.is_some();
        }
        let Some(etag) = etag else {
            return false;
        };
        if weak {
            opaque_tag(candidate) == opaque_tag(etag)
        } else {
            !candidate.starts_with("W/") && !etag.starts_with("W/") && candidate == etag
        }
    })
}

/// Decide how to serve an object given the request's conditional headers
pub fn evaluate(headers: &HeaderMap, info: &ObjectInfo, modified: SystemTime) -> ServePlan {
    let modified = http_time(modified);
    let etag = info.etag.as_deref();

    // 1. If-Match / 2. If-Unmodified-Since
    if let Some(if_match) = header_str(headers, header::IF_MATCH) {
        if !etag_list_matches(if_match, etag, false) {
            return ServePlan::PreconditionFailed;
        }
    } else if let Some(since) = header_str(headers, header::IF_UNMODIFIED_SINCE) {
        if let Ok(since) = httpdate::parse_http_date(since) {
            if modified > since {
                return ServePlan::PreconditionFailed;
            }
        }
    }

    // 3. If-None-Match / 4. If-Modified-Since
    if let Some(if_none_match) = header_str(headers, header::IF_NONE_MATCH) {
        if etag_list_matches(if_none_match, etag, true) {
            return ServePlan::NotModified;
        }
    } else if let Some(since) = header_str(headers, header::IF_MODIFIED_SINCE) {
        if let Ok(since) = httpdate::parse_http_date(since) {
            if modified <= since {
                return ServePlan::NotModified;
            }
        }
    }

    let Some(range) = header_str(headers, header::RANGE) else {
        return ServePlan::Full;
    };

    // 5. If-Range: a stale validator means the full object
    if let Some(if_range) = header_str(headers, header::IF_RANGE) {
        let fresh = if if_range.starts_with('"') || if_range.starts_with("W/") {
            etag_list_matches(if_range, etag, false)
        } else {
            httpdate::parse_http_date(if_range)
                .map(|date| date == modified)
                .unwrap_or(false)
        };
        if !fresh {
            return ServePlan::Full;
        }
    }

    match parse_range(range, info.size) {
        RangeSpec::Single(range) => ServePlan::Partial(range),
        RangeSpec::Whole => ServePlan::Full,
        RangeSpec::Unsatisfiable => ServePlan::Unsatisfiable,
    }
}

/// Parsed `Range` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    Single(ByteRange),
    /// Several ranges; serve the entire object
    Whole,
    Unsatisfiable,
}

/// Parse a `Range` header value like `bytes=0-499`, `bytes=-500` or `bytes=500-`.
///
/// Requests for more than one satisfiable range are answered with the whole
/// object, which RFC 7233 permits.
pub fn parse_range(value: &str, total_len: u64) -> RangeSpec {
    let Some(specs) = value.trim().strip_prefix("bytes=") else {
        return RangeSpec::Unsatisfiable;
    };

    let mut ranges = Vec::new();
    for part in specs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((start_str, end_str)) = part.split_once('-') else {
            return RangeSpec::Unsatisfiable;
        };
        let (start_str, end_str) = (start_str.trim(), end_str.trim());

        if start_str.is_empty() {
            // Suffix range: bytes=-N (last N bytes)
            let Ok(suffix_len) = end_str.parse::<u64>() else {
                return RangeSpec::Unsatisfiable;
            };
            if suffix_len == 0 || total_len == 0 {
                continue;
            }
            let suffix_len = suffix_len.min(total_len);
            ranges.push(ByteRange {
                start: total_len - suffix_len,
                end: total_len - 1,
            });
        } else {
            let Ok(start) = start_str.parse::<u64>() else {
                return RangeSpec::Unsatisfiable;
            };
            let end = if end_str.is_empty() {
                None
            } else {
                match end_str.parse::<u64>() {
                    Ok(end) if end >= start => Some(end),
                    _ => return RangeSpec::Unsatisfiable,
                }
            };
            if start >= total_len {
                // No overlap with this object
                continue;
            }
            let end = end.map_or(total_len - 1, |end| end.min(total_len - 1));
            ranges.push(ByteRange { start, end });
        }
    }

    match ranges.as_slice() {
        [] => RangeSpec::Unsatisfiable,
        [range] => RangeSpec::Single(*range),
        _ => RangeSpec::Whole,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn info(size: u64) -> ObjectInfo {
        ObjectInfo {
            size,
            etag: Some("\"abc123\"".to_string()),
        }
    }

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn date(time: SystemTime) -> String {
        httpdate::fmt_http_date(time)
    }

    #[test]
    fn test_parse_range_full() {
        assert_eq!(
            parse_range("bytes=0-499", 1000),
            RangeSpec::Single(ByteRange { start: 0, end: 499 })
        );
    }

    #[test]
    fn test_parse_range_open_end() {
        assert_eq!(
            parse_range("bytes=500-", 1000),
            RangeSpec::Single(ByteRange { start: 500, end: 999 })
        );
    }

    #[test]
    fn test_parse_range_suffix() {
        assert_eq!(
            parse_range("bytes=-200", 1000),
            RangeSpec::Single(ByteRange { start: 800, end: 999 })
        );
        // Oversized suffix is clamped to the object
        assert_eq!(
            parse_range("bytes=-2000", 1000),
            RangeSpec::Single(ByteRange { start: 0, end: 999 })
        );
    }

    #[test]
    fn test_parse_range_clamped_end() {
        assert_eq!(
            parse_range("bytes=10-9999", 100),
            RangeSpec::Single(ByteRange { start: 10, end: 99 })
        );
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        assert_eq!(parse_range("bytes=1000-", 100), RangeSpec::Unsatisfiable);
        assert_eq!(parse_range("bytes=-0", 100), RangeSpec::Unsatisfiable);
        assert_eq!(parse_range("bytes=0-0", 0), RangeSpec::Unsatisfiable);
    }

    #[test]
    fn test_parse_range_invalid_format() {
        assert_eq!(parse_range("invalid", 100), RangeSpec::Unsatisfiable);
        assert_eq!(parse_range("bytes=abc-def", 100), RangeSpec::Unsatisfiable);
        assert_eq!(parse_range("bytes=500-100", 1000), RangeSpec::Unsatisfiable);
    }

    #[test]
    fn test_parse_range_multiple_served_whole() {
        assert_eq!(parse_range("bytes=0-9, 20-29", 100), RangeSpec::Whole);
        // Ranges past the end are dropped before counting
        assert_eq!(
            parse_range("bytes=0-9, 200-300", 100),
            RangeSpec::Single(ByteRange { start: 0, end: 9 })
        );
    }

    #[test]
    fn test_no_conditions() {
        let now = SystemTime::now();
        assert_eq!(evaluate(&HeaderMap::new(), &info(10), now), ServePlan::Full);
    }

    #[test]
    fn test_if_none_match() {
        let now = SystemTime::now();
        let h = headers(&[(header::IF_NONE_MATCH, "\"abc123\"")]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::NotModified);

        let h = headers(&[(header::IF_NONE_MATCH, "W/\"abc123\"")]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::NotModified);

        let h = headers(&[(header::IF_NONE_MATCH, "\"other\", \"abc123\"")]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::NotModified);

        let h = headers(&[(header::IF_NONE_MATCH, "\"other\"")]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::Full);
    }

    #[test]
    fn test_if_match() {
        let now = SystemTime::now();
        let h = headers(&[(header::IF_MATCH, "\"other\"")]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::PreconditionFailed);

        let h = headers(&[(header::IF_MATCH, "*")]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::Full);

        // Weak tags never match strongly
        let h = headers(&[(header::IF_MATCH, "W/\"abc123\"")]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::PreconditionFailed);
    }

    #[test]
    fn test_if_modified_since_uses_synthetic_time() {
        let now = SystemTime::now();
        let past = now - Duration::from_secs(3600);
        let future = now + Duration::from_secs(3600);

        let h = headers(&[(header::IF_MODIFIED_SINCE, date(past).as_str())]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::Full);

        let h = headers(&[(header::IF_MODIFIED_SINCE, date(future).as_str())]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::NotModified);
    }

    #[test]
    fn test_if_unmodified_since() {
        let now = SystemTime::now();
        let past = now - Duration::from_secs(3600);

        let h = headers(&[(header::IF_UNMODIFIED_SINCE, date(past).as_str())]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::PreconditionFailed);
    }

    #[test]
    fn test_range_plan() {
        let now = SystemTime::now();
        let h = headers(&[(header::RANGE, "bytes=2-5")]);
        assert_eq!(
            evaluate(&h, &info(10), now),
            ServePlan::Partial(ByteRange { start: 2, end: 5 })
        );

        let h = headers(&[(header::RANGE, "bytes=20-")]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::Unsatisfiable);
    }

    #[test]
    fn test_if_range() {
        let now = SystemTime::now();
        let h = headers(&[(header::RANGE, "bytes=2-5"), (header::IF_RANGE, "\"abc123\"")]);
        assert_eq!(
            evaluate(&h, &info(10), now),
            ServePlan::Partial(ByteRange { start: 2, end: 5 })
        );

        let h = headers(&[(header::RANGE, "bytes=2-5"), (header::IF_RANGE, "\"stale\"")]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::Full);

        let old = date(now - Duration::from_secs(60));
        let h = headers(&[(header::RANGE, "bytes=2-5"), (header::IF_RANGE, old.as_str())]);
        assert_eq!(evaluate(&h, &info(10), now), ServePlan::Full);
    }

    #[test]
    fn test_http_time_truncates() {
        let time = UNIX_EPOCH + Duration::from_millis(1_500);
        assert_eq!(http_time(time), UNIX_EPOCH + Duration::from_secs(1));
    }
}
