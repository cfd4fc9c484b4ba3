//! Validates a decoded header list against §8.3 of RFC 9113: pseudo-header
//! placement, name casing, and the small set of forbidden or constrained
//! fields. This runs after HPACK decompression — HPACK's job is to restore
//! bytes faithfully, not to judge them.

use crate::error::StreamError;

const REQUEST_PSEUDO_HEADERS: &[&str] = &[":method", ":scheme", ":authority", ":path"];
const RESPONSE_PSEUDO_HEADERS: &[&str] = &[":status"];

const CONNECTION_SPECIFIC: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// RFC 7230 §3.2.6 `token` characters: every byte a header field name may
/// use once the leading `:` (if any) is stripped off.
fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~'
    ) || b.is_ascii_alphanumeric()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Request,
    Response,
    Trailers,
}

/// A header list that has passed validation: pseudo-headers split out from
/// regular fields, in their original order, each value intact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderList {
    pub pseudo: Vec<(String, String)>,
    pub fields: Vec<(String, String)>,
}

pub fn validate(
    stream_id: u32,
    kind: HeaderKind,
    raw: Vec<(String, String)>,
) -> Result<HeaderList, StreamError> {
    let err = || StreamError::protocol(stream_id);
    let allowed_pseudo: &[&str] = match kind {
        HeaderKind::Request => REQUEST_PSEUDO_HEADERS,
        HeaderKind::Response => RESPONSE_PSEUDO_HEADERS,
        HeaderKind::Trailers => &[],
    };

    let mut list = HeaderList::default();
    let mut seen_regular_field = false;
    let mut seen_pseudo = std::collections::HashSet::new();
    let mut content_length: Option<&str> = None;

    for (name, value) in &raw {
        if name.is_empty() {
            return Err(err());
        }
        if name.starts_with(':') {
            if seen_regular_field {
                // pseudo-headers must precede all regular fields, §8.3
                return Err(err());
            }
            if !allowed_pseudo.contains(&name.as_str()) {
                return Err(err());
            }
            if !seen_pseudo.insert(name.clone()) {
                // duplicate pseudo-header
                return Err(err());
            }
        } else {
            if name.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(err());
            }
            if !name.bytes().all(is_token_byte) {
                return Err(err());
            }
            if CONNECTION_SPECIFIC.contains(&name.as_str()) {
                return Err(err());
            }
            if name == "te" && value != "trailers" {
                return Err(err());
            }
            if name == "content-length" {
                match content_length {
                    Some(prev) if prev != value.as_str() => return Err(err()),
                    _ => content_length = Some(value.as_str()),
                }
                if !value.bytes().all(|b| b.is_ascii_digit()) || value.is_empty() {
                    return Err(err());
                }
            }
            seen_regular_field = true;
        }
    }

    if kind == HeaderKind::Request {
        for required in [":method", ":scheme", ":path"] {
            match raw.iter().find(|(n, _)| n == required) {
                Some((_, value)) if value.is_empty() => return Err(err()),
                Some(_) => {}
                None => return Err(err()),
            }
        }
    }
    if kind == HeaderKind::Response {
        match raw.iter().find(|(n, _)| n == ":status") {
            Some((_, value)) if value.len() == 3 && value.bytes().all(|b| b.is_ascii_digit()) => {}
            _ => return Err(err()),
        }
    }
    if kind == HeaderKind::Trailers && !seen_pseudo.is_empty() {
        return Err(err());
    }

    for (name, value) in raw {
        if name.starts_with(':') {
            list.pseudo.push((name, value));
        } else {
            list.fields.push((name, value));
        }
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect()
    }

    #[test]
    fn valid_request_splits_pseudo_and_fields() {
        let raw = pairs(&[
            (":method", "GET"),
            (":scheme", "https"),
            (":path", "/"),
            ("user-agent", "test"),
        ]);
        let list = validate(1, HeaderKind::Request, raw).unwrap();
        assert_eq!(list.pseudo.len(), 3);
        assert_eq!(list.fields, vec![("user-agent".into(), "test".into())]);
    }

    #[test]
    fn missing_required_pseudo_header_is_rejected() {
        let raw = pairs(&[(":method", "GET"), (":scheme", "https")]);
        assert!(validate(1, HeaderKind::Request, raw).is_err());
    }

    #[test]
    fn pseudo_header_after_regular_field_is_rejected() {
        let raw = pairs(&[(":method", "GET"), ("user-agent", "x"), (":path", "/")]);
        assert!(validate(1, HeaderKind::Request, raw).is_err());
    }

    #[test]
    fn uppercase_field_name_is_rejected() {
        let raw = pairs(&[(":method", "GET"), (":scheme", "https"), (":path", "/"), ("Host", "x")]);
        assert!(validate(1, HeaderKind::Request, raw).is_err());
    }

    #[test]
    fn connection_header_is_rejected() {
        let raw = pairs(&[
            (":method", "GET"),
            (":scheme", "https"),
            (":path", "/"),
            ("connection", "keep-alive"),
        ]);
        assert!(validate(1, HeaderKind::Request, raw).is_err());
    }

    #[test]
    fn te_other_than_trailers_is_rejected() {
        let raw = pairs(&[
            (":method", "GET"),
            (":scheme", "https"),
            (":path", "/"),
            ("te", "gzip"),
        ]);
        assert!(validate(1, HeaderKind::Request, raw).is_err());

        let raw_ok = pairs(&[
            (":method", "GET"),
            (":scheme", "https"),
            (":path", "/"),
            ("te", "trailers"),
        ]);
        assert!(validate(1, HeaderKind::Request, raw_ok).is_ok());
    }

    #[test]
    fn conflicting_content_length_is_rejected() {
        let raw = pairs(&[
            (":method", "POST"),
            (":scheme", "https"),
            (":path", "/"),
            ("content-length", "5"),
            ("content-length", "6"),
        ]);
        assert!(validate(1, HeaderKind::Request, raw).is_err());
    }

    #[test]
    fn trailers_forbid_pseudo_headers() {
        let raw = pairs(&[(":status", "200")]);
        assert!(validate(1, HeaderKind::Trailers, raw).is_err());
    }

    #[test]
    fn non_token_field_name_is_rejected() {
        let raw = pairs(&[
            (":method", "GET"),
            (":scheme", "https"),
            (":path", "/"),
            ("bad name", "x"),
        ]);
        assert!(validate(1, HeaderKind::Request, raw).is_err());
    }

    #[test]
    fn host_header_is_rejected() {
        let raw = pairs(&[
            (":method", "GET"),
            (":scheme", "https"),
            (":path", "/"),
            ("host", "example.com"),
        ]);
        assert!(validate(1, HeaderKind::Request, raw).is_err());
    }

    #[test]
    fn empty_path_is_rejected() {
        let raw = pairs(&[(":method", "GET"), (":scheme", "https"), (":path", "")]);
        assert!(validate(1, HeaderKind::Request, raw).is_err());
    }

    #[test]
    fn status_must_be_three_digits() {
        let short = pairs(&[(":status", "20")]);
        assert!(validate(1, HeaderKind::Response, short).is_err());
        let non_digit = pairs(&[(":status", "20x")]);
        assert!(validate(1, HeaderKind::Response, non_digit).is_err());
        let ok = pairs(&[(":status", "200")]);
        assert!(validate(1, HeaderKind::Response, ok).is_ok());
    }
}
