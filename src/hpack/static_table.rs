//! RFC 7541 Appendix A — the 61-entry static table, indices 1..=61. Ported
//! from the name/value pairs the teacher's stub already had right; only the
//! surrounding encoder/decoder were unimplemented there.

pub const STATIC_TABLE: [(&str, &str); 61] = [
    (":authority", ""),
    (":method", "GET"),
    (":method", "POST"),
    (":path", "/"),
    (":path", "/index.html"),
    (":scheme", "http"),
    (":scheme", "https"),
    (":status", "200"),
    (":status", "204"),
    (":status", "206"),
    (":status", "304"),
    (":status", "400"),
    (":status", "404"),
    (":status", "500"),
    ("accept-charset", ""),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("accept", ""),
    ("access-control-allow-origin", ""),
    ("age", ""),
    ("allow", ""),
    ("authorization", ""),
    ("cache-control", ""),
    ("content-disposition", ""),
    ("content-encoding", ""),
    ("content-language", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("cookie", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("host", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("link", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("refresh", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("strict-transport-security", ""),
    ("transfer-encoding", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("www-authenticate", ""),
];

/// 1-based lookup, as the wire format addresses it.
pub fn get(index: usize) -> Option<(&'static str, &'static str)> {
    STATIC_TABLE.get(index.checked_sub(1)?).copied()
}

/// Finds an exact `(name, value)` match, for encoding a fully indexed field.
pub fn find_exact(name: &str, value: &str) -> Option<usize> {
    STATIC_TABLE
        .iter()
        .position(|&(n, v)| n == name && v == value)
        .map(|i| i + 1)
}

/// Finds a name-only match, for encoding a literal with an indexed name.
pub fn find_name(name: &str) -> Option<usize> {
    STATIC_TABLE
        .iter()
        .position(|&(n, _)| n == name)
        .map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_one_is_authority() {
        assert_eq!(get(1), Some((":authority", "")));
    }

    #[test]
    fn index_sixty_one_is_www_authenticate() {
        assert_eq!(get(61), Some(("www-authenticate", "")));
    }

    #[test]
    fn index_zero_and_out_of_range_are_none() {
        assert_eq!(get(0), None);
        assert_eq!(get(62), None);
    }

    #[test]
    fn exact_and_name_lookup() {
        assert_eq!(find_exact(":method", "GET"), Some(2));
        assert_eq!(find_exact(":method", "PATCH"), None);
        assert_eq!(find_name(":method"), Some(2));
        assert_eq!(find_name("nonexistent-header"), None);
    }
}
