// src/auth/cookies.rs
//! Browser cookie strings as pasted from the developer tools.

const CANARY_COOKIE: &str = "x-owa-canary";

/// Trim and drop one layer of matching surrounding quotes.
pub fn strip_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    let quoted = trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')));
    if quoted {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// `name=value` pairs of a cookie header; parts without `=` are skipped.
pub fn parse_cookie_pairs(raw: &str) -> Vec<(String, String)> {
    strip_quotes(raw)
        .split(';')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            Some((name.trim().to_string(), value.to_string()))
        })
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Re-serialise parsed pairs as a `Cookie` header value.
pub fn cookie_header(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Value of the OWA canary cookie, matched case-insensitively.
pub fn find_canary(pairs: &[(String, String)]) -> Option<&str> {
    pairs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(CANARY_COOKIE))
        .map(|(_, value)| value.as_str())
}
