//! URL helpers for the hot path.
//!
//! Everything here works on string slices and avoids allocating; these
//! functions run for every intercepted request.

use crate::hash::hash_token_bytes;

/// Position just past `scheme://` (or past `data:` which has no slashes).
#[inline]
pub fn scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();
    let colon = bytes.iter().position(|&b| b == b':')?;

    if bytes.len() > colon + 2 && bytes[colon + 1] == b'/' && bytes[colon + 2] == b'/' {
        return Some(colon + 3);
    }
    if colon >= 4 && bytes[..colon].eq_ignore_ascii_case(b"data") {
        return Some(colon + 1);
    }
    None
}

/// Byte span `(start, end)` of the hostname inside `url`, excluding
/// userinfo and port.
#[inline]
pub fn host_span(url: &str) -> Option<(usize, usize)> {
    let start = scheme_end(url)?;
    let bytes = url.as_bytes();

    let mut host_start = start;
    for (i, &b) in bytes[start..].iter().enumerate() {
        if b == b'@' {
            host_start = start + i + 1;
            break;
        }
        if b == b'/' {
            break;
        }
    }

    let mut host_end = bytes.len();
    for (i, &b) in bytes[host_start..].iter().enumerate() {
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = host_start + i;
            break;
        }
    }

    Some((host_start, host_end))
}

/// Hostname slice of `url`, or `None` when the URL has no recognizable
/// authority component.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (start, end) = host_span(url)?;
    Some(&url[start..end])
}

/// Separator class used by the ABP `^` placeholder: end of string or any
/// byte that is neither alphanumeric nor `%`.
#[inline]
pub fn is_separator(b: u8) -> bool {
    !b.is_ascii_alphanumeric() && b != b'%'
}

/// True when `pos` in `s` sits on a `^` boundary.
#[inline]
pub fn at_boundary(s: &str, pos: usize) -> bool {
    pos >= s.len() || is_separator(s.as_bytes()[pos])
}

pub const MIN_TOKEN_LEN: usize = 3;

/// Hash every alphanumeric run of at least [`MIN_TOKEN_LEN`] bytes in
/// `url`, starting after the scheme. Tokens are lowercased before
/// hashing. Every run is kept: the rule index relies on every token of a
/// matching URL being visible, so no truncation is allowed here.
pub fn tokenize(url: &str) -> Vec<u32> {
    let bytes = url.as_bytes();
    let mut tokens = Vec::with_capacity(16);
    let start = scheme_end(url).unwrap_or(0);

    let mut run_start = None;
    for i in start..=bytes.len() {
        let in_run = i < bytes.len() && bytes[i].is_ascii_alphanumeric();
        match (in_run, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                if i - s >= MIN_TOKEN_LEN {
                    tokens.push(hash_run(&bytes[s..i]));
                }
                run_start = None;
            }
            _ => {}
        }
    }
    tokens
}

/// Hash one alphanumeric run, lowercased. Runs longer than the stack
/// buffer are truncated for keying purposes only; the full predicate
/// still checks the real pattern.
#[inline]
pub(crate) fn hash_run(run: &[u8]) -> u32 {
    let mut buf = [0u8; 64];
    let len = run.len().min(buf.len());
    for (dst, &src) in buf[..len].iter_mut().zip(run) {
        *dst = src.to_ascii_lowercase();
    }
    hash_token_bytes(&buf[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_end_variants() {
        assert_eq!(scheme_end("https://example.com"), Some(8));
        assert_eq!(scheme_end("http://example.com"), Some(7));
        assert_eq!(scheme_end("wss://example.com"), Some(6));
        assert_eq!(scheme_end("data:text/html"), Some(5));
        assert_eq!(scheme_end("no scheme here"), None);
    }

    #[test]
    fn host_extraction() {
        assert_eq!(extract_host("https://example.com/path"), Some("example.com"));
        assert_eq!(extract_host("https://example.com:8080/x"), Some("example.com"));
        assert_eq!(
            extract_host("https://user:pw@example.com/x"),
            Some("example.com")
        );
        assert_eq!(extract_host("https://sub.example.com"), Some("sub.example.com"));
        assert_eq!(extract_host("not-a-url"), None);
    }

    #[test]
    fn boundary_semantics() {
        assert!(at_boundary("abc", 3));
        assert!(at_boundary("abc/def", 3));
        assert!(!at_boundary("abc", 1));
        // % is URL-encoding, not a separator
        assert!(!at_boundary("ab%2f", 2));
    }

    #[test]
    fn tokenize_finds_path_and_host_tokens() {
        let tokens = tokenize("https://cdn.example.com/assets/analytics.js");
        assert!(tokens.contains(&hash_run(b"cdn")));
        assert!(tokens.contains(&hash_run(b"example")));
        assert!(tokens.contains(&hash_run(b"analytics")));
        // "js" is below the minimum token length
        assert!(!tokens.contains(&hash_run(b"js")));
    }

    #[test]
    fn tokenize_is_case_insensitive() {
        let a = tokenize("https://example.com/Analytics.JS");
        let b = tokenize("https://example.com/analytics.js");
        assert_eq!(a, b);
    }

    #[test]
    fn tokenize_skips_scheme() {
        let tokens = tokenize("https://example.com/");
        assert!(!tokens.contains(&hash_run(b"https")));
    }
}
