//! Compiled filter patterns.
//!
//! A pattern compiles once at parse time into a small op program that the
//! matcher interprets against the request URL; matching allocates nothing
//! and has no mutable state. Plain substring programs dominate real
//! lists; `/…/` regex-literal rules compile to a `regex::Regex` fallback
//! instead of ops.

use regex::Regex;
use thiserror::Error;

use crate::url::{at_boundary, host_span, is_separator, MIN_TOKEN_LEN};

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,
    #[error("invalid regex filter: {0}")]
    Regex(#[from] regex::Error),
}

/// One step of a compiled pattern program.
///
/// Literal payloads are stored lowercased; matching compares
/// ASCII-case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternOp {
    /// Search forward for the literal; cursor moves past the occurrence.
    FindLit(Box<str>),
    /// Search forward for an occurrence of the literal that is followed
    /// by a separator or the end of the URL (a floating `lit^`); the
    /// cursor moves past the separator.
    FindLitBoundary(Box<str>),
    /// The literal must appear exactly at the cursor.
    MatchLit(Box<str>),
    /// The URL must end with the literal, no earlier than the cursor.
    EndLit(Box<str>),
    /// ABP `^`: one separator character, or end of URL.
    Boundary,
    /// Cursor must sit at the end of the URL.
    AssertEnd,
    /// `*`: subsequent literals switch from anchored to searching.
    SkipAny,
    /// `||`: the anchor host must be a domain-level suffix of the URL
    /// host; the cursor moves to the end of the host.
    HostAnchor,
}

/// A compiled, immutable match pattern.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    ops: Vec<PatternOp>,
    anchor_host: Option<Box<str>>,
    regex: Option<Regex>,
    source: Box<str>,
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
impl Eq for MatchPattern {}

impl std::hash::Hash for MatchPattern {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl MatchPattern {
    /// Compile a filter pattern (the part of a rule line before `$`).
    pub fn compile(text: &str) -> Result<Self, PatternError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PatternError::Empty);
        }

        // /…/ regex-literal rules. Slash-delimited text without regex
        // metacharacters (e.g. "/banner/") is an ordinary substring
        // pattern, which is far cheaper; only genuine regexes take the
        // fallback.
        if is_regex_literal(text) {
            let re = Regex::new(&format!("(?i){}", &text[1..text.len() - 1]))?;
            return Ok(Self {
                ops: Vec::new(),
                anchor_host: None,
                regex: Some(re),
                source: text.into(),
            });
        }

        let mut rest = text;
        let mut ops = Vec::new();
        let mut anchor_host = None;

        let host_anchored = rest.starts_with("||");
        let start_anchored = !host_anchored && rest.starts_with('|');
        if host_anchored {
            rest = rest[2..].trim_start_matches('.');
        } else if start_anchored {
            rest = &rest[1..];
        }

        let end_anchored = rest.ends_with('|');
        if end_anchored {
            rest = &rest[..rest.len() - 1];
        }

        if host_anchored {
            let host_len = rest
                .find(|c| matches!(c, '/' | '^' | '*' | '?' | ':' | '|'))
                .unwrap_or(rest.len());
            let host = &rest[..host_len];
            if host.contains('*') || host.is_empty() {
                // Wildcard inside the anchor host defeats the host-suffix
                // shortcut; translate the whole pattern instead.
                return Self::compile_as_regex(text);
            }
            anchor_host = Some(host.to_ascii_lowercase().into());
            ops.push(PatternOp::HostAnchor);
            rest = &rest[host_len..];
        }

        // `anchored` tracks whether the next literal must match at the
        // cursor or may search forward.
        let mut anchored = host_anchored || start_anchored;
        let mut lit = String::new();
        for c in rest.chars() {
            match c {
                '*' => {
                    flush_literal(&mut ops, &mut lit, &mut anchored);
                    if ops.last() != Some(&PatternOp::SkipAny) {
                        ops.push(PatternOp::SkipAny);
                    }
                    anchored = false;
                }
                '^' => {
                    if !lit.is_empty() {
                        let payload: Box<str> = lit.as_str().into();
                        if anchored {
                            ops.push(PatternOp::MatchLit(payload));
                            ops.push(PatternOp::Boundary);
                        } else {
                            ops.push(PatternOp::FindLitBoundary(payload));
                        }
                        lit.clear();
                    } else if anchored {
                        ops.push(PatternOp::Boundary);
                    } else {
                        // `^` at an unpinned position (pattern start or
                        // right after `*`) has search semantics the op
                        // program cannot express.
                        return Self::compile_as_regex(text);
                    }
                    anchored = true;
                }
                _ => lit.extend(c.to_lowercase()),
            }
        }
        flush_literal(&mut ops, &mut lit, &mut anchored);

        if end_anchored {
            // Rewrite a trailing searched literal into a suffix check so
            // the interpreter needs no backtracking.
            match ops.pop() {
                Some(PatternOp::FindLit(l)) => ops.push(PatternOp::EndLit(l)),
                Some(PatternOp::MatchLit(l)) => {
                    ops.push(PatternOp::MatchLit(l));
                    ops.push(PatternOp::AssertEnd);
                }
                Some(op) => {
                    ops.push(op);
                    ops.push(PatternOp::AssertEnd);
                }
                None => ops.push(PatternOp::AssertEnd),
            }
        }

        if ops.is_empty() {
            return Err(PatternError::Empty);
        }

        Ok(Self {
            ops,
            anchor_host,
            regex: None,
            source: text.into(),
        })
    }

    /// Fallback for patterns the op program cannot express.
    fn compile_as_regex(text: &str) -> Result<Self, PatternError> {
        let mut re = String::with_capacity(text.len() + 16);
        re.push_str("(?i)");
        let mut rest = text;
        if let Some(r) = rest.strip_prefix("||") {
            re.push_str(r"^[a-z][a-z0-9+.-]*://([^/?#]*\.)?");
            rest = r;
        } else if let Some(r) = rest.strip_prefix('|') {
            re.push('^');
            rest = r;
        }
        let end = rest.ends_with('|');
        if end {
            rest = &rest[..rest.len() - 1];
        }
        for c in rest.chars() {
            match c {
                '*' => re.push_str(".*"),
                '^' => re.push_str(r"([^a-zA-Z0-9%]|$)"),
                c if "\\.+?()[]{}|$".contains(c) => {
                    re.push('\\');
                    re.push(c);
                }
                c => re.push(c),
            }
        }
        if end {
            re.push('$');
        }
        Ok(Self {
            ops: Vec::new(),
            anchor_host: None,
            regex: Some(Regex::new(&re)?),
            source: text.into(),
        })
    }

    /// The original pattern text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The `||` anchor host, if this pattern is host-anchored.
    pub fn anchor_host(&self) -> Option<&str> {
        self.anchor_host.as_deref()
    }

    /// True when the program is a bare host anchor (`||domain^`,
    /// `||domain`, `||domain|`) with no path constraint; such rules are
    /// indexed by domain hash rather than by URL token.
    pub fn is_pure_host_anchor(&self) -> bool {
        self.anchor_host.is_some()
            && self.ops.iter().all(|op| {
                matches!(
                    op,
                    PatternOp::HostAnchor | PatternOp::Boundary | PatternOp::AssertEnd
                )
            })
    }

    /// True when this pattern fell back to a regex.
    pub fn is_regex(&self) -> bool {
        self.regex.is_some()
    }

    /// Match the pattern against `url`. Pure; no allocation on the op
    /// path.
    pub fn matches(&self, url: &str) -> bool {
        if let Some(re) = &self.regex {
            return re.is_match(url);
        }

        let bytes = url.as_bytes();
        let mut pos = 0usize;

        for op in &self.ops {
            match op {
                PatternOp::HostAnchor => {
                    let Some((host_start, host_end)) = host_span(url) else {
                        return false;
                    };
                    let anchor = self.anchor_host.as_deref().unwrap_or("");
                    if !host_suffix_matches(&url[host_start..host_end], anchor) {
                        return false;
                    }
                    pos = host_end;
                }
                PatternOp::MatchLit(lit) => {
                    if !starts_with_ignore_case(&bytes[pos..], lit.as_bytes()) {
                        return false;
                    }
                    pos += lit.len();
                }
                PatternOp::FindLit(lit) => {
                    match find_ignore_case(&bytes[pos..], lit.as_bytes()) {
                        Some(i) => pos += i + lit.len(),
                        None => return false,
                    }
                }
                PatternOp::FindLitBoundary(lit) => {
                    // Retry later occurrences: the first hit may be
                    // followed by an alphanumeric character while a later
                    // one sits on a boundary.
                    let mut search = pos;
                    loop {
                        let Some(i) = find_ignore_case(&bytes[search..], lit.as_bytes()) else {
                            return false;
                        };
                        let end = search + i + lit.len();
                        if at_boundary(url, end) {
                            pos = if end < bytes.len() { end + 1 } else { end };
                            break;
                        }
                        search += i + 1;
                    }
                }
                PatternOp::EndLit(lit) => {
                    if bytes.len() < pos + lit.len()
                        || !ends_with_ignore_case(bytes, lit.as_bytes())
                    {
                        return false;
                    }
                    pos = bytes.len();
                }
                PatternOp::Boundary => {
                    if pos < bytes.len() && is_separator(bytes[pos]) {
                        pos += 1;
                    } else if !at_boundary(url, pos) {
                        return false;
                    }
                }
                PatternOp::AssertEnd => {
                    if pos != bytes.len() {
                        return false;
                    }
                }
                PatternOp::SkipAny => {}
            }
        }
        true
    }

    /// The hashed token this rule should be indexed under, or `None` when
    /// the pattern has no token that is guaranteed to appear as a
    /// complete alphanumeric run in every matching URL (such rules go to
    /// the index fallback bucket).
    ///
    /// A literal's interior tokens always qualify. An edge token
    /// qualifies only when the neighboring program position pins a
    /// non-alphanumeric boundary: a `^`, an anchor, the end of the URL,
    /// or a non-alphanumeric literal character. Scheme names are never
    /// used (URL tokenization starts after the scheme).
    pub fn best_index_token(&self) -> Option<u32> {
        if self.regex.is_some() {
            return None;
        }

        let mut best: Option<(usize, u32)> = None;
        let mut consider = |token: &[u8]| {
            if token.len() < MIN_TOKEN_LEN || is_scheme_token(token) {
                return;
            }
            let hash = crate::url::hash_run(token);
            if best.map_or(true, |(len, _)| token.len() > len) {
                best = Some((token.len(), hash));
            }
        };

        for (i, op) in self.ops.iter().enumerate() {
            let (lit, left_pinned, right_pinned) = match op {
                PatternOp::FindLit(l) => (l, false, self.pins_boundary(i + 1)),
                PatternOp::FindLitBoundary(l) => (l, false, true),
                PatternOp::MatchLit(l) => (l, self.pins_boundary_before(i), self.pins_boundary(i + 1)),
                PatternOp::EndLit(l) => (l, false, true),
                _ => continue,
            };
            for (run, at_start, at_end) in alnum_runs(lit.as_bytes()) {
                let ok_left = !at_start || left_pinned;
                let ok_right = !at_end || right_pinned;
                if ok_left && ok_right {
                    consider(run);
                }
            }
        }

        // Host-anchor labels are always complete runs in the URL host.
        if let Some(host) = self.anchor_host.as_deref() {
            for label in host.split('.') {
                consider(label.as_bytes());
            }
        }

        best.map(|(_, hash)| hash)
    }

    /// Does the op at `idx` (the one *after* a literal) guarantee a
    /// non-alphanumeric character or end-of-URL right after it?
    fn pins_boundary(&self, idx: usize) -> bool {
        matches!(
            self.ops.get(idx),
            Some(PatternOp::Boundary) | Some(PatternOp::AssertEnd)
        )
    }

    /// Does the op *before* a `MatchLit` at `idx` pin the left boundary?
    fn pins_boundary_before(&self, idx: usize) -> bool {
        if idx == 0 {
            // Left-anchored literal at URL start; tokenization starts at
            // the scheme end, so a leading run only survives when the URL
            // has no scheme. Treat as unpinned unless it follows `||`.
            return false;
        }
        matches!(
            self.ops.get(idx - 1),
            Some(PatternOp::Boundary) | Some(PatternOp::HostAnchor)
        )
    }
}

fn is_regex_literal(text: &str) -> bool {
    text.len() > 2
        && text.starts_with('/')
        && text.ends_with('/')
        && text[1..text.len() - 1]
            .bytes()
            .any(|b| matches!(b, b'\\' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'+' | b'$'))
}

fn flush_literal(ops: &mut Vec<PatternOp>, lit: &mut String, anchored: &mut bool) {
    if lit.is_empty() {
        return;
    }
    let payload: Box<str> = lit.as_str().into();
    ops.push(if *anchored {
        PatternOp::MatchLit(payload)
    } else {
        PatternOp::FindLit(payload)
    });
    lit.clear();
    *anchored = true;
}

/// `anchor` equals the host, or the host ends with `.anchor`.
fn host_suffix_matches(host: &str, anchor: &str) -> bool {
    if host.len() == anchor.len() {
        return host.eq_ignore_ascii_case(anchor);
    }
    host.len() > anchor.len()
        && host.as_bytes()[host.len() - anchor.len() - 1] == b'.'
        && host[host.len() - anchor.len()..].eq_ignore_ascii_case(anchor)
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

fn ends_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len()
        && haystack[haystack.len() - needle.len()..].eq_ignore_ascii_case(needle)
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Yield each alphanumeric run of `lit` with flags marking whether it
/// touches the literal's start or end.
fn alnum_runs(lit: &[u8]) -> impl Iterator<Item = (&[u8], bool, bool)> {
    let mut runs = Vec::new();
    let mut start = None;
    for i in 0..=lit.len() {
        let alnum = i < lit.len() && lit[i].is_ascii_alphanumeric();
        match (alnum, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((&lit[s..i], s == 0, i == lit.len()));
                start = None;
            }
            _ => {}
        }
    }
    runs.into_iter()
}

fn is_scheme_token(token: &[u8]) -> bool {
    matches!(token, b"http" | b"https" | b"wss" | b"data")
}
