//! Filter-list rule parser.
//!
//! One line in, zero or one [`Rule`] out. Parse errors are per-line and
//! non-fatal: list compilation skips the line and continues.

use std::net::IpAddr;

use thiserror::Error;

use ws_core::hash::hash_domain;
use ws_core::pattern::PatternError;
use ws_core::{MatchPattern, PartyMask, ResourceTypeMask, Rule, RuleFlags};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown option `{0}`")]
    UnknownOption(String),
    #[error("conflicting options: {0}")]
    ConflictingOptions(&'static str),
    #[error("option set excludes every request")]
    EmptyOptionSet,
    #[error("domain option has no usable domains")]
    EmptyDomainOption,
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Outcome of parsing one line.
#[derive(Debug)]
pub enum ParsedLine {
    Rule(Rule),
    /// Not a network rule; never an error.
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    Comment,
    /// Element-hiding / scriptlet syntax (`##`, `#@#`, `#?#`); cosmetic
    /// rules are out of scope for network blocking.
    Cosmetic,
}

/// Parse one filter-list line.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let mut line = line.trim();

    if line.is_empty() {
        return Ok(ParsedLine::Skip(SkipReason::Empty));
    }
    if line.starts_with('!') || line.starts_with('[') || line.starts_with('#') {
        return Ok(ParsedLine::Skip(SkipReason::Comment));
    }
    if line.contains("##") || line.contains("#@#") || line.contains("#?#") {
        return Ok(ParsedLine::Skip(SkipReason::Cosmetic));
    }

    let mut flags = RuleFlags::empty();
    if let Some(rest) = line.strip_prefix("@@") {
        flags |= RuleFlags::EXCEPTION;
        line = rest.trim_start();
    }

    let (pattern_part, options_part) = match line.find('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    };

    let options = match options_part {
        Some(text) => parse_options(text)?,
        None => ParsedOptions::default(),
    };

    if flags.contains(RuleFlags::EXCEPTION) && options.flags.contains(RuleFlags::IMPORTANT) {
        // Exception and important occupy mutually exclusive precedence
        // roles; refusing the line beats silently dropping one of them.
        return Err(ParseError::ConflictingOptions("`@@` with `important`"));
    }
    flags |= options.flags;

    let pattern_text = pattern_part.trim();

    // Hosts-file syntax: "0.0.0.0 ads.example.com".
    let pattern = if let Some(domain) = parse_hosts_file_domain(pattern_text) {
        MatchPattern::compile(&format!("||{domain}^"))?
    } else {
        MatchPattern::compile(pattern_text)?
    };

    Ok(ParsedLine::Rule(Rule {
        pattern,
        flags,
        resource_types: options.resource_types,
        party: options.party,
        domain_include: options.domain_include,
        domain_exclude: options.domain_exclude,
    }))
}

/// Per-list parse counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListStats {
    pub total_lines: usize,
    pub rules: usize,
    pub comments: usize,
    pub cosmetic: usize,
    /// Candidate lines that failed to parse and were skipped.
    pub errors: usize,
}

impl ListStats {
    /// Lines that looked like network rules (parsed or not).
    pub fn candidate_lines(&self) -> usize {
        self.rules + self.errors
    }
}

/// Parse a whole newline-delimited list. Malformed lines are logged and
/// skipped; this function itself cannot fail.
pub fn parse_filter_list(text: &str) -> (Vec<Rule>, ListStats) {
    let mut rules = Vec::new();
    let mut stats = ListStats::default();

    for (lineno, line) in text.lines().enumerate() {
        stats.total_lines += 1;
        match parse_line(line) {
            Ok(ParsedLine::Rule(rule)) => {
                stats.rules += 1;
                rules.push(rule);
            }
            Ok(ParsedLine::Skip(SkipReason::Cosmetic)) => stats.cosmetic += 1,
            Ok(ParsedLine::Skip(_)) => stats.comments += 1,
            Err(err) => {
                stats.errors += 1;
                log::debug!("skipping rule line {}: {err}", lineno + 1);
            }
        }
    }

    (rules, stats)
}

#[derive(Debug)]
struct ParsedOptions {
    flags: RuleFlags,
    resource_types: ResourceTypeMask,
    party: PartyMask,
    domain_include: Vec<u64>,
    domain_exclude: Vec<u64>,
}

impl Default for ParsedOptions {
    fn default() -> Self {
        Self {
            flags: RuleFlags::empty(),
            resource_types: ResourceTypeMask::empty(),
            party: PartyMask::empty(),
            domain_include: Vec::new(),
            domain_exclude: Vec::new(),
        }
    }
}

fn parse_options(text: &str) -> Result<ParsedOptions, ParseError> {
    let mut flags = RuleFlags::empty();
    let mut type_include = ResourceTypeMask::empty();
    let mut type_exclude = ResourceTypeMask::empty();
    let mut party_include = PartyMask::empty();
    let mut party_exclude = PartyMask::empty();
    let mut domain_include = Vec::new();
    let mut domain_exclude = Vec::new();

    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let lower = raw.to_ascii_lowercase();

        match lower.as_str() {
            "important" => {
                flags |= RuleFlags::IMPORTANT;
                continue;
            }
            "badfilter" => {
                flags |= RuleFlags::BADFILTER;
                continue;
            }
            // Accepted for list compatibility; matching stays
            // case-insensitive.
            "match-case" | "match_case" => continue,
            _ => {}
        }

        if let Some(value) = lower.strip_prefix("domain=") {
            parse_domain_option(value, &mut domain_include, &mut domain_exclude)?;
            continue;
        }

        let (negated, name) = match lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, lower.as_str()),
        };

        if let Some(mask) = option_type_mask(name) {
            if negated {
                type_exclude |= mask;
            } else {
                type_include |= mask;
            }
            continue;
        }

        if let Some(mask) = option_party_mask(name) {
            if negated {
                party_exclude |= mask;
            } else {
                party_include |= mask;
            }
            continue;
        }

        return Err(ParseError::UnknownOption(raw.to_string()));
    }

    Ok(ParsedOptions {
        flags,
        resource_types: finalize_types(type_include, type_exclude)?,
        party: finalize_party(party_include, party_exclude)?,
        domain_include,
        domain_exclude,
    })
}

/// Include/exclude folding: a bare include list restricts to it, a bare
/// exclude list inverts, and a full mask collapses to "unrestricted"
/// (empty).
fn finalize_types(
    include: ResourceTypeMask,
    exclude: ResourceTypeMask,
) -> Result<ResourceTypeMask, ParseError> {
    let mask = if include.is_empty() {
        ResourceTypeMask::ALL & !exclude
    } else {
        include & !exclude
    };
    if mask.is_empty() {
        return Err(ParseError::EmptyOptionSet);
    }
    Ok(if mask == ResourceTypeMask::ALL {
        ResourceTypeMask::empty()
    } else {
        mask
    })
}

fn finalize_party(include: PartyMask, exclude: PartyMask) -> Result<PartyMask, ParseError> {
    let mask = if include.is_empty() {
        PartyMask::ALL & !exclude
    } else {
        include & !exclude
    };
    if mask.is_empty() {
        return Err(ParseError::EmptyOptionSet);
    }
    Ok(if mask == PartyMask::ALL {
        PartyMask::empty()
    } else {
        mask
    })
}

fn parse_domain_option(
    value: &str,
    include: &mut Vec<u64>,
    exclude: &mut Vec<u64>,
) -> Result<(), ParseError> {
    for raw in value.split('|') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (is_exclude, domain_raw) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let Some(domain) = normalize_domain(domain_raw) else {
            continue;
        };
        let key = hash_domain(&domain).to_u64();
        if is_exclude {
            exclude.push(key);
        } else {
            include.push(key);
        }
    }

    if include.is_empty() && exclude.is_empty() {
        return Err(ParseError::EmptyDomainOption);
    }
    if include.iter().any(|k| exclude.contains(k)) {
        return Err(ParseError::ConflictingOptions(
            "domain listed as both include and exclude",
        ));
    }
    Ok(())
}

fn option_type_mask(name: &str) -> Option<ResourceTypeMask> {
    let mask = match name {
        "script" => ResourceTypeMask::SCRIPT,
        "image" => ResourceTypeMask::IMAGE,
        "stylesheet" => ResourceTypeMask::STYLESHEET,
        "object" => ResourceTypeMask::OBJECT,
        "subdocument" => ResourceTypeMask::SUBDOCUMENT,
        "document" | "main_frame" => ResourceTypeMask::MAIN_FRAME,
        "xmlhttprequest" | "xhr" => ResourceTypeMask::XMLHTTPREQUEST,
        "websocket" => ResourceTypeMask::WEBSOCKET,
        "font" => ResourceTypeMask::FONT,
        "media" => ResourceTypeMask::MEDIA,
        "ping" | "beacon" => ResourceTypeMask::PING,
        "other" => ResourceTypeMask::OTHER,
        _ => return None,
    };
    Some(mask)
}

fn option_party_mask(name: &str) -> Option<PartyMask> {
    match name {
        "third-party" | "thirdparty" | "3p" => Some(PartyMask::THIRD_PARTY),
        "first-party" | "firstparty" | "1p" => Some(PartyMask::FIRST_PARTY),
        _ => None,
    }
}

/// Hosts-file line: an IP address followed by a hostname.
fn parse_hosts_file_domain(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    let second = parts.next()?;
    if first.parse::<IpAddr>().is_ok() {
        return normalize_domain(second);
    }
    None
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}
