//! Request matching: candidate retrieval, full predicate evaluation, and
//! decision aggregation.
//!
//! This is the hot path; every intercepted request goes through
//! [`Matcher::match_request`]. No allocation beyond one candidate-id
//! scratch vector, no side effects, no locks.

use crate::domain::suffixes;
use crate::hash::hash_domain;
use crate::index::RuleIndex;
use crate::types::{BlockerResult, PartyMask, Request, Rule};

/// Matches requests against one compiled rule set.
pub struct Matcher<'a> {
    rules: &'a [Rule],
    index: &'a RuleIndex,
}

impl<'a> Matcher<'a> {
    pub fn new(rules: &'a [Rule], index: &'a RuleIndex) -> Self {
        Self { rules, index }
    }

    /// Evaluate a request. Deterministic: the result depends only on the
    /// rule set and the request.
    ///
    /// Precedence: any important hit wins outright; otherwise an
    /// exception hit sets the exception flag and `matched` reports
    /// whether any plain blocking rule also hit.
    pub fn match_request(&self, req: &Request<'_>) -> BlockerResult {
        let mut candidates = Vec::with_capacity(16);
        self.index.candidates(req.url, req.host, &mut candidates);

        let mut matched = false;
        let mut exception = false;

        for &id in &candidates {
            let rule = &self.rules[id as usize];
            if !rule_applies(rule, req) {
                continue;
            }
            if rule.is_important() {
                // Highest precedence; order-independent because it is a
                // property of the hit set, not a first-match rule.
                return BlockerResult {
                    matched: true,
                    exception: false,
                    important: true,
                };
            }
            if rule.is_exception() {
                exception = true;
            } else {
                matched = true;
            }
        }

        BlockerResult {
            matched,
            exception,
            important: false,
        }
    }
}

/// Full predicate: every constraint of the rule passes for this request.
fn rule_applies(rule: &Rule, req: &Request<'_>) -> bool {
    // Resource type. An unspecified request type satisfies any mask.
    if !rule.resource_types.is_empty()
        && !req.resource_type.is_empty()
        && !rule.resource_types.intersects(req.resource_type)
    {
        return false;
    }

    // Party restriction, against the authoritative third-party bit
    // (hint-derived when the request has no document context).
    if !rule.party.is_empty() {
        let party = if req.third_party {
            PartyMask::THIRD_PARTY
        } else {
            PartyMask::FIRST_PARTY
        };
        if !rule.party.intersects(party) {
            return false;
        }
    }

    // $domain= constraints are scoped to the source document; with no
    // cross-document context they cannot be evaluated and pass.
    if !req.source_host.is_empty() {
        if !rule.domain_include.is_empty() {
            let included = suffixes(req.source_host)
                .any(|s| rule.domain_include.contains(&hash_domain(s).to_u64()));
            if !included {
                return false;
            }
        }
        if !rule.domain_exclude.is_empty() {
            let excluded = suffixes(req.source_host)
                .any(|s| rule.domain_exclude.contains(&hash_domain(s).to_u64()));
            if excluded {
                return false;
            }
        }
    }

    rule.pattern.matches(req.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::MatchPattern;
    use crate::types::{ResourceTypeMask, RuleFlags};

    struct Setup {
        rules: Vec<Rule>,
        index: RuleIndex,
    }

    impl Setup {
        fn new(specs: &[(&str, RuleFlags)]) -> Self {
            let rules: Vec<Rule> = specs
                .iter()
                .map(|(pattern, flags)| Rule {
                    pattern: MatchPattern::compile(pattern).unwrap(),
                    flags: *flags,
                    resource_types: ResourceTypeMask::empty(),
                    party: PartyMask::empty(),
                    domain_include: Vec::new(),
                    domain_exclude: Vec::new(),
                })
                .collect();
            let index = RuleIndex::build(&rules);
            Self { rules, index }
        }

        fn check(&self, url: &str, source_host: &str, resource_type: &str) -> BlockerResult {
            let matcher = Matcher::new(&self.rules, &self.index);
            let req = Request::new(
                url,
                "",
                source_host,
                false,
                ResourceTypeMask::from_label(resource_type),
            );
            matcher.match_request(&req)
        }
    }

    const BLOCK: RuleFlags = RuleFlags::empty();

    #[test]
    fn no_rules_no_match() {
        let s = Setup::new(&[]);
        assert_eq!(
            s.check("http://example.com/x", "example.com", ""),
            BlockerResult::NO_MATCH
        );
    }

    #[test]
    fn plain_block() {
        let s = Setup::new(&[("||ads.example.com^", BLOCK)]);
        let r = s.check("http://ads.example.com/x.js", "site.com", "script");
        assert!(r.matched && !r.exception && !r.important);
    }

    #[test]
    fn exception_suppresses_block() {
        let s = Setup::new(&[
            ("||ads.example.com^", BLOCK),
            ("||ads.example.com/allowed.js", RuleFlags::EXCEPTION),
        ]);
        let r = s.check("http://ads.example.com/allowed.js", "site.com", "script");
        assert!(r.matched && r.exception && !r.important);

        let r = s.check("http://ads.example.com/other.js", "site.com", "script");
        assert!(r.matched && !r.exception);
    }

    #[test]
    fn exception_alone_reports_no_block() {
        let s = Setup::new(&[("/allowed/", RuleFlags::EXCEPTION)]);
        let r = s.check("http://x.com/allowed/a.js", "x.com", "");
        assert_eq!(
            r,
            BlockerResult { matched: false, exception: true, important: false }
        );
    }

    #[test]
    fn important_beats_exception_regardless_of_order() {
        for specs in [
            &[
                ("||ads.example.com^", RuleFlags::IMPORTANT),
                ("||ads.example.com^", RuleFlags::EXCEPTION),
            ][..],
            &[
                ("||ads.example.com^", RuleFlags::EXCEPTION),
                ("||ads.example.com^", RuleFlags::IMPORTANT),
            ][..],
        ] {
            let s = Setup::new(specs);
            let r = s.check("http://ads.example.com/x", "site.com", "");
            assert_eq!(
                r,
                BlockerResult { matched: true, exception: false, important: true }
            );
        }
    }

    #[test]
    fn deterministic_repeat_calls() {
        let s = Setup::new(&[("/banner/", BLOCK), ("/banner/ok", RuleFlags::EXCEPTION)]);
        let a = s.check("http://x.com/banner/ok.gif", "x.com", "image");
        let b = s.check("http://x.com/banner/ok.gif", "x.com", "image");
        assert_eq!(a, b);
    }

    #[test]
    fn resource_type_mask_filters() {
        let mut s = Setup::new(&[("/tracker.js", BLOCK)]);
        s.rules[0].resource_types = ResourceTypeMask::SCRIPT;
        s.index = RuleIndex::build(&s.rules);

        assert!(s.check("http://x.com/tracker.js", "x.com", "script").matched);
        assert!(!s.check("http://x.com/tracker.js", "x.com", "image").matched);
        // Unspecified type satisfies the mask.
        assert!(s.check("http://x.com/tracker.js", "x.com", "").matched);
    }

    #[test]
    fn third_party_restriction() {
        let mut s = Setup::new(&[("/widget.js", BLOCK)]);
        s.rules[0].party = PartyMask::THIRD_PARTY;
        s.index = RuleIndex::build(&s.rules);

        // cdn.site.com from site.com: first-party, rule skipped.
        assert!(!s.check("http://cdn.site.com/widget.js", "site.com", "").matched);
        // From another registrable domain: third-party.
        assert!(s.check("http://cdn.site.com/widget.js", "other.net", "").matched);
    }

    #[test]
    fn domain_include_scopes_rule_to_source() {
        let mut s = Setup::new(&[("/track.js", BLOCK)]);
        s.rules[0].domain_include = vec![hash_domain("publisher.com").to_u64()];
        s.index = RuleIndex::build(&s.rules);

        assert!(s.check("http://cdn.net/track.js", "publisher.com", "").matched);
        // Subdomain of an included domain still applies via suffix walk.
        assert!(s.check("http://cdn.net/track.js", "news.publisher.com", "").matched);
        assert!(!s.check("http://cdn.net/track.js", "unrelated.com", "").matched);
        // No cross-document context: the constraint cannot be evaluated.
        assert!(s.check("http://cdn.net/track.js", "", "").matched);
    }

    #[test]
    fn domain_exclude_suppresses_rule() {
        let mut s = Setup::new(&[("/track.js", BLOCK)]);
        s.rules[0].domain_exclude = vec![hash_domain("friendly.com").to_u64()];
        s.index = RuleIndex::build(&s.rules);

        assert!(!s.check("http://cdn.net/track.js", "friendly.com", "").matched);
        assert!(s.check("http://cdn.net/track.js", "other.com", "").matched);
    }
}
