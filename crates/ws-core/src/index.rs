//! Rule index: candidate retrieval without scanning every rule.
//!
//! Three lookup structures, built once from the finalized rule list:
//!
//! - pure host-anchor rules (`||domain^`) keyed by domain hash, consulted
//!   by walking the request host's suffixes;
//! - every other rule keyed by ONE token of its pattern, consulted by
//!   looking up every token of the request URL;
//! - a fallback bucket for rules with no safe token, always consulted.
//!
//! Invariant: for any rule whose full predicate matches a URL, the rule
//! id appears in `candidates()` for that URL. Index keys only ever
//! over-approximate; the matcher's full predicate filters false
//! positives.

use std::collections::HashMap;

use crate::domain::suffixes;
use crate::hash::hash_domain;
use crate::types::Rule;
use crate::url::tokenize;

/// Read-only candidate index over a rule list.
#[derive(Debug, Default)]
pub struct RuleIndex {
    host_rules: HashMap<u64, Vec<u32>>,
    token_rules: HashMap<u32, Vec<u32>>,
    fallback: Vec<u32>,
}

/// Bucket counts, for build-time logging and the CLI.
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub host_buckets: usize,
    pub token_buckets: usize,
    pub fallback_rules: usize,
}

impl RuleIndex {
    /// Build the index. All-or-nothing: the result is fully consistent
    /// with `rules`, and rule ids are positions in that slice.
    pub fn build(rules: &[Rule]) -> Self {
        let mut index = RuleIndex::default();

        for (id, rule) in rules.iter().enumerate() {
            let id = id as u32;
            if rule.pattern.is_pure_host_anchor() {
                // anchor_host is present for every pure host anchor
                let host = rule.pattern.anchor_host().unwrap_or_default();
                index
                    .host_rules
                    .entry(hash_domain(host).to_u64())
                    .or_default()
                    .push(id);
            } else if let Some(token) = rule.pattern.best_index_token() {
                index.token_rules.entry(token).or_default().push(id);
            } else {
                index.fallback.push(id);
            }
        }

        index
    }

    /// Collect the ids of every rule that could match `url`, deduplicated
    /// and in ascending order. `host` is the request host (used for the
    /// host-anchor buckets).
    pub fn candidates(&self, url: &str, host: &str, out: &mut Vec<u32>) {
        out.clear();

        for suffix in suffixes(host) {
            if let Some(ids) = self.host_rules.get(&hash_domain(suffix).to_u64()) {
                out.extend_from_slice(ids);
            }
        }

        for token in tokenize(url) {
            if let Some(ids) = self.token_rules.get(&token) {
                out.extend_from_slice(ids);
            }
        }

        out.extend_from_slice(&self.fallback);

        out.sort_unstable();
        out.dedup();
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            host_buckets: self.host_rules.len(),
            token_buckets: self.token_rules.len(),
            fallback_rules: self.fallback.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::MatchPattern;
    use crate::types::{PartyMask, ResourceTypeMask, RuleFlags};

    fn rule(pattern: &str) -> Rule {
        Rule {
            pattern: MatchPattern::compile(pattern).unwrap(),
            flags: RuleFlags::empty(),
            resource_types: ResourceTypeMask::empty(),
            party: PartyMask::empty(),
            domain_include: Vec::new(),
            domain_exclude: Vec::new(),
        }
    }

    fn lookup(index: &RuleIndex, url: &str, host: &str) -> Vec<u32> {
        let mut out = Vec::new();
        index.candidates(url, host, &mut out);
        out
    }

    #[test]
    fn host_anchor_rules_found_via_suffix_walk() {
        let rules = vec![rule("||ads.example.com^")];
        let index = RuleIndex::build(&rules);
        let ids = lookup(
            &index,
            "http://tracker.ads.example.com/x.js",
            "tracker.ads.example.com",
        );
        assert!(ids.contains(&0));
    }

    #[test]
    fn token_rules_found_via_url_tokens() {
        let rules = vec![rule("/banner/"), rule("/analytics^")];
        let index = RuleIndex::build(&rules);

        let ids = lookup(&index, "http://cdn.site.com/banner/ad.png", "cdn.site.com");
        assert!(ids.contains(&0));
        assert!(!ids.contains(&1));

        let ids = lookup(&index, "http://cdn.site.com/analytics", "cdn.site.com");
        assert!(ids.contains(&1));
    }

    /// The load-bearing property: a matching rule is always retrievable.
    /// Each pair here is (pattern, url that the pattern matches); the
    /// pattern set deliberately mixes indexable and fallback shapes.
    #[test]
    fn no_false_negatives() {
        let cases: &[(&str, &str)] = &[
            ("||ads.example.com^", "http://ads.example.com/a.js"),
            ("||ads.example.com^", "http://sub.ads.example.com/a.js"),
            ("||example.com/banner", "http://example.com/banner.png"),
            ("/banner/", "http://site.com/banner/x.gif"),
            ("/banner^", "http://site.com/banner?x=1"),
            // Edge token: "banner" may be a partial run in the URL, so
            // this rule must live in the fallback bucket.
            ("banner", "http://site.com/megabannerx.gif"),
            // Pure wildcard separator shapes.
            ("*/ad", "http://site.com/x/ad"),
            // Short-literal rule, below token length.
            ("/ad/", "http://site.com/ad/i.gif"),
            // Regex fallback.
            (r"/bann?er\d/", "http://site.com/baner3/i.gif"),
            (".swf|", "http://site.com/movie.swf"),
        ];

        let rules: Vec<Rule> = cases.iter().map(|(p, _)| rule(p)).collect();
        let index = RuleIndex::build(&rules);

        for (id, (pattern, url)) in cases.iter().enumerate() {
            let r = &rules[id];
            assert!(
                r.pattern.matches(url),
                "precondition: {pattern:?} should match {url:?}"
            );
            let host = crate::url::extract_host(url).unwrap();
            let ids = lookup(&index, url, host);
            assert!(
                ids.contains(&(id as u32)),
                "index lost rule {pattern:?} for {url:?} (got {ids:?})"
            );
        }
    }

    #[test]
    fn candidates_are_sorted_and_deduped() {
        let rules = vec![rule("/banner/"), rule("banner")];
        let index = RuleIndex::build(&rules);
        // "banner" appears twice in the URL; ids must still be unique.
        let ids = lookup(&index, "http://site.com/banner/banner/", "site.com");
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn stats_reflect_bucket_placement() {
        let rules = vec![rule("||example.com^"), rule("/banner/"), rule("banner")];
        let index = RuleIndex::build(&rules);
        let stats = index.stats();
        assert_eq!(stats.host_buckets, 1);
        assert_eq!(stats.token_buckets, 1);
        assert_eq!(stats.fallback_rules, 1);
    }
}
