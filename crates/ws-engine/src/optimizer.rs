//! Rule-list optimization before index construction.
//!
//! Removes exact duplicates (large public lists overlap heavily) and
//! applies `$badfilter` cancellation: a badfilter rule deletes the
//! otherwise-identical rule, then disappears itself.

use std::collections::HashSet;

use ws_core::{Rule, RuleFlags};

#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered_rules: usize,
}

pub fn optimize_rules(rules: &mut Vec<Rule>) -> OptimizeStats {
    let mut stats = OptimizeStats {
        before: rules.len(),
        ..Default::default()
    };

    let badfilter_keys: HashSet<RuleKey> = rules
        .iter()
        .filter(|r| r.flags.contains(RuleFlags::BADFILTER))
        .map(|r| RuleKey::without_badfilter(r))
        .collect();
    stats.badfilter_rules = badfilter_keys.len();

    let mut seen: HashSet<RuleKey> = HashSet::with_capacity(rules.len());
    rules.retain(|rule| {
        if rule.flags.contains(RuleFlags::BADFILTER) {
            return false;
        }
        let key = RuleKey::without_badfilter(rule);
        if badfilter_keys.contains(&key) {
            stats.badfiltered_rules += 1;
            return false;
        }
        if !seen.insert(key) {
            stats.deduped += 1;
            return false;
        }
        true
    });

    stats.after = rules.len();
    stats
}

/// Identity key for dedup and badfilter pairing. The badfilter flag
/// itself is masked out so a `$badfilter` rule pairs with its target.
#[derive(Debug, PartialEq, Eq, Hash)]
struct RuleKey {
    pattern: String,
    flags: u16,
    resource_types: u32,
    party: u8,
    domain_include: Vec<u64>,
    domain_exclude: Vec<u64>,
}

impl RuleKey {
    fn without_badfilter(rule: &Rule) -> Self {
        Self {
            pattern: rule.pattern.source().to_string(),
            flags: (rule.flags & !RuleFlags::BADFILTER).bits(),
            resource_types: rule.resource_types.bits(),
            party: rule.party.bits(),
            domain_include: rule.domain_include.clone(),
            domain_exclude: rule.domain_exclude.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_filter_list;

    fn parse(text: &str) -> Vec<Rule> {
        parse_filter_list(text).0
    }

    #[test]
    fn removes_duplicates() {
        let mut rules = parse("||ads.example.com^\n/banner/\n||ads.example.com^\n");
        let stats = optimize_rules(&mut rules);
        assert_eq!(stats.before, 3);
        assert_eq!(stats.after, 2);
        assert_eq!(stats.deduped, 1);
    }

    #[test]
    fn duplicate_with_different_options_survives() {
        let mut rules = parse("/banner/$script\n/banner/$image\n");
        let stats = optimize_rules(&mut rules);
        assert_eq!(stats.after, 2);
        assert_eq!(stats.deduped, 0);
    }

    #[test]
    fn badfilter_cancels_twin() {
        let mut rules = parse("||ads.example.com^\n||ads.example.com^$badfilter\n/banner/\n");
        let stats = optimize_rules(&mut rules);
        assert_eq!(stats.after, 1);
        assert_eq!(stats.badfilter_rules, 1);
        assert_eq!(stats.badfiltered_rules, 1);
        assert_eq!(rules[0].pattern.source(), "/banner/");
    }

    #[test]
    fn badfilter_without_twin_just_disappears() {
        let mut rules = parse("/banner/$badfilter\n/other/\n");
        let stats = optimize_rules(&mut rules);
        assert_eq!(stats.after, 1);
        assert_eq!(stats.badfiltered_rules, 0);
    }
}
