//! The compiled engine: one immutable rule set plus its index.

use thiserror::Error;

use ws_core::{BlockerResult, Matcher, Request, ResourceTypeMask, Rule, RuleIndex};

use crate::optimizer::optimize_rules;
use crate::parser::parse_filter_list;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Every candidate line failed to parse; nothing usable remained.
    #[error("filter list is unparseable: 0 of {candidate_lines} candidate line(s) produced a rule")]
    Unparseable { candidate_lines: usize },
}

/// A compiled filter list. Immutable after construction, safe to share
/// across threads (`Arc<Engine>`); concurrent `match_request` calls need
/// no synchronization.
pub struct Engine {
    rules: Vec<Rule>,
    index: RuleIndex,
}

impl Engine {
    /// Compile an engine from raw filter-list text.
    ///
    /// Malformed lines are skipped (logged at debug). The build fails
    /// only when the text contained candidate rule lines and none of
    /// them parsed; an empty or comment-only list builds an empty engine
    /// that blocks nothing. Never yields a partially-built engine.
    pub fn from_filter_list(text: &str) -> Result<Self, EngineError> {
        let (mut rules, stats) = parse_filter_list(text);

        if rules.is_empty() && stats.errors > 0 {
            log::warn!(
                "filter list rejected: all {} candidate lines malformed",
                stats.errors
            );
            return Err(EngineError::Unparseable {
                candidate_lines: stats.candidate_lines(),
            });
        }

        let opt = optimize_rules(&mut rules);
        let index = RuleIndex::build(&rules);
        let istats = index.stats();
        log::info!(
            "compiled engine: {} rules ({} deduped, {} badfiltered, {} lines skipped), \
             {} host buckets, {} token buckets, {} fallback",
            rules.len(),
            opt.deduped,
            opt.badfiltered_rules,
            stats.errors,
            istats.host_buckets,
            istats.token_buckets,
            istats.fallback_rules,
        );

        Ok(Self { rules, index })
    }

    /// Decide one request. See the matcher for precedence semantics.
    ///
    /// `host` may be empty (recomputed from `url`); `source_host` empty
    /// means the request has no cross-document context; `resource_type`
    /// is a label like `"document"` or `"script"`, `""` for unspecified.
    pub fn match_request(
        &self,
        url: &str,
        host: &str,
        source_host: &str,
        third_party: bool,
        resource_type: &str,
    ) -> BlockerResult {
        let req = Request::new(
            url,
            host,
            source_host,
            third_party,
            ResourceTypeMask::from_label(resource_type),
        );
        Matcher::new(&self.rules, &self.index).match_request(&req)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.index.stats();
        f.debug_struct("Engine")
            .field("rules", &self.rules.len())
            .field("host_buckets", &stats.host_buckets)
            .field("token_buckets", &stats.token_buckets)
            .field("fallback_rules", &stats.fallback_rules)
            .finish()
    }
}
