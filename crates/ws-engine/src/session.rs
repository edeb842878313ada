//! Per-document decision combination.
//!
//! When several lists are active, one request is checked against each
//! engine in registry order. An `important` hit on any engine blocks
//! immediately; an `exception` stops consultation. An exception on the
//! *main document* latches for the rest of that document load and
//! suppresses blocking of all its sub-resources; the latch resets on
//! navigation to a new main-frame URL.
//!
//! A session belongs to exactly one document load context and must not
//! be shared across unrelated loads. Forking a session for a child view
//! shares the engine handles (reference-counted), never the latch.

use std::sync::Arc;

use ws_core::{url::extract_host, BlockerResult};

use crate::engine::Engine;
use crate::registry::EngineRegistry;

/// Final per-request decision after combining all engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block,
}

pub struct DocumentSession {
    engines: Vec<Arc<Engine>>,
    main_host: String,
    main_document_exception: bool,
}

impl DocumentSession {
    pub fn new(engines: Vec<Arc<Engine>>) -> Self {
        Self {
            engines,
            main_host: String::new(),
            main_document_exception: false,
        }
    }

    /// Session over the registry's current engines, in consultation
    /// order. Later registry reloads do not affect an existing session;
    /// start a new session (the next navigation) to pick them up.
    pub fn from_registry(registry: &EngineRegistry) -> Self {
        Self::new(registry.engines())
    }

    /// New session for a child view: same engine handles, fresh state.
    pub fn fork(&self) -> Self {
        Self::new(self.engines.clone())
    }

    /// Evaluate a main-frame navigation. Resets the exception latch,
    /// records the new document host, and decides the navigation request
    /// itself (no cross-document context, resource type `document`).
    pub fn navigate(&mut self, url: &str) -> Verdict {
        self.main_document_exception = false;
        self.main_host = extract_host(url).unwrap_or("").to_string();

        let combined = self.consult(url, "", "", false, "document");
        if combined.important {
            return Verdict::Block;
        }
        if combined.exception {
            self.main_document_exception = true;
            log::debug!("main document exception latched for {}", self.main_host);
            return Verdict::Allow;
        }
        if combined.matched {
            Verdict::Block
        } else {
            Verdict::Allow
        }
    }

    /// Evaluate a sub-resource request of the current document.
    pub fn check_subresource(&self, url: &str, host: &str, resource_type: &str) -> Verdict {
        if self.main_document_exception {
            return Verdict::Allow;
        }

        let combined = self.consult(url, host, &self.main_host, false, resource_type);
        if combined.important || (combined.matched && !combined.exception) {
            Verdict::Block
        } else {
            Verdict::Allow
        }
    }

    pub fn main_document_exception(&self) -> bool {
        self.main_document_exception
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    fn consult(
        &self,
        url: &str,
        host: &str,
        source_host: &str,
        third_party: bool,
        resource_type: &str,
    ) -> BlockerResult {
        let mut combined = BlockerResult::NO_MATCH;
        for engine in &self.engines {
            let result = engine.match_request(url, host, source_host, third_party, resource_type);
            combined.matched |= result.matched;
            if result.important {
                combined.important = true;
                break;
            }
            if result.exception {
                combined.exception = true;
                break;
            }
        }
        combined
    }
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("engines", &self.engines.len())
            .field("main_host", &self.main_host)
            .field("main_document_exception", &self.main_document_exception)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engines(lists: &[&str]) -> Vec<Arc<Engine>> {
        lists
            .iter()
            .map(|text| Arc::new(Engine::from_filter_list(text).unwrap()))
            .collect()
    }

    #[test]
    fn blocks_matching_subresources() {
        let mut session = DocumentSession::new(engines(&["||ads.example.com^\n"]));
        assert_eq!(session.navigate("http://site.com/"), Verdict::Allow);

        assert_eq!(
            session.check_subresource("http://ads.example.com/x.js", "ads.example.com", ""),
            Verdict::Block
        );
        assert_eq!(
            session.check_subresource("http://cdn.site.com/app.js", "cdn.site.com", ""),
            Verdict::Allow
        );
    }

    #[test]
    fn matched_or_across_engines() {
        let mut session =
            DocumentSession::new(engines(&["||ads.example.com^\n", "/banner/\n"]));
        session.navigate("http://site.com/");

        assert_eq!(
            session.check_subresource("http://cdn.site.com/banner/a.png", "cdn.site.com", ""),
            Verdict::Block
        );
    }

    #[test]
    fn exception_in_one_engine_allows_request() {
        // Engine 0 blocks, engine 1 holds the exception; consultation
        // stops at the exception and the request goes through.
        let mut session = DocumentSession::new(engines(&[
            "||ads.example.com^\n",
            "@@||ads.example.com/allowed.js\n",
        ]));
        session.navigate("http://site.com/");

        assert_eq!(
            session.check_subresource(
                "http://ads.example.com/allowed.js",
                "ads.example.com",
                "script"
            ),
            Verdict::Allow,
        );
    }

    #[test]
    fn important_blocks_despite_later_exception_engine() {
        let mut session = DocumentSession::new(engines(&[
            "||ads.example.com^$important\n",
            "@@||ads.example.com^\n",
        ]));
        session.navigate("http://site.com/");

        assert_eq!(
            session.check_subresource("http://ads.example.com/x.js", "ads.example.com", ""),
            Verdict::Block
        );
    }

    #[test]
    fn main_document_exception_latches_and_resets() {
        let mut session = DocumentSession::new(engines(&[
            "||blocked.site.com^\n/banner/\n@@||excepted.com^$document\n",
        ]));

        // Navigation to the excepted site latches the exception...
        assert_eq!(session.navigate("http://excepted.com/"), Verdict::Allow);
        assert!(session.main_document_exception());

        // ...and sub-resources that would otherwise be blocked pass.
        assert_eq!(
            session.check_subresource("http://cdn.net/banner/x.png", "cdn.net", ""),
            Verdict::Allow
        );

        // A new navigation resets the latch.
        assert_eq!(session.navigate("http://other.com/"), Verdict::Allow);
        assert!(!session.main_document_exception());
        assert_eq!(
            session.check_subresource("http://cdn.net/banner/x.png", "cdn.net", ""),
            Verdict::Block
        );
    }

    #[test]
    fn fork_shares_engines_but_not_latch() {
        let mut session = DocumentSession::new(engines(&["@@||excepted.com^$document\n"]));
        session.navigate("http://excepted.com/");
        assert!(session.main_document_exception());

        let child = session.fork();
        assert_eq!(child.engine_count(), 1);
        assert!(!child.main_document_exception());
    }

    #[test]
    fn blocked_main_frame_navigation() {
        let mut session = DocumentSession::new(engines(&["||malware.example^$document\n"]));
        assert_eq!(session.navigate("http://malware.example/"), Verdict::Block);
    }
}
