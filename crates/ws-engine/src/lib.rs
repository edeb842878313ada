//! Filter-list compilation and engine lifecycle for webshield.
//!
//! This crate turns raw filter-list text into compiled [`Engine`]s and
//! manages them at runtime:
//!
//! - **Parser**: one line of ABP-style list syntax → one network rule
//!   (`!` comments, `@@` exceptions, `$option` suffixes, `||domain^`
//!   anchors, hosts-file lines). Malformed lines are skipped, never
//!   fatal.
//! - **Optimizer**: duplicate removal and `$badfilter` cancellation.
//! - **Engine**: an immutable compiled rule set; concurrent matching
//!   without locks, shared via `Arc`.
//! - **Registry**: named lists with atomic build-then-swap reload.
//! - **Session**: per-document combination of several engines, including
//!   the main-document exception latch.
//!
//! # Example
//!
//! ```
//! use ws_engine::Engine;
//!
//! let engine = Engine::from_filter_list("||ads.example.com^\n").unwrap();
//! let result = engine.match_request(
//!     "http://ads.example.com/pixel.gif",
//!     "ads.example.com",
//!     "site.com",
//!     true,
//!     "image",
//! );
//! assert!(result.matched);
//! ```

pub mod engine;
pub mod optimizer;
pub mod parser;
pub mod registry;
pub mod session;

pub use engine::{Engine, EngineError};
pub use optimizer::{optimize_rules, OptimizeStats};
pub use parser::{parse_filter_list, parse_line, ListStats, ParseError, ParsedLine};
pub use registry::{EngineRegistry, RegistryError};
pub use session::{DocumentSession, Verdict};
