//! Shared type definitions for the filtering engine.

use serde::Serialize;

use crate::domain;
use crate::pattern::MatchPattern;
use crate::url::extract_host;

// =============================================================================
// Resource types
// =============================================================================

bitflags::bitflags! {
    /// Request resource-type bit mask. A rule with an empty mask applies
    /// to every type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceTypeMask: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBDOCUMENT = 1 << 5;
        const MAIN_FRAME = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;

        /// Main document plus embedded frames.
        const DOCUMENT = Self::MAIN_FRAME.bits() | Self::SUBDOCUMENT.bits();
        const ALL = 0xFFF;
    }
}

impl ResourceTypeMask {
    /// Map a caller-supplied resource-type label.
    ///
    /// The empty string means *unspecified*: the request satisfies any
    /// rule's type restriction (WebView callers pass `""` for nearly all
    /// sub-resources, and type-scoped rules must still apply to them).
    /// Unknown non-empty labels map to OTHER.
    pub fn from_label(label: &str) -> Self {
        match label {
            "" => Self::empty(),
            "document" | "main_frame" => Self::MAIN_FRAME,
            "subdocument" | "sub_frame" => Self::SUBDOCUMENT,
            "script" => Self::SCRIPT,
            "image" => Self::IMAGE,
            "stylesheet" => Self::STYLESHEET,
            "object" => Self::OBJECT,
            "xmlhttprequest" | "xhr" => Self::XMLHTTPREQUEST,
            "websocket" => Self::WEBSOCKET,
            "font" => Self::FONT,
            "media" => Self::MEDIA,
            "ping" | "beacon" => Self::PING,
            _ => Self::OTHER,
        }
    }
}

// =============================================================================
// Party mask
// =============================================================================

bitflags::bitflags! {
    /// First/third-party restriction. Empty = unrestricted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PartyMask: u8 {
        const FIRST_PARTY = 1 << 0;
        const THIRD_PARTY = 1 << 1;
        const ALL = Self::FIRST_PARTY.bits() | Self::THIRD_PARTY.bits();
    }
}

// =============================================================================
// Rule flags
// =============================================================================

bitflags::bitflags! {
    /// Per-rule behavior flags.
    ///
    /// EXCEPTION and IMPORTANT are mutually exclusive; the parser rejects
    /// lines that request both.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u16 {
        /// `@@` prefix: matching requests are explicitly allowed.
        const EXCEPTION = 1 << 0;
        /// `$important`: the block cannot be overridden by exceptions.
        const IMPORTANT = 1 << 1;
        /// `$badfilter`: cancels the identical rule during optimization.
        const BADFILTER = 1 << 2;
    }
}

// =============================================================================
// Rule
// =============================================================================

/// One compiled filter rule. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: MatchPattern,
    pub flags: RuleFlags,
    /// Empty mask = applies to all resource types.
    pub resource_types: ResourceTypeMask,
    /// Empty mask = applies to both parties.
    pub party: PartyMask,
    /// `$domain=` include list, hashed domain keys. Empty = unrestricted.
    pub domain_include: Vec<u64>,
    /// `$domain=~…` exclude list, hashed domain keys.
    pub domain_exclude: Vec<u64>,
}

impl Rule {
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.flags.contains(RuleFlags::EXCEPTION)
    }

    #[inline]
    pub fn is_important(&self) -> bool {
        self.flags.contains(RuleFlags::IMPORTANT)
    }
}

// =============================================================================
// Request
// =============================================================================

/// A request descriptor for one match call.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    /// Full request URL.
    pub url: &'a str,
    /// Request hostname; recomputed from `url` when the caller passes "".
    pub host: &'a str,
    /// Host of the top-level document; "" means the request has no
    /// cross-document context (e.g. it *is* the main-frame navigation).
    pub source_host: &'a str,
    /// Authoritative third-party bit: registrable-domain comparison when
    /// both hosts are known, otherwise the caller's hint.
    pub third_party: bool,
    /// Empty mask = type unspecified.
    pub resource_type: ResourceTypeMask,
}

impl<'a> Request<'a> {
    /// Build a request descriptor from the raw match-call arguments.
    pub fn new(
        url: &'a str,
        host: &'a str,
        source_host: &'a str,
        third_party_hint: bool,
        resource_type: ResourceTypeMask,
    ) -> Self {
        let host = if host.is_empty() {
            extract_host(url).unwrap_or("")
        } else {
            host
        };
        let third_party = if !host.is_empty() && !source_host.is_empty() {
            domain::is_third_party(source_host, host)
        } else {
            third_party_hint
        };
        Self {
            url,
            host,
            source_host,
            third_party,
            resource_type,
        }
    }
}

// =============================================================================
// Blocker result
// =============================================================================

/// The decision for one match call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockerResult {
    /// A blocking rule matched.
    pub matched: bool,
    /// An exception rule matched; blocking is suppressed.
    pub exception: bool,
    /// An important rule matched; overrides every exception.
    pub important: bool,
}

impl BlockerResult {
    pub const NO_MATCH: BlockerResult = BlockerResult {
        matched: false,
        exception: false,
        important: false,
    };
}
