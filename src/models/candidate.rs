//! Candidate PDF links discovered on retailer pages.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Discovery strategy that produced a candidate.
///
/// Variants are declared in chain order; the extractor relies on `Ord`
/// to emit results in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    DirectAnchor,
    EmbeddedFrame,
    SecondaryPage,
    InlineScript,
    SelectorProbe,
    MetaTag,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectAnchor => "direct_anchor",
            Self::EmbeddedFrame => "embedded_frame",
            Self::SecondaryPage => "secondary_page",
            Self::InlineScript => "inline_script",
            Self::SelectorProbe => "selector_probe",
            Self::MetaTag => "meta_tag",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An absolute URL believed to point at a PDF, with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Normalized absolute URL; this is the candidate's identity.
    pub url: String,
    /// Strategy that found it first.
    pub strategy: StrategyKind,
    /// Page the link was found on.
    pub found_on: String,
}

impl Candidate {
    pub fn new(url: impl Into<String>, strategy: StrategyKind, found_on: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            strategy,
            found_on: found_on.into(),
        }
    }
}

/// Run-scoped, insertion-ordered set of candidates keyed by URL.
#[derive(Debug, Default, Clone)]
pub struct CandidateSet {
    seen: HashSet<String>,
    items: Vec<Candidate>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate. Returns false if its URL was already present.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        if !self.seen.insert(candidate.url.clone()) {
            return false;
        }
        self.items.push(candidate);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.items
    }
}
