use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An item exactly as a collector produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub source: String,
    pub title: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub body: String,
}

impl RawItem {
    pub fn new(source: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            link: None,
            published: None,
            body: body.into(),
        }
    }
}

/// Normalized form of a [`RawItem`], owned by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// Position in the normalizer output; stable for the rest of the run.
    pub sequence: usize,
    pub title: String,
    /// Lower-cased, punctuation-free title used for similarity checks.
    pub comparison_title: String,
    pub body: String,
    pub source: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl CandidateItem {
    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }

    /// Title, source and body, capped at `max_chars` characters of body.
    pub fn analysis_text(&self, max_chars: usize) -> String {
        let body: String = self.body.chars().take(max_chars).collect();
        format!(
            "Title: {}\nSource: {}\n\n{}",
            self.title, self.source, body
        )
    }
}

/// One entry of a sized batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEntry {
    Real(CandidateItem),
    /// Inert filler that only exists to satisfy the minimum batch size.
    Placeholder,
}

impl BatchEntry {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, BatchEntry::Placeholder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooShort,
    IrrelevantContent,
    InsufficientTopics,
}

impl RejectReason {
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::TooShort => "below minimum word count",
            RejectReason::IrrelevantContent => "matched irrelevant-content vocabulary",
            RejectReason::InsufficientTopics => "not enough syllabus topics",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationVerdict {
    pub admitted: bool,
    pub critical_matches: usize,
    pub secondary_matches: usize,
    pub irrelevant_matches: usize,
    pub reason: Option<RejectReason>,
}
