use serde::Serialize;

use crate::domain::{BatchEntry, CandidateItem};

/// Inclusive bounds on batch cardinality; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchBounds {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl BatchBounds {
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone)]
pub struct SizedBatch {
    pub entries: Vec<BatchEntry>,
    pub truncated: usize,
    pub placeholders: usize,
}

impl SizedBatch {
    pub fn real_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_placeholder()).count()
    }
}

/// Truncate to the first `max` admitted items, or pad with inert
/// placeholders up to `min`.
pub fn size_batch(admitted: Vec<CandidateItem>, bounds: BatchBounds) -> SizedBatch {
    let mut entries: Vec<BatchEntry> = admitted.into_iter().map(BatchEntry::Real).collect();

    let mut truncated = 0;
    if let Some(max) = bounds.max {
        if entries.len() > max {
            truncated = entries.len() - max;
            entries.truncate(max);
        }
    }

    let mut placeholders = 0;
    if let Some(min) = bounds.min {
        if entries.len() < min {
            placeholders = min - entries.len();
            tracing::warn!(
                target: "pipeline",
                real = entries.len(),
                min,
                placeholders,
                "batch underflow; padding with placeholders"
            );
            entries.resize(min, BatchEntry::Placeholder);
        }
    }

    SizedBatch {
        entries,
        truncated,
        placeholders,
    }
}
