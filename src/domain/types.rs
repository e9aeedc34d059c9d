use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Collecting,
    Filtering,
    Analyzing,
    Rendering,
    Done,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Collecting => "Gathering articles",
            Phase::Filtering => "Filtering for syllabus relevance",
            Phase::Analyzing => "Analyzing",
            Phase::Rendering => "Preparing report",
            Phase::Done => "Done",
        }
    }
}

/// Full recount of the run's progress at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub phase: Phase,
    pub at: DateTime<Utc>,
}

impl ProgressSnapshot {
    pub fn idle() -> Self {
        Self {
            total: 0,
            completed: 0,
            succeeded: 0,
            failed: 0,
            phase: Phase::Collecting,
            at: Utc::now(),
        }
    }

    pub fn render(&self) -> String {
        match self.phase {
            Phase::Analyzing => format!(
                "📊 {}: {}/{}\n✅ Succeeded: {} | ❌ Failed: {}",
                self.phase.label(),
                self.completed,
                self.total,
                self.succeeded,
                self.failed
            ),
            Phase::Rendering | Phase::Done if self.total > 0 => format!(
                "📄 {}\n✅ Succeeded: {} | ❌ Failed: {} (of {})",
                self.phase.label(),
                self.succeeded,
                self.failed,
                self.total
            ),
            _ => format!("⏳ {}...", self.phase.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueSnapshot {
    pub high_priority: usize,
    pub normal_priority: usize,
}
