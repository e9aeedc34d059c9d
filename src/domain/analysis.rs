use serde::Serialize;

use super::item::CandidateItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relevance {
    Relevant,
    NotRelevant,
}

impl Relevance {
    pub fn is_relevant(&self) -> bool {
        matches!(self, Relevance::Relevant)
    }
}

/// Typed fields extracted from one analysis response.
///
/// Any field the parser could not read stays empty; nothing is filled in
/// on the model's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub relevance: Relevance,
    pub summary: String,
    pub simplified: String,
    /// Why the item matters for the exam.
    pub explanation: String,
    pub key_points: Vec<String>,
    pub concepts: Vec<String>,
    pub prelims_questions: Vec<String>,
    pub mains_questions: Vec<String>,
    pub background: String,
    pub related_topics: Vec<String>,
    /// Paper tags such as `GS2`, plus any tags the model listed.
    pub tags: Vec<String>,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            relevance: Relevance::NotRelevant,
            summary: String::new(),
            simplified: String::new(),
            explanation: String::new(),
            key_points: Vec::new(),
            concepts: Vec::new(),
            prelims_questions: Vec::new(),
            mains_questions: Vec::new(),
            background: String::new(),
            related_topics: Vec::new(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,
    Succeeded,
    FailedTransient,
    FailedPermanent,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::FailedPermanent)
    }
}

/// One item's way through the analysis engine.
///
/// `pending -> in-flight -> {succeeded, failed-transient, failed-permanent}`;
/// a transient failure goes back to pending until the attempt budget is
/// spent, after which it becomes permanent.
#[derive(Debug)]
pub struct AnalysisTask {
    pub candidate: CandidateItem,
    pub attempts: u32,
    pub state: TaskState,
}

impl AnalysisTask {
    pub fn new(candidate: CandidateItem) -> Self {
        Self {
            candidate,
            attempts: 0,
            state: TaskState::Pending,
        }
    }

    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.state = TaskState::InFlight;
    }

    pub fn succeed(&mut self) {
        self.state = TaskState::Succeeded;
    }

    /// Record a retryable failure. Once `max_attempts` have been used the
    /// task is failed for good; returns whether another attempt is allowed.
    pub fn fail_transient(&mut self, max_attempts: u32) -> bool {
        if self.attempts >= max_attempts {
            self.state = TaskState::FailedPermanent;
            false
        } else {
            self.state = TaskState::FailedTransient;
            true
        }
    }

    pub fn retry(&mut self) {
        self.state = TaskState::Pending;
    }

    pub fn fail_permanent(&mut self) {
        self.state = TaskState::FailedPermanent;
    }
}

/// Final state of one batch position, in input order.
#[derive(Debug, Clone)]
pub enum Slot {
    Analyzed {
        candidate: CandidateItem,
        result: AnalysisResult,
        attempts: u32,
    },
    Failed {
        candidate: CandidateItem,
        attempts: u32,
        state: TaskState,
        error: String,
    },
    Placeholder,
}

impl Slot {
    pub fn result(&self) -> Option<(&CandidateItem, &AnalysisResult)> {
        match self {
            Slot::Analyzed {
                candidate, result, ..
            } => Some((candidate, result)),
            _ => None,
        }
    }

    /// Terminal task state; placeholders never had a task.
    pub fn state(&self) -> Option<TaskState> {
        match self {
            Slot::Analyzed { .. } => Some(TaskState::Succeeded),
            Slot::Failed { state, .. } => Some(*state),
            Slot::Placeholder => None,
        }
    }

    /// Analyzed only after at least one retry.
    pub fn was_retried(&self) -> bool {
        matches!(self, Slot::Analyzed { attempts, .. } if *attempts > 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> AnalysisTask {
        AnalysisTask::new(CandidateItem {
            sequence: 0,
            title: "t".into(),
            comparison_title: "t".into(),
            body: String::new(),
            source: "s".into(),
            link: None,
            published: None,
        })
    }

    #[test]
    fn transient_failures_turn_permanent_when_attempts_run_out() {
        let mut t = task();
        t.begin_attempt();
        assert!(t.fail_transient(2));
        assert_eq!(t.state, TaskState::FailedTransient);
        t.retry();
        assert_eq!(t.state, TaskState::Pending);
        t.begin_attempt();
        assert_eq!(t.state, TaskState::InFlight);
        assert!(!t.fail_transient(2));
        assert_eq!(t.state, TaskState::FailedPermanent);
        assert!(t.state.is_terminal());
    }

    #[test]
    fn success_is_terminal() {
        let mut t = task();
        t.begin_attempt();
        t.succeed();
        assert!(t.state.is_terminal());
        assert!(!TaskState::FailedTransient.is_terminal());
    }
}
