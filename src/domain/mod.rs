pub mod analysis;
pub mod item;
pub mod request;
pub mod types;

pub use analysis::{AnalysisResult, AnalysisTask, Relevance, Slot, TaskState};
pub use item::{BatchEntry, CandidateItem, ClassificationVerdict, RawItem, RejectReason};
pub use request::{DigestRequest, RequestKind, RequestOrigin};
pub use types::{Phase, ProgressSnapshot, QueueSnapshot};
