//! Per-frame feedback events, advisory request arbitration, and the advisory
//! service seam.

pub mod advisor;
pub mod arbiter;
pub mod event;

pub use advisor::{
    create_advisor, request_with_fallback, AdvisoryService, OpenRouterAdvisor, StaticAdvisor,
    FALLBACK_ADVICE,
};
pub use arbiter::{AdvicePayload, FeedbackArbiter, FormIssuesHistory, ISSUE_HISTORY_CAPACITY};
pub use event::FeedbackEvent;
