//! formcoach-core: real-time exercise form validation from 2D pose keypoints.
//!
//! Per frame: keypoints → joint angle → smoothing → rep state machine → form
//! validator → feedback event → advisory arbiter. The pose model, rendering, and
//! speech output live outside this crate.

pub mod config;
pub mod error;
pub mod exercise;
pub mod feedback;
pub mod pose;
pub mod session;

pub use config::{AdvisorySettings, CoachConfig};
pub use error::{CoreError, CoreResult};
pub use exercise::{
    label_phase, step, validate, AngleBand, ExerciseKind, ExerciseProfile, ExerciseTable, FormCheck,
    JointKind, LimbStrategy, Phase, RepStage, RepState, SecondaryConstraint, Transition,
};
pub use feedback::{
    create_advisor, request_with_fallback, AdvicePayload, AdvisoryService, FeedbackArbiter,
    FeedbackEvent, FormIssuesHistory, OpenRouterAdvisor, StaticAdvisor, FALLBACK_ADVICE,
};
pub use pose::{angle_at, smooth, AngleBuffer, Keypoint, Point, PoseFrame, Side};
pub use session::{CoachSession, FrameOutcome, SessionSnapshot};
