//! # FormCoach Voice - narration for the coach session
//!
//! ```text
//! frames ──► CoachSession ──► FeedbackEvent ──► SpeechQueue ──► Narrator
//!                 │                                   ▲
//!                 └──► AdvisoryService (async) ───────┘
//! ```
//!
//! The speech queue guarantees one utterance at a time; the coach loop ties the
//! session, advisory text and narration together without blocking on either.

pub mod coach_loop;
pub mod error;
pub mod narrator;
pub mod speech_queue;

pub use coach_loop::{run_coach_loop, CoachSummary, OnOutcome};
pub use error::{VoiceError, VoiceResult};
pub use narrator::{create_narrator, AudioNarrator, HttpTts, Narrator, PlaceholderNarrator, TtsBackend};
pub use speech_queue::{SpeechDispatcher, SpeechQueue, Utterance};
