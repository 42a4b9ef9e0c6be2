//! Exercise definitions, the rep-counting machine, and the form validator.

pub mod profiles;
pub mod rep_counter;
pub mod validator;

pub use profiles::{
    AngleBand, ExerciseKind, ExerciseProfile, ExerciseTable, JointKind, LimbStrategy,
    SecondaryConstraint,
};
pub use rep_counter::{label_phase, step, Phase, RepStage, RepState, Transition, DEFAULT_MIN_CONFIDENCE};
pub use validator::{validate, FormCheck, GOOD_FORM, NO_CRITERIA};
