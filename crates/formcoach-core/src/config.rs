//! Coach configuration.
//!
//! `CoachConfig` tunes the frame loop (thresholds, windows, debounce intervals) and is
//! loaded from defaults, an optional TOML file, then `FORMCOACH__*` environment
//! variables. `AdvisorySettings` holds the advisory service credentials and is read
//! straight from the environment so keys never live in a config file.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | FORMCOACH_CONFIG | config/formcoach | Path of the TOML config file (optional). |
//! | FORMCOACH__CONFIDENCE_THRESHOLD | 0.6 | Pose confidence below which the rep machine freezes. |
//! | FORMCOACH__SMOOTHING_WINDOW | 3 | Angle smoothing window (clamped to 2–5). |
//! | FORMCOACH__ADVISORY_DEBOUNCE_SECS | 10 | Minimum gap between advisory requests. |
//! | FORMCOACH_LLM_API_KEY / OPENROUTER_API_KEY | (none) | Advisory API key; mock mode when unset. |
//! | FORMCOACH_LLM_API_URL | https://openrouter.ai/api/v1 | OpenAI-compatible base URL. |
//! | FORMCOACH_LLM_MODEL | openai/gpt-4o-mini | Chat model for advisory text. |

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/formcoach";
pub const DEFAULT_LLM_API_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-4o-mini";

fn default_confidence_threshold() -> f32 {
    0.6
}

fn default_keypoint_min_score() -> f32 {
    0.3
}

fn default_smoothing_window() -> usize {
    3
}

fn default_advisory_debounce_secs() -> u64 {
    10
}

fn default_advisory_timeout_secs() -> u64 {
    8
}

fn default_routine_speech_interval_secs() -> u64 {
    5
}

fn default_persistent_error_ms() -> u64 {
    1000
}

fn default_rep_pulse_secs() -> u64 {
    2
}

fn default_phase_history_len() -> usize {
    5
}

/// Frame-loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    /// Pose confidence below which the rep machine reports "neutral" and holds state.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Keypoints at or below this score are ignored.
    #[serde(default = "default_keypoint_min_score")]
    pub keypoint_min_score: f32,
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    #[serde(default = "default_advisory_debounce_secs")]
    pub advisory_debounce_secs: u64,
    #[serde(default = "default_advisory_timeout_secs")]
    pub advisory_timeout_secs: u64,
    /// Routine (non-urgent) narration gap.
    #[serde(default = "default_routine_speech_interval_secs")]
    pub routine_speech_interval_secs: u64,
    /// How long form must stay incorrect before it may interrupt the routine gap.
    #[serde(default = "default_persistent_error_ms")]
    pub persistent_error_ms: u64,
    #[serde(default = "default_rep_pulse_secs")]
    pub rep_pulse_secs: u64,
    #[serde(default = "default_phase_history_len")]
    pub phase_history_len: usize,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            keypoint_min_score: default_keypoint_min_score(),
            smoothing_window: default_smoothing_window(),
            advisory_debounce_secs: default_advisory_debounce_secs(),
            advisory_timeout_secs: default_advisory_timeout_secs(),
            routine_speech_interval_secs: default_routine_speech_interval_secs(),
            persistent_error_ms: default_persistent_error_ms(),
            rep_pulse_secs: default_rep_pulse_secs(),
            phase_history_len: default_phase_history_len(),
        }
    }
}

impl CoachConfig {
    /// Load config. Precedence: env `FORMCOACH__*` > file (`FORMCOACH_CONFIG` or
    /// `config/formcoach.toml`) > defaults.
    pub fn load() -> CoreResult<Self> {
        let path = std::env::var("FORMCOACH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from an explicit file path (extension optional), then the environment.
    pub fn load_from(path: &Path) -> CoreResult<Self> {
        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("confidence_threshold", defaults.confidence_threshold as f64)?
            .set_default("keypoint_min_score", defaults.keypoint_min_score as f64)?
            .set_default("smoothing_window", defaults.smoothing_window as i64)?
            .set_default("advisory_debounce_secs", defaults.advisory_debounce_secs as i64)?
            .set_default("advisory_timeout_secs", defaults.advisory_timeout_secs as i64)?
            .set_default("routine_speech_interval_secs", defaults.routine_speech_interval_secs as i64)?
            .set_default("persistent_error_ms", defaults.persistent_error_ms as i64)?
            .set_default("rep_pulse_secs", defaults.rep_pulse_secs as i64)?
            .set_default("phase_history_len", defaults.phase_history_len as i64)?;

        let builder = builder.add_source(config::File::from(path).required(false));

        let built = builder
            .add_source(config::Environment::with_prefix("FORMCOACH").separator("__"))
            .build()?;

        let cfg: Self = built.try_deserialize()?;
        Ok(cfg.sanitized())
    }

    /// Clamp values into their usable ranges.
    pub fn sanitized(mut self) -> Self {
        self.confidence_threshold = self.confidence_threshold.clamp(0.0, 1.0);
        self.keypoint_min_score = self.keypoint_min_score.clamp(0.0, 1.0);
        self.smoothing_window = self.smoothing_window.clamp(2, 5);
        self.phase_history_len = self.phase_history_len.max(1);
        self.advisory_debounce_secs = self.advisory_debounce_secs.max(1);
        // An advisory request must settle before the next debounce window opens.
        self.advisory_timeout_secs = self.advisory_timeout_secs.clamp(1, self.advisory_debounce_secs);
        self
    }

    pub fn advisory_debounce(&self) -> Duration {
        Duration::from_secs(self.advisory_debounce_secs)
    }

    pub fn advisory_timeout(&self) -> Duration {
        Duration::from_secs(self.advisory_timeout_secs)
    }

    pub fn routine_speech_interval(&self) -> Duration {
        Duration::from_secs(self.routine_speech_interval_secs)
    }

    pub fn persistent_error(&self) -> Duration {
        Duration::from_millis(self.persistent_error_ms)
    }

    pub fn rep_pulse(&self) -> Duration {
        Duration::from_secs(self.rep_pulse_secs)
    }
}

/// Advisory service credentials and model selection.
#[derive(Debug, Clone, Default)]
pub struct AdvisorySettings {
    /// `None` selects the static mock advisor.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

impl AdvisorySettings {
    /// Read from environment. Unset or blank key => mock mode.
    pub fn from_env() -> Self {
        let api_key = env_opt_string("FORMCOACH_LLM_API_KEY").or_else(|| env_opt_string("OPENROUTER_API_KEY"));
        Self {
            api_key,
            api_url: env_opt_string("FORMCOACH_LLM_API_URL").unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            model: env_opt_string("FORMCOACH_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        }
    }

    pub fn is_mock(&self) -> bool {
        self.api_key.is_none()
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "your_api_key_here")
}
