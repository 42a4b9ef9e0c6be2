//! Advisory text service: supplementary coaching tips from a chat-completions model.
//!
//! The service only ever sees the compact `AdvicePayload`. Calls may fail or hang;
//! `request_with_fallback` bounds them with a timeout and always yields a string.
//!
//! API key: `FORMCOACH_LLM_API_KEY` (or `OPENROUTER_API_KEY`). Without one the static
//! mock advisor is used.

use super::arbiter::AdvicePayload;
use crate::config::AdvisorySettings;
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Spoken when the advisory service fails or times out.
pub const FALLBACK_ADVICE: &str = "AI coach is temporarily unavailable. Keep going!";

const MOCK_ADVICE: &str =
    "AI feedback unavailable. Add an API key for real-time form analysis.";

const SYSTEM_PROMPT: &str = "You are a professional fitness trainer providing real-time feedback on exercise form. \
    Be concise, specific, and encouraging. Focus on the most important correction needed. \
    Limit your response to 1-2 short sentences that can be spoken aloud.";

/// Source of supplementary coaching text.
#[async_trait]
pub trait AdvisoryService: Send + Sync {
    async fn request_feedback(&self, payload: &AdvicePayload) -> CoreResult<String>;
}

/// Fixed reply; used in mock mode and in tests.
#[derive(Debug, Clone)]
pub struct StaticAdvisor {
    message: String,
}

impl StaticAdvisor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn mock() -> Self {
        Self::new(MOCK_ADVICE)
    }
}

#[async_trait]
impl AdvisoryService for StaticAdvisor {
    async fn request_feedback(&self, _payload: &AdvicePayload) -> CoreResult<String> {
        Ok(self.message.clone())
    }
}

// OpenAI-compatible request/response
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Chat-completions advisor (OpenRouter by default; any OpenAI-compatible API works).
pub struct OpenRouterAdvisor {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenRouterAdvisor {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.into().trim().to_string(),
            base_url: base_url.into(),
            model: model.into(),
            client,
        }
    }

    /// `None` when no API key is configured.
    pub fn from_settings(settings: &AdvisorySettings) -> Option<Self> {
        let key = settings.api_key.as_deref()?;
        Some(Self::new(key, settings.api_url.clone(), settings.model.clone()))
    }

    fn build_request(&self, payload: &AdvicePayload) -> CoreResult<ChatRequest> {
        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: format!(
                        "{} The exercise being performed is {}.",
                        SYSTEM_PROMPT, payload.exercise_name
                    ),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: serde_json::to_string(payload)?,
                },
            ],
            temperature: Some(0.7),
            max_tokens: Some(100),
        })
    }
}

#[async_trait]
impl AdvisoryService for OpenRouterAdvisor {
    async fn request_feedback(&self, payload: &AdvicePayload) -> CoreResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.build_request(payload)?;

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "FormCoach")
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Advisory(format!("API error {}: {}", status, body)));
        }

        let parsed: ChatResponse = res.json().await?;
        parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::Advisory("empty completion".to_string()))
    }
}

/// Pick the advisor for `settings`: the HTTP advisor when a key is set, else mock.
pub fn create_advisor(settings: &AdvisorySettings) -> Arc<dyn AdvisoryService> {
    match OpenRouterAdvisor::from_settings(settings) {
        Some(advisor) => {
            info!(model = %settings.model, "advisory service: chat completions");
            Arc::new(advisor)
        }
        None => {
            info!("advisory service: mock mode (no API key)");
            Arc::new(StaticAdvisor::mock())
        }
    }
}

/// Request advice, bounded by `timeout`. Failures degrade to `FALLBACK_ADVICE`.
pub async fn request_with_fallback(
    service: &dyn AdvisoryService,
    payload: &AdvicePayload,
    timeout: Duration,
) -> String {
    let result = match tokio::time::timeout(timeout, service.request_feedback(payload)).await {
        Ok(r) => r,
        Err(_) => Err(CoreError::AdvisoryTimeout(timeout.as_secs())),
    };
    match result {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "advisory request failed; using fallback");
            FALLBACK_ADVICE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::Phase;

    struct FailingAdvisor;

    #[async_trait]
    impl AdvisoryService for FailingAdvisor {
        async fn request_feedback(&self, _payload: &AdvicePayload) -> CoreResult<String> {
            Err(CoreError::Advisory("boom".to_string()))
        }
    }

    struct HangingAdvisor;

    #[async_trait]
    impl AdvisoryService for HangingAdvisor {
        async fn request_feedback(&self, _payload: &AdvicePayload) -> CoreResult<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    fn payload() -> AdvicePayload {
        AdvicePayload {
            exercise_id: "squat".to_string(),
            exercise_name: "Squat".to_string(),
            phase: Phase::Down,
            form_issues: vec!["Go lower".to_string()],
            is_correct: false,
        }
    }

    #[tokio::test]
    async fn failure_degrades_to_fallback() {
        let text = request_with_fallback(&FailingAdvisor, &payload(), Duration::from_secs(1)).await;
        assert_eq!(text, FALLBACK_ADVICE);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_degrades_to_fallback() {
        let text = request_with_fallback(&HangingAdvisor, &payload(), Duration::from_secs(8)).await;
        assert_eq!(text, FALLBACK_ADVICE);
    }

    #[tokio::test]
    async fn static_advisor_passes_through() {
        let advisor = StaticAdvisor::new("Chest up!");
        let text = request_with_fallback(&advisor, &payload(), Duration::from_secs(1)).await;
        assert_eq!(text, "Chest up!");
    }

    #[test]
    fn request_omits_keypoints_and_names_exercise() {
        let advisor = OpenRouterAdvisor::new("k", "http://localhost", "m");
        let req = advisor.build_request(&payload()).unwrap();
        assert!(req.messages[0].content.contains("Squat"));
        let user: serde_json::Value = serde_json::from_str(&req.messages[1].content).unwrap();
        assert!(user.get("keypoints").is_none());
        assert_eq!(user["phase"], "down");
        assert_eq!(user["form_issues"][0], "Go lower");
    }

    #[test]
    fn no_key_selects_mock() {
        let settings = AdvisorySettings::default();
        assert!(settings.is_mock());
        assert!(OpenRouterAdvisor::from_settings(&settings).is_none());
    }
}
