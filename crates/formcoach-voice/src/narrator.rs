//! **Narrator**: the "speak and tell me when you're done" seam.
//!
//! `speak` resolves when the utterance has finished playing (or failed); `cancel`
//! silences anything in progress. Two implementations ship here:
//!
//! - [`PlaceholderNarrator`] logs the text and returns at once (headless runs, CI).
//! - [`AudioNarrator`] synthesizes speech through an OpenAI-compatible
//!   `/audio/speech` endpoint ([`HttpTts`]) and plays it on the default output device.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | TTS_API_URL | https://api.openai.com/v1 | Base URL of the speech endpoint. |
//! | TTS_API_KEY / OPENROUTER_API_KEY | (none) | Bearer key; required for audio narration. |
//! | TTS_MODEL | tts-1 | Speech model. |
//! | TTS_VOICE | nova | Voice id. |

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use rodio::{OutputStream, Sink, Source};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PLAYBACK_POLL: Duration = Duration::from_millis(50);

/// Speaks one utterance at a time.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Resolve once `text` has been spoken (or failed).
    async fn speak(&self, text: &str) -> VoiceResult<()>;

    /// Stop any utterance in progress.
    fn cancel(&self) {}
}

/// Logs instead of speaking.
#[derive(Debug, Default)]
pub struct PlaceholderNarrator;

#[async_trait]
impl Narrator for PlaceholderNarrator {
    async fn speak(&self, text: &str) -> VoiceResult<()> {
        info!(text, "narrate");
        Ok(())
    }
}

/// Turns text into audio bytes (WAV/MP3).
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Return an empty vec to skip playback.
    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

/// OpenAI-compatible speech synthesis (OpenAI, OpenRouter, local gateways).
#[derive(Debug, Clone)]
pub struct HttpTts {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    pub api_key: String,
    /// tts-1 (fast) or tts-1-hd.
    pub model: String,
    pub voice: String,
    client: reqwest::Client,
}

impl HttpTts {
    /// Build from `TTS_API_URL`, `TTS_API_KEY` (or `OPENROUTER_API_KEY`), `TTS_MODEL`, `TTS_VOICE`.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            .map(|k| k.trim().to_string())
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| VoiceError::Config("TTS requires TTS_API_KEY or OPENROUTER_API_KEY".to_string()))?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "nova".to_string());
        Self::new(base_url, api_key, model, voice)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
            client,
        })
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
        })
    }
}

#[async_trait]
impl TtsBackend for HttpTts {
    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        Ok(res.bytes().await?.to_vec())
    }
}

/// Synthesizes with a [`TtsBackend`] and plays through `rodio`.
///
/// `OutputStream` is not `Send`, so a dedicated playback thread owns it for the
/// narrator's lifetime; the `Sink` is shared and drives playback from async code.
pub struct AudioNarrator {
    tts: Arc<dyn TtsBackend>,
    sink: Arc<Sink>,
    cancelled: AtomicBool,
    // Dropping the sender releases the playback thread and its output stream.
    _shutdown: std::sync::mpsc::Sender<()>,
}

impl AudioNarrator {
    /// Open the default output device.
    pub fn new(tts: Arc<dyn TtsBackend>) -> VoiceResult<Self> {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<VoiceResult<Arc<Sink>>>();
        let (shutdown_tx, shutdown_rx) = std::sync::mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("formcoach-playback".to_string())
            .spawn(move || {
                let opened = OutputStream::try_default()
                    .map_err(|e| VoiceError::Playback(e.to_string()))
                    .and_then(|(stream, handle)| {
                        Sink::try_new(&handle)
                            .map(|sink| (stream, Arc::new(sink)))
                            .map_err(|e| VoiceError::Playback(e.to_string()))
                    });
                match opened {
                    Ok((stream, sink)) => {
                        let _ = ready_tx.send(Ok(sink));
                        let _ = shutdown_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| VoiceError::Playback(e.to_string()))?;

        let sink = ready_rx
            .recv()
            .map_err(|e| VoiceError::Playback(e.to_string()))??;
        info!("AudioNarrator: sink ready for narration");
        Ok(Self {
            tts,
            sink,
            cancelled: AtomicBool::new(false),
            _shutdown: shutdown_tx,
        })
    }

    fn play_bytes(&self, bytes: Vec<u8>) -> VoiceResult<()> {
        let source = rodio::Decoder::new(Cursor::new(bytes))
            .map_err(|e| VoiceError::Playback(format!("Decode failed: {}", e)))?;
        self.sink.append(source.convert_samples::<f32>());
        Ok(())
    }
}

#[async_trait]
impl Narrator for AudioNarrator {
    async fn speak(&self, text: &str) -> VoiceResult<()> {
        self.cancelled.store(false, Ordering::SeqCst);
        let bytes = self.tts.synthesize(text).await?;
        if bytes.is_empty() {
            return Ok(());
        }
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(VoiceError::Cancelled);
        }
        self.play_bytes(bytes)?;
        while !self.sink.empty() {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(VoiceError::Cancelled);
            }
            tokio::time::sleep(PLAYBACK_POLL).await;
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.sink.stop();
        info!("AudioNarrator: stopped");
    }
}

/// Audio narration when `prefer_audio` and both TTS credentials and an output
/// device are available; the placeholder otherwise.
pub fn create_narrator(prefer_audio: bool) -> Arc<dyn Narrator> {
    if !prefer_audio {
        return Arc::new(PlaceholderNarrator);
    }
    let audio = HttpTts::from_env().and_then(|tts| AudioNarrator::new(Arc::new(tts)));
    match audio {
        Ok(narrator) => Arc::new(narrator),
        Err(e) => {
            warn!(error = %e, "audio narration unavailable; logging narration instead");
            Arc::new(PlaceholderNarrator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_speaks_instantly() {
        tokio_test::assert_ok!(PlaceholderNarrator.speak("Good form!").await);
    }

    #[test]
    fn speech_request_names_model_and_voice() {
        let tts = HttpTts::new("http://localhost/v1/", "k", "tts-1", "alloy").unwrap();
        let body = tts.request_body("Go lower");
        assert_eq!(body["model"], "tts-1");
        assert_eq!(body["voice"], "alloy");
        assert_eq!(body["input"], "Go lower");
    }

    #[tokio::test]
    async fn blank_text_synthesizes_nothing() {
        let tts = HttpTts::new("http://127.0.0.1:9", "k", "tts-1", "nova").unwrap();
        let bytes = tts.synthesize("   ").await.unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn placeholder_when_audio_not_preferred() {
        let narrator = create_narrator(false);
        narrator.cancel();
    }
}
