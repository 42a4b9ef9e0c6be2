//! **Speech Queue**: serializes narration so utterances never overlap.
//!
//! [`SpeechQueue`] is the pure policy: which strings are worth saying, in what order,
//! and whether something is currently being said. [`SpeechDispatcher`] drives a
//! [`Narrator`] from that queue, one utterance at a time, reporting completions over
//! a channel so the frame loop never waits on speech.

use crate::narrator::Narrator;
use crate::error::VoiceError;
use formcoach_core::CoachConfig;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Pending narration plus the enqueue policy.
#[derive(Debug, Clone)]
pub struct SpeechQueue {
    pending: VecDeque<String>,
    speaking: bool,
    last_accepted: Option<String>,
    last_accepted_at: Option<Instant>,
    incorrect_since: Option<Instant>,
    routine_interval: Duration,
    persistent_error: Duration,
}

impl SpeechQueue {
    pub fn new(routine_interval: Duration, persistent_error: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            speaking: false,
            last_accepted: None,
            last_accepted_at: None,
            incorrect_since: None,
            routine_interval,
            persistent_error,
        }
    }

    pub fn from_config(config: &CoachConfig) -> Self {
        Self::new(config.routine_speech_interval(), config.persistent_error())
    }

    /// Offer one frame's feedback. Returns whether it was queued.
    ///
    /// Repeats of the last accepted string are always dropped. Otherwise a string is
    /// queued at once when a rep just completed or form has been wrong for the
    /// persistent-error window, and after the routine interval in every other case.
    pub fn offer(&mut self, text: &str, rep_complete: bool, is_correct: bool, now: Instant) -> bool {
        if is_correct {
            self.incorrect_since = None;
        } else {
            self.incorrect_since.get_or_insert(now);
        }

        let text = text.trim();
        if text.is_empty() || self.last_accepted.as_deref() == Some(text) {
            return false;
        }

        let persistent = self
            .incorrect_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.persistent_error);
        let routine_due = self
            .last_accepted_at
            .map_or(true, |at| now.saturating_duration_since(at) >= self.routine_interval);
        if !(rep_complete || persistent || routine_due) {
            return false;
        }

        self.accept(text, now);
        true
    }

    /// Queue advisory text. It is already rate-limited upstream, so only the
    /// repeat check applies.
    pub fn offer_advice(&mut self, text: &str, now: Instant) -> bool {
        let text = text.trim();
        if text.is_empty() || self.last_accepted.as_deref() == Some(text) {
            return false;
        }
        self.accept(text, now);
        true
    }

    fn accept(&mut self, text: &str, now: Instant) {
        self.pending.push_back(text.to_string());
        self.last_accepted = Some(text.to_string());
        self.last_accepted_at = Some(now);
    }

    /// Head of the queue, unless something is already being spoken. Marks speaking.
    pub fn next_utterance(&mut self) -> Option<String> {
        if self.speaking {
            return None;
        }
        let text = self.pending.pop_front()?;
        self.speaking = true;
        Some(text)
    }

    /// The current utterance ended (spoken or failed).
    pub fn finish(&mut self) {
        self.speaking = false;
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Nothing queued and nothing being spoken.
    pub fn is_idle(&self) -> bool {
        !self.speaking && self.pending.is_empty()
    }

    /// Drop everything pending and the speaking flag.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.speaking = false;
    }
}

impl Default for SpeechQueue {
    fn default() -> Self {
        Self::from_config(&CoachConfig::default())
    }
}

/// Result of one narration attempt.
#[derive(Debug)]
pub struct Utterance {
    pub text: String,
    pub error: Option<VoiceError>,
}

/// Runs narration tasks off a [`SpeechQueue`]. Must be used inside a tokio runtime.
pub struct SpeechDispatcher {
    queue: SpeechQueue,
    narrator: Arc<dyn Narrator>,
    done_tx: mpsc::UnboundedSender<Utterance>,
    done_rx: mpsc::UnboundedReceiver<Utterance>,
    current: Option<JoinHandle<()>>,
    spoken: u32,
    failed: u32,
}

impl SpeechDispatcher {
    pub fn new(queue: SpeechQueue, narrator: Arc<dyn Narrator>) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            queue,
            narrator,
            done_tx,
            done_rx,
            current: None,
            spoken: 0,
            failed: 0,
        }
    }

    pub fn queue(&self) -> &SpeechQueue {
        &self.queue
    }

    pub fn spoken(&self) -> u32 {
        self.spoken
    }

    pub fn failed(&self) -> u32 {
        self.failed
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// Offer frame feedback; starts narration if the narrator is free.
    pub fn offer(&mut self, text: &str, rep_complete: bool, is_correct: bool, now: Instant) -> bool {
        let accepted = self.queue.offer(text, rep_complete, is_correct, now);
        self.pump();
        accepted
    }

    pub fn offer_advice(&mut self, text: &str, now: Instant) -> bool {
        let accepted = self.queue.offer_advice(text, now);
        self.pump();
        accepted
    }

    fn pump(&mut self) {
        let Some(text) = self.queue.next_utterance() else {
            return;
        };
        debug!(text = %text, pending = self.queue.len(), "narration started");
        let narrator = Arc::clone(&self.narrator);
        let tx = self.done_tx.clone();
        self.current = Some(tokio::spawn(async move {
            let error = narrator.speak(&text).await.err();
            let _ = tx.send(Utterance { text, error });
        }));
    }

    /// Wait for the current utterance to end, then start the next one.
    /// Pends while nothing is being spoken. Cancel-safe.
    pub async fn next_finished(&mut self) -> Option<Utterance> {
        let utterance = self.done_rx.recv().await?;
        self.current = None;
        self.queue.finish();
        match &utterance.error {
            None => self.spoken += 1,
            Some(e) => {
                self.failed += 1;
                warn!(error = %e, text = %utterance.text, "narration failed; utterance dropped");
            }
        }
        self.pump();
        Some(utterance)
    }

    /// Stop speaking and forget everything pending.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
        self.narrator.cancel();
        self.queue.clear();
        while self.done_rx.try_recv().is_ok() {}
    }
}

impl Drop for SpeechDispatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> SpeechQueue {
        SpeechQueue::new(Duration::from_secs(5), Duration::from_secs(1))
    }

    #[test]
    fn repeat_of_last_accepted_is_dropped() {
        let mut q = queue();
        let t0 = Instant::now();
        assert!(q.offer("Good form!", false, true, t0));
        assert!(!q.offer("Good form!", true, true, t0 + Duration::from_secs(30)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn routine_text_waits_for_interval() {
        let mut q = queue();
        let t0 = Instant::now();
        assert!(q.offer("Lowering (knee: 140°)", false, true, t0));
        assert!(!q.offer("Lowering (knee: 120°)", false, true, t0 + Duration::from_millis(4999)));
        assert!(q.offer("Lowering (knee: 110°)", false, true, t0 + Duration::from_secs(5)));
    }

    #[test]
    fn rep_completion_bypasses_interval() {
        let mut q = queue();
        let t0 = Instant::now();
        q.offer("Rising (knee: 120°)", false, true, t0);
        assert!(q.offer("Great job! Rep 1 completed!", true, true, t0 + Duration::from_millis(10)));
    }

    #[test]
    fn persistent_error_bypasses_interval() {
        let mut q = queue();
        let t0 = Instant::now();
        q.offer("Good form!", false, true, t0);
        // Wrong for under a second: routine rules apply.
        assert!(!q.offer("Go lower", false, false, t0 + Duration::from_millis(100)));
        assert!(!q.offer("Go lower", false, false, t0 + Duration::from_millis(1099)));
        assert!(q.offer("Go lower", false, false, t0 + Duration::from_millis(1100)));
    }

    #[test]
    fn correct_frame_resets_error_streak() {
        let mut q = queue();
        let t0 = Instant::now();
        q.offer("Good form!", false, true, t0);
        q.offer("Go lower", false, false, t0 + Duration::from_millis(100));
        q.offer("Rising", false, true, t0 + Duration::from_millis(900));
        assert!(!q.offer("Go lower", false, false, t0 + Duration::from_millis(1500)));
    }

    #[test]
    fn fifo_with_single_speaker() {
        let mut q = queue();
        let t0 = Instant::now();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            assert!(q.offer(text, true, true, t0 + Duration::from_millis(i as u64 * 40)));
        }
        assert_eq!(q.next_utterance().as_deref(), Some("one"));
        assert!(q.is_speaking());
        assert_eq!(q.next_utterance(), None);
        q.finish();
        assert_eq!(q.next_utterance().as_deref(), Some("two"));
        q.finish();
        assert_eq!(q.next_utterance().as_deref(), Some("three"));
        q.finish();
        assert!(q.is_idle());
    }

    #[test]
    fn advice_only_checks_repeats() {
        let mut q = queue();
        let t0 = Instant::now();
        q.offer("Good form!", false, true, t0);
        assert!(q.offer_advice("Keep your chest up.", t0));
        assert!(!q.offer_advice("Keep your chest up.", t0 + Duration::from_secs(20)));
    }
}
