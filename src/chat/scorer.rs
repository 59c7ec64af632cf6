use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use surrealdb::types::RecordId;
use tracing::{debug, warn};

use crate::chat::channel::MessagePublisher;
use crate::models::{AiAnalysis, MessageType, AI_SENDER_ID};

/// Phrases that mark a message as a find claim. Matched on lowercased
/// text; the Indonesian pair comes from the mobile app's user base.
const TRIGGER_PHRASES: &[&str] = &["found it", "located", "menemukan", "ketemu"];

/// Gap between the trigger message and the synthetic verdict. The
/// scoring runs as its own task, so the sender's call never waits on
/// it.
const DEFAULT_SCORING_DELAY: Duration = Duration::from_secs(2);

/// Scores a find claim in [0, 10]. The shipped implementation is a
/// uniform random placeholder; a real classifier replaces it behind
/// this trait without touching the channel or the message schema.
pub trait ScoringStrategy: Send + Sync {
	fn score(&self, message: &str) -> f64;
}

/// Placeholder strategy: uniform in [0, 10], ignores the text.
pub struct RandomStrategy;

impl ScoringStrategy for RandomStrategy {
	fn score(&self, _message: &str) -> f64 {
		rand::thread_rng().gen_range(0.0..=10.0)
	}
}

/// Watches outgoing messages for find claims and appends a scored
/// verification message after a delay.
///
/// Each trigger queues its own independent task; there is no debounce
/// and a pending task is not canceled when the conversation view
/// closes — the verdict still lands in the store.
pub struct VerificationScorer {
	strategy: Arc<dyn ScoringStrategy>,
	delay: Duration,
}

impl Default for VerificationScorer {
	fn default() -> Self {
		VerificationScorer {
			strategy: Arc::new(RandomStrategy),
			delay: DEFAULT_SCORING_DELAY,
		}
	}
}

impl VerificationScorer {
	pub fn with_strategy(strategy: Arc<dyn ScoringStrategy>, delay: Duration) -> Self {
		VerificationScorer { strategy, delay }
	}

	/// Whether the text contains a trigger phrase.
	pub fn is_trigger(text: &str) -> bool {
		let lower = text.to_lowercase();
		TRIGGER_PHRASES.iter().any(|phrase| lower.contains(phrase))
	}

	/// Human-readable verdict for a score.
	pub fn verdict(score: f64) -> &'static str {
		if score > 7.0 {
			"Likely valid."
		} else if score >= 4.0 {
			"Needs further verification."
		} else {
			"Likely invalid."
		}
	}

	/// Queue one scoring task for a just-sent trigger message. A failed
	/// append is logged and the score dropped; the sender is never
	/// notified.
	pub(crate) fn spawn_scoring(
		&self,
		publisher: MessagePublisher,
		conversation_id: RecordId,
		text: String,
	) {
		let strategy = self.strategy.clone();
		let delay = self.delay;

		tokio::spawn(async move {
			tokio::time::sleep(delay).await;

			let score = strategy.score(&text).clamp(0.0, 10.0);
			let analysis = AiAnalysis { score, confidence: score / 10.0 };
			let body = format!(
				"AI Verification: confidence {score:.1}/10. {}",
				VerificationScorer::verdict(score)
			);

			match publisher
				.append(
					&conversation_id,
					AI_SENDER_ID,
					&body,
					MessageType::Verification,
					Some(analysis),
					false,
				)
				.await
			{
				Ok(_) => debug!(score, "verification message appended"),
				Err(e) => warn!(error = %e, "verification append failed; score dropped"),
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn trigger_phrases_match_case_insensitively() {
		assert!(VerificationScorer::is_trigger("I Found It near the gate"));
		assert!(VerificationScorer::is_trigger("we located your bag"));
		assert!(VerificationScorer::is_trigger("saya menemukan dompet anda"));
		assert!(VerificationScorer::is_trigger("sudah KETEMU tadi pagi"));
		assert!(!VerificationScorer::is_trigger("is it still missing?"));
		assert!(!VerificationScorer::is_trigger(""));
	}

	#[test]
	fn verdict_thresholds() {
		assert_eq!(VerificationScorer::verdict(7.01), "Likely valid.");
		assert_eq!(VerificationScorer::verdict(7.00), "Needs further verification.");
		assert_eq!(VerificationScorer::verdict(4.00), "Needs further verification.");
		assert_eq!(VerificationScorer::verdict(3.99), "Likely invalid.");
		assert_eq!(VerificationScorer::verdict(10.0), "Likely valid.");
		assert_eq!(VerificationScorer::verdict(0.0), "Likely invalid.");
	}

	#[test]
	fn random_strategy_stays_in_range() {
		let strategy = RandomStrategy;
		for _ in 0..1000 {
			let score = strategy.score("anything");
			assert!((0.0..=10.0).contains(&score));
		}
	}
}
