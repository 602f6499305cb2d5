use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use stagehand_core::types::{LogLine, StreamSource};

/// Bounded, shared store of one worker's recent output lines.
///
/// Collector tasks append concurrently with readers tailing; both streams of
/// a worker land in the same buffer, ordered by arrival. Overflow evicts the
/// oldest half in one batch, so staying bounded costs O(1) amortized per
/// append instead of O(n) at capacity.
#[derive(Clone)]
pub struct LogBuffer {
	lines: Arc<Mutex<VecDeque<LogLine>>>,
	capacity: usize,
}

impl LogBuffer {
	pub fn new(capacity: usize) -> Self {
		Self {
			lines: Arc::new(Mutex::new(VecDeque::new())),
			capacity,
		}
	}

	pub async fn push(&self, source: StreamSource, text: String) {
		let at_secs = now_secs();
		let mut lines = self.lines.lock().await;
		lines.push_back(LogLine { at_secs, source, text });
		if lines.len() > self.capacity {
			// Keep at least the line just appended, even at capacity 1.
			let keep = (self.capacity / 2).max(1);
			let excess = lines.len().saturating_sub(keep);
			lines.drain(..excess);
		}
	}

	/// The most recent `max` lines in arrival order. Does not mutate the
	/// buffer; appenders hold the lock only briefly, never across IO.
	pub async fn tail(&self, max: usize) -> Vec<LogLine> {
		let lines = self.lines.lock().await;
		let skip = lines.len().saturating_sub(max);
		lines.iter().skip(skip).cloned().collect()
	}

	pub async fn len(&self) -> usize {
		self.lines.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.lines.lock().await.is_empty()
	}
}

fn now_secs() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}
