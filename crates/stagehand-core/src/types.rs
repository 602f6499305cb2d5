use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Immutable description of a worker: how to launch it and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSpec {
	pub name: String,
	/// Executable path followed by its arguments.
	pub command: Vec<String>,
	#[serde(default)]
	pub dir: Option<PathBuf>,
	#[serde(default)]
	pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WorkerState {
	NotStarted,
	Running { pid: u32 },
	Stopping,
	Stopped,
	Crashed { exit_code: i32 },
}

impl WorkerState {
	pub fn is_running(&self) -> bool {
		matches!(self, WorkerState::Running { .. })
	}

	pub fn pid(&self) -> Option<u32> {
		match self {
			WorkerState::Running { pid } => Some(*pid),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamSource {
	Stdout,
	Stderr,
}

/// One captured output line, tagged with the stream it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
	pub at_secs: u64,
	pub source: StreamSource,
	pub text: String,
}

impl LogLine {
	/// "HH:MM:SS text", with error-stream lines prefixed so a merged view
	/// keeps the two streams apart.
	pub fn render(&self) -> String {
		let time_of_day = self.at_secs % 86400;
		let h = time_of_day / 3600;
		let m = (time_of_day % 3600) / 60;
		let s = time_of_day % 60;
		match self.source {
			StreamSource::Stdout => format!("{:02}:{:02}:{:02} {}", h, m, s, self.text),
			StreamSource::Stderr => format!("{:02}:{:02}:{:02} ERROR: {}", h, m, s, self.text),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
	Started { pid: u32 },
	AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
	Stopped,
	NotRunning,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown worker: {0}")]
	UnknownWorker(String),

	#[error("failed to launch {name}: {source}")]
	Launch {
		name: String,
		#[source]
		source: std::io::Error,
	},
}

/// Status plus recent output for one worker, as returned by the read-only
/// overview surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerOverview {
	pub name: String,
	pub state: WorkerState,
	pub pid: Option<u32>,
	pub recent: Vec<LogLine>,
}
