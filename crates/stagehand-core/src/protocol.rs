use crate::types::{LogLine, WorkerOverview, WorkerState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
	Start { name: String },
	Stop { name: String },
	Restart { name: String },
	StopAll,
	Status { name: String },
	Logs { name: String, lines: usize },
	Overview { lines: usize },
	Ping,
	Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
	Ok { message: Option<String> },
	Status { state: WorkerState },
	Logs { lines: Vec<LogLine> },
	Overview { workers: Vec<WorkerOverview> },
	Error { message: String },
	Pong,
}

pub const SOCKET_NAME: &str = "daemon.sock";

pub fn socket_path() -> std::path::PathBuf {
	state_dir().join(SOCKET_NAME)
}

pub fn pid_path() -> std::path::PathBuf {
	state_dir().join("daemon.pid")
}

pub fn state_dir() -> std::path::PathBuf {
	if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
		std::path::PathBuf::from(dir).join("stagehand")
	} else if let Some(home) = home_dir() {
		home.join(".local").join("state").join("stagehand")
	} else {
		std::path::PathBuf::from("/tmp/stagehand")
	}
}

pub fn config_dir() -> std::path::PathBuf {
	if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
		std::path::PathBuf::from(dir).join("stagehand")
	} else if let Some(home) = home_dir() {
		home.join(".config").join("stagehand")
	} else {
		std::path::PathBuf::from("/tmp/stagehand/config")
	}
}

fn home_dir() -> Option<std::path::PathBuf> {
	std::env::var("HOME").ok().map(std::path::PathBuf::from)
}

/// Remove the socket and PID files a daemon instance leaves behind. Every
/// daemon exit path goes through this so no stale files survive.
pub fn remove_runtime_files() {
	let _ = std::fs::remove_file(socket_path());
	let _ = std::fs::remove_file(pid_path());
}
