use crate::protocol::config_dir;
use crate::types::WorkerSpec;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
	#[serde(default)]
	pub supervisor: SupervisorConfig,
	#[serde(default, rename = "worker")]
	pub workers: Vec<WorkerSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
	/// Seconds a worker gets to exit after SIGTERM before SIGKILL.
	#[serde(default = "default_grace_period")]
	pub grace_period_secs: u64,
	/// Pause between stop and start during a restart, to let the OS
	/// release ports the old process held.
	#[serde(default = "default_restart_pause")]
	pub restart_pause_ms: u64,
	/// Per-worker log buffer capacity, in lines.
	#[serde(default = "default_log_capacity")]
	pub log_capacity: usize,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			grace_period_secs: default_grace_period(),
			restart_pause_ms: default_restart_pause(),
			log_capacity: default_log_capacity(),
		}
	}
}

fn default_grace_period() -> u64 {
	5
}
fn default_restart_pause() -> u64 {
	1000
}
fn default_log_capacity() -> usize {
	1000
}

pub fn load_config() -> Config {
	let path = config_dir().join("config.toml");
	if path.exists() {
		match std::fs::read_to_string(&path) {
			Ok(content) => match toml::from_str(&content) {
				Ok(config) => return config,
				Err(e) => eprintln!("warning: failed to parse {}: {}", path.display(), e),
			},
			Err(e) => eprintln!("warning: failed to read {}: {}", path.display(), e),
		}
	}
	Config::default()
}
