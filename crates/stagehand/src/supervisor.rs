use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;

use stagehand_core::config::SupervisorConfig;
use stagehand_core::types::*;

use crate::collector;
use crate::logbuf::LogBuffer;

/// Supervises a fixed set of named workers: spawns them with captured
/// output, tears them down gracefully, and answers status and log queries.
pub struct Supervisor {
	workers: RwLock<HashMap<String, Arc<Worker>>>,
	config: SupervisorConfig,
}

/// One tracked worker. The async mutex around the live process serializes
/// lifecycle operations for this worker only; workers never contend with
/// each other, and the supervisor map lock is held just long enough to look
/// a handle up.
struct Worker {
	spec: WorkerSpec,
	logs: LogBuffer,
	/// Mirror of the lifecycle state, readable while an operation holds
	/// the process slot (a status poll must not wait out a stop).
	state: std::sync::Mutex<WorkerState>,
	proc: tokio::sync::Mutex<Option<Child>>,
}

impl Worker {
	fn state(&self) -> WorkerState {
		self.state.lock().unwrap().clone()
	}

	fn set_state(&self, state: WorkerState) {
		*self.state.lock().unwrap() = state;
	}

	/// Polls the stored process so cached state never outlives the OS
	/// process; a worker that died behind our back is detected here.
	fn refresh(&self, slot: &mut Option<Child>) {
		if let Some(child) = slot.as_mut() {
			match child.try_wait() {
				Ok(None) => {}
				Ok(Some(status)) => {
					*slot = None;
					self.set_state(state_for_exit(status));
				}
				Err(_) => {
					*slot = None;
					self.set_state(WorkerState::Stopped);
				}
			}
		}
	}
}

fn state_for_exit(status: ExitStatus) -> WorkerState {
	if status.success() {
		WorkerState::Stopped
	} else {
		WorkerState::Crashed {
			exit_code: status.code().unwrap_or(-1),
		}
	}
}

impl Supervisor {
	pub fn new(config: SupervisorConfig) -> Arc<Self> {
		Arc::new(Self {
			workers: RwLock::new(HashMap::new()),
			config,
		})
	}

	/// Installs a handle for the spec's name. A name already registered
	/// keeps its original spec; swapping it while a process may be live
	/// would break the one-process-per-name invariant.
	pub async fn register(&self, spec: WorkerSpec) {
		let capacity = self.config.log_capacity;
		let mut workers = self.workers.write().await;
		workers.entry(spec.name.clone()).or_insert_with(|| {
			Arc::new(Worker {
				logs: LogBuffer::new(capacity),
				state: std::sync::Mutex::new(WorkerState::NotStarted),
				proc: tokio::sync::Mutex::new(None),
				spec,
			})
		});
	}

	async fn worker(&self, name: &str) -> Result<Arc<Worker>, Error> {
		let workers = self.workers.read().await;
		workers
			.get(name)
			.cloned()
			.ok_or_else(|| Error::UnknownWorker(name.to_string()))
	}

	pub async fn start(&self, name: &str) -> Result<StartOutcome, Error> {
		let worker = self.worker(name).await?;
		let mut slot = worker.proc.lock().await;
		worker.refresh(&mut slot);
		if slot.is_some() {
			return Ok(StartOutcome::AlreadyRunning);
		}

		let mut child = spawn_worker(&worker.spec).map_err(|e| Error::Launch {
			name: name.to_string(),
			source: e,
		})?;
		let pid = child.id().unwrap_or(0);

		if let Some(stdout) = child.stdout.take() {
			let logs = worker.logs.clone();
			tokio::spawn(async move {
				collector::drain_stream(stdout, StreamSource::Stdout, logs).await;
			});
		}
		if let Some(stderr) = child.stderr.take() {
			let logs = worker.logs.clone();
			tokio::spawn(async move {
				collector::drain_stream(stderr, StreamSource::Stderr, logs).await;
			});
		}

		*slot = Some(child);
		worker.set_state(WorkerState::Running { pid });
		tracing::info!("{}: started (pid {})", name, pid);
		Ok(StartOutcome::Started { pid })
	}

	/// Blocks the caller until the worker has fully exited: SIGTERM to the
	/// process group, a grace period, then SIGKILL plus an unconditional
	/// wait. Only this worker's slot is held meanwhile, so stops on
	/// different workers run in parallel.
	pub async fn stop(&self, name: &str) -> Result<StopOutcome, Error> {
		let worker = self.worker(name).await?;
		let mut slot = worker.proc.lock().await;
		worker.refresh(&mut slot);
		let Some(mut child) = slot.take() else {
			return Ok(StopOutcome::NotRunning);
		};

		worker.set_state(WorkerState::Stopping);
		let pid = child.id();
		if let Some(pid) = pid {
			signal_group(pid, nix::sys::signal::Signal::SIGTERM);
		}

		let grace = Duration::from_secs(self.config.grace_period_secs);
		match tokio::time::timeout(grace, child.wait()).await {
			Ok(_) => {}
			Err(_) => {
				// Grace period exhausted; escalate, then reap.
				if let Some(pid) = pid {
					signal_group(pid, nix::sys::signal::Signal::SIGKILL);
				}
				let _ = child.kill().await;
				let _ = child.wait().await;
				tracing::warn!(
					"{}: force-killed after {}s grace period",
					name,
					self.config.grace_period_secs
				);
			}
		}

		worker.set_state(WorkerState::Stopped);
		tracing::info!("{}: stopped", name);
		Ok(StopOutcome::Stopped)
	}

	/// Stop, a short pause so the OS can release ports the old process
	/// held, then start. A worker that was not running restarts anyway.
	pub async fn restart(&self, name: &str) -> Result<StartOutcome, Error> {
		let _ = self.stop(name).await?;
		tokio::time::sleep(Duration::from_millis(self.config.restart_pause_ms)).await;
		self.start(name).await
	}

	/// Best-effort: one concurrent stop per tracked worker, failures
	/// logged and never aborting the rest.
	pub async fn stop_all(self: &Arc<Self>) {
		let names: Vec<String> = self.workers.read().await.keys().cloned().collect();
		let mut handles = Vec::new();
		for name in names {
			let sup = Arc::clone(self);
			handles.push(tokio::spawn(async move {
				if let Err(e) = sup.stop(&name).await {
					tracing::warn!("{}: stop failed: {}", name, e);
				}
			}));
		}
		for handle in handles {
			let _ = handle.await;
		}
	}

	/// Current state, derived from OS-level liveness rather than trusted
	/// from bookkeeping. If a lifecycle operation holds the slot right now
	/// the mirrored state it maintains is reported instead of waiting.
	pub async fn status(&self, name: &str) -> Result<WorkerState, Error> {
		let worker = self.worker(name).await?;
		if let Ok(mut slot) = worker.proc.try_lock() {
			worker.refresh(&mut slot);
		}
		Ok(worker.state())
	}

	/// The most recent `max` log lines; never blocks on worker lifecycle.
	pub async fn tail_logs(&self, name: &str, max: usize) -> Result<Vec<LogLine>, Error> {
		let worker = self.worker(name).await?;
		Ok(worker.logs.tail(max).await)
	}

	/// Read-only snapshot across every tracked worker, for a periodic
	/// status viewer. Purely derived; holds no extra state.
	pub async fn overview(&self, tail: usize) -> Vec<WorkerOverview> {
		let mut entries: Vec<(String, Arc<Worker>)> = {
			let workers = self.workers.read().await;
			workers.iter().map(|(n, w)| (n.clone(), Arc::clone(w))).collect()
		};
		entries.sort_by(|a, b| a.0.cmp(&b.0));

		let mut result = Vec::new();
		for (name, worker) in entries {
			if let Ok(mut slot) = worker.proc.try_lock() {
				worker.refresh(&mut slot);
			}
			let state = worker.state();
			result.push(WorkerOverview {
				name,
				pid: state.pid(),
				state,
				recent: worker.logs.tail(tail).await,
			});
		}
		result
	}
}

fn spawn_worker(spec: &WorkerSpec) -> std::io::Result<Child> {
	let (program, args) = spec
		.command
		.split_first()
		.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;

	let mut cmd = Command::new(program);
	cmd.args(args)
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		// Own process group, so termination signals reach the whole tree
		.process_group(0);

	if let Some(dir) = &spec.dir {
		cmd.current_dir(dir);
	}
	for (key, val) in &spec.env {
		cmd.env(key, val);
	}

	cmd.spawn()
}

fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
	use nix::sys::signal::killpg;
	use nix::unistd::Pid;
	let _ = killpg(Pid::from_raw(pid as i32), signal);
}
