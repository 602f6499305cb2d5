use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use stagehand::{
	Error, StartOutcome, StopOutcome, StreamSource, Supervisor, SupervisorConfig, WorkerSpec,
	WorkerState,
};

fn test_supervisor() -> Arc<Supervisor> {
	Supervisor::new(SupervisorConfig {
		grace_period_secs: 1,
		restart_pause_ms: 50,
		log_capacity: 64,
	})
}

fn sh(name: &str, script: &str) -> WorkerSpec {
	WorkerSpec {
		name: name.to_string(),
		command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
		dir: None,
		env: HashMap::new(),
	}
}

async fn tail_text(sup: &Supervisor, name: &str, max: usize) -> String {
	sup.tail_logs(name, max)
		.await
		.unwrap()
		.iter()
		.map(|l| l.text.clone())
		.collect::<Vec<_>>()
		.join("\n")
}

// --- start/status lifecycle ---

#[tokio::test]
async fn start_then_status_running_then_stop() {
	let sup = test_supervisor();
	sup.register(sh("sleeper", "sleep 60")).await;

	assert_eq!(sup.status("sleeper").await.unwrap(), WorkerState::NotStarted);

	let outcome = sup.start("sleeper").await.unwrap();
	assert!(matches!(outcome, StartOutcome::Started { .. }));
	assert!(sup.status("sleeper").await.unwrap().is_running());

	let outcome = sup.stop("sleeper").await.unwrap();
	assert_eq!(outcome, StopOutcome::Stopped);
	assert_eq!(sup.status("sleeper").await.unwrap(), WorkerState::Stopped);
}

#[tokio::test]
async fn second_start_is_a_no_op() {
	let sup = test_supervisor();
	sup.register(sh("sleeper", "sleep 60")).await;

	let first = sup.start("sleeper").await.unwrap();
	let StartOutcome::Started { pid } = first else {
		panic!("expected a fresh start, got {:?}", first);
	};

	// No duplicate process: same outcome shape, same pid afterwards.
	let second = sup.start("sleeper").await.unwrap();
	assert_eq!(second, StartOutcome::AlreadyRunning);
	assert_eq!(sup.status("sleeper").await.unwrap(), WorkerState::Running { pid });

	let _ = sup.stop("sleeper").await;
}

#[tokio::test]
async fn stop_when_not_running() {
	let sup = test_supervisor();
	sup.register(sh("idle", "sleep 60")).await;

	let outcome = sup.stop("idle").await.unwrap();
	assert_eq!(outcome, StopOutcome::NotRunning);
	assert_eq!(sup.status("idle").await.unwrap(), WorkerState::NotStarted);
}

#[tokio::test]
async fn unknown_worker_is_an_error() {
	let sup = test_supervisor();
	assert!(matches!(
		sup.start("ghost").await,
		Err(Error::UnknownWorker(_))
	));
	assert!(matches!(
		sup.status("ghost").await,
		Err(Error::UnknownWorker(_))
	));
}

#[tokio::test]
async fn launch_failure_is_reported_and_state_unchanged() {
	let sup = test_supervisor();
	sup.register(WorkerSpec {
		name: "bad".to_string(),
		command: vec!["/nonexistent/binary".to_string()],
		dir: None,
		env: HashMap::new(),
	})
	.await;

	let result = sup.start("bad").await;
	assert!(matches!(result, Err(Error::Launch { .. })));
	assert_eq!(sup.status("bad").await.unwrap(), WorkerState::NotStarted);
}

// --- exit detection ---

#[tokio::test]
async fn clean_exit_is_detected_as_stopped() {
	let sup = test_supervisor();
	sup.register(sh("fast", "echo done")).await;
	sup.start("fast").await.unwrap();

	tokio::time::sleep(Duration::from_millis(500)).await;
	assert_eq!(sup.status("fast").await.unwrap(), WorkerState::Stopped);
}

#[tokio::test]
async fn nonzero_exit_is_detected_as_crashed() {
	let sup = test_supervisor();
	sup.register(sh("flaky", "exit 3")).await;
	sup.start("flaky").await.unwrap();

	tokio::time::sleep(Duration::from_millis(500)).await;
	assert_eq!(
		sup.status("flaky").await.unwrap(),
		WorkerState::Crashed { exit_code: 3 }
	);

	// A crashed worker can be started again.
	let outcome = sup.start("flaky").await.unwrap();
	assert!(matches!(outcome, StartOutcome::Started { .. }));
	tokio::time::sleep(Duration::from_millis(500)).await;
}

// --- log capture ---

#[tokio::test]
async fn ready_line_visible_within_a_second() {
	let sup = test_supervisor();
	sup.register(sh("echo", "echo ready; sleep 60")).await;
	sup.start("echo").await.unwrap();

	let deadline = Instant::now() + Duration::from_secs(1);
	loop {
		if tail_text(&sup, "echo", 10).await.contains("ready") {
			break;
		}
		assert!(Instant::now() < deadline, "no 'ready' line within 1s");
		tokio::time::sleep(Duration::from_millis(20)).await;
	}

	sup.stop("echo").await.unwrap();
	assert_eq!(sup.status("echo").await.unwrap(), WorkerState::Stopped);
}

#[tokio::test]
async fn stderr_lines_are_tagged() {
	let sup = test_supervisor();
	sup.register(sh("noisy", "echo out-line; echo err-line 1>&2; sleep 60"))
		.await;
	sup.start("noisy").await.unwrap();

	tokio::time::sleep(Duration::from_millis(500)).await;
	let lines = sup.tail_logs("noisy", 10).await.unwrap();
	let err = lines
		.iter()
		.find(|l| l.source == StreamSource::Stderr)
		.expect("stderr line captured");
	assert_eq!(err.text, "err-line");
	assert!(lines
		.iter()
		.any(|l| l.source == StreamSource::Stdout && l.text == "out-line"));

	let _ = sup.stop("noisy").await;
}

// --- restart ---

#[tokio::test]
async fn restart_yields_a_new_process() {
	let sup = test_supervisor();
	sup.register(sh("svc", "sleep 60")).await;

	let StartOutcome::Started { pid: old_pid } = sup.start("svc").await.unwrap() else {
		panic!("expected a fresh start");
	};

	let StartOutcome::Started { pid: new_pid } = sup.restart("svc").await.unwrap() else {
		panic!("expected restart to spawn");
	};
	assert_ne!(old_pid, new_pid);
	assert!(sup.status("svc").await.unwrap().is_running());

	let _ = sup.stop("svc").await;
}

#[tokio::test]
async fn restart_of_a_stopped_worker_just_starts_it() {
	let sup = test_supervisor();
	sup.register(sh("svc", "sleep 60")).await;

	let outcome = sup.restart("svc").await.unwrap();
	assert!(matches!(outcome, StartOutcome::Started { .. }));
	assert!(sup.status("svc").await.unwrap().is_running());

	let _ = sup.stop("svc").await;
}

// --- stop escalation and parallelism ---

#[tokio::test]
async fn stubborn_worker_is_force_killed() {
	let sup = test_supervisor();
	sup.register(sh("stubborn", "trap '' TERM; while :; do sleep 1; done"))
		.await;
	sup.start("stubborn").await.unwrap();
	tokio::time::sleep(Duration::from_millis(200)).await;

	let started = Instant::now();
	let outcome = sup.stop("stubborn").await.unwrap();
	assert_eq!(outcome, StopOutcome::Stopped);
	// Full grace period elapsed before the kill.
	assert!(started.elapsed() >= Duration::from_secs(1));
	assert_eq!(sup.status("stubborn").await.unwrap(), WorkerState::Stopped);
}

#[tokio::test]
async fn stops_on_distinct_workers_do_not_serialize() {
	let sup = test_supervisor();
	sup.register(sh("w1", "trap '' TERM; while :; do sleep 1; done")).await;
	sup.register(sh("w2", "trap '' TERM; while :; do sleep 1; done")).await;
	sup.start("w1").await.unwrap();
	sup.start("w2").await.unwrap();
	tokio::time::sleep(Duration::from_millis(200)).await;

	let started = Instant::now();
	let (a, b) = tokio::join!(
		{
			let sup = Arc::clone(&sup);
			tokio::spawn(async move { sup.stop("w1").await })
		},
		{
			let sup = Arc::clone(&sup);
			tokio::spawn(async move { sup.stop("w2").await })
		}
	);
	let elapsed = started.elapsed();

	assert_eq!(a.unwrap().unwrap(), StopOutcome::Stopped);
	assert_eq!(b.unwrap().unwrap(), StopOutcome::Stopped);
	// Each stop needs the full 1s grace period; serialized they would
	// take ~2s. Allow slack for kill latency, not for serialization.
	assert!(
		elapsed < Duration::from_millis(1900),
		"stops serialized: took {:?}",
		elapsed
	);
}

#[tokio::test]
async fn status_does_not_wait_out_a_stop() {
	let sup = test_supervisor();
	sup.register(sh("slowpoke", "trap '' TERM; while :; do sleep 1; done"))
		.await;
	sup.start("slowpoke").await.unwrap();
	tokio::time::sleep(Duration::from_millis(200)).await;

	let stopper = {
		let sup = Arc::clone(&sup);
		tokio::spawn(async move { sup.stop("slowpoke").await })
	};
	tokio::time::sleep(Duration::from_millis(200)).await;

	let started = Instant::now();
	let state = sup.status("slowpoke").await.unwrap();
	assert!(started.elapsed() < Duration::from_millis(200));
	assert_eq!(state, WorkerState::Stopping);

	assert_eq!(stopper.await.unwrap().unwrap(), StopOutcome::Stopped);
}

// --- stop_all ---

#[tokio::test]
async fn stop_all_is_best_effort_across_workers() {
	let sup = test_supervisor();
	sup.register(sh("a", "sleep 60")).await;
	sup.register(sh("b", "sleep 60")).await;
	sup.register(sh("never-started", "sleep 60")).await;
	sup.start("a").await.unwrap();
	sup.start("b").await.unwrap();

	sup.stop_all().await;

	assert_eq!(sup.status("a").await.unwrap(), WorkerState::Stopped);
	assert_eq!(sup.status("b").await.unwrap(), WorkerState::Stopped);
	assert_eq!(
		sup.status("never-started").await.unwrap(),
		WorkerState::NotStarted
	);
}

// --- overview ---

#[tokio::test]
async fn overview_joins_status_and_logs() {
	let sup = test_supervisor();
	sup.register(sh("backend", "echo up; sleep 60")).await;
	sup.register(sh("frontend", "sleep 60")).await;
	sup.start("backend").await.unwrap();

	tokio::time::sleep(Duration::from_millis(500)).await;
	let overview = sup.overview(10).await;
	assert_eq!(overview.len(), 2);

	// Sorted by name for a stable display.
	assert_eq!(overview[0].name, "backend");
	assert_eq!(overview[1].name, "frontend");
	assert!(overview[0].state.is_running());
	assert_eq!(overview[0].pid, overview[0].state.pid());
	assert!(overview[0].recent.iter().any(|l| l.text == "up"));
	assert_eq!(overview[1].state, WorkerState::NotStarted);
	assert!(overview[1].recent.is_empty());

	sup.stop_all().await;
}
