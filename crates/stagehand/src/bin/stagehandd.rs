use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

use stagehand::{StartOutcome, StopOutcome, Supervisor};
use stagehand_core::config;
use stagehand_core::protocol::{self, Request, Response};

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt().init();

	let config = config::load_config();
	let supervisor = Supervisor::new(config.supervisor.clone());
	for spec in config.workers {
		supervisor.register(spec).await;
	}

	// Ensure state directory exists
	let state_dir = protocol::state_dir();
	let _ = std::fs::create_dir_all(&state_dir);

	// Write PID file
	let pid_path = protocol::pid_path();
	let _ = std::fs::write(&pid_path, std::process::id().to_string());

	// Clean up stale socket
	let socket_path = protocol::socket_path();
	if socket_path.exists() {
		let _ = std::fs::remove_file(&socket_path);
	}

	let sup_socket = Arc::clone(&supervisor);
	let socket_handle = tokio::spawn(async move {
		run_socket_server(sup_socket, socket_path).await;
	});

	tracing::info!("daemon started (pid {})", std::process::id());

	tokio::select! {
		_ = socket_handle => {},
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("shutting down");
		}
	}

	// Take the workers down with us; orphans would outlive the daemon
	supervisor.stop_all().await;
	protocol::remove_runtime_files();
}

async fn run_socket_server(supervisor: Arc<Supervisor>, socket_path: PathBuf) {
	let listener = match UnixListener::bind(&socket_path) {
		Ok(l) => l,
		Err(e) => {
			tracing::error!("failed to bind socket: {}", e);
			return;
		}
	};

	tracing::info!("listening on {}", socket_path.display());

	loop {
		let (stream, _) = match listener.accept().await {
			Ok(s) => s,
			Err(e) => {
				tracing::error!("accept error: {}", e);
				continue;
			}
		};

		let sup = Arc::clone(&supervisor);
		tokio::spawn(async move {
			let (reader, mut writer) = stream.into_split();
			let mut lines = BufReader::new(reader).lines();

			while let Ok(Some(line)) = lines.next_line().await {
				let request: Request = match serde_json::from_str(&line) {
					Ok(r) => r,
					Err(e) => {
						let resp = Response::Error {
							message: format!("invalid request: {}", e),
						};
						let _ = write_response(&mut writer, &resp).await;
						continue;
					}
				};

				let response = handle_request(&sup, request).await;
				if write_response(&mut writer, &response).await.is_err() {
					break;
				}
			}
		});
	}
}

async fn handle_request(supervisor: &Arc<Supervisor>, request: Request) -> Response {
	match request {
		Request::Ping => Response::Pong,
		Request::Start { name } => match supervisor.start(&name).await {
			Ok(StartOutcome::Started { pid }) => Response::Ok {
				message: Some(format!("{}: started (pid {})", name, pid)),
			},
			Ok(StartOutcome::AlreadyRunning) => Response::Ok {
				message: Some(format!("{}: already running", name)),
			},
			Err(e) => Response::Error { message: e.to_string() },
		},
		Request::Stop { name } => match supervisor.stop(&name).await {
			Ok(StopOutcome::Stopped) => Response::Ok {
				message: Some(format!("{}: stopped", name)),
			},
			Ok(StopOutcome::NotRunning) => Response::Ok {
				message: Some(format!("{}: not running", name)),
			},
			Err(e) => Response::Error { message: e.to_string() },
		},
		Request::Restart { name } => match supervisor.restart(&name).await {
			Ok(StartOutcome::Started { pid }) => Response::Ok {
				message: Some(format!("{}: restarted (pid {})", name, pid)),
			},
			Ok(StartOutcome::AlreadyRunning) => Response::Ok {
				message: Some(format!("{}: already running", name)),
			},
			Err(e) => Response::Error { message: e.to_string() },
		},
		Request::StopAll => {
			supervisor.stop_all().await;
			Response::Ok {
				message: Some("all workers stopped".to_string()),
			}
		}
		Request::Status { name } => match supervisor.status(&name).await {
			Ok(state) => Response::Status { state },
			Err(e) => Response::Error { message: e.to_string() },
		},
		Request::Logs { name, lines } => match supervisor.tail_logs(&name, lines).await {
			Ok(lines) => Response::Logs { lines },
			Err(e) => Response::Error { message: e.to_string() },
		},
		Request::Overview { lines } => Response::Overview {
			workers: supervisor.overview(lines).await,
		},
		Request::Shutdown => {
			supervisor.stop_all().await;
			tokio::spawn(async {
				tokio::time::sleep(std::time::Duration::from_millis(100)).await;
				protocol::remove_runtime_files();
				std::process::exit(0);
			});
			Response::Ok {
				message: Some("shutting down".to_string()),
			}
		}
	}
}

async fn write_response(
	writer: &mut tokio::net::unix::OwnedWriteHalf,
	response: &Response,
) -> Result<(), std::io::Error> {
	let mut data = serde_json::to_vec(response).unwrap_or_default();
	data.push(b'\n');
	writer.write_all(&data).await
}
