//! # stagehand
//!
//! Supervisor for a small fixed set of long-running worker processes.
//!
//! Launch, monitor, restart, and tear down named workers while draining
//! their stdout/stderr into bounded in-memory log buffers. Pairs with the
//! `stagehandd` daemon for socket-driven control.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use stagehand::{Supervisor, SupervisorConfig, WorkerSpec};
//! use std::collections::HashMap;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sup = Supervisor::new(SupervisorConfig::default());
//!
//! sup.register(WorkerSpec {
//!     name: "backend".into(),
//!     command: vec!["python".into(), "app.py".into()],
//!     dir: None,
//!     env: HashMap::new(),
//! })
//! .await;
//!
//! sup.start("backend").await.unwrap();
//! let recent = sup.tail_logs("backend", 50).await.unwrap();
//! # let _ = recent;
//! # }
//! ```

mod collector;
pub mod logbuf;
pub mod supervisor;

pub use logbuf::LogBuffer;
pub use stagehand_core::config::SupervisorConfig;
pub use stagehand_core::types::*;
pub use supervisor::Supervisor;
