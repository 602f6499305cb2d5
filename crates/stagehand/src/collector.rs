use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::logbuf::LogBuffer;
use stagehand_core::types::StreamSource;

/// Drains one output stream of one worker into its log buffer, line by line.
///
/// Runs until the OS closes the pipe, which it does when the worker exits;
/// that EOF is the sole termination signal. A read error is recorded as a
/// synthetic error line and ends the drain, since the stream is assumed gone.
pub(crate) async fn drain_stream<R>(reader: R, source: StreamSource, logs: LogBuffer)
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(reader).lines();
	loop {
		match lines.next_line().await {
			Ok(Some(line)) => logs.push(source, line).await,
			Ok(None) => break,
			Err(e) => {
				let msg = format!("[stagehand] stream read failed: {}", e);
				logs.push(StreamSource::Stderr, msg).await;
				break;
			}
		}
	}
}
