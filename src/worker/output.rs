// src/worker/output.rs

//! Captured stdout/stderr of a worker.
//!
//! Output is kept for diagnostics only; nothing in the orchestrator parses
//! it to make control decisions. Each stream keeps its most recent
//! `limit` lines.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::worker::WorkerId;

/// How long to wait for pipe readers after the process exited.
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Immutable copy of a worker's captured output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSnapshot {
    pub stdout: String,
    pub stderr: String,
}

impl OutputSnapshot {
    /// Last non-empty stderr line, handy for one-line error summaries.
    pub fn last_stderr_line(&self) -> Option<&str> {
        self.stderr.lines().rev().find(|l| !l.trim().is_empty())
    }
}

#[derive(Debug)]
struct Buffers {
    stdout: VecDeque<String>,
    stderr: VecDeque<String>,
    limit: usize,
}

impl Buffers {
    fn stream_mut(&mut self, stream: Stream) -> &mut VecDeque<String> {
        match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        }
    }
}

/// Line buffers shared between the pipe readers and the handle.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    inner: Arc<Mutex<Buffers>>,
}

impl CapturedOutput {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Buffers {
                stdout: VecDeque::new(),
                stderr: VecDeque::new(),
                limit: limit.max(1),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, stream: Stream, line: impl Into<String>) {
        let mut buffers = self.lock();
        let limit = buffers.limit;
        let lines = buffers.stream_mut(stream);
        if lines.len() == limit {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    pub fn lines(&self, stream: Stream) -> Vec<String> {
        let mut buffers = self.lock();
        buffers.stream_mut(stream).iter().cloned().collect()
    }

    pub fn snapshot(&self) -> OutputSnapshot {
        let buffers = self.lock();
        OutputSnapshot {
            stdout: join_lines(&buffers.stdout),
            stderr: join_lines(&buffers.stderr),
        }
    }
}

fn join_lines(lines: &VecDeque<String>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Reader tasks draining a child's pipes into a [`CapturedOutput`].
#[derive(Debug, Default)]
pub struct OutputPumps {
    tasks: Vec<JoinHandle<()>>,
}

impl OutputPumps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task that reads `reader` line by line into `output`.
    ///
    /// The pipe is read until EOF no matter what the worker writes: bytes
    /// that are not UTF-8 are replaced, and read errors are logged and
    /// skipped. Closing the read end early would make the worker's next
    /// write fail with a broken pipe.
    pub fn attach<R>(&mut self, reader: R, stream: Stream, output: &CapturedOutput, id: WorkerId)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let output = output.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = decode_line(&buf);
                        match stream {
                            Stream::Stdout => debug!(worker = %id, "stdout: {}", line),
                            Stream::Stderr => debug!(worker = %id, "stderr: {}", line),
                        }
                        output.push(stream, line);
                    }
                    Err(err) => {
                        warn!(worker = %id, ?stream, error = %err, "error reading worker output");
                        tokio::task::yield_now().await;
                    }
                }
            }
        }));
    }

    /// Wait for the readers to hit EOF.
    ///
    /// All readers share one deadline `limit` from now: a grandchild holding
    /// a pipe open must not stall the exit report.
    pub async fn drain(self, limit: Duration) {
        let deadline = Instant::now() + limit;
        for task in self.tasks {
            if timeout_at(deadline, task).await.is_err() {
                debug!("output reader still open after exit; abandoning it");
            }
        }
    }
}

/// One captured line without its terminator, lossily decoded.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
