// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Server process lifecycle.
//!
//! Spawns one target's server with both output streams piped, drains them in
//! background tasks for the whole process lifetime, and resolves readiness
//! exactly once from whichever comes first: a "listening" phrase in the
//! output, a successful health poll, the readiness ceiling, or the process
//! exiting. Teardown is idempotent and never fails.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{BenchConfig, ReadinessStrategy};
use crate::discovery::resolve_entry;
use crate::error::ProcessError;
use crate::retry::{RetryClient, RetryPolicy};
use crate::state::{ProcessState, ProcessStateMachine};
use crate::types::{Port, Target};

/// Longest chunk of output logged as one line.
const MAX_LINE_BYTES: u64 = 8 * 1024;

/// Grace period between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(2);

/// Wait for the OS to release the listening port after the kill.
const PORT_RELEASE_WAIT: Duration = Duration::from_millis(300);

/// Second wait before force-releasing a port that is still bound.
const PORT_RECHECK_WAIT: Duration = Duration::from_millis(600);

/// Connect timeout used when probing whether the port is bound.
const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// How long teardown waits for the drain tasks before aborting them.
const DRAIN_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-attempt timeout for readiness polling.
const POLL_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// What resolved readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySource {
    /// A readiness phrase appeared in the output.
    Pattern,
    /// The health endpoint answered.
    Poll,
    /// Nothing was observed before the ceiling; proceeding anyway.
    Timeout,
    /// The process exited before signalling readiness.
    Exited(Option<i32>),
}

impl fmt::Display for ReadySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => write!(f, "output pattern"),
            Self::Poll => write!(f, "health poll"),
            Self::Timeout => write!(f, "timeout"),
            Self::Exited(Some(code)) => write!(f, "exited with code {}", code),
            Self::Exited(None) => write!(f, "exited by signal"),
        }
    }
}

/// One-shot readiness signal. Only the first `fire` delivers.
#[derive(Debug, Clone)]
struct ReadySignal {
    sender: Arc<Mutex<Option<oneshot::Sender<ReadySource>>>>,
}

impl ReadySignal {
    fn new() -> (Self, oneshot::Receiver<ReadySource>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Returns true when this call was the one that resolved readiness.
    fn fire(&self, source: ReadySource) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(source).is_ok(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    const fn name(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Resolved command line for a target's server.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub entry: PathBuf,
}

impl LaunchSpec {
    /// Runtime launcher + resolved entry file.
    pub fn resolve(config: &BenchConfig, target: &Target) -> Result<Self, ProcessError> {
        let runtime = config
            .runtimes
            .get(target.runtime())
            .ok_or_else(|| ProcessError::UnknownRuntime {
                runtime: target.runtime().to_string(),
            })?;

        let entry = resolve_entry(&config.paths.source_dir, target)?;

        let mut launcher = runtime.launcher.iter();
        let program = launcher
            .next()
            .cloned()
            .ok_or_else(|| ProcessError::UnknownRuntime {
                runtime: target.runtime().to_string(),
            })?;

        let mut args: Vec<String> = launcher.cloned().collect();
        args.push(entry.to_string_lossy().to_string());

        let mut env = BTreeMap::new();
        env.insert("NODE_ENV".to_string(), "production".to_string());
        env.extend(runtime.env.clone());

        Ok(Self {
            program,
            args,
            env,
            entry,
        })
    }

    /// The command line as one string, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// An owned, live server process.
///
/// Must be stopped before the next target starts; the child is also killed
/// if the handle is dropped without `stop`.
pub struct ServerProcess {
    target: Target,
    child: Child,
    pid: Option<u32>,
    state: ProcessStateMachine,
    host: String,
    port: Port,
    drains: Vec<JoinHandle<()>>,
    ready_source: ReadySource,
}

impl ServerProcess {
    /// Spawn the target's server and wait until readiness resolves.
    ///
    /// Any stale listener on the port is cleared first.
    pub async fn start(
        config: &BenchConfig,
        target: &Target,
        client: &RetryClient,
    ) -> Result<Self, ProcessError> {
        release_port(&config.host, config.port).await;

        let spec = LaunchSpec::resolve(config, target)?;
        tracing::info!(target_id = %target, command = %spec.command_line(), "Starting server");

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed {
                target: target.clone(),
                reason: format!("Failed to spawn '{}': {}", spec.program, e),
            })?;

        let pid = child.id();
        tracing::debug!(target_id = %target, pid = ?pid, "Server spawned");

        let stdout = child.stdout.take().ok_or_else(|| ProcessError::MissingPipe {
            target: target.clone(),
            stream: "stdout",
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ProcessError::MissingPipe {
            target: target.clone(),
            stream: "stderr",
        })?;

        let strategy = config.readiness_for(target.runtime());
        let phrases = match strategy {
            ReadinessStrategy::Output => config.readiness.phrases.clone(),
            ReadinessStrategy::Poll => Vec::new(),
        };

        let (signal, mut ready_rx) = ReadySignal::new();
        let drains = vec![
            spawn_drain(stdout, StreamKind::Stdout, target.clone(), phrases.clone(), signal.clone()),
            spawn_drain(stderr, StreamKind::Stderr, target.clone(), phrases, signal.clone()),
        ];

        let poller = match strategy {
            ReadinessStrategy::Poll => {
                let policy = RetryPolicy::new(
                    config.readiness.poll_attempts,
                    POLL_ATTEMPT_TIMEOUT,
                    config.readiness.poll_interval,
                );
                Some(tokio::spawn(poll_health(
                    client.with_policy(policy),
                    config.url("/"),
                    signal.clone(),
                )))
            }
            ReadinessStrategy::Output => None,
        };

        let started = Instant::now();
        let ready_source = tokio::select! {
            source = &mut ready_rx => source.unwrap_or(ReadySource::Timeout),
            _ = tokio::time::sleep(config.readiness.timeout) => ReadySource::Timeout,
            status = child.wait() => ReadySource::Exited(status.ok().and_then(|s| s.code())),
        };
        drop(signal);

        if let Some(poller) = poller {
            poller.abort();
        }

        match ready_source {
            ReadySource::Timeout => tracing::warn!(
                target_id = %target,
                timeout_ms = config.readiness.timeout.as_millis() as u64,
                "Timeout waiting for server ready signal, proceeding anyway"
            ),
            ReadySource::Exited(code) => tracing::warn!(
                target_id = %target,
                code = ?code,
                "Server exited before signalling readiness"
            ),
            source => tracing::info!(
                target_id = %target,
                pid = ?pid,
                source = %source,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Server is ready to accept connections"
            ),
        }

        let mut state = ProcessStateMachine::new(target.clone());
        match ready_source {
            ReadySource::Exited(_) => state.transition_to(ProcessState::Stopped)?,
            _ => state.transition_to(ProcessState::Ready)?,
        }

        Ok(Self {
            target: target.clone(),
            child,
            pid,
            state,
            host: config.host.clone(),
            port: config.port,
            drains,
            ready_source,
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state.state()
    }

    pub fn ready_source(&self) -> ReadySource {
        self.ready_source
    }

    /// Stop the server and free its port.
    ///
    /// Idempotent, and a no-op for a server that already exited during
    /// startup. Kill and port-release failures are logged, never returned:
    /// the next `start` clears any lingering listener on its own.
    pub async fn stop(&mut self) {
        if self.state.is_stopped() {
            return;
        }
        if let Err(e) = self.state.transition_to(ProcessState::Stopped) {
            tracing::debug!(target_id = %self.target, error = %e, "Ignoring state error on stop");
        }

        tracing::info!(
            target_id = %self.target,
            pid = ?self.pid,
            uptime_ms = self.state.uptime().as_millis() as u64,
            "Killing server"
        );
        terminate(&mut self.child, self.pid, &self.target).await;

        tokio::time::sleep(PORT_RELEASE_WAIT).await;
        if port_in_use(&self.host, self.port).await {
            tokio::time::sleep(PORT_RECHECK_WAIT).await;
            if port_in_use(&self.host, self.port).await {
                release_port(&self.host, self.port).await;
            }
        }

        for drain in self.drains.drain(..) {
            let abort = drain.abort_handle();
            if tokio::time::timeout(DRAIN_JOIN_TIMEOUT, drain).await.is_err() {
                tracing::debug!(target_id = %self.target, "Output drain still open, aborting");
                abort.abort();
            }
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        // kill_on_drop takes care of the child itself.
        for drain in &self.drains {
            drain.abort();
        }
    }
}

fn spawn_drain<R>(
    stream: R,
    kind: StreamKind,
    target: Target,
    phrases: Vec<String>,
    signal: ReadySignal,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(256);

        loop {
            buf.clear();
            match read_line_capped(&mut reader, &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();

                    match kind {
                        StreamKind::Stdout => tracing::debug!(target_id = %target, "{}", line),
                        StreamKind::Stderr => tracing::warn!(target_id = %target, "{}", line),
                    }

                    if phrases.iter().any(|p| line.contains(p.as_str()))
                        && signal.fire(ReadySource::Pattern)
                    {
                        tracing::debug!(target_id = %target, stream = kind.name(), "Server ready signal detected");
                    }
                }
                Err(e) => {
                    tracing::debug!(target_id = %target, stream = kind.name(), error = %e, "Output stream error");
                    break;
                }
            }
        }

        tracing::debug!(target_id = %target, stream = kind.name(), "Output stream closed");
    })
}

/// Read up to the next newline, or `MAX_LINE_BYTES` if the line runs on.
async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    reader.take(MAX_LINE_BYTES).read_until(b'\n', buf).await
}

async fn poll_health(client: RetryClient, url: String, signal: ReadySignal) {
    match client.get(&url).await {
        Ok(response) => {
            tracing::debug!(url = %url, status = response.status, "Health endpoint answered");
            signal.fire(ReadySource::Poll);
        }
        Err(e) => tracing::warn!(url = %url, error = %e, "Health endpoint never answered"),
    }
}

async fn terminate(child: &mut Child, pid: Option<u32>, target: &Target) {
    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
            tracing::debug!(target_id = %target, pid, error = %e, "SIGTERM failed");
        }

        match tokio::time::timeout(TERM_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(target_id = %target, status = %status, "Server exited");
                return;
            }
            Ok(Err(e)) => tracing::debug!(target_id = %target, error = %e, "Wait failed"),
            Err(_) => tracing::warn!(target_id = %target, pid, "Server ignored SIGTERM, killing"),
        }
    }

    if let Err(e) = child.kill().await {
        tracing::debug!(target_id = %target, error = %e, "Kill failed");
    }
}

/// Whether something accepts connections on `host:port`.
pub async fn port_in_use(host: &str, port: Port) -> bool {
    matches!(
        tokio::time::timeout(PORT_PROBE_TIMEOUT, TcpStream::connect((host, port.value()))).await,
        Ok(Ok(_))
    )
}

/// Force-release a bound port by killing its listeners.
///
/// Returns how many processes were signalled. Never fails: a missing `lsof`
/// or a vanished process is only logged.
pub async fn release_port(host: &str, port: Port) -> usize {
    if !port_in_use(host, port).await {
        return 0;
    }

    tracing::warn!(port = port.value(), "Port still bound, releasing stale listener");

    let output = match Command::new("lsof")
        .arg("-t")
        .arg(format!("-iTCP:{}", port))
        .arg("-sTCP:LISTEN")
        .stdin(Stdio::null())
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(port = port.value(), error = %e, "Cannot run lsof to release port");
            return 0;
        }
    };

    let own_pid = std::process::id();
    let mut killed = 0;
    for pid in parse_pids(&String::from_utf8_lossy(&output.stdout)) {
        if pid == own_pid {
            continue;
        }
        let Ok(raw) = i32::try_from(pid) else {
            continue;
        };
        match signal::kill(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) => {
                tracing::info!(port = port.value(), pid, "Killed stale listener");
                killed += 1;
            }
            Err(e) => tracing::debug!(pid, error = %e, "Failed to kill stale listener"),
        }
    }
    killed
}

fn parse_pids(output: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_signal_first_writer_wins() {
        let (signal, rx) = ReadySignal::new();
        let other = signal.clone();

        assert!(signal.fire(ReadySource::Poll));
        assert!(!other.fire(ReadySource::Pattern));
        assert!(!signal.fire(ReadySource::Timeout));

        assert_eq!(rx.await.unwrap(), ReadySource::Poll);
    }

    #[tokio::test]
    async fn test_runaway_line_is_chunked() {
        let mut data = vec![b'x'; MAX_LINE_BYTES as usize * 2 + 10];
        data.extend_from_slice(b"\nlistening\n");
        let mut reader = BufReader::new(data.as_slice());
        let mut buf = Vec::new();

        let mut lens = Vec::new();
        loop {
            buf.clear();
            let n = read_line_capped(&mut reader, &mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            lens.push(n);
        }
        let cap = MAX_LINE_BYTES as usize;
        assert_eq!(lens, vec![cap, cap, 11, 10]);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_parse_pids() {
        assert_eq!(parse_pids("123\n456\n123\n\nabc\n"), vec![123, 456]);
        assert!(parse_pids("").is_empty());
    }

    #[test]
    fn test_ready_source_display() {
        assert_eq!(ReadySource::Pattern.to_string(), "output pattern");
        assert_eq!(ReadySource::Exited(Some(1)).to_string(), "exited with code 1");
    }

    #[tokio::test]
    async fn test_free_port_needs_no_release() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = Port::new(listener.local_addr().unwrap().port()).unwrap();
        drop(listener);

        assert!(!port_in_use("127.0.0.1", port).await);
        assert_eq!(release_port("127.0.0.1", port).await, 0);
    }
}
