//! Tunnel process supervision.
//!
//! # States
//! - Idle: no process, no hostname
//! - Starting: binary resolution and hostname acquisition in flight
//! - Active: process running, public hostname known
//!
//! # State Transitions
//! ```text
//! Idle → Starting: start() (any other state → AlreadyRunning)
//! Starting → Active: hostname seen before timeout/exit/stop
//! Starting → Idle: resolve error, spawn error, exit, timeout, stop()
//! Active → Idle: stop(), or the process exits on its own
//! ```
//!
//! # Acquisition Race
//! Each `start()` builds its own `AcquisitionContext`. Output readers share a
//! single-use slot holding the hostname sender: the first reader to see a
//! hostname takes it, later matches find it empty. The caller races that
//! receiver against process exit, the acquisition timer and `stop()` in one
//! `select!`, so exactly one outcome settles the call and late events land on
//! dropped channels.
//!
//! A process that prints its hostname and then exits always settles the call
//! with that hostname, whichever of the two events the `select!` saw first.
//! The session then ends immediately and the supervisor is back to Idle.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::TunnelConfig;
use crate::observability::metrics;
use crate::provision::Provisioner;
use crate::tunnel::error::TunnelError;
use crate::tunnel::output::{HostnameMatcher, LineScanner, OutputTail};

/// How long to let output readers drain after the process exits.
const READER_DRAIN: Duration = Duration::from_millis(250);

/// Options for a single `start()` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Ignore system-wide installs; use (or download) the managed copy only.
    pub prefer_managed_only: bool,
}

/// Snapshot of an active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub public_url: String,
    pub started_at: SystemTime,
    pub pid: Option<u32>,
}

struct ActiveSession {
    generation: u64,
    info: SessionInfo,
    stop: oneshot::Sender<()>,
}

enum SessionState {
    Idle,
    Starting {
        generation: u64,
        cancel: oneshot::Sender<()>,
    },
    Active(ActiveSession),
}

type HostnameSlot = Arc<Mutex<Option<oneshot::Sender<String>>>>;

/// Per-call acquisition state. Never stored on the supervisor.
struct AcquisitionContext {
    output: Arc<Mutex<OutputTail>>,
    hostname: oneshot::Receiver<String>,
    readers: Vec<JoinHandle<()>>,
}

impl AcquisitionContext {
    fn attach(child: &mut Child, config: &TunnelConfig, matcher: Arc<HostnameMatcher>) -> Self {
        let output = Arc::new(Mutex::new(OutputTail::new(config.diagnostic_buffer_chars)));
        let (tx, hostname) = oneshot::channel();
        let slot: HostnameSlot = Arc::new(Mutex::new(Some(tx)));

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(scan_output(
                stdout,
                "stdout",
                output.clone(),
                matcher.clone(),
                slot.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(scan_output(
                stderr,
                "stderr",
                output.clone(),
                matcher,
                slot,
            )));
        }

        Self {
            output,
            hostname,
            readers,
        }
    }

    fn diagnostics(&self) -> String {
        lock(&self.output).as_str().to_string()
    }

    /// Give readers a moment to collect what the process wrote before exiting.
    async fn drain(&mut self) {
        let readers = std::mem::take(&mut self.readers);
        let _ = tokio::time::timeout(READER_DRAIN, async {
            for reader in readers {
                let _ = reader.await;
            }
        })
        .await;
    }
}

enum Outcome {
    Resolved(String),
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Owns at most one tunnel subprocess and its public hostname.
pub struct TunnelSupervisor {
    config: TunnelConfig,
    provisioner: Arc<Provisioner>,
    local_port: u16,
    matcher: Arc<HostnameMatcher>,
    state: Arc<Mutex<SessionState>>,
    generations: AtomicU64,
}

impl TunnelSupervisor {
    /// Create a supervisor that tunnels to `http://<local_host>:<local_port>`.
    pub fn new(
        config: TunnelConfig,
        provisioner: Arc<Provisioner>,
        local_port: u16,
    ) -> Result<Self, regex::Error> {
        let matcher = Arc::new(HostnameMatcher::new(&config.hostname_suffix)?);
        Ok(Self {
            config,
            provisioner,
            local_port,
            matcher,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            generations: AtomicU64::new(1),
        })
    }

    /// Resolve a binary, spawn a quick tunnel and wait for its public URL.
    pub async fn start(&self, options: StartOptions) -> Result<String, TunnelError> {
        let (generation, mut cancel) = self.begin()?;
        // Also covers the caller dropping this future mid-acquisition.
        let _reset = StartingReset {
            state: &self.state,
            generation,
        };

        match self.acquire(generation, options, &mut cancel).await {
            Ok(url) => {
                metrics::record_tunnel_start("active");
                Ok(url)
            }
            Err(e) => {
                metrics::record_tunnel_start(outcome_label(&e));
                tracing::warn!(error = %e, "Tunnel start failed");
                Err(e)
            }
        }
    }

    /// Terminate the session (or abandon a pending start). Does not wait for exit.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *lock(&self.state), SessionState::Idle);
        match previous {
            SessionState::Idle => {}
            SessionState::Starting { cancel, .. } => {
                tracing::info!("Cancelling pending tunnel start");
                let _ = cancel.send(());
            }
            SessionState::Active(session) => {
                tracing::info!(url = %session.info.public_url, "Stopping tunnel");
                let _ = session.stop.send(());
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(*lock(&self.state), SessionState::Active(_))
    }

    /// Public URL while active, `None` otherwise.
    pub fn public_url(&self) -> Option<String> {
        self.session().map(|info| info.public_url)
    }

    pub fn session(&self) -> Option<SessionInfo> {
        match &*lock(&self.state) {
            SessionState::Active(session) => Some(session.info.clone()),
            _ => None,
        }
    }

    fn begin(&self) -> Result<(u64, oneshot::Receiver<()>), TunnelError> {
        let mut state = lock(&self.state);
        if !matches!(*state, SessionState::Idle) {
            return Err(TunnelError::AlreadyRunning);
        }
        let generation = self.generations.fetch_add(1, Ordering::SeqCst);
        let (cancel, cancelled) = oneshot::channel();
        *state = SessionState::Starting { generation, cancel };
        Ok((generation, cancelled))
    }

    async fn acquire(
        &self,
        generation: u64,
        options: StartOptions,
        cancel: &mut oneshot::Receiver<()>,
    ) -> Result<String, TunnelError> {
        let binary = tokio::select! {
            resolved = self.provisioner.resolve(options.prefer_managed_only) => resolved?,
            _ = &mut *cancel => return Err(TunnelError::Cancelled),
        };

        let target = format!("http://{}:{}", self.config.local_host, self.local_port);
        let mut child = spawn_tunnel(&binary.path, &target)?;
        tracing::info!(
            binary = %binary.path.display(),
            origin = ?binary.origin,
            target = %target,
            pid = ?child.id(),
            "Tunnel process spawned"
        );

        let mut ctx = AcquisitionContext::attach(&mut child, &self.config, self.matcher.clone());
        let window = self.config.acquisition_timeout();
        let timer = tokio::time::sleep(window);
        tokio::pin!(timer);

        let outcome = tokio::select! {
            biased;
            _ = &mut *cancel => Outcome::Cancelled,
            Ok(url) = &mut ctx.hostname => Outcome::Resolved(url),
            status = child.wait() => Outcome::Exited(status),
            _ = &mut timer => Outcome::TimedOut,
        };

        match outcome {
            Outcome::Resolved(url) => self.activate(generation, child, url),
            Outcome::Exited(status) => {
                ctx.drain().await;
                let code = status.ok().and_then(|s| s.code());
                if let Ok(url) = ctx.hostname.try_recv() {
                    tracing::warn!(url = %url, code = ?code, "Tunnel process exited right after publishing its URL");
                    return Ok(url);
                }
                Err(TunnelError::ProcessExitedPrematurely {
                    code,
                    output: ctx.diagnostics(),
                })
            }
            Outcome::TimedOut => {
                terminate(&mut child).await;
                Err(TunnelError::AcquisitionTimeout {
                    timeout: window,
                    output: ctx.diagnostics(),
                })
            }
            Outcome::Cancelled => {
                terminate(&mut child).await;
                Err(TunnelError::Cancelled)
            }
        }
    }

    fn activate(&self, generation: u64, child: Child, url: String) -> Result<String, TunnelError> {
        let (stop_tx, stop_rx) = oneshot::channel();
        {
            let mut state = lock(&self.state);
            if !matches!(&*state, SessionState::Starting { generation: g, .. } if *g == generation) {
                // stop() won the race after the hostname arrived; child is dropped and killed.
                return Err(TunnelError::Cancelled);
            }
            *state = SessionState::Active(ActiveSession {
                generation,
                info: SessionInfo {
                    public_url: url.clone(),
                    started_at: SystemTime::now(),
                    pid: child.id(),
                },
                stop: stop_tx,
            });
        }

        tokio::spawn(own_process(child, stop_rx, self.state.clone(), generation));
        tracing::info!(url = %url, "Tunnel active");
        Ok(url)
    }
}

/// Returns a still-`Starting` session to `Idle` when its `start()` call ends.
struct StartingReset<'a> {
    state: &'a Mutex<SessionState>,
    generation: u64,
}

impl Drop for StartingReset<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if matches!(&*state, SessionState::Starting { generation, .. } if *generation == self.generation) {
            *state = SessionState::Idle;
        }
    }
}

impl Drop for TunnelSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_tunnel(binary: &Path, target: &str) -> Result<Child, TunnelError> {
    Command::new(binary)
        .args(["tunnel", "--url", target])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(binary, e))
}

fn spawn_error(binary: &Path, e: std::io::Error) -> TunnelError {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            TunnelError::BinaryNotExecutable {
                path: binary.to_path_buf(),
                source: e,
            }
        }
        _ => TunnelError::ProcessSpawn(e),
    }
}

async fn scan_output<R>(
    mut reader: R,
    stream: &'static str,
    output: Arc<Mutex<OutputTail>>,
    matcher: Arc<HostnameMatcher>,
    slot: HostnameSlot,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut scanner = LineScanner::new();
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(stream, error = %e, "Tunnel output closed");
                break;
            }
        };
        let chunk = String::from_utf8_lossy(&buf[..n]);
        tracing::trace!(stream, chunk = %chunk.trim_end(), "Tunnel output");

        lock(&output).push(&chunk);
        if lock(&slot).is_none() {
            continue;
        }

        if let Some(url) = scanner.scan(&chunk, &matcher) {
            if let Some(tx) = lock(&slot).take() {
                let _ = tx.send(url);
            }
        }
    }
}

/// Holds the child for the lifetime of an active session.
async fn own_process(
    mut child: Child,
    stop: oneshot::Receiver<()>,
    state: Arc<Mutex<SessionState>>,
    generation: u64,
) {
    tokio::select! {
        status = child.wait() => {
            tracing::warn!(status = ?status, "Tunnel process exited");
            let mut state = lock(&state);
            if matches!(&*state, SessionState::Active(s) if s.generation == generation) {
                *state = SessionState::Idle;
            }
        }
        _ = stop => {
            terminate(&mut child).await;
            tracing::info!("Tunnel process terminated");
        }
    }
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "Failed to kill tunnel process");
    }
}

fn outcome_label(e: &TunnelError) -> &'static str {
    match e {
        TunnelError::AlreadyRunning => "already_running",
        TunnelError::Provision(_) => "provision_failed",
        TunnelError::BinaryNotExecutable { .. } | TunnelError::ProcessSpawn(_) => "spawn_failed",
        TunnelError::ProcessExitedPrematurely { .. } => "exited",
        TunnelError::AcquisitionTimeout { .. } => "timeout",
        TunnelError::Cancelled => "cancelled",
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_missing_binary_is_not_executable() {
        let err = spawn_error(Path::new("/gone/cloudflared"), Error::from(ErrorKind::NotFound));
        assert!(matches!(err, TunnelError::BinaryNotExecutable { .. }));

        let err = spawn_error(Path::new("/gone/cloudflared"), Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(err, TunnelError::BinaryNotExecutable { .. }));
    }

    #[test]
    fn test_other_spawn_failures() {
        let err = spawn_error(Path::new("/bin/cloudflared"), Error::from(ErrorKind::OutOfMemory));
        assert!(matches!(err, TunnelError::ProcessSpawn(_)));
    }

    #[tokio::test]
    async fn test_spawn_of_missing_path() {
        let err = spawn_tunnel(Path::new("/definitely/not/here/cloudflared"), "http://localhost:1").unwrap_err();
        assert!(matches!(err, TunnelError::BinaryNotExecutable { .. }));
    }

    #[test]
    fn test_only_diagnostic_errors_carry_output() {
        let err = TunnelError::AcquisitionTimeout {
            timeout: Duration::from_secs(30),
            output: "starting".into(),
        };
        assert_eq!(err.diagnostic_output(), Some("starting"));
        assert_eq!(TunnelError::Cancelled.diagnostic_output(), None);
    }
}
