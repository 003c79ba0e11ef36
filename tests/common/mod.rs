//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use local_share::config::{ProvisionerConfig, TunnelConfig};

/// A canned HTTP response served by [`ReleaseServer`].
#[derive(Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            headers: vec![("Location".to_string(), location.to_string())],
            body: Vec::new(),
        }
    }
}

/// Raw-TCP stand-in for the release host. Unknown paths get a 404.
pub struct ReleaseServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl ReleaseServer {
    pub async fn start(routes: HashMap<String, Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let routes = Arc::new(routes);

        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut socket, _)) => {
                        let routes = routes.clone();
                        let counter = counter.clone();
                        tokio::spawn(async move {
                            let Some(path) = read_request_path(&mut socket).await else {
                                return;
                            };
                            counter.fetch_add(1, Ordering::SeqCst);

                            let reply = routes.get(&path).cloned().unwrap_or(Reply {
                                status: 404,
                                headers: Vec::new(),
                                body: b"Not Found".to_vec(),
                            });
                            let _ = socket.write_all(&render(&reply)).await;
                            let _ = socket.shutdown().await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Self { addr, hits }
    }

    /// Base URL to use as `provisioner.release_base_url`.
    pub fn base_url(&self) -> String {
        format!("http://{}/download", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

fn render(reply: &Reply) -> Vec<u8> {
    let status_text = match reply.status {
        200 => "200 OK",
        302 => "302 Found",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        _ => "200 OK",
    };
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status_text,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(&reply.body);
    bytes
}

/// Shell script that answers the version probe, then runs `body`.
pub fn fake_tunnel_script(body: &str) -> String {
    format!(
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then\n  echo \"cloudflared version 2024.1.0 (fake)\"\n  exit 0\nfi\n{}\n",
        body
    )
}

/// Write an executable fake tunnel binary at `path`.
#[cfg(unix)]
pub fn write_fake_tunnel(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, fake_tunnel_script(body)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn provisioner_config(data_dir: &Path, base_url: &str) -> ProvisionerConfig {
    ProvisionerConfig {
        data_dir: data_dir.to_path_buf(),
        release_base_url: base_url.to_string(),
        ..ProvisionerConfig::default()
    }
}

pub fn tunnel_config(acquisition_timeout_secs: u64) -> TunnelConfig {
    TunnelConfig {
        acquisition_timeout_secs,
        hostname_suffix: "example.tunneldomain.test".to_string(),
        ..TunnelConfig::default()
    }
}

/// Managed binary location for a data dir, mirroring the provisioner layout.
pub fn managed_path(data_dir: &Path) -> PathBuf {
    data_dir.join("bin").join("cloudflared")
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}

/// Whether a process with `pid` still exists.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
