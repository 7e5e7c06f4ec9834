// SPDX-License-Identifier: Apache-2.0

//! SSH tunnel guard.
//!
//! Opens a local forwarded port to a remote database host by driving the
//! native OpenSSH client (`ssh -N -L`), so no SSH protocol crate is needed.
//! Password authentication is delegated to `sshpass` (via the `SSHPASS`
//! environment variable, never argv). The tunnel lives for the duration of
//! one target execution: [`SshTunnel::close`] tears it down explicitly, and
//! `Drop` kills the child as a backstop so cancellation and early returns
//! cannot leak a forward.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{SshAuth, SshTunnelConfig};

/// How long to wait for the forwarded port to accept connections.
const SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while waiting for the forward to come up.
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// A live `local port -> remote (host, port)` forward over one ssh child.
#[derive(Debug)]
pub struct SshTunnel {
    child: Child,
    local_port: u16,
}

impl SshTunnel {
    /// Opens a tunnel to `remote_host:remote_port` through the SSH host in
    /// `config`. Blocks until the local port accepts connections or the
    /// setup timeout elapses.
    pub async fn open(
        config: &SshTunnelConfig,
        remote_host: &str,
        remote_port: u16,
    ) -> EngineResult<Self> {
        let auth = config.auth().ok_or_else(|| {
            EngineError::ssh_error(format!(
                "tunnel config for {}@{} has neither a private key nor a password",
                config.username, config.host
            ))
        })?;

        let local_port = pick_free_port()?;
        let args = build_ssh_args(config, local_port, remote_host, remote_port);

        let mut command = match auth {
            SshAuth::Password { password } => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").env("SSHPASS", password.expose()).arg("ssh");
                cmd
            }
            SshAuth::Key { .. } => Command::new("ssh"),
        };

        let mut child = command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::ssh_error(format!("failed to spawn ssh: {e}")))?;

        tracing::debug!(
            ssh_host = %config.host,
            ssh_port = config.port,
            local_port,
            "ssh tunnel starting"
        );

        let deadline = Instant::now() + SETUP_TIMEOUT;
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| EngineError::ssh_error(e.to_string()))?
            {
                let detail = read_stderr(&mut child).await;
                return Err(EngineError::ssh_error(format!(
                    "ssh exited during setup ({status}): {detail}"
                )));
            }

            if TcpStream::connect(("127.0.0.1", local_port)).await.is_ok() {
                tracing::debug!(local_port, "ssh tunnel ready");
                return Ok(Self { child, local_port });
            }

            if Instant::now() >= deadline {
                let _ = child.start_kill();
                return Err(EngineError::ssh_error(format!(
                    "forwarded port not ready after {}s",
                    SETUP_TIMEOUT.as_secs()
                )));
            }

            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    /// The locally bound port of the forward. Connect the database driver
    /// to `127.0.0.1:<local_port>` instead of the target's own host/port.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Tears the tunnel down. Idempotent with the `Drop` backstop.
    pub async fn close(&mut self) -> EngineResult<()> {
        self.child
            .start_kill()
            .map_err(|e| EngineError::ssh_error(format!("failed to kill ssh: {e}")))?;
        let _ = self.child.wait().await;
        tracing::debug!(local_port = self.local_port, "ssh tunnel closed");
        Ok(())
    }
}

/// Finds a free local port by binding port 0 and releasing it. The port is
/// handed to ssh immediately after; the window for another process to steal
/// it is accepted.
fn pick_free_port() -> EngineResult<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| EngineError::ssh_error(format!("no free local port: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| EngineError::ssh_error(e.to_string()))?
        .port();
    Ok(port)
}

fn build_ssh_args(
    config: &SshTunnelConfig,
    local_port: u16,
    remote_host: &str,
    remote_port: u16,
) -> Vec<String> {
    let mut args = vec![
        "-N".to_string(),
        "-L".to_string(),
        format!("{local_port}:{remote_host}:{remote_port}"),
        "-p".to_string(),
        config.port.to_string(),
        "-o".to_string(),
        "ExitOnForwardFailure=yes".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=accept-new".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", SETUP_TIMEOUT.as_secs()),
    ];

    match config.auth() {
        Some(SshAuth::Key { private_key_path }) => {
            // BatchMode rules out interactive prompts hanging the worker.
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
            args.push("-i".to_string());
            args.push(private_key_path.to_string());
        }
        // sshpass feeds the password; BatchMode would disable the prompt.
        // Auth-less configs never get this far: `open` rejects them.
        Some(SshAuth::Password { .. }) | None => {}
    }

    args.push(format!("{}@{}", config.username, config.host));
    args
}

async fn read_stderr(child: &mut Child) -> String {
    let mut detail = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut detail).await;
    }
    let detail = detail.trim();
    if detail.is_empty() {
        "no diagnostic output".to_string()
    } else {
        detail.to_string()
    }
}
