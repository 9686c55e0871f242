// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `agentd` and `mediator` binaries as subprocesses, stands
//! up a fake Assuan key agent over a loopback socket, and drives the
//! rendezvous socket directly with raw client connections.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UnixStream};

/// Resolve the path to a compiled workspace binary.
pub fn workspace_binary(name: &str) -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests → workspace root
    let workspace = manifest.parent().unwrap_or(manifest);
    workspace.join("target").join("debug").join(name)
}

/// Spawn a fake key agent on a loopback socket and write its rendezvous
/// file (port + 16-byte cookie) to `path`. Returns once the listener is
/// bound; the accept loop runs forever in the background.
pub async fn spawn_fake_agent(path: &Path, cookie: [u8; 16]) -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let mut rendezvous = port.to_string().into_bytes();
    rendezvous.push(b'\n');
    rendezvous.extend_from_slice(&cookie);
    tokio::fs::write(path, rendezvous).await?;

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            tokio::spawn(serve_fake_agent(stream, cookie));
        }
    });

    Ok(())
}

/// Spawn a fake agent that accepts the loopback connection, reads the
/// 16-byte cookie, then closes without ever writing a greeting line —
/// the authentication-failure scenario.
pub async fn spawn_aborting_agent(path: &Path) -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let mut rendezvous = port.to_string().into_bytes();
    rendezvous.push(b'\n');
    rendezvous.extend_from_slice(&[0u8; 16]);
    tokio::fs::write(path, rendezvous).await?;

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let mut cookie = [0u8; 16];
                let _ = stream.read_exact(&mut cookie).await;
                drop(stream);
            });
        }
    });

    Ok(())
}

/// Canned Assuan dialogue covering every scenario the proxy must handle:
/// a plain command, a data-pull inquiry, a response delivered in two
/// writes, a data line that merely contains the text "OK", and BYE.
async fn serve_fake_agent(mut stream: tokio::net::TcpStream, cookie: [u8; 16]) {
    let mut got = [0u8; 16];
    if stream.read_exact(&mut got).await.is_err() || got != cookie {
        return;
    }
    if stream.write_all(b"OK Pleased to meet you\n").await.is_err() {
        return;
    }

    let mut buf = bytes::BytesMut::new();
    let mut chunk = [0u8; 512];
    loop {
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line = buf.split_to(pos + 1);
            let line = line.as_ref();
            let reply: Result<(), ()> = async {
                match line {
                    b"BYE\n" => {
                        stream.write_all(b"OK\n").await.map_err(|_| ())?;
                        return Err(());
                    }
                    b"GETINFO version\n" => {
                        stream.write_all(b"D 2.4.8\nOK\n").await.map_err(|_| ())?;
                    }
                    b"PKSIGN\n" => {
                        stream.write_all(b"INQUIRE HASHVAL\n").await.map_err(|_| ())?;
                        // wait for the client's data-pull reply, terminated by END
                        loop {
                            if let Some(end) = buf.windows(4).position(|w| w == b"END\n") {
                                buf.split_to(end + 4);
                                break;
                            }
                            match stream.read(&mut chunk).await {
                                Ok(0) | Err(_) => return Err(()),
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }
                        let sig: Vec<u8> = (0u16..=0xFF).map(|b| b as u8).collect();
                        stream.write_all(b"D ").await.map_err(|_| ())?;
                        stream.write_all(&sig).await.map_err(|_| ())?;
                        stream.write_all(b"\nOK\n").await.map_err(|_| ())?;
                    }
                    b"SPLIT\n" => {
                        stream.write_all(b"O").await.map_err(|_| ())?;
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        stream.write_all(b"K\n").await.map_err(|_| ())?;
                    }
                    b"EMBEDDED\n" => {
                        stream.write_all(b"S STATUS: OK so far\nOK\n").await.map_err(|_| ())?;
                    }
                    b"DROP\n" => return Err(()),
                    _ => {
                        stream.write_all(b"ERR 1 unsupported\n").await.map_err(|_| ())?;
                    }
                }
                Ok(())
            }
            .await;
            if reply.is_err() {
                return;
            }
            continue;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// A running pair of `agentd` and `mediator` processes, killed on drop.
pub struct ProxyProcesses {
    agentd: Child,
    mediator: Child,
    pub agentd_socket: PathBuf,
    pub mediator_socket: PathBuf,
    _dir: tempfile::TempDir,
}

impl ProxyProcesses {
    /// Spawn `agentd` pointed at `rendezvous`, then `mediator` pointed at
    /// `agentd`'s socket, waiting for both socket nodes to appear.
    pub async fn start(rendezvous: &Path) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let agentd_socket = dir.path().join("agentd.sock");
        let mediator_socket = dir.path().join("mediator.sock");

        let agentd_bin = workspace_binary("agentd");
        anyhow::ensure!(agentd_bin.exists(), "agentd binary not found at {}", agentd_bin.display());
        let mediator_bin = workspace_binary("mediator");
        anyhow::ensure!(
            mediator_bin.exists(),
            "mediator binary not found at {}",
            mediator_bin.display()
        );

        let agentd = Command::new(&agentd_bin)
            .env("AGENTD_RENDEZVOUS", rendezvous)
            .env("AGENTD_SOCKET", &agentd_socket)
            .env("AGENTD_LOG_LEVEL", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        wait_for_path(&agentd_socket, Duration::from_secs(5)).await?;

        let mediator = Command::new(&mediator_bin)
            .env("MEDIATOR_SOCKET", &mediator_socket)
            .env("MEDIATOR_AGENT_SOCKET", &agentd_socket)
            .env("MEDIATOR_LOG_LEVEL", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        wait_for_path(&mediator_socket, Duration::from_secs(5)).await?;

        Ok(Self { agentd, mediator, agentd_socket, mediator_socket, _dir: dir })
    }

    /// Connect a raw client to the rendezvous socket.
    pub async fn connect_client(&self) -> anyhow::Result<UnixStream> {
        Ok(UnixStream::connect(&self.mediator_socket).await?)
    }
}

impl Drop for ProxyProcesses {
    fn drop(&mut self) {
        let _ = self.mediator.kill();
        let _ = self.mediator.wait();
        let _ = self.agentd.kill();
        let _ = self.agentd.wait();
    }
}

async fn wait_for_path(path: &Path, timeout: Duration) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !path.exists() {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("{} did not appear within {timeout:?}", path.display());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}

/// Read from `stream` until `greeting` has been fully consumed or the
/// timeout elapses.
pub async fn read_exact_str(stream: &mut UnixStream, len: usize) -> anyhow::Result<String> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(String::from_utf8(buf)?)
}
