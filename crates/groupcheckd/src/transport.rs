use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, info};

use cred_resolver::{ResolvedCredentials, SystemAccess, SystemError};

use crate::authority::{Authority, BusMessage, ERR_INVALID_ARGS};

// ---------------------------------------------------------------------------
// Peer directory
// ---------------------------------------------------------------------------

/// Registry of currently connected transport peers.
///
/// Each connection is assigned a unique peer name (`:1.<n>`) and its pid,
/// taken from the socket's `SO_PEERCRED`, is remembered for the lifetime of
/// the connection. This is what lets `system-bus-name` subjects resolve to
/// full process credentials.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    next: AtomicU64,
    peers: RwLock<HashMap<String, u32>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next peer name to a connection with the given pid.
    pub fn register(&self, pid: u32) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let name = format!(":1.{n}");
        self.peers
            .write()
            .expect("peer directory lock poisoned")
            .insert(name.clone(), pid);
        name
    }

    pub fn unregister(&self, name: &str) {
        self.peers
            .write()
            .expect("peer directory lock poisoned")
            .remove(name);
    }

    pub fn pid_of(&self, name: &str) -> Option<u32> {
        self.peers
            .read()
            .expect("peer directory lock poisoned")
            .get(name)
            .copied()
    }
}

// ---------------------------------------------------------------------------
// Peer-aware system access
// ---------------------------------------------------------------------------

/// [`SystemAccess`] that answers bus-peer credential queries from the peer
/// directory, augmenting the pid to full credentials through the inner
/// system (the way sd-bus augments peer credentials from /proc).
pub struct BusSystem<S> {
    system: S,
    peers: Arc<PeerDirectory>,
}

impl<S: SystemAccess> BusSystem<S> {
    pub fn new(system: S, peers: Arc<PeerDirectory>) -> Self {
        Self { system, peers }
    }
}

impl<S: SystemAccess> SystemAccess for BusSystem<S> {
    fn process_credentials(&self, pid: u32) -> Result<ResolvedCredentials, SystemError> {
        self.system.process_credentials(pid)
    }

    fn process_start_time(&self, pid: u32) -> Result<u64, SystemError> {
        self.system.process_start_time(pid)
    }

    fn peer_credentials(&self, name: &str) -> Result<ResolvedCredentials, SystemError> {
        let pid = self
            .peers
            .pid_of(name)
            .ok_or_else(|| SystemError::UnknownPeer(name.to_string()))?;
        self.system.process_credentials(pid)
    }

    fn group_id(&self, name: &str) -> Option<u32> {
        self.system.group_id(name)
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Unix-socket transport adapter: newline-delimited JSON [`BusMessage`]
/// frames, one reply per call, requests handled in arrival order per
/// connection.
pub struct BusListener {
    socket_path: PathBuf,
    authority: Arc<Authority>,
    peers: Arc<PeerDirectory>,
}

impl BusListener {
    pub fn new(socket_path: PathBuf, authority: Arc<Authority>, peers: Arc<PeerDirectory>) -> Self {
        Self {
            socket_path,
            authority,
            peers,
        }
    }

    /// Accept connections until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        // Remove a stale socket left behind by a previous run.
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to remove stale socket {}", self.socket_path.display())
                })
            }
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("failed to bind {}", self.socket_path.display()))?;

        info!(socket = %self.socket_path.display(), "authority listening");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("shutdown signal received; closing listener");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, _addr) = accepted.context("accept failed")?;
                    let authority = Arc::clone(&self.authority);
                    let peers = Arc::clone(&self.peers);

                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, authority, peers).await {
                            debug!(%err, "connection handler error");
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    authority: Arc<Authority>,
    peers: Arc<PeerDirectory>,
) -> Result<()> {
    let cred = stream.peer_cred().context("failed to read peer credentials")?;
    let pid = cred.pid().filter(|p| *p > 0).unwrap_or(0) as u32;

    let name = peers.register(pid);
    info!(peer = %name, pid, "peer connected");

    let result = serve_peer(stream, &authority, &name).await;

    peers.unregister(&name);
    info!(peer = %name, "peer disconnected");

    result
}

async fn serve_peer(stream: UnixStream, authority: &Authority, peer: &str) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<BusMessage>(&line) {
            Ok(msg) => authority.handle_call(peer, msg).await,
            Err(err) => BusMessage::Error {
                id: String::new(),
                name: ERR_INVALID_ARGS.to_string(),
                message: format!("malformed message: {err}"),
            },
        };

        let mut out = serde_json::to_vec(&reply).context("failed to encode reply")?;
        out.push(b'\n');
        write_half.write_all(&out).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_directory_assigns_unique_names() {
        let dir = PeerDirectory::new();
        let a = dir.register(100);
        let b = dir.register(200);
        assert_ne!(a, b);
        assert_eq!(dir.pid_of(&a), Some(100));
        assert_eq!(dir.pid_of(&b), Some(200));

        dir.unregister(&a);
        assert_eq!(dir.pid_of(&a), None);
        assert_eq!(dir.pid_of(&b), Some(200));
    }

    #[test]
    fn bus_system_resolves_peers_through_the_directory() {
        struct Inner;
        impl SystemAccess for Inner {
            fn process_credentials(&self, pid: u32) -> Result<ResolvedCredentials, SystemError> {
                if pid == 4711 {
                    Ok(ResolvedCredentials {
                        uid: 1000,
                        euid: 1000,
                        primary_gid: 100,
                        supplementary_gids: vec![998],
                    })
                } else {
                    Err(SystemError::UnknownProcess(pid))
                }
            }
            fn process_start_time(&self, pid: u32) -> Result<u64, SystemError> {
                Err(SystemError::UnknownProcess(pid))
            }
            fn peer_credentials(&self, name: &str) -> Result<ResolvedCredentials, SystemError> {
                Err(SystemError::UnknownPeer(name.to_string()))
            }
            fn group_id(&self, _name: &str) -> Option<u32> {
                None
            }
        }

        let peers = Arc::new(PeerDirectory::new());
        let name = peers.register(4711);
        let system = BusSystem::new(Inner, Arc::clone(&peers));

        let creds = system.peer_credentials(&name).unwrap();
        assert_eq!(creds.uid, 1000);

        assert!(matches!(
            system.peer_credentials(":1.9999"),
            Err(SystemError::UnknownPeer(_))
        ));

        // A disconnected peer no longer resolves.
        peers.unregister(&name);
        assert!(matches!(
            system.peer_credentials(&name),
            Err(SystemError::UnknownPeer(_))
        ));
    }
}
