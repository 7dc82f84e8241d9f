//! # Summary
//!
//! The one piece of this repository that owns a socket. A dedicated
//! OS thread blocks on `UdpSocket::recv_from` and hands raw datagrams
//! across a bounded channel to whichever thread owns this
//! `Transport` — the single-threaded core's poll loop, per this
//! system's concurrency model. Everything past that channel —
//! handshake validation, peer bookkeeping, consensus-frame
//! unwrapping — runs on the caller's thread with no locks.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use paxos::NodeId;
use rand::Rng;

use crate::protocol::{names_collide, Envelope, DISCOVERY_MAGIC, HANDSHAKE_KEY};
use crate::TransportError;

/// How long a peer may go without sending anything before it is
/// presumed gone. Checked by [`Transport::expire_stale_peers`], which
/// the host calls once per poll tick.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// Something the host needs to react to: a consensus frame to feed
/// into `paxos::Driver::receive`, a peer that finished its handshake,
/// a rejected handshake, a peer that went quiet past `PEER_TIMEOUT`,
/// or an unsolicited discovery advertisement.
#[derive(Clone, Debug)]
pub enum Event {
    Consensus(Vec<u8>),
    PeerJoined { node_id: NodeId, name: String, addr: SocketAddr },
    PeerRejected { addr: SocketAddr, reason: String },
    PeerDisconnected { node_id: NodeId },
    Discovered { addr: SocketAddr },
}

pub struct Transport {
    socket: Arc<UdpSocket>,
    inbox: Receiver<(SocketAddr, Vec<u8>)>,
    node_id: NodeId,
    name: String,
    peers: HashMap<NodeId, SocketAddr>,
    peer_names: HashMap<NodeId, String>,
    addr_to_node: HashMap<SocketAddr, NodeId>,
    last_seen: HashMap<NodeId, Instant>,
}

impl Transport {
    pub fn bind(listen: SocketAddr, node_id: NodeId, name: String) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(listen).map_err(TransportError::Bind)?;
        socket.set_broadcast(true).map_err(TransportError::Bind)?;
        let recv_socket = socket.try_clone().map_err(TransportError::Bind)?;
        let socket = Arc::new(socket);

        let (tx, rx) = mpsc::sync_channel(256);
        thread::spawn(move || {
            let mut buf = [0u8; 65_536];
            loop {
                match recv_socket.recv_from(&mut buf) {
                    Ok((n, addr)) => {
                        if tx.send((addr, buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!("receive thread exiting: {}", error);
                        break;
                    }
                }
            }
        });

        Ok(Transport {
            socket,
            inbox: rx,
            node_id,
            name,
            peers: HashMap::new(),
            peer_names: HashMap::new(),
            addr_to_node: HashMap::new(),
            last_seen: HashMap::new(),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr().map_err(TransportError::Bind)
    }

    /// Initiates a handshake with `addr`. Completion (or rejection)
    /// arrives asynchronously as an [`Event`] from a later [`poll`](Self::poll).
    pub fn connect(&self, addr: SocketAddr) -> Result<(), TransportError> {
        self.send_to(addr, &Envelope::Hello {
            key: HANDSHAKE_KEY.to_string(),
            node_id: self.node_id,
            name: self.name.clone(),
        })
    }

    /// Fires an unconnected broadcast advertising this node's
    /// listening port, with a small random jitter before the caller's
    /// next attempt to avoid every freshly started peer flooding the
    /// subnet in lockstep.
    pub fn discover(&self, broadcast_addr: SocketAddr) -> Result<(), TransportError> {
        let port = self.local_addr()?.port();
        let bytes = format!("{}:{}", DISCOVERY_MAGIC, port).into_bytes();
        self.socket.send_to(&bytes, broadcast_addr).map_err(TransportError::Send)?;
        Ok(())
    }

    /// Jittered backoff before retrying an unanswered handshake, in
    /// milliseconds. Timing has no bearing on protocol correctness —
    /// the core never blocks on a peer — so an ordinary `rand` source
    /// is fine here, unlike the deterministic role-assignment shuffle.
    pub fn retry_backoff_millis(&self) -> u64 {
        rand::thread_rng().gen_range(200..800)
    }

    /// Broadcasts an opaque consensus frame to every connected peer.
    /// Fire-and-forget: frames carry everything needed to interpret
    /// them in isolation, so a dropped datagram just costs a retry at
    /// a higher layer (the Paxos driver's own resubmission).
    pub fn broadcast(&self, frame_bytes: &[u8]) -> Result<(), TransportError> {
        let bytes = Envelope::Consensus(frame_bytes.to_vec()).encode()?;
        for addr in self.peers.values() {
            if let Err(error) = self.socket.send_to(&bytes, addr) {
                warn!("failed to send to {}: {}", addr, error);
            }
        }
        Ok(())
    }

    fn send_to(&self, addr: SocketAddr, envelope: &Envelope) -> Result<(), TransportError> {
        let bytes = envelope.encode()?;
        self.socket.send_to(&bytes, addr).map_err(TransportError::Send)?;
        Ok(())
    }

    /// Drains every datagram received since the last call. `accepting`
    /// should reflect whether the game is still in Lobby: new
    /// handshakes are rejected once it isn't, per this system's
    /// handshake rule.
    pub fn poll(&mut self, accepting: bool) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok((addr, bytes)) = self.inbox.try_recv() {
            let raw = String::from_utf8_lossy(&bytes);
            if let Some(rest) = raw.strip_prefix(&format!("{}:", DISCOVERY_MAGIC)) {
                debug!("discovery advertisement from {} on port {}", addr.ip(), rest);
                events.push(Event::Discovered { addr });
                continue;
            }
            let envelope = match Envelope::decode(&bytes) {
                Ok(envelope) => envelope,
                Err(error) => {
                    warn!("dropping malformed datagram from {}: {}", addr, error);
                    continue;
                }
            };
            if let Some(&node_id) = self.addr_to_node.get(&addr) {
                self.last_seen.insert(node_id, Instant::now());
            }
            self.handle(addr, envelope, accepting, &mut events);
        }
        events
    }

    /// Drops any connected peer that has sent nothing for
    /// `PEER_TIMEOUT`, emitting a [`Event::PeerDisconnected`] for each
    /// one removed. The host must feed the shrinkage back into the
    /// consensus layer (`Driver::set_peer_count(transport.peer_count()
    /// + 1)`), or a departed peer permanently inflates the quorum
    /// denominator.
    pub fn expire_stale_peers(&mut self, now: Instant, timeout: Duration) -> Vec<Event> {
        let stale: Vec<NodeId> = self
            .last_seen
            .iter()
            .filter(|(_, &seen)| now.duration_since(seen) > timeout)
            .map(|(&node_id, _)| node_id)
            .collect();
        let mut events = Vec::with_capacity(stale.len());
        for node_id in stale {
            if let Some(addr) = self.peers.remove(&node_id) {
                self.addr_to_node.remove(&addr);
            }
            self.peer_names.remove(&node_id);
            self.last_seen.remove(&node_id);
            info!("peer {} timed out after {:?} of silence", node_id, timeout);
            events.push(Event::PeerDisconnected { node_id });
        }
        events
    }

    fn handle(&mut self, addr: SocketAddr, envelope: Envelope, accepting: bool, events: &mut Vec<Event>) {
        match envelope {
            Envelope::Hello { key, node_id, name } => {
                if let Some(reason) = self.reject_reason(&key, &name, accepting) {
                    let _ = self.send_to(addr, &Envelope::Reject { reason: reason.clone() });
                    events.push(Event::PeerRejected { addr, reason });
                    return;
                }
                self.register_peer(node_id, name.clone(), addr);
                let _ = self.send_to(addr, &Envelope::Welcome { node_id: self.node_id, name: self.name.clone() });
                events.push(Event::PeerJoined { node_id, name, addr });
            }
            Envelope::Welcome { node_id, name } => {
                self.register_peer(node_id, name.clone(), addr);
                events.push(Event::PeerJoined { node_id, name, addr });
            }
            Envelope::Reject { reason } => {
                events.push(Event::PeerRejected { addr, reason });
            }
            Envelope::Consensus(bytes) => {
                events.push(Event::Consensus(bytes));
            }
        }
    }

    fn reject_reason(&self, key: &str, name: &str, accepting: bool) -> Option<String> {
        if key != HANDSHAKE_KEY {
            return Some("handshake key mismatch".to_string());
        }
        if !accepting {
            return Some("game is no longer in Lobby".to_string());
        }
        if names_collide(name, &self.name) {
            return Some("name collides with this node's own name".to_string());
        }
        if self.peer_names.values().any(|existing| names_collide(existing, name)) {
            return Some(format!("name {:?} is already taken", name));
        }
        None
    }

    fn register_peer(&mut self, node_id: NodeId, name: String, addr: SocketAddr) {
        info!("connected to {} ({}) at {}", node_id, name, addr);
        self.peers.insert(node_id, addr);
        self.peer_names.insert(node_id, name);
        self.addr_to_node.insert(addr, node_id);
        self.last_seen.insert(node_id, Instant::now());
    }
}
