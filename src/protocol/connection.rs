//! Per-connection link session.
//!
//! A [`Connection`] owns the outbound packet queue, the pacing task that
//! drains it one packet per tick, the inbound reassembler, and the session
//! key. Reassembled messages are delivered as [`LinkEvent`]s on the channel
//! returned by [`Connection::new`].
//!
//! Encrypted messages that complete before a session key exists are parked.
//! Setting the key replays them in arrival order under the same lock, so a
//! parked message is delivered at most once and never interleaves with a
//! message received after the key was set.
//!
//! Must be created inside a Tokio runtime.

use crate::config::FramerConfig;
use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::framer::{self, Envelope, ReassemblyState, Reassembler};
use crate::protocol::handshake::SessionKey;
use crate::transport::ChunkTransport;
use crate::utils::crypto::{Crypto, KEY_LEN};
use crate::utils::metrics::Metrics;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, instrument, warn};

/// Notifications delivered to the owner of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete message
    Message {
        tag: u8,
        payload: Vec<u8>,
        encrypted: bool,
    },
    /// An encrypted message arrived before a session key was set and was parked
    EncryptedPending,
}

#[derive(Default)]
struct LinkState {
    reassembler: Reassembler,
    parked: VecDeque<Vec<u8>>,
    session: Option<SessionKey>,
    cipher: Option<Crypto>,
    outbound: VecDeque<Packet>,
    closed: bool,
}

/// One peer link
pub struct Connection {
    state: Arc<Mutex<LinkState>>,
    events: mpsc::UnboundedSender<LinkEvent>,
    pacer: JoinHandle<()>,
    config: FramerConfig,
    metrics: Arc<Metrics>,
}

impl Connection {
    /// Start a connection writing through `transport`
    pub fn new<T: ChunkTransport>(
        transport: T,
        config: FramerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        Self::with_metrics(transport, config, Arc::new(Metrics::new()))
    }

    pub fn with_metrics<T: ChunkTransport>(
        transport: T,
        config: FramerConfig,
        metrics: Arc<Metrics>,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let state = Arc::new(Mutex::new(LinkState::default()));
        let (events, rx) = mpsc::unbounded_channel();
        let pacer = tokio::spawn(pace(
            transport,
            Arc::clone(&state),
            config.send_interval,
            Arc::clone(&metrics),
        ));

        debug!(interval_ms = config.send_interval.as_millis() as u64, "Connection started");
        (
            Self {
                state,
                events,
                pacer,
                config,
                metrics,
            },
            rx,
        )
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    /// Frame `payload` under `tag` and queue its packets; returns the packet count
    #[instrument(skip(self, payload), fields(len = payload.len()))]
    pub async fn send(&self, tag: u8, payload: &[u8]) -> Result<usize> {
        if payload.len() > self.config.max_message_size {
            return Err(ProtocolError::OversizedMessage(payload.len()));
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.closed {
            return Err(ProtocolError::ConnectionClosed);
        }
        if self.pacer.is_finished() {
            return Err(ProtocolError::TransportError(
                constants::ERR_SEND_TASK_STOPPED.into(),
            ));
        }

        let packets = framer::fragment(tag, payload, state.cipher.as_ref())?;
        let count = packets.len();
        state.outbound.extend(packets);

        self.metrics.message_sent(payload.len() as u64);
        debug!(
            tag,
            packets = count,
            encrypted = state.cipher.is_some(),
            "Message queued"
        );
        Ok(count)
    }

    /// Feed one inbound packet
    pub async fn receive_packet(&self, packet: Packet) -> Result<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.closed {
            return Err(ProtocolError::ConnectionClosed);
        }
        self.metrics.packet_received();

        let Some(done) = state.reassembler.push(&packet) else {
            return Ok(());
        };

        if !done.encrypted {
            match Envelope::open(&done.bytes) {
                Ok(envelope) => self.deliver(envelope, false),
                Err(e) => {
                    self.metrics.malformed_dropped();
                    warn!(error = %e, len = done.bytes.len(), "Dropping plaintext message");
                }
            }
            return Ok(());
        }

        match state.cipher.as_ref() {
            Some(cipher) => match open_encrypted(cipher, &done.bytes) {
                Ok(envelope) => self.deliver(envelope, true),
                Err(e) => {
                    self.metrics.decrypt_failure();
                    warn!(error = %e, "Dropping undecryptable message");
                }
            },
            None => {
                if state.parked.len() >= self.config.max_parked {
                    state.parked.pop_front();
                    warn!(max = self.config.max_parked, "Parked queue full, dropped oldest");
                }
                state.parked.push_back(done.bytes);
                self.metrics.message_parked();
                debug!(parked = state.parked.len(), "Encrypted message parked");
                self.emit(LinkEvent::EncryptedPending);
            }
        }
        Ok(())
    }

    /// Feed one raw 17-byte chunk
    pub async fn receive_chunk(&self, chunk: &[u8]) -> Result<()> {
        self.receive_packet(Packet::from_bytes(chunk)?).await
    }

    /// Pump an inbound packet stream until it ends or fails
    #[instrument(skip_all)]
    pub async fn run_inbound<S>(&self, mut inbound: S) -> Result<()>
    where
        S: Stream<Item = Result<Packet>> + Unpin,
    {
        while let Some(item) = inbound.next().await {
            match item {
                Ok(packet) => self.receive_packet(packet).await?,
                Err(e) => {
                    warn!(error = %e, "Inbound stream failed");
                    return Err(e);
                }
            }
        }
        debug!("Inbound stream ended");
        Ok(())
    }

    /// Run [`run_inbound`](Self::run_inbound) on a background task
    pub fn spawn_inbound<S>(self: &Arc<Self>, inbound: S) -> JoinHandle<Result<()>>
    where
        S: Stream<Item = Result<Packet>> + Unpin + Send + 'static,
    {
        let conn = Arc::clone(self);
        tokio::spawn(async move { conn.run_inbound(inbound).await })
    }

    /// Install the session key and replay parked messages; returns how many were delivered
    #[instrument(skip_all)]
    pub async fn set_session_key(&self, nonce: [u8; KEY_LEN], key: [u8; KEY_LEN]) -> Result<usize> {
        self.install_session(SessionKey::new(nonce, key)).await
    }

    /// Install a key agreed through [`PairingState`](crate::protocol::handshake::PairingState)
    pub async fn install_session(&self, session: SessionKey) -> Result<usize> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.closed {
            return Err(ProtocolError::ConnectionClosed);
        }

        let cipher = Crypto::new(session.key());
        let mut still_parked = VecDeque::new();
        let mut replayed = 0;
        for bytes in state.parked.drain(..) {
            match open_encrypted(&cipher, &bytes) {
                Ok(envelope) => {
                    self.metrics.message_replayed();
                    self.deliver(envelope, true);
                    replayed += 1;
                }
                Err(e) => {
                    self.metrics.decrypt_failure();
                    debug!(error = %e, "Parked message still unreadable");
                    still_parked.push_back(bytes);
                }
            }
        }
        state.parked = still_parked;
        state.cipher = Some(cipher);
        state.session = Some(session);

        debug!(replayed, remaining = state.parked.len(), "Session key installed");
        Ok(replayed)
    }

    pub async fn has_session_key(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    /// Packets waiting for the pacer
    pub async fn queued_packets(&self) -> usize {
        self.state.lock().await.outbound.len()
    }

    /// Encrypted messages waiting for a key
    pub async fn parked_messages(&self) -> usize {
        self.state.lock().await.parked.len()
    }

    pub async fn reassembly_state(&self) -> ReassemblyState {
        self.state.lock().await.reassembler.state()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Stop pacing and discard queued packets, parked messages and key material
    #[instrument(skip_all)]
    pub async fn close(&self) {
        self.pacer.abort();
        let mut state = self.state.lock().await;
        let dropped = state.outbound.len();
        state.closed = true;
        state.outbound.clear();
        state.parked.clear();
        state.reassembler.reset();
        state.cipher = None;
        state.session = None;
        debug!(dropped_packets = dropped, "Connection closed");
    }

    fn deliver(&self, envelope: Envelope, encrypted: bool) {
        self.metrics.message_received(envelope.payload.len() as u64);
        self.emit(LinkEvent::Message {
            tag: envelope.tag,
            payload: envelope.payload,
            encrypted,
        });
    }

    fn emit(&self, event: LinkEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.pacer.abort();
    }
}

fn open_encrypted(cipher: &Crypto, bytes: &[u8]) -> Result<Envelope> {
    let plain = cipher.decrypt(bytes)?;
    Envelope::open(&plain)
}

/// Write at most one queued packet per tick
async fn pace<T: ChunkTransport>(
    transport: T,
    state: Arc<Mutex<LinkState>>,
    period: Duration,
    metrics: Arc<Metrics>,
) {
    let mut ticker = time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let next = state.lock().await.outbound.pop_front();
        let Some(packet) = next else {
            continue;
        };

        match transport.write_chunk(packet).await {
            Ok(()) => {
                metrics.packet_sent();
                debug!(control = packet.control.bits(), "Packet written");
            }
            Err(ProtocolError::ConnectionClosed) => {
                debug!("{}", constants::ERR_PEER_GONE);
                break;
            }
            Err(e) => {
                metrics.transport_error();
                warn!(error = %e, "Packet write failed");
            }
        }
    }
}
