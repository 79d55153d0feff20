//! Chat session: presence state machine and the actor that drives it.
//!
//! A session owns its identity, peer table, codec and transport. All state is
//! touched by a single tokio task that selects over inbound datagrams, the
//! announce and sweep timers, and commands from [`Session`] handles, so
//! datagrams and timer ticks never race on the peer table.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::chat::config::{PresenceTiming, SessionConfig, TransportConfig, RECV_RETRY_DELAY};
use crate::chat::error::ChatError;
use crate::chat::peers::{PeerSummary, PeerTable};
use crate::chat::protocol::{now_millis, Envelope, EnvelopeCodec};
use crate::chat::transport::{Binding, DatagramTransport, UdpTransport};

/// Locally generated identity, unique per running session.
///
/// Not cryptographically meaningful: it only tells us apart from peers and
/// lets us drop our own echoes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        Self(format!(
            "{}-{}-{}",
            to_base36(rand::random::<u64>()),
            std::process::id(),
            to_base36(now_millis())
        ))
    }

    /// Identity as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// An accepted chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Sender display name.
    pub from: String,
    /// Message text.
    pub text: String,
    /// Sender timestamp, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Events published by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A chat message from a peer in our room.
    Chat(ChatEvent),
    /// Current peer list.
    Peers(Vec<PeerSummary>),
}

/// Receiving side of a session's event stream.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// What the actor must do after an inbound datagram.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    /// Send our hello right away (answer to a who probe).
    pub reply_hello: bool,
    /// Events to publish.
    pub events: Vec<SessionEvent>,
}

/// Protocol state for one session, free of any I/O.
#[derive(Debug)]
pub struct PresenceState {
    id: PeerId,
    room: String,
    name: String,
    codec: EnvelopeCodec,
    peers: PeerTable,
    peer_ttl: Duration,
}

impl PresenceState {
    /// Create the state for a session.
    pub fn new(id: PeerId, config: SessionConfig) -> Self {
        Self {
            id,
            room: config.room,
            name: config.name,
            codec: EnvelopeCodec::new(config.key),
            peers: PeerTable::new(),
            peer_ttl: config.timing.peer_ttl,
        }
    }

    /// Our identity.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Known peers.
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Our presence announcement.
    pub fn hello(&self) -> Envelope {
        Envelope::hello(&self.room, self.id.as_str(), &self.name)
    }

    /// Our presence probe.
    pub fn who(&self) -> Envelope {
        Envelope::who(&self.room, self.id.as_str(), Some(&self.name))
    }

    /// A chat message from us.
    pub fn chat(&self, text: &str) -> Envelope {
        Envelope::chat(&self.room, self.id.as_str(), &self.name, text)
    }

    /// Encode an outbound envelope, encrypting chats when keyed.
    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ChatError> {
        self.codec.encode(envelope)
    }

    /// Interpret one inbound datagram.
    ///
    /// Undecodable datagrams, other rooms and our own echoes leave the state
    /// untouched and produce no reaction.
    pub fn handle_datagram(
        &mut self,
        payload: &[u8],
        source: SocketAddr,
        now: Instant,
    ) -> Reaction {
        let envelope = match self.codec.decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::trace!(%source, error = %e, "discarding datagram");
                return Reaction::default();
            }
        };

        if envelope.room() != Some(self.room.as_str()) {
            return Reaction::default();
        }
        if envelope.peer_id() == Some(self.id.as_str()) {
            return Reaction::default();
        }

        match envelope {
            Envelope::Hello(hello) => {
                self.peers.upsert(&hello.peer_id, &hello.name, source, now);
                Reaction {
                    reply_hello: false,
                    events: vec![SessionEvent::Peers(self.peers.snapshot())],
                }
            }
            Envelope::Who(_) => Reaction {
                reply_hello: true,
                events: Vec::new(),
            },
            Envelope::Chat(chat) => {
                self.peers.upsert(&chat.peer_id, &chat.name, source, now);
                Reaction {
                    reply_hello: false,
                    events: vec![
                        SessionEvent::Chat(ChatEvent {
                            from: chat.name,
                            text: chat.text,
                            timestamp: chat.timestamp,
                        }),
                        SessionEvent::Peers(self.peers.snapshot()),
                    ],
                }
            }
            // The codec never hands out encrypted wrappers
            Envelope::Encrypted(_) => Reaction::default(),
        }
    }

    /// Drop stale peers; returns the new peer list if anything changed.
    pub fn sweep(&mut self, now: Instant) -> Option<SessionEvent> {
        if self.peers.sweep(now, self.peer_ttl) > 0 {
            Some(SessionEvent::Peers(self.peers.snapshot()))
        } else {
            None
        }
    }
}

enum Command {
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), ChatError>>,
    },
    Peers {
        reply: oneshot::Sender<Vec<PeerSummary>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running chat session.
///
/// Dropping the handle stops the session.
pub struct Session {
    id: PeerId,
    room: String,
    name: String,
    encrypted: bool,
    commands: mpsc::UnboundedSender<Command>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Open a listening UDP endpoint and start a session on it.
    pub async fn join(
        config: SessionConfig,
        transport: &TransportConfig,
    ) -> Result<(Self, SessionEvents), ChatError> {
        let transport = UdpTransport::open(transport, Binding::Listen).await?;
        Ok(Self::start(config, transport))
    }

    /// Start a session on an already opened transport.
    ///
    /// Sends one hello and one who, then keeps announcing and sweeping until
    /// stopped. Must be called from within a tokio runtime.
    pub fn start<T>(config: SessionConfig, transport: T) -> (Self, SessionEvents)
    where
        T: DatagramTransport + 'static,
    {
        let id = PeerId::generate();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let room = config.room.clone();
        let name = config.name.clone();
        let encrypted = config.is_encrypted();
        let timing = config.timing;

        tracing::debug!(%id, %room, %name, encrypted, "session starting");

        let state = PresenceState::new(id.clone(), config);
        let task = tokio::spawn(run_session(state, transport, timing, command_rx, event_tx));

        let session = Self {
            id,
            room,
            name,
            encrypted,
            commands: command_tx,
            task: Mutex::new(Some(task)),
        };
        (session, event_rx)
    }

    /// Our identity.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Room name.
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Our display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether chat payloads are encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Send a chat message to the room.
    ///
    /// A transport failure is returned here and the session keeps running.
    pub async fn send(&self, text: &str) -> Result<(), ChatError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                text: text.to_string(),
                reply,
            })
            .map_err(|_| ChatError::SessionStopped)?;
        response.await.map_err(|_| ChatError::SessionStopped)?
    }

    /// Snapshot of the peer table.
    pub async fn peers(&self) -> Result<Vec<PeerSummary>, ChatError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Peers { reply })
            .map_err(|_| ChatError::SessionStopped)?;
        response.await.map_err(|_| ChatError::SessionStopped)
    }

    /// Stop the session: cancel both timers, then close the transport.
    ///
    /// Idempotent. Returns once the session task has finished.
    pub async fn stop(&self) {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Stop { reply }).is_ok() {
            let _ = response.await;
        }

        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

async fn send_envelope<T: DatagramTransport>(
    transport: &mut T,
    state: &PresenceState,
    envelope: &Envelope,
) -> Result<(), ChatError> {
    let bytes = state.encode(envelope)?;
    transport.send(&bytes).await
}

async fn announce<T: DatagramTransport>(transport: &mut T, state: &PresenceState) {
    if let Err(e) = send_envelope(transport, state, &state.hello()).await {
        tracing::warn!(error = %e, "hello not sent");
    }
}

async fn run_session<T: DatagramTransport>(
    mut state: PresenceState,
    mut transport: T,
    timing: PresenceTiming,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    announce(&mut transport, &state).await;
    if let Err(e) = send_envelope(&mut transport, &state, &state.who()).await {
        tracing::warn!(error = %e, "who not sent");
    }

    let start = Instant::now();
    let mut announce_timer =
        time::interval_at(start + timing.hello_interval, timing.hello_interval);
    announce_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sweep_timer =
        time::interval_at(start + timing.sweep_interval, timing.sweep_interval);
    sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stop_reply = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send { text, reply }) => {
                    let envelope = state.chat(&text);
                    let _ = reply.send(send_envelope(&mut transport, &state, &envelope).await);
                }
                Some(Command::Peers { reply }) => {
                    let _ = reply.send(state.peers().snapshot());
                }
                Some(Command::Stop { reply }) => break Some(reply),
                None => break None,
            },

            received = transport.recv() => match received {
                Ok(datagram) => {
                    let reaction =
                        state.handle_datagram(&datagram.payload, datagram.source, Instant::now());
                    if reaction.reply_hello {
                        announce(&mut transport, &state).await;
                    }
                    for event in reaction.events {
                        let _ = events.send(event);
                    }
                }
                Err(ChatError::TransportClosed) => break None,
                Err(e) => {
                    tracing::debug!(error = %e, "receive failed");
                    time::sleep(RECV_RETRY_DELAY).await;
                }
            },

            _ = announce_timer.tick() => announce(&mut transport, &state).await,

            _ = sweep_timer.tick() => {
                if let Some(event) = state.sweep(Instant::now()) {
                    let _ = events.send(event);
                }
            }
        }
    };

    // Timers go first so no tick can send on a closed endpoint
    drop(announce_timer);
    drop(sweep_timer);
    if let Err(e) = transport.close().await {
        tracing::debug!(error = %e, "transport close failed");
    }
    tracing::debug!(id = %state.id(), "session stopped");

    drop(commands);
    if let Some(reply) = stop_reply {
        let _ = reply.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::transport::{Datagram, MemoryHub, MemoryTransport};
    use crate::crypto::ChatKey;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Switches for injecting endpoint failures.
    #[derive(Clone, Default)]
    struct Faults {
        sends: Arc<AtomicBool>,
        recvs: Arc<AtomicBool>,
        recv_calls: Arc<AtomicUsize>,
    }

    /// Memory endpoint that fails on demand.
    struct FaultyTransport {
        inner: MemoryTransport,
        faults: Faults,
    }

    #[async_trait]
    impl DatagramTransport for FaultyTransport {
        async fn send(&mut self, payload: &[u8]) -> Result<(), ChatError> {
            if self.faults.sends.load(Ordering::SeqCst) {
                return Err(ChatError::SendFailed("network unreachable".to_string()));
            }
            self.inner.send(payload).await
        }

        async fn recv(&mut self) -> Result<Datagram, ChatError> {
            self.faults.recv_calls.fetch_add(1, Ordering::SeqCst);
            if self.faults.recvs.load(Ordering::SeqCst) {
                return Err(ChatError::ReceiveFailed("connection reset".to_string()));
            }
            self.inner.recv().await
        }

        async fn close(&mut self) -> Result<(), ChatError> {
            self.inner.close().await
        }

        fn local_addr(&self) -> Result<SocketAddr, ChatError> {
            self.inner.local_addr()
        }
    }

    fn source(last: u8) -> SocketAddr {
        SocketAddr::from(([192, 168, 0, last], 45454))
    }

    fn state(room: &str, name: &str) -> PresenceState {
        PresenceState::new(PeerId::generate(), SessionConfig::new(room, name))
    }

    fn wire(envelope: &Envelope) -> Vec<u8> {
        envelope.to_bytes().unwrap()
    }

    #[test]
    fn test_peer_ids_are_unique() {
        let a = PeerId::generate();
        let b = PeerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().split('-').count(), 3);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_hello_upserts_peer() {
        let mut state = state("x", "me");
        let now = Instant::now();

        let hello = wire(&Envelope::hello("x", "p1", "bob"));
        let reaction = state.handle_datagram(&hello, source(2), now);

        assert!(!reaction.reply_hello);
        assert_eq!(
            reaction.events,
            vec![SessionEvent::Peers(vec![PeerSummary {
                name: "bob".to_string(),
                address: source(2).ip(),
            }])]
        );
        assert_eq!(state.peers().get("p1").unwrap().last_seen, now);
    }

    #[test]
    fn test_who_requests_single_hello() {
        let mut state = state("x", "me");
        let who = wire(&Envelope::who("x", "p1", None));
        let reaction = state.handle_datagram(&who, source(2), Instant::now());

        assert!(reaction.reply_hello);
        assert!(reaction.events.is_empty());
        assert!(state.peers().is_empty());
    }

    #[test]
    fn test_chat_publishes_message_and_peers() {
        let mut state = state("x", "me");
        let reaction = state.handle_datagram(
            &wire(&Envelope::chat("x", "p1", "bob", "hello")),
            source(3),
            Instant::now(),
        );

        match &reaction.events[..] {
            [SessionEvent::Chat(chat), SessionEvent::Peers(peers)] => {
                assert_eq!(chat.from, "bob");
                assert_eq!(chat.text, "hello");
                assert_eq!(peers.len(), 1);
            }
            other => panic!("unexpected events: {:?}", other),
        }
        assert!(state.peers().get("p1").is_some());
    }

    #[test]
    fn test_other_room_ignored() {
        let mut state = state("x", "me");
        let now = Instant::now();

        for envelope in [
            Envelope::hello("y", "p1", "bob"),
            Envelope::who("y", "p1", None),
            Envelope::chat("y", "p1", "bob", "hi"),
        ] {
            let reaction = state.handle_datagram(&wire(&envelope), source(2), now);
            assert_eq!(reaction, Reaction::default());
        }
        assert!(state.peers().is_empty());
    }

    #[test]
    fn test_self_echo_ignored() {
        let mut state = state("x", "me");
        let now = Instant::now();

        for envelope in [state.hello(), state.who(), state.chat("hi")] {
            let bytes = state.encode(&envelope).unwrap();
            let reaction = state.handle_datagram(&bytes, source(1), now);
            assert_eq!(reaction, Reaction::default());
        }
        assert!(state.peers().is_empty());
    }

    #[test]
    fn test_garbage_ignored() {
        let mut state = state("x", "me");
        let now = Instant::now();

        for payload in [&b""[..], b"{", b"\xff\xfe", br#"{"v":1,"type":"hello"}"#] {
            assert_eq!(state.handle_datagram(payload, source(9), now), Reaction::default());
        }
    }

    #[test]
    fn test_encrypted_chat_needs_matching_key() {
        let config = SessionConfig::new("x", "me").with_key(Some(ChatKey::from_bytes([1; 32])));
        let sender = PresenceState::new(PeerId::generate(), config);
        let bytes = sender.encode(&sender.chat("secret")).unwrap();

        let mut same = PresenceState::new(
            PeerId::generate(),
            SessionConfig::new("x", "b").with_key(Some(ChatKey::from_bytes([1; 32]))),
        );
        let mut wrong = PresenceState::new(
            PeerId::generate(),
            SessionConfig::new("x", "c").with_key(Some(ChatKey::from_bytes([2; 32]))),
        );
        let mut none = state("x", "d");
        let now = Instant::now();

        assert_eq!(same.handle_datagram(&bytes, source(1), now).events.len(), 2);
        assert_eq!(wrong.handle_datagram(&bytes, source(1), now), Reaction::default());
        assert_eq!(none.handle_datagram(&bytes, source(1), now), Reaction::default());
        assert!(wrong.peers().is_empty());
    }

    #[test]
    fn test_sweep_reports_only_changes() {
        let mut state = state("x", "me");
        let t0 = Instant::now();
        state.handle_datagram(&wire(&Envelope::hello("x", "p1", "bob")), source(2), t0);

        assert_eq!(state.sweep(t0 + Duration::from_secs(5)), None);
        assert_eq!(
            state.sweep(t0 + Duration::from_secs(21)),
            Some(SessionEvent::Peers(Vec::new()))
        );
        assert_eq!(state.sweep(t0 + Duration::from_secs(40)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_sends_hello_then_who() {
        let hub = MemoryHub::new();
        let mut observer = hub.endpoint();
        let (session, _events) = Session::start(SessionConfig::new("x", "alice"), hub.endpoint());

        let first = Envelope::from_bytes(&observer.recv().await.unwrap().payload).unwrap();
        let second = Envelope::from_bytes(&observer.recv().await.unwrap().payload).unwrap();
        assert!(matches!(first, Envelope::Hello(ref h) if h.name == "alice"));
        assert!(matches!(second, Envelope::Who(_)));
        assert_eq!(first.peer_id(), Some(session.id().as_str()));

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_who_gets_exactly_one_reply() {
        let hub = MemoryHub::new();
        let mut probe = hub.endpoint();
        let (session, _events) = Session::start(SessionConfig::new("x", "alice"), hub.endpoint());

        // startup hello + who
        probe.recv().await.unwrap();
        probe.recv().await.unwrap();

        probe
            .send(&wire(&Envelope::who("x", "probe", None)))
            .await
            .unwrap();

        let mut hellos = 0;
        let deadline = time::sleep(Duration::from_secs(1));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                received = probe.recv() => {
                    let payload = received.unwrap().payload;
                    if let Ok(Envelope::Hello(_)) = Envelope::from_bytes(&payload) {
                        hellos += 1;
                    }
                }
                _ = &mut deadline => break,
            }
        }
        assert_eq!(hellos, 1);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_announce_timer_resends_hello() {
        let hub = MemoryHub::new();
        let mut observer = hub.endpoint();
        let (session, _events) = Session::start(SessionConfig::new("x", "alice"), hub.endpoint());

        observer.recv().await.unwrap();
        observer.recv().await.unwrap();

        let before = Instant::now();
        let next = Envelope::from_bytes(&observer.recv().await.unwrap().payload).unwrap();
        assert!(matches!(next, Envelope::Hello(_)));
        assert!(Instant::now() - before >= PresenceTiming::default().hello_interval);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_peer_evicted() {
        let hub = MemoryHub::new();
        let (session, mut events) =
            Session::start(SessionConfig::new("x", "alice"), hub.endpoint());

        hub.inject(&wire(&Envelope::hello("x", "ghost", "casper")), source(7));

        match events.recv().await {
            Some(SessionEvent::Peers(peers)) => assert_eq!(peers[0].name, "casper"),
            other => panic!("unexpected event: {:?}", other),
        }

        let started = Instant::now();
        match events.recv().await {
            Some(SessionEvent::Peers(peers)) => assert!(peers.is_empty()),
            other => panic!("unexpected event: {:?}", other),
        }
        let waited = Instant::now() - started;
        let timing = PresenceTiming::default();
        assert!(waited > timing.peer_ttl);
        assert!(waited <= timing.peer_ttl + timing.sweep_interval);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_final() {
        let hub = MemoryHub::new();
        let (session, mut events) =
            Session::start(SessionConfig::new("x", "alice"), hub.endpoint());
        assert_eq!(hub.endpoint_count(), 1);

        session.stop().await;
        session.stop().await;

        assert_eq!(hub.endpoint_count(), 0);
        assert!(matches!(session.send("late").await, Err(ChatError::SessionStopped)));
        assert!(matches!(session.peers().await, Err(ChatError::SessionStopped)));

        hub.inject(&wire(&Envelope::hello("x", "p", "bob")), source(3));
        assert!(events.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_stop() {
        let hub = MemoryHub::new();
        let (session, _events) = Session::start(SessionConfig::new("x", "alice"), hub.endpoint());

        tokio::join!(session.stop(), session.stop());
        assert_eq!(hub.endpoint_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_reaches_peer() {
        let hub = MemoryHub::new();
        let mut observer = hub.endpoint();
        let (session, _events) = Session::start(SessionConfig::new("x", "alice"), hub.endpoint());
        observer.recv().await.unwrap();
        observer.recv().await.unwrap();

        session.send("hello room").await.unwrap();
        match Envelope::from_bytes(&observer.recv().await.unwrap().payload).unwrap() {
            Envelope::Chat(chat) => {
                assert_eq!(chat.text, "hello room");
                assert_eq!(chat.name, "alice");
                assert_eq!(chat.room, "x");
            }
            other => panic!("unexpected envelope: {:?}", other),
        }

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_is_reported_and_session_survives() {
        let hub = MemoryHub::new();
        let mut observer = hub.endpoint();
        let faults = Faults::default();
        let transport = FaultyTransport {
            inner: hub.endpoint(),
            faults: faults.clone(),
        };
        let (session, _events) = Session::start(SessionConfig::new("x", "alice"), transport);
        observer.recv().await.unwrap();
        observer.recv().await.unwrap();

        faults.sends.store(true, Ordering::SeqCst);
        assert!(matches!(
            session.send("lost").await,
            Err(ChatError::SendFailed(_))
        ));
        assert!(session.peers().await.unwrap().is_empty());

        faults.sends.store(false, Ordering::SeqCst);
        session.send("back").await.unwrap();
        match Envelope::from_bytes(&observer.recv().await.unwrap().payload).unwrap() {
            Envelope::Chat(chat) => assert_eq!(chat.text, "back"),
            other => panic!("unexpected envelope: {:?}", other),
        }

        session.stop().await;
        assert_eq!(hub.endpoint_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_errors_back_off() {
        let hub = MemoryHub::new();
        let faults = Faults::default();
        faults.recvs.store(true, Ordering::SeqCst);
        let transport = FaultyTransport {
            inner: hub.endpoint(),
            faults: faults.clone(),
        };
        let (session, _events) = Session::start(SessionConfig::new("x", "alice"), transport);

        time::sleep(Duration::from_secs(1)).await;
        let calls = faults.recv_calls.load(Ordering::SeqCst);
        assert!(calls >= 2);
        assert!(calls as u128 <= 1000 / RECV_RETRY_DELAY.as_millis() + 2);

        // Recovers once the endpoint does
        faults.recvs.store(false, Ordering::SeqCst);
        hub.inject(&wire(&Envelope::hello("x", "p1", "bob")), source(4));
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(session.peers().await.unwrap()[0].name, "bob");

        session.stop().await;
    }
}
