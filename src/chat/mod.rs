//! # peermsg chat
//!
//! Serverless LAN chat over UDP broadcast or multicast.
//!
//! Peers find each other with soft-state presence: every session announces
//! itself with a `hello` on a fixed interval, answers `who` probes, and drops
//! peers it has not heard from within the TTL. Chat messages go to the whole
//! room and are optionally sealed with a key derived from a shared
//! passphrase.
//!
//! ## Layers
//!
//! - [`protocol`]: wire envelopes and the codec that encrypts chats
//! - [`transport`]: datagram endpoints (UDP, in-process hub)
//! - [`peers`]: peer table with TTL eviction
//! - [`session`]: presence state machine and its actor
//! - [`oneshot`]: send a single message, probe a room
//! - [`tui`]: full-screen terminal front end

pub mod config;
mod error;
pub mod oneshot;
pub mod peers;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod tui;

pub use config::{PresenceTiming, SessionConfig, TransportConfig, TransportMode};
pub use error::{ChatError, DecodeError};
pub use oneshot::{probe_peers, send_once};
pub use peers::{PeerRecord, PeerSummary, PeerTable};
pub use session::{ChatEvent, PeerId, PresenceState, Session, SessionEvent, SessionEvents};
