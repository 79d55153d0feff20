//! # peermsg - serverless LAN chat
//!
//! Peers on the same network discover each other and exchange short text
//! messages over UDP broadcast or multicast. There is no server and no
//! history: presence is soft state refreshed by periodic announcements, and
//! delivery is best effort.
//!
//! ## Example Usage
//!
//! ```no_run
//! use peermsg::chat::{Session, SessionConfig, SessionEvent, TransportConfig};
//! use peermsg::crypto::ChatKey;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let key = ChatKey::derive_optional(Some("secret"))?;
//! let config = SessionConfig::new("lobby", "alice").with_key(key);
//!
//! let (session, mut events) = Session::join(config, &TransportConfig::default()).await?;
//! session.send("hi all").await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Chat(chat) = event {
//!         println!("[{}] {}", chat.from, chat.text);
//!     }
//! }
//! session.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: passphrase key derivation and AES-256-GCM sealing
//! - [`chat`]: protocol, transports, presence and sessions

/// Crate version, shown by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod chat;
pub mod crypto;

pub use chat::{ChatError, DecodeError, Session, SessionConfig, SessionEvent, TransportConfig};
pub use crypto::ChatKey;
