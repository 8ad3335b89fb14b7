//! Moving game records between devices without a server.
//!
//! ## Transports
//!
//! | transport                  | reach                 | live updates          |
//! |----------------------------|-----------------------|-----------------------|
//! | [`ChannelTransport`]       | same origin, same UA  | `BroadcastChannel` + 3 s backup poll |
//! | [`LocalBroadcastTransport`]| same origin, same UA  | storage events        |
//! | [`UrlTransport`]           | any device            | 2 s location poll     |
//! | [`PeerTransport`]          | any device            | WebRTC data channel   |
//! | [`ManualTransport`]        | any device            | none (copy/paste)     |
//!
//! [`SyncHub`] chains them in that order and degrades to manual codes when
//! nothing automatic is available.

pub mod channel;
pub mod codec;
pub mod local;
pub mod manual;
pub mod peer;
pub mod unified;
pub mod url;

#[cfg(target_arch = "wasm32")]
pub mod browser;

pub use channel::{BroadcastPort, ChannelFactory, ChannelTransport, MemoryChannelHub};
pub use codec::{decode_payload, encode_payload};
pub use local::LocalBroadcastTransport;
pub use manual::{create_sync_code, parse_sync_code, ManualTransport};
pub use peer::{MemoryPeerLink, PeerLink, PeerTransport, SignalKind, SignalMessage};
pub use unified::{PublishReport, SyncHub, SyncStatus};
pub use url::{detect_shared_game, LocationSource, MemoryLocation, UrlStyle, UrlTransport};

pub use crate::notify::Subscription;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::roster::SyncedGameData;

/// Receives records delivered by a transport
pub type SyncCallback = Rc<dyn Fn(SyncedGameData)>;

/// Which strategy a transport implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportKind {
    Channel,
    LocalBroadcast,
    Url,
    Peer,
    Manual,
}

impl TransportKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Channel => "channel",
            TransportKind::LocalBroadcast => "local-broadcast",
            TransportKind::Url => "url",
            TransportKind::Peer => "peer",
            TransportKind::Manual => "manual",
        }
    }

    /// Whether the transport pushes without a human copying anything
    pub fn is_automatic(&self) -> bool {
        !matches!(self, TransportKind::Manual)
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One way of moving a [`SyncedGameData`] between devices.
///
/// `publish` returns a transport-specific token (share URL, manual code,
/// game code) that `fetch` can turn back into a record.
pub trait SyncTransport {
    fn kind(&self) -> TransportKind;

    /// Capability probe; unavailable transports are skipped by the hub
    fn is_available(&self) -> bool;

    fn publish(&self, data: &SyncedGameData) -> Result<String>;

    fn fetch(&self, token: &str) -> Option<SyncedGameData>;

    /// Live updates, `None` if this transport cannot push
    fn subscribe(&self, _callback: SyncCallback) -> Option<Subscription> {
        None
    }
}
