//! Direct device-to-device sync over data channels.
//!
//! Links are negotiated out of band: the host shows an offer code, the guest
//! answers with an answer code, both as copy/paste text shaped like manual
//! sync codes. Negotiation waits for ICE gathering to finish before a code
//! is produced, so one code per side is enough.

#[cfg(target_arch = "wasm32")]
mod rtc;

#[cfg(target_arch = "wasm32")]
pub use rtc::RtcPeerLink;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use super::codec::{chunk, decode_chunked, encode_json};
use super::{Subscription, SyncCallback, SyncTransport, TransportKind};
use crate::config::SyncConfig;
use crate::error::{GameError, Result};
use crate::roster::SyncedGameData;

/// An established (or establishing) link to one other device
pub trait PeerLink {
    fn is_open(&self) -> bool;
    fn send(&self, text: &str) -> Result<()>;
    /// Replace the handler for incoming text messages
    fn set_on_message(&self, handler: Box<dyn Fn(String)>);
    fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    Offer,
    Answer,
}

/// Session description exchanged while negotiating a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMessage {
    pub kind: SignalKind,
    pub code: String,
    pub sdp: String,
}

impl SignalMessage {
    pub fn new(kind: SignalKind, code: &str, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.to_string(),
            sdp: sdp.into(),
        }
    }

    /// Grouped text for copy/paste
    pub fn to_code(&self, config: &SyncConfig) -> Result<String> {
        Ok(chunk(
            &encode_json(self)?,
            config.manual_chunk_width,
            config.manual_separator,
        ))
    }

    pub fn from_code(text: &str, config: &SyncConfig) -> Option<Self> {
        decode_chunked(text, config.manual_chunk_width, config.manual_separator)
    }
}

type Listeners = Rc<RefCell<Vec<(u64, SyncCallback)>>>;

/// Fans records out to every open link and in from all of them
pub struct PeerTransport {
    code: String,
    links: RefCell<Vec<Rc<dyn PeerLink>>>,
    listeners: Listeners,
    next_id: Cell<u64>,
    last_received: Rc<RefCell<Option<SyncedGameData>>>,
}

impl PeerTransport {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            links: RefCell::new(Vec::new()),
            listeners: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(0),
            last_received: Rc::new(RefCell::new(None)),
        }
    }

    /// Start sending to and listening on `link`
    pub fn add_link(&self, link: Rc<dyn PeerLink>) {
        let listeners = self.listeners.clone();
        let last_received = self.last_received.clone();
        link.set_on_message(Box::new(move |text: String| {
            let data = match SyncedGameData::from_json(&text) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Dropping peer message: {}", e);
                    return;
                }
            };
            *last_received.borrow_mut() = Some(data.clone());
            let callbacks: Vec<SyncCallback> =
                listeners.borrow().iter().map(|(_, cb)| cb.clone()).collect();
            for callback in callbacks {
                callback(data.clone());
            }
        }));
        self.links.borrow_mut().push(link);
        log::info!("Peer link added for {} ({} total)", self.code, self.link_count());
    }

    pub fn link_count(&self) -> usize {
        self.links.borrow().len()
    }

    pub fn open_link_count(&self) -> usize {
        self.links.borrow().iter().filter(|l| l.is_open()).count()
    }

    /// Close and forget every link
    pub fn close_all(&self) {
        for link in self.links.borrow_mut().drain(..) {
            link.close();
        }
    }
}

impl SyncTransport for PeerTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Peer
    }

    fn is_available(&self) -> bool {
        self.open_link_count() > 0
    }

    fn publish(&self, data: &SyncedGameData) -> Result<String> {
        let open: Vec<Rc<dyn PeerLink>> = self
            .links
            .borrow()
            .iter()
            .filter(|l| l.is_open())
            .cloned()
            .collect();
        if open.is_empty() {
            return Err(GameError::transport(self.kind().name(), "no open peer links"));
        }

        let message = data.to_json()?;
        let mut sent = 0;
        for link in &open {
            match link.send(&message) {
                Ok(()) => sent += 1,
                Err(e) => log::warn!("Peer send failed: {}", e),
            }
        }
        if sent == 0 {
            return Err(GameError::transport(self.kind().name(), "every send failed"));
        }
        Ok(self.code.clone())
    }

    /// Most recent record received from any peer, `token` is a game code
    fn fetch(&self, token: &str) -> Option<SyncedGameData> {
        if token != self.code {
            return None;
        }
        self.last_received.borrow().clone()
    }

    fn subscribe(&self, callback: SyncCallback) -> Option<Subscription> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, callback));

        let listeners = Rc::downgrade(&self.listeners);
        Some(Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|(i, _)| *i != id);
            }
        }))
    }
}

/// In-process link; [`MemoryPeerLink::pair`] connects two of them
pub struct MemoryPeerLink {
    open: Cell<bool>,
    remote: RefCell<Weak<MemoryPeerLink>>,
    handler: RefCell<Option<Rc<dyn Fn(String)>>>,
}

impl MemoryPeerLink {
    pub fn pair() -> (Rc<Self>, Rc<Self>) {
        let a = Rc::new(Self::unconnected());
        let b = Rc::new(Self::unconnected());
        *a.remote.borrow_mut() = Rc::downgrade(&b);
        *b.remote.borrow_mut() = Rc::downgrade(&a);
        a.open.set(true);
        b.open.set(true);
        (a, b)
    }

    fn unconnected() -> Self {
        Self {
            open: Cell::new(false),
            remote: RefCell::new(Weak::new()),
            handler: RefCell::new(None),
        }
    }
}

impl PeerLink for MemoryPeerLink {
    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn send(&self, text: &str) -> Result<()> {
        let remote = self
            .remote
            .borrow()
            .upgrade()
            .filter(|r| self.is_open() && r.is_open())
            .ok_or_else(|| GameError::transport("peer", "link closed"))?;
        let handler = remote.handler.borrow().clone();
        if let Some(handler) = handler {
            handler(text.to_string());
        }
        Ok(())
    }

    fn set_on_message(&self, handler: Box<dyn Fn(String)>) {
        *self.handler.borrow_mut() = Some(Rc::from(handler));
    }

    fn close(&self) {
        self.open.set(false);
        if let Some(remote) = self.remote.borrow().upgrade() {
            remote.open.set(false);
        }
    }
}
