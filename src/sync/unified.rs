//! Transport fallback chain
//!
//! Transports are tried in a fixed order:
//!   1. Channel (same browser, instant)
//!   2. Local broadcast (same browser, storage events)
//!   3. URL (share link, polled)
//!   4. Peer (data channels, once negotiated)
//!
//! Every available transport gets every publish. A manual code is always
//! produced, so a failed chain degrades to copy/paste instead of failing.

use std::rc::Rc;

use serde::Serialize;

use super::manual::ManualTransport;
use super::{Subscription, SyncCallback, SyncTransport, TransportKind};
use crate::error::{GameError, Result};
use crate::roster::SyncedGameData;

/// Whether other devices will see updates without help
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    /// At least one automatic transport accepted the update
    Automatic,
    /// Nothing automatic worked; players must exchange manual codes
    ManualOnly,
}

/// Outcome of [`SyncHub::publish`]
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub status: SyncStatus,
    pub delivered: Vec<TransportKind>,
    pub failures: Vec<(TransportKind, GameError)>,
    /// Share link, when the URL transport took part
    pub share_url: Option<String>,
    pub manual_code: String,
}

impl PublishReport {
    pub fn is_automatic(&self) -> bool {
        self.status == SyncStatus::Automatic
    }
}

fn priority(kind: TransportKind) -> u8 {
    match kind {
        TransportKind::Channel => 0,
        TransportKind::LocalBroadcast => 1,
        TransportKind::Url => 2,
        TransportKind::Peer => 3,
        TransportKind::Manual => 4,
    }
}

pub struct SyncHub {
    transports: Vec<Rc<dyn SyncTransport>>,
    manual: ManualTransport,
}

impl SyncHub {
    pub fn new(manual: ManualTransport) -> Self {
        Self {
            transports: Vec::new(),
            manual,
        }
    }

    /// Add an automatic transport; its place in the chain follows its kind
    pub fn add(&mut self, transport: Rc<dyn SyncTransport>) {
        if transport.kind() == TransportKind::Manual {
            log::debug!("Manual transport is built in, ignoring");
            return;
        }
        let rank = priority(transport.kind());
        let at = self
            .transports
            .iter()
            .position(|t| priority(t.kind()) > rank)
            .unwrap_or(self.transports.len());
        self.transports.insert(at, transport);
    }

    pub fn with(mut self, transport: Rc<dyn SyncTransport>) -> Self {
        self.add(transport);
        self
    }

    pub fn manual(&self) -> &ManualTransport {
        &self.manual
    }

    /// Kinds in chain order, available or not
    pub fn kinds(&self) -> Vec<TransportKind> {
        self.transports.iter().map(|t| t.kind()).collect()
    }

    pub fn available_kinds(&self) -> Vec<TransportKind> {
        self.transports
            .iter()
            .filter(|t| t.is_available())
            .map(|t| t.kind())
            .collect()
    }

    pub fn status(&self) -> SyncStatus {
        if self.available_kinds().is_empty() {
            SyncStatus::ManualOnly
        } else {
            SyncStatus::Automatic
        }
    }

    /// Push `data` through every available transport
    pub fn publish(&self, data: &SyncedGameData) -> Result<PublishReport> {
        let mut delivered = Vec::new();
        let mut failures = Vec::new();
        let mut share_url = None;

        for transport in self.transports.iter().filter(|t| t.is_available()) {
            let kind = transport.kind();
            match transport.publish(data) {
                Ok(token) => {
                    if kind == TransportKind::Url {
                        share_url = Some(token);
                    }
                    delivered.push(kind);
                }
                Err(e) => {
                    log::warn!("{} transport failed: {}", kind, e);
                    failures.push((kind, e));
                }
            }
        }

        let status = if delivered.is_empty() {
            log::warn!("⚠️ No automatic sync available, falling back to manual code");
            SyncStatus::ManualOnly
        } else {
            SyncStatus::Automatic
        };

        Ok(PublishReport {
            status,
            delivered,
            failures,
            share_url,
            manual_code: self.manual.create_code(data)?,
        })
    }

    /// First record any transport resolves `token` to, manual code last
    pub fn fetch(&self, token: &str) -> Option<SyncedGameData> {
        self.transports
            .iter()
            .find_map(|t| t.fetch(token))
            .or_else(|| self.manual.fetch(token))
    }

    /// Live updates from every transport that can push, including ones
    /// that only become available later (peer links attached after joining)
    pub fn subscribe(&self, callback: SyncCallback) -> Subscription {
        let parts: Vec<Subscription> = self
            .transports
            .iter()
            .filter_map(|t| t.subscribe(callback.clone()))
            .collect();
        log::debug!("Watching {} transport(s)", parts.len());
        Subscription::merge(parts)
    }
}

impl std::fmt::Debug for SyncHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHub")
            .field("transports", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::StateGenerator;
    use crate::sync::peer::PeerTransport;
    use std::cell::{Cell, RefCell};

    /// Scripted transport
    struct Fake {
        kind: TransportKind,
        available: bool,
        fail: bool,
        published: Cell<usize>,
        stored: RefCell<Option<SyncedGameData>>,
    }

    impl Fake {
        fn new(kind: TransportKind, available: bool, fail: bool) -> Rc<Self> {
            Rc::new(Self {
                kind,
                available,
                fail,
                published: Cell::new(0),
                stored: RefCell::new(None),
            })
        }
    }

    impl SyncTransport for Fake {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn publish(&self, data: &SyncedGameData) -> Result<String> {
            self.published.set(self.published.get() + 1);
            if self.fail {
                return Err(GameError::transport(self.kind.name(), "scripted failure"));
            }
            *self.stored.borrow_mut() = Some(data.clone());
            Ok(format!("{}-token", self.kind))
        }

        fn fetch(&self, token: &str) -> Option<SyncedGameData> {
            (token == format!("{}-token", self.kind))
                .then(|| self.stored.borrow().clone())
                .flatten()
        }
    }

    fn record() -> SyncedGameData {
        let empty: [&str; 0] = [];
        let state = StateGenerator::default()
            .generate("ABCDCF2", 2, "Food", 5, &empty)
            .unwrap();
        SyncedGameData::new(state, "h0st", 1_700_000_000_000)
    }

    #[test]
    fn test_chain_order() {
        let hub = SyncHub::new(ManualTransport::default())
            .with(Fake::new(TransportKind::Peer, true, false))
            .with(Fake::new(TransportKind::Url, true, false))
            .with(Fake::new(TransportKind::Channel, true, false))
            .with(Fake::new(TransportKind::LocalBroadcast, true, false))
            .with(Fake::new(TransportKind::Manual, true, false));
        assert_eq!(
            hub.kinds(),
            vec![
                TransportKind::Channel,
                TransportKind::LocalBroadcast,
                TransportKind::Url,
                TransportKind::Peer,
            ]
        );
    }

    #[test]
    fn test_publish_skips_unavailable_and_reports_failures() {
        let channel = Fake::new(TransportKind::Channel, true, true);
        let url = Fake::new(TransportKind::Url, true, false);
        let peer = Fake::new(TransportKind::Peer, false, false);
        let hub = SyncHub::new(ManualTransport::default())
            .with(channel.clone())
            .with(url.clone())
            .with(peer.clone());

        let report = hub.publish(&record()).unwrap();
        assert!(report.is_automatic());
        assert_eq!(report.delivered, vec![TransportKind::Url]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, TransportKind::Channel);
        assert_eq!(report.share_url.as_deref(), Some("url-token"));
        assert_eq!(peer.published.get(), 0);
        assert_eq!(hub.fetch(&report.manual_code), Some(record()));
        assert_eq!(hub.fetch("url-token"), Some(record()));
    }

    #[test]
    fn test_degrades_to_manual() {
        let hub = SyncHub::new(ManualTransport::default())
            .with(Fake::new(TransportKind::Channel, true, true))
            .with(Rc::new(PeerTransport::new("ABCDCF2")));
        assert_eq!(hub.status(), SyncStatus::Automatic);

        let report = hub.publish(&record()).unwrap();
        assert_eq!(report.status, SyncStatus::ManualOnly);
        assert!(report.failures[0].1.should_fall_back_to_manual());
        assert!(!report.manual_code.is_empty());

        let empty = SyncHub::new(ManualTransport::default());
        assert_eq!(empty.status(), SyncStatus::ManualOnly);
        let report = empty.publish(&record()).unwrap();
        assert_eq!(report.status, SyncStatus::ManualOnly);
        assert_eq!(empty.fetch(&report.manual_code), Some(record()));
    }

    #[test]
    fn test_subscribe_fans_in() {
        let hub = SyncHub::new(ManualTransport::default())
            .with(Fake::new(TransportKind::Url, true, false));
        // Fake cannot push, so nothing is subscribed but the handle still works
        let sub = hub.subscribe(Rc::new(|_: SyncedGameData| {}));
        sub.unsubscribe();
        assert!(!sub.is_active());
    }
}
