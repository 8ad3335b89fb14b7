//! Same-browser sync through the game record itself.
//!
//! Publishing saves the record through the [`RosterStore`], whose notifier
//! announces the write to this document and to the other tabs.

use super::{Subscription, SyncCallback, SyncTransport, TransportKind};
use crate::error::{GameError, Result};
use crate::roster::{RosterStore, SyncedGameData};

pub struct LocalBroadcastTransport {
    code: String,
    roster: RosterStore,
}

impl LocalBroadcastTransport {
    /// `roster` needs a notifier for the transport to be available
    pub fn new(code: &str, roster: RosterStore) -> Self {
        Self {
            code: code.to_string(),
            roster,
        }
    }
}

impl SyncTransport for LocalBroadcastTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::LocalBroadcast
    }

    fn is_available(&self) -> bool {
        self.roster.notifier().is_some()
    }

    fn publish(&self, data: &SyncedGameData) -> Result<String> {
        if !self.is_available() {
            return Err(GameError::transport(
                TransportKind::LocalBroadcast.name(),
                "no change notifier",
            ));
        }
        self.roster.save(&self.code, data)?;
        Ok(self.code.clone())
    }

    /// `token` is a game code
    fn fetch(&self, token: &str) -> Option<SyncedGameData> {
        self.roster.load(token)
    }

    fn subscribe(&self, callback: SyncCallback) -> Option<Subscription> {
        let notifier = self.roster.notifier()?;
        let key = self.roster.config().storage_key(&self.code);
        let roster = self.roster.clone();
        let code = self.code.clone();

        Some(notifier.listen(Box::new(move |changed: &str| {
            if changed != key {
                return;
            }
            if let Some(data) = roster.load(&code) {
                callback(data);
            }
        })))
    }
}
