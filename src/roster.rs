//! Per-game records persisted in local storage.
//!
//! Each game lives under `{storage_prefix}{code}` as JSON. Records expire
//! `retention_ms` after their last write; [`RosterStore::sweep`] removes
//! expired and unreadable records.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::error::{GameError, Result};
use crate::generator::GameState;
use crate::notify::ChangeNotifier;
use crate::runtime::Clock;
use crate::storage::KeyValueStore;

/// Everything a device needs to join a game in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedGameData {
    pub game_state: GameState,
    /// Names in join order
    pub player_names: Vec<String>,
    /// Milliseconds since the Unix epoch
    pub last_updated: u64,
    pub host_id: String,
}

impl SyncedGameData {
    pub fn new(game_state: GameState, host_id: impl Into<String>, now_ms: u64) -> Self {
        Self {
            game_state,
            player_names: Vec::new(),
            last_updated: now_ms,
            host_id: host_id.into(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.game_state.players as usize
    }

    pub fn is_full(&self) -> bool {
        self.player_names.len() >= self.capacity()
    }

    /// Append `name`. Names are compared exactly (case-sensitive).
    pub fn add_player(&mut self, name: &str, now_ms: u64) -> Result<()> {
        if self.player_names.iter().any(|n| n == name) {
            return Err(GameError::DuplicateName(name.to_string()));
        }
        if self.is_full() {
            return Err(GameError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        self.player_names.push(name.to_string());
        self.last_updated = now_ms;
        Ok(())
    }

    /// Remove the first exact match; `false` (and no refresh) if absent
    pub fn remove_player(&mut self, name: &str, now_ms: u64) -> bool {
        match self.player_names.iter().position(|n| n == name) {
            Some(index) => {
                self.player_names.remove(index);
                self.last_updated = now_ms;
                true
            }
            None => false,
        }
    }

    /// Record has not been refreshed within the retention window
    pub fn is_stale(&self, now_ms: u64, retention_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_updated) >= retention_ms
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize game data: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| GameError::Serialization(format!("Failed to parse game data: {}", e)))
    }
}

/// Local-storage backed game records
#[derive(Clone)]
pub struct RosterStore {
    store: Rc<dyn KeyValueStore>,
    clock: Rc<dyn Clock>,
    notifier: Option<Rc<dyn ChangeNotifier>>,
    config: SyncConfig,
}

impl RosterStore {
    pub fn new(store: Rc<dyn KeyValueStore>, clock: Rc<dyn Clock>, config: SyncConfig) -> Self {
        Self {
            store,
            clock,
            notifier: None,
            config,
        }
    }

    /// Announce every save through `notifier`
    pub fn with_notifier(mut self, notifier: Rc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn notifier(&self) -> Option<Rc<dyn ChangeNotifier>> {
        self.notifier.clone()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Write the record for `code` and announce the change
    pub fn save(&self, code: &str, data: &SyncedGameData) -> Result<()> {
        self.save_quietly(code, data)?;
        let key = self.config.storage_key(code);
        log::debug!(
            "Saved {} ({} of {} players)",
            code,
            data.player_names.len(),
            data.game_state.players
        );
        if let Some(notifier) = &self.notifier {
            notifier.notify(&key);
        }
        Ok(())
    }

    /// Write the record without announcing it
    pub fn save_quietly(&self, code: &str, data: &SyncedGameData) -> Result<()> {
        self.store
            .set(&self.config.storage_key(code), &data.to_json()?)
    }

    /// Stored record for `code`; unreadable records count as absent
    pub fn load(&self, code: &str) -> Option<SyncedGameData> {
        let json = match self.store.get(&self.config.storage_key(code)) {
            Ok(json) => json?,
            Err(e) => {
                log::warn!("Failed to read game {}: {}", code, e);
                return None;
            }
        };
        match SyncedGameData::from_json(&json) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("Ignoring corrupt record for {}: {}", code, e);
                None
            }
        }
    }

    /// Stored record for `code` if it is still within the retention window
    pub fn load_active(&self, code: &str) -> Option<SyncedGameData> {
        self.load(code)
            .filter(|data| !data.is_stale(self.now_ms(), self.config.retention_ms))
    }

    pub fn delete(&self, code: &str) -> Result<()> {
        self.store.remove(&self.config.storage_key(code))
    }

    /// Add `name` to the live game `code`.
    ///
    /// `false` when the name is taken, the game is full, or there is no live
    /// record. Nothing is written in those cases.
    pub fn add(&self, code: &str, name: &str) -> bool {
        let Some(mut data) = self.load_active(code) else {
            log::debug!("No live game {} to join", code);
            return false;
        };
        if let Err(e) = data.add_player(name, self.now_ms()) {
            log::debug!("{} cannot join {}: {}", name, code, e);
            return false;
        }
        self.save_logged(code, &data)
    }

    /// Remove `name` from game `code`. Absent names cause no write.
    pub fn remove(&self, code: &str, name: &str) -> bool {
        let Some(mut data) = self.load(code) else {
            return false;
        };
        if !data.remove_player(name, self.now_ms()) {
            return false;
        }
        self.save_logged(code, &data)
    }

    /// A record exists for `code` and was refreshed within the window
    pub fn is_active(&self, code: &str) -> bool {
        self.load_active(code).is_some()
    }

    /// Delete every expired or unreadable game record, and the channel
    /// backup copies alongside them; returns how many
    pub fn sweep(&self) -> usize {
        let mut keys = Vec::new();
        for prefix in [&self.config.storage_prefix, &self.config.sync_prefix] {
            match self.store.keys_with_prefix(prefix) {
                Ok(found) => keys.extend(found),
                Err(e) => log::warn!("Sweep of {}* skipped: {}", prefix, e),
            }
        }

        let now = self.now_ms();
        let mut removed = 0;
        for key in keys {
            let expired = match self.store.get(&key) {
                Ok(Some(json)) => match SyncedGameData::from_json(&json) {
                    Ok(data) => now.saturating_sub(data.last_updated) > self.config.retention_ms,
                    Err(_) => true,
                },
                Ok(None) => false,
                Err(_) => true,
            };
            if expired && self.store.remove(&key).is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            log::info!("🧹 Removed {} expired game record(s)", removed);
        }
        removed
    }

    fn save_logged(&self, code: &str, data: &SyncedGameData) -> bool {
        match self.save(code, data) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to save game {}: {}", code, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RETENTION_WINDOW_MS;
    use crate::generator::StateGenerator;
    use crate::notify::MemoryNotifier;
    use crate::runtime::ManualClock;
    use crate::storage::MemoryStorage;
    use std::cell::RefCell;

    const HOUR_MS: u64 = 60 * 60 * 1000;
    const NOW: u64 = 1_700_000_000_000;

    struct Fixture {
        storage: Rc<MemoryStorage>,
        clock: Rc<ManualClock>,
        roster: RosterStore,
    }

    fn fixture() -> Fixture {
        let storage = Rc::new(MemoryStorage::new());
        let clock = Rc::new(ManualClock::new(NOW));
        let roster = RosterStore::new(storage.clone(), clock.clone(), SyncConfig::default());
        Fixture {
            storage,
            clock,
            roster,
        }
    }

    fn record(players: u32, last_updated: u64) -> SyncedGameData {
        let empty: [&str; 0] = [];
        let state = StateGenerator::default()
            .generate("ABCDAF1", 1, "Food", players, &empty)
            .unwrap();
        SyncedGameData::new(state, "host-1", last_updated)
    }

    #[test]
    fn test_add_rejects_duplicates_and_overflow() {
        let f = fixture();
        f.roster.save("ABCDAF1", &record(3, NOW)).unwrap();

        assert!(f.roster.add("ABCDAF1", "Ana"));
        assert!(!f.roster.add("ABCDAF1", "Ana"));
        assert!(f.roster.add("ABCDAF1", "ana"));
        assert!(f.roster.add("ABCDAF1", "Ben"));
        assert!(!f.roster.add("ABCDAF1", "Cy"));

        let data = f.roster.load("ABCDAF1").unwrap();
        assert_eq!(data.player_names, vec!["Ana", "ana", "Ben"]);
        assert!(data.player_names.len() <= data.capacity());
    }

    #[test]
    fn test_add_without_record() {
        let f = fixture();
        assert!(!f.roster.add("NOPE123", "Ana"));
        assert!(f.storage.is_empty());
    }

    #[test]
    fn test_add_refreshes_last_updated() {
        let f = fixture();
        f.roster.save("ABCDAF1", &record(5, NOW)).unwrap();
        f.clock.advance(1_000);
        assert!(f.roster.add("ABCDAF1", "Ana"));
        assert_eq!(f.roster.load("ABCDAF1").unwrap().last_updated, NOW + 1_000);
    }

    #[test]
    fn test_remove_absent_name_writes_nothing() {
        let f = fixture();
        let mut data = record(5, NOW);
        data.add_player("Ana", NOW).unwrap();
        f.roster.save("ABCDAF1", &data).unwrap();

        f.clock.advance(5_000);
        assert!(!f.roster.remove("ABCDAF1", "Zed"));
        assert_eq!(f.roster.load("ABCDAF1").unwrap().last_updated, NOW);

        assert!(f.roster.remove("ABCDAF1", "Ana"));
        let data = f.roster.load("ABCDAF1").unwrap();
        assert!(data.player_names.is_empty());
        assert_eq!(data.last_updated, NOW + 5_000);
    }

    #[test]
    fn test_staleness() {
        let f = fixture();
        f.roster.save("OLD0AF1", &record(5, NOW - 25 * HOUR_MS)).unwrap();
        f.roster.save("NEW0AF1", &record(5, NOW - HOUR_MS)).unwrap();

        assert!(!f.roster.is_active("OLD0AF1"));
        assert!(f.roster.is_active("NEW0AF1"));
        assert!(!f.roster.add("OLD0AF1", "Ana"));

        assert_eq!(f.roster.sweep(), 1);
        assert!(f.roster.load("OLD0AF1").is_none());
        assert!(f.roster.load("NEW0AF1").is_some());
    }

    #[test]
    fn test_sweep_removes_corrupt_and_ignores_other_keys() {
        let f = fixture();
        f.storage.set("impostor-game-BROKEN1", "{not json").unwrap();
        f.storage.set("impostor-sync-OLD0AF1", "{}").unwrap();
        f.storage.set("theme", "dark").unwrap();

        assert!(f.roster.load("BROKEN1").is_none());
        assert_eq!(f.roster.sweep(), 2);
        assert_eq!(f.storage.len(), 1);
        assert_eq!(f.storage.get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_sweep_expires_channel_backups() {
        let f = fixture();
        let config = SyncConfig::default();
        f.roster.save("ABCDAF1", &record(5, NOW)).unwrap();
        let backup = record(5, NOW).to_json().unwrap();
        f.storage.set(&config.sync_key("ABCDAF1"), &backup).unwrap();
        f.storage.set(&config.sync_key("FRESHF1"), &backup).unwrap();

        f.clock.advance(72 * 60 * 60 * 1000);
        let fresh = record(5, f.clock.now_ms()).to_json().unwrap();
        f.storage.set(&config.sync_key("FRESHF1"), &fresh).unwrap();

        assert_eq!(f.roster.sweep(), 2);
        assert_eq!(f.storage.keys().unwrap(), vec![config.sync_key("FRESHF1")]);
    }

    #[test]
    fn test_sweep_boundary() {
        let f = fixture();
        f.roster
            .save("EDGEAF1", &record(5, NOW - RETENTION_WINDOW_MS))
            .unwrap();
        assert!(!f.roster.is_active("EDGEAF1"));
        assert_eq!(f.roster.sweep(), 0);
    }

    #[test]
    fn test_save_notifies() {
        let f = fixture();
        let notifier = Rc::new(MemoryNotifier::new());
        let roster = f.roster.clone().with_notifier(notifier.clone());
        let keys = Rc::new(RefCell::new(Vec::new()));
        let k = keys.clone();
        let _sub = notifier.listen(Box::new(move |key| k.borrow_mut().push(key.to_string())));

        roster.save("ABCDAF1", &record(5, NOW)).unwrap();
        assert!(roster.add("ABCDAF1", "Ana"));
        assert!(!roster.add("ABCDAF1", "Ana"));

        assert_eq!(*keys.borrow(), vec!["impostor-game-ABCDAF1"; 2]);
    }

    #[test]
    fn test_wire_format() {
        let data = record(5, NOW);
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("gameState").is_some());
        assert!(json.get("playerNames").is_some());
        assert_eq!(json["lastUpdated"], NOW);
        assert_eq!(json["hostId"], "host-1");
        assert_eq!(SyncedGameData::from_json(&data.to_json().unwrap()).unwrap(), data);
    }
}
