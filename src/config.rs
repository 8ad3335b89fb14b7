//! Sync and persistence configuration.
//!
//! Every field has a default, so JavaScript can pass a partial object:
//! ```javascript
//! new ImpostorClient({ urlPollIntervalMs: 1000 });
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest supported table
pub const MIN_PLAYERS: u32 = 3;

/// Largest supported table
pub const MAX_PLAYERS: u32 = 20;

/// How long an unrefreshed game record stays alive (24 hours)
pub const RETENTION_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Configuration shared by the roster store and the sync transports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Local storage key prefix for game records
    pub storage_prefix: String,
    /// Local storage key prefix for the channel transport's backup copy
    pub sync_prefix: String,
    /// Broadcast channel name prefix
    pub channel_prefix: String,
    /// Records older than this are stale
    pub retention_ms: u64,
    /// URL transport poll period
    pub url_poll_interval_ms: u64,
    /// Channel transport backup poll period
    pub channel_poll_interval_ms: u64,
    /// Manual sync code group width
    pub manual_chunk_width: usize,
    /// Manual sync code group separator
    pub manual_separator: char,
    /// ICE servers for the peer transport
    pub stun_urls: Vec<String>,
    /// Peer data channel label
    pub peer_channel_label: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_prefix: "impostor-game-".to_string(),
            sync_prefix: "impostor-sync-".to_string(),
            channel_prefix: "impostor-".to_string(),
            retention_ms: RETENTION_WINDOW_MS,
            url_poll_interval_ms: 2_000,
            channel_poll_interval_ms: 3_000,
            manual_chunk_width: 4,
            manual_separator: '-',
            stun_urls: vec!["stun:stun.l.google.com:19302".to_string()],
            peer_channel_label: "gameState".to_string(),
        }
    }
}

impl SyncConfig {
    /// Local storage key holding the record for `code`
    pub fn storage_key(&self, code: &str) -> String {
        format!("{}{}", self.storage_prefix, code)
    }

    /// Local storage key holding the channel transport's copy for `code`
    pub fn sync_key(&self, code: &str) -> String {
        format!("{}{}", self.sync_prefix, code)
    }

    /// Broadcast channel name for `code`
    pub fn channel_name(&self, code: &str) -> String {
        format!("{}{}", self.channel_prefix, code)
    }

    /// Game code stored under `key`, if `key` is a game record key
    pub fn code_from_storage_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.storage_prefix.as_str())
    }

    pub fn url_poll_interval(&self) -> Duration {
        Duration::from_millis(self.url_poll_interval_ms)
    }

    pub fn channel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.channel_poll_interval_ms)
    }
}
