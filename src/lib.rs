//! # Impostor WASM
//!
//! A serverless multi-device "impostor" word game compiled to WebAssembly.
//!
//! Every device derives the same round from the same inputs, so the only
//! thing that ever travels between devices is a small game record.
//!
//! ## Architecture
//!
//! ```text
//! ImpostorClient (WASM)
//!   ↓
//! MultiplayerSession ── StateGenerator ── derive (hash → stream → select)
//!   ↓                        ↑
//! RosterStore           GameCodeCodec
//!   ↓
//! SyncHub: channel → local broadcast → URL → peer → manual code
//! ```
//!
//! ## Features
//!
//! - **No server**: game state is derived, never assigned
//! - **Shareable codes**: 7 characters carry player count, category and round
//! - **Graceful sync**: automatic transports first, copy/paste codes always work
//! - **Portable core**: derivation, codes and rosters run natively for tests

use wasm_bindgen::prelude::*;

// Modules
pub mod code;
pub mod config;
pub mod derive;
mod error;
pub mod generator;
pub mod notify;
pub mod roster;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod sync;
pub mod words;

#[cfg(target_arch = "wasm32")]
pub mod client;

pub use code::{GameCodeCodec, GameCodeData, CATEGORY_CODES, CODE_LEN, LEGACY_CODE_LEN, MAX_ROUND};
pub use config::{SyncConfig, MAX_PLAYERS, MIN_PLAYERS, RETENTION_WINDOW_MS};
pub use derive::{bounded_int, pick_one, seed_hash, DeterministicStream};
pub use error::{ErrorCode, ErrorInfo, GameError, Result};
pub use generator::{GameState, StateGenerator};
pub use notify::{ChangeNotifier, MemoryNotifier, Subscription};
pub use roster::{RosterStore, SyncedGameData};
pub use runtime::{Clock, ManualClock, ManualScheduler, Scheduler, SystemClock, TimerHandle};
pub use session::{GameMode, MultiplayerSession, MultiplayerState, SyncContext};
pub use storage::{KeyValueStore, MemoryStorage};
pub use sync::{
    create_sync_code, detect_shared_game, parse_sync_code, PublishReport, SyncHub, SyncStatus,
    SyncTransport, TransportKind, UrlStyle,
};
pub use words::{WordBank, DEFAULT_CATEGORY, RANDOM_CATEGORY};

#[cfg(target_arch = "wasm32")]
pub use client::ImpostorClient;

/// Initialize the module
///
/// This sets up logging. A second initialization (tests, hot reload) keeps
/// the existing logger.
#[wasm_bindgen(start)]
pub fn init() {
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("Logger already initialized");
    }

    log::info!("Impostor WASM initialized");
}
