//! Error types for the impostor game core
//!
//! Nothing in this crate is fatal. Every failure resolves to one of:
//! - "no data" (decode failures, stale games)
//! - "operation rejected" (roster capacity / duplicate names)
//! - "degrade to manual sync" (transport unavailable)
//!
//! The variants carry enough detail for logging; `user_message()` is what
//! the UI should show.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, GameError>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Decoding (1xx)
    DecodeFailure = 100,
    InvalidGameCode = 101,
    InvalidSettings = 102,

    // Roster (2xx)
    DuplicateName = 200,
    CapacityExceeded = 201,
    StaleGame = 202,

    // Sync (3xx)
    TransportUnavailable = 300,

    // Storage (4xx)
    StorageError = 400,
    SerializationError = 401,

    // Internal (9xx)
    InvalidState = 900,
}

/// Main error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    // ===== Decoding =====
    #[error("Decode failure: {0}")]
    Decode(String),

    #[error("Invalid game code: {0}")]
    InvalidCode(String),

    #[error("Invalid game settings: {0}")]
    InvalidSettings(String),

    // ===== Roster =====
    #[error("Player name already taken: {0}")]
    DuplicateName(String),

    #[error("Game is full ({capacity} players)")]
    CapacityExceeded { capacity: usize },

    #[error("Game not found or expired: {0}")]
    StaleGame(String),

    // ===== Sync =====
    #[error("Transport unavailable ({transport}): {reason}")]
    TransportUnavailable { transport: String, reason: String },

    // ===== Storage =====
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Internal =====
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GameError {
    /// Shorthand for a transport failure
    pub fn transport(transport: &str, reason: impl Into<String>) -> Self {
        GameError::TransportUnavailable {
            transport: transport.to_string(),
            reason: reason.into(),
        }
    }

    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            GameError::Decode(_) => ErrorCode::DecodeFailure,
            GameError::InvalidCode(_) => ErrorCode::InvalidGameCode,
            GameError::InvalidSettings(_) => ErrorCode::InvalidSettings,
            GameError::DuplicateName(_) => ErrorCode::DuplicateName,
            GameError::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            GameError::StaleGame(_) => ErrorCode::StaleGame,
            GameError::TransportUnavailable { .. } => ErrorCode::TransportUnavailable,
            GameError::Storage(_) => ErrorCode::StorageError,
            GameError::Serialization(_) => ErrorCode::SerializationError,
            GameError::InvalidState(_) => ErrorCode::InvalidState,
        }
    }

    /// Whether the caller should offer the manual sync code instead
    pub fn should_fall_back_to_manual(&self) -> bool {
        matches!(
            self,
            GameError::TransportUnavailable { .. } | GameError::Storage(_)
        )
    }

    /// Whether the player has to change their input (name, code) to proceed
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            GameError::InvalidCode(_)
                | GameError::InvalidSettings(_)
                | GameError::DuplicateName(_)
                | GameError::CapacityExceeded { .. }
                | GameError::StaleGame(_)
        )
    }

    /// Get a user-friendly message for display
    pub fn user_message(&self) -> String {
        match self {
            GameError::Decode(_) => {
                "That sync code could not be read. Please copy it again.".into()
            }
            GameError::InvalidCode(_) => {
                "That game code is not valid. Codes are 6 or 7 letters and digits.".into()
            }
            GameError::InvalidSettings(_) => {
                "Those game settings are not supported.".into()
            }
            GameError::DuplicateName(name) => {
                format!("The name \"{}\" is already taken in this game.", name)
            }
            GameError::CapacityExceeded { capacity } => {
                format!("This game is full ({} players).", capacity)
            }
            GameError::StaleGame(_) => {
                "This game does not exist or has expired.".into()
            }
            GameError::TransportUnavailable { .. } => {
                "Could not sync automatically. Use the manual sync code instead.".into()
            }
            GameError::Storage(_) => {
                "Could not save game data. Please check browser storage permissions.".into()
            }
            GameError::Serialization(_) => "Game data could not be encoded.".into(),
            GameError::InvalidState(_) => {
                "The game is in an unexpected state. Please start a new game.".into()
            }
        }
    }
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        GameError::Serialization(err.to_string())
    }
}

impl From<GameError> for JsValue {
    fn from(err: GameError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Error information for JavaScript consumption
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
    pub user_message: String,
    pub fall_back_to_manual: bool,
    pub requires_user_action: bool,
}

impl From<&GameError> for ErrorInfo {
    fn from(err: &GameError) -> Self {
        ErrorInfo {
            code: err.code() as u32,
            message: err.to_string(),
            user_message: err.user_message(),
            fall_back_to_manual: err.should_fall_back_to_manual(),
            requires_user_action: err.requires_user_action(),
        }
    }
}
