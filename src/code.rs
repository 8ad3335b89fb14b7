//! Shareable game codes
//!
//! ## Format
//!
//! ```text
//!  C C C C  P  G  R
//!  └──┬──┘  │  │  └─ round: '1'..='9' → 1..=9, 'A'..='Z' → 10..=35
//!     │     │  └──── category letter (static table below)
//!     │     └─────── players: 'A' + (players - 3), so 3..=20 → 'A'..='R'
//!     └───────────── cosmetic entropy, carries no settings
//! ```
//!
//! Legacy 6-character codes are opaque random strings. They pass format
//! validation but cannot be decoded into settings.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_PLAYERS, MIN_PLAYERS};
use crate::error::{GameError, Result};
use crate::words::RANDOM_CATEGORY;

/// Characters allowed anywhere in a code
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a settings-bearing code
pub const CODE_LEN: usize = 7;

/// Length of a legacy opaque code
pub const LEGACY_CODE_LEN: usize = 6;

/// Length of the cosmetic prefix
pub const PREFIX_LEN: usize = 4;

/// Highest round a single character can carry
pub const MAX_ROUND: u32 = 35;

/// Category name ↔ code letter
pub const CATEGORY_CODES: &[(&str, char)] = &[
    ("Everyday", 'E'),
    ("Food", 'F'),
    ("Places", 'P'),
    ("Animals", 'A'),
    ("Sports", 'S'),
    ("Technology", 'T'),
    ("Transportation", 'R'),
    ("Professions", 'O'),
    ("Clothing", 'C'),
    ("Weather", 'W'),
    ("Music", 'M'),
    ("Emotions", 'N'),
    ("Colors", 'L'),
    ("School", 'H'),
    ("Movies", 'V'),
    (RANDOM_CATEGORY, 'Z'),
];

/// Settings carried by a 7-character code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCodeData {
    /// Cosmetic 4-character prefix
    pub prefix: String,
    pub players: u32,
    pub category: String,
    pub round: u32,
}

impl GameCodeData {
    /// The full 7-character code
    pub fn code(&self) -> String {
        // Fields were validated when this value was built
        let mut code = self.prefix.clone();
        code.push(player_char(self.players).unwrap_or('?'));
        code.push(GameCodeCodec::category_letter(&self.category).unwrap_or('?'));
        code.push(round_char(self.round).unwrap_or('?'));
        code
    }
}

/// Encoder/decoder for game codes
pub struct GameCodeCodec;

impl GameCodeCodec {
    /// Encode settings behind a fresh random prefix
    pub fn encode(players: u32, category: &str, round: u32) -> Result<GameCodeData> {
        let prefix = random_code(PREFIX_LEN);
        Self::encode_with_prefix(&prefix, players, category, round)
    }

    /// Encode settings behind a caller-chosen prefix
    pub fn encode_with_prefix(
        prefix: &str,
        players: u32,
        category: &str,
        round: u32,
    ) -> Result<GameCodeData> {
        if prefix.len() != PREFIX_LEN || !is_code_text(prefix) {
            return Err(GameError::InvalidSettings(format!(
                "prefix must be {} characters from A-Z0-9: {:?}",
                PREFIX_LEN, prefix
            )));
        }
        if player_char(players).is_none() {
            return Err(GameError::InvalidSettings(format!(
                "players must be {}..={}, got {}",
                MIN_PLAYERS, MAX_PLAYERS, players
            )));
        }
        if Self::category_letter(category).is_none() {
            return Err(GameError::InvalidSettings(format!(
                "unknown category: {}",
                category
            )));
        }
        if round_char(round).is_none() {
            return Err(GameError::InvalidSettings(format!(
                "round must be 1..={}, got {}",
                MAX_ROUND, round
            )));
        }

        Ok(GameCodeData {
            prefix: prefix.to_string(),
            players,
            category: category.to_string(),
            round,
        })
    }

    /// Decode a 7-character code. Anything malformed yields `None`.
    pub fn decode(code: &str) -> Option<GameCodeData> {
        if code.len() != CODE_LEN || !is_code_text(code) {
            return None;
        }
        let bytes = code.as_bytes();

        let players = (bytes[4] as u32).checked_sub(b'A' as u32)? + MIN_PLAYERS;
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players) {
            return None;
        }

        let category = Self::category_for_letter(bytes[5] as char)?;

        let round = match bytes[6] {
            b @ b'0'..=b'9' => (b - b'0') as u32,
            b @ b'A'..=b'Z' => (b - b'A') as u32 + 10,
            _ => return None,
        };
        if round < 1 {
            return None;
        }

        Some(GameCodeData {
            prefix: code[..PREFIX_LEN].to_string(),
            players,
            category: category.to_string(),
            round,
        })
    }

    /// `^[A-Z0-9]{6,7}$`
    pub fn is_valid_format(code: &str) -> bool {
        (code.len() == CODE_LEN || code.len() == LEGACY_CODE_LEN) && is_code_text(code)
    }

    /// Opaque 6-character code with no embedded settings
    pub fn generate_legacy_code() -> String {
        random_code(LEGACY_CODE_LEN)
    }

    pub fn category_letter(category: &str) -> Option<char> {
        CATEGORY_CODES
            .iter()
            .find(|(name, _)| *name == category)
            .map(|(_, letter)| *letter)
    }

    pub fn category_for_letter(letter: char) -> Option<&'static str> {
        CATEGORY_CODES
            .iter()
            .find(|(_, l)| *l == letter)
            .map(|(name, _)| *name)
    }
}

fn player_char(players: u32) -> Option<char> {
    if (MIN_PLAYERS..=MAX_PLAYERS).contains(&players) {
        char::from_u32('A' as u32 + (players - MIN_PLAYERS))
    } else {
        None
    }
}

fn round_char(round: u32) -> Option<char> {
    match round {
        1..=9 => char::from_digit(round, 10),
        10..=MAX_ROUND => char::from_u32('A' as u32 + (round - 10)),
        _ => None,
    }
}

fn is_code_text(text: &str) -> bool {
    text.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .filter_map(|_| CODE_ALPHABET.choose(&mut rng).map(|b| *b as char))
        .collect()
}
