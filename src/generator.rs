//! Reproducible game state from a shared code.
//!
//! Every device runs the same derivation on the same inputs, so no device
//! ever has to tell another who the impostor is.
//!
//! ## Key templates
//!
//! | draw            | key                                          | bound                      |
//! |-----------------|----------------------------------------------|----------------------------|
//! | impostor        | `{code}-impostor-{round}-{a\|b\|c}`          | roster size, else players  |
//! | word            | `{code}-word-{category}-{round}`             | words in category          |
//! | starting player | `{code}-start-{round}`                       | players                    |
//! | random category | `{code}-category-{round}`                    | categories in bank         |
//! | player id       | `{code}-player-{trimmed lowercase name}`     | 1 000 000                  |
//!
//! The roster part of the impostor key is the UTF-16-sorted name list joined
//! with `|`; it is empty for pass-and-play games with no names. Changing any
//! template changes the outcome of every code already shared.

use serde::{Deserialize, Serialize};

use crate::code::GameCodeCodec;
use crate::config::{MAX_PLAYERS, MIN_PLAYERS};
use crate::derive::{bounded_int, pick_one, sorted_names, DeterministicStream};
use crate::error::{GameError, Result};
use crate::words::{WordBank, RANDOM_CATEGORY};

/// Upper bound (exclusive) of derived player ids
pub const PLAYER_ID_SPACE: u32 = 1_000_000;

/// Full state of one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub players: u32,
    pub round: u32,
    pub category: String,
    pub active_player: Option<u32>,
    pub revealed: bool,
    pub impostor_index: u32,
    pub chosen_word: String,
    pub start_player_index: u32,
    pub game_started: bool,
}

impl GameState {
    /// Whether the player at `index` is the impostor
    pub fn is_impostor(&self, index: u32) -> bool {
        index == self.impostor_index
    }

    /// Word shown to the player at `index`, `None` for the impostor
    pub fn word_for(&self, index: u32) -> Option<&str> {
        if self.is_impostor(index) || index >= self.players {
            None
        } else {
            Some(&self.chosen_word)
        }
    }
}

pub(crate) fn impostor_key(code: &str, round: u32, sorted_roster: &[String]) -> String {
    format!("{}-impostor-{}-{}", code, round, sorted_roster.join("|"))
}

pub(crate) fn word_key(code: &str, category: &str, round: u32) -> String {
    format!("{}-word-{}-{}", code, category, round)
}

pub(crate) fn start_key(code: &str, round: u32) -> String {
    format!("{}-start-{}", code, round)
}

pub(crate) fn category_key(code: &str, round: u32) -> String {
    format!("{}-category-{}", code, round)
}

pub(crate) fn player_key(code: &str, name: &str) -> String {
    format!("{}-player-{}", code, normalize_name(name))
}

/// Trimmed, lowercased name used for identity hashing
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Derives game state from `(code, round, category, players, roster)`
#[derive(Debug, Clone, Default)]
pub struct StateGenerator {
    bank: WordBank,
}

impl StateGenerator {
    pub fn new(bank: WordBank) -> Self {
        Self { bank }
    }

    pub fn word_bank(&self) -> &WordBank {
        &self.bank
    }

    /// Derive the full state for one round.
    ///
    /// `roster` may be empty (pass-and-play). Its order does not matter; it
    /// is sorted before hashing. A non-empty roster must not be larger than
    /// `players`.
    pub fn generate<S: AsRef<str>>(
        &self,
        code: &str,
        round: u32,
        category: &str,
        players: u32,
        roster: &[S],
    ) -> Result<GameState> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players) {
            return Err(GameError::InvalidSettings(format!(
                "players must be {}..={}, got {}",
                MIN_PLAYERS, MAX_PLAYERS, players
            )));
        }
        if round < 1 {
            return Err(GameError::InvalidSettings("round must be >= 1".into()));
        }
        if roster.len() > players as usize {
            return Err(GameError::CapacityExceeded {
                capacity: players as usize,
            });
        }

        let category = self.resolve_category(code, round, category);
        let sorted = sorted_names(roster);

        let impostor_index = self.impostor_index(code, round, players, &sorted);
        let chosen_word = self.word(code, &category, round);
        let start_player_index = self.start_player_index(code, round, players);

        log::debug!(
            "Derived round {} of {} ({} players, {})",
            round,
            code,
            players,
            category
        );

        Ok(GameState {
            players,
            round,
            category,
            active_player: None,
            revealed: false,
            impostor_index,
            chosen_word,
            start_player_index,
            game_started: false,
        })
    }

    /// Derive the state straight from a 7-character code
    pub fn generate_from_code<S: AsRef<str>>(&self, code: &str, roster: &[S]) -> Result<GameState> {
        let data = GameCodeCodec::decode(code)
            .ok_or_else(|| GameError::InvalidCode(code.to_string()))?;
        self.generate(code, data.round, &data.category, data.players, roster)
    }

    /// Same code, next round: fresh impostor, word and starting player
    pub fn next_round<S: AsRef<str>>(
        &self,
        code: &str,
        state: &GameState,
        roster: &[S],
    ) -> Result<GameState> {
        self.generate(code, state.round + 1, &state.category, state.players, roster)
    }

    /// Whether `name` is the impostor among `all_names`.
    ///
    /// Position is taken in the sorted roster; `false` if `name` is absent.
    pub fn is_player_impostor<S: AsRef<str>>(
        &self,
        code: &str,
        name: &str,
        all_names: &[S],
        round: u32,
    ) -> bool {
        let sorted = sorted_names(all_names);
        let Some(position) = sorted.iter().position(|n| n == name) else {
            return false;
        };
        let impostor = self.impostor_index(code, round, sorted.len() as u32, &sorted);
        position as u32 == impostor
    }

    /// Stable per-player id; same for every device given the same name
    pub fn player_id(&self, code: &str, name: &str) -> u32 {
        let mut stream = DeterministicStream::from_key(&player_key(code, name));
        bounded_int(&mut stream, PLAYER_ID_SPACE)
    }

    fn impostor_index(
        &self,
        code: &str,
        round: u32,
        players: u32,
        sorted_roster: &[String],
    ) -> u32 {
        let bound = if sorted_roster.is_empty() {
            players
        } else {
            sorted_roster.len() as u32
        };
        let mut stream = DeterministicStream::from_key(&impostor_key(code, round, sorted_roster));
        bounded_int(&mut stream, bound)
    }

    fn word(&self, code: &str, category: &str, round: u32) -> String {
        let mut stream = DeterministicStream::from_key(&word_key(code, category, round));
        pick_one(&mut stream, self.bank.words(category))
            .cloned()
            .unwrap_or_default()
    }

    fn start_player_index(&self, code: &str, round: u32, players: u32) -> u32 {
        let mut stream = DeterministicStream::from_key(&start_key(code, round));
        bounded_int(&mut stream, players)
    }

    /// Known categories pass through, the random sentinel is drawn from the
    /// code, anything else becomes the bank's default category
    fn resolve_category(&self, code: &str, round: u32, category: &str) -> String {
        if category == RANDOM_CATEGORY {
            let categories = self.bank.categories();
            let mut stream = DeterministicStream::from_key(&category_key(code, round));
            return pick_one(&mut stream, &categories)
                .map(|c| c.to_string())
                .unwrap_or_else(|| self.bank.default_category().to_string());
        }
        self.bank.resolve(category).0.to_string()
    }
}
