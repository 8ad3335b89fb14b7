//! Payload text encoding shared by the URL, manual and peer transports.
//!
//! JSON → UTF-8 → base64 with the URL-safe alphabet and no padding. Decoding
//! also accepts the standard alphabet and restores padding before decoding.
//! Every failure yields `None`.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{GameError, Result};
use crate::roster::SyncedGameData;

/// Base64 (URL-safe, unpadded) of `value`'s JSON
pub fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)
        .map_err(|e| GameError::Serialization(format!("Failed to encode payload: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(json.as_bytes()))
}

/// Inverse of [`encode_json`]
pub fn decode_json<T: DeserializeOwned>(encoded: &str) -> Option<T> {
    let mut text: String = encoded
        .trim()
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .filter(|c| *c != '=')
        .collect();
    if text.is_empty() {
        return None;
    }
    let padding = (4 - text.len() % 4) % 4;
    text.extend(std::iter::repeat('=').take(padding));

    let bytes = URL_SAFE.decode(text.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn encode_payload(data: &SyncedGameData) -> Result<String> {
    encode_json(data)
}

pub fn decode_payload(encoded: &str) -> Option<SyncedGameData> {
    decode_json(encoded)
}

/// Split `text` into `width`-character groups joined by `separator`
pub fn chunk(text: &str, width: usize, separator: char) -> String {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

/// Undo [`chunk`].
///
/// Whitespace is dropped first. The separator can also be a payload
/// character, so separators are removed by position: if every group
/// boundary holds a separator the boundaries are stripped, otherwise the
/// text is taken as unchunked.
pub fn unchunk(code: &str, width: usize, separator: char) -> String {
    let width = width.max(1);
    let chars: Vec<char> = code.chars().filter(|c| !c.is_whitespace()).collect();
    let stride = width + 1;

    let is_boundary = |i: usize| i % stride == width;
    let chunked = chars
        .iter()
        .enumerate()
        .filter(|(i, _)| is_boundary(*i))
        .all(|(_, c)| *c == separator);

    if !chunked {
        return chars.into_iter().collect();
    }
    chars
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !is_boundary(*i))
        .map(|(_, c)| c)
        .collect()
}

/// Decode a [`chunk`]ed code. Falls back to the text as pasted when the
/// stripped form does not decode, since a raw payload may hold the
/// separator at every group boundary.
pub fn decode_chunked<T: DeserializeOwned>(code: &str, width: usize, separator: char) -> Option<T> {
    let stripped = unchunk(code, width, separator);
    decode_json(&stripped).or_else(|| {
        let raw: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        if raw == stripped {
            return None;
        }
        decode_json(&raw)
    })
}
