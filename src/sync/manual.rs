//! Copy/paste sync codes.
//!
//! `eyJn-YW1l-U3Rh-...`: the URL payload split into readable groups. Always
//! available, never pushes.

use super::codec::{chunk, decode_chunked, encode_payload};
use super::{SyncTransport, TransportKind};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::roster::SyncedGameData;

/// Sync code for `data` with the default grouping
pub fn create_sync_code(data: &SyncedGameData) -> Result<String> {
    ManualTransport::default().create_code(data)
}

/// Record from a sync code with the default grouping
pub fn parse_sync_code(code: &str) -> Option<SyncedGameData> {
    ManualTransport::default().parse_code(code)
}

#[derive(Debug, Clone, Default)]
pub struct ManualTransport {
    config: SyncConfig,
}

impl ManualTransport {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn create_code(&self, data: &SyncedGameData) -> Result<String> {
        let encoded = encode_payload(data)?;
        Ok(chunk(
            &encoded,
            self.config.manual_chunk_width,
            self.config.manual_separator,
        ))
    }

    pub fn parse_code(&self, code: &str) -> Option<SyncedGameData> {
        let data: Option<SyncedGameData> = decode_chunked(
            code,
            self.config.manual_chunk_width,
            self.config.manual_separator,
        );
        if data.is_none() {
            log::debug!("Rejected sync code ({} chars)", code.len());
        }
        data
    }
}

impl SyncTransport for ManualTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Manual
    }

    fn is_available(&self) -> bool {
        true
    }

    fn publish(&self, data: &SyncedGameData) -> Result<String> {
        self.create_code(data)
    }

    fn fetch(&self, token: &str) -> Option<SyncedGameData> {
        self.parse_code(token)
    }
}
