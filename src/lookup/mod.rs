//! Static plus learnt lookup table for resolving IR codes to input ids.
//!
//! Static entries are scanned first in config order, then learnt entries in
//! insertion order; the first (address, code) match wins. The learnt side
//! grows at runtime through the learning mode, bounded by
//! `max_learning_codes`.

use crate::config::{LookupEntry, RemoteConfig};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Reasons a learning attempt is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LearnError {
    /// The (address, code) pair is already present in either table
    #[error("code already present in lookup table")]
    DuplicateCode,

    /// The learnt table has reached `max_learning_codes`
    #[error("learnt code table is full")]
    TableFull,
}

/// Combined static + learnt lookup table
///
/// The static side is a shared reference into the application-owned config;
/// only the learnt side is owned and mutated here.
#[derive(Debug)]
pub struct LookupTable {
    config: Arc<RemoteConfig>,
    learnt: Vec<LookupEntry>,
}

impl LookupTable {
    pub fn new(config: Arc<RemoteConfig>) -> Self {
        debug!(
            "Lookup table created with {} static entries, learnt capacity {}",
            config.static_lookup_table.len(),
            config.max_learning_codes
        );
        Self {
            config,
            learnt: Vec::new(),
        }
    }

    /// Resolves a raw (address, code) pair to an input id, if known
    pub fn resolve(&self, address: u16, code: u8) -> Option<u8> {
        self.config
            .static_lookup_table
            .iter()
            .chain(self.learnt.iter())
            .find(|entry| entry.remote_address == address && entry.code == code)
            .map(|entry| entry.input_id)
    }

    /// Appends a learnt mapping, rejecting duplicates and overflow
    pub fn learn(&mut self, address: u16, code: u8, input_id: u8) -> Result<(), LearnError> {
        if self.resolve(address, code).is_some() {
            return Err(LearnError::DuplicateCode);
        }
        if self.learnt.len() >= self.config.max_learning_codes {
            return Err(LearnError::TableFull);
        }

        self.learnt.push(LookupEntry {
            remote_address: address,
            code,
            input_id,
        });
        info!(
            "Learnt code {:#04x} from address {:#06x} as input id {} ({}/{} slots used)",
            code,
            address,
            input_id,
            self.learnt.len(),
            self.config.max_learning_codes
        );
        Ok(())
    }

    /// Drops all learnt entries; static entries are untouched
    pub fn clear_learnt(&mut self) {
        info!("Clearing {} learnt codes", self.learnt.len());
        self.learnt.clear();
    }

    pub fn learnt_count(&self) -> usize {
        self.learnt.len()
    }

    /// Snapshot view for the persistence collaborator
    pub fn learnt_entries(&self) -> &[LookupEntry] {
        &self.learnt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(max_learning_codes: usize) -> LookupTable {
        let config = RemoteConfig {
            max_learning_codes,
            static_lookup_table: vec![
                LookupEntry {
                    remote_address: 0x10,
                    code: 0x01,
                    input_id: 3,
                },
                LookupEntry {
                    remote_address: 0x10,
                    code: 0x02,
                    input_id: 4,
                },
            ],
            ..RemoteConfig::default()
        };
        LookupTable::new(Arc::new(config))
    }

    #[test]
    fn resolves_static_entries_in_order() {
        let table = table(4);
        assert_eq!(table.resolve(0x10, 0x01), Some(3));
        assert_eq!(table.resolve(0x10, 0x02), Some(4));
        assert_eq!(table.resolve(0x10, 0x03), None);
        assert_eq!(table.resolve(0x11, 0x01), None);
    }

    #[test]
    fn learnt_entries_resolve_after_static() {
        let mut table = table(4);
        table.learn(0x20, 0x42, 7).unwrap();
        assert_eq!(table.resolve(0x20, 0x42), Some(7));
        // Static mapping still wins for its own pair.
        assert_eq!(table.resolve(0x10, 0x01), Some(3));
    }

    #[test]
    fn rejects_duplicate_of_static_entry() {
        let mut table = table(4);
        assert_eq!(table.learn(0x10, 0x01, 9), Err(LearnError::DuplicateCode));
        assert_eq!(table.learnt_count(), 0);
    }

    #[test]
    fn rejects_duplicate_of_learnt_entry() {
        let mut table = table(4);
        table.learn(0x20, 0x42, 7).unwrap();
        assert_eq!(table.learn(0x20, 0x42, 8), Err(LearnError::DuplicateCode));
        assert_eq!(table.learnt_count(), 1);
    }

    #[test]
    fn fills_up_then_rejects() {
        let mut table = table(3);
        for code in 0..3u8 {
            table.learn(0x20, 0x40 + code, code).unwrap();
        }
        assert_eq!(table.learn(0x20, 0x50, 5), Err(LearnError::TableFull));
        assert_eq!(table.learnt_count(), 3);
    }

    #[test]
    fn clear_makes_relearning_possible() {
        let mut table = table(1);
        table.learn(0x20, 0x42, 7).unwrap();
        assert_eq!(table.learn(0x20, 0x42, 7), Err(LearnError::DuplicateCode));

        table.clear_learnt();
        assert_eq!(table.resolve(0x20, 0x42), None);
        table.learn(0x20, 0x42, 7).unwrap();
        assert_eq!(table.resolve(0x20, 0x42), Some(7));
    }
}
