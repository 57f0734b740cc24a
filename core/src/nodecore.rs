//! Shared round/consensus value types, grounded in `csnode/include/csnode/nodecore.h`
//! (`RoundTable`, `NodeLevel`, `HashVector`, `HashMatrix`, `PoolMetaInfo`,
//! `CharacteristicMeta`). These are the small plain-data types threaded
//! between the Conveyer, Generals and BlockChain without depending on any
//! of them.

use ledger_common::crypto::{Hash, PublicKey, Signature};
use ledger_common::time::TimestampMillis;

/// Where this node stands in the current round (`nodecore.h` `NodeLevel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLevel {
    Normal,
    Confidant,
    Main,
    Writer,
}

/// Membership of a consensus round (`nodecore.h` `RoundTable`).
#[derive(Debug, Clone)]
pub struct RoundTable {
    pub round: usize,
    pub general: PublicKey,
    pub confidants: Vec<PublicKey>,
    pub hashes: Vec<Hash>,
    pub char_bytes: Vec<u8>,
}

impl RoundTable {
    pub fn new(round: usize, general: PublicKey) -> Self {
        RoundTable {
            round,
            general,
            confidants: Vec::new(),
            hashes: Vec::new(),
            char_bytes: Vec::new(),
        }
    }

    pub fn confidants_count(&self) -> usize {
        self.confidants.len()
    }

    pub fn level_of(&self, node: &PublicKey, self_key: &PublicKey) -> NodeLevel {
        if node == &self.general && self_key == node {
            return NodeLevel::Main;
        }
        if self.confidants.iter().any(|c| c == node) {
            return NodeLevel::Confidant;
        }
        NodeLevel::Normal
    }
}

/// One confidant's vote over the round's packet hashes
/// (`nodecore.h` `HashVector`).
#[derive(Debug, Clone)]
pub struct HashVector {
    pub sender: u8,
    pub hash: Hash,
    pub signature: Signature,
}

/// `HashVector[5]` fixed window in the original becomes a bounded `Vec`
/// here (see the REDESIGN FLAG on `Generals::addMatrix` in DESIGN.md —
/// the original's fixed 100-wide static arrays are a latent overflow
/// hazard the redesign replaces with growth-checked dynamic storage).
#[derive(Debug, Clone)]
pub struct HashMatrix {
    pub sender: u8,
    pub vectors: Vec<HashVector>,
    pub signature: Signature,
}

/// Per-pool metadata carried alongside the block body
/// (`nodecore.h` `PoolMetaInfo`).
#[derive(Debug, Clone)]
pub struct PoolMetaInfo {
    pub timestamp: TimestampMillis,
    pub sequence_number: u64,
}

/// The characteristic mask plus who produced it, exchanged so late
/// arrivals can apply it without having built it themselves
/// (`nodecore.h` `CharacteristicMeta`).
#[derive(Debug, Clone)]
pub struct CharacteristicMeta {
    pub bytes: Vec<u8>,
    pub sender: PublicKey,
}

/// Confirmation notifications a confidant broadcasts once it has seen
/// enough matrices to trust the round's outcome
/// (`conveyer.hpp` `addNotification`/`isEnoughNotifications`).
#[derive(Debug, Default)]
pub struct Notifications {
    senders: Vec<u8>,
}

impl Notifications {
    pub fn new() -> Self {
        Notifications::default()
    }

    pub fn add(&mut self, sender: u8) {
        if !self.senders.contains(&sender) {
            self.senders.push(sender);
        }
    }

    pub fn count(&self) -> usize {
        self.senders.len()
    }

    /// Strict majority excluding self: `(confidants - 1) / 2`
    /// (`conveyer.hpp::isEnoughNotifications`, spec.md §4.1).
    pub fn is_enough(&self, confidants: usize) -> bool {
        confidants > 0 && self.senders.len() >= (confidants - 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_threshold_matches_majority() {
        let mut n = Notifications::new();
        assert!(!n.is_enough(5));
        n.add(1);
        n.add(2);
        n.add(3);
        assert!(n.is_enough(5));
    }

    #[test]
    fn notifications_dedupes_sender() {
        let mut n = Notifications::new();
        n.add(1);
        n.add(1);
        assert_eq!(n.count(), 1);
    }
}
