//! Round state machine tying Conveyer, Generals and BlockChain together
//! (spec.md §4.2 "State machine"). Grounded in the `NodeLevel` transitions
//! `nodecore.h` describes and the round timers in `client/include/client/config.hpp`
//! (`ROUND_DELAY`, `TIME_TO_AWAIT_ACTIVITY`, `TIME_TO_AWAIT_SS_ROUND`).
//!
//! This module models the state machine as a plain tagged enum advanced by
//! explicit events rather than a thread looping on timers, so it can be
//! driven synchronously by a caller owning the actual clock/network glue
//! (out of scope here per spec.md's Non-goals on networking).

use ledger_common::crypto::PublicKey;

use crate::generals::Decision;
use crate::nodecore::NodeLevel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundState {
    /// Waiting for the round table to be announced.
    AwaitingRoundTable,
    /// Collecting packets referenced by the round table.
    Syncing { missing: usize },
    /// Building/exchanging hash vectors.
    BuildingVectors,
    /// Exchanging hash matrices, waiting on the trusted threshold.
    BuildingMatrices { collected: usize, needed: usize },
    /// Consensus reached; a writer has been selected and the block is
    /// ready to be recorded locally.
    Ready { writer: PublicKey, mask_admitted: usize },
    /// This round timed out without reaching consensus
    /// (`TIME_TO_AWAIT_SS_ROUND` elapsed, `nodecore.h`).
    TimedOut,
}

pub struct Solver {
    state: RoundState,
    level: NodeLevel,
}

impl Solver {
    pub fn new() -> Self {
        Solver { state: RoundState::AwaitingRoundTable, level: NodeLevel::Normal }
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn level(&self) -> NodeLevel {
        self.level
    }

    pub fn on_round_table_received(&mut self, level: NodeLevel, missing_packets: usize) {
        self.level = level;
        self.state = if missing_packets == 0 {
            RoundState::BuildingVectors
        } else {
            RoundState::Syncing { missing: missing_packets }
        };
    }

    pub fn on_packet_resolved(&mut self) {
        if let RoundState::Syncing { missing } = self.state {
            self.state = if missing <= 1 {
                RoundState::BuildingVectors
            } else {
                RoundState::Syncing { missing: missing - 1 }
            };
        }
    }

    /// Caller still has to call `Generals::take_decision` and feed the
    /// result back in via `on_decision` once `collected >= needed`; this
    /// just tracks progress toward that threshold.
    pub fn on_matrix_collected(&mut self, collected: usize, needed: usize) {
        self.state = RoundState::BuildingMatrices { collected, needed };
    }

    pub fn on_decision(&mut self, decision: &Decision) {
        self.state = RoundState::Ready {
            writer: decision.writer,
            mask_admitted: decision.mask.admitted_count(),
        };
    }

    pub fn on_timeout(&mut self) {
        self.state = RoundState::TimedOut;
    }

    pub fn reset_for_round(&mut self) {
        self.state = RoundState::AwaitingRoundTable;
        self.level = NodeLevel::Normal;
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives this node's level for the round given who the general and
/// confidants are (`nodecore.h` `NodeLevel`).
pub fn node_level(self_key: &PublicKey, general: &PublicKey, confidants: &[PublicKey]) -> NodeLevel {
    if self_key == general {
        return NodeLevel::Main;
    }
    if confidants.iter().any(|c| c == self_key) {
        return NodeLevel::Confidant;
    }
    NodeLevel::Normal
}

pub fn writer_level(self_key: &PublicKey, writer: &PublicKey) -> NodeLevel {
    if self_key == writer {
        NodeLevel::Writer
    } else {
        NodeLevel::Normal
    }
}
