//! Round-scoped mempool and packet table, grounded in
//! `csnode/include/csnode/conveyer.hpp`. Holds loose transactions not yet
//! sealed into a packet, sealed packets indexed by hash, the current
//! round's hash table (which packets the round actually references), and
//! the notification/characteristic-meta bookkeeping needed to know when a
//! round's consensus output is ready to apply.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use ledger_common::config::{HASH_TABLES_STORAGE_CAPACITY, MAX_PACKET_TRANSACTIONS};
use ledger_common::crypto::{Hash, PublicKey};
use ledger_common::packet::TransactionsPacket;
use ledger_common::pool::Pool;
use ledger_common::transaction::Transaction;

use crate::error::ConveyerError;
use crate::nodecore::{CharacteristicMeta, Notifications, PoolMetaInfo, RoundTable};

/// One round's worth of bookkeeping. Superseded rounds are kept around up
/// to `HASH_TABLES_STORAGE_CAPACITY` deep so a confidant lagging a few
/// rounds behind can still resolve packet hashes it's missing
/// (`conveyer.hpp` keeps a bounded ring of past `hashTablesStorage_`).
struct RoundBucket {
    round: usize,
    round_table: Option<RoundTable>,
    found_packets: HashMap<Hash, TransactionsPacket>,
    /// Hashes `round_table` references that haven't resolved to a known
    /// packet yet. Invariant: `needed_hashes.len() + (found_packets keyed
    /// by round_table.hashes).len() == round_table.hashes.len()`
    /// (spec.md §4.1).
    needed_hashes: HashSet<Hash>,
    notifications: Notifications,
    characteristic_meta: Option<CharacteristicMeta>,
    sealed_this_round: usize,
}

impl RoundBucket {
    fn new(round: usize) -> Self {
        RoundBucket {
            round,
            round_table: None,
            found_packets: HashMap::new(),
            needed_hashes: HashSet::new(),
            notifications: Notifications::new(),
            characteristic_meta: None,
            sealed_this_round: 0,
        }
    }
}

pub struct Conveyer {
    current_round: usize,
    pending: TransactionsPacket,
    last_sealed_at: Instant,
    history: Vec<RoundBucket>,
}

impl Conveyer {
    pub fn new() -> Self {
        Conveyer {
            current_round: 0,
            pending: TransactionsPacket::new(),
            last_sealed_at: Instant::now(),
            history: vec![RoundBucket::new(0)],
        }
    }

    pub fn current_round(&self) -> usize {
        self.current_round
    }

    /// Appends a loose transaction to the open packet. Seals (and returns
    /// the sealed packet) once `MAX_PACKET_TRANSACTIONS` is reached
    /// (spec.md §4.1, `conveyer.hpp::addTransaction`).
    pub fn add_transaction(&mut self, tx: Transaction) -> Option<TransactionsPacket> {
        self.pending.add_transaction(tx);
        if self.pending.transactions_count() >= MAX_PACKET_TRANSACTIONS {
            return Some(self.seal_pending());
        }
        None
    }

    /// Seals the currently-open packet regardless of size — called by the
    /// flush timer when `TRANSACTIONS_PACKET_INTERVAL_MS` elapses with no
    /// new transactions (spec.md §4.1 "flush timer").
    pub fn flush_if_due(&mut self, interval: Duration) -> Option<TransactionsPacket> {
        if self.pending.is_empty() {
            return None;
        }
        if self.last_sealed_at.elapsed() >= interval {
            return Some(self.seal_pending());
        }
        None
    }

    fn seal_pending(&mut self) -> TransactionsPacket {
        let mut sealed = std::mem::take(&mut self.pending);
        let hash = sealed.make_hash();
        self.last_sealed_at = Instant::now();
        if let Some(bucket) = self.history.last_mut() {
            bucket.sealed_this_round += 1;
        }
        log::debug!("sealed packet {} with {} transactions", hash, sealed.transactions_count());
        sealed
    }

    /// Satisfies a needed hash for `round` with a packet received from the
    /// network (`conveyer.hpp::addFoundPacket`). Silently discarded if
    /// `round` has already fallen outside the storage window.
    pub fn add_found_packet(&mut self, round: usize, mut packet: TransactionsPacket) -> Result<Hash, ConveyerError> {
        let hash = packet.make_hash();
        if let Some(bucket) = self.history.iter_mut().find(|b| b.round == round) {
            bucket.needed_hashes.remove(&hash);
            bucket.found_packets.insert(hash, packet);
        }
        Ok(hash)
    }

    pub fn search_packet(&self, hash: &Hash) -> Option<&TransactionsPacket> {
        self.history.iter().rev().find_map(|bucket| bucket.found_packets.get(hash))
    }

    /// True iff `neededHashes(round)` is empty (`conveyer.hpp::isSyncCompleted`).
    /// An unknown round (no round table set yet) is never considered synced.
    pub fn is_sync_completed(&self, round: usize) -> bool {
        self.history.iter().find(|b| b.round == round).map(|b| b.needed_hashes.is_empty()).unwrap_or(false)
    }

    /// Finds a packet already known from an earlier round's table and
    /// removes it from wherever it's stored, so `set_round` can carry it
    /// forward into the new round's bucket instead of re-requesting it.
    fn take_known_packet(&mut self, hash: &Hash) -> Option<TransactionsPacket> {
        for bucket in self.history.iter_mut().rev() {
            if let Some(packet) = bucket.found_packets.remove(hash) {
                return Some(packet);
            }
        }
        None
    }

    /// Atomic round advance (`conveyer.hpp::setRound`). Packets already
    /// known from a prior round are carried into the new round's table;
    /// hashes with no known packet are recorded as needed. Trims the
    /// history ring to its bounded capacity.
    pub fn set_round(&mut self, table: RoundTable) -> Result<(), ConveyerError> {
        if table.round < self.current_round {
            return Err(ConveyerError::StaleRound { requested: table.round, current: self.current_round });
        }
        self.current_round = table.round;

        let mut carried = HashMap::new();
        let mut needed = HashSet::new();
        for hash in &table.hashes {
            match self.take_known_packet(hash) {
                Some(packet) => {
                    carried.insert(*hash, packet);
                }
                None => {
                    needed.insert(*hash);
                }
            }
        }

        let mut bucket = RoundBucket::new(table.round);
        bucket.found_packets = carried;
        bucket.needed_hashes = needed;
        bucket.round_table = Some(table);
        self.history.push(bucket);
        while self.history.len() > HASH_TABLES_STORAGE_CAPACITY {
            self.history.remove(0);
        }
        Ok(())
    }

    /// Produces a `Pool` by concatenating, in round-table order, the
    /// transactions of each hash-referenced packet and keeping only those
    /// whose bit in the characteristic mask is set (`conveyer.hpp::applyCharacteristic`).
    /// Returns `None` if any referenced packet is missing or the mask
    /// length does not equal the candidate count (spec.md §4.1).
    pub fn apply_characteristic(
        &self,
        round: usize,
        meta: &PoolMetaInfo,
        prev_hash: Hash,
        writer: PublicKey,
    ) -> Option<Pool> {
        let bucket = self.history.iter().find(|b| b.round == round)?;
        let table = bucket.round_table.as_ref()?;

        let mut candidates: Vec<Transaction> = Vec::new();
        for hash in &table.hashes {
            let packet = bucket.found_packets.get(hash)?;
            candidates.extend(packet.transactions().iter().cloned());
        }

        if table.char_bytes.len() != candidates.len() {
            return None;
        }

        let transactions: Vec<Transaction> = candidates
            .into_iter()
            .zip(table.char_bytes.iter())
            .filter_map(|(tx, bit)| (*bit != 0).then_some(tx))
            .collect();

        let mut pool = Pool::genesis(writer, meta.timestamp.to_string());
        pool.sequence = meta.sequence_number;
        pool.prev_hash = prev_hash;
        pool.transactions = transactions;
        Some(pool)
    }

    pub fn add_notification(&mut self, sender: u8) {
        if let Some(bucket) = self.history.last_mut() {
            bucket.notifications.add(sender);
        }
    }

    pub fn is_enough_notifications(&self, confidants: usize) -> bool {
        self.history
            .last()
            .map(|bucket| bucket.notifications.is_enough(confidants))
            .unwrap_or(false)
    }

    pub fn add_characteristic_meta(&mut self, meta: CharacteristicMeta) {
        if let Some(bucket) = self.history.last_mut() {
            bucket.characteristic_meta = Some(meta);
        }
    }

    pub fn characteristic_meta(&self) -> Option<&CharacteristicMeta> {
        self.history.last().and_then(|bucket| bucket.characteristic_meta.as_ref())
    }

    /// How many packets this node sealed in the last `n` rounds — used to
    /// cap how many *recently sealed* packets a fresh main node may pick up
    /// without having observed them land in a round table first (resolves
    /// the Open Question on `TRANSACTIONS_FLUSH_ROUND` in DESIGN.md).
    pub fn recent_sealed_packets(&self, n: usize) -> usize {
        self.history.iter().rev().take(n).map(|b| b.sealed_this_round).sum()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.transactions_count()
    }
}

impl Default for Conveyer {
    fn default() -> Self {
        Self::new()
    }
}
