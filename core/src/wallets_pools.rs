//! Per-wallet ring of recently touched pool hashes, grounded in
//! `csnode/src/walletspools.cpp`. Two directions of replay are supported:
//! `PrevBlock` (walking the chain backwards while warming the cache, so
//! entries are pushed to the front and older entries fall off the back
//! once the ring is full) and `NextBlock` (normal forward block
//! application, entries pushed to the back, oldest evicted from the front
//! once full).

use std::collections::VecDeque;
use std::collections::HashMap;

use ledger_common::crypto::{Hash, WalletId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    PrevBlock,
    NextBlock,
}

#[derive(Debug, Default)]
struct Ring {
    hashes: VecDeque<Hash>,
}

impl Ring {
    fn push(&mut self, direction: Direction, hash: Hash, capacity: usize) {
        match direction {
            Direction::PrevBlock => {
                self.hashes.push_front(hash);
                while self.hashes.len() > capacity {
                    self.hashes.pop_back();
                }
            }
            Direction::NextBlock => {
                self.hashes.push_back(hash);
                while self.hashes.len() > capacity {
                    self.hashes.pop_front();
                }
            }
        }
    }
}

/// Bounded per-wallet pool-hash history (spec.md §4.4 "wallets pools"),
/// capacity taken from `ledger_common::config::WALLET_POOLS_CAPACITY`
/// (`walletspools.cpp` uses a fixed capacity per wallet's ring buffer).
pub struct WalletsPools {
    capacity: usize,
    rings: HashMap<WalletId, Ring>,
}

impl WalletsPools {
    pub fn new(capacity: usize) -> Self {
        WalletsPools {
            capacity,
            rings: HashMap::new(),
        }
    }

    pub fn add_pool_hash(&mut self, wallet: WalletId, direction: Direction, hash: Hash) {
        self.rings.entry(wallet).or_default().push(direction, hash, self.capacity);
    }

    pub fn pool_hashes(&self, wallet: WalletId) -> Vec<Hash> {
        self.rings
            .get(&wallet)
            .map(|ring| ring.hashes.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, wallet: WalletId, hash: &Hash) -> bool {
        self.rings
            .get(&wallet)
            .map(|ring| ring.hashes.contains(hash))
            .unwrap_or(false)
    }
}
