//! Address <-> `WalletId` interning, grounded in the wallet-id lookups that
//! `blockchain.hpp` and `walletspools.cpp` both assume exist
//! (`findWalletId`/`findWalletData`). A real address is 32 bytes; every
//! pool and wallets-pool entry refers to wallets by the much smaller
//! `WalletId` instead, assigned the first time an address is seen.

use std::collections::HashMap;
use std::sync::RwLock;

use ledger_common::crypto::{PublicKey, WalletId};

#[derive(Default)]
struct Inner {
    forward: HashMap<PublicKey, WalletId>,
    backward: HashMap<WalletId, PublicKey>,
    next: WalletId,
}

/// Bidirectional, monotonically-growing address/id table. Ids are never
/// reused even if a wallet's last reference is evicted elsewhere, since
/// pools that reference it by id must remain resolvable.
pub struct WalletsIds {
    inner: RwLock<Inner>,
}

impl WalletsIds {
    pub fn new() -> Self {
        WalletsIds {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Looks up `address`'s id, assigning a fresh one if this is the first
    /// time it has been seen.
    pub fn intern(&self, address: &PublicKey) -> WalletId {
        if let Some(id) = self.inner.read().expect("wallets_ids poisoned").forward.get(address) {
            return *id;
        }
        let mut inner = self.inner.write().expect("wallets_ids poisoned");
        if let Some(id) = inner.forward.get(address) {
            return *id;
        }
        let id = inner.next;
        inner.next = id.next();
        inner.forward.insert(*address, id);
        inner.backward.insert(id, *address);
        id
    }

    pub fn find_id(&self, address: &PublicKey) -> Option<WalletId> {
        self.inner.read().expect("wallets_ids poisoned").forward.get(address).copied()
    }

    pub fn find_address(&self, id: WalletId) -> Option<PublicKey> {
        self.inner.read().expect("wallets_ids poisoned").backward.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("wallets_ids poisoned").forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WalletsIds {
    fn default() -> Self {
        Self::new()
    }
}
