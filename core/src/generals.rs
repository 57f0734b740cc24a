//! Hash-vector/hash-matrix consensus aggregation, grounded in
//! `solver/solver/src/generals.cpp`. Each confidant builds a vector over
//! the round's packet hashes, broadcasts it, collects everyone else's
//! vectors into a matrix, and once enough matrices agree, takes a
//! decision: a characteristic mask of which packets are admitted plus the
//! writer index for the block.
//!
//! The original's `addMatrix` indexes into fixed 100-wide C arrays keyed by
//! sender byte with no bounds check beyond an `i_max` that is only
//! initialized on some branches — a latent out-of-bounds read if a
//! confidant index ever exceeded the array width. This redesign replaces
//! both arrays with `Vec`s sized to the confidant list, so indexing is
//! always in range by construction (see DESIGN.md's REDESIGN FLAGS).

use ledger_common::characteristic::Characteristic;
use ledger_common::crypto::{Hash, PublicKey, Signature, WalletId};
use ledger_common::packet::TransactionsPacket;
use ledger_common::transaction::Transaction;

use crate::error::GeneralsError;
use crate::nodecore::{HashMatrix, HashVector};
use crate::validator::TransactionsValidator;
use crate::wallets_cache::WalletsCache;

pub struct Generals {
    confidants: Vec<PublicKey>,
    vectors: Vec<Option<HashVector>>,
    matrices: Vec<Option<HashMatrix>>,
}

impl Generals {
    pub fn new(confidants: Vec<PublicKey>) -> Self {
        let n = confidants.len();
        Generals {
            confidants,
            vectors: vec![None; n],
            matrices: vec![None; n],
        }
    }

    fn index_of(&self, sender: u8) -> Option<usize> {
        let idx = sender as usize;
        (idx < self.confidants.len()).then_some(idx)
    }

    /// Builds this node's own vote (`generals.cpp::buildVector`, spec.md
    /// §4.2 steps 1-5): snapshots `cache`, runs the packet's transactions
    /// through `validator` to get the admitted-bit mask, then hashes that
    /// mask (empty or non-empty both hash through `Characteristic::hash`).
    pub fn build_vector(
        &self,
        sender: u8,
        packet: &TransactionsPacket,
        cache: &WalletsCache,
        validator: &TransactionsValidator,
        resolve: impl Fn(&Transaction) -> (WalletId, WalletId),
    ) -> HashVector {
        let transactions = packet.transactions();
        let admitted = validator.validate(transactions, cache, resolve);

        let mut mask = Characteristic::new(transactions.len());
        for index in admitted {
            mask.set(index, true);
        }

        HashVector {
            sender,
            hash: mask.hash(),
            signature: Signature::zero(),
        }
    }

    /// Records another confidant's vector (`generals.cpp::addVector`).
    pub fn add_vector(&mut self, vector: HashVector) -> Result<(), GeneralsError> {
        let idx = self.index_of(vector.sender).ok_or(GeneralsError::WriterOutOfRange {
            index: vector.sender as usize,
            confidants: self.confidants.len(),
        })?;
        if self.vectors[idx].is_some() {
            return Err(GeneralsError::DuplicateVector(vector.sender));
        }
        self.vectors[idx] = Some(vector);
        Ok(())
    }

    /// Records a matrix another confidant broadcasts once it has collected
    /// enough vectors (`generals.cpp::addMatrix`).
    pub fn add_matrix(&mut self, matrix: HashMatrix) -> Result<(), GeneralsError> {
        let idx = self.index_of(matrix.sender).ok_or(GeneralsError::WriterOutOfRange {
            index: matrix.sender as usize,
            confidants: self.confidants.len(),
        })?;
        self.matrices[idx] = Some(matrix);
        Ok(())
    }

    pub fn collected_vectors(&self) -> usize {
        self.vectors.iter().filter(|v| v.is_some()).count()
    }

    pub fn collected_matrices(&self) -> usize {
        self.matrices.iter().filter(|m| m.is_some()).count()
    }

    /// Trusted threshold: strictly more than half the confidants
    /// (`generals.cpp`: `trusted_limit = nodes_amount/2 + 1`).
    pub fn trusted_limit(&self) -> usize {
        self.confidants.len() / 2 + 1
    }

    /// Final decision once enough matrices have arrived
    /// (`generals.cpp::takeDecision`): the characteristic mask admitting
    /// every packet hash a majority of confidants agreed on, plus the
    /// writer index derived from the last admitted pool's hash.
    pub fn take_decision(&self, packet_hashes: &[Hash], last_pool_hash: &Hash) -> Result<Decision, GeneralsError> {
        let limit = self.trusted_limit();
        if self.collected_matrices() < limit {
            return Err(GeneralsError::BelowTrustedThreshold {
                have: self.collected_matrices(),
                needed: limit,
            });
        }

        let mut mask = Characteristic::new(packet_hashes.len());
        for (i, _hash) in packet_hashes.iter().enumerate() {
            let agree_count = self
                .matrices
                .iter()
                .flatten()
                .filter(|m| m.vectors.get(i).map(|v| !v.hash.as_bytes().iter().all(|b| *b == 0)).unwrap_or(false))
                .count();
            mask.set(i, agree_count >= limit);
        }

        let writer_index = (last_pool_hash.as_bytes()[0] as usize) % self.confidants.len().max(1);
        let writer = self.confidants.get(writer_index).copied().ok_or(GeneralsError::WriterOutOfRange {
            index: writer_index,
            confidants: self.confidants.len(),
        })?;

        Ok(Decision { mask, writer, writer_index })
    }
}

#[derive(Debug)]
pub struct Decision {
    pub mask: Characteristic,
    pub writer: PublicKey,
    pub writer_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidatorConfig;

    fn confidants(n: usize) -> Vec<PublicKey> {
        (0..n).map(|i| PublicKey::from_slice(&[i as u8; 32]).unwrap()).collect()
    }

    fn resolver(tx: &Transaction) -> (WalletId, WalletId) {
        (WalletId(tx.source.as_bytes()[0] as u32), WalletId(tx.target.as_bytes()[0] as u32))
    }

    #[test]
    fn empty_packet_list_hashes_deterministically() {
        let generals = Generals::new(confidants(3));
        let cache = WalletsCache::new();
        let validator = TransactionsValidator::new(ValidatorConfig::default());
        let packet = TransactionsPacket::new();
        let v1 = generals.build_vector(0, &packet, &cache, &validator, resolver);
        let v2 = generals.build_vector(0, &packet, &cache, &validator, resolver);
        assert_eq!(v1.hash, v2.hash);
    }

    #[test]
    fn writer_index_derives_from_first_hash_byte() {
        let mut last_hash_bytes = [0u8; 32];
        last_hash_bytes[0] = 9;
        let last_hash = Hash::from_slice(&last_hash_bytes).unwrap();

        // force enough matrices to pass the threshold check with an
        // all-empty mask, just to exercise the writer index math.
        let mut generals = Generals::new(confidants(4));
        for sender in 0..3u8 {
            generals
                .add_matrix(HashMatrix {
                    sender,
                    vectors: vec![],
                    signature: ledger_common::crypto::Signature::zero(),
                })
                .unwrap();
        }
        let decision = generals.take_decision(&[], &last_hash).unwrap();
        assert_eq!(decision.writer_index, 9 % 4);
    }

    #[test]
    fn below_threshold_is_rejected() {
        let generals = Generals::new(confidants(5));
        let err = generals.take_decision(&[], &Hash::zero()).unwrap_err();
        assert!(matches!(err, GeneralsError::BelowTrustedThreshold { .. }));
    }

    #[test]
    fn duplicate_vector_from_same_sender_rejected() {
        let mut generals = Generals::new(confidants(3));
        let cache = WalletsCache::new();
        let validator = TransactionsValidator::new(ValidatorConfig::default());
        let packet = TransactionsPacket::new();
        let vector = generals.build_vector(0, &packet, &cache, &validator, resolver);
        generals.add_vector(vector).unwrap();
        let vector = generals.build_vector(0, &packet, &cache, &validator, resolver);
        let err = generals.add_vector(vector).unwrap_err();
        assert!(matches!(err, GeneralsError::DuplicateVector(0)));
    }
}
