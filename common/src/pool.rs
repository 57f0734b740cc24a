//! Pool (block) data model (spec.md §3, §6 "Pool wire format").

use crate::crypto::{hash_bytes, Hash, PublicKey, Signature, WalletId};
use crate::error::SerializerError;
use crate::serializer::{Reader, Serializer, Writer};
use crate::transaction::Transaction;

pub type PoolHash = Hash;

/// An address-id binding created by a pool (spec.md §3 "new-wallet entries").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewWalletEntry {
    pub address: PublicKey,
    pub wallet_id: WalletId,
}

impl Serializer for NewWalletEntry {
    fn write(&self, writer: &mut Writer) {
        self.address.write(writer);
        writer.write_u32(self.wallet_id.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, SerializerError> {
        let address = PublicKey::read(reader)?;
        let wallet_id = WalletId(reader.read_u32()?);
        Ok(NewWalletEntry { address, wallet_id })
    }
}

/// A block: sequence number (height), previous-pool hash, timestamp,
/// ordered transactions, new-wallet bindings, pool-level signatures and the
/// writer's public key (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub sequence: u64,
    pub prev_hash: PoolHash,
    /// String timestamp, matching the original's `csdb::Pool` representation
    /// (kept as an opaque string rather than a parsed type since the core
    /// never interprets it beyond ordering-adjacent display).
    pub timestamp: String,
    pub transactions: Vec<Transaction>,
    pub new_wallets: Vec<NewWalletEntry>,
    pub signatures: Vec<(u8, Signature)>,
    pub writer: PublicKey,
}

impl Pool {
    pub fn genesis(writer: PublicKey, timestamp: String) -> Self {
        Pool {
            sequence: 0,
            prev_hash: PoolHash::zero(),
            timestamp,
            transactions: Vec::new(),
            new_wallets: Vec::new(),
            signatures: Vec::new(),
            writer,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.sequence == 0
    }

    /// Content hash over the full pool (deterministic — two nodes computing
    /// this over identical wire bytes get the same hash, spec.md §8).
    pub fn hash(&self) -> PoolHash {
        hash_bytes(&self.to_bytes())
    }

    pub fn add_signature(&mut self, index: u8, signature: Signature) -> bool {
        if self.signatures.iter().any(|(i, _)| *i == index) {
            return false;
        }
        self.signatures.push((index, signature));
        true
    }
}

impl Serializer for Pool {
    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.sequence);
        self.prev_hash.write(writer);
        writer.write_varbytes(self.timestamp.as_bytes());
        writer.write_varint(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.write(writer);
        }
        writer.write_varint(self.new_wallets.len() as u64);
        for entry in &self.new_wallets {
            entry.write(writer);
        }
        writer.write_varint(self.signatures.len() as u64);
        for (index, signature) in &self.signatures {
            writer.write_u8(*index);
            signature.write(writer);
        }
        self.writer.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, SerializerError> {
        let sequence = reader.read_u64()?;
        let prev_hash = PoolHash::read(reader)?;
        let timestamp = String::from_utf8(reader.read_varbytes()?.to_vec())
            .map_err(|_| SerializerError::InvalidValue(0))?;
        let tx_count = reader.read_varint()?;
        let mut transactions = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            transactions.push(Transaction::read(reader)?);
        }
        let wallets_count = reader.read_varint()?;
        let mut new_wallets = Vec::with_capacity(wallets_count as usize);
        for _ in 0..wallets_count {
            new_wallets.push(NewWalletEntry::read(reader)?);
        }
        let sigs_count = reader.read_varint()?;
        let mut signatures = Vec::with_capacity(sigs_count as usize);
        for _ in 0..sigs_count {
            let index = reader.read_u8()?;
            let signature = Signature::read(reader)?;
            signatures.push((index, signature));
        }
        let writer_key = PublicKey::read(reader)?;
        Ok(Pool {
            sequence,
            prev_hash,
            timestamp,
            transactions,
            new_wallets,
            signatures,
            writer: writer_key,
        })
    }
}
