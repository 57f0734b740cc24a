//! TransactionsPacket (spec.md §3, §4.1).

use crate::crypto::{hash_bytes, Hash, Signature};
use crate::error::SerializerError;
use crate::serializer::{Reader, Serializer, Writer};
use crate::transaction::Transaction;

pub type PacketHash = Hash;

/// Which sub-sequences `TransactionsPacket::to_bytes_with_options` includes,
/// mirroring the original's `Serialization` options mask (spec.md §6
/// "Packet wire format").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializationOptions(u8);

impl SerializationOptions {
    pub const TRANSACTIONS: SerializationOptions = SerializationOptions(0b01);
    pub const SIGNATURES: SerializationOptions = SerializationOptions(0b10);

    pub const fn union(self, other: SerializationOptions) -> SerializationOptions {
        SerializationOptions(self.0 | other.0)
    }

    pub fn contains(self, other: SerializationOptions) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Ordered transactions plus ordered per-confidant signatures. The hash is
/// content-addressed over the transaction subsequence only, computed lazily
/// and frozen on first computation (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct TransactionsPacket {
    transactions: Vec<Transaction>,
    signatures: Vec<(u8, Signature)>,
    hash: Option<PacketHash>,
}

impl TransactionsPacket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hash_frozen(&self) -> bool {
        self.hash.is_some()
    }

    /// Appends a transaction. Returns `false` (no-op) once the hash has
    /// already been computed — "adding a transaction after hashing is
    /// rejected" (spec.md §3).
    pub fn add_transaction(&mut self, transaction: Transaction) -> bool {
        if self.is_hash_frozen() {
            return false;
        }
        self.transactions.push(transaction);
        true
    }

    /// Adds a `(confidant_index, signature)` pair; rejects a duplicate index.
    pub fn add_signature(&mut self, index: u8, signature: Signature) -> bool {
        if self.signatures.iter().any(|(i, _)| *i == index) {
            return false;
        }
        self.signatures.push((index, signature));
        true
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn signatures(&self) -> &[(u8, Signature)] {
        &self.signatures
    }

    pub fn transactions_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn transactions_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_varint(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.write(&mut writer);
        }
        writer.into_bytes()
    }

    /// Computes and freezes the hash if not already computed. Returns the
    /// (possibly newly-frozen) hash. Idempotent — the hash never changes
    /// once computed (spec.md §4.1 invariant).
    pub fn make_hash(&mut self) -> PacketHash {
        if let Some(hash) = self.hash {
            return hash;
        }
        let hash = hash_bytes(&self.transactions_bytes());
        self.hash = Some(hash);
        hash
    }

    pub fn hash(&self) -> Option<PacketHash> {
        self.hash
    }

    pub fn to_bytes_with_options(&self, options: SerializationOptions) -> Vec<u8> {
        let mut writer = Writer::new();
        if options.contains(SerializationOptions::TRANSACTIONS) {
            writer.write_varint(self.transactions.len() as u64);
            for tx in &self.transactions {
                tx.write(&mut writer);
            }
        }
        if options.contains(SerializationOptions::SIGNATURES) {
            writer.write_varint(self.signatures.len() as u64);
            for (index, signature) in &self.signatures {
                writer.write_u8(*index);
                signature.write(&mut writer);
            }
        }
        writer.into_bytes()
    }
}

impl Serializer for TransactionsPacket {
    fn write(&self, writer: &mut Writer) {
        writer.write_varint(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.write(writer);
        }
        writer.write_varint(self.signatures.len() as u64);
        for (index, signature) in &self.signatures {
            writer.write_u8(*index);
            signature.write(writer);
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, SerializerError> {
        let tx_count = reader.read_varint()?;
        let mut transactions = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            transactions.push(Transaction::read(reader)?);
        }
        let sig_count = reader.read_varint()?;
        let mut signatures = Vec::with_capacity(sig_count as usize);
        for _ in 0..sig_count {
            let index = reader.read_u8()?;
            let signature = Signature::read(reader)?;
            signatures.push((index, signature));
        }
        let mut packet = TransactionsPacket { transactions, signatures, hash: None };
        packet.make_hash();
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::crypto::PublicKey;
    use crate::transaction::InnerId;

    fn tx(n: u8) -> Transaction {
        Transaction::new(
            PublicKey::from_slice(&[n; 32]).unwrap(),
            PublicKey::from_slice(&[n.wrapping_add(1); 32]).unwrap(),
            Amount::from_units(n as u64),
            InnerId::new(n as u64),
            Amount::from_units(1),
            Signature::zero(),
        )
    }

    #[test]
    fn hash_freezes_and_rejects_further_adds() {
        let mut packet = TransactionsPacket::new();
        assert!(packet.add_transaction(tx(1)));
        let hash_before = packet.make_hash();
        assert!(!packet.add_transaction(tx(2)));
        assert_eq!(packet.transactions_count(), 1);
        assert_eq!(packet.make_hash(), hash_before);
    }

    #[test]
    fn duplicate_signature_index_rejected() {
        let mut packet = TransactionsPacket::new();
        packet.add_transaction(tx(1));
        assert!(packet.add_signature(0, Signature::zero()));
        assert!(!packet.add_signature(0, Signature::zero()));
    }

    #[test]
    fn wire_round_trip_preserves_hash() {
        let mut packet = TransactionsPacket::new();
        packet.add_transaction(tx(1));
        packet.add_transaction(tx(2));
        packet.add_signature(0, Signature::zero());
        let expected_hash = packet.make_hash();

        let bytes = packet.to_bytes();
        let mut decoded = TransactionsPacket::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.make_hash(), expected_hash);
        assert_eq!(decoded.transactions_count(), 2);
    }
}
