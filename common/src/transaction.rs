//! Transaction data model (spec.md §3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::crypto::{PublicKey, Signature};
use crate::error::SerializerError;
use crate::serializer::{Reader, Serializer, Writer};

/// innerID carries only 46 useful bits (spec.md §3).
pub const INNER_ID_BITS: u32 = 46;
pub const INNER_ID_MASK: u64 = (1u64 << INNER_ID_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InnerId(u64);

impl InnerId {
    pub fn new(value: u64) -> Self {
        InnerId(value & INNER_ID_MASK)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl Serializer for InnerId {
    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, SerializerError> {
        Ok(InnerId::new(reader.read_u64()?))
    }
}

/// user-field[0] key: presence + shape of a `SmartContractInvocation`
/// distinguishes plain transfers from contract deploy/call (spec.md §3).
pub const USER_FIELD_SMART_CONTRACT: u8 = 0;
/// presence of this user-field key marks a contract state-update transaction.
pub const USER_FIELD_NEW_STATE: u8 = 1;

pub type UserFields = BTreeMap<u8, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartContractInvocation {
    pub contract: PublicKey,
    pub method: String,
    pub params: Vec<u8>,
}

impl Serializer for SmartContractInvocation {
    fn write(&self, writer: &mut Writer) {
        self.contract.write(writer);
        writer.write_varbytes(self.method.as_bytes());
        writer.write_varbytes(&self.params);
    }

    fn read(reader: &mut Reader) -> Result<Self, SerializerError> {
        let contract = PublicKey::read(reader)?;
        let method = String::from_utf8(reader.read_varbytes()?.to_vec())
            .map_err(|_| SerializerError::InvalidValue(0))?;
        let params = reader.read_varbytes()?.to_vec();
        Ok(SmartContractInvocation { contract, method, params })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Transfer,
    ContractDeploy,
    ContractCall,
    ContractStateUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub source: PublicKey,
    pub target: PublicKey,
    pub amount: Amount,
    pub inner_id: InnerId,
    pub max_fee: Amount,
    pub signature: Signature,
    pub user_fields: UserFields,
}

impl Transaction {
    pub fn new(
        source: PublicKey,
        target: PublicKey,
        amount: Amount,
        inner_id: InnerId,
        max_fee: Amount,
        signature: Signature,
    ) -> Self {
        Transaction {
            source,
            target,
            amount,
            inner_id,
            max_fee,
            signature,
            user_fields: UserFields::new(),
        }
    }

    pub fn with_user_field(mut self, key: u8, value: Vec<u8>) -> Self {
        self.user_fields.insert(key, value);
        self
    }

    /// Decodes user-field[0] as a `SmartContractInvocation`, if present.
    pub fn smart_contract_invocation(&self) -> Option<SmartContractInvocation> {
        let bytes = self.user_fields.get(&USER_FIELD_SMART_CONTRACT)?;
        SmartContractInvocation::from_bytes(bytes).ok()
    }

    pub fn kind(&self) -> TransactionKind {
        if self.user_fields.contains_key(&USER_FIELD_NEW_STATE) {
            return TransactionKind::ContractStateUpdate;
        }
        match self.smart_contract_invocation() {
            None => TransactionKind::Transfer,
            Some(invocation) if invocation.method.is_empty() => TransactionKind::ContractDeploy,
            Some(_) => TransactionKind::ContractCall,
        }
    }

    /// Total debit from the source wallet: `amount + max_fee` (spec.md §4.3
    /// Phase A "tentatively debit amount + maxFee").
    pub fn total_debit(&self) -> Result<Amount, crate::error::AmountError> {
        self.amount.checked_add(self.max_fee)
    }
}

impl Serializer for Transaction {
    fn write(&self, writer: &mut Writer) {
        self.source.write(writer);
        self.target.write(writer);
        writer.write_u64(self.amount.units());
        self.inner_id.write(writer);
        writer.write_u64(self.max_fee.units());
        self.signature.write(writer);
        writer.write_varint(self.user_fields.len() as u64);
        for (key, value) in &self.user_fields {
            writer.write_u8(*key);
            writer.write_varbytes(value);
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, SerializerError> {
        let source = PublicKey::read(reader)?;
        let target = PublicKey::read(reader)?;
        let amount = Amount::from_units(reader.read_u64()?);
        let inner_id = InnerId::read(reader)?;
        let max_fee = Amount::from_units(reader.read_u64()?);
        let signature = Signature::read(reader)?;
        let field_count = reader.read_varint()?;
        let mut user_fields = UserFields::new();
        for _ in 0..field_count {
            let key = reader.read_u8()?;
            let value = reader.read_varbytes()?.to_vec();
            user_fields.insert(key, value);
        }
        Ok(Transaction {
            source,
            target,
            amount,
            inner_id,
            max_fee,
            signature,
            user_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction::new(
            PublicKey::from_slice(&[1u8; 32]).unwrap(),
            PublicKey::from_slice(&[2u8; 32]).unwrap(),
            Amount::from_units(1_000),
            InnerId::new(42),
            Amount::from_units(10),
            Signature::zero(),
        )
    }

    #[test]
    fn plain_transfer_round_trips() {
        let tx = sample_tx();
        assert_eq!(tx.kind(), TransactionKind::Transfer);
        let bytes = tx.to_bytes();
        let back = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(tx, back);
    }

    #[test]
    fn contract_deploy_detected_by_empty_method() {
        let invocation = SmartContractInvocation {
            contract: PublicKey::zero(),
            method: String::new(),
            params: vec![1, 2, 3],
        };
        let tx = sample_tx().with_user_field(USER_FIELD_SMART_CONTRACT, invocation.to_bytes());
        assert_eq!(tx.kind(), TransactionKind::ContractDeploy);
    }

    #[test]
    fn contract_call_detected_by_nonempty_method() {
        let invocation = SmartContractInvocation {
            contract: PublicKey::zero(),
            method: "transfer".into(),
            params: vec![],
        };
        let tx = sample_tx().with_user_field(USER_FIELD_SMART_CONTRACT, invocation.to_bytes());
        assert_eq!(tx.kind(), TransactionKind::ContractCall);
    }

    #[test]
    fn state_update_detected_by_new_state_field() {
        let tx = sample_tx().with_user_field(USER_FIELD_NEW_STATE, vec![9, 9, 9]);
        assert_eq!(tx.kind(), TransactionKind::ContractStateUpdate);
    }

    #[test]
    fn inner_id_masks_to_46_bits() {
        let id = InnerId::new(u64::MAX);
        assert_eq!(id.value(), INNER_ID_MASK);
    }

    #[test]
    fn total_debit_is_amount_plus_fee() {
        let tx = sample_tx();
        assert_eq!(tx.total_debit().unwrap(), Amount::from_units(1_010));
    }
}
