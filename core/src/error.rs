//! Error kinds for the core crate (spec.md §7). Leaf errors are
//! `thiserror`-derived enums specific to a subsystem; call sites that
//! aggregate across subsystems (the solver loop, public entry points)
//! collapse them into `anyhow::Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConveyerError {
    #[error("packet already sealed, no further transactions accepted")]
    PacketSealed,
    #[error("round {requested} is older than the current round {current}")]
    StaleRound { requested: usize, current: usize },
    #[error("hash table storage exhausted at capacity {capacity}")]
    StorageExhausted { capacity: usize },
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("wallet {0} has no known balance record")]
    UnknownWallet(u32),
    #[error("transaction would drive wallet {wallet} balance negative (need {need}, have {have})")]
    InsufficientFunds { wallet: u32, need: u64, have: u64 },
}

#[derive(Debug, Error)]
pub enum GeneralsError {
    #[error("hash vector from sender {0} already recorded this round")]
    DuplicateVector(u8),
    #[error("writer index {index} out of range for {confidants} confidants")]
    WriterOutOfRange { index: usize, confidants: usize },
    #[error("not enough confirmed vectors to reach trusted threshold ({have}/{needed})")]
    BelowTrustedThreshold { have: usize, needed: usize },
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("pool sequence {incoming} does not follow chain head {head}")]
    SequenceMismatch { head: u64, incoming: u64 },
    #[error("pool prev_hash does not match chain head hash")]
    PrevHashMismatch,
    #[error("pool signature at index {0} is missing")]
    MissingSignature(u8),
    #[error("transaction references a wallet with no assigned id and bySync forbids creating one")]
    UnknownWallet,
    #[error(transparent)]
    Storage(#[from] ledger_common::error::StorageError),
}
