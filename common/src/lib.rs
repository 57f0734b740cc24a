//! Wire types, crypto handles, amounts and errors shared by the ledger
//! engine. Kept dependency-light and free of async runtimes — everything
//! here is plain data plus deterministic (de)serialization, consumed by the
//! `core` crate's Conveyer/Generals/Validator/BlockChain.

pub mod amount;
pub mod characteristic;
pub mod config;
pub mod crypto;
pub mod error;
pub mod packet;
pub mod pool;
pub mod serializer;
pub mod time;
pub mod transaction;
