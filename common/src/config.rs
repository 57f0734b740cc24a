//! Protocol constants (spec.md §6 "Constants"). Kept separate from the
//! process `Config` struct in the `core` crate, the way the teacher
//! separates `tos_common::config` (protocol-wide constants) from
//! `tos_daemon::config` (node-local runtime settings).

/// Packet is sealed immediately once it reaches this many transactions,
/// without waiting for the flush timer (spec.md §4.1, §8 boundary).
pub const MAX_PACKET_TRANSACTIONS: usize = 500;

/// Flush timer period for an open (not yet sealed) packet.
pub const TRANSACTIONS_PACKET_INTERVAL_MS: u64 = 50;

/// Number of past rounds' packet tables / needed-hash sets / characteristic
/// metas kept before eviction (spec.md §3, §4.1).
pub const HASH_TABLES_STORAGE_CAPACITY: usize = 5;

/// Number of most-recently-sealed packets a new main node may reference
/// when building the next round table (spec.md §9 open question c).
pub const TRANSACTIONS_FLUSH_ROUND: usize = 2;

/// Per-wallet bounded history ring capacity (spec.md §3 WalletsPools entry).
pub const WALLET_POOLS_CAPACITY: usize = 256;

/// Soft ceiling on per-wallet-per-pool transaction counter saturation, so
/// the counter never needs more than a `u16` (spec.md §3).
pub const MAX_TRX_NUM_PER_POOL_HASH: u16 = u16::MAX;

/// Documented ceiling on confidants per round (spec.md §9, the technical
/// paper's ≤101 bound); scratch buffers in `Generals::add_matrix` are sized
/// to the live confidant count, never to this constant, but callers may use
/// it to pre-size unrelated fixed allocations if ever needed.
pub const MAX_CONFIDANTS: usize = 101;

/// Default executor RPC timeouts (spec.md §6 Configuration), milliseconds.
pub const DEFAULT_EXECUTOR_SEND_TIMEOUT_MS: u64 = 4000;
pub const DEFAULT_EXECUTOR_RECEIVE_TIMEOUT_MS: u64 = 4000;
