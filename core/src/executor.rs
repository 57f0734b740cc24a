//! Smart-contract executor RPC boundary (spec.md §4.5/§6). The original
//! talks to an out-of-process executor over Thrift; this crate keeps only
//! the trait seam plus an in-memory double, matching the teacher's pattern
//! of representing external service boundaries as a trait with a
//! lightweight stub for tests (no real transport is implemented, per
//! Non-goals).

use async_trait::async_trait;
use dashmap::DashMap;

use ledger_common::crypto::PublicKey;
use ledger_common::transaction::SmartContractInvocation;

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub new_state: Vec<u8>,
    pub success: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("executor call timed out")]
    Timeout,
    #[error("executor rejected the call: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ExecutorClient: Send + Sync {
    async fn execute(
        &self,
        contract: &PublicKey,
        invocation: &SmartContractInvocation,
    ) -> Result<ExecutionResult, ExecutorError>;
}

/// Test/local double: deploys always succeed with empty state, calls echo
/// their params back as the new state. Good enough to exercise the
/// `ContractDeploy`/`ContractCall` paths in the validator without a real
/// executor process.
pub struct NullExecutor;

#[async_trait]
impl ExecutorClient for NullExecutor {
    async fn execute(
        &self,
        _contract: &PublicKey,
        invocation: &SmartContractInvocation,
    ) -> Result<ExecutionResult, ExecutorError> {
        Ok(ExecutionResult {
            new_state: invocation.params.clone(),
            success: true,
        })
    }
}

/// Serializes calls into the same contract so two pools landing in the
/// same round can't race each other through the executor (spec.md §5
/// `lockSmarts`). One `tokio::sync::Mutex<()>` per contract, keyed in a
/// `DashMap` rather than behind one global lock, the way the teacher
/// reaches for `dashmap` wherever it needs per-key locking.
#[derive(Default)]
pub struct ContractLocks {
    locks: DashMap<PublicKey, std::sync::Arc<tokio::sync::Mutex<()>>>,
}

impl ContractLocks {
    pub fn new() -> Self {
        ContractLocks::default()
    }

    pub async fn lock(&self, contract: &PublicKey) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(*contract)
            .or_insert_with(|| std::sync::Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_executor_echoes_params_as_new_state() {
        let executor = NullExecutor;
        let invocation = SmartContractInvocation {
            contract: PublicKey::zero(),
            method: "call".into(),
            params: vec![1, 2, 3],
        };
        let result = executor.execute(&PublicKey::zero(), &invocation).await.unwrap();
        assert!(result.success);
        assert_eq!(result.new_state, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn same_contract_lock_is_reentrant_safe_across_calls() {
        let locks = ContractLocks::new();
        let contract = PublicKey::from_slice(&[4u8; 32]).unwrap();
        {
            let _guard = locks.lock(&contract).await;
        }
        // lock released at end of scope; acquiring again must not deadlock.
        let _guard = locks.lock(&contract).await;
    }
}
