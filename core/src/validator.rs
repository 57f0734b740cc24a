//! Two-phase transaction admission, grounded in
//! `solver/solver/include/solver/TransactionsValidator.h`. Phase A
//! tentatively debits every transaction against a scratch balance sheet
//! seeded from the wallets cache. Phase B walks the resulting negative
//! balances and evicts transactions along their dependency graph
//! (`validateByGraph` / `removeTransactions_*`) until every wallet clears,
//! or the configured cap on how many negative wallets to chase is hit.

use std::collections::HashMap;

use ledger_common::amount::Amount;
use ledger_common::crypto::WalletId;
use ledger_common::transaction::Transaction;

use crate::wallets_cache::WalletsCache;

/// `TransactionsValidator::Config` (`TransactionsValidator.h`): bounds how
/// many distinct negative wallets phase B will chase before giving up and
/// evicting everything touching a still-negative wallet.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorConfig {
    pub initial_neg_nodes_num: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig { initial_neg_nodes_num: 50 }
    }
}

/// Admits a batch of transactions (e.g. a just-sealed packet) against
/// `cache`, returning the indices of transactions that survive. Transaction
/// order within the input is preserved for the survivors. Source wallets
/// never observed by `cache` are treated as zero-balance, not rejected
/// outright — matching the original's "unknown wallet starts at 0" stance.
pub struct TransactionsValidator {
    config: ValidatorConfig,
}

impl TransactionsValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        TransactionsValidator { config }
    }

    /// Phase A + Phase B combined (spec.md §4.3). `resolve` maps a
    /// transaction's source/target public keys to interned wallet ids.
    pub fn validate(
        &self,
        transactions: &[Transaction],
        cache: &WalletsCache,
        resolve: impl Fn(&Transaction) -> (WalletId, WalletId),
    ) -> Vec<usize> {
        let mut accepted: Vec<bool> = vec![true; transactions.len()];
        let mut balance: HashMap<WalletId, i128> = HashMap::new();
        // Per-wallet debit list in packet order, so phase B can pop the
        // most recent debit off the back first (spec.md §4.3 "within a
        // wallet's debit list, most-recent first").
        let mut debit_indices: HashMap<WalletId, Vec<usize>> = HashMap::new();
        let mut negative_stack: Vec<WalletId> = Vec::new();

        // Phase A: tentatively apply amount + maxFee debit / amount credit,
        // pushing any wallet driven negative onto the stack.
        for (index, tx) in transactions.iter().enumerate() {
            let (source, target) = resolve(tx);
            let debit = tx.total_debit().map(|a| a.units() as i128).unwrap_or(i128::MAX);

            let source_balance = balance.entry(source).or_insert_with(|| cache.balance(source).units() as i128);
            *source_balance -= debit;
            debit_indices.entry(source).or_default().push(index);
            if *source_balance < 0 && !negative_stack.contains(&source) {
                negative_stack.push(source);
            }

            let target_balance = balance.entry(target).or_insert_with(|| cache.balance(target).units() as i128);
            *target_balance += tx.amount.units() as i128;
        }

        // Phase B: pop each negative wallet off the stack (LIFO) and run
        // the eviction cascade: try dropping only its most recent debit
        // (PositiveOne) before evicting every debit it made (PositiveAll).
        // Crediting a transaction's target back out of the ledger can push
        // that target negative in turn, which re-queues it for its own pass.
        let mut chased = 0usize;
        while let Some(wallet) = negative_stack.pop() {
            if chased >= self.config.initial_neg_nodes_num {
                self.evict_all(wallet, &debit_indices, &mut accepted, &mut balance, transactions, &resolve, &mut negative_stack);
                continue;
            }
            chased += 1;

            let debits = debit_indices.get(&wallet).cloned().unwrap_or_default();
            let last_accepted_debit = debits.iter().rev().find(|&&i| accepted[i]).copied();

            let restored_by_one = last_accepted_debit.map(|i| {
                let debit = transactions[i].total_debit().map(|a| a.units() as i128).unwrap_or(i128::MAX);
                *balance.get(&wallet).unwrap_or(&0) + debit >= 0
            });

            if restored_by_one == Some(true) {
                let index = last_accepted_debit.unwrap();
                accepted[index] = false;
                let debit = transactions[index].total_debit().map(|a| a.units() as i128).unwrap_or(i128::MAX);
                *balance.entry(wallet).or_insert(0) += debit;
                self.retarget_credit(index, transactions, &resolve, &mut balance, &mut negative_stack);
            } else {
                self.evict_all(wallet, &debit_indices, &mut accepted, &mut balance, transactions, &resolve, &mut negative_stack);
            }
        }

        accepted
            .into_iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect()
    }

    /// PositiveAll: evicts every still-accepted debit a wallet made, then
    /// reverses the matching credit the way `retarget_credit` does for each
    /// one (NegativeAll — may re-queue the target as newly negative).
    fn evict_all(
        &self,
        wallet: WalletId,
        debit_indices: &HashMap<WalletId, Vec<usize>>,
        accepted: &mut [bool],
        balance: &mut HashMap<WalletId, i128>,
        transactions: &[Transaction],
        resolve: &impl Fn(&Transaction) -> (WalletId, WalletId),
        negative_stack: &mut Vec<WalletId>,
    ) {
        let Some(debits) = debit_indices.get(&wallet) else { return };
        for &index in debits {
            if !accepted[index] {
                continue;
            }
            accepted[index] = false;
            let debit = transactions[index].total_debit().map(|a| a.units() as i128).unwrap_or(i128::MAX);
            *balance.entry(wallet).or_insert(0) += debit;
            self.retarget_credit(index, transactions, resolve, balance, negative_stack);
        }
    }

    /// NegativeOne/NegativeAll: reverses the credit an evicted transaction
    /// made to its target, re-queuing the target if that now drives it
    /// negative (its credits came from a transaction that no longer counts).
    fn retarget_credit(
        &self,
        index: usize,
        transactions: &[Transaction],
        resolve: &impl Fn(&Transaction) -> (WalletId, WalletId),
        balance: &mut HashMap<WalletId, i128>,
        negative_stack: &mut Vec<WalletId>,
    ) {
        let (_source, target) = resolve(&transactions[index]);
        let target_balance = balance.entry(target).or_insert(0);
        *target_balance -= transactions[index].amount.units() as i128;
        if *target_balance < 0 && !negative_stack.contains(&target) {
            negative_stack.push(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_common::crypto::{PublicKey, Signature};
    use ledger_common::transaction::InnerId;

    fn tx(source: u8, target: u8, amount: u64, fee: u64) -> Transaction {
        Transaction::new(
            PublicKey::from_slice(&[source; 32]).unwrap(),
            PublicKey::from_slice(&[target; 32]).unwrap(),
            Amount::from_units(amount),
            InnerId::new(amount),
            Amount::from_units(fee),
            Signature::zero(),
        )
    }

    fn resolver(tx: &Transaction) -> (WalletId, WalletId) {
        (WalletId(tx.source.as_bytes()[0] as u32), WalletId(tx.target.as_bytes()[0] as u32))
    }

    #[test]
    fn affordable_transaction_survives() {
        let mut cache = WalletsCache::new();
        cache.credit(WalletId(1), Amount::from_units(100)).unwrap();
        let validator = TransactionsValidator::new(ValidatorConfig::default());
        let txs = vec![tx(1, 2, 50, 1)];
        let kept = validator.validate(&txs, &cache, resolver);
        assert_eq!(kept, vec![0]);
    }

    #[test]
    fn overdrawn_transaction_is_evicted() {
        let cache = WalletsCache::new();
        let validator = TransactionsValidator::new(ValidatorConfig::default());
        let txs = vec![tx(1, 2, 50, 1)];
        let kept = validator.validate(&txs, &cache, resolver);
        assert!(kept.is_empty());
    }

    #[test]
    fn double_spend_keeps_only_affordable_prefix() {
        let mut cache = WalletsCache::new();
        cache.credit(WalletId(1), Amount::from_units(100)).unwrap();
        let validator = TransactionsValidator::new(ValidatorConfig::default());
        let txs = vec![tx(1, 2, 80, 0), tx(1, 3, 80, 0)];
        let kept = validator.validate(&txs, &cache, resolver);
        // PositiveOne pops the most recent debit (tx1) first; dropping it
        // alone restores the wallet to non-negative, so tx0 survives.
        assert_eq!(kept, vec![0]);
    }
}
