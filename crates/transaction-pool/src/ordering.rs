//! The block builder's price-sorted view over pending transactions
//! (§4.3 "Price-sorted iterator"): a priority heap of per-sender heads,
//! where each sender contributes exactly one candidate at a time and
//! advancing past it (`shift`) reveals that sender's next nonce.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet, VecDeque},
    sync::Arc,
};

use alloy_primitives::Address;

use crate::{pool::ValidPoolTransaction, tx::PoolTransaction};

/// Parameters the iterator is built against: the base fee pending
/// transactions must clear to be eligible, and which senders (if any)
/// bypass the fee ordering entirely.
#[derive(Debug, Clone, Default)]
pub struct BestTransactionsAttributes {
    /// The base fee in effect for the block being built.
    pub base_fee: u64,
    /// Senders surfaced first regardless of fee (§4.3 "Priority
    /// addresses").
    pub priority_addresses: HashSet<Address>,
}

impl BestTransactionsAttributes {
    /// Attributes with no priority senders, ordering purely by fee.
    pub fn for_base_fee(base_fee: u64) -> Self {
        Self { base_fee, priority_addresses: HashSet::new() }
    }
}

/// One sender's current candidate transaction in the heap.
struct SenderHead<T: PoolTransaction> {
    sender: Address,
    tx: Arc<ValidPoolTransaction<T>>,
    priority: bool,
    tip: u128,
}

impl<T: PoolTransaction> PartialEq for SenderHead<T> {
    fn eq(&self, other: &Self) -> bool {
        self.sender == other.sender && self.tx.transaction.nonce() == other.tx.transaction.nonce()
    }
}
impl<T: PoolTransaction> Eq for SenderHead<T> {}

impl<T: PoolTransaction> PartialOrd for SenderHead<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: PoolTransaction> Ord for SenderHead<T> {
    /// Priority senders first, then fee descending, then earliest
    /// `added` wins ties (§4.3). `BinaryHeap` is a max-heap, so "wins"
    /// must compare as `Greater`; `added` is reversed accordingly.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.tip.cmp(&other.tip))
            .then_with(|| other.tx.added.cmp(&self.tx.added))
    }
}

/// Incremental, profit-maximizing iterator over pending transactions.
///
/// `peek()`/`shift()`/`pop()` mirror §4.3's block-builder selection
/// loop exactly; the `Iterator` implementation is a convenience wrapper
/// for callers (e.g. tests) that just want "the next best transaction"
/// without distinguishing acceptance from rejection.
pub struct BestTransactions<T: PoolTransaction> {
    heap: BinaryHeap<SenderHead<T>>,
    remaining: HashMap<Address, VecDeque<Arc<ValidPoolTransaction<T>>>>,
    base_fee: u64,
}

impl<T: PoolTransaction> BestTransactions<T> {
    pub(crate) fn new(
        per_sender: impl IntoIterator<Item = (Address, Vec<Arc<ValidPoolTransaction<T>>>)>,
        attributes: BestTransactionsAttributes,
    ) -> Self {
        let mut heap = BinaryHeap::new();
        let mut remaining = HashMap::new();
        for (sender, mut txs) in per_sender {
            if txs.is_empty() {
                continue;
            }
            let head = txs.remove(0);
            let Some(tip) = head.transaction.effective_tip_per_gas(attributes.base_fee) else {
                continue;
            };
            remaining.insert(sender, VecDeque::from(txs));
            heap.push(SenderHead {
                sender,
                tx: head,
                priority: attributes.priority_addresses.contains(&sender),
                tip,
            });
        }
        Self { heap, remaining, base_fee: attributes.base_fee }
    }

    /// The current best candidate, without consuming it.
    pub fn peek(&self) -> Option<&Arc<ValidPoolTransaction<T>>> {
        self.heap.peek().map(|h| &h.tx)
    }

    /// Accepts the current candidate: drops it from the heap and
    /// replaces it with the same sender's next pending nonce, if the
    /// next transaction still clears the base fee.
    pub fn shift(&mut self) {
        let Some(head) = self.heap.pop() else { return };
        let Some(queue) = self.remaining.get_mut(&head.sender) else { return };
        while let Some(next) = queue.pop_front() {
            if let Some(tip) = next.transaction.effective_tip_per_gas(self.base_fee) {
                self.heap.push(SenderHead { sender: head.sender, tx: next, priority: head.priority, tip });
                return;
            }
            // The next nonce no longer clears the base fee: it and
            // everything behind it becomes non-executable, same as an
            // explicit `pop()` of this sender.
            self.remaining.remove(&head.sender);
            return;
        }
    }

    /// Rejects the current candidate's sender entirely: every
    /// higher-nonce transaction from that sender becomes non-executable
    /// once one nonce in the sequence fails (§4.3 `pop()`).
    pub fn pop(&mut self) {
        if let Some(head) = self.heap.pop() {
            self.remaining.remove(&head.sender);
        }
    }
}

impl<T: PoolTransaction> Iterator for BestTransactions<T> {
    type Item = Arc<ValidPoolTransaction<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.peek()?.clone();
        self.shift();
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::EthPooledTransaction;
    use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
    use alloy_primitives::{Signature, U256};
    use execution_primitives::TransactionSignedEcRecovered;

    fn signed(nonce: u64, max_fee: u128, priority_fee: u128) -> Arc<ValidPoolTransaction<EthPooledTransaction>> {
        let tx = TxEip1559 {
            chain_id: 1,
            nonce,
            gas_limit: 21_000,
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
            to: alloy_primitives::TxKind::Call(Address::ZERO),
            value: U256::ZERO,
            ..Default::default()
        };
        let signature = Signature::test_signature();
        let envelope = TxEnvelope::Eip1559(tx.into_signed(signature));
        let recovered = TransactionSignedEcRecovered::from_signed_transaction(envelope, Address::repeat_byte(1));
        Arc::new(ValidPoolTransaction {
            transaction: EthPooledTransaction::new(recovered),
            added: nonce,
            origin: crate::tx::TransactionOrigin::External,
        })
    }

    #[test]
    fn higher_tip_sender_goes_first() {
        let cheap = signed(0, 10, 1);
        let rich = signed(0, 10, 5);
        let cheap_sender = Address::repeat_byte(2);
        let rich_sender = Address::repeat_byte(3);
        let mut iter = BestTransactions::new(
            [(cheap_sender, vec![cheap]), (rich_sender, vec![rich])],
            BestTransactionsAttributes::for_base_fee(1),
        );
        let first = iter.next().unwrap();
        assert_eq!(first.transaction.max_priority_fee_per_gas(), Some(5));
    }

    #[test]
    fn shift_advances_to_next_nonce_for_same_sender() {
        let sender = Address::repeat_byte(4);
        let first = signed(0, 10, 5);
        let second = signed(1, 10, 5);
        let mut iter =
            BestTransactions::new([(sender, vec![first, second])], BestTransactionsAttributes::for_base_fee(1));
        assert_eq!(iter.peek().unwrap().transaction.nonce(), 0);
        iter.shift();
        assert_eq!(iter.peek().unwrap().transaction.nonce(), 1);
    }

    #[test]
    fn pop_drops_entire_sender() {
        let sender = Address::repeat_byte(5);
        let first = signed(0, 10, 5);
        let second = signed(1, 10, 5);
        let mut iter =
            BestTransactions::new([(sender, vec![first, second])], BestTransactionsAttributes::for_base_fee(1));
        iter.pop();
        assert!(iter.peek().is_none());
    }
}
