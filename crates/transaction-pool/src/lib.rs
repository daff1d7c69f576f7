//! Pending/queued transaction pool (§4.3).
//!
//! [`pool::TxPool`] is the pool itself; [`ordering::BestTransactions`] is
//! the price-sorted view the block builder consumes from it.

mod error;
mod ordering;
mod pool;
mod tx;

pub use error::{InvalidPoolTransactionError, PoolError, PoolResult};
pub use ordering::{BestTransactions, BestTransactionsAttributes};
pub use pool::{PoolAccountReader, PoolConfig, TxPool, ValidPoolTransaction};
pub use tx::{EthPooledTransaction, PoolTransaction, TransactionOrigin};
