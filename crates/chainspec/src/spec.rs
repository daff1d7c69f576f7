//! The chain specification itself: genesis allocation plus hardfork
//! activation schedule.

use std::collections::BTreeMap;

use alloy_chains::Chain;
use alloy_eips::eip4895::Withdrawals;
use alloy_genesis::Genesis;
use alloy_primitives::{B256, U256};
use execution_ethereum_forks::{ForkCondition, Hardfork};
use execution_primitives_traits::{
    constants::{EIP1559_INITIAL_BASE_FEE, EMPTY_OMMER_ROOT_HASH, EMPTY_ROOT_HASH, EMPTY_WITHDRAWALS_ROOT},
    Header,
};
use once_cell::sync::OnceCell;

use crate::BaseFeeParams;

/// A chain's genesis block and hardfork activation schedule.
///
/// Mirrors the teacher's `reth-chainspec::ChainSpec`: the schedule is a
/// plain ordered map from [`Hardfork`] to [`ForkCondition`] rather than a
/// bespoke enum-of-every-fork, so new forks only require a new map entry.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    /// EIP-155 chain id.
    pub chain: Chain,
    /// The genesis block definition (alloc, config, genesis gas/timestamp).
    pub genesis: Genesis,
    /// Activation condition for every known hardfork on this chain.
    pub hardforks: BTreeMap<Hardfork, ForkCondition>,
    /// EIP-1559 base fee adjustment parameters.
    pub base_fee_params: BaseFeeParams,
    /// Lazily computed, memoized genesis block hash.
    genesis_hash: OnceCell<B256>,
}

impl ChainSpec {
    /// The hardfork active at `(block_number, timestamp)`, i.e. the
    /// highest-ordered hardfork whose condition is satisfied. Falls back
    /// to [`Hardfork::Frontier`] if somehow none are configured.
    pub fn fork_at(&self, block_number: u64, timestamp: u64) -> Hardfork {
        self.hardforks
            .iter()
            .filter(|(_, condition)| condition.active_at(block_number, timestamp))
            .map(|(fork, _)| *fork)
            .max()
            .unwrap_or(Hardfork::Frontier)
    }

    /// Whether `fork` is active at `(block_number, timestamp)`.
    pub fn is_fork_active_at(&self, fork: Hardfork, block_number: u64, timestamp: u64) -> bool {
        self.hardforks
            .get(&fork)
            .is_some_and(|condition| condition.active_at(block_number, timestamp))
    }

    /// Whether EIP-1559 base fees apply at `(block_number, timestamp)`.
    pub fn is_london_active_at(&self, block_number: u64, timestamp: u64) -> bool {
        self.is_fork_active_at(Hardfork::London, block_number, timestamp)
    }

    /// Whether withdrawals (EIP-4895) apply at `(block_number, timestamp)`.
    pub fn is_shanghai_active_at_timestamp(&self, timestamp: u64) -> bool {
        self.hardforks
            .get(&Hardfork::Shanghai)
            .is_some_and(|c| matches!(c, ForkCondition::Timestamp(t) if timestamp >= *t))
    }

    /// Whether blob transactions (EIP-4844) apply at the given timestamp.
    pub fn is_cancun_active_at_timestamp(&self, timestamp: u64) -> bool {
        self.hardforks
            .get(&Hardfork::Cancun)
            .is_some_and(|c| matches!(c, ForkCondition::Timestamp(t) if timestamp >= *t))
    }

    /// Whether EIP-7685 requests apply at the given timestamp.
    pub fn is_prague_active_at_timestamp(&self, timestamp: u64) -> bool {
        self.hardforks
            .get(&Hardfork::Prague)
            .is_some_and(|c| matches!(c, ForkCondition::Timestamp(t) if timestamp >= *t))
    }

    /// The EIP-1559 base fee every block at the London activation height
    /// starts from, absent a parent to derive it from.
    pub const fn initial_base_fee(&self) -> u64 {
        EIP1559_INITIAL_BASE_FEE
    }

    /// Builds the genesis header from `self.genesis`, with the trie
    /// roots a freshly allocated state and empty body always have.
    pub fn genesis_header(&self) -> Header {
        let config = &self.genesis.config;
        let is_shanghai = config.shanghai_time.is_some_and(|t| self.genesis.timestamp >= t);
        let is_cancun = config.cancun_time.is_some_and(|t| self.genesis.timestamp >= t);

        Header {
            parent_hash: B256::ZERO,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: self.genesis.coinbase,
            state_root: B256::ZERO,
            transactions_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            logs_bloom: Default::default(),
            difficulty: self.genesis.difficulty,
            number: 0,
            gas_limit: self.genesis.gas_limit,
            gas_used: 0,
            timestamp: self.genesis.timestamp,
            extra_data: self.genesis.extra_data.clone(),
            mix_hash: self.genesis.mix_hash,
            nonce: self.genesis.nonce.into(),
            base_fee_per_gas: self.genesis.base_fee_per_gas.map(|v| v as u64),
            withdrawals_root: is_shanghai.then_some(EMPTY_WITHDRAWALS_ROOT),
            blob_gas_used: is_cancun.then_some(0),
            excess_blob_gas: is_cancun.then_some(0),
            parent_beacon_block_root: is_cancun.then_some(B256::ZERO),
            requests_hash: None,
        }
    }

    /// The genesis block hash, computed once and memoized.
    pub fn genesis_hash(&self) -> B256 {
        *self.genesis_hash.get_or_init(|| self.genesis_header().hash_slow())
    }

    /// An empty withdrawals list for a Shanghai-active genesis/body.
    pub fn empty_withdrawals() -> Withdrawals {
        Withdrawals::default()
    }
}

/// Ethereum mainnet: chain id 1, full historical fork schedule.
pub static MAINNET: once_cell::sync::Lazy<ChainSpec> = once_cell::sync::Lazy::new(|| ChainSpec {
    chain: Chain::mainnet(),
    genesis: Genesis::default(),
    hardforks: BTreeMap::from([
        (Hardfork::Frontier, ForkCondition::Block(0)),
        (Hardfork::Homestead, ForkCondition::Block(1_150_000)),
        (Hardfork::Dao, ForkCondition::Block(1_920_000)),
        (Hardfork::Tangerine, ForkCondition::Block(2_463_000)),
        (Hardfork::SpuriousDragon, ForkCondition::Block(2_675_000)),
        (Hardfork::Byzantium, ForkCondition::Block(4_370_000)),
        (Hardfork::Constantinople, ForkCondition::Block(7_280_000)),
        (Hardfork::Petersburg, ForkCondition::Block(7_280_000)),
        (Hardfork::Istanbul, ForkCondition::Block(9_069_000)),
        (Hardfork::MuirGlacier, ForkCondition::Block(9_200_000)),
        (Hardfork::Berlin, ForkCondition::Block(12_244_000)),
        (Hardfork::London, ForkCondition::Block(12_965_000)),
        (Hardfork::ArrowGlacier, ForkCondition::Block(13_773_000)),
        (Hardfork::GrayGlacier, ForkCondition::Block(15_050_000)),
        (Hardfork::Paris, ForkCondition::Block(15_537_394)),
        (Hardfork::Shanghai, ForkCondition::Timestamp(1_681_338_455)),
        (Hardfork::Cancun, ForkCondition::Timestamp(1_710_338_135)),
        (Hardfork::Prague, ForkCondition::Timestamp(1_746_612_311)),
        (Hardfork::Osaka, ForkCondition::Never),
    ]),
    base_fee_params: BaseFeeParams::ETHEREUM,
    genesis_hash: OnceCell::new(),
});

/// Sepolia testnet: chain id 11155111.
pub static SEPOLIA: once_cell::sync::Lazy<ChainSpec> = once_cell::sync::Lazy::new(|| ChainSpec {
    chain: Chain::sepolia(),
    genesis: Genesis::default(),
    hardforks: BTreeMap::from([
        (Hardfork::Frontier, ForkCondition::Block(0)),
        (Hardfork::Homestead, ForkCondition::Block(0)),
        (Hardfork::Dao, ForkCondition::Block(0)),
        (Hardfork::Tangerine, ForkCondition::Block(0)),
        (Hardfork::SpuriousDragon, ForkCondition::Block(0)),
        (Hardfork::Byzantium, ForkCondition::Block(0)),
        (Hardfork::Constantinople, ForkCondition::Block(0)),
        (Hardfork::Petersburg, ForkCondition::Block(0)),
        (Hardfork::Istanbul, ForkCondition::Block(0)),
        (Hardfork::MuirGlacier, ForkCondition::Block(0)),
        (Hardfork::Berlin, ForkCondition::Block(0)),
        (Hardfork::London, ForkCondition::Block(0)),
        (Hardfork::ArrowGlacier, ForkCondition::Block(0)),
        (Hardfork::GrayGlacier, ForkCondition::Block(0)),
        (Hardfork::Paris, ForkCondition::Block(1_735_371)),
        (Hardfork::Shanghai, ForkCondition::Timestamp(1_677_557_088)),
        (Hardfork::Cancun, ForkCondition::Timestamp(1_706_655_072)),
        (Hardfork::Prague, ForkCondition::Timestamp(1_741_159_776)),
        (Hardfork::Osaka, ForkCondition::Never),
    ]),
    base_fee_params: BaseFeeParams::ETHEREUM,
    genesis_hash: OnceCell::new(),
});

/// An all-forks-at-genesis development chain, the default for local
/// testing and the miner's devnet path.
pub static DEV: once_cell::sync::Lazy<ChainSpec> = once_cell::sync::Lazy::new(|| ChainSpec {
    chain: Chain::from_id(1337),
    genesis: Genesis::default(),
    hardforks: BTreeMap::from(
        Hardfork::ALL.map(|fork| {
            let condition = if fork.is_timestamp_activated() {
                ForkCondition::Timestamp(0)
            } else {
                ForkCondition::Block(0)
            };
            (fork, condition)
        }),
    ),
    base_fee_params: BaseFeeParams::ETHEREUM,
    genesis_hash: OnceCell::new(),
});

/// Builder for custom chain specifications, e.g. test fixtures that need
/// a specific fork boundary.
#[derive(Debug, Default)]
pub struct ChainSpecBuilder {
    chain: Option<Chain>,
    genesis: Option<Genesis>,
    hardforks: BTreeMap<Hardfork, ForkCondition>,
    base_fee_params: Option<BaseFeeParams>,
}

impl ChainSpecBuilder {
    /// Starts a new builder with no hardforks configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chain id.
    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Sets the genesis definition.
    pub fn genesis(mut self, genesis: Genesis) -> Self {
        self.genesis = Some(genesis);
        self
    }

    /// Adds or overwrites a single hardfork's activation condition.
    pub fn with_fork(mut self, fork: Hardfork, condition: ForkCondition) -> Self {
        self.hardforks.insert(fork, condition);
        self
    }

    /// Builds the [`ChainSpec`], defaulting unset fields.
    pub fn build(self) -> ChainSpec {
        ChainSpec {
            chain: self.chain.unwrap_or_else(Chain::mainnet),
            genesis: self.genesis.unwrap_or_default(),
            hardforks: self.hardforks,
            base_fee_params: self.base_fee_params.unwrap_or_default(),
            genesis_hash: OnceCell::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_fork_at_merge_boundary() {
        assert_eq!(MAINNET.fork_at(15_537_394, 0), Hardfork::Paris);
        assert_eq!(MAINNET.fork_at(15_537_393, 0), Hardfork::GrayGlacier);
    }

    #[test]
    fn mainnet_fork_at_shanghai_boundary() {
        assert_eq!(MAINNET.fork_at(20_000_000, 1_681_338_455), Hardfork::Shanghai);
        assert_eq!(MAINNET.fork_at(20_000_000, 1_681_338_454), Hardfork::Paris);
    }

    #[test]
    fn dev_chain_activates_everything_at_genesis() {
        assert_eq!(DEV.fork_at(0, 0), Hardfork::Osaka);
    }

    #[test]
    fn genesis_hash_is_memoized() {
        let spec = ChainSpecBuilder::new().build();
        let first = spec.genesis_hash();
        let second = spec.genesis_hash();
        assert_eq!(first, second);
    }
}
