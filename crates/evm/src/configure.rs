//! Translates chain configuration and headers into revm's `Env` types
//! (§4.2 step 3 "reconfigure [for] the hardfork").

use alloy_consensus::{Transaction as _, TxEnvelope};
use alloy_primitives::{Address, TxKind, U256};
use execution_chainspec::ChainSpec;
use execution_ethereum_forks::Hardfork;
use execution_primitives::{Header, TransactionSigned};
use revm::{db::State, Database, Evm};
use revm_primitives::{
    BlobExcessGasAndPrice, BlockEnv, CfgEnvWithHandlerCfg, EnvWithHandlerCfg, SpecId, TxEnv,
};

/// Knows how to fill revm's block/config/transaction environments for a
/// particular chain. Implementations carry whatever chain configuration
/// (hardfork schedule, chain id) they need to do this without consulting
/// external state.
pub trait ConfigureEvm: Clone + Send + Sync + Unpin + 'static {
    /// The header type this configuration reads fork-activation fields
    /// from (timestamp, number, excess blob gas, ...).
    type Header;

    /// Fills the block environment (and any handler-config bits gated on
    /// hardfork) for replaying `header`. `total_difficulty` disambiguates
    /// pre-merge blocks (where difficulty drives the PoW reward) from
    /// post-merge ones.
    fn fill_cfg_and_block_env(
        &self,
        cfg: &mut CfgEnvWithHandlerCfg,
        block_env: &mut BlockEnv,
        header: &Self::Header,
        total_difficulty: U256,
    );

    /// Fills the transaction environment for one transaction about to be
    /// replayed, given its recovered sender.
    fn fill_tx_env(&self, tx_env: &mut TxEnv, transaction: &TransactionSigned, sender: Address);

    /// Builds the full environment for replaying `header`'s transactions,
    /// leaving the transaction environment at its default (the caller
    /// fills it per-transaction via [`fill_tx_env`](Self::fill_tx_env)).
    fn env_for_block(&self, header: &Self::Header, total_difficulty: U256) -> EnvWithHandlerCfg {
        let mut cfg = CfgEnvWithHandlerCfg::new(Default::default(), Default::default());
        let mut block_env = BlockEnv::default();
        self.fill_cfg_and_block_env(&mut cfg, &mut block_env, header, total_difficulty);
        EnvWithHandlerCfg::new_with_cfg_env(cfg, block_env, Default::default())
    }

    /// Builds an [`Evm`] over `db` configured with `env`.
    fn evm_with_env<'a, DB: Database>(
        &self,
        db: &'a mut State<DB>,
        env: EnvWithHandlerCfg,
    ) -> Evm<'a, (), &'a mut State<DB>> {
        revm::Evm::builder().with_db(db).with_env_with_handler_cfg(env).build()
    }
}

/// Maps the hardfork active at `(header.number, header.timestamp)` to a
/// revm `SpecId`.
pub fn spec_id_at(chain_spec: &ChainSpec, header: &Header) -> SpecId {
    let active = chain_spec.fork_at(header.number, header.timestamp);
    match active {
        Hardfork::Frontier => SpecId::FRONTIER,
        Hardfork::Homestead | Hardfork::Dao => SpecId::HOMESTEAD,
        Hardfork::Tangerine => SpecId::TANGERINE,
        Hardfork::SpuriousDragon => SpecId::SPURIOUS_DRAGON,
        Hardfork::Byzantium => SpecId::BYZANTIUM,
        Hardfork::Constantinople => SpecId::CONSTANTINOPLE,
        Hardfork::Petersburg => SpecId::PETERSBURG,
        Hardfork::Istanbul => SpecId::ISTANBUL,
        Hardfork::MuirGlacier => SpecId::MUIR_GLACIER,
        Hardfork::Berlin => SpecId::BERLIN,
        Hardfork::London => SpecId::LONDON,
        Hardfork::ArrowGlacier => SpecId::ARROW_GLACIER,
        Hardfork::GrayGlacier => SpecId::GRAY_GLACIER,
        Hardfork::Paris => SpecId::MERGE,
        Hardfork::Shanghai => SpecId::SHANGHAI,
        Hardfork::Cancun => SpecId::CANCUN,
        // SpecId has no dedicated Osaka variant yet; Prague is the latest
        // spec revm understands and a superset of Osaka's known changes.
        Hardfork::Prague | Hardfork::Osaka => SpecId::PRAGUE,
    }
}

/// Fills `tx_env` from an already-decoded, already-recovered transaction.
pub fn fill_tx_env(tx_env: &mut TxEnv, transaction: &TransactionSigned, sender: Address) {
    tx_env.caller = sender;
    tx_env.gas_limit = transaction.gas_limit();
    tx_env.gas_price = U256::from(transaction.max_fee_per_gas());
    tx_env.gas_priority_fee = transaction.max_priority_fee_per_gas().map(U256::from);
    tx_env.transact_to = match transaction.to() {
        Some(to) => TxKind::Call(to),
        None => TxKind::Create,
    };
    tx_env.value = transaction.value();
    tx_env.data = transaction.input().clone();
    tx_env.chain_id = transaction.chain_id();
    tx_env.nonce = Some(transaction.nonce());
    tx_env.access_list = transaction.access_list().cloned().unwrap_or_default().0;

    match transaction {
        TxEnvelope::Eip4844(signed) => {
            let tx = signed.tx();
            tx_env.blob_hashes = tx.blob_versioned_hashes().map(<[_]>::to_vec).unwrap_or_default();
            tx_env.max_fee_per_blob_gas = transaction.max_fee_per_blob_gas().map(U256::from);
        }
        _ => {
            tx_env.blob_hashes.clear();
            tx_env.max_fee_per_blob_gas = None;
        }
    }

    tx_env.authorization_list = match transaction {
        TxEnvelope::Eip7702(signed) => Some(revm_primitives::AuthorizationList::Signed(
            signed.tx().authorization_list.clone(),
        )),
        _ => None,
    };
}

/// The canonical [`ConfigureEvm`] for unmodified mainnet-Ethereum rules.
#[derive(Debug, Clone)]
pub struct EthEvmConfig {
    chain_spec: std::sync::Arc<ChainSpec>,
}

impl EthEvmConfig {
    /// Creates a new configuration for `chain_spec`.
    pub const fn new(chain_spec: std::sync::Arc<ChainSpec>) -> Self {
        Self { chain_spec }
    }

    /// The chain spec this configuration was built with.
    pub fn chain_spec(&self) -> &ChainSpec {
        &self.chain_spec
    }
}

impl ConfigureEvm for EthEvmConfig {
    type Header = Header;

    fn fill_cfg_and_block_env(
        &self,
        cfg: &mut CfgEnvWithHandlerCfg,
        block_env: &mut BlockEnv,
        header: &Header,
        total_difficulty: U256,
    ) {
        cfg.chain_id = self.chain_spec.chain.id();
        cfg.spec_id = spec_id_at(&self.chain_spec, header);

        block_env.number = U256::from(header.number);
        block_env.coinbase = header.beneficiary;
        block_env.timestamp = U256::from(header.timestamp);
        block_env.gas_limit = U256::from(header.gas_limit);
        block_env.basefee = U256::from(header.base_fee_per_gas.unwrap_or_default());
        block_env.difficulty = if total_difficulty.is_zero() { U256::ZERO } else { header.difficulty };
        block_env.prevrandao = Some(header.mix_hash);
        block_env.blob_excess_gas_and_price =
            header.excess_blob_gas.map(BlobExcessGasAndPrice::new);
    }

    fn fill_tx_env(&self, tx_env: &mut TxEnv, transaction: &TransactionSigned, sender: Address) {
        fill_tx_env(tx_env, transaction, sender);
    }
}
