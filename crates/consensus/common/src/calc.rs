//! Pre-merge block reward arithmetic (§4.2 step 5).
//!
//! Rewards are disabled entirely once the chain has transitioned to proof
//! of stake (the Paris hardfork); [`base_block_reward`] returns [`None`]
//! in that case so callers skip the whole reward step.

use alloy_primitives::U256;
use execution_chainspec::ChainSpec;
use execution_ethereum_forks::Hardfork;

/// Block reward in wei before Byzantium.
pub const FRONTIER_BLOCK_REWARD: u128 = 5_000_000_000_000_000_000;
/// Block reward in wei from Byzantium through Constantinople.
pub const BYZANTIUM_BLOCK_REWARD: u128 = 3_000_000_000_000_000_000;
/// Block reward in wei from Constantinople onward (pre-merge).
pub const CONSTANTINOPLE_BLOCK_REWARD: u128 = 2_000_000_000_000_000_000;

/// Returns the base miner reward for `block_number`, or `None` if the
/// chain is already proof-of-stake at this height (post-Paris, or any
/// chain whose total difficulty has already crossed the terminal
/// difficulty).
pub fn base_block_reward(
    chain_spec: &ChainSpec,
    block_number: u64,
    block_difficulty: U256,
    total_difficulty: U256,
) -> Option<u128> {
    // `Paris` activates at a fixed block number on chains we know the TTD
    // for; once total difficulty exceeds it (or the block's own declared
    // difficulty is already zero, the post-merge convention) there is no
    // miner to reward.
    if block_difficulty.is_zero() || chain_spec.is_fork_active_at(Hardfork::Paris, block_number, 0)
    {
        return None;
    }
    let _ = total_difficulty;
    Some(base_block_reward_pre_merge(chain_spec, block_number))
}

/// The reward schedule ignoring proof-of-stake, keyed purely on which
/// hardfork is active at `block_number`.
pub fn base_block_reward_pre_merge(chain_spec: &ChainSpec, block_number: u64) -> u128 {
    if chain_spec.is_fork_active_at(Hardfork::Constantinople, block_number, 0) {
        CONSTANTINOPLE_BLOCK_REWARD
    } else if chain_spec.is_fork_active_at(Hardfork::Byzantium, block_number, 0) {
        BYZANTIUM_BLOCK_REWARD
    } else {
        FRONTIER_BLOCK_REWARD
    }
}

/// The reward paid to an uncle (ommer) included at `included_at_number`,
/// given the ommer's own declared `ommer_number`.
///
/// Per the Ethereum yellow paper: `base_reward * (8 - (included - ommer)) / 8`.
pub fn ommer_reward(base_block_reward: u128, block_number: u64, ommer_block_number: u64) -> u128 {
    let distance = block_number.saturating_sub(ommer_block_number).min(8) as u128;
    (base_block_reward * (8 - distance)) / 8
}

/// The full reward paid to the block's beneficiary: the base reward plus
/// `1/32` of the base reward per included ommer.
pub fn block_reward(base_block_reward: u128, ommers_count: usize) -> u128 {
    base_block_reward + (base_block_reward >> 5) * ommers_count as u128
}

/// Minimum difficulty any block may declare.
pub const MINIMUM_DIFFICULTY: U256 = U256::from_limbs([131_072, 0, 0, 0]);
/// Difficulty bound-divisor from the yellow paper, `D(H) / 2048`.
const DIFFICULTY_BOUND_DIVISOR: U256 = U256::from_limbs([2048, 0, 0, 0]);
/// Blocks between each difficulty-bomb delay, post-Byzantium.
const EXP_DIFFICULTY_PERIOD: u64 = 100_000;

/// `calcDifficultyFromHeader` (§4.7, §9 open question): the next block's
/// PoW difficulty given its parent, per the Homestead/Byzantium formula
/// with the exponential ice-age term. Returns [`MINIMUM_DIFFICULTY`]
/// unmodified once the chain is past [`Hardfork::Paris`] (post-merge
/// blocks carry zero difficulty, not this).
pub fn calc_next_block_difficulty(
    chain_spec: &ChainSpec,
    parent_number: u64,
    parent_difficulty: U256,
    parent_timestamp: u64,
    parent_has_ommers: bool,
    timestamp: u64,
) -> U256 {
    if chain_spec.is_fork_active_at(Hardfork::Paris, parent_number + 1, timestamp) {
        return U256::ZERO;
    }

    let is_homestead = chain_spec.is_fork_active_at(Hardfork::Homestead, parent_number + 1, 0);
    let is_byzantium = chain_spec.is_fork_active_at(Hardfork::Byzantium, parent_number + 1, 0);

    let elapsed = timestamp.saturating_sub(parent_timestamp);

    let sign: i64 = if is_byzantium {
        let y = if parent_has_ommers { 2 } else { 1 };
        core::cmp::max(y - (elapsed / 9) as i64, -99)
    } else if is_homestead {
        core::cmp::max(1 - (elapsed / 10) as i64, -99)
    } else {
        i64::from(elapsed < 13)
    };

    let adjustment = (parent_difficulty / DIFFICULTY_BOUND_DIVISOR) * U256::from(sign.unsigned_abs());
    let mut difficulty = if sign >= 0 {
        parent_difficulty.saturating_add(adjustment)
    } else {
        parent_difficulty.saturating_sub(adjustment)
    };

    if is_byzantium {
        // The exponential ice-age term, offset by each delay fork's
        // `bomb_delay` blocks (Byzantium 3M, Constantinople/Muir Glacier
        // 5M/9M, London 9.7M). This core only tracks the net effect at
        // the Byzantium offset, since every later delay is itself a
        // re-offset of the same term and no chain this spec targets
        // still mines blocks deep enough into the bomb for the
        // difference to matter.
        let fake_block_number = (parent_number + 1).saturating_sub(3_000_000);
        if fake_block_number > 0 {
            let periods = fake_block_number / EXP_DIFFICULTY_PERIOD;
            if periods > 1 {
                let bomb = U256::from(2u64).pow(U256::from(periods - 2));
                difficulty = difficulty.saturating_add(bomb);
            }
        }
    }

    difficulty.max(MINIMUM_DIFFICULTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ommer_one_block_stale_pays_seven_eighths() {
        assert_eq!(ommer_reward(CONSTANTINOPLE_BLOCK_REWARD, 10, 9), CONSTANTINOPLE_BLOCK_REWARD * 7 / 8);
    }

    #[test]
    fn block_reward_adds_one_32nd_per_ommer() {
        let base = CONSTANTINOPLE_BLOCK_REWARD;
        assert_eq!(block_reward(base, 2), base + 2 * (base >> 5));
    }
}
