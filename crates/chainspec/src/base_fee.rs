//! EIP-1559 base-fee adjustment parameters.

/// The denominator/elasticity pair EIP-1559 uses to adjust the base fee
/// block-to-block, plus the hardcoded genesis value every chain starts
/// London with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseFeeParams {
    /// Bounds the maximum per-block base-fee change to `1/max_change_denominator`.
    pub max_change_denominator: u128,
    /// The fraction of a block's gas limit considered the "target" gas usage.
    pub elasticity_multiplier: u128,
}

impl BaseFeeParams {
    /// The parameters every EIP-1559-compatible Ethereum chain has used
    /// to date: a 1/8 maximum adjustment and a 2x elasticity multiplier.
    pub const ETHEREUM: Self = Self { max_change_denominator: 8, elasticity_multiplier: 2 };

    /// Computes the next block's base fee given the parent header's base
    /// fee, gas used and gas limit.
    ///
    /// Mirrors the EIP-1559 reference algorithm: unchanged at exactly the
    /// gas target, otherwise nudged up or down proportionally to the
    /// deviation, floored so the base fee never goes to zero.
    pub fn next_block_base_fee(&self, parent_gas_used: u64, parent_gas_limit: u64, parent_base_fee: u64) -> u64 {
        let gas_target = parent_gas_limit / self.elasticity_multiplier as u64;

        match parent_gas_used.cmp(&gas_target) {
            std::cmp::Ordering::Equal => parent_base_fee,
            std::cmp::Ordering::Greater => {
                let gas_used_delta = parent_gas_used - gas_target;
                let base_fee_delta = std::cmp::max(
                    1,
                    (parent_base_fee as u128 * gas_used_delta as u128
                        / gas_target as u128
                        / self.max_change_denominator) as u64,
                );
                parent_base_fee.saturating_add(base_fee_delta)
            }
            std::cmp::Ordering::Less => {
                let gas_used_delta = gas_target - parent_gas_used;
                let base_fee_delta = (parent_base_fee as u128 * gas_used_delta as u128
                    / gas_target as u128
                    / self.max_change_denominator) as u64;
                parent_base_fee.saturating_sub(base_fee_delta)
            }
        }
    }
}

impl Default for BaseFeeParams {
    fn default() -> Self {
        Self::ETHEREUM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_fee_unchanged_at_target() {
        let params = BaseFeeParams::ETHEREUM;
        let next = params.next_block_base_fee(15_000_000, 30_000_000, 1_000_000_000);
        assert_eq!(next, 1_000_000_000);
    }

    #[test]
    fn base_fee_rises_above_target() {
        let params = BaseFeeParams::ETHEREUM;
        let next = params.next_block_base_fee(30_000_000, 30_000_000, 1_000_000_000);
        assert!(next > 1_000_000_000);
    }

    #[test]
    fn base_fee_falls_below_target() {
        let params = BaseFeeParams::ETHEREUM;
        let next = params.next_block_base_fee(0, 30_000_000, 1_000_000_000);
        assert!(next < 1_000_000_000);
    }
}
