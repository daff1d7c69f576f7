//! Ethereum hardfork identifiers and activation rules.
//!
//! A hardfork selects which consensus and VM rules apply to a given
//! `(block_number, timestamp)` pair (§ GLOSSARY "Hardfork"). Mainnet
//! forks up to Frontier..Paris activate by block number; everything from
//! Shanghai onward activates by timestamp, matching the switch the real
//! network made at the Merge.

mod condition {
    use serde::{Deserialize, Serialize};

    /// The condition under which a [`super::Hardfork`] becomes active.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ForkCondition {
        /// Active from a given block number (inclusive), pre-Merge forks.
        Block(u64),
        /// Active from a given unix timestamp (inclusive), post-Merge forks.
        Timestamp(u64),
        /// Never active — used for forks not yet scheduled on a given chain.
        Never,
    }

    impl ForkCondition {
        /// Whether this condition is satisfied by `(block_number, timestamp)`.
        pub fn active_at(&self, block_number: u64, timestamp: u64) -> bool {
            match self {
                Self::Block(activation) => block_number >= *activation,
                Self::Timestamp(activation) => timestamp >= *activation,
                Self::Never => false,
            }
        }
    }
}
pub use condition::ForkCondition;

/// A named Ethereum protocol upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hardfork {
    Frontier,
    Homestead,
    Dao,
    Tangerine,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    MuirGlacier,
    Berlin,
    London,
    ArrowGlacier,
    GrayGlacier,
    Paris,
    Shanghai,
    Cancun,
    Prague,
    Osaka,
}

use serde::{Deserialize, Serialize};

impl Hardfork {
    /// All known hardforks, oldest first.
    pub const ALL: [Self; 19] = [
        Self::Frontier,
        Self::Homestead,
        Self::Dao,
        Self::Tangerine,
        Self::SpuriousDragon,
        Self::Byzantium,
        Self::Constantinople,
        Self::Petersburg,
        Self::Istanbul,
        Self::MuirGlacier,
        Self::Berlin,
        Self::London,
        Self::ArrowGlacier,
        Self::GrayGlacier,
        Self::Paris,
        Self::Shanghai,
        Self::Cancun,
        Self::Prague,
        Self::Osaka,
    ];

    /// Whether this hardfork activates by timestamp rather than block
    /// number. True from Shanghai onward, matching the Merge's switch to
    /// timestamp-gated upgrades.
    pub const fn is_timestamp_activated(&self) -> bool {
        matches!(self, Self::Shanghai | Self::Cancun | Self::Prague | Self::Osaka)
    }

    /// Whether withdrawals (EIP-4895) are active at this hardfork or later.
    pub const fn is_shanghai_active(&self) -> bool {
        matches!(self, Self::Shanghai | Self::Cancun | Self::Prague | Self::Osaka)
    }

    /// Whether blob transactions (EIP-4844) are active at this hardfork or
    /// later.
    pub const fn is_cancun_active(&self) -> bool {
        matches!(self, Self::Cancun | Self::Prague | Self::Osaka)
    }

    /// Whether EIP-7685 requests are active at this hardfork or later.
    pub const fn is_prague_active(&self) -> bool {
        matches!(self, Self::Prague | Self::Osaka)
    }

    /// Whether EIP-1559 base fees are active at this hardfork or later.
    pub const fn is_london_active(&self) -> bool {
        self >= &Self::London
    }

    /// Whether proof-of-work mining/sealing is meaningful at this
    /// hardfork — false from Paris (the Merge) onward.
    pub const fn is_pre_merge(&self) -> bool {
        (*self as u8) < (Self::Paris as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_activation_order() {
        assert!(Hardfork::London < Hardfork::Paris);
        assert!(Hardfork::Paris < Hardfork::Shanghai);
    }

    #[test]
    fn merge_boundary() {
        assert!(Hardfork::London.is_pre_merge());
        assert!(!Hardfork::Paris.is_pre_merge());
    }

    #[test]
    fn fork_condition_block_boundary() {
        let cond = ForkCondition::Block(100);
        assert!(!cond.active_at(99, 0));
        assert!(cond.active_at(100, 0));
    }

    #[test]
    fn fork_condition_timestamp_boundary() {
        let cond = ForkCondition::Timestamp(1_000);
        assert!(!cond.active_at(0, 999));
        assert!(cond.active_at(0, 1_000));
    }
}
