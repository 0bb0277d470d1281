//! Loyalty
//!
//! Points-based membership tiers. A member's tier is the highest tier whose
//! minimum-points threshold has been reached; each tier grants a fixed
//! discount percentage applied at checkout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::SnapshotError;

/// Errors from loyalty point redemption.
#[derive(Debug, Error)]
pub enum LoyaltyError {
    /// The account balance is lower than the requested redemption.
    #[error("insufficient points: requested {requested}, available {available}")]
    InsufficientPoints {
        /// Points the caller asked to redeem.
        requested: u64,
        /// Points currently on the account.
        available: u64,
    },

    /// The account snapshot could not be persisted.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Membership tier identifier, ordered bronze < silver < gold < platinum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TierId {
    /// Entry tier.
    Bronze,
    /// Mid tier.
    Silver,
    /// Upper tier.
    Gold,
    /// Top tier.
    Platinum,
}

impl TierId {
    /// Lowercase display name.
    pub fn name(self) -> &'static str {
        match self {
            TierId::Bronze => "bronze",
            TierId::Silver => "silver",
            TierId::Gold => "gold",
            TierId::Platinum => "platinum",
        }
    }
}

/// A single membership tier.
#[derive(Debug, Clone)]
pub struct LoyaltyTier {
    /// Tier identifier.
    pub id: TierId,
    /// Minimum accumulated points required for this tier.
    pub min_points: u64,
    /// Discount granted at checkout, in whole percent points.
    pub discount_percent: u8,
    /// Marketing copy for the tier's perks.
    pub benefits: Vec<String>,
}

/// The tier table plus the earn rate.
#[derive(Debug, Clone)]
pub struct LoyaltyProgram {
    tiers: Vec<LoyaltyTier>,
}

impl LoyaltyProgram {
    /// Pesos spent per point earned (floor rounding).
    pub const PESOS_PER_POINT: u64 = 10;

    /// Create a program from a tier table.
    ///
    /// Tiers are kept sorted by ascending `min_points` so lookups can scan
    /// in order regardless of how the table was configured.
    pub fn new(mut tiers: Vec<LoyaltyTier>) -> Self {
        tiers.sort_by_key(|tier| tier.min_points);

        Self { tiers }
    }

    /// All tiers, ascending by `min_points`.
    pub fn tiers(&self) -> &[LoyaltyTier] {
        &self.tiers
    }

    /// The highest tier whose `min_points` is at or below `points`.
    ///
    /// Returns `None` only for an empty tier table or when `points` is below
    /// every threshold.
    pub fn tier_for(&self, points: u64) -> Option<&LoyaltyTier> {
        self.tiers
            .iter()
            .rev()
            .find(|tier| tier.min_points <= points)
    }

    /// Checkout discount for a point balance, in whole percent points.
    pub fn discount_for(&self, points: u64) -> u8 {
        self.tier_for(points)
            .map_or(0, |tier| tier.discount_percent)
    }

    /// Points still needed to reach the next tier; 0 at the top tier.
    pub fn points_to_next_tier(&self, points: u64) -> u64 {
        self.tiers
            .iter()
            .find(|tier| tier.min_points > points)
            .map_or(0, |next| next.min_points - points)
    }

    /// Points earned for an order total: 1 point per ₱10 spent, floored.
    pub fn points_earned(order_total: u64) -> u64 {
        order_total / Self::PESOS_PER_POINT
    }
}

/// A member's point balance, persisted across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    /// Points currently available to redeem.
    pub current_points: u64,
    /// Points redeemed over the account lifetime.
    pub redeemed_points: u64,
    /// Points ever awarded, used for tier qualification history.
    pub lifetime_points: u64,
}

impl LoyaltyAccount {
    /// Open an account with an existing balance.
    pub fn with_points(points: u64) -> Self {
        Self {
            current_points: points,
            redeemed_points: 0,
            lifetime_points: points,
        }
    }

    /// Add points earned by a committed order.
    pub fn award(&mut self, points: u64) {
        self.current_points = self.current_points.saturating_add(points);
        self.lifetime_points = self.lifetime_points.saturating_add(points);
    }

    /// Redeem points from the balance.
    ///
    /// The balance can never go negative: a short balance rejects the
    /// redemption and leaves the account untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::InsufficientPoints`] if the balance is short.
    pub fn redeem(&mut self, points: u64) -> Result<(), LoyaltyError> {
        if self.current_points < points {
            return Err(LoyaltyError::InsufficientPoints {
                requested: points,
                available: self.current_points,
            });
        }

        self.current_points -= points;
        self.redeemed_points = self.redeemed_points.saturating_add(points);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::rules::PricingRules;

    use super::*;

    fn program() -> LoyaltyProgram {
        PricingRules::default().loyalty
    }

    #[test]
    fn tier_boundaries_match_thresholds() {
        let program = program();

        assert_eq!(program.tier_for(0).map(|t| t.id), Some(TierId::Bronze));
        assert_eq!(program.tier_for(499).map(|t| t.id), Some(TierId::Bronze));
        assert_eq!(program.tier_for(500).map(|t| t.id), Some(TierId::Silver));
        assert_eq!(program.tier_for(1499).map(|t| t.id), Some(TierId::Silver));
        assert_eq!(program.tier_for(1500).map(|t| t.id), Some(TierId::Gold));
        assert_eq!(program.tier_for(3500).map(|t| t.id), Some(TierId::Platinum));
        assert_eq!(
            program.tier_for(u64::MAX).map(|t| t.id),
            Some(TierId::Platinum)
        );
    }

    #[test]
    fn discount_is_monotonic_across_boundaries() {
        let program = program();
        let mut last = 0;

        for points in [0, 499, 500, 1499, 1500, 3499, 3500, 10_000] {
            let discount = program.discount_for(points);

            assert!(
                discount >= last,
                "discount dropped from {last} to {discount} at {points} points"
            );
            last = discount;
        }

        assert_eq!(program.discount_for(0), 2);
        assert_eq!(program.discount_for(500), 5);
        assert_eq!(program.discount_for(1500), 10);
        assert_eq!(program.discount_for(3500), 15);
    }

    #[test]
    fn points_to_next_tier_counts_down_to_zero() {
        let program = program();

        assert_eq!(program.points_to_next_tier(0), 500);
        assert_eq!(program.points_to_next_tier(499), 1);
        assert_eq!(program.points_to_next_tier(500), 1000);
        assert_eq!(program.points_to_next_tier(3500), 0);
        assert_eq!(program.points_to_next_tier(50_000), 0);
    }

    #[test]
    fn unsorted_tier_table_still_resolves() {
        let mut tiers = program().tiers().to_vec();
        tiers.reverse();

        let program = LoyaltyProgram::new(tiers);

        assert_eq!(program.tier_for(1600).map(|t| t.id), Some(TierId::Gold));
        assert_eq!(program.points_to_next_tier(1600), 1900);
    }

    #[test]
    fn points_earned_floors_per_ten_pesos() {
        assert_eq!(LoyaltyProgram::points_earned(0), 0);
        assert_eq!(LoyaltyProgram::points_earned(9), 0);
        assert_eq!(LoyaltyProgram::points_earned(10), 1);
        assert_eq!(LoyaltyProgram::points_earned(2499), 249);
    }

    #[test]
    fn redeem_decrements_and_tracks_total() -> TestResult {
        let mut account = LoyaltyAccount::with_points(600);

        account.redeem(250)?;

        assert_eq!(account.current_points, 350);
        assert_eq!(account.redeemed_points, 250);
        assert_eq!(account.lifetime_points, 600);

        Ok(())
    }

    #[test]
    fn redeem_short_balance_is_a_no_op() {
        let mut account = LoyaltyAccount::with_points(100);

        let result = account.redeem(101);

        assert!(
            matches!(
                result,
                Err(LoyaltyError::InsufficientPoints {
                    requested: 101,
                    available: 100,
                })
            ),
            "expected InsufficientPoints, got {result:?}"
        );
        assert_eq!(account.current_points, 100);
        assert_eq!(account.redeemed_points, 0);
    }

    #[test]
    fn award_accumulates() {
        let mut account = LoyaltyAccount::default();

        account.award(120);
        account.award(80);

        assert_eq!(account.current_points, 200);
        assert_eq!(account.lifetime_points, 200);
    }
}
