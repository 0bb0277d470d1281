//! Promo codes
//!
//! Redeemable discount codes subject to an active flag, expiry, a usage cap,
//! and a minimum order amount. Validation is ordered and short-circuits on
//! the first failing rule; it never mutates catalog state. Usage is recorded
//! separately, at order commit.

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

/// Why a promo code was rejected.
///
/// Non-fatal: surfaced to the caller as a reason, never thrown.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromoRejection {
    /// No promo with the presented code exists.
    #[error("promo code not found")]
    NotFound,

    /// The promo exists but has been switched off.
    #[error("promo code is no longer active")]
    Inactive,

    /// The promo's expiry date has passed.
    #[error("promo code has expired")]
    Expired,

    /// The promo has been used its maximum number of times.
    #[error("promo code usage limit reached")]
    UsageLimitReached,

    /// The order amount is below the promo's minimum.
    #[error("order must be at least ₱{minimum} to use this code")]
    AmountTooLow {
        /// Minimum qualifying order amount in pesos.
        minimum: u64,
    },
}

/// A redeemable promo code.
#[derive(Debug, Clone)]
pub struct Promo {
    /// Case-insensitive unique code.
    pub code: String,
    /// Discount granted, in whole percent points.
    pub discount_percent: u8,
    /// Minimum qualifying order amount in pesos.
    pub min_order_amount: u64,
    /// Instant after which the code no longer validates.
    pub expires_at: Timestamp,
    /// Maximum number of redemptions.
    pub max_uses: u32,
    /// Redemptions so far.
    pub current_uses: u32,
    /// Whether the code is switched on at all.
    pub active: bool,
}

/// A successfully validated promo, ready to price an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoGrant {
    /// Canonical (uppercase) code that validated.
    pub code: String,
    /// Discount granted, in whole percent points.
    pub discount_percent: u8,
}

/// The promo catalog, keyed by canonical code.
#[derive(Debug, Default)]
pub struct PromoCatalog {
    promos: FxHashMap<String, Promo>,
}

impl PromoCatalog {
    /// Build a catalog from seed promos. Codes are case-insensitive; a later
    /// duplicate replaces an earlier one.
    pub fn new(seed: impl IntoIterator<Item = Promo>) -> Self {
        let promos = seed
            .into_iter()
            .map(|promo| (promo.code.to_uppercase(), promo))
            .collect();

        Self { promos }
    }

    /// Look up a promo by code, case-insensitively.
    pub fn get(&self, code: &str) -> Option<&Promo> {
        self.promos.get(&code.to_uppercase())
    }

    /// Validate `code` against an order amount at instant `now`.
    ///
    /// Rules are checked in order, short-circuiting on the first failure:
    /// unknown code, inactive, expired, usage cap reached, amount below the
    /// minimum. No state is mutated.
    ///
    /// # Errors
    ///
    /// Returns the first applicable [`PromoRejection`].
    pub fn validate(
        &self,
        code: &str,
        order_amount: u64,
        now: Timestamp,
    ) -> Result<PromoGrant, PromoRejection> {
        let promo = self.get(code).ok_or(PromoRejection::NotFound)?;

        if !promo.active {
            return Err(PromoRejection::Inactive);
        }

        if now > promo.expires_at {
            return Err(PromoRejection::Expired);
        }

        if promo.current_uses >= promo.max_uses {
            return Err(PromoRejection::UsageLimitReached);
        }

        if order_amount < promo.min_order_amount {
            return Err(PromoRejection::AmountTooLow {
                minimum: promo.min_order_amount,
            });
        }

        Ok(PromoGrant {
            code: promo.code.to_uppercase(),
            discount_percent: promo.discount_percent,
        })
    }

    /// Validate several presented codes and keep the one yielding the
    /// greatest discount.
    ///
    /// Only one promo may be applied per order; highest-discount-wins is a
    /// declared contract, not a tie-breaking accident.
    ///
    /// # Errors
    ///
    /// Returns the rejection for the last losing code only when no presented
    /// code validates; [`PromoRejection::NotFound`] when `codes` is empty.
    pub fn best_grant(
        &self,
        codes: &[&str],
        order_amount: u64,
        now: Timestamp,
    ) -> Result<PromoGrant, PromoRejection> {
        let mut best: Option<PromoGrant> = None;
        let mut last_rejection = PromoRejection::NotFound;

        for code in codes {
            match self.validate(code, order_amount, now) {
                Ok(grant) => {
                    let wins = best
                        .as_ref()
                        .is_none_or(|current| grant.discount_percent > current.discount_percent);

                    if wins {
                        best = Some(grant);
                    }
                }
                Err(rejection) => last_rejection = rejection,
            }
        }

        best.ok_or(last_rejection)
    }

    /// Record one redemption of `code` at order commit.
    ///
    /// Unknown codes are ignored; commit must not fail because a catalog
    /// entry was retired mid-checkout.
    pub fn record_use(&mut self, code: &str) {
        if let Some(promo) = self.promos.get_mut(&code.to_uppercase()) {
            promo.current_uses = promo.current_uses.saturating_add(1);
            debug!(
                code = %promo.code,
                uses = promo.current_uses,
                "promo redemption recorded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::rules::PricingRules;

    use super::*;

    fn catalog() -> PromoCatalog {
        PromoCatalog::new(PricingRules::default().promos)
    }

    /// 2026-01-01T00:00:00Z, inside every active seed promo's window.
    fn mid_window() -> Timestamp {
        Timestamp::constant(1_767_225_600, 0)
    }

    #[test]
    fn holiday20_validates_at_2500() -> TestResult {
        let grant = catalog().validate("HOLIDAY20", 2500, mid_window())?;

        assert_eq!(grant.discount_percent, 20);
        assert_eq!(grant.code, "HOLIDAY20");

        Ok(())
    }

    #[test]
    fn codes_are_case_insensitive() -> TestResult {
        let grant = catalog().validate("holiday20", 2500, mid_window())?;

        assert_eq!(grant.code, "HOLIDAY20");

        Ok(())
    }

    #[test]
    fn unknown_code_is_not_found() {
        let result = catalog().validate("NOPE", 5000, mid_window());

        assert_eq!(result, Err(PromoRejection::NotFound));
    }

    #[test]
    fn inactive_code_rejected_before_expiry_check() {
        // SUMMER25 is both inactive and expired; the active flag is checked
        // first, so the rejection must be Inactive.
        let result = catalog().validate("SUMMER25", 5000, mid_window());

        assert_eq!(result, Err(PromoRejection::Inactive));
    }

    #[test]
    fn expired_code_rejected() {
        let far_future = Timestamp::constant(4_102_444_800, 0); // 2100-01-01

        let result = catalog().validate("HOLIDAY20", 2500, far_future);

        assert_eq!(result, Err(PromoRejection::Expired));
    }

    #[test]
    fn usage_cap_rejects() {
        let mut catalog = catalog();

        // HOLIDAY20 has 32/50 uses; exhaust the remainder.
        for _ in 0..18 {
            catalog.record_use("HOLIDAY20");
        }

        let result = catalog.validate("HOLIDAY20", 2500, mid_window());

        assert_eq!(result, Err(PromoRejection::UsageLimitReached));
    }

    #[test]
    fn amount_below_minimum_names_the_minimum() {
        let result = catalog().validate("HOLIDAY20", 1999, mid_window());

        assert_eq!(result, Err(PromoRejection::AmountTooLow { minimum: 2000 }));
        assert_eq!(
            result.map_err(|e| e.to_string()),
            Err("order must be at least ₱2000 to use this code".to_owned())
        );
    }

    #[test]
    fn validate_does_not_mutate_usage() -> TestResult {
        let catalog = catalog();

        catalog.validate("HOLIDAY20", 2500, mid_window())?;

        assert_eq!(catalog.get("HOLIDAY20").map(|p| p.current_uses), Some(32));

        Ok(())
    }

    #[test]
    fn best_grant_picks_highest_discount() -> TestResult {
        let grant = catalog().best_grant(&["WELCOME10", "HOLIDAY20"], 2500, mid_window())?;

        assert_eq!(grant.code, "HOLIDAY20");
        assert_eq!(grant.discount_percent, 20);

        Ok(())
    }

    #[test]
    fn best_grant_skips_losing_codes() -> TestResult {
        // HOLIDAY20 fails its minimum at 1500; WELCOME10 still validates.
        let grant = catalog().best_grant(&["HOLIDAY20", "WELCOME10"], 1500, mid_window())?;

        assert_eq!(grant.code, "WELCOME10");

        Ok(())
    }

    #[test]
    fn best_grant_with_no_winner_reports_rejection() {
        let result = catalog().best_grant(&["HOLIDAY20"], 100, mid_window());

        assert_eq!(result, Err(PromoRejection::AmountTooLow { minimum: 2000 }));

        let empty = catalog().best_grant(&[], 5000, mid_window());

        assert_eq!(empty, Err(PromoRejection::NotFound));
    }

    #[test]
    fn record_use_ignores_unknown_codes() {
        let mut catalog = catalog();

        catalog.record_use("GHOST");

        assert!(catalog.get("GHOST").is_none());
    }
}
