//! Pricing rules
//!
//! Pure configuration for the pricing pipeline: tax rate, the free-shipping
//! threshold, the shipping catalog, the loyalty tier table, and the seeded
//! promo catalog. [`PricingRules::default`] is the reference storefront
//! configuration.

use jiff::Timestamp;

use crate::{
    loyalty::{LoyaltyProgram, LoyaltyTier, TierId},
    promos::Promo,
};

/// A shipping method offered at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingOption {
    /// Stable identifier selected by the checkout flow.
    pub id: String,
    /// Customer-facing name.
    pub name: String,
    /// Flat fee in pesos.
    pub fee: u64,
    /// Delivery estimate in days, used for the tracking ETA.
    pub eta_days: u8,
    /// Carrier that fulfils this option.
    pub carrier: String,
    /// Excluded from the free-shipping threshold.
    ///
    /// Exactly one option (the same-day courier) carries this flag; the
    /// asymmetry is standing business policy, kept as explicit config.
    pub never_free: bool,
}

/// Storefront pricing configuration.
#[derive(Debug)]
pub struct PricingRules {
    /// Tax rate in whole percent points, applied after the discount.
    pub tax_percent: u8,
    /// Subtotal at or above which eligible shipping is free, in pesos.
    pub free_shipping_threshold: u64,
    /// Shipping catalog; the first entry is the checkout default.
    pub shipping: Vec<ShippingOption>,
    /// Loyalty tier table.
    pub loyalty: LoyaltyProgram,
    /// Seeded promo catalog.
    pub promos: Vec<Promo>,
}

impl PricingRules {
    /// Look up a shipping option by id.
    pub fn shipping_option(&self, id: &str) -> Option<&ShippingOption> {
        self.shipping.iter().find(|option| option.id == id)
    }

    /// The checkout's preselected shipping option.
    pub fn default_shipping(&self) -> Option<&ShippingOption> {
        self.shipping.first()
    }
}

impl Default for PricingRules {
    fn default() -> Self {
        // Active seed promos expire 2026-12-31T00:00:00Z.
        let seed_expiry = Timestamp::constant(1_798_675_200, 0);

        Self {
            tax_percent: 13,
            free_shipping_threshold: 2000,
            shipping: vec![
                ShippingOption {
                    id: "standard".to_owned(),
                    name: "Standard Delivery".to_owned(),
                    fee: 120,
                    eta_days: 7,
                    carrier: "J&T Express".to_owned(),
                    never_free: false,
                },
                ShippingOption {
                    id: "express".to_owned(),
                    name: "Express Delivery".to_owned(),
                    fee: 250,
                    eta_days: 3,
                    carrier: "LBC Express".to_owned(),
                    never_free: false,
                },
                ShippingOption {
                    id: "same-day".to_owned(),
                    name: "Same-Day Courier".to_owned(),
                    fee: 480,
                    eta_days: 1,
                    carrier: "Lalamove".to_owned(),
                    never_free: true,
                },
            ],
            loyalty: LoyaltyProgram::new(vec![
                LoyaltyTier {
                    id: TierId::Bronze,
                    min_points: 0,
                    discount_percent: 2,
                    benefits: vec!["Birthday voucher".to_owned()],
                },
                LoyaltyTier {
                    id: TierId::Silver,
                    min_points: 500,
                    discount_percent: 5,
                    benefits: vec![
                        "Birthday voucher".to_owned(),
                        "Early sale access".to_owned(),
                    ],
                },
                LoyaltyTier {
                    id: TierId::Gold,
                    min_points: 1500,
                    discount_percent: 10,
                    benefits: vec![
                        "Birthday voucher".to_owned(),
                        "Early sale access".to_owned(),
                        "Free express upgrade".to_owned(),
                    ],
                },
                LoyaltyTier {
                    id: TierId::Platinum,
                    min_points: 3500,
                    discount_percent: 15,
                    benefits: vec![
                        "Birthday voucher".to_owned(),
                        "Early sale access".to_owned(),
                        "Free express upgrade".to_owned(),
                        "Dedicated concierge".to_owned(),
                    ],
                },
            ]),
            promos: vec![
                Promo {
                    code: "HOLIDAY20".to_owned(),
                    discount_percent: 20,
                    min_order_amount: 2000,
                    expires_at: seed_expiry,
                    max_uses: 50,
                    current_uses: 32,
                    active: true,
                },
                Promo {
                    code: "WELCOME10".to_owned(),
                    discount_percent: 10,
                    min_order_amount: 500,
                    expires_at: seed_expiry,
                    max_uses: 1000,
                    current_uses: 118,
                    active: true,
                },
                Promo {
                    code: "PAYDAY15".to_owned(),
                    discount_percent: 15,
                    min_order_amount: 1500,
                    expires_at: seed_expiry,
                    max_uses: 200,
                    current_uses: 44,
                    active: true,
                },
                Promo {
                    code: "SUMMER25".to_owned(),
                    discount_percent: 25,
                    min_order_amount: 1000,
                    // Retired campaign: switched off and past expiry.
                    expires_at: Timestamp::constant(1_719_705_600, 0),
                    max_uses: 500,
                    current_uses: 500,
                    active: false,
                },
            ],
        }
    }
}
