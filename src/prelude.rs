//! Sari prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    abandonment::{
        AbandonedCart, AbandonedCartMonitor, AbandonedCartStore, AbandonedStatus, CheckOutcome,
        MonitorConfig, MonitorHandle, RecoveryError,
    },
    auth::UserProfile,
    cart::{CartError, CartItem, CartLedger},
    checkout::{
        CheckoutError, CheckoutFlow, CheckoutStep, CustomerField, CustomerInfo, FieldError,
        PaymentError, PaymentGateway, PaymentReceipt, Quote, SimulatedGateway,
        price_quote, validate_customer_info,
    },
    clock::{Clock, ManualClock, SystemClock},
    context::{Collaborators, SessionState, SharedSession, StoreContext},
    discounts::{DiscountError, percent_of, percent_points},
    loyalty::{LoyaltyAccount, LoyaltyError, LoyaltyProgram, LoyaltyTier, TierId},
    notify::{NoopNotifier, Notifier},
    orders::{Order, OrderDraft, OrderStatus, OrderStore, PaymentMethod},
    persistence::{MemoryStore, Persistence, PersistenceError, SnapshotError},
    promos::{Promo, PromoCatalog, PromoGrant, PromoRejection},
    rules::{PricingRules, ShippingOption},
    tracking::{DeliveryStatus, OrderTrackingEngine, TrackingError, TrackingEvent, TrackingRecord},
};
