//! Sari
//!
//! Sari is a storefront order pricing and lifecycle engine: it turns a cart
//! into a priced order (tiered loyalty discount, tax, shipping rule, promo
//! codes), walks the checkout state machine, and tracks committed orders
//! through a delivery-status machine, with timeout-driven cart-abandonment
//! detection on the side.

pub mod abandonment;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod clock;
pub mod context;
pub mod discounts;
pub mod loyalty;
pub mod notify;
pub mod orders;
pub mod persistence;
pub mod prelude;
pub mod promos;
pub mod rules;
pub mod tracking;
