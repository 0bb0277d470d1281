//! Notifications
//!
//! Outbound collaborator handed `(recipient, template id, variables)`.
//! Fire-and-forget: nothing in the core waits on or observes delivery.

use mockall::automock;

/// Template for the order-confirmation message.
pub const ORDER_CONFIRMATION_TEMPLATE: &str = "order-confirmation";

/// Template for the abandoned-cart recovery offer.
pub const CART_RECOVERY_TEMPLATE: &str = "abandoned-cart-recovery";

/// Outbound notification collaborator.
#[automock]
pub trait Notifier: Send + Sync {
    /// Queue a templated message for `recipient`.
    fn send(&self, recipient: &str, template_id: &str, variables: &[(String, String)]);
}

/// Notifier that drops every message; the default for tests and demos.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, _recipient: &str, _template_id: &str, _variables: &[(String, String)]) {}
}
