//! Store context
//!
//! Session-scoped wiring for the storefront core. One [`StoreContext`] owns
//! the cart, the order and tracking stores, the abandoned-cart list, and the
//! injected collaborators, and exposes the inbound operation surface the UI
//! and back office call. Shared state is mutated only through these
//! operations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;
use thiserror::Error;
use tracing::warn;

use crate::{
    abandonment::{
        AbandonedCart, AbandonedCartMonitor, AbandonedCartStore, CheckOutcome, MonitorConfig,
        MonitorHandle, RecoveryError,
    },
    auth::UserProfile,
    cart::{CartError, CartItem, CartLedger},
    checkout::{CheckoutError, CheckoutFlow, PaymentGateway, Quote, price_quote},
    clock::Clock,
    loyalty::{LoyaltyAccount, LoyaltyError, LoyaltyProgram},
    notify::{CART_RECOVERY_TEMPLATE, Notifier, ORDER_CONFIRMATION_TEMPLATE},
    orders::{Order, OrderDraft, OrderError, OrderStore},
    persistence::{LOYALTY_KEY, Persistence, SnapshotError, load_json, save_json},
    promos::{PromoCatalog, PromoGrant, PromoRejection},
    rules::PricingRules,
    tracking::{DeliveryStatus, OrderTrackingEngine, TrackingError, TrackingRecord},
};

/// Errors while opening a session from persisted state.
#[derive(Debug, Error)]
pub enum SessionInitError {
    /// The cart snapshot could not be restored.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The order log could not be restored.
    #[error(transparent)]
    Orders(#[from] OrderError),

    /// A loyalty or abandonment snapshot could not be restored.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Injected collaborators for a session.
#[derive(Clone)]
pub struct Collaborators {
    /// Key-value persistence backend.
    pub persistence: Arc<dyn Persistence>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Payment collaborator.
    pub payment: Arc<dyn PaymentGateway>,
    /// Outbound notification collaborator.
    pub notifier: Arc<dyn Notifier>,
}

/// Session state the abandonment monitor inspects between operations.
pub struct SessionState {
    /// The active cart.
    pub cart: CartLedger,
    /// Signed-in profile, if any.
    pub user: Option<UserProfile>,
    /// Instant of the last cart activity or monitor check.
    pub last_activity: Timestamp,
}

/// Handle shared between the context and the monitor tick.
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Session-scoped storefront core.
pub struct StoreContext {
    rules: PricingRules,
    promos: PromoCatalog,
    loyalty_account: LoyaltyAccount,
    account_restored: bool,
    session: SharedSession,
    orders: OrderStore,
    tracking: OrderTrackingEngine,
    abandoned: Arc<Mutex<AbandonedCartStore>>,
    monitor: AbandonedCartMonitor,
    collaborators: Collaborators,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StoreContext {
    /// Open a session, restoring cart, orders, loyalty and abandonment state
    /// from the persistence collaborator.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionInitError`] when a persisted snapshot exists but
    /// cannot be decoded.
    pub fn open(
        rules: PricingRules,
        monitor_config: MonitorConfig,
        collaborators: Collaborators,
    ) -> Result<Self, SessionInitError> {
        let persistence = Arc::clone(&collaborators.persistence);

        let cart = CartLedger::restore(Arc::clone(&persistence))?;
        let orders = OrderStore::restore(Arc::clone(&persistence))?;
        let abandoned = AbandonedCartStore::restore(Arc::clone(&persistence))?;

        let restored_account: Option<LoyaltyAccount> =
            load_json(persistence.as_ref(), LOYALTY_KEY)?;
        let account_restored = restored_account.is_some();

        let promos = PromoCatalog::new(rules.promos.clone());
        let last_activity = collaborators.clock.now();

        Ok(Self {
            rules,
            promos,
            loyalty_account: restored_account.unwrap_or_default(),
            account_restored,
            session: Arc::new(Mutex::new(SessionState {
                cart,
                user: None,
                last_activity,
            })),
            orders,
            tracking: OrderTrackingEngine::new(),
            abandoned: Arc::new(Mutex::new(abandoned)),
            monitor: AbandonedCartMonitor::new(monitor_config),
            collaborators,
        })
    }

    /// Pricing configuration for this session.
    pub fn rules(&self) -> &PricingRules {
        &self.rules
    }

    /// The live loyalty account.
    pub fn loyalty_account(&self) -> &LoyaltyAccount {
        &self.loyalty_account
    }

    /// Redeem loyalty points from the account.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::InsufficientPoints`] as a no-op rejection, or
    /// a snapshot error if persisting the new balance fails.
    pub fn redeem_points(&mut self, points: u64) -> Result<(), LoyaltyError> {
        self.loyalty_account.redeem(points)?;

        save_json(
            self.collaborators.persistence.as_ref(),
            LOYALTY_KEY,
            &self.loyalty_account,
        )?;

        Ok(())
    }

    // ----- session -----

    /// Attach an authenticated profile to the session.
    ///
    /// The loyalty balance is seeded from the profile unless a persisted
    /// account was restored at open.
    pub fn sign_in(&mut self, profile: UserProfile) {
        if !self.account_restored {
            self.loyalty_account = LoyaltyAccount::with_points(profile.loyalty_points);
        }

        lock(&self.session).user = Some(profile);
    }

    /// Detach the signed-in profile.
    pub fn sign_out(&mut self) {
        lock(&self.session).user = None;
    }

    /// The signed-in profile, if any.
    pub fn current_user(&self) -> Option<UserProfile> {
        lock(&self.session).user.clone()
    }

    // ----- cart -----

    /// Add an item to the cart, merging quantities per product.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the item is invalid or persisting fails.
    pub fn add_to_cart(&self, item: CartItem) -> Result<(), CartError> {
        let mut session = lock(&self.session);

        session.cart.add(item)?;
        session.last_activity = self.collaborators.clock.now();

        Ok(())
    }

    /// Remove a product's line from the cart.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if persisting fails.
    pub fn remove_from_cart(&self, product_id: &str) -> Result<bool, CartError> {
        let mut session = lock(&self.session);

        let removed = session.cart.remove(product_id)?;
        session.last_activity = self.collaborators.clock.now();

        Ok(removed)
    }

    /// Set a product's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if persisting fails.
    pub fn update_quantity(&self, product_id: &str, quantity: u32) -> Result<(), CartError> {
        let mut session = lock(&self.session);

        session.cart.set_quantity(product_id, quantity)?;
        session.last_activity = self.collaborators.clock.now();

        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if persisting fails.
    pub fn clear_cart(&self) -> Result<(), CartError> {
        let mut session = lock(&self.session);

        session.cart.clear()?;
        session.last_activity = self.collaborators.clock.now();

        Ok(())
    }

    /// Current cart lines.
    pub fn cart_items(&self) -> Vec<CartItem> {
        lock(&self.session).cart.snapshot()
    }

    /// Current cart subtotal in pesos.
    pub fn cart_subtotal(&self) -> u64 {
        lock(&self.session).cart.subtotal()
    }

    // ----- promos -----

    /// Validate a promo code against the current cart subtotal.
    ///
    /// # Errors
    ///
    /// Returns the first applicable [`PromoRejection`].
    pub fn validate_promo_code(&self, code: &str) -> Result<PromoGrant, PromoRejection> {
        self.promos.validate(
            code,
            self.cart_subtotal(),
            self.collaborators.clock.now(),
        )
    }

    /// Validate several codes and keep the greatest discount.
    ///
    /// # Errors
    ///
    /// Returns a [`PromoRejection`] when no presented code validates.
    pub fn best_promo(&self, codes: &[&str]) -> Result<PromoGrant, PromoRejection> {
        self.promos.best_grant(
            codes,
            self.cart_subtotal(),
            self.collaborators.clock.now(),
        )
    }

    /// Read surface over the promo catalog, for admin views.
    pub fn promo_catalog(&self) -> &PromoCatalog {
        &self.promos
    }

    // ----- checkout -----

    /// Start a checkout flow with the default shipping preselected.
    pub fn begin_checkout(&self) -> CheckoutFlow {
        let default_shipping = self
            .rules
            .default_shipping()
            .map_or("standard", |option| option.id.as_str());

        CheckoutFlow::new(default_shipping)
    }

    /// Price the current cart under the flow's discount inputs.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] for an unknown shipping option or failed
    /// percentage arithmetic.
    pub fn quote(&self, flow: &CheckoutFlow) -> Result<Quote, CheckoutError> {
        let shipping = self
            .rules
            .shipping_option(flow.shipping_id())
            .ok_or_else(|| CheckoutError::UnknownShipping(flow.shipping_id().to_owned()))?;

        let (subtotal, signed_in) = {
            let session = lock(&self.session);

            (session.cart.subtotal(), session.user.is_some())
        };

        let tier_percent = if signed_in {
            self.rules
                .loyalty
                .discount_for(self.loyalty_account.current_points)
        } else {
            0
        };

        let promo_percent = flow.promo().map(|grant| grant.discount_percent);

        Ok(price_quote(
            subtotal,
            tier_percent,
            promo_percent,
            shipping,
            &self.rules,
        )?)
    }

    /// Place the order: capture payment, then commit atomically.
    ///
    /// The flow's placement guard makes a duplicate submission a rejection
    /// rather than a second commit. The commit block — append order, clear
    /// cart, award points, record promo use, open tracking — runs under one
    /// session lock, so the UI never observes a partial commit.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`]; the guard is released on every failure
    /// path so checkout can retry.
    pub async fn place_order(&mut self, flow: &mut CheckoutFlow) -> Result<Order, CheckoutError> {
        flow.begin_placement()?;

        match self.try_place_order(flow).await {
            Ok(order) => {
                flow.finish_placement(order.id.clone());

                Ok(order)
            }
            Err(error) => {
                flow.abort_placement();

                Err(error)
            }
        }
    }

    async fn try_place_order(&mut self, flow: &CheckoutFlow) -> Result<Order, CheckoutError> {
        let quote = self.quote(flow)?;

        let items = {
            let session = lock(&self.session);

            if session.cart.is_empty() {
                return Err(CheckoutError::EmptyCart);
            }

            session.cart.snapshot()
        };

        // Await the payment collaborator without holding the session lock.
        let _receipt = self
            .collaborators
            .payment
            .collect(quote.total, flow.payment_method())
            .await?;

        let shipping = self
            .rules
            .shipping_option(flow.shipping_id())
            .ok_or_else(|| CheckoutError::UnknownShipping(flow.shipping_id().to_owned()))?
            .clone();

        let now = self.collaborators.clock.now();
        let session_arc = Arc::clone(&self.session);
        let mut session = lock(&session_arc);

        // The cart may have been emptied while payment settled.
        if session.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let draft = OrderDraft {
            items,
            subtotal: quote.subtotal,
            loyalty_discount: quote.discount,
            tax: quote.tax,
            shipping_fee: quote.shipping_fee,
            total: quote.total,
            customer_name: flow.info().name.clone(),
            customer_email: flow.info().email.clone(),
            shipping_address: flow.info().shipping_address(),
            shipping_method: shipping.name.clone(),
            payment_method: flow.payment_method(),
        };

        let order = self.orders.commit(draft, now)?;

        session.cart.clear()?;
        session.last_activity = now;

        self.loyalty_account
            .award(LoyaltyProgram::points_earned(order.total));
        save_json(
            self.collaborators.persistence.as_ref(),
            LOYALTY_KEY,
            &self.loyalty_account,
        )?;

        if let Some(grant) = flow.promo() {
            self.promos.record_use(&grant.code);
        }

        self.tracking.init_for_order(&order, &shipping, now)?;

        // A purchase that follows a recovered cart converts the record.
        if let Some(user) = &session.user {
            let mut abandoned = lock(&self.abandoned);

            if let Some(token) = abandoned.recovered_token_for(&user.id) {
                if let Err(error) = abandoned.mark_converted(&token, now) {
                    warn!(%error, "could not convert recovered cart");
                }
            }
        }

        self.collaborators.notifier.send(
            &order.customer_email,
            ORDER_CONFIRMATION_TEMPLATE,
            &[
                ("order_id".to_owned(), order.id.clone()),
                ("total".to_owned(), order.total.to_string()),
            ],
        );

        Ok(order)
    }

    // ----- orders & tracking -----

    /// Look up a committed order.
    pub fn get_order(&self, id: &str) -> Option<&Order> {
        self.orders.get(id)
    }

    /// All committed orders, oldest first.
    pub fn orders(&self) -> &[Order] {
        self.orders.all()
    }

    /// Tracking record for an order, if the order is tracked.
    pub fn get_order_tracking(&self, order_id: &str) -> Option<&TrackingRecord> {
        self.tracking.get(order_id)
    }

    /// All tracking records.
    pub fn all_tracking(&self) -> Vec<&TrackingRecord> {
        self.tracking.all().collect()
    }

    /// Tracking records fulfilled by a carrier.
    pub fn tracking_by_carrier<'a>(&'a self, carrier: &'a str) -> Vec<&'a TrackingRecord> {
        self.tracking.by_carrier(carrier).collect()
    }

    /// Tracking records past their ETA and not delivered.
    pub fn delayed_orders(&self) -> Vec<&TrackingRecord> {
        self.tracking.delayed(self.collaborators.clock.now())
    }

    /// Move an order's delivery status.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackingError`] for unknown orders or disallowed moves.
    pub fn update_order_status(
        &mut self,
        order_id: &str,
        status: DeliveryStatus,
    ) -> Result<(), TrackingError> {
        self.tracking
            .update_status(order_id, status, self.collaborators.clock.now())
    }

    /// Append a timeline event carrying the order's current status.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackingError`] for unknown orders or a stale timeline.
    pub fn record_tracking_event(
        &mut self,
        order_id: &str,
        location: &str,
        details: &str,
    ) -> Result<(), TrackingError> {
        let status = self
            .tracking
            .get(order_id)
            .map(|record| record.status)
            .ok_or_else(|| TrackingError::NotFound(order_id.to_owned()))?;

        self.tracking.append_event(
            order_id,
            status,
            location,
            details,
            self.collaborators.clock.now(),
        )
    }

    // ----- abandonment -----

    /// Run one abandonment check now.
    ///
    /// A fresh capture also hands the notifier a recovery offer for the
    /// signed-in user.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if persisting a new record fails.
    pub fn check_abandoned_cart(&self) -> Result<CheckOutcome, SnapshotError> {
        let mut session = lock(&self.session);
        let mut abandoned = lock(&self.abandoned);

        let SessionState {
            cart,
            user,
            last_activity,
        } = &mut *session;

        let outcome = self.monitor.check_once(
            user.as_ref(),
            cart,
            last_activity,
            &mut abandoned,
            self.collaborators.clock.now(),
        )?;

        if let (CheckOutcome::Abandoned { recovery_token }, Some(user)) = (&outcome, user.as_ref())
        {
            self.collaborators.notifier.send(
                &user.email,
                CART_RECOVERY_TEMPLATE,
                &[
                    ("recovery_token".to_owned(), recovery_token.clone()),
                    (
                        "discount_percent".to_owned(),
                        self.monitor.config().recovery_discount_percent.to_string(),
                    ),
                ],
            );
        }

        Ok(outcome)
    }

    /// Redeem a recovery token and resume the abandoned cart.
    ///
    /// On success the session cart is replaced with the abandoned snapshot;
    /// on failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns a [`RecoveryError`] for unknown or already-used tokens.
    pub fn recover_cart(&self, token: &str) -> Result<AbandonedCart, RecoveryError> {
        let now = self.collaborators.clock.now();

        let record = lock(&self.abandoned).recover(token, now)?;

        let mut session = lock(&self.session);

        session.cart.replace(record.items.clone())?;
        session.last_activity = now;

        Ok(record)
    }

    /// Record a completed purchase against a recovered cart.
    ///
    /// # Errors
    ///
    /// Returns a [`RecoveryError`] if the record is not in `Recovered`.
    pub fn mark_cart_converted(&self, token: &str) -> Result<(), RecoveryError> {
        lock(&self.abandoned).mark_converted(token, self.collaborators.clock.now())
    }

    /// Abandoned-cart records, oldest first.
    pub fn abandoned_carts(&self) -> Vec<AbandonedCart> {
        lock(&self.abandoned).records().to_vec()
    }

    /// Start the periodic abandonment tick for this session.
    ///
    /// The returned handle stops the tick when the session ends.
    pub fn spawn_monitor(&self) -> MonitorHandle {
        let session = Arc::clone(&self.session);
        let abandoned = Arc::clone(&self.abandoned);
        let clock = Arc::clone(&self.collaborators.clock);
        let notifier = Arc::clone(&self.collaborators.notifier);
        let monitor = self.monitor.clone();

        MonitorHandle::spawn(monitor.config().poll_interval, move || {
            let mut session = lock(&session);
            let mut store = lock(&abandoned);

            let SessionState {
                cart,
                user,
                last_activity,
            } = &mut *session;

            match monitor.check_once(user.as_ref(), cart, last_activity, &mut store, clock.now()) {
                Ok(CheckOutcome::Abandoned { recovery_token }) => {
                    if let Some(user) = user.as_ref() {
                        notifier.send(
                            &user.email,
                            CART_RECOVERY_TEMPLATE,
                            &[("recovery_token".to_owned(), recovery_token)],
                        );
                    }
                }
                Ok(_) => {}
                Err(error) => warn!(%error, "abandonment check failed"),
            }
        })
    }
}
