//! Integration test walking a cart through checkout, commit and tracking.
//!
//! Reference arithmetic for the gold-tier scenario:
//!
//! * Cart: Abaca Tote ₱799 × 2 + Buri Fan ₱549 × 1 → subtotal ₱2,147
//! * Gold tier (1,600 pts) discount 10% → round(2147 × 0.10) = ₱215
//! * After discount: 2147 − 215 = ₱1,932
//! * Tax 13%: round(1932 × 0.13) = round(251.16) = ₱251
//! * Shipping: standard, free (2147 ≥ ₱2,000 threshold) → ₱0
//! * Total: 1932 + 251 + 0 = ₱2,183
//! * Points earned: floor(2183 / 10) = 218

use std::{sync::Arc, time::Duration};

use jiff::{SignedDuration, Timestamp};
use testresult::TestResult;

use sari::{checkout::MockPaymentGateway, prelude::*};

fn item(product_id: &str, name: &str, unit_price: u64, quantity: u32) -> CartItem {
    CartItem {
        product_id: product_id.to_owned(),
        name: name.to_owned(),
        unit_price,
        image_ref: format!("/img/{product_id}.jpg"),
        quantity,
    }
}

fn gold_user() -> UserProfile {
    UserProfile {
        id: "u1".to_owned(),
        name: "Maria Santos".to_owned(),
        email: "maria@example.com".to_owned(),
        loyalty_points: 1600,
    }
}

fn collaborators(
    persistence: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
) -> Collaborators {
    Collaborators {
        persistence,
        clock,
        payment: Arc::new(SimulatedGateway::new(Duration::from_millis(1))),
        notifier: Arc::new(NoopNotifier),
    }
}

fn fill_customer_info(flow: &mut CheckoutFlow) {
    flow.set_field(CustomerField::Name, "Maria Santos");
    flow.set_field(CustomerField::Email, "maria@example.com");
    flow.set_field(CustomerField::Phone, "9171234567");
    flow.set_field(CustomerField::Address, "12 Mabini St");
    flow.set_field(CustomerField::City, "Quezon City");
    flow.set_field(CustomerField::PostalCode, "1100");
}

#[tokio::test]
async fn gold_tier_checkout_commits_the_reference_order() -> TestResult {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::UNIX_EPOCH));
    let mut ctx = StoreContext::open(
        PricingRules::default(),
        MonitorConfig::default(),
        collaborators(Arc::new(MemoryStore::new()), Arc::clone(&clock)),
    )?;

    ctx.sign_in(gold_user());
    ctx.add_to_cart(item("p1", "Abaca Tote", 799, 2))?;
    ctx.add_to_cart(item("p2", "Buri Fan", 549, 1))?;

    let mut flow = ctx.begin_checkout();
    fill_customer_info(&mut flow);

    assert_eq!(flow.advance()?, CheckoutStep::Shipping);
    assert_eq!(flow.advance()?, CheckoutStep::Payment);
    flow.select_payment(PaymentMethod::GCash);

    let quote = ctx.quote(&flow)?;

    assert_eq!(quote.subtotal, 2147);
    assert_eq!(quote.discount, 215);
    assert_eq!(quote.subtotal_after_discount, 1932);
    assert_eq!(quote.tax, 251);
    assert_eq!(quote.shipping_fee, 0);
    assert_eq!(quote.total, 2183);

    let order = ctx.place_order(&mut flow).await?;

    assert_eq!(order.id, "SO-1001");
    assert_eq!(order.total, 2183);
    assert_eq!(order.loyalty_discount, 215);
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.shipping_address, "12 Mabini St, Quezon City, 1100");

    // Commit cleared the cart exactly once and finished the flow.
    assert!(ctx.cart_items().is_empty());
    assert_eq!(flow.step(), CheckoutStep::Confirmation);
    assert_eq!(flow.committed_order(), Some("SO-1001"));

    // Points: floor(2183 / 10) on top of the seeded balance.
    assert_eq!(ctx.loyalty_account().current_points, 1600 + 218);

    // Tracking opened in Processing with the standard option's carrier.
    let tracking = ctx.get_order_tracking("SO-1001").ok_or("order untracked")?;

    assert_eq!(tracking.status, DeliveryStatus::Processing);
    assert_eq!(tracking.carrier, "J&T Express");
    assert_eq!(tracking.events().len(), 1);

    Ok(())
}

#[tokio::test]
async fn duplicate_submission_never_commits_twice() -> TestResult {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::UNIX_EPOCH));
    let mut ctx = StoreContext::open(
        PricingRules::default(),
        MonitorConfig::default(),
        collaborators(Arc::new(MemoryStore::new()), clock),
    )?;

    ctx.sign_in(gold_user());
    ctx.add_to_cart(item("p1", "Abaca Tote", 799, 2))?;

    let mut flow = ctx.begin_checkout();
    fill_customer_info(&mut flow);
    flow.advance()?;
    flow.advance()?;

    ctx.place_order(&mut flow).await?;

    let second = ctx.place_order(&mut flow).await;

    assert!(matches!(second, Err(CheckoutError::AlreadyPlaced)));
    assert_eq!(ctx.orders().len(), 1, "exactly one order record");

    Ok(())
}

#[tokio::test]
async fn empty_cart_cannot_place_an_order() -> TestResult {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::UNIX_EPOCH));
    let mut ctx = StoreContext::open(
        PricingRules::default(),
        MonitorConfig::default(),
        collaborators(Arc::new(MemoryStore::new()), clock),
    )?;

    let mut flow = ctx.begin_checkout();
    fill_customer_info(&mut flow);
    flow.advance()?;
    flow.advance()?;

    let result = ctx.place_order(&mut flow).await;

    assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    assert!(ctx.orders().is_empty());

    Ok(())
}

#[tokio::test]
async fn declined_payment_leaves_cart_and_guard_intact() -> TestResult {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::UNIX_EPOCH));

    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_collect()
        .returning(|_, _| Err(PaymentError::Declined("insufficient funds".to_owned())));

    let mut ctx = StoreContext::open(
        PricingRules::default(),
        MonitorConfig::default(),
        Collaborators {
            persistence: Arc::new(MemoryStore::new()),
            clock,
            payment: Arc::new(gateway),
            notifier: Arc::new(NoopNotifier),
        },
    )?;

    ctx.add_to_cart(item("p1", "Abaca Tote", 799, 2))?;

    let mut flow = ctx.begin_checkout();
    fill_customer_info(&mut flow);
    flow.advance()?;
    flow.advance()?;

    let result = ctx.place_order(&mut flow).await;

    assert!(matches!(
        result,
        Err(CheckoutError::Payment(PaymentError::Declined(_)))
    ));
    assert!(ctx.orders().is_empty(), "no order on declined payment");
    assert_eq!(ctx.cart_subtotal(), 1598, "cart is untouched");

    // The guard was released; a retry is allowed.
    assert!(flow.begin_placement().is_ok());

    Ok(())
}

#[tokio::test]
async fn applied_promo_outprices_the_tier_and_burns_a_use() -> TestResult {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::UNIX_EPOCH));
    let mut ctx = StoreContext::open(
        PricingRules::default(),
        MonitorConfig::default(),
        collaborators(Arc::new(MemoryStore::new()), clock),
    )?;

    ctx.sign_in(gold_user());
    ctx.add_to_cart(item("p1", "Abaca Tote", 799, 2))?;
    ctx.add_to_cart(item("p2", "Buri Fan", 549, 1))?;

    let mut flow = ctx.begin_checkout();
    fill_customer_info(&mut flow);

    let grant = ctx.validate_promo_code("HOLIDAY20")?;
    flow.apply_promo(grant);

    flow.advance()?;
    flow.advance()?;

    let quote = ctx.quote(&flow)?;

    // 20% promo beats the 10% gold tier: round(2147 × 0.20) = 429.
    assert_eq!(quote.discount_percent, 20);
    assert_eq!(quote.discount, 429);

    ctx.place_order(&mut flow).await?;

    // The winning code's usage was recorded at commit: 32 seeded + 1.
    assert_eq!(
        ctx.promo_catalog()
            .get("HOLIDAY20")
            .map(|promo| promo.current_uses),
        Some(33)
    );

    Ok(())
}

#[tokio::test]
async fn delivery_tracking_progresses_to_delivered() -> TestResult {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::UNIX_EPOCH));
    let mut ctx = StoreContext::open(
        PricingRules::default(),
        MonitorConfig::default(),
        collaborators(Arc::new(MemoryStore::new()), Arc::clone(&clock)),
    )?;

    ctx.add_to_cart(item("p1", "Abaca Tote", 799, 3))?;

    let mut flow = ctx.begin_checkout();
    fill_customer_info(&mut flow);
    flow.select_shipping("express");
    flow.advance()?;
    flow.advance()?;

    let order = ctx.place_order(&mut flow).await?;

    // Express ships with LBC and a 3-day ETA.
    let record = ctx.get_order_tracking(&order.id).ok_or("order untracked")?;

    assert_eq!(record.carrier, "LBC Express");
    assert_eq!(ctx.tracking_by_carrier("LBC Express").len(), 1);

    let mut last_progress = 0;

    for status in [
        DeliveryStatus::Confirmed,
        DeliveryStatus::Shipped,
        DeliveryStatus::InTransit,
        DeliveryStatus::OutForDelivery,
        DeliveryStatus::Delivered,
    ] {
        clock.advance(SignedDuration::from_hours(6));
        ctx.update_order_status(&order.id, status)?;
        ctx.record_tracking_event(&order.id, "Metro Manila", status.label())?;

        let record = ctx.get_order_tracking(&order.id).ok_or("order untracked")?;
        let progress = record.status.progress_percent().ok_or("linear status")?;

        assert!(progress >= last_progress, "progress must not regress");
        last_progress = progress;

        let newest = record.events_newest_first().next().ok_or("empty timeline")?;
        assert_eq!(newest.status, record.status);
    }

    assert_eq!(last_progress, 100);

    // Delivered orders never count as delayed, even past the ETA.
    clock.advance(SignedDuration::from_hours(24 * 10));
    assert!(ctx.delayed_orders().is_empty());

    Ok(())
}

#[tokio::test]
async fn undelivered_order_past_eta_is_delayed() -> TestResult {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::UNIX_EPOCH));
    let mut ctx = StoreContext::open(
        PricingRules::default(),
        MonitorConfig::default(),
        collaborators(Arc::new(MemoryStore::new()), Arc::clone(&clock)),
    )?;

    ctx.add_to_cart(item("p1", "Abaca Tote", 799, 3))?;

    let mut flow = ctx.begin_checkout();
    fill_customer_info(&mut flow);
    flow.advance()?;
    flow.advance()?;

    let order = ctx.place_order(&mut flow).await?;

    assert!(ctx.delayed_orders().is_empty(), "fresh order is on time");

    // Standard ships on a 7-day ETA.
    clock.advance(SignedDuration::from_hours(24 * 8));

    let delayed = ctx.delayed_orders();

    assert_eq!(delayed.len(), 1);
    assert_eq!(
        delayed.first().map(|record| record.order_id.as_str()),
        Some(order.id.as_str())
    );

    Ok(())
}

#[tokio::test]
async fn session_state_survives_a_restart() -> TestResult {
    let persistence = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_at(Timestamp::UNIX_EPOCH));

    {
        let mut ctx = StoreContext::open(
            PricingRules::default(),
            MonitorConfig::default(),
            collaborators(Arc::clone(&persistence), Arc::clone(&clock)),
        )?;

        ctx.sign_in(gold_user());
        ctx.add_to_cart(item("p1", "Abaca Tote", 799, 2))?;

        let mut flow = ctx.begin_checkout();
        fill_customer_info(&mut flow);
        flow.advance()?;
        flow.advance()?;
        ctx.place_order(&mut flow).await?;
    }

    // A new session over the same persistence resumes where the last ended.
    let ctx = StoreContext::open(
        PricingRules::default(),
        MonitorConfig::default(),
        collaborators(persistence, clock),
    )?;

    // 799 × 2 = 1598; gold 10% → 160; after = 1438; tax = round(186.94) =
    // 187; below the threshold so standard shipping charges ₱120.
    assert!(ctx.cart_items().is_empty(), "placed order cleared the cart");
    assert_eq!(ctx.orders().len(), 1);
    assert_eq!(ctx.get_order("SO-1001").map(|o| o.total), Some(1745));
    assert_eq!(ctx.loyalty_account().current_points, 1600 + 174);

    Ok(())
}
