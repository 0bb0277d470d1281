//! Checkout Example
//!
//! Walks a cart through the full checkout state machine and prints the
//! priced order with its tracking record.
//!
//! Use `-p` to set the customer's loyalty point balance
//! Use `-c` to apply a promo code
//! Use `-s` to pick a shipping option (`standard`, `express`, `same-day`)

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;

use sari::prelude::*;

/// Arguments for the checkout example
#[derive(Debug, Parser)]
struct ExampleCheckoutArgs {
    /// Loyalty point balance of the demo customer
    #[clap(short, long, default_value_t = 1600)]
    points: u64,

    /// Promo code to apply at checkout
    #[clap(short, long)]
    code: Option<String>,

    /// Shipping option id
    #[clap(short, long, default_value = "standard")]
    shipping: String,
}

/// Checkout Example
#[expect(clippy::print_stdout, reason = "Example code")]
#[tokio::main]
pub async fn main() -> Result<()> {
    let args = ExampleCheckoutArgs::parse();

    let mut ctx = StoreContext::open(
        PricingRules::default(),
        MonitorConfig::default(),
        Collaborators {
            persistence: Arc::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
            payment: Arc::new(SimulatedGateway::new(Duration::from_millis(200))),
            notifier: Arc::new(NoopNotifier),
        },
    )?;

    ctx.sign_in(UserProfile {
        id: "demo".to_owned(),
        name: "Maria Santos".to_owned(),
        email: "maria@example.com".to_owned(),
        loyalty_points: args.points,
    });

    ctx.add_to_cart(CartItem {
        product_id: "p1".to_owned(),
        name: "Abaca Tote".to_owned(),
        unit_price: 799,
        image_ref: "/img/p1.jpg".to_owned(),
        quantity: 2,
    })?;
    ctx.add_to_cart(CartItem {
        product_id: "p2".to_owned(),
        name: "Buri Fan".to_owned(),
        unit_price: 549,
        image_ref: "/img/p2.jpg".to_owned(),
        quantity: 1,
    })?;

    let mut flow = ctx.begin_checkout();

    flow.set_field(CustomerField::Name, "Maria Santos");
    flow.set_field(CustomerField::Email, "maria@example.com");
    flow.set_field(CustomerField::Phone, "9171234567");
    flow.set_field(CustomerField::Address, "12 Mabini St");
    flow.set_field(CustomerField::City, "Quezon City");
    flow.set_field(CustomerField::PostalCode, "1100");
    flow.select_shipping(&args.shipping);
    flow.select_payment(PaymentMethod::GCash);

    if let Some(code) = args.code.as_deref() {
        match ctx.validate_promo_code(code) {
            Ok(grant) => {
                println!("promo {} applied: {}% off", grant.code, grant.discount_percent);
                flow.apply_promo(grant);
            }
            Err(rejection) => println!("promo rejected: {rejection}"),
        }
    }

    flow.advance()?;
    flow.advance()?;

    let quote = ctx.quote(&flow)?;
    let order = ctx.place_order(&mut flow).await?;

    println!("\norder {}", order.id);

    for line in &order.items {
        println!("  {} × {}  ₱{}", line.name, line.quantity, line.line_total());
    }

    println!("  subtotal        ₱{}", quote.subtotal);
    println!(
        "  discount ({:>2}%)  -₱{}",
        quote.discount_percent, quote.discount
    );
    println!("  tax (13%)       ₱{}", quote.tax);
    println!("  shipping        ₱{}", quote.shipping_fee);
    println!("  total           ₱{}", quote.total);

    if let Some(tracking) = ctx.get_order_tracking(&order.id) {
        println!(
            "\ntracking {} via {} — {}",
            tracking.tracking_number,
            tracking.carrier,
            tracking.status.label()
        );
    }

    println!(
        "loyalty balance: {} pts",
        ctx.loyalty_account().current_points
    );

    Ok(())
}
