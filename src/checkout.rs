//! Checkout
//!
//! The checkout state machine walks `Info → Shipping → Payment →
//! Confirmation` strictly forward with no skipping; stepping back never
//! loses entered data. Pricing is recomputed whenever the cart or a
//! discount input changes, and order placement is guarded so a duplicate
//! submission can never commit twice.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use smallvec::SmallVec;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    cart::CartError,
    discounts::{DiscountError, percent_of, percent_points},
    orders::{OrderError, PaymentMethod},
    persistence::SnapshotError,
    promos::PromoGrant,
    rules::{PricingRules, ShippingOption},
    tracking::TrackingError,
};

/// Grace period the UI waits before redirecting an emptied cart away from
/// checkout.
pub const EMPTY_CART_REDIRECT_GRACE: Duration = Duration::from_millis(1500);

/// Errors surfaced by checkout transitions and order placement.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The customer-info step has outstanding field errors.
    #[error("customer information is incomplete")]
    InvalidCustomerInfo,

    /// The payment step completes by placing the order, not by advancing.
    #[error("the payment step completes by placing the order")]
    PlaceOrderRequired,

    /// The checkout has already reached its final step.
    #[error("checkout is already at the final step")]
    AtFinalStep,

    /// Orders are placed from the payment step only.
    #[error("orders are placed from the payment step")]
    NotAtPayment,

    /// This checkout already committed an order.
    #[error("an order was already placed for this checkout")]
    AlreadyPlaced,

    /// A placement is pending; the duplicate submission is ignored.
    #[error("an order placement is already in progress")]
    PlacementInProgress,

    /// The cart emptied before the order could be committed.
    #[error("cannot place an order with an empty cart")]
    EmptyCart,

    /// The selected shipping option no longer exists.
    #[error("unknown shipping option {0}")]
    UnknownShipping(String),

    /// The payment collaborator rejected the charge.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Percentage arithmetic failed while pricing the order.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Clearing the cart after commit failed to persist.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The order log could not be written.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The tracking record could not be opened.
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// A loyalty or abandonment snapshot failed to persist.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Errors from the payment collaborator.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The charge was refused.
    #[error("payment declined: {0}")]
    Declined(String),
}

/// Proof of a captured payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// Collaborator reference for the capture.
    pub reference: String,
}

/// Payment collaborator invoked between the payment and confirmation steps.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Capture `amount` pesos with the chosen method.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] if the charge is refused.
    async fn collect(
        &self,
        amount: u64,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError>;
}

/// Gateway stand-in that approves every charge after a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    delay: Duration,
}

impl SimulatedGateway {
    /// Create a gateway that settles after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(Duration::from_millis(400))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn collect(
        &self,
        _amount: u64,
        _method: PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError> {
        tokio::time::sleep(self.delay).await;

        Ok(PaymentReceipt {
            reference: format!("pay_{}", Uuid::now_v7().simple()),
        })
    }
}

/// Checkout steps in strict forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckoutStep {
    /// Customer contact and address details.
    Info,
    /// Shipping option selection.
    Shipping,
    /// Payment method selection and order placement.
    Payment,
    /// Order placed; terminal.
    Confirmation,
}

/// Customer-info fields validated on the first step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerField {
    /// Full name.
    Name,
    /// Contact email.
    Email,
    /// Mobile number.
    Phone,
    /// Street address.
    Address,
    /// City.
    City,
    /// Optional postal code.
    PostalCode,
}

/// A field-scoped validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldError {
    /// Field the message belongs to.
    pub field: CustomerField,
    /// Inline message shown next to the field.
    pub message: &'static str,
}

/// Customer details entered on the info step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerInfo {
    /// Full name; required.
    pub name: String,
    /// Contact email; required, syntactically checked.
    pub email: String,
    /// Mobile number; required, exactly 10 digits.
    pub phone: String,
    /// Street address; required.
    pub address: String,
    /// City; required.
    pub city: String,
    /// Postal code; optional, exactly 4 digits when present.
    pub postal_code: String,
}

impl CustomerInfo {
    /// Render the shipping address for the order record.
    pub fn shipping_address(&self) -> String {
        let mut address = format!("{}, {}", self.address, self.city);

        if !self.postal_code.is_empty() {
            address.push_str(", ");
            address.push_str(&self.postal_code);
        }

        address
    }
}

fn email_is_valid(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn all_digits(value: &str, count: usize) -> bool {
    value.len() == count && value.chars().all(|c| c.is_ascii_digit())
}

/// Validate customer info, returning one message per invalid field.
pub fn validate_customer_info(info: &CustomerInfo) -> SmallVec<[FieldError; 6]> {
    let mut errors = SmallVec::new();

    if info.name.trim().is_empty() {
        errors.push(FieldError {
            field: CustomerField::Name,
            message: "Name is required",
        });
    }

    if !email_is_valid(info.email.trim()) {
        errors.push(FieldError {
            field: CustomerField::Email,
            message: "Enter a valid email address",
        });
    }

    if !all_digits(info.phone.trim(), 10) {
        errors.push(FieldError {
            field: CustomerField::Phone,
            message: "Phone number must be exactly 10 digits",
        });
    }

    if info.address.trim().is_empty() {
        errors.push(FieldError {
            field: CustomerField::Address,
            message: "Address is required",
        });
    }

    if info.city.trim().is_empty() {
        errors.push(FieldError {
            field: CustomerField::City,
            message: "City is required",
        });
    }

    if !info.postal_code.is_empty() && !all_digits(info.postal_code.trim(), 4) {
        errors.push(FieldError {
            field: CustomerField::PostalCode,
            message: "Postal code must be exactly 4 digits",
        });
    }

    errors
}

/// A fully priced order, every amount an integral peso value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Σ unit price × quantity.
    pub subtotal: u64,
    /// Discount rate applied, in whole percent points.
    pub discount_percent: u8,
    /// Discount amount, rounded half-up from the subtotal.
    pub discount: u64,
    /// Subtotal minus the discount.
    pub subtotal_after_discount: u64,
    /// Tax on the discounted subtotal, rounded half-up independently.
    pub tax: u64,
    /// Shipping fee after the free-shipping rule.
    pub shipping_fee: u64,
    /// `subtotal_after_discount + tax + shipping_fee`, exactly.
    pub total: u64,
}

/// Price a cart subtotal under the given discount inputs.
///
/// The effective discount is the greater of the loyalty tier percent and the
/// applied promo percent; discounts never stack. Shipping is free at or above
/// the threshold unless the option is flagged `never_free`.
///
/// # Errors
///
/// Returns a [`DiscountError`] if percentage arithmetic overflows.
pub fn price_quote(
    subtotal: u64,
    tier_percent: u8,
    promo_percent: Option<u8>,
    shipping: &ShippingOption,
    rules: &PricingRules,
) -> Result<Quote, DiscountError> {
    let discount_percent = tier_percent.max(promo_percent.unwrap_or(0));
    let discount = percent_of(&percent_points(discount_percent), subtotal)?;
    let subtotal_after_discount = subtotal.saturating_sub(discount);
    let tax = percent_of(&percent_points(rules.tax_percent), subtotal_after_discount)?;

    let free_shipping = subtotal >= rules.free_shipping_threshold && !shipping.never_free;
    let shipping_fee = if free_shipping { 0 } else { shipping.fee };

    Ok(Quote {
        subtotal,
        discount_percent,
        discount,
        subtotal_after_discount,
        tax,
        shipping_fee,
        total: subtotal_after_discount + tax + shipping_fee,
    })
}

/// One customer's walk through checkout.
#[derive(Debug, Clone)]
pub struct CheckoutFlow {
    step: CheckoutStep,
    info: CustomerInfo,
    errors: SmallVec<[FieldError; 6]>,
    shipping_id: String,
    payment_method: PaymentMethod,
    promo: Option<PromoGrant>,
    committed: Option<String>,
    placing: bool,
}

impl CheckoutFlow {
    /// Start a checkout at the info step with a preselected shipping option.
    pub fn new(default_shipping_id: impl Into<String>) -> Self {
        Self {
            step: CheckoutStep::Info,
            info: CustomerInfo::default(),
            errors: SmallVec::new(),
            shipping_id: default_shipping_id.into(),
            payment_method: PaymentMethod::CashOnDelivery,
            promo: None,
            committed: None,
            placing: false,
        }
    }

    /// Current step.
    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    /// Entered customer details.
    pub fn info(&self) -> &CustomerInfo {
        &self.info
    }

    /// Outstanding field errors from the last failed advance.
    pub fn field_errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Selected shipping option id.
    pub fn shipping_id(&self) -> &str {
        &self.shipping_id
    }

    /// Selected payment method.
    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    /// The applied promo, if any.
    pub fn promo(&self) -> Option<&PromoGrant> {
        self.promo.as_ref()
    }

    /// Id of the committed order once placement succeeds.
    pub fn committed_order(&self) -> Option<&str> {
        self.committed.as_deref()
    }

    /// Update one customer-info field.
    ///
    /// Changing a field's value clears that field's error immediately; other
    /// fields keep their messages until the next advance attempt.
    pub fn set_field(&mut self, field: CustomerField, value: impl Into<String>) {
        let value = value.into();

        match field {
            CustomerField::Name => self.info.name = value,
            CustomerField::Email => self.info.email = value,
            CustomerField::Phone => self.info.phone = value,
            CustomerField::Address => self.info.address = value,
            CustomerField::City => self.info.city = value,
            CustomerField::PostalCode => self.info.postal_code = value,
        }

        self.errors.retain(|error| error.field != field);
    }

    /// Select a shipping option.
    pub fn select_shipping(&mut self, id: impl Into<String>) {
        self.shipping_id = id.into();
    }

    /// Select a payment method.
    pub fn select_payment(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    /// Apply a validated promo grant; replaces any earlier one.
    pub fn apply_promo(&mut self, grant: PromoGrant) {
        self.promo = Some(grant);
    }

    /// Remove the applied promo.
    pub fn clear_promo(&mut self) {
        self.promo = None;
    }

    /// Move forward one step.
    ///
    /// `Info → Shipping` requires zero customer-info errors; the failed
    /// attempt stores one message per invalid field and stays put.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidCustomerInfo`],
    /// [`CheckoutError::PlaceOrderRequired`] at the payment step, or
    /// [`CheckoutError::AtFinalStep`] at confirmation.
    pub fn advance(&mut self) -> Result<CheckoutStep, CheckoutError> {
        match self.step {
            CheckoutStep::Info => {
                self.errors = validate_customer_info(&self.info);

                if !self.errors.is_empty() {
                    return Err(CheckoutError::InvalidCustomerInfo);
                }

                self.step = CheckoutStep::Shipping;
            }
            CheckoutStep::Shipping => self.step = CheckoutStep::Payment,
            CheckoutStep::Payment => return Err(CheckoutError::PlaceOrderRequired),
            CheckoutStep::Confirmation => return Err(CheckoutError::AtFinalStep),
        }

        Ok(self.step)
    }

    /// Move back one step, keeping everything entered so far.
    ///
    /// The info step stays put; confirmation is terminal and never steps
    /// back.
    pub fn back(&mut self) -> CheckoutStep {
        self.step = match self.step {
            CheckoutStep::Info | CheckoutStep::Shipping => CheckoutStep::Info,
            CheckoutStep::Payment => CheckoutStep::Shipping,
            CheckoutStep::Confirmation => CheckoutStep::Confirmation,
        };

        self.step
    }

    /// Reserve the one allowed placement attempt.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotAtPayment`],
    /// [`CheckoutError::AlreadyPlaced`] after a successful commit, or
    /// [`CheckoutError::PlacementInProgress`] while a commit is pending.
    pub fn begin_placement(&mut self) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::Payment {
            return Err(CheckoutError::NotAtPayment);
        }

        if self.committed.is_some() {
            return Err(CheckoutError::AlreadyPlaced);
        }

        if self.placing {
            return Err(CheckoutError::PlacementInProgress);
        }

        self.placing = true;

        Ok(())
    }

    /// Release the placement guard after a failed attempt.
    pub fn abort_placement(&mut self) {
        self.placing = false;
    }

    /// Record the committed order and finish the flow.
    pub fn finish_placement(&mut self, order_id: impl Into<String>) {
        self.committed = Some(order_id.into());
        self.placing = false;
        self.step = CheckoutStep::Confirmation;
    }
}
