//! Order aggregate (event-sourced).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trattoria_catalog::{FoodId, SelectedOption};
use trattoria_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, validate};
use trattoria_events::Event;

use crate::status::OrderStatus;
use crate::totals::{Fulfillment, OrderTotals};
use crate::tracking::TrackingCode;

trattoria_core::typed_id!(OrderId);

pub const AGGREGATE_TYPE: &str = "orders.order";

pub const MAX_LINE_QUANTITY: u32 = 99;
pub const MAX_LINES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl OrderContact {
    fn normalized(&self, fulfillment: Fulfillment) -> Result<Self, DomainError> {
        let name = validate::require("contact name", &self.name)?;
        validate::max_len("contact name", &name, 120)?;
        let phone = validate::phone(&self.phone)?;
        let email = match self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(e) => Some(validate::email(e)?),
            None => None,
        };
        let address = self
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        if let Some(a) = &address {
            validate::max_len("address", a, 500)?;
        }
        if fulfillment == Fulfillment::Delivery && address.is_none() {
            return Err(DomainError::validation("delivery orders need an address"));
        }
        Ok(Self { name, phone, email, address })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        match input.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "" | "cash_on_delivery" | "cod" | "cash" => Ok(PaymentMethod::CashOnDelivery),
            other => Err(DomainError::validation(format!(
                "payment method '{other}' is not accepted (cash on delivery only)"
            ))),
        }
    }
}

/// A priced cart line, frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub food_id: FoodId,
    pub name: String,
    pub sku: String,
    pub variant: Option<String>,
    pub options: Vec<SelectedOption>,
    pub quantity: u32,
    pub list_unit_price: Money,
    pub unit_price: Money,
    pub line_total: Money,
}

/// One entry in the order's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// Aggregate root: Order.
///
/// # Invariants
/// - At least one line; every line total is `unit_price * quantity`.
/// - `totals.subtotal` is the sum of line totals and `totals.total` adds the
///   delivery fee.
/// - Status only moves as allowed by [`OrderStatus::check_transition`].
/// - Every status change is appended to `history`.
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    tracking_code: Option<TrackingCode>,
    customer_id: Option<AggregateId>,
    contact: Option<OrderContact>,
    fulfillment: Fulfillment,
    lines: Vec<OrderLine>,
    totals: OrderTotals,
    status: OrderStatus,
    history: Vec<StatusChange>,
    placed_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Order {
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            tracking_code: None,
            customer_id: None,
            contact: None,
            fulfillment: Fulfillment::Delivery,
            lines: Vec::new(),
            totals: OrderTotals::default(),
            status: OrderStatus::Pending,
            history: Vec::new(),
            placed_at: None,
            version: 0,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    pub fn customer_id(&self) -> Option<AggregateId> {
        self.customer_id
    }

    pub fn tracking_code(&self) -> Option<&TrackingCode> {
        self.tracking_code.as_ref()
    }

    pub fn contact(&self) -> Option<&OrderContact> {
        self.contact.as_ref()
    }

    pub fn fulfillment(&self) -> Fulfillment {
        self.fulfillment
    }

    fn ensure_placed(&self) -> Result<(), DomainError> {
        if self.placed_at.is_none() {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// Commands

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub tracking_code: TrackingCode,
    pub customer_id: Option<AggregateId>,
    pub contact: OrderContact,
    pub fulfillment: Fulfillment,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: Option<String>,
    pub by_customer: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderCommand {
    Place(PlaceOrder),
    ChangeStatus(ChangeOrderStatus),
    Cancel(CancelOrder),
}

// Events

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub tracking_code: TrackingCode,
    pub customer_id: Option<AggregateId>,
    pub contact: OrderContact,
    pub fulfillment: Fulfillment,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub reason: Option<String>,
    pub by_customer: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    Placed(OrderPlaced),
    StatusChanged(OrderStatusChanged),
    Cancelled(OrderCancelled),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "orders.order.placed",
            OrderEvent::StatusChanged(_) => "orders.order.status_changed",
            OrderEvent::Cancelled(_) => "orders.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Placed(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
            OrderEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::Placed(e) => {
                self.id = e.order_id;
                self.tracking_code = Some(e.tracking_code.clone());
                self.customer_id = e.customer_id;
                self.contact = Some(e.contact.clone());
                self.fulfillment = e.fulfillment;
                self.lines = e.lines.clone();
                self.totals = e.totals;
                self.status = OrderStatus::Pending;
                self.placed_at = Some(e.occurred_at);
                self.history.push(StatusChange {
                    status: OrderStatus::Pending,
                    note: None,
                    at: e.occurred_at,
                });
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
                self.history.push(StatusChange {
                    status: e.to,
                    note: e.note.clone(),
                    at: e.occurred_at,
                });
            }
            OrderEvent::Cancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.history.push(StatusChange {
                    status: OrderStatus::Cancelled,
                    note: e.reason.clone(),
                    at: e.occurred_at,
                });
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::Place(cmd) => self.handle_place(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            OrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

fn clean_note(note: Option<&str>, field: &str) -> Result<Option<String>, DomainError> {
    let note = note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
    if let Some(n) = &note {
        validate::max_len(field, n, 1000)?;
    }
    Ok(note)
}

impl Order {
    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.placed_at.is_some() {
            return Err(DomainError::conflict("order already placed"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("an order needs at least one item"));
        }
        if cmd.lines.len() > MAX_LINES {
            return Err(DomainError::validation(format!("an order can have at most {MAX_LINES} lines")));
        }

        let mut subtotal = Money::ZERO;
        for line in &cmd.lines {
            if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
                return Err(DomainError::validation(format!(
                    "quantity for '{}' must be between 1 and {MAX_LINE_QUANTITY}",
                    line.name
                )));
            }
            if line.unit_price.checked_mul(line.quantity)? != line.line_total {
                return Err(DomainError::invariant(format!("line total mismatch for '{}'", line.name)));
            }
            subtotal = subtotal.checked_add(line.line_total)?;
        }
        if subtotal != cmd.totals.subtotal {
            return Err(DomainError::invariant("subtotal does not match the order lines"));
        }
        if cmd.totals.subtotal.checked_add(cmd.totals.delivery_fee)? != cmd.totals.total {
            return Err(DomainError::invariant("total does not match subtotal plus delivery fee"));
        }
        if cmd.fulfillment == Fulfillment::Pickup && !cmd.totals.delivery_fee.is_zero() {
            return Err(DomainError::invariant("pickup orders carry no delivery fee"));
        }

        Ok(vec![OrderEvent::Placed(OrderPlaced {
            order_id: cmd.order_id,
            tracking_code: cmd.tracking_code.clone(),
            customer_id: cmd.customer_id,
            contact: cmd.contact.normalized(cmd.fulfillment)?,
            fulfillment: cmd.fulfillment,
            lines: cmd.lines.clone(),
            totals: cmd.totals,
            payment_method: cmd.payment_method,
            notes: clean_note(cmd.notes.as_deref(), "notes")?,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeOrderStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.status.check_transition(cmd.status, self.fulfillment)?;
        let note = clean_note(cmd.note.as_deref(), "note")?;

        if cmd.status == OrderStatus::Cancelled {
            return Ok(vec![OrderEvent::Cancelled(OrderCancelled {
                order_id: self.id,
                from: self.status,
                reason: note,
                by_customer: false,
                occurred_at: cmd.occurred_at,
            })]);
        }

        Ok(vec![OrderEvent::StatusChanged(OrderStatusChanged {
            order_id: self.id,
            from: self.status,
            to: cmd.status,
            note,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        if cmd.by_customer && self.status != OrderStatus::Pending {
            return Err(DomainError::invariant(
                "the kitchen has already accepted this order; please call the restaurant to cancel",
            ));
        }
        self.status.check_transition(OrderStatus::Cancelled, self.fulfillment)?;

        Ok(vec![OrderEvent::Cancelled(OrderCancelled {
            order_id: self.id,
            from: self.status,
            reason: clean_note(cmd.reason.as_deref(), "reason")?,
            by_customer: cmd.by_customer,
            occurred_at: cmd.occurred_at,
        })])
    }
}
