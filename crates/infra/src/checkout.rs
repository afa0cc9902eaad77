//! Checkout orchestration.
//!
//! ```text
//! cart lines
//!   -> 1. price every line against the foods read model
//!   -> 2. compute totals with the delivery policy
//!   -> 3. claim a unique tracking code
//!   -> 4. reserve stock per line (Food aggregate)
//!   -> 5. place the order (Order aggregate)
//! ```
//!
//! Compensation: if step 4 or 5 fails, every reservation already made is
//! released and the tracking code is freed. Cancelling an order (by the
//! customer or an admin) releases the stock it holds.
//!
//! Reservations and releases commute, so losing the optimistic race on a
//! food stream reloads and retries a few times instead of failing checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use trattoria_catalog::{Food, FoodCommand, FoodId, ReleaseStock, ReserveStock, Selection, food, price_selection};
use trattoria_core::{AggregateId, DomainError};
use trattoria_events::{EventBus, EventEnvelope};
use trattoria_orders::{
    CancelOrder, ChangeOrderStatus, DeliveryPolicy, Fulfillment, Order, OrderCommand, OrderContact, OrderId,
    OrderLine, OrderStatus, OrderTotals, PaymentMethod, PlaceOrder, TrackingCode, compute_totals, order,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::FoodsProjection;
use crate::unique_index::{Namespace, UniqueIndex};

const TRACKING_CODE_ATTEMPTS: usize = 16;
const STOCK_ATTEMPTS: usize = 5;

/// One line of a customer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub food_id: FoodId,
    pub quantity: u32,
    #[serde(flatten)]
    pub selection: Selection,
}

/// Priced cart: what `POST /cart/quote` returns and what an order freezes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: Option<AggregateId>,
    pub contact: OrderContact,
    pub fulfillment: Fulfillment,
    pub lines: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub tracking_code: TrackingCode,
}

/// Price `lines` against the current menu.
///
/// Rejects unknown, unavailable and sold-out foods, and quantities above
/// the tracked stock (summed across lines for the same food).
pub fn quote(
    foods: &FoodsProjection,
    lines: &[CartLine],
    fulfillment: Fulfillment,
    policy: &DeliveryPolicy,
) -> Result<Quote, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation("cart is empty"));
    }
    if lines.len() > order::MAX_LINES {
        return Err(DomainError::validation(format!(
            "a cart holds at most {} lines",
            order::MAX_LINES
        )));
    }

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 || line.quantity > order::MAX_LINE_QUANTITY {
            return Err(DomainError::validation(format!(
                "quantity must be between 1 and {}",
                order::MAX_LINE_QUANTITY
            )));
        }
        let view = foods
            .get(&line.food_id)
            .ok_or_else(|| DomainError::validation(format!("food {} does not exist", line.food_id)))?;
        if !view.orderable() {
            return Err(DomainError::validation(format!(
                "'{}' is currently unavailable",
                view.details.name
            )));
        }
        if let Some(stock) = view.stock {
            let wanted: u32 = lines
                .iter()
                .filter(|l| l.food_id == line.food_id)
                .map(|l| l.quantity)
                .sum();
            if wanted > stock {
                return Err(DomainError::validation(format!(
                    "insufficient stock for '{}': requested {wanted}, available {stock}",
                    view.details.name
                )));
            }
        }

        let selection = price_selection(&view.details, &line.selection)?;
        priced.push(OrderLine {
            food_id: view.id,
            name: view.details.name.clone(),
            sku: view.sku.clone(),
            variant: selection.variant,
            options: selection.options,
            quantity: line.quantity,
            list_unit_price: selection.list_unit_price,
            unit_price: selection.unit_price,
            line_total: selection.unit_price.checked_mul(line.quantity)?,
        });
    }

    let totals = compute_totals(
        priced.iter().map(|l| (l.list_unit_price, l.unit_price, l.quantity)),
        fulfillment,
        policy,
    )?;
    Ok(Quote { lines: priced, totals })
}

/// Runs checkout against the dispatcher. Holds borrowed references so the
/// API state can build one per request.
pub struct Checkout<'a, S, B> {
    pub dispatcher: &'a CommandDispatcher<S, B>,
    pub foods: &'a FoodsProjection,
    pub index: &'a UniqueIndex,
    pub policy: DeliveryPolicy,
}

impl<S, B> Checkout<'_, S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn place(&self, request: CheckoutRequest, now: DateTime<Utc>) -> Result<PlacedOrder, DispatchError> {
        let quote = quote(self.foods, &request.lines, request.fulfillment, &self.policy)?;

        let order_id = OrderId::generate();
        let tracking_code = self.claim_tracking_code(order_id)?;

        let mut reserved: Vec<(FoodId, u32)> = Vec::with_capacity(quote.lines.len());
        for line in &quote.lines {
            let reserve = FoodCommand::ReserveStock(ReserveStock {
                food_id: line.food_id,
                order_id: order_id.aggregate_id(),
                quantity: line.quantity,
                occurred_at: now,
            });
            if let Err(err) = self.dispatch_stock(line.food_id, reserve) {
                self.compensate(order_id, &tracking_code, &reserved, now);
                return Err(err);
            }
            reserved.push((line.food_id, line.quantity));
        }

        let place = OrderCommand::Place(PlaceOrder {
            order_id,
            tracking_code: tracking_code.clone(),
            customer_id: request.customer_id,
            contact: request.contact,
            fulfillment: request.fulfillment,
            lines: quote.lines,
            totals: quote.totals,
            payment_method: request.payment_method,
            notes: request.notes,
            occurred_at: now,
        });
        if let Err(err) = self.dispatch_order(order_id, place) {
            self.compensate(order_id, &tracking_code, &reserved, now);
            return Err(err);
        }

        info!(
            order_id = %order_id,
            tracking_code = %tracking_code,
            total = %quote.totals.total,
            "order placed"
        );
        Ok(PlacedOrder { order_id, tracking_code })
    }

    /// Cancel and give the held stock back.
    pub fn cancel(
        &self,
        order_id: OrderId,
        reason: Option<String>,
        by_customer: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        let cmd = OrderCommand::Cancel(CancelOrder {
            order_id,
            reason,
            by_customer,
            occurred_at: now,
        });
        self.dispatch_order(order_id, cmd)?;
        self.release_order_stock(order_id, now);
        Ok(())
    }

    /// Admin status change. Moving to `cancelled` releases stock too.
    pub fn change_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        let cmd = OrderCommand::ChangeStatus(ChangeOrderStatus {
            order_id,
            status,
            note,
            occurred_at: now,
        });
        self.dispatch_order(order_id, cmd)?;
        if status == OrderStatus::Cancelled {
            self.release_order_stock(order_id, now);
        }
        Ok(())
    }

    fn claim_tracking_code(&self, order_id: OrderId) -> Result<TrackingCode, DispatchError> {
        let mut rng = rand::thread_rng();
        for _ in 0..TRACKING_CODE_ATTEMPTS {
            let code = TrackingCode::generate(&mut rng);
            if self
                .index
                .claim(Namespace::TrackingCode, code.as_str(), order_id.aggregate_id())
                .is_ok()
            {
                return Ok(code);
            }
        }
        Err(DispatchError::InvariantViolation(
            "could not allocate a unique tracking code".into(),
        ))
    }

    fn release_order_stock(&self, order_id: OrderId, now: DateTime<Utc>) {
        let lines = match self
            .dispatcher
            .load(order_id.aggregate_id(), |id| Order::empty(OrderId::new(id)))
        {
            Ok(order) => order.lines().to_vec(),
            Err(err) => {
                warn!(order_id = %order_id, error = %err, "could not load order to release stock");
                return;
            }
        };
        let held: Vec<(FoodId, u32)> = lines.iter().map(|l| (l.food_id, l.quantity)).collect();
        self.release(order_id, &held, now);
    }

    fn compensate(&self, order_id: OrderId, tracking_code: &TrackingCode, reserved: &[(FoodId, u32)], now: DateTime<Utc>) {
        warn!(order_id = %order_id, reserved = reserved.len(), "checkout failed, compensating");
        self.release(order_id, reserved, now);
        self.index
            .release(Namespace::TrackingCode, tracking_code.as_str(), order_id.aggregate_id());
    }

    fn release(&self, order_id: OrderId, held: &[(FoodId, u32)], now: DateTime<Utc>) {
        for (food_id, quantity) in held {
            let cmd = FoodCommand::ReleaseStock(ReleaseStock {
                food_id: *food_id,
                order_id: order_id.aggregate_id(),
                quantity: *quantity,
                occurred_at: now,
            });
            // A deleted food has nothing left to give back.
            if let Err(err) = self.dispatch_stock(*food_id, cmd) {
                warn!(order_id = %order_id, food_id = %food_id, error = %err, "stock release failed");
            }
        }
    }

    /// Reserve or release, reloading the food and retrying on a lost race.
    fn dispatch_stock(&self, food_id: FoodId, cmd: FoodCommand) -> Result<(), DispatchError> {
        let mut attempt = 1;
        loop {
            match self.dispatch_food(food_id, cmd.clone()) {
                Err(DispatchError::Concurrency(msg)) if attempt < STOCK_ATTEMPTS => {
                    debug!(food_id = %food_id, attempt, error = %msg, "stock command raced, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn dispatch_food(&self, food_id: FoodId, cmd: FoodCommand) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(food_id.aggregate_id(), food::AGGREGATE_TYPE, cmd, |id| Food::empty(FoodId::new(id)))
            .map(|_| ())
    }

    fn dispatch_order(&self, order_id: OrderId, cmd: OrderCommand) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(order_id.aggregate_id(), order::AGGREGATE_TYPE, cmd, |id| Order::empty(OrderId::new(id)))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use trattoria_catalog::{CategoryId, CreateFood, FoodDetails, Restock};
    use trattoria_core::{ExpectedVersion, Money};
    use trattoria_events::{InMemoryBusError, Subscription};

    use super::*;
    use crate::event_bus::{ProjectingEventBus, SharedProjection};
    use crate::event_store::{EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
    use crate::projections::OrdersProjection;

    type Shared = CommandDispatcher<Arc<InMemoryEventStore>, Arc<ProjectingEventBus>>;

    /// Lets another customer's food command land just before our next
    /// append to that food, the way a concurrent request would.
    struct RacingStore {
        inner: Arc<InMemoryEventStore>,
        rival: Shared,
        queued: Mutex<VecDeque<(FoodId, FoodCommand)>>,
    }

    impl RacingStore {
        fn cut_in(&self, food_id: FoodId, cmd: FoodCommand) {
            self.queued.lock().unwrap().push_back((food_id, cmd));
        }
    }

    impl EventStore for RacingStore {
        fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            let target = events.first().map(|e| e.aggregate_id);
            let next = {
                let mut queued = self.queued.lock().unwrap();
                match queued.front() {
                    Some((food_id, _)) if Some(food_id.aggregate_id()) == target => queued.pop_front(),
                    _ => None,
                }
            };
            if let Some((food_id, cmd)) = next {
                self.rival
                    .dispatch(food_id.aggregate_id(), food::AGGREGATE_TYPE, cmd, |id| Food::empty(FoodId::new(id)))
                    .unwrap();
            }
            self.inner.append(events, expected_version)
        }

        fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(aggregate_id)
        }

        fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_all()
        }
    }

    struct Fixture {
        dispatcher: CommandDispatcher<Arc<RacingStore>, Arc<ProjectingEventBus>>,
        foods: Arc<FoodsProjection>,
        orders: Arc<OrdersProjection>,
        index: UniqueIndex,
    }

    impl Fixture {
        fn new() -> Self {
            let foods = Arc::new(FoodsProjection::in_memory());
            let orders = Arc::new(OrdersProjection::in_memory());
            let projections = vec![foods.clone() as SharedProjection, orders.clone() as SharedProjection];
            let bus = Arc::new(ProjectingEventBus::new(projections));
            let inner = Arc::new(InMemoryEventStore::new());
            let store = Arc::new(RacingStore {
                inner: inner.clone(),
                rival: CommandDispatcher::new(inner, bus.clone()),
                queued: Mutex::new(VecDeque::new()),
            });
            Self {
                dispatcher: CommandDispatcher::new(store, bus),
                foods,
                orders,
                index: UniqueIndex::new(),
            }
        }

        fn checkout(&self) -> Checkout<'_, Arc<RacingStore>, Arc<ProjectingEventBus>> {
            Checkout {
                dispatcher: &self.dispatcher,
                foods: &self.foods,
                index: &self.index,
                policy: DeliveryPolicy::default(),
            }
        }

        fn food(&self, name: &str, cents: u64, stock: Option<u32>) -> FoodId {
            let food_id = FoodId::generate();
            let cmd = FoodCommand::Create(CreateFood {
                food_id,
                slug: name.to_lowercase(),
                sku: format!("SKU-{}", name.to_uppercase()),
                details: FoodDetails {
                    name: name.into(),
                    description: String::new(),
                    category_id: CategoryId::generate(),
                    base_price: Money::from_cents(cents),
                    discount_percent: 0,
                    variants: vec![],
                    option_groups: vec![],
                    images: vec![],
                    tags: vec![],
                    featured: false,
                },
                available: true,
                stock,
                occurred_at: Utc::now(),
            });
            self.dispatch_food_cmd(food_id, cmd);
            food_id
        }

        fn dispatch_food_cmd(&self, food_id: FoodId, cmd: FoodCommand) {
            self.dispatcher
                .dispatch(food_id.aggregate_id(), food::AGGREGATE_TYPE, cmd, |id| Food::empty(FoodId::new(id)))
                .unwrap();
        }

        fn stock_of(&self, food_id: FoodId) -> Option<u32> {
            self.dispatcher
                .load(food_id.aggregate_id(), |id| Food::empty(FoodId::new(id)))
                .unwrap()
                .stock()
        }
    }

    fn rival_reservation(food_id: FoodId, quantity: u32) -> FoodCommand {
        FoodCommand::ReserveStock(ReserveStock {
            food_id,
            order_id: AggregateId::new(),
            quantity,
            occurred_at: Utc::now(),
        })
    }

    fn restock(food_id: FoodId, quantity: u32) -> FoodCommand {
        FoodCommand::Restock(Restock {
            food_id,
            quantity: Some(quantity),
            occurred_at: Utc::now(),
        })
    }

    /// Runs a one-shot hook before forwarding the first publish.
    struct HookBus<'a> {
        inner: Arc<ProjectingEventBus>,
        hook: Mutex<Option<Box<dyn FnOnce() + Send + 'a>>>,
    }

    impl EventBus<EventEnvelope<JsonValue>> for HookBus<'_> {
        type Error = InMemoryBusError;

        fn publish(&self, message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
            let hook = self.hook.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
            self.inner.publish(message)
        }

        fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
            self.inner.subscribe()
        }
    }

    fn request(lines: Vec<CartLine>) -> CheckoutRequest {
        CheckoutRequest {
            customer_id: None,
            contact: OrderContact {
                name: "Ada Lovelace".into(),
                phone: "+44 20 7946 0958".into(),
                email: Some("ada@example.com".into()),
                address: Some("12 Analytical St".into()),
            },
            fulfillment: Fulfillment::Delivery,
            lines,
            payment_method: PaymentMethod::CashOnDelivery,
            notes: None,
        }
    }

    fn line(food_id: FoodId, quantity: u32) -> CartLine {
        CartLine {
            food_id,
            quantity,
            selection: Selection::default(),
        }
    }

    #[test]
    fn quote_prices_lines_and_adds_delivery_fee() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, None);

        let q = quote(&fx.foods, &[line(pizza, 2)], Fulfillment::Delivery, &DeliveryPolicy::default()).unwrap();
        assert_eq!(q.lines[0].line_total, Money::from_cents(1800));
        assert_eq!(q.totals.delivery_fee, Money::from_cents(300));
        assert_eq!(q.totals.total, Money::from_cents(2100));
    }

    #[test]
    fn placing_reserves_stock_and_projects_the_order() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(5));

        let placed = fx.checkout().place(request(vec![line(pizza, 2)]), Utc::now()).unwrap();

        assert_eq!(fx.foods.get(&pizza).unwrap().stock, Some(3));
        let view = fx.orders.by_tracking_code(&placed.tracking_code).unwrap();
        assert_eq!(view.status, OrderStatus::Pending);
        assert!(fx.index.is_taken(Namespace::TrackingCode, placed.tracking_code.as_str()));
    }

    #[test]
    fn rejected_order_releases_reserved_stock() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(5));
        let tiramisu = fx.food("Tiramisu", 600, Some(2));

        // Pricing passes; the order aggregate rejects a delivery without an
        // address after both lines were reserved.
        let mut req = request(vec![line(pizza, 2), line(tiramisu, 1)]);
        req.contact.address = None;

        let err = fx.checkout().place(req, Utc::now()).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
        assert_eq!(fx.foods.get(&pizza).unwrap().stock, Some(5));
        assert_eq!(fx.foods.get(&tiramisu).unwrap().stock, Some(2));
        assert!(fx.orders.all().is_empty());
    }

    #[test]
    fn reservation_failure_surfaces_as_validation() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(1));

        let err = fx.checkout().place(request(vec![line(pizza, 2)]), Utc::now()).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
        assert_eq!(fx.foods.get(&pizza).unwrap().stock, Some(1));
    }

    #[test]
    fn cancelling_gives_stock_back() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(4));
        let placed = fx.checkout().place(request(vec![line(pizza, 3)]), Utc::now()).unwrap();
        assert_eq!(fx.foods.get(&pizza).unwrap().stock, Some(1));

        fx.checkout()
            .cancel(placed.order_id, Some("changed my mind".into()), true, Utc::now())
            .unwrap();

        assert_eq!(fx.foods.get(&pizza).unwrap().stock, Some(4));
        assert_eq!(fx.orders.get(&placed.order_id).unwrap().status, OrderStatus::Cancelled);
    }

    #[test]
    fn admin_cancel_via_status_change_releases_stock() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(2));
        let placed = fx.checkout().place(request(vec![line(pizza, 2)]), Utc::now()).unwrap();

        let checkout = fx.checkout();
        checkout
            .change_status(placed.order_id, OrderStatus::Confirmed, None, Utc::now())
            .unwrap();
        checkout
            .change_status(placed.order_id, OrderStatus::Cancelled, Some("kitchen closed".into()), Utc::now())
            .unwrap();

        assert_eq!(fx.foods.get(&pizza).unwrap().stock, Some(2));
    }

    #[test]
    fn sold_out_food_cannot_be_quoted() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(0));
        let err = quote(&fx.foods, &[line(pizza, 1)], Fulfillment::Pickup, &DeliveryPolicy::default()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn interleaved_reservations_on_one_food_both_land() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(5));
        fx.dispatcher.store().cut_in(pizza, rival_reservation(pizza, 2));

        fx.checkout().place(request(vec![line(pizza, 2)]), Utc::now()).unwrap();

        assert_eq!(fx.stock_of(pizza), Some(1));
        assert_eq!(fx.foods.get(&pizza).unwrap().stock, Some(1));
        assert_eq!(fx.orders.all().len(), 1);
    }

    #[test]
    fn reservation_gives_up_after_repeated_races() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(10));
        for _ in 0..STOCK_ATTEMPTS {
            fx.dispatcher.store().cut_in(pizza, rival_reservation(pizza, 1));
        }

        let err = fx.checkout().place(request(vec![line(pizza, 2)]), Utc::now()).unwrap_err();

        assert!(matches!(err, DispatchError::Concurrency(_)));
        assert_eq!(fx.stock_of(pizza), Some(10 - STOCK_ATTEMPTS as u32));
        assert!(fx.orders.all().is_empty());
    }

    #[test]
    fn cancel_returns_stock_when_a_reservation_races_the_release() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(4));
        let placed = fx.checkout().place(request(vec![line(pizza, 2)]), Utc::now()).unwrap();
        fx.dispatcher.store().cut_in(pizza, rival_reservation(pizza, 1));

        fx.checkout().cancel(placed.order_id, None, true, Utc::now()).unwrap();

        assert_eq!(fx.stock_of(pizza), Some(3));
        assert_eq!(fx.foods.get(&pizza).unwrap().stock, Some(3));
        let food = fx
            .dispatcher
            .load(pizza.aggregate_id(), |id| Food::empty(FoodId::new(id)))
            .unwrap();
        assert_eq!(food.reserved_for(placed.order_id.aggregate_id()), 0);
    }

    #[test]
    fn publishes_out_of_append_order_keep_the_menu_in_step() {
        let fx = Fixture::new();
        let pizza = fx.food("Margherita", 900, Some(1));

        // The hook runs a second request to completion between this
        // request's append and its publish.
        let second_request: Box<dyn FnOnce() + Send + '_> =
            Box::new(|| fx.dispatch_food_cmd(pizza, restock(pizza, 7)));
        let hooked = CommandDispatcher::new(
            fx.dispatcher.store().clone(),
            HookBus {
                inner: fx.dispatcher.bus().clone(),
                hook: Mutex::new(Some(second_request)),
            },
        );
        hooked
            .dispatch(pizza.aggregate_id(), food::AGGREGATE_TYPE, restock(pizza, 10), |id| {
                Food::empty(FoodId::new(id))
            })
            .unwrap();
        assert_eq!(fx.foods.get(&pizza).unwrap().stock, fx.stock_of(pizza));

        fx.dispatch_food_cmd(pizza, restock(pizza, 4));

        assert_eq!(fx.stock_of(pizza), Some(4));
        assert_eq!(fx.foods.get(&pizza).unwrap().stock, Some(4));
        assert_eq!(fx.dispatcher.bus().held_count(), 0);
    }
}
