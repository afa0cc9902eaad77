//! Admin dashboard figures and sales charts, computed from read models.
//!
//! Revenue counts every order that was not cancelled. All bucketing is in
//! UTC.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::Serialize;

use trattoria_catalog::FoodId;
use trattoria_core::{DomainError, Money};
use trattoria_orders::{OrderId, OrderStatus, TrackingCode};

use crate::projections::OrderView;

const TOP_FOODS: usize = 5;
const RECENT_ORDERS: usize = 5;

/// Counts that come from outside the orders read model.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardCounts {
    pub foods: usize,
    pub categories: usize,
    pub customers: usize,
    pub published_posts: usize,
    pub pending_reservations: usize,
    pub unread_messages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopFood {
    pub food_id: FoodId,
    pub name: String,
    pub quantity: u64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentOrder {
    pub id: OrderId,
    pub tracking_code: TrackingCode,
    pub customer_name: String,
    pub status: OrderStatus,
    pub total: Money,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Every order ever placed, cancelled ones included.
    pub total_orders: usize,
    /// Excludes cancelled orders.
    pub total_revenue: Money,
    /// Orders placed since midnight UTC that were not cancelled, the same
    /// set `today_revenue` sums.
    pub today_orders: usize,
    pub today_revenue: Money,
    /// Every status is present, zero when unused.
    pub orders_by_status: BTreeMap<&'static str, usize>,
    pub total_foods: usize,
    pub total_categories: usize,
    pub total_customers: usize,
    pub published_posts: usize,
    pub pending_reservations: usize,
    pub unread_messages: usize,
    pub top_foods: Vec<TopFood>,
    pub recent_orders: Vec<RecentOrder>,
}

pub fn stats(orders: &[OrderView], counts: DashboardCounts, now: DateTime<Utc>) -> Result<DashboardStats, DomainError> {
    let today = day_start(now);

    let mut orders_by_status: BTreeMap<&'static str, usize> =
        OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut total_revenue = Money::ZERO;
    let mut today_orders = 0;
    let mut today_revenue = Money::ZERO;
    let mut by_food: HashMap<FoodId, TopFood> = HashMap::new();

    for order in orders {
        *orders_by_status.entry(order.status.as_str()).or_insert(0) += 1;
        if order.status == OrderStatus::Cancelled {
            continue;
        }

        total_revenue = total_revenue.checked_add(order.totals.total)?;
        if order.placed_at >= today {
            today_orders += 1;
            today_revenue = today_revenue.checked_add(order.totals.total)?;
        }
        for line in &order.lines {
            let entry = by_food.entry(line.food_id).or_insert_with(|| TopFood {
                food_id: line.food_id,
                name: line.name.clone(),
                quantity: 0,
                revenue: Money::ZERO,
            });
            entry.quantity += u64::from(line.quantity);
            entry.revenue = entry.revenue.checked_add(line.line_total)?;
        }
    }

    let mut top_foods: Vec<TopFood> = by_food.into_values().collect();
    top_foods.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    top_foods.truncate(TOP_FOODS);

    let mut newest: Vec<&OrderView> = orders.iter().collect();
    newest.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
    let recent_orders = newest
        .into_iter()
        .take(RECENT_ORDERS)
        .map(|o| RecentOrder {
            id: o.id,
            tracking_code: o.tracking_code.clone(),
            customer_name: o.contact.name.clone(),
            status: o.status,
            total: o.totals.total,
            placed_at: o.placed_at,
        })
        .collect();

    Ok(DashboardStats {
        total_orders: orders.len(),
        total_revenue,
        today_orders,
        today_revenue,
        orders_by_status,
        total_foods: counts.foods,
        total_categories: counts.categories,
        total_customers: counts.customers,
        published_posts: counts.published_posts,
        pending_reservations: counts.pending_reservations,
        unread_messages: counts.unread_messages,
        top_foods,
        recent_orders,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SalesRange {
    /// 24 hourly buckets.
    Day,
    /// 7 daily buckets.
    #[default]
    Week,
    /// 30 daily buckets.
    Month,
    /// 12 monthly buckets.
    Year,
}

impl SalesRange {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        match input.trim().to_lowercase().as_str() {
            "24h" | "day" => Ok(SalesRange::Day),
            "" | "7d" | "week" => Ok(SalesRange::Week),
            "30d" | "month" => Ok(SalesRange::Month),
            "12m" | "year" => Ok(SalesRange::Year),
            other => Err(DomainError::validation(format!(
                "unknown range '{other}' (expected 24h, 7d, 30d or 12m)"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SalesRange::Day => "24h",
            SalesRange::Week => "7d",
            SalesRange::Month => "30d",
            SalesRange::Year => "12m",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesBucket {
    pub label: String,
    pub start: DateTime<Utc>,
    pub orders: usize,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesSeries {
    pub range: &'static str,
    pub buckets: Vec<SalesBucket>,
    pub total_orders: usize,
    pub total_revenue: Money,
}

/// Oldest bucket first; the last bucket contains `now`. Cancelled orders are
/// left out and empty buckets are zero.
pub fn sales_series(orders: &[OrderView], range: SalesRange, now: DateTime<Utc>) -> Result<SalesSeries, DomainError> {
    let bounds = bucket_bounds(range, now);

    let mut buckets: Vec<SalesBucket> = bounds
        .iter()
        .map(|(start, _, label)| SalesBucket {
            label: label.clone(),
            start: *start,
            orders: 0,
            revenue: Money::ZERO,
        })
        .collect();

    for order in orders.iter().filter(|o| o.status != OrderStatus::Cancelled) {
        let slot = bounds
            .iter()
            .position(|(start, end, _)| order.placed_at >= *start && order.placed_at < *end);
        if let Some(i) = slot {
            buckets[i].orders += 1;
            buckets[i].revenue = buckets[i].revenue.checked_add(order.totals.total)?;
        }
    }

    let total_orders = buckets.iter().map(|b| b.orders).sum();
    let total_revenue = Money::sum(buckets.iter().map(|b| b.revenue))?;
    Ok(SalesSeries {
        range: range.as_str(),
        buckets,
        total_orders,
        total_revenue,
    })
}

fn day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn hour_start(at: DateTime<Utc>) -> DateTime<Utc> {
    day_start(at) + Duration::hours(i64::from(at.hour()))
}

/// First instant of the month `back` months before `at`'s month.
fn month_start(at: DateTime<Utc>, back: i32) -> Option<DateTime<Utc>> {
    let index = at.year() * 12 + at.month0() as i32 - back;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    NaiveDate::from_ymd_opt(index.div_euclid(12), month, 1).map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

fn bucket_bounds(range: SalesRange, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>, String)> {
    let fixed = |count: i64, step: Duration, last: DateTime<Utc>, fmt: &str| {
        (0..count)
            .map(|i| {
                let start = last - step * (count - 1 - i) as i32;
                (start, start + step, start.format(fmt).to_string())
            })
            .collect::<Vec<_>>()
    };

    match range {
        SalesRange::Day => fixed(24, Duration::hours(1), hour_start(now), "%Y-%m-%dT%H:00"),
        SalesRange::Week => fixed(7, Duration::days(1), day_start(now), "%Y-%m-%d"),
        SalesRange::Month => fixed(30, Duration::days(1), day_start(now), "%Y-%m-%d"),
        SalesRange::Year => (0..12)
            .rev()
            .filter_map(|back| {
                let start = month_start(now, back)?;
                let end = month_start(now, back - 1)?;
                Some((start, end, start.format("%Y-%m").to_string()))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use trattoria_catalog::SelectedOption;
    use trattoria_orders::{Fulfillment, OrderContact, OrderLine, OrderTotals, PaymentMethod};

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 15, 0).unwrap()
    }

    fn order(placed_at: DateTime<Utc>, status: OrderStatus, food: FoodId, qty: u32, cents: u64) -> OrderView {
        let unit = Money::from_cents(cents);
        let line_total = Money::from_cents(cents * u64::from(qty));
        OrderView {
            id: OrderId::generate(),
            tracking_code: TrackingCode::parse("ABCD-EFGH").unwrap(),
            customer_id: None,
            contact: OrderContact {
                name: "Ada".into(),
                phone: "5551234567".into(),
                email: None,
                address: None,
            },
            fulfillment: Fulfillment::Pickup,
            lines: vec![OrderLine {
                food_id: food,
                name: format!("food-{cents}"),
                sku: "SKU".into(),
                variant: None,
                options: Vec::<SelectedOption>::new(),
                quantity: qty,
                list_unit_price: unit,
                unit_price: unit,
                line_total,
            }],
            totals: OrderTotals {
                subtotal: line_total,
                savings: Money::ZERO,
                delivery_fee: Money::ZERO,
                total: line_total,
            },
            payment_method: PaymentMethod::CashOnDelivery,
            notes: None,
            status,
            history: vec![],
            cancel_reason: None,
            placed_at,
            updated_at: placed_at,
        }
    }

    #[test]
    fn cancelled_orders_count_in_totals_but_not_in_today_figures() {
        let now = at(2024, 5, 10, 18);
        let pizza = FoodId::generate();
        let pasta = FoodId::generate();
        let orders = vec![
            order(at(2024, 5, 10, 12), OrderStatus::Delivered, pizza, 2, 1000),
            order(at(2024, 5, 9, 12), OrderStatus::Pending, pasta, 5, 800),
            order(at(2024, 5, 10, 13), OrderStatus::Cancelled, pasta, 1, 800),
        ];

        let s = stats(&orders, DashboardCounts::default(), now).unwrap();
        assert_eq!(s.total_orders, 3);
        assert_eq!(s.total_revenue, Money::from_cents(6000));
        assert_eq!(s.today_orders, 1);
        assert_eq!(s.today_revenue, Money::from_cents(2000));
        assert_eq!(s.orders_by_status["cancelled"], 1);
        assert_eq!(s.orders_by_status["ready"], 0);
        assert_eq!(s.top_foods[0].food_id, pasta);
        assert_eq!(s.top_foods[0].quantity, 5);
        assert_eq!(s.recent_orders[0].status, OrderStatus::Cancelled);
    }

    #[test]
    fn hourly_series_ends_with_current_hour() {
        let now = at(2024, 5, 10, 18);
        let orders = vec![
            order(at(2024, 5, 10, 18), OrderStatus::Pending, FoodId::generate(), 1, 500),
            order(at(2024, 5, 9, 19), OrderStatus::Pending, FoodId::generate(), 1, 700),
            // 25 hours back: outside the window.
            order(at(2024, 5, 9, 17), OrderStatus::Pending, FoodId::generate(), 1, 900),
        ];

        let series = sales_series(&orders, SalesRange::Day, now).unwrap();
        assert_eq!(series.buckets.len(), 24);
        assert_eq!(series.buckets[0].label, "2024-05-09T19:00");
        assert_eq!(series.buckets[0].revenue, Money::from_cents(700));
        assert_eq!(series.buckets[23].label, "2024-05-10T18:00");
        assert_eq!(series.buckets[23].orders, 1);
        assert_eq!(series.total_orders, 2);
    }

    #[test]
    fn daily_series_zero_fills_and_skips_cancelled() {
        let now = at(2024, 3, 2, 9);
        let orders = vec![
            order(at(2024, 2, 28, 10), OrderStatus::Delivered, FoodId::generate(), 1, 1200),
            order(at(2024, 2, 28, 11), OrderStatus::Cancelled, FoodId::generate(), 1, 5000),
        ];

        let series = sales_series(&orders, SalesRange::Week, now).unwrap();
        let labels: Vec<&str> = series.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            ["2024-02-25", "2024-02-26", "2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01", "2024-03-02"]
        );
        assert_eq!(series.buckets[3].revenue, Money::from_cents(1200));
        assert_eq!(series.total_revenue, Money::from_cents(1200));
        assert_eq!(series.buckets[4].orders, 0);
    }

    #[test]
    fn monthly_series_crosses_year_boundary() {
        let now = at(2024, 2, 15, 12);
        let orders = vec![order(at(2023, 3, 1, 0), OrderStatus::Delivered, FoodId::generate(), 2, 250)];

        let series = sales_series(&orders, SalesRange::Year, now).unwrap();
        assert_eq!(series.buckets.len(), 12);
        assert_eq!(series.buckets[0].label, "2023-03");
        assert_eq!(series.buckets[0].revenue, Money::from_cents(500));
        assert_eq!(series.buckets[10].label, "2024-01");
        assert_eq!(series.buckets[11].label, "2024-02");
    }

    #[test]
    fn thirty_day_range_has_thirty_buckets() {
        let series = sales_series(&[], SalesRange::parse("30d").unwrap(), at(2024, 1, 1, 0)).unwrap();
        assert_eq!(series.buckets.len(), 30);
        assert_eq!(series.buckets[29].label, "2024-01-01");
        assert!(SalesRange::parse("90d").is_err());
    }
}
