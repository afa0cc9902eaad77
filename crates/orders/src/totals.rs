//! Order totals and delivery pricing.

use serde::{Deserialize, Serialize};

use trattoria_core::{DomainError, DomainResult, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fulfillment {
    Delivery,
    Pickup,
}

impl Fulfillment {
    pub fn parse(input: &str) -> DomainResult<Self> {
        match input.trim().to_lowercase().as_str() {
            "delivery" => Ok(Fulfillment::Delivery),
            "pickup" | "pick_up" | "pick-up" | "takeaway" => Ok(Fulfillment::Pickup),
            other => Err(DomainError::validation(format!(
                "unknown fulfillment '{other}' (expected delivery or pickup)"
            ))),
        }
    }
}

/// Delivery fee rules, set from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    pub flat_fee: Money,
    /// Subtotals at or above this ship free.
    pub free_threshold: Option<Money>,
    /// Smallest subtotal accepted for delivery.
    pub min_order: Option<Money>,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            flat_fee: Money::from_cents(300),
            free_threshold: Some(Money::from_cents(3000)),
            min_order: None,
        }
    }
}

impl DeliveryPolicy {
    pub fn fee_for(&self, subtotal: Money, fulfillment: Fulfillment) -> Money {
        match fulfillment {
            Fulfillment::Pickup => Money::ZERO,
            Fulfillment::Delivery => match self.free_threshold {
                Some(threshold) if subtotal >= threshold => Money::ZERO,
                _ => self.flat_fee,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrderTotals {
    pub subtotal: Money,
    /// What the discounts took off the list prices.
    pub savings: Money,
    pub delivery_fee: Money,
    pub total: Money,
}

/// Compute totals from `(list_unit, unit, quantity)` triples.
pub fn compute_totals(
    lines: impl IntoIterator<Item = (Money, Money, u32)>,
    fulfillment: Fulfillment,
    policy: &DeliveryPolicy,
) -> DomainResult<OrderTotals> {
    let mut subtotal = Money::ZERO;
    let mut savings = Money::ZERO;
    for (list_unit, unit, quantity) in lines {
        subtotal = subtotal.checked_add(unit.checked_mul(quantity)?)?;
        savings = savings.checked_add(list_unit.saturating_sub(unit).checked_mul(quantity)?)?;
    }

    if fulfillment == Fulfillment::Delivery {
        if let Some(min) = policy.min_order {
            if subtotal < min {
                return Err(DomainError::validation(format!(
                    "delivery orders need a subtotal of at least {min}"
                )));
            }
        }
    }

    let delivery_fee = policy.fee_for(subtotal, fulfillment);
    Ok(OrderTotals {
        subtotal,
        savings,
        delivery_fee,
        total: subtotal.checked_add(delivery_fee)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(c: u64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn delivery_fee_applies_below_threshold() {
        let policy = DeliveryPolicy::default();
        let totals = compute_totals([(m(1000), m(800), 2)], Fulfillment::Delivery, &policy).unwrap();
        assert_eq!(totals.subtotal, m(1600));
        assert_eq!(totals.savings, m(400));
        assert_eq!(totals.delivery_fee, m(300));
        assert_eq!(totals.total, m(1900));
    }

    #[test]
    fn free_delivery_at_threshold() {
        let policy = DeliveryPolicy::default();
        let totals = compute_totals([(m(1500), m(1500), 2)], Fulfillment::Delivery, &policy).unwrap();
        assert_eq!(totals.delivery_fee, Money::ZERO);
        assert_eq!(totals.total, m(3000));
    }

    #[test]
    fn pickup_is_free_and_ignores_minimum() {
        let policy = DeliveryPolicy { min_order: Some(m(5000)), ..DeliveryPolicy::default() };
        let totals = compute_totals([(m(500), m(500), 1)], Fulfillment::Pickup, &policy).unwrap();
        assert_eq!(totals.delivery_fee, Money::ZERO);
        assert_eq!(totals.total, m(500));
    }

    #[test]
    fn delivery_minimum_is_enforced() {
        let policy = DeliveryPolicy { min_order: Some(m(2000)), ..DeliveryPolicy::default() };
        let err = compute_totals([(m(500), m(500), 1)], Fulfillment::Delivery, &policy).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn no_threshold_always_charges() {
        let policy = DeliveryPolicy { free_threshold: None, ..DeliveryPolicy::default() };
        let totals = compute_totals([(m(90_000), m(90_000), 1)], Fulfillment::Delivery, &policy).unwrap();
        assert_eq!(totals.delivery_fee, m(300));
    }

    #[test]
    fn fulfillment_parse() {
        assert_eq!(Fulfillment::parse("Pick-Up").unwrap(), Fulfillment::Pickup);
        assert_eq!(Fulfillment::parse("delivery").unwrap(), Fulfillment::Delivery);
        assert!(Fulfillment::parse("drone").is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The total is always subtotal plus fee, and the fee follows the policy.
            #[test]
            fn totals_add_up(
                lines in proptest::collection::vec((1u64..10_000, 0u8..=100, 1u32..=20), 1..10),
                delivery in any::<bool>(),
            ) {
                let policy = DeliveryPolicy::default();
                let fulfillment = if delivery { Fulfillment::Delivery } else { Fulfillment::Pickup };
                let priced: Vec<(Money, Money, u32)> = lines
                    .iter()
                    .map(|&(list, off, qty)| (m(list), m(list).percent_off(off), qty))
                    .collect();

                let totals = compute_totals(priced.iter().copied(), fulfillment, &policy).unwrap();

                let subtotal: u64 = priced.iter().map(|(_, unit, qty)| unit.cents() * u64::from(*qty)).sum();
                let savings: u64 = priced
                    .iter()
                    .map(|(list, unit, qty)| (list.cents() - unit.cents()) * u64::from(*qty))
                    .sum();
                prop_assert_eq!(totals.subtotal.cents(), subtotal);
                prop_assert_eq!(totals.savings.cents(), savings);
                prop_assert_eq!(totals.total.cents(), subtotal + totals.delivery_fee.cents());
                let expected_fee = if !delivery || subtotal >= 3000 { 0 } else { 300 };
                prop_assert_eq!(totals.delivery_fee.cents(), expected_fee);
            }
        }
    }
}
