//! Order status vocabulary and allowed transitions.

use serde::{Deserialize, Serialize};

use trattoria_core::DomainError;

use crate::totals::Fulfillment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parse free-form input from admins and legacy clients.
    ///
    /// Trims, lowercases, treats spaces and dashes as underscores, then maps
    /// known aliases onto the canonical names.
    pub fn normalize(input: &str) -> Result<Self, DomainError> {
        let key: String = input
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        let status = match key.as_str() {
            "pending" | "new" | "placed" => OrderStatus::Pending,
            "confirmed" | "accepted" => OrderStatus::Confirmed,
            "preparing" | "processing" | "in_progress" | "cooking" => OrderStatus::Preparing,
            "ready" | "ready_for_pickup" => OrderStatus::Ready,
            "out_for_delivery" | "on_the_way" | "dispatched" | "shipped" => OrderStatus::OutForDelivery,
            "delivered" | "completed" | "complete" | "picked_up" => OrderStatus::Delivered,
            "cancelled" | "canceled" => OrderStatus::Cancelled,
            _ => {
                return Err(DomainError::validation(format!(
                    "unknown order status '{}'",
                    input.trim()
                )));
            }
        };
        Ok(status)
    }

    /// Position in the forward flow; cancelled sits outside it.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::Ready => Some(3),
            OrderStatus::OutForDelivery => Some(4),
            OrderStatus::Delivered => Some(5),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::Ready
        )
    }

    /// Check a staff-initiated move from `self` to `next`.
    pub fn check_transition(self, next: OrderStatus, fulfillment: Fulfillment) -> Result<(), DomainError> {
        if self == next {
            return Err(DomainError::conflict(format!("order is already {}", self.as_str())));
        }
        if self.is_terminal() {
            return Err(DomainError::invariant(format!(
                "order is {} and can no longer change",
                self.as_str()
            )));
        }
        if next == OrderStatus::Cancelled {
            return if self.is_cancellable() {
                Ok(())
            } else {
                Err(DomainError::invariant(format!(
                    "an order that is {} cannot be cancelled",
                    self.as_str()
                )))
            };
        }
        if next == OrderStatus::OutForDelivery && fulfillment == Fulfillment::Pickup {
            return Err(DomainError::invariant("pickup orders are never out for delivery"));
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) if to > from => Ok(()),
            _ => Err(DomainError::invariant(format!(
                "cannot move an order from {} back to {}",
                self.as_str(),
                next.as_str()
            ))),
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize() {
        let cases = [
            ("NEW", OrderStatus::Pending),
            ("placed", OrderStatus::Pending),
            ("Accepted", OrderStatus::Confirmed),
            ("in progress", OrderStatus::Preparing),
            ("cooking", OrderStatus::Preparing),
            ("ready-for-pickup", OrderStatus::Ready),
            ("On The Way", OrderStatus::OutForDelivery),
            ("shipped", OrderStatus::OutForDelivery),
            ("picked_up", OrderStatus::Delivered),
            ("complete", OrderStatus::Delivered),
            (" canceled ", OrderStatus::Cancelled),
        ];
        for (input, expected) in cases {
            assert_eq!(OrderStatus::normalize(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert!(matches!(OrderStatus::normalize("teleported"), Err(DomainError::Validation(_))));
    }

    #[test]
    fn canonical_names_round_trip() {
        for s in OrderStatus::ALL {
            assert_eq!(OrderStatus::normalize(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn forward_moves_only() {
        let d = Fulfillment::Delivery;
        assert!(OrderStatus::Pending.check_transition(OrderStatus::Confirmed, d).is_ok());
        assert!(OrderStatus::Pending.check_transition(OrderStatus::Preparing, d).is_ok());
        assert!(OrderStatus::Ready.check_transition(OrderStatus::OutForDelivery, d).is_ok());
        assert!(matches!(
            OrderStatus::Preparing.check_transition(OrderStatus::Confirmed, d),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(matches!(
            OrderStatus::Ready.check_transition(OrderStatus::Ready, d),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn pickup_skips_delivery_leg() {
        let p = Fulfillment::Pickup;
        assert!(OrderStatus::Ready.check_transition(OrderStatus::OutForDelivery, p).is_err());
        assert!(OrderStatus::Ready.check_transition(OrderStatus::Delivered, p).is_ok());
    }

    #[test]
    fn cancellation_window() {
        let d = Fulfillment::Delivery;
        for s in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Ready] {
            assert!(s.check_transition(OrderStatus::Cancelled, d).is_ok(), "{s}");
        }
        assert!(OrderStatus::OutForDelivery.check_transition(OrderStatus::Cancelled, d).is_err());
        assert!(OrderStatus::Delivered.check_transition(OrderStatus::Cancelled, d).is_err());
    }

    #[test]
    fn terminal_states_are_final() {
        let d = Fulfillment::Delivery;
        assert!(OrderStatus::Cancelled.check_transition(OrderStatus::Pending, d).is_err());
        assert!(OrderStatus::Delivered.check_transition(OrderStatus::Ready, d).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Canonical names survive any casing, padding and dash/space separators.
            #[test]
            fn canonical_names_normalize_back(
                idx in 0usize..OrderStatus::ALL.len(),
                upper in proptest::collection::vec(any::<bool>(), 32),
                sep in prop_oneof![Just('_'), Just('-'), Just(' ')],
                pad in "[ \t]{0,3}",
            ) {
                let status = OrderStatus::ALL[idx];
                let noisy: String = status
                    .as_str()
                    .chars()
                    .zip(upper.iter().cycle())
                    .map(|(c, up)| match c {
                        '_' => sep,
                        c if *up => c.to_ascii_uppercase(),
                        c => c,
                    })
                    .collect();
                let input = format!("{pad}{noisy}{pad}");
                prop_assert_eq!(OrderStatus::normalize(&input).unwrap(), status);
            }
        }
    }
}
