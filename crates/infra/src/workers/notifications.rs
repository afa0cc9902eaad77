//! Email notifications, stubbed: the notice that would be sent is logged.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use trattoria_contact::{MessageEvent, message};
use trattoria_events::EventEnvelope;
use trattoria_orders::{OrderEvent, order};
use trattoria_reservations::{ReservationEvent, ReservationStatus, reservation};

use crate::projections::{OrdersProjection, ReservationsProjection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailNotice {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Turns committed events into customer and staff notices.
///
/// Runs after the projections, so the read models already reflect the event
/// being handled.
pub struct Notifier {
    orders: Arc<OrdersProjection>,
    reservations: Arc<ReservationsProjection>,
    staff_address: Option<String>,
}

impl Notifier {
    pub fn new(
        orders: Arc<OrdersProjection>,
        reservations: Arc<ReservationsProjection>,
        staff_address: Option<String>,
    ) -> Self {
        Self {
            orders,
            reservations,
            staff_address,
        }
    }

    pub fn handle(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), serde_json::Error> {
        for notice in self.notices_for(envelope)? {
            info!(
                to = %notice.to,
                subject = %notice.subject,
                event_type = envelope.event_type(),
                "email delivery disabled; notice logged"
            );
            debug!(body = %notice.body, "notice body");
        }
        Ok(())
    }

    pub fn notices_for(&self, envelope: &EventEnvelope<JsonValue>) -> Result<Vec<EmailNotice>, serde_json::Error> {
        let payload = envelope.payload().clone();
        let notices = match envelope.aggregate_type() {
            order::AGGREGATE_TYPE => self.order_notices(serde_json::from_value(payload)?),
            reservation::AGGREGATE_TYPE => self.reservation_notices(serde_json::from_value(payload)?),
            message::AGGREGATE_TYPE => self.message_notices(serde_json::from_value(payload)?),
            _ => Vec::new(),
        };
        Ok(notices)
    }

    fn order_notices(&self, event: OrderEvent) -> Vec<EmailNotice> {
        match event {
            OrderEvent::Placed(e) => {
                let mut out = Vec::new();
                if let Some(to) = e.contact.email.clone() {
                    out.push(EmailNotice {
                        to,
                        subject: format!("Order {} received", e.tracking_code),
                        body: format!(
                            "Hi {}, we received your order of {} item(s), total {}. Track it with code {}.",
                            e.contact.name,
                            e.lines.iter().map(|l| l.quantity).sum::<u32>(),
                            e.totals.total,
                            e.tracking_code
                        ),
                    });
                }
                if let Some(to) = self.staff_address.clone() {
                    out.push(EmailNotice {
                        to,
                        subject: format!("New order {}", e.tracking_code),
                        body: format!("{} placed an order totalling {}.", e.contact.name, e.totals.total),
                    });
                }
                out
            }
            OrderEvent::StatusChanged(e) => {
                let Some(view) = self.orders.get(&e.order_id) else {
                    return Vec::new();
                };
                view.contact
                    .email
                    .map(|to| EmailNotice {
                        to,
                        subject: format!("Order {} is now {}", view.tracking_code, e.to),
                        body: match e.note {
                            Some(note) => format!("Your order moved from {} to {}: {note}", e.from, e.to),
                            None => format!("Your order moved from {} to {}.", e.from, e.to),
                        },
                    })
                    .into_iter()
                    .collect()
            }
            OrderEvent::Cancelled(e) => {
                let Some(view) = self.orders.get(&e.order_id) else {
                    return Vec::new();
                };
                view.contact
                    .email
                    .map(|to| EmailNotice {
                        to,
                        subject: format!("Order {} cancelled", view.tracking_code),
                        body: e.reason.unwrap_or_else(|| "Your order was cancelled.".to_string()),
                    })
                    .into_iter()
                    .collect()
            }
        }
    }

    fn reservation_notices(&self, event: ReservationEvent) -> Vec<EmailNotice> {
        match event {
            ReservationEvent::Requested(e) => vec![EmailNotice {
                to: e.email,
                subject: "Reservation request received".to_string(),
                body: format!(
                    "Hi {}, we received your request for {} guest(s) on {}. We will confirm shortly.",
                    e.name,
                    e.party_size,
                    e.reserved_for.format("%Y-%m-%d %H:%M UTC")
                ),
            }],
            ReservationEvent::StatusChanged(e) if e.to == ReservationStatus::Confirmed => {
                let Some(view) = self.reservations.get(&e.reservation_id) else {
                    return Vec::new();
                };
                vec![EmailNotice {
                    to: view.email,
                    subject: "Reservation confirmed".to_string(),
                    body: format!(
                        "Your table for {} on {} is confirmed.",
                        view.party_size,
                        view.reserved_for.format("%Y-%m-%d %H:%M UTC")
                    ),
                }]
            }
            _ => Vec::new(),
        }
    }

    fn message_notices(&self, event: MessageEvent) -> Vec<EmailNotice> {
        match (event, &self.staff_address) {
            (MessageEvent::Received(e), Some(staff)) => vec![EmailNotice {
                to: staff.clone(),
                subject: format!(
                    "Contact form: {}",
                    e.subject.as_deref().unwrap_or("(no subject)")
                ),
                body: format!("From {} <{}>:\n\n{}", e.name, e.email, e.body),
            }],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use trattoria_contact::{MessageId, MessageReceived};
    use trattoria_reservations::{ReservationId, ReservationRequested};

    use super::*;

    fn envelope(aggregate_type: &str, payload: JsonValue) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            trattoria_core::AggregateId::new(),
            aggregate_type,
            1,
            "test",
            Utc::now(),
            payload,
        )
    }

    fn notifier(staff: Option<&str>) -> Notifier {
        Notifier::new(
            Arc::new(OrdersProjection::in_memory()),
            Arc::new(ReservationsProjection::in_memory()),
            staff.map(str::to_string),
        )
    }

    #[test]
    fn reservation_request_notifies_the_guest() {
        let now = Utc::now();
        let ev = ReservationEvent::Requested(ReservationRequested {
            reservation_id: ReservationId::generate(),
            user_id: None,
            name: "Grace".into(),
            email: "grace@example.com".into(),
            phone: "5551234567".into(),
            party_size: 2,
            reserved_for: now + Duration::days(1),
            notes: None,
            occurred_at: now,
        });

        let notices = notifier(None)
            .notices_for(&envelope(reservation::AGGREGATE_TYPE, serde_json::to_value(&ev).unwrap()))
            .unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].to, "grace@example.com");
    }

    #[test]
    fn contact_messages_go_to_staff_only_when_configured() {
        let ev = MessageEvent::Received(MessageReceived {
            message_id: MessageId::generate(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            subject: None,
            body: "Do you cater weddings?".into(),
            occurred_at: Utc::now(),
        });
        let env = envelope(message::AGGREGATE_TYPE, serde_json::to_value(&ev).unwrap());

        assert!(notifier(None).notices_for(&env).unwrap().is_empty());
        let notices = notifier(Some("staff@trattoria.test")).notices_for(&env).unwrap();
        assert_eq!(notices[0].to, "staff@trattoria.test");
        assert!(notices[0].subject.contains("(no subject)"));
    }

    #[test]
    fn unrelated_aggregates_are_ignored() {
        let env = envelope("catalog.food", serde_json::json!({"anything": 1}));
        assert!(notifier(Some("staff@trattoria.test")).notices_for(&env).unwrap().is_empty());
    }
}
