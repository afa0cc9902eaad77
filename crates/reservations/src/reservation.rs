//! Reservation aggregate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use trattoria_core::{Aggregate, AggregateId, AggregateRoot, DomainError, validate};
use trattoria_events::Event;

use crate::status::ReservationStatus;

trattoria_core::typed_id!(ReservationId);

pub const AGGREGATE_TYPE: &str = "reservations.reservation";

pub const MIN_PARTY: u32 = 1;
pub const MAX_PARTY: u32 = 20;
pub const MAX_DAYS_AHEAD: i64 = 90;

#[derive(Debug, Clone)]
pub struct Reservation {
    id: ReservationId,
    user_id: Option<AggregateId>,
    email: String,
    party_size: u32,
    reserved_for: Option<DateTime<Utc>>,
    status: ReservationStatus,
    version: u64,
}

impl Reservation {
    pub fn empty(id: ReservationId) -> Self {
        Self {
            id,
            user_id: None,
            email: String::new(),
            party_size: 0,
            reserved_for: None,
            status: ReservationStatus::Pending,
            version: 0,
        }
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn user_id(&self) -> Option<AggregateId> {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn party_size(&self) -> u32 {
        self.party_size
    }

    pub fn reserved_for(&self) -> Option<DateTime<Utc>> {
        self.reserved_for
    }
}

impl AggregateRoot for Reservation {
    type Id = ReservationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestReservation {
    pub reservation_id: ReservationId,
    pub user_id: Option<AggregateId>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub party_size: u32,
    pub reserved_for: DateTime<Utc>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeReservationStatus {
    pub reservation_id: ReservationId,
    pub status: ReservationStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelReservation {
    pub reservation_id: ReservationId,
    pub by_customer: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReservationCommand {
    Request(RequestReservation),
    ChangeStatus(ChangeReservationStatus),
    Cancel(CancelReservation),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequested {
    pub reservation_id: ReservationId,
    pub user_id: Option<AggregateId>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub party_size: u32,
    pub reserved_for: DateTime<Utc>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationStatusChanged {
    pub reservation_id: ReservationId,
    pub from: ReservationStatus,
    pub to: ReservationStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCancelled {
    pub reservation_id: ReservationId,
    pub from: ReservationStatus,
    pub by_customer: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEvent {
    Requested(ReservationRequested),
    StatusChanged(ReservationStatusChanged),
    Cancelled(ReservationCancelled),
}

impl Event for ReservationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReservationEvent::Requested(_) => "reservations.reservation.requested",
            ReservationEvent::StatusChanged(_) => "reservations.reservation.status_changed",
            ReservationEvent::Cancelled(_) => "reservations.reservation.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReservationEvent::Requested(e) => e.occurred_at,
            ReservationEvent::StatusChanged(e) => e.occurred_at,
            ReservationEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Reservation {
    type Command = ReservationCommand;
    type Event = ReservationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReservationEvent::Requested(e) => {
                self.id = e.reservation_id;
                self.user_id = e.user_id;
                self.email = e.email.clone();
                self.party_size = e.party_size;
                self.reserved_for = Some(e.reserved_for);
                self.status = ReservationStatus::Pending;
            }
            ReservationEvent::StatusChanged(e) => self.status = e.to,
            ReservationEvent::Cancelled(_) => self.status = ReservationStatus::Cancelled,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReservationCommand::Request(cmd) => self.handle_request(cmd),
            ReservationCommand::ChangeStatus(cmd) => {
                if self.reserved_for.is_none() {
                    return Err(DomainError::NotFound);
                }
                self.status.check_transition(cmd.status)?;
                if cmd.status == ReservationStatus::Cancelled {
                    return Ok(vec![ReservationEvent::Cancelled(ReservationCancelled {
                        reservation_id: self.id,
                        from: self.status,
                        by_customer: false,
                        occurred_at: cmd.occurred_at,
                    })]);
                }
                Ok(vec![ReservationEvent::StatusChanged(ReservationStatusChanged {
                    reservation_id: self.id,
                    from: self.status,
                    to: cmd.status,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ReservationCommand::Cancel(cmd) => {
                let reserved_for = self.reserved_for.ok_or(DomainError::NotFound)?;
                if cmd.by_customer && reserved_for <= cmd.occurred_at {
                    return Err(DomainError::invariant("the reservation time has already passed"));
                }
                self.status.check_transition(ReservationStatus::Cancelled)?;
                Ok(vec![ReservationEvent::Cancelled(ReservationCancelled {
                    reservation_id: self.id,
                    from: self.status,
                    by_customer: cmd.by_customer,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Reservation {
    fn handle_request(&self, cmd: &RequestReservation) -> Result<Vec<ReservationEvent>, DomainError> {
        if self.reserved_for.is_some() {
            return Err(DomainError::conflict("reservation already requested"));
        }
        let name = validate::require("name", &cmd.name)?;
        validate::max_len("name", &name, 120)?;
        let email = validate::email(&cmd.email)?;
        let phone = validate::phone(&cmd.phone)?;

        if !(MIN_PARTY..=MAX_PARTY).contains(&cmd.party_size) {
            return Err(DomainError::validation(format!(
                "party size must be between {MIN_PARTY} and {MAX_PARTY}"
            )));
        }
        if cmd.reserved_for <= cmd.occurred_at {
            return Err(DomainError::validation("reservation time must be in the future"));
        }
        if cmd.reserved_for > cmd.occurred_at + Duration::days(MAX_DAYS_AHEAD) {
            return Err(DomainError::validation(format!(
                "reservations can be made at most {MAX_DAYS_AHEAD} days ahead"
            )));
        }

        let notes = cmd
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if let Some(n) = &notes {
            validate::max_len("notes", n, 1000)?;
        }

        Ok(vec![ReservationEvent::Requested(ReservationRequested {
            reservation_id: cmd.reservation_id,
            user_id: cmd.user_id,
            name,
            email,
            phone,
            party_size: cmd.party_size,
            reserved_for: cmd.reserved_for,
            notes,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trattoria_events::execute;

    fn request(party_size: u32, ahead: Duration) -> RequestReservation {
        let now = Utc::now();
        RequestReservation {
            reservation_id: ReservationId::generate(),
            user_id: None,
            name: "Giulia".into(),
            email: "Giulia@Example.org".into(),
            phone: "+39 06 1234 5678".into(),
            party_size,
            reserved_for: now + ahead,
            notes: Some("window table".into()),
            occurred_at: now,
        }
    }

    fn requested() -> Reservation {
        let cmd = request(4, Duration::days(2));
        let mut r = Reservation::empty(cmd.reservation_id);
        execute(&mut r, &ReservationCommand::Request(cmd)).unwrap();
        r
    }

    fn change(r: &mut Reservation, status: ReservationStatus) -> Result<Vec<ReservationEvent>, DomainError> {
        let id = *r.id();
        execute(
            r,
            &ReservationCommand::ChangeStatus(ChangeReservationStatus {
                reservation_id: id,
                status,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[test]
    fn request_normalizes_contact() {
        let r = requested();
        assert_eq!(r.status(), ReservationStatus::Pending);
        assert_eq!(r.email(), "giulia@example.org");
        assert_eq!(r.party_size(), 4);
    }

    #[test]
    fn party_size_bounds() {
        for size in [0, 21] {
            let cmd = request(size, Duration::days(1));
            let err = Reservation::empty(cmd.reservation_id)
                .handle(&ReservationCommand::Request(cmd))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{size}");
        }
        let cmd = request(20, Duration::days(1));
        assert!(Reservation::empty(cmd.reservation_id).handle(&ReservationCommand::Request(cmd)).is_ok());
    }

    #[test]
    fn time_window() {
        for ahead in [Duration::minutes(-5), Duration::zero(), Duration::days(91)] {
            let cmd = request(2, ahead);
            assert!(Reservation::empty(cmd.reservation_id).handle(&ReservationCommand::Request(cmd)).is_err());
        }
        let cmd = request(2, Duration::days(90));
        assert!(Reservation::empty(cmd.reservation_id).handle(&ReservationCommand::Request(cmd)).is_ok());
    }

    #[test]
    fn confirm_then_complete() {
        let mut r = requested();
        change(&mut r, ReservationStatus::Confirmed).unwrap();
        change(&mut r, ReservationStatus::Completed).unwrap();
        assert!(change(&mut r, ReservationStatus::Cancelled).is_err());
    }

    #[test]
    fn customer_cancel() {
        let mut r = requested();
        let id = *r.id();
        let events = execute(
            &mut r,
            &ReservationCommand::Cancel(CancelReservation { reservation_id: id, by_customer: true, occurred_at: Utc::now() }),
        )
        .unwrap();
        assert!(matches!(&events[0], ReservationEvent::Cancelled(e) if e.by_customer));
        assert_eq!(r.status(), ReservationStatus::Cancelled);
    }

    #[test]
    fn unknown_reservation_is_not_found() {
        let mut r = Reservation::empty(ReservationId::generate());
        assert_eq!(change(&mut r, ReservationStatus::Confirmed).unwrap_err(), DomainError::NotFound);
    }
}
