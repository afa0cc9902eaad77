//! Table reservations (event-sourced).

pub mod reservation;
pub mod status;

pub use reservation::{
    CancelReservation, ChangeReservationStatus, RequestReservation, Reservation,
    ReservationCancelled, ReservationCommand, ReservationEvent, ReservationId,
    ReservationRequested, ReservationStatusChanged,
};
pub use status::ReservationStatus;
