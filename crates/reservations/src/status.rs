use serde::{Deserialize, Serialize};

use trattoria_core::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::NoShow => "no_show",
        }
    }

    pub fn normalize(input: &str) -> Result<Self, DomainError> {
        let key = input.trim().to_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "pending" | "new" | "requested" => Ok(ReservationStatus::Pending),
            "confirmed" | "accepted" => Ok(ReservationStatus::Confirmed),
            "completed" | "done" | "seated" => Ok(ReservationStatus::Completed),
            "cancelled" | "canceled" => Ok(ReservationStatus::Cancelled),
            "no_show" | "noshow" => Ok(ReservationStatus::NoShow),
            _ => Err(DomainError::validation(format!(
                "unknown reservation status '{}'",
                input.trim()
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Cancelled | ReservationStatus::NoShow
        )
    }

    pub fn check_transition(self, next: ReservationStatus) -> Result<(), DomainError> {
        use ReservationStatus::*;

        if self == next {
            return Err(DomainError::conflict(format!("reservation is already {}", self.as_str())));
        }
        let allowed = matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, NoShow) | (Confirmed, Cancelled)
        );
        if !allowed {
            return Err(DomainError::invariant(format!(
                "cannot move a reservation from {} to {}",
                self.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }
}

impl core::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases() {
        assert_eq!(ReservationStatus::normalize("Canceled").unwrap(), ReservationStatus::Cancelled);
        assert_eq!(ReservationStatus::normalize("no-show").unwrap(), ReservationStatus::NoShow);
        assert_eq!(ReservationStatus::normalize("seated").unwrap(), ReservationStatus::Completed);
        assert_eq!(ReservationStatus::normalize(" DONE ").unwrap(), ReservationStatus::Completed);
        assert_eq!(ReservationStatus::normalize("accepted").unwrap(), ReservationStatus::Confirmed);
        assert!(ReservationStatus::normalize("maybe").is_err());
    }

    #[test]
    fn transitions() {
        use ReservationStatus::*;
        assert!(Pending.check_transition(Confirmed).is_ok());
        assert!(Pending.check_transition(Completed).is_err());
        assert!(Confirmed.check_transition(NoShow).is_ok());
        assert!(Completed.check_transition(Cancelled).is_err());
        assert!(matches!(Confirmed.check_transition(Confirmed), Err(DomainError::Conflict(_))));
    }
}
