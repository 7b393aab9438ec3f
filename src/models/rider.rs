use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiderStatus {
    #[serde(rename = "pending")]
    Pending,
    Active,
    Rejected,
    Inactive,
}

impl RiderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiderStatus::Pending => "pending",
            RiderStatus::Active => "Active",
            RiderStatus::Rejected => "Rejected",
            RiderStatus::Inactive => "Inactive",
        }
    }

    /// Admin review: pending riders are approved or rejected, active riders
    /// can be deactivated. Nothing else moves.
    pub fn can_become(&self, next: RiderStatus) -> bool {
        matches!(
            (self, next),
            (RiderStatus::Pending, RiderStatus::Active)
                | (RiderStatus::Pending, RiderStatus::Rejected)
                | (RiderStatus::Active, RiderStatus::Inactive)
        )
    }
}

impl fmt::Display for RiderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub contact: String,
    pub nid: String,
    pub age: u8,
    pub region: String,
    pub warehouse: String,
    pub status: RiderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::RiderStatus;

    #[test]
    fn review_transitions() {
        assert!(RiderStatus::Pending.can_become(RiderStatus::Active));
        assert!(RiderStatus::Pending.can_become(RiderStatus::Rejected));
        assert!(RiderStatus::Active.can_become(RiderStatus::Inactive));

        assert!(!RiderStatus::Rejected.can_become(RiderStatus::Active));
        assert!(!RiderStatus::Inactive.can_become(RiderStatus::Active));
        assert!(!RiderStatus::Active.can_become(RiderStatus::Pending));
    }
}
