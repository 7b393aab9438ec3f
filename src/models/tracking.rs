use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub id: Uuid,
    pub tracking_id: String,
    pub status: String,
    pub actor: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TrackingEntry {
    pub fn new(
        tracking_id: &str,
        status: impl Into<String>,
        actor: &str,
        details: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracking_id: tracking_id.to_string(),
            status: status.into(),
            actor: actor.to_string(),
            details,
            timestamp: Utc::now(),
        }
    }
}
