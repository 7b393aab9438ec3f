use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::service_center::ServiceCenterKey;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParcelType {
    #[serde(rename = "document")]
    Document,
    #[serde(rename = "non-document")]
    NonDocument,
}

/// Payment state, written only by the payment flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

/// Fulfillment state. Variants are declared in lifecycle order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeliveryStatus {
    Processing,
    #[serde(rename = "Rider Assigned")]
    RiderAssigned,
    #[serde(rename = "In Transit")]
    InTransit,
    Delivered,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 4] = [
        DeliveryStatus::Processing,
        DeliveryStatus::RiderAssigned,
        DeliveryStatus::InTransit,
        DeliveryStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Processing => "Processing",
            DeliveryStatus::RiderAssigned => "Rider Assigned",
            DeliveryStatus::InTransit => "In Transit",
            DeliveryStatus::Delivered => "Delivered",
        }
    }

    pub fn successor(&self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::Processing => Some(DeliveryStatus::RiderAssigned),
            DeliveryStatus::RiderAssigned => Some(DeliveryStatus::InTransit),
            DeliveryStatus::InTransit => Some(DeliveryStatus::Delivered),
            DeliveryStatus::Delivered => None,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CashoutStatus {
    Pending,
    CashedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub region: String,
    pub district: String,
    pub address: String,
    pub contact: String,
}

impl Party {
    pub fn service_center(&self) -> ServiceCenterKey {
        ServiceCenterKey::new(self.region.clone(), self.district.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignedRider {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub id: Uuid,
    pub tracking_id: String,
    pub name: String,
    pub parcel_type: ParcelType,
    pub weight_kg: f64,
    pub price: Decimal,
    pub created_by: String,
    pub sender: Party,
    pub receiver: Party,
    pub pickup_instruction: Option<String>,
    pub delivery_instruction: Option<String>,
    pub status: PaymentStatus,
    pub delivery_status: DeliveryStatus,
    /// Stays `None` until the parcel is delivered.
    pub cashout_status: Option<CashoutStatus>,
    pub assigned_rider: Option<AssignedRider>,
    pub picked_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub earning: Option<Decimal>,
    pub cashed_out_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Parcel {
    pub fn sender_center(&self) -> ServiceCenterKey {
        self.sender.service_center()
    }

    pub fn receiver_center(&self) -> ServiceCenterKey {
        self.receiver.service_center()
    }

    pub fn is_assigned_to(&self, email: &str) -> bool {
        self.assigned_rider
            .as_ref()
            .is_some_and(|rider| rider.email.eq_ignore_ascii_case(email))
    }
}

pub fn new_tracking_id() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("PCL-{}", &raw[..10])
}

#[cfg(test)]
mod tests {
    use super::{new_tracking_id, DeliveryStatus};

    #[test]
    fn successor_walks_the_lifecycle_in_order() {
        let mut status = DeliveryStatus::Processing;
        let mut seen = vec![status];
        while let Some(next) = status.successor() {
            assert!(next > status);
            seen.push(next);
            status = next;
        }
        assert_eq!(seen, DeliveryStatus::ALL.to_vec());
    }

    #[test]
    fn delivery_status_uses_display_labels_on_the_wire() {
        let json = serde_json::to_string(&DeliveryStatus::RiderAssigned).unwrap();
        assert_eq!(json, "\"Rider Assigned\"");
        let parsed: DeliveryStatus = serde_json::from_str("\"In Transit\"").unwrap();
        assert_eq!(parsed, DeliveryStatus::InTransit);
    }

    #[test]
    fn tracking_ids_are_prefixed_and_distinct() {
        let a = new_tracking_id();
        let b = new_tracking_id();
        assert!(a.starts_with("PCL-"));
        assert_eq!(a.len(), 14);
        assert_ne!(a, b);
    }
}
