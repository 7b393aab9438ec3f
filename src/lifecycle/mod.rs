//! Delivery lifecycle: the parcel status machine, rider assignment, and the
//! rider earning split.
//!
//! `transitions` and `earnings` are pure functions over a [`Parcel`]. `service`
//! runs them against the shared store, one parcel at a time.
//!
//! [`Parcel`]: crate::models::parcel::Parcel

pub mod earnings;
pub mod service;
pub mod transitions;

pub use earnings::{compute_earning, earning_for, summarize, EarningsSummary, PeriodEarnings};
pub use transitions::{advance_status, assign_rider, cash_out, LifecycleError};

#[cfg(test)]
pub(crate) mod testing {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::models::parcel::{DeliveryStatus, Parcel, ParcelType, Party, PaymentStatus};
    use crate::models::rider::{Rider, RiderStatus};

    pub fn party(region: &str, district: &str) -> Party {
        Party {
            name: "Test Person".to_string(),
            region: region.to_string(),
            district: district.to_string(),
            address: "House 1, Road 2".to_string(),
            contact: "01700000000".to_string(),
        }
    }

    pub fn parcel(price: i64, sender: (&str, &str), receiver: (&str, &str)) -> Parcel {
        let now = Utc::now();
        Parcel {
            id: Uuid::new_v4(),
            tracking_id: "PCL-0000000000".to_string(),
            name: "Books".to_string(),
            parcel_type: ParcelType::NonDocument,
            weight_kg: 2.0,
            price: Decimal::from(price),
            created_by: "customer@example.com".to_string(),
            sender: party(sender.0, sender.1),
            receiver: party(receiver.0, receiver.1),
            pickup_instruction: None,
            delivery_instruction: None,
            status: PaymentStatus::Paid,
            delivery_status: DeliveryStatus::Processing,
            cashout_status: None,
            assigned_rider: None,
            picked_at: None,
            delivered_at: None,
            earning: None,
            cashed_out_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn rider(region: &str, status: RiderStatus) -> Rider {
        let now = Utc::now();
        Rider {
            id: Uuid::new_v4(),
            name: "Rafi".to_string(),
            email: "rafi@example.com".to_string(),
            contact: "01800000000".to_string(),
            nid: "1234567890".to_string(),
            age: 27,
            region: region.to_string(),
            warehouse: region.to_string(),
            status,
            created_at: now,
            updated_at: now,
        }
    }
}
