use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub parcel_id: Uuid,
    pub email: String,
    pub amount: Decimal,
    pub transaction_id: String,
    pub paid_at: DateTime<Utc>,
}
