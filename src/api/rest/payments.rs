use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::service;
use crate::models::payment::PaymentRecord;
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/payments", post(record_payment).get(list_payments))
}

/// Result of a successful charge as reported by the card processor.
#[derive(Deserialize)]
pub struct RecordPaymentRequest {
    pub parcel_id: Uuid,
    pub amount: Decimal,
    pub transaction_id: String,
}

async fn record_payment(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<Json<PaymentRecord>, AppError> {
    let record = service::record_payment(
        &state,
        payload.parcel_id,
        payload.amount,
        &payload.transaction_id,
        &session.email,
    )?;

    Ok(Json(record))
}

async fn list_payments(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Json<Vec<PaymentRecord>> {
    let mut payments: Vec<PaymentRecord> = state
        .payments
        .iter()
        .filter(|entry| entry.email == session.email)
        .map(|entry| entry.value().clone())
        .collect();

    payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
    Json(payments)
}
