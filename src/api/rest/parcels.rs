use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::service;
use crate::models::parcel::{
    new_tracking_id, DeliveryStatus, Parcel, ParcelType, Party, PaymentStatus,
};
use crate::models::tracking::TrackingEntry;
use crate::models::user::{normalize_email, Role};
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/parcels", post(create_parcel).get(list_parcels))
        .route("/parcels/delivery/status-count", get(status_count))
        .route("/parcels/:id", get(get_parcel).delete(delete_parcel))
        .route("/parcels/:id/assign", patch(assign_rider))
        .route("/parcels/:id/status", patch(update_status))
        .route("/parcels/:id/cashout", patch(cash_out))
}

#[derive(Deserialize)]
pub struct CreateParcelRequest {
    pub name: String,
    pub parcel_type: ParcelType,
    pub weight_kg: f64,
    pub price: Decimal,
    pub sender: Party,
    pub receiver: Party,
    #[serde(default)]
    pub pickup_instruction: Option<String>,
    #[serde(default)]
    pub delivery_instruction: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParcelsQuery {
    pub email: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub delivery_status: Option<DeliveryStatus>,
}

#[derive(Deserialize)]
pub struct AssignRiderRequest {
    pub rider_email: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Serialize)]
pub struct CashoutResponse {
    pub parcel: Parcel,
    pub amount: Decimal,
}

#[derive(Serialize)]
pub struct StatusCount {
    pub status: DeliveryStatus,
    pub count: usize,
}

fn validate_party(role: &str, party: &Party) -> Result<(), AppError> {
    let fields = [
        ("name", &party.name),
        ("region", &party.region),
        ("district", &party.district),
        ("address", &party.address),
        ("contact", &party.contact),
    ];

    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!(
                "{role} {field} cannot be empty"
            )));
        }
    }

    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

async fn create_parcel(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<CreateParcelRequest>,
) -> Result<Json<Parcel>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if !payload.weight_kg.is_finite() || payload.weight_kg <= 0.0 {
        return Err(AppError::BadRequest("weight_kg must be > 0".to_string()));
    }

    if payload.price <= Decimal::ZERO {
        return Err(AppError::BadRequest("price must be > 0".to_string()));
    }

    validate_party("sender", &payload.sender)?;
    validate_party("receiver", &payload.receiver)?;
    state
        .service_centers
        .require(&payload.sender.service_center())?;
    state
        .service_centers
        .require(&payload.receiver.service_center())?;

    let now = Utc::now();
    let parcel = Parcel {
        id: Uuid::new_v4(),
        tracking_id: new_tracking_id(),
        name: payload.name.trim().to_string(),
        parcel_type: payload.parcel_type,
        weight_kg: payload.weight_kg,
        price: payload.price,
        created_by: session.email.clone(),
        sender: payload.sender,
        receiver: payload.receiver,
        pickup_instruction: non_blank(payload.pickup_instruction),
        delivery_instruction: non_blank(payload.delivery_instruction),
        status: PaymentStatus::Unpaid,
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
    };

    state.parcels.insert(parcel.id, parcel.clone());
    service::record_tracking(
        &state,
        TrackingEntry::new(
            &parcel.tracking_id,
            "Parcel Created",
            &session.email,
            Some(format!(
                "{} -> {}",
                parcel.sender_center(),
                parcel.receiver_center()
            )),
        ),
    );

    info!(parcel_id = %parcel.id, tracking_id = %parcel.tracking_id, "parcel booked");

    Ok(Json(parcel))
}

async fn list_parcels(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<ListParcelsQuery>,
) -> Result<Json<Vec<Parcel>>, AppError> {
    // Customers only ever see their own bookings.
    let owner = match session.role {
        Role::Admin => query.email.as_deref().map(normalize_email),
        Role::User | Role::Rider => Some(session.email.clone()),
    };

    let mut parcels: Vec<Parcel> = state
        .parcels
        .iter()
        .filter(|entry| owner.as_ref().is_none_or(|email| &entry.created_by == email))
        .filter(|entry| query.payment_status.is_none_or(|status| entry.status == status))
        .filter(|entry| {
            query
                .delivery_status
                .is_none_or(|status| entry.delivery_status == status)
        })
        .map(|entry| entry.value().clone())
        .collect();

    parcels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(parcels))
}

async fn get_parcel(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Parcel>, AppError> {
    let parcel = state
        .parcels
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("parcel {} not found", id)))?;

    let visible = session.role == Role::Admin
        || parcel.created_by == session.email
        || parcel.is_assigned_to(&session.email);

    if !visible {
        return Err(AppError::Forbidden(format!(
            "parcel {} is not visible to {}",
            id, session.email
        )));
    }

    Ok(Json(parcel))
}

async fn delete_parcel(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let parcel = state
        .parcels
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("parcel {} not found", id)))?;

    if parcel.created_by != session.email {
        return Err(AppError::Forbidden(format!(
            "parcel {} does not belong to {}",
            id, session.email
        )));
    }

    // Only unpaid bookings nobody has picked up yet can be withdrawn.
    state
        .parcels
        .remove_if(&id, |_, stored| {
            stored.status == PaymentStatus::Unpaid
                && stored.delivery_status == DeliveryStatus::Processing
        })
        .ok_or_else(|| {
            AppError::PreconditionFailed(format!(
                "parcel {} is paid or already in delivery and cannot be deleted",
                id
            ))
        })?;

    info!(parcel_id = %id, tracking_id = %parcel.tracking_id, "parcel deleted");

    Ok(Json(json!({ "deleted": true, "id": id })))
}

async fn assign_rider(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRiderRequest>,
) -> Result<Json<Parcel>, AppError> {
    session.require_role(Role::Admin)?;

    let parcel = service::assign_rider(
        &state,
        id,
        &payload.rider_email,
        payload.expected_version,
        &session.email,
    )?;

    Ok(Json(parcel))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Parcel>, AppError> {
    session.require_role(Role::Rider)?;

    let parcel = service::advance_status(
        &state,
        id,
        payload.status,
        non_blank(payload.details),
        payload.expected_version,
        &session.email,
    )?;

    Ok(Json(parcel))
}

async fn cash_out(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<CashoutResponse>, AppError> {
    // Authorized by assignment, so deactivated riders can still settle
    // deliveries they completed.
    let (parcel, amount) = service::cash_out(&state, id, &session.email)?;
    Ok(Json(CashoutResponse { parcel, amount }))
}

async fn status_count(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<StatusCount>>, AppError> {
    session.require_role(Role::Admin)?;

    let counts = state
        .delivery_status_counts()
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();

    Ok(Json(counts))
}
