use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::{self, service, EarningsSummary};
use crate::models::parcel::{DeliveryStatus, Parcel};
use crate::models::rider::{Rider, RiderStatus};
use crate::models::service_center::ServiceCenterKey;
use crate::models::user::Role;
use crate::session::Session;
use crate::state::AppState;

const MIN_RIDER_AGE: u8 = 18;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders", post(apply))
        .route("/riders/pending", get(list_pending))
        .route("/riders/active", get(list_active))
        .route("/riders/available", get(list_available))
        .route("/riders/profile", get(profile))
        .route("/riders/deliveries/pending", get(pending_deliveries))
        .route("/riders/deliveries/completed", get(completed_deliveries))
        .route("/riders/earnings", get(earnings))
        .route("/riders/:id", patch(review))
}

#[derive(Deserialize)]
pub struct ApplyRequest {
    pub name: String,
    pub contact: String,
    pub nid: String,
    pub age: u8,
    pub region: String,
    pub warehouse: String,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub status: RiderStatus,
}

#[derive(Deserialize)]
pub struct ActiveQuery {
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct AvailableQuery {
    pub region: String,
}

async fn apply(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<ApplyRequest>,
) -> Result<Json<Rider>, AppError> {
    for (field, value) in [
        ("name", &payload.name),
        ("contact", &payload.contact),
        ("nid", &payload.nid),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!("{field} cannot be empty")));
        }
    }

    if payload.age < MIN_RIDER_AGE {
        return Err(AppError::BadRequest(format!(
            "riders must be at least {MIN_RIDER_AGE}"
        )));
    }

    state
        .service_centers
        .require(&ServiceCenterKey::new(&payload.region, &payload.warehouse))?;

    let already_applied = state
        .riders
        .iter()
        .any(|entry| entry.email == session.email && entry.status != RiderStatus::Rejected);
    if already_applied {
        return Err(AppError::Conflict(format!(
            "{} already has a rider application",
            session.email
        )));
    }

    let now = Utc::now();
    let rider = Rider {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email: session.email.clone(),
        contact: payload.contact.trim().to_string(),
        nid: payload.nid.trim().to_string(),
        age: payload.age,
        region: payload.region,
        warehouse: payload.warehouse,
        status: RiderStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    state.riders.insert(rider.id, rider.clone());
    info!(rider_id = %rider.id, region = %rider.region, "rider application received");

    Ok(Json(rider))
}

fn riders_where<F>(state: &AppState, keep: F) -> Vec<Rider>
where
    F: Fn(&Rider) -> bool,
{
    let mut riders: Vec<Rider> = state
        .riders
        .iter()
        .filter(|entry| keep(entry.value()))
        .map(|entry| entry.value().clone())
        .collect();

    riders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    riders
}

async fn list_pending(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<Rider>>, AppError> {
    session.require_role(Role::Admin)?;
    Ok(Json(riders_where(&state, |rider| {
        rider.status == RiderStatus::Pending
    })))
}

async fn list_active(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<Vec<Rider>>, AppError> {
    session.require_role(Role::Admin)?;

    let search = query
        .search
        .map(|raw| raw.trim().to_lowercase())
        .filter(|raw| !raw.is_empty());

    Ok(Json(riders_where(&state, |rider| {
        rider.status == RiderStatus::Active
            && search.as_ref().is_none_or(|needle| {
                rider.name.to_lowercase().contains(needle.as_str())
                    || rider.email.contains(needle.as_str())
            })
    })))
}

async fn list_available(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<AvailableQuery>,
) -> Result<Json<Vec<Rider>>, AppError> {
    session.require_role(Role::Admin)?;

    if !state.service_centers.has_region(&query.region) {
        return Err(AppError::BadRequest(format!(
            "unknown region {}",
            query.region
        )));
    }

    Ok(Json(riders_where(&state, |rider| {
        rider.status == RiderStatus::Active && rider.region == query.region
    })))
}

/// The caller's own application; a rejected one is only returned when there
/// is nothing newer.
async fn profile(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Rider>, AppError> {
    state
        .riders
        .iter()
        .filter(|entry| entry.email == session.email)
        .map(|entry| entry.value().clone())
        .max_by_key(|rider| (rider.status != RiderStatus::Rejected, rider.created_at))
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!("{} has no rider application", session.email))
        })
}

async fn review(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<Rider>, AppError> {
    session.require_role(Role::Admin)?;
    let rider = service::review_rider(&state, id, payload.status)?;
    Ok(Json(rider))
}

fn deliveries_for(state: &AppState, email: &str, statuses: &[DeliveryStatus]) -> Vec<Parcel> {
    let mut parcels: Vec<Parcel> = state
        .parcels
        .iter()
        .filter(|entry| entry.is_assigned_to(email) && statuses.contains(&entry.delivery_status))
        .map(|entry| entry.value().clone())
        .collect();

    parcels.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    parcels
}

async fn pending_deliveries(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<Parcel>>, AppError> {
    session.require_role(Role::Rider)?;
    Ok(Json(deliveries_for(
        &state,
        &session.email,
        &[DeliveryStatus::RiderAssigned, DeliveryStatus::InTransit],
    )))
}

async fn completed_deliveries(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<Parcel>>, AppError> {
    session.require_role(Role::Rider)?;
    Ok(Json(deliveries_for(
        &state,
        &session.email,
        &[DeliveryStatus::Delivered],
    )))
}

async fn earnings(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<EarningsSummary>, AppError> {
    session.require_role(Role::Rider)?;

    let delivered = deliveries_for(&state, &session.email, &[DeliveryStatus::Delivered]);
    Ok(Json(lifecycle::summarize(&delivered, Utc::now())))
}
