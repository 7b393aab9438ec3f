use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::models::parcel::{DeliveryStatus, PaymentStatus};
use crate::models::service_center::ServiceCenter;
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard/user/summary", get(user_summary))
        .route("/service-centers", get(service_centers))
}

#[derive(Debug, Default, Serialize)]
pub struct UserSummary {
    pub total_parcels: usize,
    pub paid_parcels: usize,
    pub delivered_parcels: usize,
    pub pending_deliveries: usize,
}

async fn user_summary(State(state): State<Arc<AppState>>, session: Session) -> Json<UserSummary> {
    let mut summary = UserSummary::default();

    for entry in state.parcels.iter() {
        if entry.created_by != session.email {
            continue;
        }

        summary.total_parcels += 1;
        if entry.status == PaymentStatus::Paid {
            summary.paid_parcels += 1;
        }
        if entry.delivery_status == DeliveryStatus::Delivered {
            summary.delivered_parcels += 1;
        } else {
            summary.pending_deliveries += 1;
        }
    }

    Json(summary)
}

async fn service_centers(State(state): State<Arc<AppState>>) -> Json<Vec<ServiceCenter>> {
    Json(state.service_centers.all().to_vec())
}
