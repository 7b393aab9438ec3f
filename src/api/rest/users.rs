use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{normalize_email, Role, User};
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register))
        .route("/users/search", get(search))
        .route("/users/:key/role", get(get_role).patch(update_role))
}

#[derive(Deserialize, Default)]
pub struct RegisterRequest {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub email: String,
}

#[derive(Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Serialize)]
pub struct RoleResponse {
    pub email: String,
    pub role: Role,
}

/// Called after every sign-in; creates the user on first sight.
async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    payload: Option<Json<RegisterRequest>>,
) -> Json<User> {
    let name = payload
        .and_then(|Json(body)| body.name)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty());

    let user = state
        .users
        .entry(session.email.clone())
        .and_modify(|user| {
            user.last_seen_at = Utc::now();
            if name.is_some() {
                user.name = name.clone();
            }
        })
        .or_insert_with(|| User::new(&session.email, name.clone(), Role::User))
        .value()
        .clone();

    Json(user)
}

async fn search(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    session.require_role(Role::Admin)?;

    let needle = normalize_email(&query.email);
    if needle.is_empty() {
        return Err(AppError::BadRequest("email cannot be empty".to_string()));
    }

    let mut users: Vec<User> = state
        .users
        .iter()
        .filter(|entry| entry.email.contains(&needle))
        .map(|entry| entry.value().clone())
        .collect();

    users.sort_by(|a, b| a.email.cmp(&b.email));
    Ok(Json(users))
}

async fn get_role(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Json<RoleResponse> {
    let email = normalize_email(&email);
    let role = state.role_of(&email);
    Json(RoleResponse { email, role })
}

async fn update_role(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<User>, AppError> {
    session.require_role(Role::Admin)?;

    if payload.role == Role::Rider {
        return Err(AppError::BadRequest(
            "rider role is granted by approving a rider application".to_string(),
        ));
    }

    let email = state
        .users
        .iter()
        .find(|entry| entry.id == id)
        .map(|entry| entry.key().clone())
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))?;

    if session.is(&email) {
        return Err(AppError::BadRequest(
            "admins cannot change their own role".to_string(),
        ));
    }

    let mut user = state
        .users
        .get_mut(&email)
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))?;
    user.role = payload.role;

    info!(user_id = %id, role = ?payload.role, "user role updated");

    Ok(Json(user.value().clone()))
}
