use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::transitions;
use crate::models::parcel::{DeliveryStatus, Parcel, PaymentStatus};
use crate::models::payment::PaymentRecord;
use crate::models::rider::{Rider, RiderStatus};
use crate::models::tracking::TrackingEntry;
use crate::models::user::{normalize_email, Role};
use crate::state::AppState;

/// Appends to the parcel's tracking history and fans the entry out to live
/// subscribers.
pub fn record_tracking(state: &AppState, entry: TrackingEntry) {
    state
        .trackings
        .entry(entry.tracking_id.clone())
        .or_default()
        .push(entry.clone());
    let _ = state.tracking_events_tx.send(entry);
}

/// Runs `apply` against a copy of the parcel while holding its entry lock and
/// stores the copy only when `apply` succeeds.
fn commit<F>(
    state: &AppState,
    parcel_id: Uuid,
    expected_version: Option<u64>,
    transition: &'static str,
    apply: F,
) -> Result<Parcel, AppError>
where
    F: FnOnce(&mut Parcel) -> Result<TrackingEntry, AppError>,
{
    let result = commit_locked(state, parcel_id, expected_version, apply);
    state.metrics.record_transition(transition, result.is_ok());

    if let Err(err) = &result {
        warn!(parcel_id = %parcel_id, transition, error = %err, "parcel write rejected");
    }

    result
}

fn commit_locked<F>(
    state: &AppState,
    parcel_id: Uuid,
    expected_version: Option<u64>,
    apply: F,
) -> Result<Parcel, AppError>
where
    F: FnOnce(&mut Parcel) -> Result<TrackingEntry, AppError>,
{
    let mut stored = state
        .parcels
        .get_mut(&parcel_id)
        .ok_or_else(|| AppError::NotFound(format!("parcel {} not found", parcel_id)))?;

    if let Some(expected) = expected_version {
        if stored.version != expected {
            return Err(AppError::Conflict(format!(
                "parcel {} is at version {}, expected {}",
                parcel_id, stored.version, expected
            )));
        }
    }

    let mut tentative = stored.clone();
    let entry = apply(&mut tentative)?;
    tentative.version += 1;
    tentative.updated_at = Utc::now();

    *stored = tentative;
    let committed = stored.clone();

    // Still under the parcel lock so history order matches commit order.
    record_tracking(state, entry);
    drop(stored);

    Ok(committed)
}

fn find_rider_by_email(state: &AppState, email: &str) -> Option<Rider> {
    let email = normalize_email(email);
    state
        .riders
        .iter()
        .find(|entry| entry.email == email && entry.status != RiderStatus::Rejected)
        .map(|entry| entry.value().clone())
}

fn require_assigned_rider(parcel: &Parcel, actor: &str) -> Result<(), AppError> {
    if parcel.is_assigned_to(actor) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "parcel {} is not assigned to {}",
            parcel.id, actor
        )))
    }
}

pub fn assign_rider(
    state: &AppState,
    parcel_id: Uuid,
    rider_email: &str,
    expected_version: Option<u64>,
    actor: &str,
) -> Result<Parcel, AppError> {
    let parcel = commit(state, parcel_id, expected_version, "assign", |parcel| {
        // Read under the parcel lock so a concurrent deactivation is seen.
        // Lock order is always parcels then riders.
        let rider = find_rider_by_email(state, rider_email)
            .ok_or_else(|| AppError::NotFound(format!("rider {} not found", rider_email)))?;

        transitions::assign_rider(parcel, &rider)?;

        Ok(TrackingEntry::new(
            &parcel.tracking_id,
            DeliveryStatus::RiderAssigned.as_str(),
            actor,
            Some(format!("Assigned to {} ({})", rider.name, rider.email)),
        ))
    })?;

    info!(
        parcel_id = %parcel.id,
        tracking_id = %parcel.tracking_id,
        rider = rider_email,
        "rider assigned"
    );

    Ok(parcel)
}

pub fn advance_status(
    state: &AppState,
    parcel_id: Uuid,
    next: DeliveryStatus,
    details: Option<String>,
    expected_version: Option<u64>,
    actor: &str,
) -> Result<Parcel, AppError> {
    let transition = match next {
        DeliveryStatus::InTransit => "pick_up",
        DeliveryStatus::Delivered => "deliver",
        DeliveryStatus::Processing | DeliveryStatus::RiderAssigned => "advance",
    };

    let parcel = commit(state, parcel_id, expected_version, transition, |parcel| {
        require_assigned_rider(parcel, actor)?;
        transitions::advance_status(parcel, next, Utc::now())?;

        Ok(TrackingEntry::new(
            &parcel.tracking_id,
            next.as_str(),
            actor,
            details,
        ))
    })?;

    info!(
        parcel_id = %parcel.id,
        tracking_id = %parcel.tracking_id,
        status = %parcel.delivery_status,
        "delivery status advanced"
    );

    Ok(parcel)
}

pub fn cash_out(
    state: &AppState,
    parcel_id: Uuid,
    actor: &str,
) -> Result<(Parcel, Decimal), AppError> {
    let mut amount = Decimal::ZERO;

    let parcel = commit(state, parcel_id, None, "cashout", |parcel| {
        require_assigned_rider(parcel, actor)?;
        amount = transitions::cash_out(parcel, Utc::now())?;

        Ok(TrackingEntry::new(
            &parcel.tracking_id,
            "Cashed Out",
            actor,
            Some(format!("Rider earning {amount} settled")),
        ))
    })?;

    state
        .metrics
        .rider_cashout_amount_total
        .inc_by(amount.to_f64().unwrap_or_default());

    info!(parcel_id = %parcel.id, rider = actor, amount = %amount, "rider cashed out");

    Ok((parcel, amount))
}

pub fn record_payment(
    state: &AppState,
    parcel_id: Uuid,
    amount: Decimal,
    transaction_id: &str,
    payer: &str,
) -> Result<PaymentRecord, AppError> {
    if transaction_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "transaction_id cannot be empty".to_string(),
        ));
    }

    let parcel = commit(state, parcel_id, None, "pay", |parcel| {
        if parcel.created_by != normalize_email(payer) {
            return Err(AppError::Forbidden(format!(
                "parcel {} does not belong to {}",
                parcel.id, payer
            )));
        }

        if parcel.status == PaymentStatus::Paid {
            return Err(AppError::Conflict(format!(
                "parcel {} is already paid",
                parcel.id
            )));
        }

        if amount != parcel.price {
            return Err(AppError::BadRequest(format!(
                "amount {} does not match parcel price {}",
                amount, parcel.price
            )));
        }

        parcel.status = PaymentStatus::Paid;

        Ok(TrackingEntry::new(
            &parcel.tracking_id,
            "Payment Completed",
            payer,
            Some(format!("Transaction {}", transaction_id.trim())),
        ))
    })?;

    let record = PaymentRecord {
        id: Uuid::new_v4(),
        parcel_id: parcel.id,
        email: parcel.created_by.clone(),
        amount,
        transaction_id: transaction_id.trim().to_string(),
        paid_at: Utc::now(),
    };

    state.payments.insert(record.id, record.clone());
    state.metrics.payments_total.inc();

    info!(
        parcel_id = %parcel.id,
        transaction_id = %record.transaction_id,
        amount = %amount,
        "payment recorded"
    );

    Ok(record)
}

fn has_parcels_in_flight(state: &AppState, email: &str) -> bool {
    state.parcels.iter().any(|entry| {
        entry.is_assigned_to(email)
            && matches!(
                entry.delivery_status,
                DeliveryStatus::RiderAssigned | DeliveryStatus::InTransit
            )
    })
}

fn set_rider_status(
    state: &AppState,
    rider_id: Uuid,
    from: RiderStatus,
    next: RiderStatus,
) -> Result<Rider, AppError> {
    let mut rider = state
        .riders
        .get_mut(&rider_id)
        .ok_or_else(|| AppError::NotFound(format!("rider {} not found", rider_id)))?;

    if rider.status != from || !from.can_become(next) {
        return Err(AppError::InvalidTransition(format!(
            "rider cannot move from {} to {}",
            rider.status, next
        )));
    }

    rider.status = next;
    rider.updated_at = Utc::now();
    Ok(rider.value().clone())
}

/// Admin review of a rider application. Approval promotes a plain user to
/// rider and deactivation demotes a rider back to user; admins keep their
/// role either way.
pub fn review_rider(
    state: &AppState,
    rider_id: Uuid,
    next: RiderStatus,
) -> Result<Rider, AppError> {
    let current = state
        .riders
        .get(&rider_id)
        .map(|entry| entry.status)
        .ok_or_else(|| AppError::NotFound(format!("rider {} not found", rider_id)))?;

    let reviewed = set_rider_status(state, rider_id, current, next)?;

    if next == RiderStatus::Inactive {
        // The rider is already inactive here, so no new assignment can land
        // after this scan. Anything found means the deactivation is undone.
        if has_parcels_in_flight(state, &reviewed.email) {
            if let Some(mut rider) = state.riders.get_mut(&rider_id) {
                if rider.status == RiderStatus::Inactive {
                    rider.status = current;
                }
            }
            return Err(AppError::PreconditionFailed(format!(
                "rider {} still has parcels in flight",
                reviewed.email
            )));
        }
    }

    match next {
        RiderStatus::Active => state.replace_role(&reviewed.email, Role::User, Role::Rider),
        RiderStatus::Inactive => state.replace_role(&reviewed.email, Role::Rider, Role::User),
        RiderStatus::Pending | RiderStatus::Rejected => {}
    }

    info!(rider_id = %rider_id, status = %next, "rider reviewed");

    Ok(reviewed)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{advance_status, assign_rider, cash_out, record_payment, review_rider};
    use crate::error::AppError;
    use crate::lifecycle::testing::{parcel, rider};
    use crate::models::parcel::{CashoutStatus, DeliveryStatus, PaymentStatus};
    use crate::models::rider::RiderStatus;
    use crate::models::service_center::ServiceCenters;
    use crate::models::user::Role;
    use crate::state::AppState;

    const ADMIN: &str = "admin@example.com";
    const RIDER: &str = "rafi@example.com";

    fn state_with_parcel() -> (AppState, uuid::Uuid) {
        let state = AppState::new(16, ServiceCenters::bundled().unwrap());
        let p = parcel(1000, ("Dhaka", "Dhaka"), ("Dhaka", "Dhaka"));
        let id = p.id;
        state.parcels.insert(id, p);

        let r = rider("Dhaka", RiderStatus::Active);
        state.riders.insert(r.id, r);
        (state, id)
    }

    #[test]
    fn rejected_write_leaves_stored_parcel_untouched() {
        let (state, id) = state_with_parcel();
        let before = state.parcels.get(&id).unwrap().value().clone();

        let err = advance_status(&state, id, DeliveryStatus::InTransit, None, None, RIDER)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let after = state.parcels.get(&id).unwrap().value().clone();
        assert_eq!(after.version, before.version);
        assert_eq!(after.delivery_status, DeliveryStatus::Processing);
        assert!(state.trackings.is_empty());
    }

    #[test]
    fn full_lifecycle_bumps_version_and_logs_each_step() {
        let (state, id) = state_with_parcel();

        assign_rider(&state, id, RIDER, Some(0), ADMIN).unwrap();
        advance_status(&state, id, DeliveryStatus::InTransit, None, Some(1), RIDER).unwrap();
        let delivered = advance_status(
            &state,
            id,
            DeliveryStatus::Delivered,
            Some("Left with receptionist".to_string()),
            Some(2),
            RIDER,
        )
        .unwrap();
        assert_eq!(delivered.version, 3);
        assert_eq!(delivered.earning, Some(Decimal::from(800)));

        let (settled, amount) = cash_out(&state, id, RIDER).unwrap();
        assert_eq!(amount, Decimal::from(800));
        assert_eq!(settled.cashout_status, Some(CashoutStatus::CashedOut));

        let history = state.trackings.get(&settled.tracking_id).unwrap().value().clone();
        let labels: Vec<&str> = history.iter().map(|entry| entry.status.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Rider Assigned", "In Transit", "Delivered", "Cashed Out"]
        );
        assert_eq!(history[0].actor, ADMIN);
        assert_eq!(history[2].details.as_deref(), Some("Left with receptionist"));
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let (state, id) = state_with_parcel();
        assign_rider(&state, id, RIDER, Some(0), ADMIN).unwrap();

        let err = assign_rider(&state, id, RIDER, Some(0), ADMIN).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn second_cash_out_is_rejected() {
        let (state, id) = state_with_parcel();
        assign_rider(&state, id, RIDER, None, ADMIN).unwrap();
        advance_status(&state, id, DeliveryStatus::InTransit, None, None, RIDER).unwrap();
        advance_status(&state, id, DeliveryStatus::Delivered, None, None, RIDER).unwrap();

        cash_out(&state, id, RIDER).unwrap();
        let version = state.parcels.get(&id).unwrap().version;

        let err = cash_out(&state, id, RIDER).unwrap_err();
        assert!(matches!(err, AppError::AlreadyCashedOut));
        assert_eq!(state.parcels.get(&id).unwrap().version, version);
    }

    #[test]
    fn payment_must_match_price_and_happens_once() {
        let (state, id) = state_with_parcel();
        state.parcels.get_mut(&id).unwrap().status = PaymentStatus::Unpaid;
        let owner = "customer@example.com";

        let err = record_payment(&state, id, Decimal::from(999), "txn_1", owner).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let record = record_payment(&state, id, Decimal::from(1000), "txn_1", owner).unwrap();
        assert_eq!(record.parcel_id, id);
        assert_eq!(state.parcels.get(&id).unwrap().status, PaymentStatus::Paid);

        let err = record_payment(&state, id, Decimal::from(1000), "txn_2", owner).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(state.payments.len(), 1);
    }

    #[test]
    fn rider_review_drives_user_role() {
        let state = AppState::new(16, ServiceCenters::bundled().unwrap());
        let r = rider("Dhaka", RiderStatus::Pending);
        let id = r.id;
        state.riders.insert(id, r);

        review_rider(&state, id, RiderStatus::Active).unwrap();
        assert_eq!(state.role_of(RIDER), Role::Rider);

        review_rider(&state, id, RiderStatus::Inactive).unwrap();
        assert_eq!(state.role_of(RIDER), Role::User);

        let err = review_rider(&state, id, RiderStatus::Active).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn approving_an_admin_keeps_admin_role() {
        let state = AppState::new(16, ServiceCenters::bundled().unwrap());
        state.set_role(RIDER, Role::Admin);
        let r = rider("Dhaka", RiderStatus::Pending);
        let id = r.id;
        state.riders.insert(id, r);

        review_rider(&state, id, RiderStatus::Active).unwrap();
        assert_eq!(state.role_of(RIDER), Role::Admin);

        review_rider(&state, id, RiderStatus::Inactive).unwrap();
        assert_eq!(state.role_of(RIDER), Role::Admin);
    }

    #[test]
    fn deactivation_is_refused_while_parcels_are_in_flight() {
        let (state, id) = state_with_parcel();
        state.set_role(RIDER, Role::Rider);
        let rider_id = state.riders.iter().next().unwrap().id;
        assign_rider(&state, id, RIDER, None, ADMIN).unwrap();
        advance_status(&state, id, DeliveryStatus::InTransit, None, None, RIDER).unwrap();

        let err = review_rider(&state, rider_id, RiderStatus::Inactive).unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
        assert_eq!(state.riders.get(&rider_id).unwrap().status, RiderStatus::Active);
        assert_eq!(state.role_of(RIDER), Role::Rider);

        advance_status(&state, id, DeliveryStatus::Delivered, None, None, RIDER).unwrap();
        review_rider(&state, rider_id, RiderStatus::Inactive).unwrap();
        assert_eq!(state.role_of(RIDER), Role::User);

        // Earnings made before deactivation are still paid out.
        let (_, amount) = cash_out(&state, id, RIDER).unwrap();
        assert_eq!(amount, Decimal::from(800));
    }

    #[test]
    fn assignment_sees_rider_status_at_commit_time() {
        let (state, id) = state_with_parcel();
        let rider_id = state.riders.iter().next().unwrap().id;
        review_rider(&state, rider_id, RiderStatus::Inactive).unwrap();

        let err = assign_rider(&state, id, RIDER, None, ADMIN).unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
        assert_eq!(
            state.parcels.get(&id).unwrap().delivery_status,
            DeliveryStatus::Processing
        );
    }
}
