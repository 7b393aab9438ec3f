use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::lifecycle::earnings::compute_earning;
use crate::models::parcel::{AssignedRider, CashoutStatus, DeliveryStatus, Parcel};
use crate::models::rider::{Rider, RiderStatus};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LifecycleError {
    #[error("cannot move parcel from {from} to {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("rider is {0}; only Active riders can be assigned")]
    RiderNotActive(RiderStatus),

    #[error("rider region {rider_region} does not match sender region {parcel_region}")]
    RegionMismatch {
        rider_region: String,
        parcel_region: String,
    },

    #[error("parcel is {0}; cashout requires Delivered")]
    NotDelivered(DeliveryStatus),

    #[error("parcel already cashed out")]
    AlreadyCashedOut,
}

/// Processing -> Rider Assigned. The rider must be active and serve the
/// sender's region.
pub fn assign_rider(parcel: &mut Parcel, rider: &Rider) -> Result<(), LifecycleError> {
    if parcel.delivery_status != DeliveryStatus::Processing {
        return Err(LifecycleError::InvalidTransition {
            from: parcel.delivery_status,
            to: DeliveryStatus::RiderAssigned,
        });
    }

    if rider.status != RiderStatus::Active {
        return Err(LifecycleError::RiderNotActive(rider.status));
    }

    if rider.region != parcel.sender.region {
        return Err(LifecycleError::RegionMismatch {
            rider_region: rider.region.clone(),
            parcel_region: parcel.sender.region.clone(),
        });
    }

    parcel.delivery_status = DeliveryStatus::RiderAssigned;
    parcel.assigned_rider = Some(AssignedRider {
        email: rider.email.clone(),
        name: rider.name.clone(),
    });

    Ok(())
}

/// Rider Assigned -> In Transit -> Delivered, one step at a time.
pub fn advance_status(
    parcel: &mut Parcel,
    next: DeliveryStatus,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    let from = parcel.delivery_status;

    // Processing only leaves through assign_rider.
    let allowed = from != DeliveryStatus::Processing && from.successor() == Some(next);
    if !allowed {
        return Err(LifecycleError::InvalidTransition { from, to: next });
    }

    match next {
        DeliveryStatus::InTransit => {
            parcel.picked_at = Some(now);
        }
        DeliveryStatus::Delivered => {
            parcel.delivered_at = Some(now);
            parcel.earning = Some(compute_earning(parcel));
            parcel.cashout_status = Some(CashoutStatus::Pending);
        }
        DeliveryStatus::Processing | DeliveryStatus::RiderAssigned => {}
    }

    parcel.delivery_status = next;
    Ok(())
}

/// Settles the rider's earning and returns the amount paid out.
pub fn cash_out(parcel: &mut Parcel, now: DateTime<Utc>) -> Result<Decimal, LifecycleError> {
    if parcel.delivery_status != DeliveryStatus::Delivered {
        return Err(LifecycleError::NotDelivered(parcel.delivery_status));
    }

    if parcel.cashout_status == Some(CashoutStatus::CashedOut) {
        return Err(LifecycleError::AlreadyCashedOut);
    }

    let amount = match parcel.earning {
        Some(earning) => earning,
        None => compute_earning(parcel),
    };

    parcel.earning = Some(amount);
    parcel.cashout_status = Some(CashoutStatus::CashedOut);
    parcel.cashed_out_at = Some(now);

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{advance_status, assign_rider, cash_out, LifecycleError};
    use crate::lifecycle::testing::{parcel, rider};
    use crate::models::parcel::{CashoutStatus, DeliveryStatus, Parcel};
    use crate::models::rider::RiderStatus;

    fn at_status(status: DeliveryStatus) -> Parcel {
        let mut p = parcel(1000, ("Dhaka", "Dhaka"), ("Dhaka", "Dhaka"));
        let now = Utc::now();
        if status >= DeliveryStatus::RiderAssigned {
            assign_rider(&mut p, &rider("Dhaka", RiderStatus::Active)).unwrap();
        }
        if status >= DeliveryStatus::InTransit {
            advance_status(&mut p, DeliveryStatus::InTransit, now).unwrap();
        }
        if status >= DeliveryStatus::Delivered {
            advance_status(&mut p, DeliveryStatus::Delivered, now).unwrap();
        }
        p
    }

    #[test]
    fn assign_moves_processing_to_rider_assigned() {
        let mut p = at_status(DeliveryStatus::Processing);
        assign_rider(&mut p, &rider("Dhaka", RiderStatus::Active)).unwrap();

        assert_eq!(p.delivery_status, DeliveryStatus::RiderAssigned);
        let assigned = p.assigned_rider.unwrap();
        assert_eq!(assigned.email, "rafi@example.com");
        assert_eq!(assigned.name, "Rafi");
    }

    #[test]
    fn assign_rejects_riders_that_are_not_active() {
        for status in [
            RiderStatus::Pending,
            RiderStatus::Rejected,
            RiderStatus::Inactive,
        ] {
            let mut p = at_status(DeliveryStatus::Processing);
            let err = assign_rider(&mut p, &rider("Dhaka", status)).unwrap_err();

            assert_eq!(err, LifecycleError::RiderNotActive(status));
            assert_eq!(p.delivery_status, DeliveryStatus::Processing);
            assert!(p.assigned_rider.is_none());
        }
    }

    #[test]
    fn assign_rejects_rider_from_another_region() {
        let mut p = at_status(DeliveryStatus::Processing);
        let err = assign_rider(&mut p, &rider("Sylhet", RiderStatus::Active)).unwrap_err();

        assert!(matches!(err, LifecycleError::RegionMismatch { .. }));
        assert_eq!(p.delivery_status, DeliveryStatus::Processing);
    }

    #[test]
    fn assign_twice_is_an_invalid_transition() {
        let mut p = at_status(DeliveryStatus::RiderAssigned);
        let err = assign_rider(&mut p, &rider("Dhaka", RiderStatus::Active)).unwrap_err();

        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: DeliveryStatus::RiderAssigned,
                to: DeliveryStatus::RiderAssigned,
            }
        );
    }

    #[test]
    fn only_immediate_successors_are_accepted() {
        let now = Utc::now();
        for from in DeliveryStatus::ALL {
            for to in DeliveryStatus::ALL {
                let mut p = at_status(from);
                let result = advance_status(&mut p, to, now);

                let expected_ok = matches!(
                    (from, to),
                    (DeliveryStatus::RiderAssigned, DeliveryStatus::InTransit)
                        | (DeliveryStatus::InTransit, DeliveryStatus::Delivered)
                );

                if expected_ok {
                    assert!(result.is_ok(), "{from} -> {to} should be allowed");
                    assert_eq!(p.delivery_status, to);
                } else {
                    assert_eq!(
                        result,
                        Err(LifecycleError::InvalidTransition { from, to }),
                        "{from} -> {to} should be rejected"
                    );
                    assert_eq!(p.delivery_status, from);
                }
            }
        }
    }

    #[test]
    fn skipping_in_transit_is_rejected() {
        let mut p = at_status(DeliveryStatus::RiderAssigned);
        let err = advance_status(&mut p, DeliveryStatus::Delivered, Utc::now()).unwrap_err();

        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert_eq!(p.delivery_status, DeliveryStatus::RiderAssigned);
        assert!(p.delivered_at.is_none());
        assert!(p.earning.is_none());
    }

    #[test]
    fn transitions_stamp_pickup_and_delivery_times() {
        let mut p = at_status(DeliveryStatus::RiderAssigned);
        let picked = Utc::now();
        advance_status(&mut p, DeliveryStatus::InTransit, picked).unwrap();
        assert_eq!(p.picked_at, Some(picked));
        assert!(p.cashout_status.is_none());

        let delivered = Utc::now();
        advance_status(&mut p, DeliveryStatus::Delivered, delivered).unwrap();
        assert_eq!(p.delivered_at, Some(delivered));
        assert_eq!(p.earning, Some(Decimal::from(800)));
        assert_eq!(p.cashout_status, Some(CashoutStatus::Pending));
    }

    #[test]
    fn cash_out_settles_once() {
        let mut p = at_status(DeliveryStatus::Delivered);
        assert_eq!(p.cashout_status, Some(CashoutStatus::Pending));

        let amount = cash_out(&mut p, Utc::now()).unwrap();
        assert_eq!(amount, Decimal::from(800));
        assert_eq!(p.cashout_status, Some(CashoutStatus::CashedOut));
        let settled_at = p.cashed_out_at;

        let err = cash_out(&mut p, Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::AlreadyCashedOut);
        assert_eq!(p.cashout_status, Some(CashoutStatus::CashedOut));
        assert_eq!(p.cashed_out_at, settled_at);
    }

    #[test]
    fn cash_out_before_delivery_is_rejected() {
        let mut p = at_status(DeliveryStatus::InTransit);
        let err = cash_out(&mut p, Utc::now()).unwrap_err();

        assert_eq!(err, LifecycleError::NotDelivered(DeliveryStatus::InTransit));
        assert!(p.cashout_status.is_none());
    }

    #[test]
    fn cash_out_pays_the_earning_fixed_at_delivery() {
        let mut p = at_status(DeliveryStatus::Delivered);
        p.price = Decimal::from(5000);

        let amount = cash_out(&mut p, Utc::now()).unwrap();
        assert_eq!(amount, Decimal::from(800));
    }
}
