use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::parcel::{CashoutStatus, DeliveryStatus, Parcel};
use crate::models::service_center::ServiceCenterKey;

/// Rider share when pickup and drop-off share a service center.
const LOCAL_SHARE: Decimal = Decimal::from_parts(8, 0, 0, false, 1);
/// Rider share when the parcel is handed off between two centers.
const LONG_HAUL_SHARE: Decimal = Decimal::from_parts(3, 0, 0, false, 1);

pub fn earning_for(
    price: Decimal,
    sender_center: &ServiceCenterKey,
    receiver_center: &ServiceCenterKey,
) -> Decimal {
    let share = if sender_center == receiver_center {
        LOCAL_SHARE
    } else {
        LONG_HAUL_SHARE
    };

    price * share
}

pub fn compute_earning(parcel: &Parcel) -> Decimal {
    earning_for(
        parcel.price,
        &parcel.sender_center(),
        &parcel.receiver_center(),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodEarnings {
    pub today: Decimal,
    pub week: Decimal,
    pub month: Decimal,
    pub year: Decimal,
    pub overall: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EarningsSummary {
    pub deliveries: usize,
    pub total: Decimal,
    pub cashed_out: Decimal,
    pub pending: Decimal,
    pub by_period: PeriodEarnings,
}

/// Totals a rider's delivered parcels. Periods are calendar based in UTC and
/// weeks start on Monday.
pub fn summarize<'a, I>(parcels: I, now: DateTime<Utc>) -> EarningsSummary
where
    I: IntoIterator<Item = &'a Parcel>,
{
    let today = now.date_naive();
    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let month_start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);

    let mut summary = EarningsSummary::default();

    for parcel in parcels {
        if parcel.delivery_status != DeliveryStatus::Delivered {
            continue;
        }

        let earning = parcel.earning.unwrap_or_else(|| compute_earning(parcel));

        summary.deliveries += 1;
        summary.total += earning;
        if parcel.cashout_status == Some(CashoutStatus::CashedOut) {
            summary.cashed_out += earning;
        } else {
            summary.pending += earning;
        }

        if let Some(delivered_on) = parcel.delivered_at.map(|at| at.date_naive()) {
            if delivered_on >= today {
                summary.by_period.today += earning;
            }
            if delivered_on >= week_start {
                summary.by_period.week += earning;
            }
            if delivered_on >= month_start {
                summary.by_period.month += earning;
            }
            if delivered_on >= year_start {
                summary.by_period.year += earning;
            }
        }
        summary.by_period.overall += earning;
    }

    summary
}
