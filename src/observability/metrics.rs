use prometheus::{
    Counter, Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::models::parcel::DeliveryStatus;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub parcels_by_delivery_status: IntGaugeVec,
    pub payments_total: IntCounter,
    pub rider_cashout_amount_total: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "lifecycle_transitions_total",
                "Parcel lifecycle writes by transition and outcome",
            ),
            &["transition", "outcome"],
        )
        .expect("valid lifecycle_transitions_total metric");

        let parcels_by_delivery_status = IntGaugeVec::new(
            Opts::new(
                "parcels_by_delivery_status",
                "Current number of parcels per delivery status",
            ),
            &["status"],
        )
        .expect("valid parcels_by_delivery_status metric");

        let payments_total = IntCounter::new("payments_total", "Recorded parcel payments")
            .expect("valid payments_total metric");

        let rider_cashout_amount_total = Counter::new(
            "rider_cashout_amount_total",
            "Sum of rider earnings settled through cashout",
        )
        .expect("valid rider_cashout_amount_total metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register lifecycle_transitions_total");
        registry
            .register(Box::new(parcels_by_delivery_status.clone()))
            .expect("register parcels_by_delivery_status");
        registry
            .register(Box::new(payments_total.clone()))
            .expect("register payments_total");
        registry
            .register(Box::new(rider_cashout_amount_total.clone()))
            .expect("register rider_cashout_amount_total");

        Self {
            registry,
            transitions_total,
            parcels_by_delivery_status,
            payments_total,
            rider_cashout_amount_total,
        }
    }

    pub fn record_transition(&self, transition: &str, succeeded: bool) {
        let outcome = if succeeded { "success" } else { "error" };
        self.transitions_total
            .with_label_values(&[transition, outcome])
            .inc();
    }

    pub fn set_status_counts(&self, counts: &[(DeliveryStatus, usize)]) {
        for (status, count) in counts {
            self.parcels_by_delivery_status
                .with_label_values(&[status.as_str()])
                .set(*count as i64);
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
