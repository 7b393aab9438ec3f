use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::parcel::{DeliveryStatus, Parcel};
use crate::models::payment::PaymentRecord;
use crate::models::rider::Rider;
use crate::models::service_center::ServiceCenters;
use crate::models::tracking::TrackingEntry;
use crate::models::user::{normalize_email, Role, User};
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub parcels: DashMap<Uuid, Parcel>,
    pub riders: DashMap<Uuid, Rider>,
    /// Keyed by normalized email.
    pub users: DashMap<String, User>,
    /// Append-only tracking history keyed by tracking code.
    pub trackings: DashMap<String, Vec<TrackingEntry>>,
    pub payments: DashMap<Uuid, PaymentRecord>,
    pub service_centers: ServiceCenters,
    pub tracking_events_tx: broadcast::Sender<TrackingEntry>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize, service_centers: ServiceCenters) -> Self {
        let (tracking_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            parcels: DashMap::new(),
            riders: DashMap::new(),
            users: DashMap::new(),
            trackings: DashMap::new(),
            payments: DashMap::new(),
            service_centers,
            tracking_events_tx,
            metrics: Metrics::new(),
        }
    }

    /// Unknown users are treated as plain customers.
    pub fn role_of(&self, email: &str) -> Role {
        self.users
            .get(&normalize_email(email))
            .map(|user| user.role)
            .unwrap_or_default()
    }

    pub fn set_role(&self, email: &str, role: Role) {
        let key = normalize_email(email);
        self.users
            .entry(key.clone())
            .and_modify(|user| user.role = role)
            .or_insert_with(|| User::new(&key, None, role));
    }

    /// Moves the user to `to` only while they still hold `from`. A missing
    /// user counts as holding the default role.
    pub fn replace_role(&self, email: &str, from: Role, to: Role) {
        let key = normalize_email(email);
        let entry = self.users.entry(key.clone());
        match entry {
            Entry::Occupied(mut occupied) => {
                let user = occupied.get_mut();
                if user.role == from {
                    user.role = to;
                }
            }
            Entry::Vacant(vacant) => {
                if from == Role::default() {
                    vacant.insert(User::new(&key, None, to));
                }
            }
        }
    }

    pub fn seed_admins(&self, emails: &[String]) {
        for email in emails {
            self.set_role(email, Role::Admin);
        }
    }

    pub fn delivery_status_counts(&self) -> Vec<(DeliveryStatus, usize)> {
        let mut counts: Vec<(DeliveryStatus, usize)> =
            DeliveryStatus::ALL.iter().map(|status| (*status, 0)).collect();

        for entry in self.parcels.iter() {
            if let Some(slot) = counts
                .iter_mut()
                .find(|(status, _)| *status == entry.delivery_status)
            {
                slot.1 += 1;
            }
        }

        counts
    }
}
