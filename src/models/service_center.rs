use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const BUNDLED_SERVICE_CENTERS: &str = include_str!("../../data/service_centers.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCenter {
    pub region: String,
    pub district: String,
    pub city: String,
    #[serde(default)]
    pub covered_area: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A service center is identified by its region and district.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceCenterKey {
    pub region: String,
    pub district: String,
}

impl ServiceCenterKey {
    pub fn new(region: impl Into<String>, district: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            district: district.into(),
        }
    }
}

impl fmt::Display for ServiceCenterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.district)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceCenters {
    centers: Vec<ServiceCenter>,
}

impl ServiceCenters {
    pub fn bundled() -> Result<Self, AppError> {
        Self::from_json(BUNDLED_SERVICE_CENTERS)
    }

    pub fn from_path(path: &str) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| AppError::Internal(format!("failed to read {path}: {err}")))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let centers: Vec<ServiceCenter> = serde_json::from_str(raw)
            .map_err(|err| AppError::Internal(format!("invalid service center data: {err}")))?;

        if centers.is_empty() {
            return Err(AppError::Internal(
                "service center data contains no centers".to_string(),
            ));
        }

        Ok(Self { centers })
    }

    pub fn all(&self) -> &[ServiceCenter] {
        &self.centers
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn contains(&self, key: &ServiceCenterKey) -> bool {
        self.centers
            .iter()
            .any(|center| center.region == key.region && center.district == key.district)
    }

    pub fn has_region(&self, region: &str) -> bool {
        self.centers.iter().any(|center| center.region == region)
    }

    pub fn require(&self, key: &ServiceCenterKey) -> Result<(), AppError> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "no registered service center for {key}"
            )))
        }
    }
}
