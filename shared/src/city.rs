use serde::{Deserialize, Serialize};

use crate::geo::LatLng;

/// A city pinned on the dashboard map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(alias = "city")]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(alias = "suspects")]
    pub count: u32,
}

impl City {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, count: u32) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            count,
        }
    }

    pub const fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    /// Sidebar label, e.g. `Delhi: 500`.
    pub fn label(&self) -> String {
        format!("{}: {}", self.name, self.count)
    }
}
