use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::city::City;
use crate::geo::{LatLng, MapView};
use crate::registry::{CityRegistry, RegistryError, builtin_cities};

pub const DEFAULT_TITLE: &str = "Suspects by City";
pub const DEFAULT_CENTER: LatLng = LatLng::new(20.5937, 78.9629);
pub const DEFAULT_ZOOM: f64 = 5.0;
pub const FOCUS_ZOOM: f64 = 10.0;
pub const MIN_ZOOM: f64 = 3.0;
pub const MAX_ZOOM: f64 = 18.0;
pub const RESET_CLEAR_DELAY_MS: u32 = 100;
pub const MAX_RESET_CLEAR_DELAY_MS: u32 = 10_000;
/// Upper bound accepted for any configured zoom level.
pub const ZOOM_CEILING: f64 = 22.0;

pub const OSM_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const OSM_ATTRIBUTION: &str = "\u{a9} OpenStreetMap contributors";
pub const OSM_MAX_NATIVE_ZOOM: u8 = 19;

pub const MARKER_ICON_URL: &str = "https://cdn-icons-png.flaticon.com/512/684/684908.png";
pub const MARKER_ICON_SIZE: [f64; 2] = [25.0, 41.0];
pub const MARKER_ICON_ANCHOR: [f64; 2] = [12.0, 41.0];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed dashboard config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid zoom range {min}..={max}")]
    InvalidZoomRange { min: f64, max: f64 },

    #[error("{field} zoom {value} is outside {min}..={max}")]
    ZoomOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("default view center ({lat}, {lng}) is not a valid coordinate")]
    InvalidDefaultCenter { lat: f64, lng: f64 },

    #[error("reset clear delay {0}ms is outside 1..=10000")]
    InvalidResetDelay(u32),

    #[error("tile url template uses {{s}} but no subdomains are configured")]
    MissingSubdomains,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSource {
    pub url_template: String,
    pub subdomains: Vec<String>,
    pub attribution: String,
    pub max_native_zoom: u8,
}

impl Default for TileSource {
    fn default() -> Self {
        Self {
            url_template: OSM_TILE_URL.to_string(),
            subdomains: vec!["a".into(), "b".into(), "c".into()],
            attribution: OSM_ATTRIBUTION.to_string(),
            max_native_zoom: OSM_MAX_NATIVE_ZOOM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    pub icon_url: String,
    pub icon_size: [f64; 2],
    /// Pixel inside the icon that sits on the city's coordinate.
    pub icon_anchor: [f64; 2],
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            icon_url: MARKER_ICON_URL.to_string(),
            icon_size: MARKER_ICON_SIZE,
            icon_anchor: MARKER_ICON_ANCHOR,
        }
    }
}

/// Everything the dashboard reads at startup. Every field is optional in the
/// JSON document; missing fields take the built-in values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    pub default_view: MapView,
    pub focus_zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub reset_clear_delay_ms: u32,
    pub tiles: TileSource,
    pub marker: MarkerStyle,
    pub cities: Vec<City>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            default_view: MapView::new(DEFAULT_CENTER, DEFAULT_ZOOM),
            focus_zoom: FOCUS_ZOOM,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            reset_clear_delay_ms: RESET_CLEAR_DELAY_MS,
            tiles: TileSource::default(),
            marker: MarkerStyle::default(),
            cities: builtin_cities(),
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a config document, returning the config together
    /// with the registry built from its cities.
    pub fn from_json(json: &str) -> Result<(Self, CityRegistry), ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        let registry = config.validate()?;
        Ok((config, registry))
    }

    pub fn validate(&self) -> Result<CityRegistry, ConfigError> {
        let (min, max) = (self.min_zoom, self.max_zoom);
        if !min.is_finite() || !max.is_finite() || min < 0.0 || max > ZOOM_CEILING || min > max {
            return Err(ConfigError::InvalidZoomRange { min, max });
        }
        for (field, value) in [
            ("default", self.default_view.zoom),
            ("focus", self.focus_zoom),
        ] {
            if !(min..=max).contains(&value) {
                return Err(ConfigError::ZoomOutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
        let center = self.default_view.center;
        if !center.is_valid() {
            return Err(ConfigError::InvalidDefaultCenter {
                lat: center.lat,
                lng: center.lng,
            });
        }
        if self.reset_clear_delay_ms == 0 || self.reset_clear_delay_ms > MAX_RESET_CLEAR_DELAY_MS {
            return Err(ConfigError::InvalidResetDelay(self.reset_clear_delay_ms));
        }
        if self.tiles.url_template.contains("{s}") && self.tiles.subdomains.is_empty() {
            return Err(ConfigError::MissingSubdomains);
        }
        Ok(CityRegistry::new(self.cities.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let registry = DashboardConfig::default().validate().unwrap();
        assert_eq!(registry, CityRegistry::builtin());
    }

    #[test]
    fn empty_document_takes_defaults() {
        let (config, registry) = DashboardConfig::from_json("{}").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn partial_document_overrides_only_given_fields() {
        let (config, registry) = DashboardConfig::from_json(
            r#"{
                "focus_zoom": 12,
                "tiles": {
                    "url_template": "https://tile.example.org/{z}/{x}/{y}.png",
                    "subdomains": []
                },
                "cities": [{"city":"Delhi","latitude":28.6139,"longitude":77.209,"suspects":500}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.focus_zoom, 12.0);
        assert_eq!(config.default_view.zoom, DEFAULT_ZOOM);
        assert!(config.tiles.subdomains.is_empty());
        assert_eq!(config.tiles.url_template, "https://tile.example.org/{z}/{x}/{y}.png");
        assert_eq!(config.marker, MarkerStyle::default());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_inverted_zoom_range() {
        let err = DashboardConfig::from_json(r#"{"min_zoom": 12, "max_zoom": 4}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidZoomRange { .. }));
    }

    #[test]
    fn rejects_focus_zoom_outside_range() {
        let err = DashboardConfig::from_json(r#"{"focus_zoom": 20}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZoomOutOfRange { field: "focus", .. }));
    }

    #[test]
    fn rejects_invalid_default_center() {
        let err = DashboardConfig::from_json(
            r#"{"default_view": {"center": {"lat": 120, "lng": 0}, "zoom": 5}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDefaultCenter { .. }));
    }

    #[test]
    fn rejects_zero_reset_delay() {
        let err = DashboardConfig::from_json(r#"{"reset_clear_delay_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidResetDelay(0)));
    }

    #[test]
    fn malformed_cities_are_rejected_at_load() {
        let err = DashboardConfig::from_json(
            r#"{"cities": [{"city":"Delhi","latitude":95,"longitude":77.2,"suspects":1}]}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Registry(RegistryError::InvalidLatitude { .. })
        ));
    }

    #[test]
    fn rejects_subdomain_placeholder_without_subdomains() {
        let err = DashboardConfig::from_json(r#"{"tiles": {"subdomains": []}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSubdomains));

        let err = DashboardConfig::from_json(
            r#"{"tiles": {"url_template": "//{s}.t.test/{z}/{x}/{y}.png", "subdomains": []}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSubdomains));
    }
}
