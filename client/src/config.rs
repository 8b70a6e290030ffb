use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use suspect_map_shared::{CityRegistry, DashboardConfig};

/// Resolved against the document base, so it follows the deploy prefix.
const CONFIG_URL: &str = "dashboard.json";

/// Config plus the registry validated from it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: DashboardConfig,
    pub registry: CityRegistry,
}

impl LoadedConfig {
    pub fn builtin() -> Self {
        Self {
            config: DashboardConfig::default(),
            registry: CityRegistry::builtin(),
        }
    }

    /// Parse a fetched document. An invalid document is reported and replaced
    /// by the built-in config as a whole; fields are never mixed.
    pub fn from_document(json: &str) -> Result<Self, String> {
        DashboardConfig::from_json(json)
            .map(|(config, registry)| Self { config, registry })
            .map_err(|e| e.to_string())
    }
}

async fn fetch_config_text() -> Result<String, String> {
    let resp = gloo_net::http::Request::get(CONFIG_URL)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    resp.text().await.map_err(|e| format!("read error: {e}"))
}

/// Fetch the dashboard config once and publish it into `target`.
pub fn load_config(target: RwSignal<Option<LoadedConfig>>) {
    spawn_local(async move {
        let loaded = match fetch_config_text().await {
            Ok(text) => match LoadedConfig::from_document(&text) {
                Ok(loaded) => {
                    web_sys::console::info_1(
                        &format!(
                            "dashboard config loaded: {} cities",
                            loaded.registry.len()
                        )
                        .into(),
                    );
                    loaded
                }
                Err(e) => {
                    web_sys::console::error_1(
                        &format!("{CONFIG_URL} rejected ({e}); using built-in config").into(),
                    );
                    LoadedConfig::builtin()
                }
            },
            Err(e) => {
                web_sys::console::warn_1(
                    &format!("{CONFIG_URL} unavailable ({e}); using built-in config").into(),
                );
                LoadedConfig::builtin()
            }
        };
        target.set(Some(loaded));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_document_loads_its_cities() {
        let loaded = LoadedConfig::from_document(
            r#"{"cities":[{"city":"Pune","latitude":18.5204,"longitude":73.8567,"suspects":90}]}"#,
        )
        .unwrap();
        assert_eq!(loaded.registry.len(), 1);
        assert_eq!(loaded.registry.get("Pune").map(|c| c.count), Some(90));
    }

    #[test]
    fn invalid_document_is_rejected_whole() {
        let err = LoadedConfig::from_document(r#"{"focus_zoom": 40}"#).unwrap_err();
        assert!(err.contains("focus zoom 40"), "{err}");
        assert!(LoadedConfig::from_document("not json").is_err());
    }

    #[test]
    fn builtin_matches_shared_defaults() {
        let loaded = LoadedConfig::builtin();
        assert_eq!(loaded.registry, CityRegistry::builtin());
        assert_eq!(loaded.config, DashboardConfig::default());
    }
}
