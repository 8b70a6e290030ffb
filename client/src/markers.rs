use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use web_sys::HtmlImageElement;

use suspect_map_shared::{CityRegistry, LatLng, MarkerStyle};

static ICON_WARNED: AtomicBool = AtomicBool::new(false);

/// Opaque handle for a mounted marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerHandle {
    anchor: LatLng,
}

impl MarkerHandle {
    pub fn anchor(&self) -> LatLng {
        self.anchor
    }
}

/// Marker handles keyed by city name. Owned by the map surface, which fills
/// it when it mounts; the viewport controller only looks entries up.
#[derive(Debug, Clone, Default)]
pub struct MarkerRegistry {
    handles: HashMap<String, MarkerHandle>,
}

impl MarkerRegistry {
    pub fn mount_all(&mut self, registry: &CityRegistry) {
        self.handles.clear();
        for city in registry {
            self.handles.insert(
                city.name.clone(),
                MarkerHandle {
                    anchor: city.position(),
                },
            );
        }
    }

    pub fn unmount_all(&mut self) {
        self.handles.clear();
    }

    pub fn get(&self, name: &str) -> Option<MarkerHandle> {
        self.handles.get(name).copied()
    }

    pub fn is_mounted(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }
}

/// Screen rectangle `(x, y, w, h)` covered by a marker icon whose anchor sits
/// at `(sx, sy)`.
pub fn icon_box(sx: f64, sy: f64, style: &MarkerStyle) -> (f64, f64, f64, f64) {
    let [w, h] = style.icon_size;
    let [ax, ay] = style.icon_anchor;
    (sx - ax, sy - ay, w, h)
}

/// Index of the topmost marker under `(x, y)`. Markers are drawn in slice
/// order, so later entries win.
pub fn hit_test(positions: &[(f64, f64)], x: f64, y: f64, style: &MarkerStyle) -> Option<usize> {
    positions.iter().enumerate().rev().find_map(|(i, &(sx, sy))| {
        let (bx, by, bw, bh) = icon_box(sx, sy, style);
        (x >= bx && x <= bx + bw && y >= by && y <= by + bh).then_some(i)
    })
}

/// Point where a popup's tip touches the marker: top-center of the icon.
pub fn popup_tip(sx: f64, sy: f64, style: &MarkerStyle) -> (f64, f64) {
    let (bx, by, bw, _) = icon_box(sx, sy, style);
    (bx + bw / 2.0, by)
}

fn warn_icon_once(message: &str) {
    if ICON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        web_sys::console::warn_1(&message.into());
    }
}

/// Load the marker icon. `slot` stays `None` on failure and the canvas keeps
/// drawing the vector pin.
pub fn load_marker_icon(
    url: String,
    slot: Rc<RefCell<Option<HtmlImageElement>>>,
    on_ready: Rc<dyn Fn()>,
) {
    wasm_bindgen_futures::spawn_local(async move {
        let Ok(image) = HtmlImageElement::new() else {
            warn_icon_once("Failed to create marker icon image element.");
            return;
        };
        image.set_src(&url);
        match wasm_bindgen_futures::JsFuture::from(image.decode()).await {
            Ok(_) => {
                *slot.borrow_mut() = Some(image);
                on_ready();
            }
            Err(err) => {
                warn_icon_once(&format!("Failed to decode marker icon {url}: {:?}", err));
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_box_uses_anchor() {
        let style = MarkerStyle::default();
        assert_eq!(icon_box(100.0, 200.0, &style), (88.0, 159.0, 25.0, 41.0));
    }

    #[test]
    fn hit_test_matches_icon_area_only() {
        let style = MarkerStyle::default();
        let positions = [(100.0, 200.0)];
        // Just above the anchor point is inside the pin.
        assert_eq!(hit_test(&positions, 100.0, 195.0, &style), Some(0));
        assert_eq!(hit_test(&positions, 88.0, 159.0, &style), Some(0));
        // Below the anchor is outside.
        assert_eq!(hit_test(&positions, 100.0, 205.0, &style), None);
        assert_eq!(hit_test(&positions, 120.0, 180.0, &style), None);
    }

    #[test]
    fn hit_test_prefers_last_drawn_marker() {
        let style = MarkerStyle::default();
        let positions = [(100.0, 200.0), (105.0, 205.0)];
        assert_eq!(hit_test(&positions, 102.0, 190.0, &style), Some(1));
        assert_eq!(hit_test(&positions, 90.0, 162.0, &style), Some(0));
    }

    #[test]
    fn popup_tip_sits_on_top_of_icon() {
        let style = MarkerStyle::default();
        assert_eq!(popup_tip(100.0, 200.0, &style), (100.5, 159.0));
    }

    #[test]
    fn registry_mounts_every_city() {
        let cities = CityRegistry::builtin();
        let mut markers = MarkerRegistry::default();
        assert!(!markers.is_mounted("Delhi"));

        markers.mount_all(&cities);
        assert_eq!(markers.len(), cities.len());
        let handle = markers.get("Kolkata").unwrap();
        assert_eq!(handle.anchor(), LatLng::new(22.5726, 88.3639));

        markers.unmount_all();
        assert!(!markers.is_mounted("Kolkata"));
    }
}
