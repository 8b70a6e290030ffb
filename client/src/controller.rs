use leptos::prelude::*;

use suspect_map_shared::{LatLng, ViewportController};

use crate::animation::{ViewTransition, retarget};
use crate::markers::MarkerRegistry;
use crate::viewport::Viewport;

/// Drives the canvas map from selection commands.
///
/// `set_view` writes the target view straight into the viewport and records
/// a transition for the renderer to ease through. Popups only open for
/// cities whose marker the map surface has mounted.
#[derive(Clone, Copy)]
pub struct MapController {
    pub viewport: RwSignal<Viewport>,
    pub transition: RwSignal<Option<ViewTransition>>,
    pub popup: RwSignal<Option<String>>,
    pub markers: StoredValue<MarkerRegistry>,
}

impl ViewportController for MapController {
    fn set_view(&mut self, center: LatLng, zoom: f64) {
        let now = js_sys::Date::now();
        let settled = self.viewport.with_untracked(Viewport::view);
        self.viewport.update(|vp| vp.set_view(center, zoom));
        let target = self.viewport.with_untracked(Viewport::view);
        let running = self.transition.get_untracked();
        self.transition.set(retarget(running, settled, target, now));
    }

    fn open_popup_for(&mut self, city: &str) {
        if !self.markers.with_value(|m| m.is_mounted(city)) {
            return;
        }
        if self.popup.with_untracked(|open| open.as_deref() == Some(city)) {
            return;
        }
        self.popup.set(Some(city.to_string()));
    }
}
