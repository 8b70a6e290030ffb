use suspect_map_shared::geo::{project, unproject};
use suspect_map_shared::{LatLng, MapView};

const ZOOM_SENSITIVITY: f64 = 0.002;

/// Viewport maps geographic coordinates to screen pixels for a Web Mercator
/// map centered on `center` at a fractional `zoom`.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// CSS pixel size of the map surface.
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(view: MapView, min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            center: view.center,
            zoom: view.zoom.clamp(min_zoom, max_zoom),
            min_zoom,
            max_zoom,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn view(&self) -> MapView {
        MapView::new(self.center, self.zoom)
    }

    /// Recenter and rezoom. Calling it again with the same arguments leaves
    /// the viewport unchanged.
    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.center = center;
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    /// Convert a coordinate to screen pixels.
    pub fn world_to_screen(&self, point: LatLng) -> (f64, f64) {
        let (cx, cy) = project(self.center, self.zoom);
        let (px, py) = project(point, self.zoom);
        (px - cx + self.width / 2.0, py - cy + self.height / 2.0)
    }

    /// Convert screen pixels to a coordinate.
    pub fn screen_to_world(&self, sx: f64, sy: f64) -> LatLng {
        let (cx, cy) = project(self.center, self.zoom);
        unproject(
            cx + sx - self.width / 2.0,
            cy + sy - self.height / 2.0,
            self.zoom,
        )
    }

    /// Zoom toward a focus point (screen coordinates).
    pub fn zoom_at(&mut self, delta: f64, screen_x: f64, screen_y: f64) {
        let new_zoom = (self.zoom - delta * ZOOM_SENSITIVITY).clamp(self.min_zoom, self.max_zoom);
        if new_zoom == self.zoom {
            return;
        }

        // Keep the point under the cursor fixed.
        let anchor = self.screen_to_world(screen_x, screen_y);
        let (ax, ay) = project(anchor, new_zoom);
        let cx = ax - (screen_x - self.width / 2.0);
        let cy = ay - (screen_y - self.height / 2.0);
        self.center = unproject(cx, cy, new_zoom);
        self.zoom = new_zoom;
    }

    /// Pan by screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let (cx, cy) = project(self.center, self.zoom);
        self.center = unproject(cx - dx, cy - dy, self.zoom);
    }
}
