use suspect_map_shared::{LatLng, MapView};

/// Duration of the fly-to animation played for programmatic view changes.
pub const VIEW_TRANSITION_MS: f64 = 300.0;

/// Eased interpolation between two map views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransition {
    pub from: MapView,
    pub to: MapView,
    pub start_time: f64,
    pub duration: f64, // milliseconds
}

impl ViewTransition {
    pub fn new(from: MapView, to: MapView, start_time: f64, duration: f64) -> Self {
        Self {
            from,
            to,
            start_time,
            duration,
        }
    }

    /// The view to draw at `now`, or None once the transition has finished.
    pub fn view_at(&self, now: f64) -> Option<MapView> {
        let elapsed = now - self.start_time;
        if elapsed >= self.duration || self.duration <= 0.0 {
            return None;
        }

        let t = cubic_ease_out((elapsed / self.duration).max(0.0));
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        Some(MapView::new(
            LatLng::new(
                lerp(self.from.center.lat, self.to.center.lat),
                lerp(self.from.center.lng, self.to.center.lng),
            ),
            lerp(self.from.zoom, self.to.zoom),
        ))
    }
}

/// Transition from whatever is on screen at `now` toward `target`. `None`
/// when the map already shows `target`, which keeps repeated identical
/// `set_view` calls inert.
pub fn retarget(
    running: Option<ViewTransition>,
    settled: MapView,
    target: MapView,
    now: f64,
) -> Option<ViewTransition> {
    let from = running
        .and_then(|transition| transition.view_at(now))
        .unwrap_or(settled);
    (from != target).then(|| ViewTransition::new(from, target, now, VIEW_TRANSITION_MS))
}

/// Cubic ease-out: decelerating to zero velocity.
fn cubic_ease_out(t: f64) -> f64 {
    let t = t - 1.0;
    t * t * t + 1.0
}
