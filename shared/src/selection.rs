use thiserror::Error;

use crate::city::City;
use crate::config::DashboardConfig;
use crate::geo::MapView;
use crate::registry::CityRegistry;
use crate::viewport::ViewCommand;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("city {0:?} is not in the registry")]
    UnknownCity(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionState<'a> {
    Idle,
    Focused(&'a City),
}

/// Identifies one reset request. Only the most recent token may lower the
/// reset flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResetToken(u64);

/// Outcome of [`SelectionMachine::request_reset`]: viewport commands to run
/// now, plus the deferred clear the caller must schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetTicket {
    pub commands: Vec<ViewCommand>,
    pub token: ResetToken,
    pub clear_after_ms: u32,
}

/// Which city is focused, and whether a reset is still settling.
///
/// Transitions never touch the map directly; they return the commands the
/// shell should hand to its [`ViewportController`](crate::ViewportController).
#[derive(Debug, Clone)]
pub struct SelectionMachine {
    registry: CityRegistry,
    default_view: MapView,
    focus_zoom: f64,
    reset_clear_delay_ms: u32,
    current: Option<usize>,
    reset_pending: bool,
    reset_generation: u64,
}

impl SelectionMachine {
    pub fn new(registry: CityRegistry, config: &DashboardConfig) -> Self {
        Self {
            registry,
            default_view: config.default_view,
            focus_zoom: config.focus_zoom,
            reset_clear_delay_ms: config.reset_clear_delay_ms,
            current: None,
            reset_pending: false,
            reset_generation: 0,
        }
    }

    pub fn registry(&self) -> &CityRegistry {
        &self.registry
    }

    pub fn current(&self) -> Option<&City> {
        self.current.and_then(|index| self.registry.city_at(index))
    }

    pub fn state(&self) -> SelectionState<'_> {
        match self.current() {
            Some(city) => SelectionState::Focused(city),
            None => SelectionState::Idle,
        }
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.current().is_some_and(|city| city.name == name)
    }

    pub fn is_reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Focus `city`, which must be the registry's own record.
    pub fn select_city(&mut self, city: &City) -> Result<Vec<ViewCommand>, SelectionError> {
        if !self.registry.contains(city) {
            return Err(SelectionError::UnknownCity(city.name.clone()));
        }
        self.select_by_name(&city.name)
    }

    pub fn select_by_name(&mut self, name: &str) -> Result<Vec<ViewCommand>, SelectionError> {
        let index = self
            .registry
            .index_of(name)
            .ok_or_else(|| SelectionError::UnknownCity(name.to_string()))?;
        self.current = Some(index);

        let city = &self.registry.all()[index];
        Ok(vec![
            ViewCommand::SetView {
                center: city.position(),
                zoom: self.focus_zoom,
            },
            ViewCommand::OpenPopup {
                city: city.name.clone(),
            },
        ])
    }

    /// Drop the selection and return to the default framing. The reset flag
    /// is raised before the selection clears and stays raised until
    /// [`clear_reset`](Self::clear_reset) is called with the returned token.
    pub fn request_reset(&mut self) -> ResetTicket {
        self.reset_pending = true;
        self.current = None;
        self.reset_generation = self.reset_generation.wrapping_add(1);

        ResetTicket {
            commands: vec![ViewCommand::SetView {
                center: self.default_view.center,
                zoom: self.default_view.zoom,
            }],
            token: ResetToken(self.reset_generation),
            clear_after_ms: self.reset_clear_delay_ms,
        }
    }

    /// Lower the reset flag if `token` belongs to the latest reset.
    /// Returns whether the flag was lowered.
    pub fn clear_reset(&mut self, token: ResetToken) -> bool {
        if !self.reset_pending || token.0 != self.reset_generation {
            return false;
        }
        self.reset_pending = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_CENTER, DEFAULT_ZOOM, FOCUS_ZOOM};
    use crate::geo::LatLng;
    use crate::viewport::dispatch;
    use crate::viewport::testing::RecordingController;

    fn delhi() -> City {
        City::new("Delhi", 28.6139, 77.209, 500)
    }

    fn delhi_only() -> SelectionMachine {
        let registry = CityRegistry::new(vec![delhi()]).unwrap();
        SelectionMachine::new(registry, &DashboardConfig::default())
    }

    fn builtin() -> SelectionMachine {
        SelectionMachine::new(CityRegistry::builtin(), &DashboardConfig::default())
    }

    #[test]
    fn starts_idle_without_pending_reset() {
        let machine = builtin();
        assert_eq!(machine.state(), SelectionState::Idle);
        assert!(!machine.is_reset_pending());
    }

    #[test]
    fn selecting_delhi_focuses_and_opens_popup() {
        let mut machine = delhi_only();
        let mut controller = RecordingController::with_mounted(["Delhi"]);

        let commands = machine.select_city(&delhi()).unwrap();
        dispatch(&commands, &mut controller);

        assert_eq!(machine.state(), SelectionState::Focused(&delhi()));
        assert_eq!(
            controller.set_view_calls(),
            vec![(LatLng::new(28.6139, 77.209), 10.0)]
        );
        assert_eq!(controller.open_popup.as_deref(), Some("Delhi"));
    }

    #[test]
    fn every_registered_city_emits_one_set_view_then_popup() {
        let mut machine = builtin();
        let cities = machine.registry().all().to_vec();
        for city in &cities {
            let commands = machine.select_city(city).unwrap();
            assert_eq!(
                commands,
                vec![
                    ViewCommand::SetView {
                        center: city.position(),
                        zoom: FOCUS_ZOOM,
                    },
                    ViewCommand::OpenPopup {
                        city: city.name.clone(),
                    },
                ]
            );
            assert_eq!(machine.current(), Some(city));
            assert!(machine.is_selected(&city.name));
        }
    }

    #[test]
    fn selecting_twice_matches_selecting_once() {
        let mut once = builtin();
        let mut twice = builtin();
        let mumbai = once.registry().get("Mumbai").cloned().unwrap();

        let first = once.select_city(&mumbai).unwrap();
        twice.select_city(&mumbai).unwrap();
        let second = twice.select_city(&mumbai).unwrap();

        assert_eq!(first, second);
        assert_eq!(once.current(), twice.current());
        assert_eq!(once.is_reset_pending(), twice.is_reset_pending());
    }

    #[test]
    fn reset_from_focused_returns_to_default_view() {
        let mut machine = delhi_only();
        machine.select_city(&delhi()).unwrap();
        let mut controller = RecordingController::default();

        let ticket = machine.request_reset();
        assert!(machine.is_reset_pending());
        assert_eq!(machine.state(), SelectionState::Idle);

        dispatch(&ticket.commands, &mut controller);
        assert_eq!(
            controller.set_view_calls(),
            vec![(LatLng::new(20.5937, 78.9629), 5.0)]
        );
        assert_eq!(ticket.clear_after_ms, 100);

        assert!(machine.clear_reset(ticket.token));
        assert!(!machine.is_reset_pending());
    }

    #[test]
    fn reset_from_idle_still_raises_and_clears() {
        let mut machine = builtin();
        let ticket = machine.request_reset();
        assert_eq!(
            ticket.commands,
            vec![ViewCommand::SetView {
                center: DEFAULT_CENTER,
                zoom: DEFAULT_ZOOM,
            }]
        );
        assert!(machine.is_reset_pending());
        assert!(machine.clear_reset(ticket.token));
        assert!(!machine.is_reset_pending());
    }

    #[test]
    fn overlapping_resets_only_clear_on_latest_token() {
        let mut machine = builtin();
        let first = machine.request_reset();
        let second = machine.request_reset();
        assert_ne!(first.token, second.token);

        // The first deferred clear fires late and must not lower the flag.
        assert!(!machine.clear_reset(first.token));
        assert!(machine.is_reset_pending());

        assert!(machine.clear_reset(second.token));
        assert!(!machine.is_reset_pending());

        // A straggler after the flag is down changes nothing.
        assert!(!machine.clear_reset(first.token));
        assert!(!machine.is_reset_pending());
    }

    #[test]
    fn select_during_reset_window_keeps_flag_until_clear() {
        let mut machine = builtin();
        let ticket = machine.request_reset();
        machine.select_by_name("Chennai").unwrap();
        assert!(machine.is_reset_pending());
        assert!(machine.is_selected("Chennai"));

        assert!(machine.clear_reset(ticket.token));
        assert!(machine.is_selected("Chennai"));
    }

    #[test]
    fn unknown_city_is_rejected_without_side_effects() {
        let mut machine = delhi_only();
        machine.select_city(&delhi()).unwrap();

        let pune = City::new("Pune", 18.5204, 73.8567, 75);
        let err = machine.select_city(&pune).unwrap_err();
        assert_eq!(err, SelectionError::UnknownCity("Pune".into()));
        assert!(machine.is_selected("Delhi"));

        let err = machine.select_by_name("Pune").unwrap_err();
        assert_eq!(err, SelectionError::UnknownCity("Pune".into()));
        assert!(machine.is_selected("Delhi"));
    }

    #[test]
    fn look_alike_record_is_rejected() {
        let mut machine = delhi_only();
        let forged = City::new("Delhi", 0.0, 0.0, 500);
        assert!(machine.select_city(&forged).is_err());
        assert_eq!(machine.state(), SelectionState::Idle);
    }

    #[test]
    fn focus_zoom_follows_config() {
        let config = DashboardConfig {
            focus_zoom: 12.0,
            ..DashboardConfig::default()
        };
        let mut machine = SelectionMachine::new(CityRegistry::builtin(), &config);
        let commands = machine.select_by_name("Kolkata").unwrap();
        assert!(matches!(
            commands.first(),
            Some(ViewCommand::SetView { zoom, .. }) if *zoom == 12.0
        ));
    }
}
