use crate::geo::LatLng;

/// Imperative command for the map surface, emitted by selection transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    SetView { center: LatLng, zoom: f64 },
    OpenPopup { city: String },
}

/// The two capabilities the selection core needs from the map surface.
///
/// Implementations must tolerate repeated identical calls, and
/// `open_popup_for` must quietly do nothing when the city's marker is not
/// mounted.
pub trait ViewportController {
    fn set_view(&mut self, center: LatLng, zoom: f64);
    fn open_popup_for(&mut self, city: &str);
}

/// Apply commands in order. Nothing is queued; each command overwrites
/// whatever the previous one left behind.
pub fn dispatch<C: ViewportController + ?Sized>(commands: &[ViewCommand], controller: &mut C) {
    for command in commands {
        match command {
            ViewCommand::SetView { center, zoom } => controller.set_view(*center, *zoom),
            ViewCommand::OpenPopup { city } => controller.open_popup_for(city),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingController;
    use super::*;

    #[test]
    fn dispatch_preserves_command_order() {
        let mut controller = RecordingController::with_mounted(["Delhi"]);
        let commands = vec![
            ViewCommand::SetView {
                center: LatLng::new(28.6139, 77.209),
                zoom: 10.0,
            },
            ViewCommand::OpenPopup {
                city: "Delhi".into(),
            },
        ];
        dispatch(&commands, &mut controller);
        assert_eq!(controller.calls, commands);
        assert_eq!(controller.open_popup.as_deref(), Some("Delhi"));
    }

    #[test]
    fn popup_for_unmounted_marker_is_ignored() {
        let mut controller = RecordingController::default();
        dispatch(
            &[ViewCommand::OpenPopup {
                city: "Delhi".into(),
            }],
            &mut controller,
        );
        assert!(controller.open_popup.is_none());
    }

    #[test]
    fn dispatch_works_through_trait_objects() {
        let mut controller = RecordingController::default();
        let dyn_controller: &mut dyn ViewportController = &mut controller;
        dispatch(
            &[ViewCommand::SetView {
                center: LatLng::new(0.0, 0.0),
                zoom: 3.0,
            }],
            dyn_controller,
        );
        assert_eq!(controller.set_view_calls(), vec![(LatLng::new(0.0, 0.0), 3.0)]);
    }
}
