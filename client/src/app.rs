use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use wasm_bindgen::JsCast;

use std::cell::RefCell;

use suspect_map_shared::{
    City, CityRegistry, DashboardConfig, SelectionError, SelectionMachine, ViewCommand, dispatch,
};

use crate::animation::ViewTransition;
use crate::canvas::MapCanvas;
use crate::config::{LoadedConfig, load_config};
use crate::controller::MapController;
use crate::markers::MarkerRegistry;
use crate::sidebar::Sidebar;
use crate::viewport::Viewport;

fn set_loading_shell_step(step: &str) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    if let Some(step_el) = document.get_element_by_id("app-loading-step") {
        step_el.set_text_content(Some(step));
    }
}

fn remove_loading_shell() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    if let Some(shell) = document.get_element_by_id("app-loading-shell") {
        shell.remove();
    }
}

struct KeydownBinding {
    window: web_sys::Window,
    _handler: wasm_bindgen::closure::Closure<dyn Fn(web_sys::KeyboardEvent)>,
}

thread_local! {
    static KEYDOWN_BINDING: RefCell<Option<KeydownBinding>> = const { RefCell::new(None) };
    /// Deferred clear of the latest reset. Replacing it drops, and so cancels,
    /// the previous one.
    static RESET_CLEAR_TIMEOUT: RefCell<Option<Timeout>> = const { RefCell::new(None) };
}

fn remove_keydown_binding() {
    KEYDOWN_BINDING.with(|slot| {
        if let Some(old) = slot.borrow_mut().take() {
            let _ = old.window.remove_event_listener_with_callback(
                "keydown",
                old._handler.as_ref().unchecked_ref(),
            );
        }
    });
}

fn cancel_reset_clear() {
    RESET_CLEAR_TIMEOUT.with(|slot| {
        drop(slot.borrow_mut().take());
    });
}

/// Newtype wrappers give each signal a distinct type for Leptos context.
#[derive(Clone, Copy)]
pub(crate) struct Selected(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct OpenPopup(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct Settings(pub StoredValue<DashboardConfig>);
#[derive(Clone, Copy)]
pub(crate) struct Cities(pub StoredValue<CityRegistry>);

/// Entry point for user intents. Runs a transition on the selection machine,
/// mirrors its state into signals, then hands the emitted commands to the map.
#[derive(Clone, Copy)]
pub(crate) struct SelectionHandle {
    machine: StoredValue<SelectionMachine>,
    selected: RwSignal<Option<String>>,
    reset_pending: RwSignal<bool>,
    map: MapController,
}

impl SelectionHandle {
    /// Select from a registry record (sidebar entries).
    pub fn select_city(&self, city: &City) {
        let mut outcome = None;
        self.machine
            .update_value(|machine| outcome = Some(machine.select_city(city)));
        self.apply_selection(outcome);
    }

    /// Select by name (marker clicks, keyboard).
    pub fn select_by_name(&self, name: &str) {
        let mut outcome = None;
        self.machine
            .update_value(|machine| outcome = Some(machine.select_by_name(name)));
        self.apply_selection(outcome);
    }

    fn apply_selection(&self, outcome: Option<Result<Vec<ViewCommand>, SelectionError>>) {
        match outcome {
            Some(Ok(commands)) => {
                self.sync_selected();
                let mut map = self.map;
                dispatch(&commands, &mut map);
            }
            Some(Err(e)) => {
                web_sys::console::warn_1(&format!("selection rejected: {e}").into());
            }
            None => {}
        }
    }

    /// Move the selection `step` entries through the registry.
    pub fn step_selection(&self, step: isize) {
        let next = self.machine.with_value(|machine| {
            let current = machine.current().map(|city| city.name.as_str());
            machine.registry().step_from(current, step).cloned()
        });
        if let Some(city) = next {
            self.select_city(&city);
        }
    }

    pub fn request_reset(&self) {
        let mut ticket = None;
        self.machine
            .update_value(|machine| ticket = Some(machine.request_reset()));
        let Some(ticket) = ticket else {
            return;
        };

        // The flag goes up before the selection clears.
        sync_reset_pending(self.machine, self.reset_pending);
        self.sync_selected();
        let mut map = self.map;
        dispatch(&ticket.commands, &mut map);

        let machine = self.machine;
        let reset_pending = self.reset_pending;
        let token = ticket.token;
        let timeout = Timeout::new(ticket.clear_after_ms, move || {
            machine.update_value(|machine| {
                machine.clear_reset(token);
            });
            sync_reset_pending(machine, reset_pending);
        });
        RESET_CLEAR_TIMEOUT.with(|slot| drop(slot.borrow_mut().replace(timeout)));
    }

    fn sync_selected(&self) {
        let current = self
            .machine
            .with_value(|machine| machine.current().map(|city| city.name.clone()));
        if self.selected.get_untracked() != current {
            self.selected.set(current);
        }
    }
}

/// Mirror the machine's reset flag into the `resetting` class signal.
fn sync_reset_pending(machine: StoredValue<SelectionMachine>, flag: RwSignal<bool>) {
    let pending = machine.with_value(SelectionMachine::is_reset_pending);
    if flag.get_untracked() != pending {
        flag.set(pending);
    }
}

#[component]
pub fn App() -> impl IntoView {
    let loaded: RwSignal<Option<LoadedConfig>> = RwSignal::new(None);

    set_loading_shell_step("Loading dashboard config…");
    load_config(loaded);

    Effect::new(move || {
        if loaded.with(Option::is_some) {
            remove_loading_shell();
        }
    });

    move || {
        loaded
            .get()
            .map(|loaded| view! { <Dashboard loaded=loaded /> })
    }
}

#[component]
fn Dashboard(loaded: LoadedConfig) -> impl IntoView {
    let LoadedConfig { config, registry } = loaded;

    let viewport: RwSignal<Viewport> = RwSignal::new(Viewport::new(
        config.default_view,
        config.min_zoom,
        config.max_zoom,
    ));
    let transition: RwSignal<Option<ViewTransition>> = RwSignal::new(None);
    let popup: RwSignal<Option<String>> = RwSignal::new(None);
    let selected: RwSignal<Option<String>> = RwSignal::new(None);
    let reset_pending: RwSignal<bool> = RwSignal::new(false);
    let markers: StoredValue<MarkerRegistry> = StoredValue::new(MarkerRegistry::default());
    let machine = StoredValue::new(SelectionMachine::new(registry.clone(), &config));
    let title = config.title.clone();

    let map = MapController {
        viewport,
        transition,
        popup,
        markers,
    };
    let selection = SelectionHandle {
        machine,
        selected,
        reset_pending,
        map,
    };

    provide_context(map);
    provide_context(selection);
    provide_context(Selected(selected));
    provide_context(OpenPopup(popup));
    provide_context(Settings(StoredValue::new(config)));
    provide_context(Cities(StoredValue::new(registry)));

    // Keyboard shortcuts
    Effect::new(move || {
        use wasm_bindgen::prelude::*;

        let Some(window) = web_sys::window() else {
            return;
        };

        remove_keydown_binding();

        let handler =
            Closure::<dyn Fn(web_sys::KeyboardEvent)>::new(move |e: web_sys::KeyboardEvent| {
                let target_tag = e
                    .target()
                    .and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok())
                    .map(|el| el.tag_name())
                    .unwrap_or_default();

                // Don't intercept when typing in an input
                if target_tag == "INPUT" || target_tag == "TEXTAREA" {
                    return;
                }

                match e.key().as_str() {
                    "Escape" => selection.request_reset(),
                    "ArrowDown" => {
                        e.prevent_default();
                        selection.step_selection(1);
                    }
                    "ArrowUp" => {
                        e.prevent_default();
                        selection.step_selection(-1);
                    }
                    _ => {}
                }
            });

        if window
            .add_event_listener_with_callback("keydown", handler.as_ref().unchecked_ref())
            .is_ok()
        {
            KEYDOWN_BINDING.with(|slot| {
                *slot.borrow_mut() = Some(KeydownBinding {
                    window: window.clone(),
                    _handler: handler,
                });
            });
        }
    });

    on_cleanup(|| {
        remove_keydown_binding();
        cancel_reset_clear();
    });

    view! {
        <div class="dashboard">
            <div class="map-container" class:resetting=move || reset_pending.get()>
                <MapCanvas />
                <button
                    class="back-button"
                    type="button"
                    on:click=move |_| selection.request_reset()
                >
                    "Back"
                </button>
            </div>
            <Sidebar title=title />
        </div>
    }
}
