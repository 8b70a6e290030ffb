use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;

/// Coalesces repaint requests into at most one `requestAnimationFrame` per
/// vsync.
///
/// The draw function returns `true` while something on screen is still
/// moving (a fly-to transition); the scheduler then keeps requesting frames
/// until it returns `false`.
pub struct RenderScheduler {
    shared: Rc<SchedulerState>,
}

struct SchedulerState {
    window: Option<web_sys::Window>,
    frame_id: Cell<Option<i32>>,
    on_frame: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl SchedulerState {
    fn request_frame(&self) {
        if self.frame_id.get().is_some() {
            return;
        }
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let on_frame = self.on_frame.borrow();
        let Some(cb) = on_frame.as_ref() else {
            return;
        };
        if let Ok(id) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
            self.frame_id.set(Some(id));
        }
    }
}

impl RenderScheduler {
    pub fn new(draw: impl Fn() -> bool + 'static) -> Self {
        let shared = Rc::new(SchedulerState {
            window: web_sys::window(),
            frame_id: Cell::new(None),
            on_frame: RefCell::new(None),
        });

        let state = Rc::downgrade(&shared);
        let cb = Closure::<dyn FnMut()>::new(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            state.frame_id.set(None);
            if draw() {
                state.request_frame();
            }
        });
        *shared.on_frame.borrow_mut() = Some(cb);

        Self { shared }
    }

    /// Ask for a repaint on the next frame.
    pub fn mark_dirty(&self) {
        self.shared.request_frame();
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        if let Some(id) = self.shared.frame_id.take()
            && let Some(window) = self.shared.window.as_ref()
        {
            let _ = window.cancel_animation_frame(id);
        }
        self.shared.on_frame.borrow_mut().take();
    }
}
