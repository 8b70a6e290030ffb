mod animation;
mod app;
mod canvas;
mod colors;
mod config;
mod controller;
mod markers;
mod render_loop;
mod sidebar;
mod tiles;
mod viewport;

use leptos::mount::mount_to;
use std::any::Any;
use std::cell::RefCell;
use wasm_bindgen::JsCast;

thread_local! {
    static APP_MOUNT_HANDLE: RefCell<Option<Box<dyn Any>>> = RefCell::new(None);
}

/// `#app` if present, else `<body>`.
fn mount_target() -> Option<web_sys::HtmlElement> {
    let document = web_sys::window()?.document()?;
    document
        .get_element_by_id("app")
        .and_then(|node| node.dyn_into::<web_sys::HtmlElement>().ok())
        .or_else(|| document.body())
}

fn main() {
    console_error_panic_hook::set_once();
    let Some(target) = mount_target() else {
        web_sys::console::error_1(&"no mount target; dashboard not started".into());
        return;
    };
    web_sys::console::info_1(&format!("suspect-map v{}", env!("CARGO_PKG_VERSION")).into());

    APP_MOUNT_HANDLE.with(move |slot| {
        // Drop a previous mount so its effects stop before the new tree starts.
        let _old = slot.borrow_mut().take();
        let handle = mount_to(target, app::App);
        *slot.borrow_mut() = Some(Box::new(handle));
    });
}
