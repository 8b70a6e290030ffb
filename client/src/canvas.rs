use std::cell::{Cell, RefCell};
use std::f64::consts::PI;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement, MouseEvent, PointerEvent,
    WheelEvent,
};

use suspect_map_shared::geo::{TILE_SIZE, project};
use suspect_map_shared::tiles::visible_tiles;
use suspect_map_shared::{City, MarkerStyle, TileKey};

use crate::app::{Cities, OpenPopup, Selected, SelectionHandle, Settings};
use crate::colors::{MAP_BACKGROUND, PIN_FILL, PIN_FILL_SELECTED, rgba_css};
use crate::controller::MapController;
use crate::markers::{MarkerRegistry, hit_test, icon_box, load_marker_icon, popup_tip};
use crate::render_loop::RenderScheduler;
use crate::tiles::{TileCallback, TileLayer, request_tiles};
use crate::viewport::Viewport;

/// Pointer travel below which a press counts as a click rather than a drag.
const CLICK_SLOP_PX: f64 = 5.0;

struct ResizeBinding {
    window: web_sys::Window,
    _handler: wasm_bindgen::closure::Closure<dyn Fn()>,
}

/// Press/drag bookkeeping for the map's pointer handlers.
#[derive(Default)]
struct DragGesture {
    active: Cell<bool>,
    start: Cell<(f64, f64)>,
    last: Cell<(f64, f64)>,
}

impl DragGesture {
    fn begin(&self, pos: (f64, f64)) {
        self.active.set(true);
        self.start.set(pos);
        self.last.set(pos);
    }

    /// Pan delta since the previous step, or `None` when no drag is active.
    fn step(&self, pos: (f64, f64)) -> Option<(f64, f64)> {
        if !self.active.get() {
            return None;
        }
        let (lx, ly) = self.last.replace(pos);
        Some((pos.0 - lx, pos.1 - ly))
    }

    /// Ends the drag on release, cancel, or the pointer leaving the map.
    fn end(&self) {
        self.active.set(false);
    }

    fn is_click(&self, pos: (f64, f64)) -> bool {
        let (sx, sy) = self.start.get();
        (pos.0 - sx).abs() < CLICK_SLOP_PX && (pos.1 - sy).abs() < CLICK_SLOP_PX
    }
}

thread_local! {
    static RESIZE_BINDING: RefCell<Option<ResizeBinding>> = const { RefCell::new(None) };
}

fn remove_resize_binding() {
    RESIZE_BINDING.with(|slot| {
        if let Some(old) = slot.borrow_mut().take() {
            let _ = old.window.remove_event_listener_with_callback(
                "resize",
                old._handler.as_ref().unchecked_ref(),
            );
        }
    });
}

fn device_pixel_ratio() -> f64 {
    web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0)
        .max(1.0)
}

/// Pointer position relative to the canvas' top-left corner.
fn local_point(canvas: Option<HtmlCanvasElement>, client_x: f64, client_y: f64) -> (f64, f64) {
    match canvas {
        Some(el) => {
            let rect = el.get_bounding_client_rect();
            (client_x - rect.left(), client_y - rect.top())
        }
        None => (client_x, client_y),
    }
}

/// Viewport as it is on screen at `now`, mid-transition included.
fn displayed_viewport(map: &MapController, now: f64) -> (Viewport, bool) {
    let mut vp = map.viewport.get_untracked();
    match map.transition.get_untracked().and_then(|t| t.view_at(now)) {
        Some(view) => {
            vp.center = view.center;
            vp.zoom = view.zoom;
            (vp, true)
        }
        None => (vp, false),
    }
}

/// Screen anchors of every mounted marker, in draw order.
fn marker_anchors<'a>(
    vp: &Viewport,
    cities: &'a [City],
    markers: &MarkerRegistry,
) -> Vec<(&'a City, (f64, f64))> {
    cities
        .iter()
        .filter_map(|city| {
            let handle = markers.get(&city.name)?;
            Some((city, vp.world_to_screen(handle.anchor())))
        })
        .collect()
}

fn draw_tiles(ctx: &CanvasRenderingContext2d, vp: &Viewport, layer: &TileLayer, keys: &[TileKey]) {
    let Some(z) = keys.first().map(|key| key.z) else {
        return;
    };
    let scale = (vp.zoom - f64::from(z)).exp2();
    let size = TILE_SIZE * scale;
    let (cx, cy) = project(vp.center, vp.zoom);

    for key in keys {
        let Some(image) = layer.image(key) else {
            continue;
        };
        let sx = key.x as f64 * size - cx + vp.width / 2.0;
        let sy = key.y as f64 * size - cy + vp.height / 2.0;
        // Snap to whole pixels so neighbouring tiles never leave a seam.
        let (x0, y0) = (sx.floor(), sy.floor());
        let (x1, y1) = ((sx + size).ceil(), (sy + size).ceil());
        ctx.draw_image_with_html_image_element_and_dw_and_dh(image, x0, y0, x1 - x0, y1 - y0)
            .ok();
    }
}

fn draw_vector_pin(
    ctx: &CanvasRenderingContext2d,
    sx: f64,
    sy: f64,
    style: &MarkerStyle,
    selected: bool,
) {
    let (bx, by, bw, _) = icon_box(sx, sy, style);
    let r = bw / 2.0;
    let (cx, cy) = (bx + r, by + r);
    let (red, green, blue) = if selected { PIN_FILL_SELECTED } else { PIN_FILL };

    ctx.begin_path();
    ctx.move_to(sx, sy);
    ctx.arc(cx, cy, r, PI * 0.75, PI * 0.25).ok();
    ctx.close_path();
    ctx.set_fill_style_str(&rgba_css(red, green, blue, 1.0));
    ctx.fill();
    ctx.set_line_width(1.5);
    ctx.set_stroke_style_str("rgba(255,255,255,0.9)");
    ctx.stroke();

    ctx.begin_path();
    ctx.arc(cx, cy, r * 0.4, 0.0, PI * 2.0).ok();
    ctx.set_fill_style_str("#ffffff");
    ctx.fill();
}

fn draw_marker(
    ctx: &CanvasRenderingContext2d,
    icon: Option<&HtmlImageElement>,
    (sx, sy): (f64, f64),
    style: &MarkerStyle,
    selected: bool,
) {
    let Some(icon) = icon else {
        draw_vector_pin(ctx, sx, sy, style, selected);
        return;
    };
    if selected {
        let (red, green, blue) = PIN_FILL_SELECTED;
        ctx.begin_path();
        ctx.ellipse(sx, sy, style.icon_size[0] * 0.6, style.icon_size[0] * 0.25, 0.0, 0.0, PI * 2.0)
            .ok();
        ctx.set_fill_style_str(&rgba_css(red, green, blue, 0.55));
        ctx.fill();
    }
    let (bx, by, bw, bh) = icon_box(sx, sy, style);
    ctx.draw_image_with_html_image_element_and_dw_and_dh(icon, bx, by, bw, bh)
        .ok();
}

/// Canvas 2D map: raster tiles, city markers, and a DOM popup overlay.
#[component]
pub fn MapCanvas() -> impl IntoView {
    let map: MapController = expect_context();
    let selection: SelectionHandle = expect_context();
    let Selected(selected) = expect_context();
    let OpenPopup(popup) = expect_context();
    let Settings(settings) = expect_context();
    let Cities(cities) = expect_context();
    let MapController {
        viewport,
        transition,
        markers,
        ..
    } = map;

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let popup_ref = NodeRef::<leptos::html::Div>::new();

    let marker_style = settings.with_value(|config| config.marker.clone());
    let attribution = settings.with_value(|config| config.tiles.attribution.clone());

    // Markers exist for as long as the map surface does.
    cities.with_value(|registry| markers.update_value(|m| m.mount_all(registry)));
    web_sys::console::info_1(
        &format!("mounted {} city markers", markers.with_value(MarkerRegistry::len)).into(),
    );
    on_cleanup(move || {
        markers.update_value(MarkerRegistry::unmount_all);
        remove_resize_binding();
    });

    // Bumped whenever an async image lands or the window resizes.
    let tile_revision: RwSignal<u32> = RwSignal::new(0);
    let icon_revision: RwSignal<u32> = RwSignal::new(0);
    let layout_revision: RwSignal<u32> = RwSignal::new(0);

    let tiles = Rc::new(RefCell::new(TileLayer::new(
        settings.with_value(|config| config.tiles.clone()),
    )));
    let on_tile_loaded: TileCallback = Rc::new(move || {
        tile_revision.update(|r| *r = r.wrapping_add(1));
    });

    let icon: Rc<RefCell<Option<HtmlImageElement>>> = Rc::new(RefCell::new(None));
    load_marker_icon(
        marker_style.icon_url.clone(),
        icon.clone(),
        Rc::new(move || icon_revision.update(|r| *r = r.wrapping_add(1))),
    );

    let drag = Rc::new(DragGesture::default());

    // Track pinch state
    let pinch_dist = Rc::new(Cell::new(0.0f64));

    // Cached Canvas 2D context (invalidated on canvas resize)
    let cached_ctx: Rc<RefCell<Option<CanvasRenderingContext2d>>> = Rc::new(RefCell::new(None));

    // Render function
    let style_render = marker_style.clone();
    let scheduler = Rc::new(RenderScheduler::new(move || {
        let Some(canvas) = canvas_ref.get_untracked() else {
            return false;
        };
        let canvas: &HtmlCanvasElement = &canvas;

        // Resize canvas to container with DPR
        let Some(parent) = canvas.parent_element() else {
            return false;
        };
        let w = f64::from(parent.client_width());
        let h = f64::from(parent.client_height());
        if w <= 0.0 || h <= 0.0 {
            return false;
        }
        let dpr = device_pixel_ratio();
        let pw = (w * dpr).round().max(1.0) as u32;
        let ph = (h * dpr).round().max(1.0) as u32;
        if canvas.width() != pw || canvas.height() != ph {
            canvas.set_width(pw);
            canvas.set_height(ph);
            // Canvas resize resets 2D context state
            *cached_ctx.borrow_mut() = None;
        }
        if viewport.with_untracked(|vp| vp.width != w || vp.height != h) {
            viewport.update(|vp| vp.resize(w, h));
        }

        let ctx = {
            let mut ctx_cache = cached_ctx.borrow_mut();
            if ctx_cache.is_none() {
                let Some(ctx) = canvas
                    .get_context("2d")
                    .ok()
                    .flatten()
                    .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
                else {
                    return false;
                };
                *ctx_cache = Some(ctx);
            }
            let Some(ctx) = ctx_cache.clone() else {
                return false;
            };
            ctx
        };
        ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0).ok();

        let now = js_sys::Date::now();
        let (vp, animating) = displayed_viewport(&map, now);

        ctx.set_fill_style_str(MAP_BACKGROUND);
        ctx.fill_rect(0.0, 0.0, w, h);

        let max_native = tiles.borrow().source().max_native_zoom;
        let keys = visible_tiles(vp.center, vp.zoom, w, h, max_native);
        request_tiles(&tiles, &keys, &on_tile_loaded);
        draw_tiles(&ctx, &vp, &tiles.borrow(), &keys);

        let icon = icon.borrow();
        let selected_name = selected.get_untracked();
        let open_popup = popup.get_untracked();
        let mut popup_anchor = None;
        cities.with_value(|registry| {
            markers.with_value(|markers| {
                for (city, anchor) in marker_anchors(&vp, registry.all(), markers) {
                    let is_selected = selected_name.as_deref() == Some(city.name.as_str());
                    draw_marker(&ctx, icon.as_ref(), anchor, &style_render, is_selected);
                    if open_popup.as_deref() == Some(city.name.as_str()) {
                        popup_anchor = Some(popup_tip(anchor.0, anchor.1, &style_render));
                    }
                }
            });
        });

        if let Some(el) = popup_ref.get_untracked() {
            let style = web_sys::HtmlElement::style(&el);
            match popup_anchor {
                Some((x, y)) => {
                    style.set_property("left", &format!("{x:.1}px")).ok();
                    style.set_property("top", &format!("{y:.1}px")).ok();
                    style.set_property("display", "block").ok();
                }
                None => {
                    style.set_property("display", "none").ok();
                }
            }
        }

        animating
    }));

    let sched_state = scheduler.clone();
    Effect::new(move || {
        viewport.track();
        transition.track();
        selected.track();
        popup.track();
        tile_revision.track();
        icon_revision.track();
        layout_revision.track();
        sched_state.mark_dirty();
    });

    Effect::new(move || {
        use wasm_bindgen::prelude::*;

        let Some(window) = web_sys::window() else {
            return;
        };
        remove_resize_binding();
        let handler = Closure::<dyn Fn()>::new(move || {
            layout_revision.update(|r| *r = r.wrapping_add(1));
        });
        if window
            .add_event_listener_with_callback("resize", handler.as_ref().unchecked_ref())
            .is_ok()
        {
            RESIZE_BINDING.with(|slot| {
                *slot.borrow_mut() = Some(ResizeBinding {
                    window: window.clone(),
                    _handler: handler,
                });
            });
        }
    });

    // --- Input handlers ---

    // Any direct manipulation lands a running fly-to on its target first.
    let settle = move || {
        if transition.with_untracked(Option::is_some) {
            transition.set(None);
        }
    };

    let on_wheel = move |e: WheelEvent| {
        e.prevent_default();
        settle();
        let (x, y) = local_point(
            canvas_ref.get_untracked(),
            f64::from(e.client_x()),
            f64::from(e.client_y()),
        );
        viewport.update(|vp| vp.zoom_at(e.delta_y(), x, y));
    };

    let on_pointer_down = {
        let drag = drag.clone();
        move |e: PointerEvent| {
            settle();
            drag.begin((f64::from(e.client_x()), f64::from(e.client_y())));

            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let drag = drag.clone();
        let style = marker_style.clone();
        move |e: PointerEvent| {
            let pos = (f64::from(e.client_x()), f64::from(e.client_y()));
            if let Some((dx, dy)) = drag.step(pos) {
                viewport.update(|vp| vp.pan(dx, dy));
                return;
            }

            let canvas = canvas_ref.get_untracked();
            let (x, y) = local_point(canvas.clone(), pos.0, pos.1);
            let (vp, _) = displayed_viewport(&map, js_sys::Date::now());
            let over_marker = cities.with_value(|registry| {
                markers.with_value(|markers| {
                    let anchors: Vec<(f64, f64)> = marker_anchors(&vp, registry.all(), markers)
                        .into_iter()
                        .map(|(_, anchor)| anchor)
                        .collect();
                    hit_test(&anchors, x, y, &style).is_some()
                })
            });
            if let Some(el) = canvas {
                let cursor = if over_marker { "pointer" } else { "grab" };
                web_sys::HtmlElement::style(&el).set_property("cursor", cursor).ok();
            }
        }
    };

    let end_drag = {
        let drag = drag.clone();
        move |e: PointerEvent| {
            drag.end();
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_click = {
        let drag = drag.clone();
        let style = marker_style.clone();
        move |e: MouseEvent| {
            let pos = (f64::from(e.client_x()), f64::from(e.client_y()));
            if !drag.is_click(pos) {
                return;
            }
            let (x, y) = local_point(canvas_ref.get_untracked(), pos.0, pos.1);
            let (vp, _) = displayed_viewport(&map, js_sys::Date::now());
            let hit = cities.with_value(|registry| {
                markers.with_value(|markers| {
                    let anchors = marker_anchors(&vp, registry.all(), markers);
                    let points: Vec<(f64, f64)> =
                        anchors.iter().map(|(_, anchor)| *anchor).collect();
                    hit_test(&points, x, y, &style).map(|i| anchors[i].0.name.clone())
                })
            });
            match hit {
                Some(name) => selection.select_by_name(&name),
                None => {
                    if popup.with_untracked(Option::is_some) {
                        popup.set(None);
                    }
                }
            }
        }
    };

    let on_touch_start = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                settle();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = f64::from(t1.client_x() - t0.client_x());
                let dy = f64::from(t1.client_y() - t0.client_y());
                pinch_dist.set((dx * dx + dy * dy).sqrt());
            }
        }
    };

    let on_touch_move = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = f64::from(t1.client_x() - t0.client_x());
                let dy = f64::from(t1.client_y() - t0.client_y());
                let new_dist = (dx * dx + dy * dy).sqrt();
                let old_dist = pinch_dist.get();

                if old_dist > 0.0 {
                    let mid = (
                        f64::from(t0.client_x() + t1.client_x()) / 2.0,
                        f64::from(t0.client_y() + t1.client_y()) / 2.0,
                    );
                    let (x, y) = local_point(canvas_ref.get_untracked(), mid.0, mid.1);
                    let delta = -(new_dist - old_dist) * 2.0;
                    viewport.update(|vp| vp.zoom_at(delta, x, y));
                }

                pinch_dist.set(new_dist);
            }
        }
    };

    let popup_body = move || {
        let name = popup.get()?;
        let city = cities.with_value(|registry| registry.get(&name).cloned())?;
        Some(view! {
            <strong>{city.name}</strong>
            <br />
            {format!("Suspects: {}", city.count)}
        })
    };

    view! {
        <div class="map-surface">
            <div
                class="map-input"
                on:wheel=on_wheel
                on:pointerdown=on_pointer_down
                on:pointermove=on_pointer_move
                on:pointerup=end_drag.clone()
                on:pointercancel=end_drag.clone()
                on:pointerleave=end_drag
                on:click=on_click
                on:touchstart=on_touch_start
                on:touchmove=on_touch_move
            >
                <canvas node_ref=canvas_ref class="map-canvas" />
            </div>
            <div node_ref=popup_ref class="map-popup" style="display: none;">
                <button
                    class="map-popup-close"
                    type="button"
                    aria-label="Close popup"
                    on:click=move |_| popup.set(None)
                >
                    "\u{d7}"
                </button>
                <div class="map-popup-content">{popup_body}</div>
            </div>
            <div class="map-attribution">{attribution}</div>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suspect_map_shared::{CityRegistry, LatLng, MapView};

    #[test]
    fn only_mounted_markers_have_anchors() {
        let registry = CityRegistry::builtin();
        let mut vp = Viewport::new(MapView::new(LatLng::new(20.5937, 78.9629), 5.0), 3.0, 18.0);
        vp.resize(800.0, 600.0);

        let mut markers = MarkerRegistry::default();
        assert!(marker_anchors(&vp, registry.all(), &markers).is_empty());

        markers.mount_all(&registry);
        let anchors = marker_anchors(&vp, registry.all(), &markers);
        assert_eq!(anchors.len(), registry.len());
        let (first, (sx, sy)) = anchors[0];
        assert_eq!(first.name, "Delhi");
        assert_eq!((sx, sy), vp.world_to_screen(first.position()));
    }

    #[test]
    fn clicking_a_marker_anchor_hits_its_city() {
        let registry = CityRegistry::builtin();
        let mut vp = Viewport::new(MapView::new(LatLng::new(19.076, 72.8777), 10.0), 3.0, 18.0);
        vp.resize(800.0, 600.0);
        let mut markers = MarkerRegistry::default();
        markers.mount_all(&registry);
        let style = MarkerStyle::default();

        let anchors = marker_anchors(&vp, registry.all(), &markers);
        let points: Vec<(f64, f64)> = anchors.iter().map(|(_, a)| *a).collect();
        // Mumbai is centered; click just above its anchor.
        let hit = hit_test(&points, 400.0, 290.0, &style).map(|i| anchors[i].0.name.as_str());
        assert_eq!(hit, Some("Mumbai"));
        assert_eq!(hit_test(&points, 10.0, 10.0, &style), None);
    }

    #[test]
    fn cancelled_drag_stops_panning() {
        let drag = DragGesture::default();
        assert_eq!(drag.step((10.0, 10.0)), None);

        drag.begin((100.0, 100.0));
        assert_eq!(drag.step((130.0, 90.0)), Some((30.0, -10.0)));

        // pointercancel / pointerleave with the button still held
        drag.end();
        assert_eq!(drag.step((200.0, 200.0)), None);
        assert_eq!(drag.step((250.0, 180.0)), None);

        drag.begin((250.0, 180.0));
        assert_eq!(drag.step((252.0, 181.0)), Some((2.0, 1.0)));
    }

    #[test]
    fn short_press_counts_as_click() {
        let drag = DragGesture::default();
        drag.begin((100.0, 100.0));
        assert!(drag.is_click((103.0, 98.0)));
        assert!(!drag.is_click((100.0, 100.0 + CLICK_SLOP_PX)));
    }
}
