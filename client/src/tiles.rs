use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use js_sys::Reflect;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_sys::HtmlImageElement;

use suspect_map_shared::TileSource;
use suspect_map_shared::TileKey;
use suspect_map_shared::tiles::tile_url;

const MAX_CONCURRENCY: usize = 6;
const MAX_CACHED_TILES: usize = 256;
/// Loads tried per tile while it stays on screen.
const MAX_TILE_ATTEMPTS: u8 = 3;
const ONLOAD_HANDLE_KEY: &str = "__suspectMapTileOnload";
const ONERROR_HANDLE_KEY: &str = "__suspectMapTileOnerror";

static TILE_WARNED: AtomicBool = AtomicBool::new(false);

pub type TileCallback = Rc<dyn Fn()>;
pub type SharedTileLayer = Rc<RefCell<TileLayer>>;

enum TileState {
    Queued,
    Loading,
    Ready(HtmlImageElement),
    Failed,
}

/// Raster tile cache with a bounded, center-first load queue.
pub struct TileLayer {
    source: TileSource,
    tiles: HashMap<TileKey, TileState>,
    queue: VecDeque<TileKey>,
    in_flight: usize,
    failures: HashMap<TileKey, u8>,
}

impl TileLayer {
    pub fn new(source: TileSource) -> Self {
        Self {
            source,
            tiles: HashMap::new(),
            queue: VecDeque::new(),
            in_flight: 0,
            failures: HashMap::new(),
        }
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn image(&self, key: &TileKey) -> Option<&HtmlImageElement> {
        match self.tiles.get(key) {
            Some(TileState::Ready(image)) => Some(image),
            _ => None,
        }
    }

    /// Replace the pending queue with the not-yet-requested tiles in
    /// `wanted`, keeping its order. Failed tiles still in view are retried
    /// up to `MAX_TILE_ATTEMPTS` times; once out of view they are forgotten.
    fn requeue(&mut self, wanted: &[TileKey]) {
        for key in self.queue.drain(..) {
            if matches!(self.tiles.get(&key), Some(TileState::Queued)) {
                self.tiles.remove(&key);
            }
        }

        let keep: HashSet<TileKey> = wanted.iter().copied().collect();
        self.tiles
            .retain(|key, state| !matches!(state, TileState::Failed) || keep.contains(key));
        self.failures.retain(|key, _| keep.contains(key));

        for &key in wanted {
            let retry = match self.tiles.get(&key) {
                None => true,
                Some(TileState::Failed) => {
                    self.failures.get(&key).copied().unwrap_or(0) < MAX_TILE_ATTEMPTS
                }
                Some(_) => false,
            };
            if retry {
                self.tiles.insert(key, TileState::Queued);
                self.queue.push_back(key);
            }
        }

        if self.tiles.len() > MAX_CACHED_TILES {
            self.tiles.retain(|key, state| {
                keep.contains(key) || matches!(state, TileState::Loading)
            });
        }
    }

    fn record_result(&mut self, key: TileKey, image: Option<HtmlImageElement>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let next = match image {
            Some(image) => {
                self.failures.remove(&key);
                TileState::Ready(image)
            }
            None => {
                *self.failures.entry(key).or_insert(0) += 1;
                TileState::Failed
            }
        };
        self.tiles.insert(key, next);
    }
}

/// Make sure every tile in `wanted` is cached or on its way. `on_loaded`
/// runs each time a new image becomes drawable.
pub fn request_tiles(layer: &SharedTileLayer, wanted: &[TileKey], on_loaded: &TileCallback) {
    layer.borrow_mut().requeue(wanted);
    pump_queue(layer, on_loaded);
}

fn pump_queue(layer: &SharedTileLayer, on_loaded: &TileCallback) {
    loop {
        let (key, src) = {
            let mut state = layer.borrow_mut();
            if state.in_flight >= MAX_CONCURRENCY {
                break;
            }
            let Some(key) = state.queue.pop_front() else {
                break;
            };
            state.in_flight += 1;
            state.tiles.insert(key, TileState::Loading);
            let src = tile_url(&state.source.url_template, &state.source.subdomains, key);
            (key, src)
        };
        load_tile(layer.clone(), key, &src, on_loaded.clone());
    }
}

fn finish_tile(
    layer: &SharedTileLayer,
    key: TileKey,
    image: Option<HtmlImageElement>,
    on_loaded: &TileCallback,
) {
    let loaded = image.is_some();
    layer.borrow_mut().record_result(key, image);
    if !loaded {
        warn_tile_once(key);
    }
    pump_queue(layer, on_loaded);
    if loaded {
        on_loaded();
    }
}

fn load_tile(layer: SharedTileLayer, key: TileKey, src: &str, on_loaded: TileCallback) {
    let img = match HtmlImageElement::new() {
        Ok(img) => img,
        Err(_) => {
            finish_tile(&layer, key, None, &on_loaded);
            return;
        }
    };

    let img_for_load = img.clone();
    let layer_load = layer.clone();
    let on_loaded_load = on_loaded.clone();
    let onload = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_load);
        finish_tile(
            &layer_load,
            key,
            Some(img_for_load.clone()),
            &on_loaded_load,
        );
    });

    let img_for_error = img.clone();
    let onerror = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_error);
        finish_tile(&layer, key, None, &on_loaded);
    });

    // The JS handles are parked on the element so they live exactly as long
    // as the request.
    let onload_js = onload.into_js_value();
    let onerror_js = onerror.into_js_value();
    img.set_onload(Some(onload_js.unchecked_ref()));
    img.set_onerror(Some(onerror_js.unchecked_ref()));
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONLOAD_HANDLE_KEY),
        &onload_js,
    );
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONERROR_HANDLE_KEY),
        &onerror_js,
    );
    img.set_src(src);
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}

fn warn_tile_once(key: TileKey) {
    if TILE_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        web_sys::console::warn_1(
            &format!("tile load failed z={} x={} y={}", key.z, key.wrapped_x(), key.y).into(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(layer: &TileLayer) -> Vec<TileKey> {
        layer.queue.iter().copied().collect()
    }

    #[test]
    fn failed_visible_tile_is_queued_again() {
        let key = TileKey::new(5, 22, 13);
        let mut layer = TileLayer::new(TileSource::default());
        layer.tiles.insert(key, TileState::Failed);

        for _ in 0..3 {
            layer.requeue(&[key]);
            assert_eq!(queued(&layer), vec![key]);
        }
    }

    #[test]
    fn retries_stop_after_repeated_failures() {
        let key = TileKey::new(5, 22, 13);
        let mut layer = TileLayer::new(TileSource::default());
        for _ in 0..MAX_TILE_ATTEMPTS {
            layer.requeue(&[key]);
            assert_eq!(layer.queue.pop_front(), Some(key));
            layer.tiles.insert(key, TileState::Loading);
            layer.in_flight += 1;
            layer.record_result(key, None);
        }

        layer.requeue(&[key]);
        assert!(queued(&layer).is_empty());
        assert_eq!(layer.in_flight, 0);
    }

    #[test]
    fn failed_tile_gets_fresh_attempts_after_leaving_view() {
        let key = TileKey::new(5, 22, 13);
        let other = TileKey::new(5, 0, 0);
        let mut layer = TileLayer::new(TileSource::default());
        layer.tiles.insert(key, TileState::Failed);
        layer.failures.insert(key, MAX_TILE_ATTEMPTS);

        layer.requeue(&[key]);
        assert!(queued(&layer).is_empty());

        layer.requeue(&[other]);
        assert!(!layer.tiles.contains_key(&key));
        assert!(!layer.failures.contains_key(&key));

        layer.requeue(&[key]);
        assert!(queued(&layer).contains(&key));
    }
}
