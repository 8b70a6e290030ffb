use crate::geo::{LatLng, TILE_SIZE, project};

/// Address of one XYZ raster tile. `x` is kept unwrapped so tiles left and
/// right of the antimeridian keep distinct screen positions; use
/// [`TileKey::wrapped_x`] when building a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub z: u8,
    pub x: i64,
    pub y: i64,
}

impl TileKey {
    pub const fn new(z: u8, x: i64, y: i64) -> Self {
        Self { z, x, y }
    }

    pub fn wrapped_x(&self) -> i64 {
        self.x.rem_euclid(1_i64 << self.z)
    }
}

/// Integer tile zoom used to render a fractional map zoom.
pub fn tile_zoom(zoom: f64, max_native_zoom: u8) -> u8 {
    zoom.round().clamp(0.0, f64::from(max_native_zoom)) as u8
}

/// Tiles covering a `width` x `height` viewport centered on `center`,
/// nearest to the center first.
pub fn visible_tiles(
    center: LatLng,
    zoom: f64,
    width: f64,
    height: f64,
    max_native_zoom: u8,
) -> Vec<TileKey> {
    if width <= 0.0 || height <= 0.0 {
        return Vec::new();
    }
    let z = tile_zoom(zoom, max_native_zoom);
    let scale = (zoom - f64::from(z)).exp2();
    let (cx, cy) = project(center, f64::from(z));

    let half_w = width / 2.0 / scale;
    let half_h = height / 2.0 / scale;
    let min_x = ((cx - half_w) / TILE_SIZE).floor() as i64;
    let max_x = ((cx + half_w) / TILE_SIZE).floor() as i64;
    let rows = 1_i64 << z;
    let min_y = (((cy - half_h) / TILE_SIZE).floor() as i64).max(0);
    let max_y = (((cy + half_h) / TILE_SIZE).floor() as i64).min(rows - 1);

    let mut keys = Vec::new();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            keys.push(TileKey::new(z, x, y));
        }
    }

    let distance_sq = |key: &TileKey| {
        let dx = (key.x as f64 + 0.5) * TILE_SIZE - cx;
        let dy = (key.y as f64 + 0.5) * TILE_SIZE - cy;
        dx * dx + dy * dy
    };
    keys.sort_by(|a, b| distance_sq(a).total_cmp(&distance_sq(b)).then_with(|| a.cmp(b)));
    keys
}

/// Expand an XYZ URL template (`{s}`, `{z}`, `{x}`, `{y}`).
pub fn tile_url(template: &str, subdomains: &[String], key: TileKey) -> String {
    let x = key.wrapped_x();
    let mut url = template
        .replace("{z}", &key.z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &key.y.to_string());
    if !subdomains.is_empty() {
        let index = (x + key.y).unsigned_abs() as usize % subdomains.len();
        url = url.replace("{s}", &subdomains[index]);
    }
    url
}
