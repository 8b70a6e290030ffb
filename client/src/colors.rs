/// Fallback pin body color (r, g, b).
pub const PIN_FILL: (u8, u8, u8) = (220, 53, 69);
/// Pin color for the focused city.
pub const PIN_FILL_SELECTED: (u8, u8, u8) = (245, 158, 11);
pub const MAP_BACKGROUND: &str = "#dde3e8";

/// Format RGBA as a CSS color string.
pub fn rgba_css(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({r},{g},{b},{a})")
}

#[cfg(test)]
mod tests {
    use super::rgba_css;

    #[test]
    fn formats_css_rgba() {
        assert_eq!(rgba_css(220, 53, 69, 0.9), "rgba(220,53,69,0.9)");
        assert_eq!(rgba_css(0, 0, 0, 1.0), "rgba(0,0,0,1)");
    }
}
