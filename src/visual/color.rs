//! Chart color handling.
//!
//! A color is an RGB triple with a transparency, plus two special states:
//! *clear* (explicitly no color, rendered as `none`) and *undefined* (not
//! set yet, so a default will be derived later). Colors are parsed from the
//! script with the `csscolorparser` crate, which covers the 147 named CSS
//! colors as well as `#rrggbb` syntax.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Undef,
    Clear,
    Rgb,
}

/// An RGB color with transparency and clear/undefined states.
///
/// Channel values are kept in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    state: State,
    r: f64,
    g: f64,
    b: f64,
    transparency: f64,
}

impl Default for Color {
    fn default() -> Self {
        Self::undef()
    }
}

impl Color {
    /// A color that has not been assigned yet.
    pub fn undef() -> Self {
        Self { state: State::Undef, r: 0.0, g: 0.0, b: 0.0, transparency: 0.0 }
    }

    /// An explicit non-color (`None` in the script, `none` in SVG).
    pub fn clear() -> Self {
        Self { state: State::Clear, r: 0.0, g: 0.0, b: 0.0, transparency: 0.0 }
    }

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self {
            state: State::Rgb,
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            transparency: 0.0,
        }
    }

    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }

    pub fn white() -> Self {
        Self::rgb(1.0, 1.0, 1.0)
    }

    /// Parse a named CSS color or `#rrggbb`; `None` yields the clear color.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "None" {
            return Some(Self::clear());
        }
        let c = csscolorparser::parse(s).ok()?;
        Some(Self::rgb(c.r as f64, c.g as f64, c.b as f64))
    }

    pub fn is_defined(&self) -> bool {
        self.state != State::Undef
    }

    pub fn is_clear(&self) -> bool {
        self.state != State::Rgb
    }

    pub fn set(&mut self, other: &Color) -> &mut Self {
        *self = *other;
        self
    }

    pub fn set_undef(&mut self) -> &mut Self {
        *self = Self::undef();
        self
    }

    pub fn set_clear(&mut self) -> &mut Self {
        *self = Self::clear();
        self
    }

    /// Linear blend: `bg + (fg - bg) * frac`, used to derive a color that
    /// stands slightly out against a background.
    pub fn set_against(&mut self, bg: &Color, fg: &Color, frac: f64) -> &mut Self {
        if bg.state == State::Rgb && fg.state == State::Rgb {
            *self = Self::rgb(
                bg.r + (fg.r - bg.r) * frac,
                bg.g + (fg.g - bg.g) * frac,
                bg.b + (fg.b - bg.b) * frac,
            );
        } else {
            *self = *bg;
        }
        self
    }

    /// Interpolate toward white for `t > 0` and toward black for `t < 0`.
    ///
    /// `lighten(0)` is the identity.
    pub fn lighten(&mut self, t: f64) -> &mut Self {
        if self.state == State::Rgb {
            let t = t.clamp(-1.0, 1.0);
            if t >= 0.0 {
                self.r += (1.0 - self.r) * t;
                self.g += (1.0 - self.g) * t;
                self.b += (1.0 - self.b) * t;
            } else {
                self.r *= 1.0 + t;
                self.g *= 1.0 + t;
                self.b *= 1.0 + t;
            }
        }
        self
    }

    pub fn darken(&mut self, t: f64) -> &mut Self {
        self.lighten(-t)
    }

    pub fn transparency(&self) -> f64 {
        self.transparency
    }

    pub fn set_transparency(&mut self, t: f64) -> &mut Self {
        self.transparency = t.clamp(0.0, 1.0);
        self
    }

    pub fn opacity(&self) -> f64 {
        1.0 - self.transparency
    }

    pub fn set_opacity(&mut self, o: f64) -> &mut Self {
        self.set_transparency(1.0 - o)
    }

    /// Perceptual distance in [0, 1] between two colors, used to decide
    /// whether a color is visible against a background. Undefined or clear
    /// colors are maximally distant from real colors.
    pub fn diff(a: &Color, b: &Color) -> f64 {
        if a.state != State::Rgb || b.state != State::Rgb {
            return if a.state == b.state { 0.0 } else { 1.0 };
        }
        let dr = a.r - b.r;
        let dg = a.g - b.g;
        let db = a.b - b.b;
        (0.299 * dr * dr + 0.587 * dg * dg + 0.114 * db * db).sqrt()
    }

    /// SVG attribute rendering: `#rrggbb` or `none`.
    pub fn svg(&self) -> String {
        if self.is_clear() {
            "none".to_string()
        } else {
            format!(
                "#{:02x}{:02x}{:02x}",
                (self.r * 255.0).round() as u8,
                (self.g * 255.0).round() as u8,
                (self.b * 255.0).round() as u8
            )
        }
    }
}

/// Force `color` to be visible against `bg_color`.
///
/// A clear or too-similar color snaps to black or white, whichever is the
/// more distant from the background.
pub fn make_color_visible(color: &mut Color, bg_color: &Color, min_visibility: f64) {
    if bg_color.is_clear() {
        return;
    }
    if color.is_clear() || Color::diff(color, bg_color) < min_visibility {
        let b_diff = Color::diff(&Color::black(), bg_color);
        let w_diff = Color::diff(&Color::white(), bg_color);
        *color = if b_diff > w_diff { Color::black() } else { Color::white() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lighten_zero_is_identity() {
        let mut c = Color::rgb(0.3, 0.5, 0.7);
        let orig = c;
        c.lighten(0.0);
        assert_eq!(c, orig);
    }

    #[test]
    fn set_against_self_is_identity() {
        let c = Color::rgb(0.2, 0.4, 0.9);
        for t in [0.0, 0.3, 1.0] {
            let mut out = Color::undef();
            out.set_against(&c, &c, t);
            assert!(Color::diff(&out, &c) < 1e-9);
        }
    }

    #[test]
    fn named_and_hex_colors_parse() {
        assert_eq!(Color::parse("tomato").unwrap().svg(), "#ff6347");
        assert_eq!(Color::parse("#1a2b3c").unwrap().svg(), "#1a2b3c");
        assert!(Color::parse("None").unwrap().is_clear());
        assert!(Color::parse("no_such_color").is_none());
    }

    #[test]
    fn visibility_snaps_to_contrast() {
        let bg = Color::white();
        let mut c = Color::rgb(0.98, 0.98, 0.98);
        make_color_visible(&mut c, &bg, 0.3);
        assert_eq!(c, Color::black());
    }
}
