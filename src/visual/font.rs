//! Monospace font metrics.
//!
//! All text is laid out against a mono-width font model: a character cell is
//! a fixed fraction of the font size. Three multiplicative adjustment
//! factors (width, height, baseline) let scripts with wide glyphs (CJK)
//! reserve more room; groups whose text is known to be plain-width reset
//! the factors to 1.

/// Width of one character cell as a fraction of the font size.
const CHAR_WIDTH_RATIO: f64 = 0.6;

/// Descender depth below the anchor as a fraction of the font size.
const BASELINE_RATIO: f64 = 0.2;

/// Partial font specification attached to a scene group.
///
/// Unset fields inherit from the enclosing groups during attribute collect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontSpec {
    pub size: Option<f64>,
    pub bold: Option<bool>,
    pub family: Option<String>,
    pub width_factor: Option<f64>,
    pub height_factor: Option<f64>,
    pub baseline_factor: Option<f64>,
}

impl FontSpec {
    pub fn set_size(&mut self, size: f64) -> &mut Self {
        self.size = Some(size);
        self
    }

    pub fn set_bold(&mut self) -> &mut Self {
        self.bold = Some(true);
        self
    }

    pub fn set_family(&mut self, family: &str) -> &mut Self {
        self.family = Some(family.to_string());
        self
    }

    pub fn set_width_factor(&mut self, f: f64) -> &mut Self {
        self.width_factor = Some(f);
        self
    }

    pub fn set_height_factor(&mut self, f: f64) -> &mut Self {
        self.height_factor = Some(f);
        self
    }

    pub fn set_baseline_factor(&mut self, f: f64) -> &mut Self {
        self.baseline_factor = Some(f);
        self
    }

    /// Overlay `self` on top of an inherited font.
    pub fn apply_to(&self, font: &mut Font) {
        if let Some(size) = self.size {
            font.size = size;
        }
        if let Some(bold) = self.bold {
            font.bold = bold;
        }
        if let Some(family) = &self.family {
            font.family = family.clone();
        }
        if let Some(f) = self.width_factor {
            font.width_factor = f;
        }
        if let Some(f) = self.height_factor {
            font.height_factor = f;
        }
        if let Some(f) = self.baseline_factor {
            font.baseline_factor = f;
        }
    }
}

/// Fully resolved font, as seen by a text object after attribute collect.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub size: f64,
    pub bold: bool,
    pub family: String,
    pub width_factor: f64,
    pub height_factor: f64,
    pub baseline_factor: f64,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            size: 16.0,
            bold: false,
            family: "monospace".to_string(),
            width_factor: 1.0,
            height_factor: 1.0,
            baseline_factor: 1.0,
        }
    }
}

impl Font {
    /// Width of one character cell.
    pub fn char_width(&self) -> f64 {
        CHAR_WIDTH_RATIO * self.size * self.width_factor
    }

    /// Height of one line.
    pub fn height(&self) -> f64 {
        self.size * self.height_factor
    }

    /// Descender depth below the text anchor point.
    pub fn baseline(&self) -> f64 {
        BASELINE_RATIO * self.size * self.baseline_factor
    }

    /// Width of a single-line string under the mono-width assumption.
    pub fn text_width(&self, s: &str) -> f64 {
        self.char_width() * s.chars().count() as f64
    }
}

/// Detect if the given string most likely contains only normal width UTF-8
/// characters, i.e. no 3- or 4-byte sequences.
pub fn normal_width_utf8(s: &str) -> bool {
    s.bytes().all(|b| b < 0xE0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_detection() {
        assert!(normal_width_utf8("plain ASCII and åäö"));
        assert!(!normal_width_utf8("日本語"));
    }

    #[test]
    fn overlay_inherits_unset_fields() {
        let mut font = Font::default();
        let mut spec = FontSpec::default();
        spec.set_size(24.0);
        spec.apply_to(&mut font);
        assert_eq!(font.size, 24.0);
        assert_eq!(font.width_factor, 1.0);
    }
}
