//! Token-level scanning primitives on top of the segmented source.
//!
//! Every scanner remembers a reference column (`ref_idx`) so error messages
//! can underline the offending token. Numbers are scanned as a maximal
//! digit/sign/exponent prefix, which rejects `inf`/`nan` spellings outright.

use crate::error::Result;
use crate::value::{NUM_HI, NUM_INVALID, NUM_SKIP};
use crate::visual::color::Color;

use super::{is_ident, is_lf, is_sep, is_ws, Source};

impl Source {
    /// Whitespace followed by EOL is fine; anything else is garbage.
    pub fn expect_eol(&mut self) -> Result<()> {
        self.skip_ws(false)?;
        if !self.at_eol() {
            return Err(self.parse_err("garbage at EOL", false));
        }
        Ok(())
    }

    /// Require at least one whitespace character before the next token.
    pub fn expect_ws(&mut self, err_msg_if_eol: &str) -> Result<()> {
        let old_idx = self.cur.loc.char_idx;
        self.skip_ws(false)?;
        if self.cur.loc.char_idx > old_idx && !self.at_eol() {
            return Ok(());
        }
        if self.at_eol() && !err_msg_if_eol.is_empty() {
            return Err(self.parse_err(err_msg_if_eol, false));
        }
        if self.cur.loc.char_idx == old_idx {
            return Err(self.parse_err("whitespace expected", false));
        }
        Ok(())
    }

    /// Scan `KEY:` at the start of a line; returns the key text.
    pub fn get_key(&mut self) -> Result<String> {
        if !self.at_sol() {
            return Err(self.parse_err("KEY must be unindented", false));
        }
        self.ref_idx = self.cur.loc.char_idx;
        let start = self.cur.loc.char_idx;
        while {
            let c = self.cur_char();
            c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || c == b'@'
        } {
            self.cur.loc.char_idx += 1;
        }
        if self.cur.loc.char_idx == start {
            return Err(self.parse_err("KEY expected", true));
        }
        let key = String::from_utf8_lossy(&self.buf()[start..self.cur.loc.char_idx]).to_string();
        self.skip_ws(false)?;
        if self.cur_char() != b':' {
            return Err(self.parse_err("':' expected", false));
        }
        self.cur.loc.char_idx += 1;
        Ok(key)
    }

    /// Scan an identifier (letters, digits, underscore). May be empty.
    pub fn get_identifier(&mut self) -> String {
        self.ref_idx = self.cur.loc.char_idx;
        let start = self.cur.loc.char_idx;
        while is_ident(self.cur_char()) {
            self.cur.loc.char_idx += 1;
        }
        String::from_utf8_lossy(&self.buf()[start..self.cur.loc.char_idx]).to_string()
    }

    fn scan_int_prefix(&self) -> Option<(i64, usize)> {
        let buf = self.buf();
        let mut p = self.cur.loc.char_idx;
        if p < buf.len() && (buf[p] == b'+' || buf[p] == b'-') {
            p += 1;
        }
        let digits_start = p;
        while p < buf.len() && buf[p].is_ascii_digit() {
            p += 1;
        }
        if p == digits_start {
            return None;
        }
        let s = std::str::from_utf8(&buf[self.cur.loc.char_idx..p]).ok()?;
        let v: i64 = s.parse().ok()?;
        Some((v, p))
    }

    /// Scan an integer; `sep_after` requires a separator right after it.
    pub fn get_int64(&mut self, sep_after: bool) -> Option<i64> {
        self.ref_idx = self.cur.loc.char_idx;
        let (v, end) = self.scan_int_prefix()?;
        if sep_after {
            let c = if end < self.buf().len() { self.buf()[end] } else { b'\n' };
            if !is_sep(c) {
                return None;
            }
        }
        self.cur.loc.char_idx = end;
        Some(v)
    }

    fn scan_float_prefix(&self) -> Option<(f64, usize)> {
        let buf = self.buf();
        let start = self.cur.loc.char_idx;
        let mut p = start;
        if p < buf.len() && (buf[p] == b'+' || buf[p] == b'-') {
            p += 1;
        }
        let mut digits = 0;
        while p < buf.len() && buf[p].is_ascii_digit() {
            p += 1;
            digits += 1;
        }
        if p < buf.len() && buf[p] == b'.' {
            p += 1;
            while p < buf.len() && buf[p].is_ascii_digit() {
                p += 1;
                digits += 1;
            }
        }
        if digits == 0 {
            return None;
        }
        if p < buf.len() && (buf[p] == b'e' || buf[p] == b'E') {
            let mut q = p + 1;
            if q < buf.len() && (buf[q] == b'+' || buf[q] == b'-') {
                q += 1;
            }
            let exp_start = q;
            while q < buf.len() && buf[q].is_ascii_digit() {
                q += 1;
            }
            if q > exp_start {
                p = q;
            }
        }
        let s = std::str::from_utf8(&buf[start..p]).ok()?;
        let v: f64 = s.parse().ok()?;
        Some((v, p))
    }

    /// Full-control double scanner.
    ///
    /// With `none_allowed`, a lone `!` maps to the invalid sentinel and a
    /// lone `-` to the skip sentinel. With `fail_on_error` a malformed
    /// number is a parse error instead of a `None` return.
    pub fn get_double_full(
        &mut self,
        none_allowed: bool,
        sep_after: bool,
        fail_on_error: bool,
    ) -> Result<Option<f64>> {
        self.ref_idx = self.cur.loc.char_idx;
        let c = self.cur_char();
        if none_allowed && (c == b'!' || c == b'-') && is_sep(self.peek_char(1)) {
            self.cur.loc.char_idx += 1;
            return Ok(Some(if c == b'!' { NUM_INVALID } else { NUM_SKIP }));
        }
        let scanned = self.scan_float_prefix().and_then(|(v, end)| {
            if sep_after {
                let c = if end < self.buf().len() { self.buf()[end] } else { b'\n' };
                if !is_sep(c) {
                    return None;
                }
            }
            Some((v, end))
        });
        match scanned {
            Some((v, end)) => {
                if !v.is_finite() || v.abs() > NUM_HI {
                    return Err(self.parse_err("number too big", true));
                }
                self.cur.loc.char_idx = end;
                Ok(Some(v))
            }
            None => {
                if fail_on_error {
                    Err(self.parse_err("invalid number", true))
                } else {
                    Ok(None)
                }
            }
        }
    }

    pub fn get_double(&mut self) -> Result<f64> {
        Ok(self.get_double_full(false, true, true)?.unwrap())
    }

    /// A number that may be immediately followed by more syntax (used for
    /// annotation coordinates like `5.0+12`).
    pub fn get_double_prefix(&mut self) -> Result<f64> {
        Ok(self.get_double_full(false, false, true)?.unwrap())
    }

    pub fn get_double_or_none(&mut self) -> Result<f64> {
        Ok(self.get_double_full(true, true, true)?.unwrap())
    }

    pub fn try_get_double_or_none(&mut self) -> Result<Option<f64>> {
        self.get_double_full(true, true, false)
    }

    /// Scan a category: a bare word, a `"quoted string"`, or `-` for empty.
    pub fn get_category(&mut self) -> Result<String> {
        Ok(self.get_category_quoted()?.0)
    }

    /// Like [`get_category`](Self::get_category), also reporting whether
    /// the category was quoted.
    pub fn get_category_quoted(&mut self) -> Result<(String, bool)> {
        self.ref_idx = self.cur.loc.char_idx;
        let buf = self.buf();
        let mut p = self.cur.loc.char_idx;
        let quoted = p < buf.len() && buf[p] == b'"';
        if quoted {
            p += 1;
        }
        let beg = p;
        while p < buf.len() && buf[p] != b'"' && !is_lf(buf[p]) && (quoted || !is_ws(buf[p])) {
            p += 1;
        }
        let mut len = p - beg;
        if quoted {
            if p >= buf.len() || buf[p] != b'"' {
                return Err(self.parse_err("unmatched quote", true));
            }
            p += 1;
        } else if len == 1 && buf[beg] == b'-' {
            len = 0;
        }
        let after = if p < buf.len() { buf[p] } else { b'\n' };
        if !is_sep(after) {
            return Err(self.parse_err("malformed category", true));
        }
        let cat = String::from_utf8_lossy(&buf[beg..beg + len]).to_string();
        self.cur.loc.char_idx = p;
        Ok((cat, quoted))
    }

    /// Scan a text value: the rest of the line, or, when the line is empty
    /// and `multi_line` is set, the following indented block with the
    /// common indentation removed.
    pub fn get_text(&mut self, multi_line: bool) -> Result<String> {
        let mut txt = String::new();
        self.skip_ws(false)?;
        while !self.at_eol() {
            txt.push(self.get_char() as char);
        }
        while txt.ends_with(' ') || txt.ends_with('\t') {
            txt.pop();
        }
        if !txt.is_empty() || !multi_line {
            return Ok(txt);
        }

        self.next_line()?;
        self.save_pos(0);
        let mut min_indent = 0usize;
        while !self.at_eof() {
            let mut i = 0;
            while self.at_ws() {
                self.cur.loc.char_idx += 1;
                i += 1;
            }
            if !self.at_eol() {
                if i == 0 {
                    break;
                }
                if min_indent == 0 || i < min_indent {
                    min_indent = i;
                }
            }
            self.next_line()?;
        }
        self.restore_pos(0)?;

        while !self.at_eof() {
            if !txt.is_empty() {
                txt.push('\n');
            }
            let mut i = 0;
            while self.at_ws() && i < min_indent {
                self.cur.loc.char_idx += 1;
                i += 1;
            }
            if i == 0 && !self.at_eol() {
                break;
            }
            while !self.at_eol() {
                txt.push(self.get_char() as char);
            }
            while txt.ends_with(' ') || txt.ends_with('\t') {
                txt.pop();
            }
            self.next_line()?;
        }

        while txt.ends_with(['\n', ' ', '\t']) {
            txt.pop();
        }
        Ok(txt)
    }

    /// Scan one datum row entry: the X field (unless `no_x`) and the
    /// `y_idx`-th Y field. Leaves the cursor right after the Y field.
    pub fn get_datum(&mut self, no_x: bool, y_idx: u32) -> Result<(String, String)> {
        let (x, y, advance) = {
            let buf = self.buf();
            let b = self.cur.loc.char_idx;
            let mut p = b;
            let at = |p: usize| if p < buf.len() { buf[p] } else { b'\n' };

            while is_ws(at(p)) {
                p += 1;
            }
            let x;
            if no_x {
                x = String::new();
            } else if at(p) == b'"' {
                p += 1;
                let q = p;
                while at(p) != b'"' && !is_lf(at(p)) {
                    p += 1;
                }
                x = String::from_utf8_lossy(&buf[q..p]).to_string();
                if at(p) == b'"' {
                    p += 1;
                }
            } else {
                let mut q = p;
                while !is_sep(at(p)) {
                    p += 1;
                }
                if p - q == 1 && buf[q] == b'-' {
                    q = p;
                }
                x = String::from_utf8_lossy(&buf[q..p]).to_string();
            }

            let mut remaining = i64::from(y_idx);
            let mut q;
            loop {
                while is_ws(at(p)) {
                    p += 1;
                }
                q = p;
                while !is_sep(at(p)) {
                    p += 1;
                }
                remaining -= 1;
                if remaining < 0 {
                    break;
                }
            }
            let y = String::from_utf8_lossy(&buf[q..p]).to_string();
            (x, y, p - b)
        };
        self.cur.loc.char_idx += advance;
        Ok((x, y))
    }

    /// Scan an On/Off (Yes/No) switch.
    pub fn get_switch(&mut self) -> Result<bool> {
        self.skip_ws(false)?;
        let id = self.get_identifier();
        match id.as_str() {
            "On" | "Yes" => Ok(true),
            "Off" | "No" => Ok(false),
            "" => Err(self.parse_err("On/Off (Yes/No) expected", false)),
            _ => Err(self.parse_err(
                &format!("On/Off (Yes/No) expected, saw '{id}'"),
                true,
            )),
        }
    }

    /// Scan a color with optional lighten and transparency suffixes.
    ///
    /// Returns the transparency when one was given.
    pub fn get_color_full(&mut self, color: &mut Color) -> Result<Option<f64>> {
        self.skip_ws(false)?;
        self.ref_idx = self.cur.loc.char_idx;
        let start = self.cur.loc.char_idx;
        while !self.at_sep() {
            self.cur.loc.char_idx += 1;
        }
        let token =
            String::from_utf8_lossy(&self.buf()[start..self.cur.loc.char_idx]).to_string();
        if token.is_empty() {
            return Err(self.parse_err("color expected", false));
        }
        match Color::parse(&token) {
            Some(c) => *color = c,
            None => return Err(self.parse_err("invalid color", true)),
        }
        color.set_transparency(0.0);

        let mut transparency = None;
        if !color.is_clear() {
            if !self.at_eol() {
                self.expect_ws("")?;
                if !self.at_eol() {
                    let lighten = self.get_double()?;
                    if !(-1.0..=1.0).contains(&lighten) {
                        return Err(
                            self.parse_err("lighten value out of range [-1.0;1.0]", true)
                        );
                    }
                    color.lighten(lighten);
                }
            }
            if !self.at_eol() {
                self.expect_ws("")?;
                if !self.at_eol() {
                    let t = self.get_double()?;
                    if !(0.0..=1.0).contains(&t) {
                        return Err(
                            self.parse_err("transparency value out of range [0.0;1.0]", true)
                        );
                    }
                    color.set_transparency(t);
                    transparency = Some(t);
                }
            }
        }

        self.expect_eol()?;
        Ok(transparency)
    }

    pub fn get_color(&mut self, color: &mut Color) -> Result<()> {
        self.get_color_full(color)?;
        Ok(())
    }

    /// Scan width/height/baseline letter-spacing adjustment factors.
    pub fn get_letter_spacing(&mut self) -> Result<(f64, f64, f64)> {
        let mut height_adj = 1.0;
        let mut baseline_adj = 1.0;

        self.skip_ws(false)?;
        if self.at_eol() {
            return Err(self.parse_err("width adjustment expected", false));
        }
        let width_adj = self.get_double()?;
        if !(0.0..=100.0).contains(&width_adj) {
            return Err(self.parse_err("width adjustment out of range [0;100]", true));
        }
        if !self.at_eol() {
            self.expect_ws("")?;
            if !self.at_eol() {
                height_adj = self.get_double()?;
                if !(0.0..=100.0).contains(&height_adj) {
                    return Err(self.parse_err("height adjustment out of range [0;100]", true));
                }
            }
        }
        if !self.at_eol() {
            self.expect_ws("")?;
            if !self.at_eol() {
                baseline_adj = self.get_double()?;
                if !(0.0..=100.0).contains(&baseline_adj) {
                    return Err(
                        self.parse_err("baseline adjustment out of range [0;100]", true)
                    );
                }
            }
        }
        self.expect_eol()?;
        Ok((width_adj, height_adj, baseline_adj))
    }

    /// Scan a Y-axis selector: `Primary`/`Y1` or `Secondary`/`Y2`.
    pub fn get_axis(&mut self) -> Result<usize> {
        let id = self.get_identifier();
        match id.as_str() {
            "Primary" | "Y1" => Ok(0),
            "Secondary" | "Y2" => Ok(1),
            "" => Err(self.parse_err("Primary/Y1 or Secondary/Y2 expected", false)),
            _ => Err(self.parse_err(&format!("unknown Y-axis '{id}'"), true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::is_skip;

    #[test]
    fn keys_and_switches() {
        let mut s = Source::from_script("ChartBox: On\n").unwrap();
        s.load_line().unwrap();
        assert_eq!(s.get_key().unwrap(), "ChartBox");
        assert!(s.get_switch().unwrap());
    }

    #[test]
    fn sentinels_parse() {
        let mut s = Source::from_script("! - 1.5e2\n").unwrap();
        s.load_line().unwrap();
        let v = s.get_double_or_none().unwrap();
        assert_eq!(v, NUM_INVALID);
        s.skip_ws(false).unwrap();
        assert!(is_skip(s.get_double_or_none().unwrap()));
        s.skip_ws(false).unwrap();
        assert_eq!(s.get_double().unwrap(), 150.0);
    }

    #[test]
    fn oversized_numbers_are_rejected() {
        let mut s = Source::from_script("1e301\n").unwrap();
        s.load_line().unwrap();
        let err = s.get_double().unwrap_err();
        assert!(format!("{err}").contains("number too big"));
    }

    #[test]
    fn quoted_categories() {
        let mut s = Source::from_script("\"two words\" plain -\n").unwrap();
        s.load_line().unwrap();
        assert_eq!(s.get_category().unwrap(), "two words");
        s.skip_ws(false).unwrap();
        assert_eq!(s.get_category().unwrap(), "plain");
        s.skip_ws(false).unwrap();
        assert_eq!(s.get_category().unwrap(), "");
    }

    #[test]
    fn datum_picks_y_column() {
        let mut s = Source::from_script("A 1 2 3\n").unwrap();
        s.load_line().unwrap();
        let (x, y) = s.get_datum(false, 1).unwrap();
        assert_eq!(x, "A");
        assert_eq!(y, "2");
    }

    #[test]
    fn multi_line_text_block() {
        let mut s = Source::from_script("Title:\n  line one\n   line two\nNext: 1\n").unwrap();
        s.load_line().unwrap();
        s.get_key().unwrap();
        let txt = s.get_text(true).unwrap();
        assert_eq!(txt, "line one\n line two");
        assert_eq!(s.get_key().unwrap(), "Next");
    }
}
