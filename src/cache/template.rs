//! Filename templates with `{field}` placeholders.
//!
//! Purpose
//! -------
//! Render cache filenames such as
//! `df_boxes_-_time_dim_{time_dim}_-_step_size_{step_size}.bin` so that the
//! produced names match those of the existing on-disk stores byte for byte.
//!
//! Key behaviors
//! -------------
//! - Floats render like Python's `str(float)`: shortest round-trip digits,
//!   always with a decimal point (`1.0`), exponent form outside
//!   `[1e-4, 1e16)` with a signed two-digit exponent (`1e-07`).
//! - Booleans render as `True` / `False`.
//! - `{{` and `}}` are literal braces.
//! - A placeholder may carry a format spec `[[fill]align][width][d]`, e.g.
//!   `{index:0>5}` or `{index:05d}`.
//!
//! Conventions
//! -----------
//! - [`python_scientific`] mirrors C `%.{precision}e` and is used for the
//!   `parameters.txt` files of parameter-set directories.
use crate::cache::errors::{CacheError, CacheResult};
use std::fmt;

/// A value substituted into a [`FilenameTemplate`].
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValue::Int(v) => write!(f, "{v}"),
            TemplateValue::Float(v) => f.write_str(&python_float_repr(*v)),
            TemplateValue::Bool(true) => f.write_str("True"),
            TemplateValue::Bool(false) => f.write_str("False"),
            TemplateValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TemplateValue {
    fn from(v: i64) -> Self {
        TemplateValue::Int(v)
    }
}

impl From<usize> for TemplateValue {
    fn from(v: usize) -> Self {
        TemplateValue::Int(v as i64)
    }
}

impl From<f64> for TemplateValue {
    fn from(v: f64) -> Self {
        TemplateValue::Float(v)
    }
}

impl From<bool> for TemplateValue {
    fn from(v: bool) -> Self {
        TemplateValue::Bool(v)
    }
}

impl From<&str> for TemplateValue {
    fn from(v: &str) -> Self {
        TemplateValue::Str(v.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(v: String) -> Self {
        TemplateValue::Str(v)
    }
}

/// A filename pattern with named placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilenameTemplate {
    pattern: String,
}

impl FilenameTemplate {
    pub fn new(pattern: impl Into<String>) -> Self {
        FilenameTemplate { pattern: pattern.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Substitute `fields` into the template.
    ///
    /// Errors
    /// ------
    /// - [`CacheError::MissingTemplateField`] if a placeholder has no value.
    /// - [`CacheError::UnbalancedBraces`] for a stray `{` or `}`.
    /// - [`CacheError::UnsupportedFormatSpec`] for specs outside
    ///   `[[fill]align][width][d]`.
    ///
    /// Notes
    /// -----
    /// - Unused fields are ignored.
    pub fn render(&self, fields: &[(&str, TemplateValue)]) -> CacheResult<String> {
        let mut out = String::with_capacity(self.pattern.len() + 16);
        let mut chars = self.pattern.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '}' => return Err(self.unbalanced()),
                '{' => {
                    let mut placeholder = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(self.unbalanced()),
                            Some(c) => placeholder.push(c),
                        }
                    }
                    let (name, spec) = match placeholder.split_once(':') {
                        Some((name, spec)) => (name, spec),
                        None => (placeholder.as_str(), ""),
                    };
                    let value = fields.iter().find(|(field, _)| *field == name).map(|(_, v)| v);
                    let value = value.ok_or_else(|| CacheError::MissingTemplateField {
                        template: self.pattern.clone(),
                        field: name.to_string(),
                    })?;
                    out.push_str(&self.apply_spec(value, spec)?);
                }
                c => out.push(c),
            }
        }
        Ok(out)
    }

    fn apply_spec(&self, value: &TemplateValue, spec: &str) -> CacheResult<String> {
        let rendered = value.to_string();
        if spec.is_empty() {
            return Ok(rendered);
        }
        let unsupported = || CacheError::UnsupportedFormatSpec {
            template: self.pattern.clone(),
            spec: spec.to_string(),
        };

        let chars: Vec<char> = spec.chars().collect();
        let mut pos = 0;
        let is_align = |c: char| matches!(c, '<' | '>' | '^');
        let (mut fill, mut align) = (' ', None);
        if chars.len() >= 2 && is_align(chars[1]) {
            fill = chars[0];
            align = Some(chars[1]);
            pos = 2;
        } else if !chars.is_empty() && is_align(chars[0]) {
            align = Some(chars[0]);
            pos = 1;
        }
        // Python's `0` flag: zero padding after the sign, numbers only.
        let mut sign_aware_zero = false;
        if align.is_none() && chars.get(pos) == Some(&'0') {
            sign_aware_zero = true;
            pos += 1;
        }
        let digits: String = chars[pos..].iter().take_while(|c| c.is_ascii_digit()).collect();
        pos += digits.len();
        let width: usize = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| unsupported())?
        };
        match &chars[pos..] {
            [] => {}
            ['d'] if matches!(value, TemplateValue::Int(_) | TemplateValue::Bool(_)) => {}
            _ => return Err(unsupported()),
        }

        let rendered = match value {
            TemplateValue::Bool(b) if chars.last() == Some(&'d') => (*b as i64).to_string(),
            _ => rendered,
        };
        let len = rendered.chars().count();
        if len >= width {
            return Ok(rendered);
        }
        let pad = width - len;
        let numeric = matches!(value, TemplateValue::Int(_) | TemplateValue::Float(_));
        if sign_aware_zero && numeric {
            let (sign, digits) = match rendered.strip_prefix('-') {
                Some(rest) => ("-", rest.to_string()),
                None => ("", rendered.clone()),
            };
            return Ok(format!("{sign}{}{digits}", "0".repeat(pad)));
        }
        let align = align.unwrap_or(if numeric { '>' } else { '<' });
        let fill_str = |n: usize| fill.to_string().repeat(n);
        Ok(match align {
            '<' => format!("{rendered}{}", fill_str(pad)),
            '>' => format!("{}{rendered}", fill_str(pad)),
            _ => format!("{}{rendered}{}", fill_str(pad / 2), fill_str(pad - pad / 2)),
        })
    }

    fn unbalanced(&self) -> CacheError {
        CacheError::UnbalancedBraces { template: self.pattern.clone() }
    }
}

impl fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl From<&str> for FilenameTemplate {
    fn from(pattern: &str) -> Self {
        FilenameTemplate::new(pattern)
    }
}

/// Format a float the way Python's `str(float)` does.
pub fn python_float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    let abs = x.abs();
    if !(1e-4..1e16).contains(&abs) {
        return pad_exponent(&format!("{x:e}"));
    }
    let plain = format!("{x}");
    if plain.contains('.') {
        plain
    } else {
        format!("{plain}.0")
    }
}

/// Format a float like C `%.{precision}e` (e.g. `1.500000000000000000e+00`).
pub fn python_scientific(x: f64, precision: usize) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    pad_exponent(&format!("{x:.precision$e}"))
}

/// Rewrite Rust's `1e-7` exponent style as `1e-07`.
fn pad_exponent(formatted: &str) -> String {
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(rest) => ('-', rest),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted.to_string(),
    }
}
