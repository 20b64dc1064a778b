use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format used for dates when a textual form is needed (column sizing, JSON dumps).
pub const DATE_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single exportable cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum CellValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDateTime),
    Null,
}

impl CellValue {
    /// Text form of the value, as it would appear in a cell.
    ///
    /// `Null` is empty. Numbers follow JavaScript's `String(n)` for the
    /// common cases (integral values print without a fraction).
    pub fn display(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Boolean(b) => b.to_string(),
            Self::Date(d) => d.format(DATE_DISPLAY_FORMAT).to_string(),
            Self::Null => String::new(),
        }
    }

    /// Display width in characters, used for column sizing.
    pub fn display_len(&self) -> usize {
        match self {
            Self::String(s) => s.chars().count(),
            other => other.display().chars().count(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(d: NaiveDateTime) -> Self {
        Self::Date(d)
    }
}

/// A value as supplied by a caller, before coercion.
///
/// Values arrive from hosted tables and edge functions as loosely typed
/// JSON. Anything that is not one of the scalar cell kinds lands in
/// [`RecordValue::Other`] and is stringified on the way into a sheet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum RecordValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
    Other(serde_json::Value),
}

impl RecordValue {
    /// Coerce into a [`CellValue`].
    ///
    /// Scalars pass through, `Null` stays `Null`, everything else becomes
    /// its JavaScript `String(value)` form. Non-finite numbers cannot be
    /// stored as numeric cells and are stringified as well.
    pub fn to_cell(&self) -> CellValue {
        match self {
            Self::Null => CellValue::Null,
            Self::Bool(b) => CellValue::Boolean(*b),
            Self::Number(n) if n.is_finite() => CellValue::Number(*n),
            Self::Number(n) => CellValue::String(format_number(*n)),
            Self::Text(s) => CellValue::String(s.clone()),
            Self::Date(d) => CellValue::Date(*d),
            Self::Other(v) => CellValue::String(js_string(v)),
        }
    }
}

impl From<serde_json::Value> for RecordValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => Self::Number(f),
                None => Self::Other(Value::Number(n)),
            },
            Value::String(s) => Self::Text(s),
            other @ (Value::Array(_) | Value::Object(_)) => Self::Other(other),
        }
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for RecordValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for RecordValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for RecordValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<NaiveDateTime> for RecordValue {
    fn from(d: NaiveDateTime) -> Self {
        Self::Date(d)
    }
}

impl<T: Into<RecordValue>> From<Option<T>> for RecordValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Format a number the way JavaScript's `String(n)` does.
///
/// Magnitudes of at least 1e21 or below 1e-6 use exponent form
/// (`1e+21`, `1.5e-7`); everything else is plain decimal.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let int = n as i64;
        return int.to_string();
    }
    let magnitude = n.abs();
    if magnitude >= 1e21 || (magnitude != 0.0 && magnitude < 1e-6) {
        return js_exponent(n);
    }
    n.to_string()
}

/// `1.5e-7` / `1e+21`: Rust's shortest `{:e}` with an explicit exponent sign.
fn js_exponent(n: f64) -> String {
    let formatted = format!("{n:e}");
    match formatted.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => formatted,
    }
}

/// JavaScript `String(value)` for JSON values.
pub(crate) fn js_string(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), format_number),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                // Array.prototype.join renders null/undefined as empty
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}
