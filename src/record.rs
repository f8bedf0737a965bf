//! Flattening of structured values into the named-value mapping.
//!
//! Types opt in by implementing [`Record`]; arbitrary `serde::Serialize`
//! values go through [`flatten_serialize`] instead.

use crate::timefmt::to_reference;
use chrono::{DateTime, FixedOffset, Offset, TimeZone};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;

/// A value that lists its own fields for named substitution.
///
/// ```
/// use strfmt::{Field, Record};
///
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Record for Point {
///     fn fields(&self) -> Vec<Field<'_>> {
///         vec![Field::new("X", &self.x), Field::new("Y", &self.y)]
///     }
/// }
///
/// let text = strfmt::expand_record("({X}, {Y})", &Point { x: 3, y: -1 }).unwrap();
/// assert_eq!(text, "(3, -1)");
/// ```
pub trait Record {
    fn fields(&self) -> Vec<Field<'_>>;
}

impl<R: Record + ?Sized> Record for &R {
    fn fields(&self) -> Vec<Field<'_>> {
        (**self).fields()
    }
}

impl<R: Record + ?Sized> Record for Box<R> {
    fn fields(&self) -> Vec<Field<'_>> {
        (**self).fields()
    }
}

/// An absent record has no fields
impl<R: Record> Record for Option<R> {
    fn fields(&self) -> Vec<Field<'_>> {
        self.as_ref().map_or_else(Vec::new, Record::fields)
    }
}

/// One named field of a [`Record`]
pub struct Field<'a> {
    pub name: &'a str,
    pub value: FieldValue<'a>,
}

impl<'a> Field<'a> {
    pub fn new<T: ToFieldValue + ?Sized>(name: &'a str, value: &'a T) -> Self {
        Self {
            name,
            value: value.to_field_value(),
        }
    }

    /// A field holding another record whose fields are merged into the parent
    pub fn nested(name: &'a str, record: &'a dyn Record) -> Self {
        Self {
            name,
            value: FieldValue::Nested(record),
        }
    }
}

/// Typed field contents, rendered to text during flattening
pub enum FieldValue<'a> {
    Int(i64),
    Uint(u64),
    Bool(bool),
    Float(f64),
    Time(DateTime<FixedOffset>),
    Text(Cow<'a, str>),
    Nested(&'a dyn Record),
    /// A `None` optional, rendered as an empty string
    Absent,
}

/// Conversion of a Rust value into a [`FieldValue`]
pub trait ToFieldValue {
    fn to_field_value(&self) -> FieldValue<'_>;
}

macro_rules! field_value_via {
    ($variant:ident, $target:ty: $($source:ty),*) => {
        $(
            impl ToFieldValue for $source {
                fn to_field_value(&self) -> FieldValue<'_> {
                    FieldValue::$variant(<$target>::from(*self))
                }
            }
        )*
    };
}

field_value_via!(Int, i64: i8, i16, i32, i64);
field_value_via!(Uint, u64: u8, u16, u32, u64);
field_value_via!(Float, f64: f32, f64);
field_value_via!(Bool, bool: bool);

impl ToFieldValue for isize {
    fn to_field_value(&self) -> FieldValue<'_> {
        i64::try_from(*self)
            .map_or_else(|_| FieldValue::Text(self.to_string().into()), FieldValue::Int)
    }
}

impl ToFieldValue for usize {
    fn to_field_value(&self) -> FieldValue<'_> {
        u64::try_from(*self)
            .map_or_else(|_| FieldValue::Text(self.to_string().into()), FieldValue::Uint)
    }
}

impl ToFieldValue for str {
    fn to_field_value(&self) -> FieldValue<'_> {
        FieldValue::Text(Cow::Borrowed(self))
    }
}

impl ToFieldValue for String {
    fn to_field_value(&self) -> FieldValue<'_> {
        FieldValue::Text(Cow::Borrowed(self))
    }
}

impl ToFieldValue for Cow<'_, str> {
    fn to_field_value(&self) -> FieldValue<'_> {
        FieldValue::Text(Cow::Borrowed(self))
    }
}

impl ToFieldValue for char {
    fn to_field_value(&self) -> FieldValue<'_> {
        FieldValue::Text(Cow::Owned(self.to_string()))
    }
}

impl<Tz: TimeZone> ToFieldValue for DateTime<Tz> {
    fn to_field_value(&self) -> FieldValue<'_> {
        FieldValue::Time(self.with_timezone(&self.offset().fix()))
    }
}

impl<T: ToFieldValue + ?Sized> ToFieldValue for &T {
    fn to_field_value(&self) -> FieldValue<'_> {
        (**self).to_field_value()
    }
}

impl<T: ToFieldValue + ?Sized> ToFieldValue for Box<T> {
    fn to_field_value(&self) -> FieldValue<'_> {
        (**self).to_field_value()
    }
}

impl<T: ToFieldValue> ToFieldValue for Option<T> {
    fn to_field_value(&self) -> FieldValue<'_> {
        self.as_ref()
            .map_or(FieldValue::Absent, ToFieldValue::to_field_value)
    }
}

/// Floats are written in scientific notation with two fractional digits,
/// rounded at single precision, e.g. `4.30e+01`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn render_float(value: f64) -> String {
    let single = value as f32;
    if single.is_nan() {
        return "NaN".to_string();
    }
    if single.is_infinite() {
        return if single > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let text = format!("{single:.2e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
        }
        None => text,
    }
}

fn render(value: &FieldValue<'_>) -> String {
    match value {
        FieldValue::Int(v) => v.to_string(),
        FieldValue::Uint(v) => v.to_string(),
        FieldValue::Bool(v) => v.to_string(),
        FieldValue::Float(v) => render_float(*v),
        FieldValue::Time(v) => to_reference(v),
        FieldValue::Text(v) => v.to_string(),
        FieldValue::Nested(_) | FieldValue::Absent => String::new(),
    }
}

/// Builds the key → text mapping for `record`.
///
/// Nested records are merged one level deep under their own field names, and
/// the nested field itself maps to an empty string. Later fields overwrite
/// earlier ones with the same name.
#[must_use]
pub fn flatten<R: Record + ?Sized>(record: &R) -> HashMap<String, String> {
    let mut values = HashMap::new();
    collect(record, &mut values, true);
    values
}

fn collect<R: Record + ?Sized>(record: &R, values: &mut HashMap<String, String>, descend: bool) {
    for field in record.fields() {
        if let FieldValue::Nested(inner) = field.value
            && descend
        {
            collect(inner, values, false);
        }
        values.insert(field.name.to_string(), render(&field.value));
    }
}

/// Builds the key → text mapping for any serializable value.
///
/// Only JSON objects produce entries; scalars, arrays, `null` or values that
/// fail to serialize flatten to an empty mapping.
#[must_use]
pub fn flatten_serialize<T: Serialize + ?Sized>(value: &T) -> HashMap<String, String> {
    match serde_json::to_value(value) {
        Ok(json) => flatten_json(&json),
        Err(err) => {
            debug!("value could not be flattened: {err}");
            HashMap::new()
        }
    }
}

#[must_use]
pub fn flatten_json(value: &Value) -> HashMap<String, String> {
    let mut values = HashMap::new();
    if let Value::Object(object) = value {
        collect_json(object, &mut values, true);
    }
    values
}

fn collect_json(object: &Map<String, Value>, values: &mut HashMap<String, String>, descend: bool) {
    for (name, value) in object {
        let rendered = match value {
            Value::Object(inner) => {
                if descend {
                    collect_json(inner, values, false);
                }
                String::new()
            }
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.is_f64() {
                    n.as_f64().map(render_float).unwrap_or_default()
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Array(_) => value.to_string(),
        };
        values.insert(name.clone(), rendered);
    }
}
