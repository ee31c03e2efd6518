//! Values passed to the sandbox console and how they are stringified
//!
//! The bridge script turns every console argument into a string before it
//! crosses the frame boundary: objects are pretty-printed as JSON and fall
//! back to `String(arg)` when that fails, everything else goes through
//! `String(arg)` directly. [`SandboxValue`] models the JS values involved so
//! the same rules can be applied, and tested, on the Rust side. Arrays and
//! objects are shared and mutable, which is what makes reference cycles,
//! and therefore the fallback path, possible.

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};
use serde_json::{Map, Number, Value};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::{Result, SandboxError};

/// Shared array storage
pub type ArrayRef = Rc<RefCell<Vec<SandboxValue>>>;

/// Shared object storage, properties in insertion order
pub type ObjectRef = Rc<RefCell<Vec<(String, SandboxValue)>>>;

/// A JS value as seen by the console shim
#[derive(Debug, Clone)]
pub enum SandboxValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Function, carrying its source text
    Function(String),
    Array(ArrayRef),
    Object(ObjectRef),
}

impl SandboxValue {
    pub fn string(s: impl Into<String>) -> Self {
        SandboxValue::String(s.into())
    }

    pub fn array(items: Vec<SandboxValue>) -> Self {
        SandboxValue::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object<K: Into<String>>(props: Vec<(K, SandboxValue)>) -> Self {
        let props = props.into_iter().map(|(k, v)| (k.into(), v)).collect();
        SandboxValue::Object(Rc::new(RefCell::new(props)))
    }

    /// Set or add a property. No-op on anything but objects.
    pub fn set_property(&self, key: impl Into<String>, value: SandboxValue) {
        if let SandboxValue::Object(props) = self {
            let key = key.into();
            let mut props = props.borrow_mut();
            match props.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => *slot = value,
                None => props.push((key, value)),
            }
        }
    }

    /// Append an element. No-op on anything but arrays.
    pub fn push(&self, value: SandboxValue) {
        if let SandboxValue::Array(items) = self {
            items.borrow_mut().push(value);
        }
    }

    /// JS `typeof value === 'object'`, which includes `null`.
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            SandboxValue::Null | SandboxValue::Array(_) | SandboxValue::Object(_)
        )
    }

    /// `JSON.stringify(value, null, 2)`. `Ok(None)` mirrors JS returning
    /// `undefined` for values JSON cannot represent.
    pub fn to_json_pretty(&self) -> Result<Option<String>> {
        let mut seen = Vec::new();
        let value = match to_json(self, &mut seen)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let mut out = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut out, JsFormatter::default());
        value.serialize(&mut serializer)?;
        String::from_utf8(out)
            .map(Some)
            .map_err(|e| SandboxError::Serialization(e.to_string()))
    }

    /// `String(value)`
    pub fn to_js_string(&self) -> String {
        let mut seen = Vec::new();
        js_string(self, &mut seen)
    }
}

impl From<&str> for SandboxValue {
    fn from(s: &str) -> Self {
        SandboxValue::String(s.to_string())
    }
}

impl From<f64> for SandboxValue {
    fn from(n: f64) -> Self {
        SandboxValue::Number(n)
    }
}

impl From<bool> for SandboxValue {
    fn from(b: bool) -> Self {
        SandboxValue::Bool(b)
    }
}

/// Stringify one console argument the way the bridge script does.
pub fn format_console_arg(value: &SandboxValue) -> String {
    if value.is_object_like() {
        match value.to_json_pretty() {
            Ok(Some(json)) => json,
            // JSON.stringify only yields undefined for non-object input.
            Ok(None) => value.to_js_string(),
            Err(_) => value.to_js_string(),
        }
    } else {
        value.to_js_string()
    }
}

fn container_ptr(value: &SandboxValue) -> Option<*const ()> {
    match value {
        SandboxValue::Array(items) => Some(Rc::as_ptr(items) as *const ()),
        SandboxValue::Object(props) => Some(Rc::as_ptr(props) as *const ()),
        _ => None,
    }
}

fn to_json(value: &SandboxValue, seen: &mut Vec<*const ()>) -> Result<Option<Value>> {
    let ptr = container_ptr(value);
    if let Some(ptr) = ptr {
        if seen.contains(&ptr) {
            return Err(SandboxError::CircularStructure);
        }
        seen.push(ptr);
    }

    let json = match value {
        SandboxValue::Undefined | SandboxValue::Function(_) => None,
        SandboxValue::Null => Some(Value::Null),
        SandboxValue::Bool(b) => Some(Value::Bool(*b)),
        SandboxValue::Number(n) => Some(json_number(*n)),
        SandboxValue::String(s) => Some(Value::String(s.clone())),
        SandboxValue::Array(items) => {
            let mut out = Vec::new();
            for item in items.borrow().iter() {
                out.push(to_json(item, seen)?.unwrap_or(Value::Null));
            }
            Some(Value::Array(out))
        }
        SandboxValue::Object(props) => {
            let mut out = Map::new();
            for (key, item) in props.borrow().iter() {
                if let Some(v) = to_json(item, seen)? {
                    out.insert(key.clone(), v);
                }
            }
            Some(Value::Object(out))
        }
    };

    if ptr.is_some() {
        seen.pop();
    }
    Ok(json)
}

/// Numbers are kept as floats so [`JsFormatter`] prints them; non-finite
/// values become `null`.
fn json_number(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Pretty printer matching `JSON.stringify(value, null, 2)`, including JS
/// number formatting.
#[derive(Default)]
struct JsFormatter {
    pretty: PrettyFormatter<'static>,
}

impl Formatter for JsFormatter {
    fn write_f64<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        writer.write_all(js_number_string(value).as_bytes())
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }
}

/// `Number.prototype.toString()` for radix 10
///
/// Starts from the shortest round-trip digits, then places the decimal point
/// or switches to exponent form when the exponent is >= 21 or < -6.
pub fn js_number_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    // `{:e}` yields the shortest digits that round-trip, e.g. "-1.25e-7".
    let sci = format!("{:e}", n.abs());
    let (mantissa, exp) = match sci.split_once('e') {
        Some(parts) => parts,
        None => (sci.as_str(), "0"),
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let point = exp + 1;

    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, sign, exp.abs())
        } else {
            format!("{}.{}e{}{}", first, rest, sign, exp.abs())
        }
    };

    if n < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

fn js_string(value: &SandboxValue, seen: &mut Vec<*const ()>) -> String {
    match value {
        SandboxValue::Undefined => "undefined".to_string(),
        SandboxValue::Null => "null".to_string(),
        SandboxValue::Bool(b) => b.to_string(),
        SandboxValue::Number(n) => js_number_string(*n),
        SandboxValue::String(s) => s.clone(),
        SandboxValue::Function(source) => source.clone(),
        SandboxValue::Object(_) => "[object Object]".to_string(),
        SandboxValue::Array(items) => {
            // Array.prototype.join renders cycles, null and undefined as "".
            let ptr = Rc::as_ptr(items) as *const ();
            if seen.contains(&ptr) {
                return String::new();
            }
            seen.push(ptr);
            let parts: Vec<String> = items
                .borrow()
                .iter()
                .map(|item| match item {
                    SandboxValue::Undefined | SandboxValue::Null => String::new(),
                    other => js_string(other, seen),
                })
                .collect();
            seen.pop();
            parts.join(",")
        }
    }
}
