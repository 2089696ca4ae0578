//! `json`
//!
//! `dumps` renders the same text CPython does with default settings
//! (ASCII-only output, `", "` and `": "` separators). `loads` goes through
//! a serde visitor so objects keep their document order.

use super::Members;
use crate::interpreter::builtins::exceptions::ExcType;
use crate::interpreter::control::{check_length, EvalResult, Throw, MAX_NESTING};
use crate::interpreter::executor::format::plain_repr;
use crate::interpreter::executor::Interpreter;
use crate::interpreter::object::{Args, DictMap, HashKey, Val};
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use std::fmt;
use std::sync::Arc;

pub(super) fn members() -> Members {
    vec![
        ("dumps", Val::Native(native!("dumps", dumps))),
        ("loads", Val::Native(native!("loads", loads))),
    ]
}

/* ===================== Encoding ===================== */

struct Encoder {
    indent: Option<String>,
    item_separator: String,
    key_separator: String,
    sort_keys: bool,
    /// Containers being encoded, for cycle detection
    active: Vec<usize>,
    out: String,
}

impl Encoder {
    fn encode(&mut self, value: &Val, depth: usize) -> EvalResult<()> {
        if depth > MAX_NESTING {
            return Err(Throw::new(
                ExcType::RecursionError,
                "maximum recursion depth exceeded while encoding a JSON object",
            ));
        }
        check_length(self.out.len())?;
        match value {
            Val::None => self.out.push_str("null"),
            Val::Bool(true) => self.out.push_str("true"),
            Val::Bool(false) => self.out.push_str("false"),
            Val::Int(i) => self.out.push_str(&i.to_string()),
            Val::Float(f) => self.out.push_str(&float_text(*f)),
            Val::Str(s) => escape_into(&mut self.out, s),
            Val::List(items) => {
                let snapshot = items.lock().clone();
                self.enter(value)?;
                self.encode_items(&snapshot, depth)?;
                self.active.pop();
            }
            Val::Tuple(items) => self.encode_items(items, depth)?,
            Val::Dict(map) => {
                let mut entries: Vec<(Val, Val)> = map.lock().values().cloned().collect();
                self.enter(value)?;
                if self.sort_keys {
                    let mut keyed = Vec::with_capacity(entries.len());
                    for (key, item) in entries {
                        keyed.push((key_text(&key)?, item));
                    }
                    keyed.sort_by(|a, b| a.0.cmp(&b.0));
                    entries = keyed
                        .into_iter()
                        .map(|(key, item)| (Val::from(key), item))
                        .collect();
                }
                self.encode_entries(&entries, depth)?;
                self.active.pop();
            }
            other => {
                return Err(Throw::type_error(format!(
                    "Object of type {} is not JSON serializable",
                    other.type_name()
                )))
            }
        }
        Ok(())
    }

    fn enter(&mut self, value: &Val) -> EvalResult<()> {
        if let Some(addr) = value.addr() {
            if self.active.contains(&addr) {
                return Err(Throw::value_error("Circular reference detected"));
            }
            self.active.push(addr);
        }
        Ok(())
    }

    /// Newline and indentation before an item, when indenting
    fn break_line(&mut self, depth: usize) -> EvalResult<()> {
        if let Some(indent) = &self.indent {
            check_length(self.out.len() + indent.len().saturating_mul(depth))?;
            self.out.push('\n');
            for _ in 0..depth {
                self.out.push_str(indent);
            }
        }
        Ok(())
    }

    fn encode_items(&mut self, items: &[Val], depth: usize) -> EvalResult<()> {
        if items.is_empty() {
            self.out.push_str("[]");
            return Ok(());
        }
        self.out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                let separator = self.item_separator.clone();
                self.out.push_str(&separator);
            }
            self.break_line(depth + 1)?;
            self.encode(item, depth + 1)?;
        }
        self.break_line(depth)?;
        self.out.push(']');
        Ok(())
    }

    fn encode_entries(&mut self, entries: &[(Val, Val)], depth: usize) -> EvalResult<()> {
        if entries.is_empty() {
            self.out.push_str("{}");
            return Ok(());
        }
        self.out.push('{');
        for (i, (key, item)) in entries.iter().enumerate() {
            if i > 0 {
                let separator = self.item_separator.clone();
                self.out.push_str(&separator);
            }
            self.break_line(depth + 1)?;
            escape_into(&mut self.out, &key_text(key)?);
            let separator = self.key_separator.clone();
            self.out.push_str(&separator);
            self.encode(item, depth + 1)?;
        }
        self.break_line(depth)?;
        self.out.push('}');
        Ok(())
    }
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        plain_repr(&Val::Float(f))
    }
}

/// Object keys are strings; scalar keys are converted
fn key_text(key: &Val) -> EvalResult<String> {
    match key {
        Val::Str(s) => Ok(s.to_string()),
        Val::Int(i) => Ok(i.to_string()),
        Val::Float(f) => Ok(float_text(*f)),
        Val::Bool(b) => Ok(b.to_string()),
        Val::None => Ok("null".to_string()),
        other => Err(Throw::type_error(format!(
            "keys must be str, int, float, bool or None, not {}",
            other.type_name()
        ))),
    }
}

fn escape_into(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
    out.push('"');
}

fn dumps(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let indent = args.take_keyword("indent");
    let sort_keys = args.take_keyword("sort_keys");
    let separators = args.take_keyword("separators");
    args.check("dumps", 1, 1)?;

    let indent = match indent {
        None | Some(Val::None) => None,
        Some(Val::Str(s)) => Some(s.to_string()),
        Some(value) => match value.as_int() {
            Some(n) => {
                let n = n.max(0) as usize;
                check_length(n)?;
                Some(" ".repeat(n))
            }
            None => {
                return Err(Throw::type_error(format!(
                    "indent must be int or str, not {}",
                    value.type_name()
                )))
            }
        },
    };
    let (item_separator, key_separator) = match separators {
        None | Some(Val::None) => {
            let item = if indent.is_some() { "," } else { ", " };
            (item.to_string(), ": ".to_string())
        }
        Some(value) => match interp.collect(&value)?.as_slice() {
            [Val::Str(item), Val::Str(key)] => (item.to_string(), key.to_string()),
            _ => {
                return Err(Throw::type_error(
                    "separators must be a pair of strings",
                ))
            }
        },
    };
    let sort_keys = match sort_keys {
        Some(value) => interp.truthy(&value)?,
        None => false,
    };

    let mut encoder = Encoder {
        indent,
        item_separator,
        key_separator,
        sort_keys,
        active: Vec::new(),
        out: String::new(),
    };
    encoder.encode(&args.positional[0], 0)?;
    Ok(Val::from(encoder.out))
}

/* ===================== Decoding ===================== */

struct ValSeed;

impl<'de> DeserializeSeed<'de> for ValSeed {
    type Value = Val;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Val, D::Error> {
        deserializer.deserialize_any(ValVisitor)
    }
}

struct ValVisitor;

impl<'de> Visitor<'de> for ValVisitor {
    type Value = Val;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Val, E> {
        Ok(Val::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Val, E> {
        Ok(Val::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Val, E> {
        i64::try_from(v)
            .map(Val::Int)
            .map_err(|_| E::custom("integer out of range"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Val, E> {
        Ok(Val::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Val, E> {
        Ok(Val::from(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Val, E> {
        Ok(Val::None)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Val, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element_seed(ValSeed)? {
            items.push(item);
        }
        Ok(Val::list(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Val, A::Error> {
        let mut entries = DictMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(ValSeed)?;
            let key: Arc<str> = Arc::from(key);
            entries.insert(HashKey::Str(key.clone()), (Val::Str(key), value));
        }
        Ok(Val::dict(entries))
    }
}

/// Parse JSON text into guest values
pub(crate) fn parse(text: &str) -> Result<Val, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let value = ValSeed.deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}

fn loads(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("loads", 1, 1)?;
    let Val::Str(text) = &args.positional[0] else {
        return Err(Throw::type_error(format!(
            "the JSON object must be str, not {}",
            args.positional[0].type_name()
        )));
    };
    parse(text).map_err(|err| Throw::value_error(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(text: &str) -> String {
        let mut out = String::new();
        escape_into(&mut out, text);
        out
    }

    #[test]
    fn test_escape_is_ascii_only() {
        assert_eq!(escaped("a\"b"), r#""a\"b""#);
        assert_eq!(escaped("line\n"), r#""line\n""#);
        assert_eq!(escaped("é"), r#""\u00e9""#);
        assert_eq!(escaped("😀"), r#""\ud83d\ude00""#);
    }

    #[test]
    fn test_parse_keeps_object_order() {
        let value = parse(r#"{"b": 1, "a": [true, null, 2.5]}"#).unwrap();
        let Val::Dict(map) = value else {
            panic!("expected a dict");
        };
        let keys: Vec<String> = map
            .lock()
            .values()
            .map(|(k, _)| k.as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_parse_rejects_trailing_text() {
        assert!(parse("[1, 2] x").is_err());
        assert!(parse("18446744073709551615").is_err());
    }

    #[test]
    fn test_float_text() {
        assert_eq!(float_text(1.0), "1.0");
        assert_eq!(float_text(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(key_text(&Val::Bool(true)).unwrap(), "true");
        assert!(key_text(&Val::tuple(vec![])).is_err());
    }
}
