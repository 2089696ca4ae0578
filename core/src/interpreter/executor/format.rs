//! `str`, `repr`, format specs, `str.format` and `%` formatting

use super::Interpreter;
use crate::interpreter::builtins::exceptions::ExcType;
use crate::interpreter::control::{check_length, EvalResult, Throw, MAX_NESTING};
use crate::interpreter::object::{Args, Method, Val};
use crate::value::repr::{complex_repr, float_repr, string_repr};

const IN_REPR: &str = "while getting the repr of an object";

/// Identity-based rendering with no guest calls, for logs and bridge keys
pub(crate) fn plain_repr(value: &Val) -> String {
    plain_repr_at(value, 0)
}

fn plain_repr_at(value: &Val, depth: usize) -> String {
    match value {
        Val::Tuple(_) if depth >= MAX_NESTING => "(...)".to_string(),
        Val::None => "None".to_string(),
        Val::Bool(true) => "True".to_string(),
        Val::Bool(false) => "False".to_string(),
        Val::Int(i) => i.to_string(),
        Val::Float(f) => float_repr(*f),
        Val::Complex(c) => complex_repr(c.re, c.im),
        Val::Str(s) => string_repr(s),
        Val::Tuple(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| plain_repr_at(item, depth + 1))
                .collect();
            if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            }
        }
        Val::Range(r) => range_repr(r.start, r.stop, r.step),
        Val::Type(ty) => format!("<class '{}'>", ty.name()),
        Val::Class(class) => format!("<class '{}'>", class.name),
        other => format!(
            "<{} object at {:#x}>",
            other.type_name(),
            other.addr().unwrap_or_default()
        ),
    }
}

fn range_repr(start: i64, stop: i64, step: i64) -> String {
    if step == 1 {
        format!("range({}, {})", start, stop)
    } else {
        format!("range({}, {}, {})", start, stop, step)
    }
}

impl Interpreter<'_> {
    /// `str(value)`
    pub(crate) fn to_str(&mut self, value: &Val) -> EvalResult<String> {
        match value {
            Val::Str(s) => Ok(s.to_string()),
            Val::Instance(instance) => {
                if instance.class.exception_type().is_some() {
                    return self.exception_message(value);
                }
                match instance.class.lookup("__str__") {
                    Some(method) => match self.call(&method, Args::new(vec![value.clone()]))? {
                        Val::Str(s) => Ok(s.to_string()),
                        other => Err(Throw::type_error(format!(
                            "__str__ returned non-string (type {})",
                            other.type_name()
                        ))),
                    },
                    None => self.repr(value),
                }
            }
            other => self.repr(other),
        }
    }

    /// `repr(value)`
    pub(crate) fn repr(&mut self, value: &Val) -> EvalResult<String> {
        match value {
            Val::List(items) => {
                let Some(_guard) = self.enter_render(value) else {
                    return Ok("[...]".to_string());
                };
                let items = items.lock().clone();
                let result = self
                    .descend(IN_REPR, |interp| interp.repr_items(&items))
                    .map(|parts| format!("[{}]", parts.join(", ")));
                self.leave_render();
                result
            }
            Val::Tuple(items) => {
                let parts = self.descend(IN_REPR, |interp| interp.repr_items(items))?;
                Ok(if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                })
            }
            Val::Dict(map) => {
                let Some(_guard) = self.enter_render(value) else {
                    return Ok("{...}".to_string());
                };
                let entries: Vec<(Val, Val)> = map.lock().values().cloned().collect();
                let result = self.descend(IN_REPR, |interp| interp.repr_entries(&entries));
                self.leave_render();
                result
            }
            Val::Instance(instance) => {
                if let Some(method @ Val::Function(_)) = instance.class.lookup("__repr__") {
                    return match self.call(&method, Args::new(vec![value.clone()]))? {
                        Val::Str(s) => Ok(s.to_string()),
                        other => Err(Throw::type_error(format!(
                            "__repr__ returned non-string (type {})",
                            other.type_name()
                        ))),
                    };
                }
                if instance.class.exception_type().is_some() {
                    let args = instance.attrs.lock().get("args").cloned();
                    let inner = match args {
                        Some(Val::Tuple(items)) if items.len() == 1 => self.repr(&items[0])?,
                        Some(Val::Tuple(items)) => self.repr_items(&items)?.join(", "),
                        _ => String::new(),
                    };
                    return Ok(format!("{}({})", instance.class.name, inner));
                }
                Ok(format!(
                    "<{} object at {:#x}>",
                    instance.class.name,
                    value.addr().unwrap_or_default()
                ))
            }
            Val::Function(function) => Ok(format!(
                "<function {} at {:#x}>",
                function.def.name,
                value.addr().unwrap_or_default()
            )),
            Val::Native(native) => Ok(format!("<built-in function {}>", native.name)),
            Val::Host(callable) => Ok(format!("<built-in function {}>", callable.name())),
            Val::Method(method) => match method.as_ref() {
                Method::Bound { receiver, func } => {
                    let name = match func {
                        Val::Function(f) => f.def.name.clone(),
                        Val::Native(n) => n.name.to_string(),
                        other => other.type_name(),
                    };
                    let owner = receiver.type_name();
                    let receiver = self.repr(receiver)?;
                    Ok(format!("<bound method {}.{} of {}>", owner, name, receiver))
                }
                Method::Native { receiver, func } => Ok(format!(
                    "<built-in method {} of {} object at {:#x}>",
                    func.name,
                    receiver.type_name(),
                    receiver.addr().unwrap_or_default()
                )),
            },
            Val::Module(module) => Ok(format!("<module '{}'>", module.name)),
            Val::Iter(_) => Ok(format!("<iterator object at {:#x}>", value.addr().unwrap_or_default())),
            Val::Super(proxy) => Ok(format!("<super: <class '{}'>>", proxy.class.name)),
            other => Ok(plain_repr(other)),
        }
    }

    fn repr_items(&mut self, items: &[Val]) -> EvalResult<Vec<String>> {
        items.iter().map(|item| self.repr(item)).collect()
    }

    fn repr_entries(&mut self, entries: &[(Val, Val)]) -> EvalResult<String> {
        let mut parts = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            parts.push(format!("{}: {}", self.repr(key)?, self.repr(value)?));
        }
        Ok(format!("{{{}}}", parts.join(", ")))
    }

    /// Mark a container as being rendered; `None` when it already is
    fn enter_render(&mut self, value: &Val) -> Option<()> {
        let addr = value.addr()?;
        if self.rendering.contains(&addr) {
            return None;
        }
        self.rendering.push(addr);
        Some(())
    }

    fn leave_render(&mut self) {
        self.rendering.pop();
    }

    /* ===================== Format Specs ===================== */

    /// `format(value, spec)`
    pub(crate) fn format_value(&mut self, value: &Val, spec: &str) -> EvalResult<String> {
        if let Val::Instance(instance) = value {
            if let Some(method) = instance.class.lookup("__format__") {
                let result =
                    self.call(&method, Args::new(vec![value.clone(), Val::from(spec)]))?;
                return match result {
                    Val::Str(s) => Ok(s.to_string()),
                    other => Err(Throw::type_error(format!(
                        "__format__ must return a str, not {}",
                        other.type_name()
                    ))),
                };
            }
        }
        if spec.is_empty() {
            return self.to_str(value);
        }

        let parsed = FormatSpec::parse(spec)?;
        match value {
            Val::Bool(_) | Val::Int(_) if parsed.kind.is_none() && parsed.is_plain() => {
                self.to_str(value).map(|s| parsed.pad(s, Align::Right))
            }
            Val::Int(_) | Val::Bool(_) => {
                let i = value.as_int().unwrap_or_default();
                parsed.format_int(i, &value.type_name())
            }
            Val::Float(f) => parsed.format_float(*f, "float"),
            Val::Str(s) => parsed.format_str(s),
            Val::Complex(c) if parsed.kind.is_none() => {
                let text = complex_repr(c.re, c.im);
                Ok(parsed.pad(text, Align::Right))
            }
            _ if parsed.is_plain() && parsed.kind.is_none() => {
                let text = self.to_str(value)?;
                Ok(parsed.pad(text, Align::Left))
            }
            other => Err(Throw::type_error(format!(
                "unsupported format string passed to {}.__format__",
                other.type_name()
            ))),
        }
    }

    /* ===================== str.format ===================== */

    /// `template.format(*args, **kwargs)`
    pub(crate) fn str_format(&mut self, template: &str, args: &Args) -> EvalResult<String> {
        let chars: Vec<char> = template.chars().collect();
        let mut out = String::new();
        let mut auto_index = 0usize;
        let mut numbering: Option<bool> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '}' {
                if chars.get(i + 1) == Some(&'}') {
                    out.push('}');
                    i += 2;
                    continue;
                }
                return Err(Throw::value_error(
                    "Single '}' encountered in format string",
                ));
            }
            if c != '{' {
                out.push(c);
                i += 1;
                continue;
            }
            if chars.get(i + 1) == Some(&'{') {
                out.push('{');
                i += 2;
                continue;
            }

            // Find the matching close brace, allowing one level of nesting in the spec
            let mut depth = 1;
            let mut j = i + 1;
            while j < chars.len() {
                match chars[j] {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                j += 1;
            }
            if j >= chars.len() {
                return Err(Throw::value_error(
                    "Single '{' encountered in format string",
                ));
            }
            let field: String = chars[i + 1..j].iter().collect();
            i = j + 1;

            let (body, spec) = match field.find(':') {
                Some(pos) => (&field[..pos], &field[pos + 1..]),
                None => (field.as_str(), ""),
            };
            let (name, conversion) = match body.find('!') {
                Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
                None => (body, None),
            };

            let value =
                self.format_field(name, args, &mut auto_index, &mut numbering)?;
            let value = match conversion {
                None => value,
                Some("r") | Some("a") => Val::from(self.repr(&value)?),
                Some("s") => Val::from(self.to_str(&value)?),
                Some(other) => {
                    return Err(Throw::value_error(format!(
                        "Unknown conversion specifier {}",
                        other
                    )))
                }
            };
            let spec = if spec.contains('{') {
                self.str_format(spec, args)?
            } else {
                spec.to_string()
            };
            out.push_str(&self.format_value(&value, &spec)?);
        }
        Ok(out)
    }

    fn format_field(
        &mut self,
        name: &str,
        args: &Args,
        auto_index: &mut usize,
        numbering: &mut Option<bool>,
    ) -> EvalResult {
        let split = name.find(['.', '[']).unwrap_or(name.len());
        let (head, mut rest) = name.split_at(split);

        let mut value = if head.is_empty() {
            if *numbering == Some(false) {
                return Err(Throw::value_error(
                    "cannot switch from manual field specification to automatic field numbering",
                ));
            }
            *numbering = Some(true);
            let index = *auto_index;
            *auto_index += 1;
            positional(args, index)?
        } else if let Ok(index) = head.parse::<usize>() {
            if *numbering == Some(true) {
                return Err(Throw::value_error(
                    "cannot switch from automatic field numbering to manual field specification",
                ));
            }
            *numbering = Some(false);
            positional(args, index)?
        } else {
            args.keywords
                .iter()
                .find(|(k, _)| &**k == head)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| Throw::key_error(Val::from(head)))?
        };

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let end = after.find(['.', '[']).unwrap_or(after.len());
                value = self.get_attr(&value, &after[..end])?;
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let end = after
                    .find(']')
                    .ok_or_else(|| Throw::value_error("Missing ']' in format string"))?;
                let key = &after[..end];
                let key = match key.parse::<i64>() {
                    Ok(i) => Val::Int(i),
                    Err(_) => Val::from(key),
                };
                value = self.get_item(&value, &key)?;
                rest = &after[end + 1..];
            } else {
                return Err(Throw::value_error(
                    "Only '.' or '[' may follow ']' in format field specifier",
                ));
            }
        }
        Ok(value)
    }

    /* ===================== printf ===================== */

    /// `template % args`
    pub(crate) fn printf(&mut self, template: &str, args: &Val) -> EvalResult<String> {
        let (values, mapping) = match args {
            Val::Tuple(items) => (items.to_vec(), None),
            Val::Dict(_) => (Vec::new(), Some(args.clone())),
            other => (vec![other.clone()], None),
        };
        let mut next = 0usize;
        let mut out = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }

            let mut key = None;
            if chars.peek() == Some(&'(') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(Throw::value_error("incomplete format key"))
                        }
                    }
                }
                key = Some(name);
            }

            let mut spec = FormatSpec::default();
            while let Some(&flag) = chars.peek() {
                match flag {
                    '-' => spec.align = Some(Align::Left),
                    '+' => spec.sign = Sign::Plus,
                    ' ' => spec.sign = Sign::Space,
                    '#' => spec.alternate = true,
                    '0' => spec.zero = true,
                    _ => break,
                }
                chars.next();
            }
            spec.width = take_number(&mut chars)?;
            if chars.peek() == Some(&'.') {
                chars.next();
                spec.precision = Some(take_number(&mut chars)?.unwrap_or(0));
            }
            if spec.align == Some(Align::Left) {
                spec.zero = false;
            }

            let Some(kind) = chars.next() else {
                return Err(Throw::value_error("incomplete format"));
            };
            if kind == '%' {
                out.push('%');
                continue;
            }

            let value = match (&key, &mapping) {
                (Some(name), Some(mapping)) => self.get_item(mapping, &Val::from(name.as_str()))?,
                (Some(_), None) => {
                    return Err(Throw::type_error("format requires a mapping"))
                }
                (None, Some(mapping)) if next == 0 => {
                    next += 1;
                    mapping.clone()
                }
                (None, _) => {
                    let value = values.get(next).cloned().ok_or_else(|| {
                        Throw::type_error("not enough arguments for format string")
                    })?;
                    next += 1;
                    value
                }
            };

            let text = match kind {
                's' => {
                    let s = self.to_str(&value)?;
                    spec.pad(truncate(s, spec.precision), Align::Right)
                }
                'r' | 'a' => {
                    let s = self.repr(&value)?;
                    spec.pad(truncate(s, spec.precision), Align::Right)
                }
                'd' | 'i' | 'u' => {
                    let i = match &value {
                        Val::Float(f) => f.trunc() as i64,
                        other => other.as_int().ok_or_else(|| {
                            Throw::type_error(format!(
                                "%{} format: a real number is required, not {}",
                                kind,
                                other.type_name()
                            ))
                        })?,
                    };
                    spec.kind = Some('d');
                    spec.precision = None;
                    spec.format_int(i, "int")?
                }
                'x' | 'X' | 'o' => {
                    let i = value.as_int().ok_or_else(|| {
                        Throw::type_error(format!(
                            "%{} format: an integer is required, not {}",
                            kind,
                            value.type_name()
                        ))
                    })?;
                    spec.kind = Some(kind);
                    spec.precision = None;
                    spec.format_int(i, "int")?
                }
                'c' => {
                    let text = match &value {
                        Val::Str(s) if s.chars().count() == 1 => s.to_string(),
                        other => {
                            let code = other.as_int().ok_or_else(|| {
                                Throw::type_error("%c requires int or char")
                            })?;
                            u32::try_from(code)
                                .ok()
                                .and_then(char::from_u32)
                                .map(String::from)
                                .ok_or_else(|| {
                                    Throw::overflow("%c arg not in range(0x110000)")
                                })?
                        }
                    };
                    spec.pad(text, Align::Right)
                }
                'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                    let f = value.as_float().ok_or_else(|| {
                        Throw::type_error(format!(
                            "must be real number, not {}",
                            value.type_name()
                        ))
                    })?;
                    spec.kind = Some(kind);
                    if spec.precision.is_none() {
                        spec.precision = Some(6);
                    }
                    spec.format_float(f, "float")?
                }
                other => {
                    return Err(Throw::value_error(format!(
                        "unsupported format character '{}' ({:#x})",
                        other, other as u32
                    )))
                }
            };
            out.push_str(&text);
        }

        if mapping.is_none() && next < values.len() {
            return Err(Throw::type_error(
                "not all arguments converted during string formatting",
            ));
        }
        Ok(out)
    }
}

fn positional(args: &Args, index: usize) -> EvalResult {
    args.positional.get(index).cloned().ok_or_else(|| {
        Throw::new(
            ExcType::IndexError,
            format!(
                "Replacement index {} out of range for positional args tuple",
                index
            ),
        )
    })
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> EvalResult<Option<usize>> {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    spec_number(&digits)
}

/// A width or precision; bounded so padding never allocates past the
/// sequence limit
fn spec_number(digits: &str) -> EvalResult<Option<usize>> {
    if digits.is_empty() {
        return Ok(None);
    }
    let n: usize = digits
        .parse()
        .map_err(|_| Throw::value_error("Too many decimal digits in format string"))?;
    check_length(n)?;
    Ok(Some(n))
}

fn truncate(s: String, precision: Option<usize>) -> String {
    match precision {
        Some(p) => s.chars().take(p).collect(),
        None => s,
    }
}

/* ===================== Format Spec Mini-Language ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    /// Padding goes between the sign and the digits
    AfterSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Sign {
    #[default]
    Minus,
    Plus,
    Space,
}

/// `[[fill]align][sign][#][0][width][grouping][.precision][type]`
#[derive(Debug, Clone, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<Align>,
    sign: Sign,
    alternate: bool,
    zero: bool,
    width: Option<usize>,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

impl FormatSpec {
    fn parse(spec: &str) -> EvalResult<FormatSpec> {
        let chars: Vec<char> = spec.chars().collect();
        let mut out = FormatSpec::default();
        let mut i = 0;

        if chars.len() >= 2 && align_of(chars[1]).is_some() {
            out.fill = Some(chars[0]);
            out.align = align_of(chars[1]);
            i = 2;
        } else if let Some(align) = chars.first().copied().and_then(align_of) {
            out.align = Some(align);
            i = 1;
        }

        match chars.get(i) {
            Some('+') => {
                out.sign = Sign::Plus;
                i += 1;
            }
            Some('-') => i += 1,
            Some(' ') => {
                out.sign = Sign::Space;
                i += 1;
            }
            _ => {}
        }
        if chars.get(i) == Some(&'#') {
            out.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            out.zero = true;
            i += 1;
        }

        let mut width = String::new();
        while let Some(c) = chars.get(i).filter(|c| c.is_ascii_digit()) {
            width.push(*c);
            i += 1;
        }
        out.width = spec_number(&width)?;

        if let Some(&c @ (',' | '_')) = chars.get(i) {
            out.grouping = Some(c);
            i += 1;
        }

        if chars.get(i) == Some(&'.') {
            i += 1;
            let mut precision = String::new();
            while let Some(c) = chars.get(i).filter(|c| c.is_ascii_digit()) {
                precision.push(*c);
                i += 1;
            }
            if precision.is_empty() {
                return Err(Throw::value_error("Format specifier missing precision"));
            }
            out.precision = spec_number(&precision)?;
        }

        if let Some(&kind) = chars.get(i) {
            out.kind = Some(kind);
            i += 1;
        }
        if i != chars.len() {
            return Err(Throw::value_error("Invalid format specifier"));
        }
        out.check_grouping()?;
        Ok(out)
    }

    /// `,` only suits decimal presentations; `_` also groups b, o, x and X
    fn check_grouping(&self) -> EvalResult<()> {
        let (Some(sep), Some(kind)) = (self.grouping, self.kind) else {
            return Ok(());
        };
        let allowed = match kind {
            'b' | 'o' | 'x' | 'X' => sep == '_',
            'c' | 'n' | 's' => false,
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(Throw::value_error(format!(
                "Cannot specify '{}' with '{}'.",
                sep, kind
            )))
        }
    }

    /// Only fill, alignment and width were given
    fn is_plain(&self) -> bool {
        self.sign == Sign::Minus
            && !self.alternate
            && !self.zero
            && self.grouping.is_none()
            && self.precision.is_none()
    }

    fn unknown_code(&self, type_name: &str) -> Throw {
        Throw::value_error(format!(
            "Unknown format code '{}' for object of type '{}'",
            self.kind.unwrap_or(' '),
            type_name
        ))
    }

    /// Pad `text` to the width with the fill character
    fn pad(&self, text: String, default: Align) -> String {
        let Some(width) = self.width else {
            return text;
        };
        let len = text.chars().count();
        if len >= width {
            return text;
        }
        let fill = self.fill.unwrap_or(if self.zero { '0' } else { ' ' });
        let align = self.align.unwrap_or(if self.zero { Align::AfterSign } else { default });
        let gap = width - len;
        let repeat = |n: usize| fill.to_string().repeat(n);
        match align {
            Align::Left => format!("{}{}", text, repeat(gap)),
            Align::Right => format!("{}{}", repeat(gap), text),
            Align::Center => format!("{}{}{}", repeat(gap / 2), text, repeat(gap - gap / 2)),
            Align::AfterSign => {
                let split = text
                    .char_indices()
                    .find(|(_, c)| !matches!(c, '+' | '-' | ' '))
                    .map_or(text.len(), |(i, _)| i);
                let (sign, digits) = text.split_at(split);
                let (prefix, digits) = match digits.get(..2) {
                    Some("0x" | "0X" | "0o" | "0b") => digits.split_at(2),
                    _ => ("", digits),
                };
                format!("{}{}{}{}", sign, prefix, repeat(gap), digits)
            }
        }
    }

    fn sign_prefix(&self, negative: bool) -> &'static str {
        match (negative, self.sign) {
            (true, _) => "-",
            (false, Sign::Plus) => "+",
            (false, Sign::Space) => " ",
            (false, Sign::Minus) => "",
        }
    }

    fn format_str(&self, s: &str) -> EvalResult<String> {
        match self.kind {
            None | Some('s') => {}
            _ => return Err(self.unknown_code("str")),
        }
        if self.sign != Sign::Minus {
            return Err(Throw::value_error("Sign not allowed in string format specifier"));
        }
        if let Some(sep) = self.grouping {
            return Err(Throw::value_error(format!("Cannot specify '{}' with 's'.", sep)));
        }
        if self.align == Some(Align::AfterSign) {
            return Err(Throw::value_error(
                "'=' alignment not allowed in string format specifier",
            ));
        }
        Ok(self.pad(truncate(s.to_string(), self.precision), Align::Left))
    }

    fn format_int(&self, i: i64, type_name: &str) -> EvalResult<String> {
        let magnitude = i.unsigned_abs();
        let (digits, prefix) = match self.kind {
            None | Some('d') | Some('n') => (magnitude.to_string(), ""),
            Some('b') => (format!("{:b}", magnitude), "0b"),
            Some('o') => (format!("{:o}", magnitude), "0o"),
            Some('x') => (format!("{:x}", magnitude), "0x"),
            Some('X') => (format!("{:X}", magnitude), "0X"),
            Some('c') => {
                let c = u32::try_from(i)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| Throw::overflow("%c arg not in range(0x110000)"))?;
                return Ok(self.pad(c.to_string(), Align::Left));
            }
            Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%') => {
                return self.format_float(i as f64, type_name)
            }
            _ => return Err(self.unknown_code(type_name)),
        };
        if self.precision.is_some() {
            return Err(Throw::value_error(
                "Precision not allowed in integer format specifier",
            ));
        }
        let digits = match self.grouping {
            Some(sep) => {
                let every = if matches!(self.kind, None | Some('d') | Some('n')) { 3 } else { 4 };
                group_digits(&digits, sep, every)
            }
            None => digits,
        };
        let prefix = if self.alternate { prefix } else { "" };
        let text = format!("{}{}{}", self.sign_prefix(i < 0), prefix, digits);
        Ok(self.pad(text, Align::Right))
    }

    fn format_float(&self, f: f64, type_name: &str) -> EvalResult<String> {
        let negative = f.is_sign_negative() && !f.is_nan();
        let magnitude = f.abs();
        let upper = matches!(self.kind, Some('E' | 'F' | 'G'));

        let body = if !magnitude.is_finite() {
            let text = if magnitude.is_nan() { "nan" } else { "inf" };
            if upper {
                text.to_uppercase()
            } else {
                text.to_string()
            }
        } else {
            match self.kind {
                Some('f' | 'F') => format!("{:.*}", self.precision.unwrap_or(6), magnitude),
                Some('e' | 'E') => {
                    let text = exponent_form(magnitude, self.precision.unwrap_or(6));
                    if upper {
                        text.to_uppercase()
                    } else {
                        text
                    }
                }
                Some('g' | 'G') => {
                    let text = general_form(magnitude, self.precision.unwrap_or(6), self.alternate);
                    if upper {
                        text.to_uppercase()
                    } else {
                        text
                    }
                }
                Some('%') => format!("{:.*}%", self.precision.unwrap_or(6), magnitude * 100.0),
                Some('n') => general_form(magnitude, self.precision.unwrap_or(6), false),
                None => match self.precision {
                    // Like 'g' but always keeps a decimal point
                    Some(p) => {
                        let text = general_form(magnitude, p.max(1), false);
                        if text.contains(['.', 'e']) {
                            text
                        } else {
                            format!("{}.0", text)
                        }
                    }
                    None => float_repr(magnitude),
                },
                _ => return Err(self.unknown_code(type_name)),
            }
        };

        let body = match self.grouping {
            Some(sep) if magnitude.is_finite() => {
                let split = body.find(['.', 'e', '%']).unwrap_or(body.len());
                let (int_part, rest) = body.split_at(split);
                format!("{}{}", group_digits(int_part, sep, 3), rest)
            }
            _ => body,
        };
        let text = format!("{}{}", self.sign_prefix(negative), body);
        Ok(self.pad(text, Align::Right))
    }
}

/// `1.234560e+03` style
fn exponent_form(f: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, f);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => text,
    }
}

/// `g` presentation: significant digits, exponent form for extreme values
fn general_form(f: f64, precision: usize, keep_zeros: bool) -> String {
    let precision = precision.max(1);
    if f == 0.0 {
        return if keep_zeros {
            format!("{:.*}", precision - 1, 0.0)
        } else {
            "0".to_string()
        };
    }
    let exp = {
        let text = format!("{:.*e}", precision - 1, f);
        text.split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };
    if exp < -4 || exp >= precision as i32 {
        let text = exponent_form(f, precision - 1);
        if keep_zeros {
            return text;
        }
        match text.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{}", strip_zeros(mantissa), exp),
            None => text,
        }
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        let text = format!("{:.*}", decimals, f);
        if keep_zeros {
            return text;
        }
        strip_zeros(&text)
    }
}

fn strip_zeros(text: &str) -> String {
    if !text.contains('.') {
        return text.to_string();
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Insert `sep` every `every` digits from the right
fn group_digits(digits: &str, sep: char, every: usize) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(chars.len() + chars.len() / every);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % every == 0 {
            out.push(sep);
        }
        out.push(*c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_form() {
        assert_eq!(general_form(1234.5, 6, false), "1234.5");
        assert_eq!(general_form(0.00001234, 6, false), "1.234e-05");
        assert_eq!(general_form(1e20, 6, false), "1e+20");
        assert_eq!(general_form(3.0, 6, false), "3");
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits("1234567", ',', 3), "1,234,567");
        assert_eq!(group_digits("123", ',', 3), "123");
        assert_eq!(group_digits("11111111", '_', 4), "1111_1111");
    }

    #[test]
    fn test_spec_parsing() {
        let spec = FormatSpec::parse("*^+#010,.3f").unwrap();
        assert_eq!(spec.fill, Some('*'));
        assert_eq!(spec.align, Some(Align::Center));
        assert_eq!(spec.sign, Sign::Plus);
        assert!(spec.alternate);
        assert!(spec.zero);
        assert_eq!(spec.width, Some(10));
        assert_eq!(spec.grouping, Some(','));
        assert_eq!(spec.precision, Some(3));
        assert_eq!(spec.kind, Some('f'));
        assert!(FormatSpec::parse(".f").is_err());
    }

    #[test]
    fn test_int_and_float_specs() {
        let spec = |s: &str| FormatSpec::parse(s).unwrap();
        assert_eq!(spec("05d").format_int(42, "int").unwrap(), "00042");
        assert_eq!(spec("#x").format_int(255, "int").unwrap(), "0xff");
        assert_eq!(spec(",").format_int(-1234567, "int").unwrap(), "-1,234,567");
        assert_eq!(spec(".2f").format_float(3.14159, "float").unwrap(), "3.14");
        assert_eq!(spec(">8.1f").format_float(2.26, "float").unwrap(), "     2.3");
        assert_eq!(spec(".1%").format_float(0.125, "float").unwrap(), "12.5%");
        assert_eq!(spec(".2e").format_float(1234.5, "float").unwrap(), "1.23e+03");
        assert!(spec("d").format_float(1.0, "float").is_err());
    }

    #[test]
    fn test_grouping_must_suit_the_presentation() {
        let err = |s: &str| FormatSpec::parse(s).unwrap_err();
        assert_eq!(err(",x").pending_type(), Some(ExcType::ValueError));
        assert!(FormatSpec::parse(",b").is_err());
        assert!(FormatSpec::parse(",c").is_err());
        assert!(FormatSpec::parse("_n").is_err());

        let spec = |s: &str| FormatSpec::parse(s).unwrap();
        assert_eq!(spec("_x").format_int(0xdeadbeef, "int").unwrap(), "dead_beef");
        assert_eq!(spec(",d").format_int(1000, "int").unwrap(), "1,000");
        assert!(spec(",").format_str("abc").is_err());
    }

    #[test]
    fn test_huge_widths_are_rejected_before_allocating() {
        let err = FormatSpec::parse(">99999999999999").unwrap_err();
        assert_eq!(err.pending_type(), Some(ExcType::OverflowError));
        let err = FormatSpec::parse(".99999999999999f").unwrap_err();
        assert_eq!(err.pending_type(), Some(ExcType::OverflowError));
        let err = FormatSpec::parse("99999999999999999999999").unwrap_err();
        assert_eq!(err.pending_type(), Some(ExcType::ValueError));
        assert_eq!(FormatSpec::parse(">4").unwrap().width, Some(4));
    }

    #[test]
    fn test_plain_repr() {
        assert_eq!(plain_repr(&Val::tuple(vec![Val::Int(1)])), "(1,)");
        assert_eq!(plain_repr(&Val::from("a")), "'a'");
        assert_eq!(plain_repr(&Val::Float(2.0)), "2.0");
    }

    #[test]
    fn test_plain_repr_stops_at_nesting_limit() {
        let mut value = Val::Int(0);
        for _ in 0..MAX_NESTING + 10 {
            value = Val::tuple(vec![value]);
        }
        let text = plain_repr(&value);
        assert!(text.contains("(...)"));
        assert!(text.starts_with("(("));
    }
}
