//! Methods of the built-in types
//!
//! Every method receives its receiver as the first positional argument,
//! which lets the same native serve `"a".upper()` and `str.upper("a")`.

use super::functions::sort_values;
use super::{dict_entries, index_arg};
use crate::interpreter::control::{check_length, EvalResult, Throw};
use crate::interpreter::executor::Interpreter;
use crate::interpreter::object::{
    Args, BuiltinType, DictCell, ListCell, NativeFn, TupleCell, Val,
};
use std::sync::Arc;

/// Method of a built-in type by name
pub(crate) fn lookup(ty: BuiltinType, name: &str) -> Option<&'static NativeFn> {
    match ty {
        BuiltinType::Str => str_method(name),
        BuiltinType::List => list_method(name),
        BuiltinType::Dict => dict_method(name),
        BuiltinType::Tuple => match name {
            "index" => Some(native!("index", tuple_index)),
            "count" => Some(native!("count", tuple_count)),
            _ => None,
        },
        BuiltinType::Int | BuiltinType::Bool => match name {
            "bit_length" => Some(native!("bit_length", int_bit_length)),
            _ => None,
        },
        BuiltinType::Float => match name {
            "is_integer" => Some(native!("is_integer", float_is_integer)),
            _ => None,
        },
        BuiltinType::Complex => match name {
            "conjugate" => Some(native!("conjugate", complex_conjugate)),
            _ => None,
        },
        _ => None,
    }
}

/// Method names of a built-in type, for `dir()`
pub(crate) fn names(ty: BuiltinType) -> &'static [&'static str] {
    match ty {
        BuiltinType::Str => STR_METHODS,
        BuiltinType::List => LIST_METHODS,
        BuiltinType::Dict => DICT_METHODS,
        BuiltinType::Tuple => &["count", "index"],
        BuiltinType::Int | BuiltinType::Bool => &["bit_length"],
        BuiltinType::Float => &["is_integer"],
        BuiltinType::Complex => &["conjugate"],
        _ => &[],
    }
}

const STR_METHODS: &[&str] = &[
    "capitalize",
    "casefold",
    "center",
    "count",
    "endswith",
    "find",
    "format",
    "index",
    "isalnum",
    "isalpha",
    "isdigit",
    "islower",
    "isspace",
    "isupper",
    "join",
    "ljust",
    "lower",
    "lstrip",
    "partition",
    "removeprefix",
    "removesuffix",
    "replace",
    "rfind",
    "rindex",
    "rjust",
    "rpartition",
    "rsplit",
    "rstrip",
    "split",
    "splitlines",
    "startswith",
    "strip",
    "swapcase",
    "title",
    "upper",
    "zfill",
];

const LIST_METHODS: &[&str] = &[
    "append", "clear", "copy", "count", "extend", "index", "insert", "pop", "remove", "reverse",
    "sort",
];

const DICT_METHODS: &[&str] = &[
    "clear",
    "copy",
    "get",
    "items",
    "keys",
    "pop",
    "popitem",
    "setdefault",
    "update",
    "values",
];

/* ===================== Argument Helpers ===================== */

fn descriptor(method: &str, ty: &str, got: Option<&Val>) -> Throw {
    match got {
        Some(value) => Throw::type_error(format!(
            "descriptor '{}' for '{}' objects doesn't apply to a '{}' object",
            method,
            ty,
            value.type_name()
        )),
        None => Throw::type_error(format!(
            "unbound method {}.{}() needs an argument",
            ty, method
        )),
    }
}

/// Check the argument count, not counting the receiver
fn arity(args: &Args, name: &str, min: usize, max: usize) -> EvalResult<()> {
    if let Some((key, _)) = args.keywords.first() {
        return Err(Throw::type_error(format!(
            "{}() takes no keyword arguments: '{}'",
            name, key
        )));
    }
    let n = args.len().saturating_sub(1);
    if n >= min && n <= max {
        return Ok(());
    }
    Err(Throw::type_error(match (min, max) {
        (0, 0) => format!("{}() takes no arguments ({} given)", name, n),
        (a, b) if a == b => format!(
            "{}() takes exactly {} argument{} ({} given)",
            name,
            a,
            if a == 1 { "" } else { "s" },
            n
        ),
        (a, _) if n < a => format!("{}() takes at least {} argument ({} given)", name, a, n),
        (_, b) => format!("{}() takes at most {} arguments ({} given)", name, b, n),
    }))
}

fn this_str(args: &Args, method: &str) -> EvalResult<Arc<str>> {
    match args.get(0) {
        Some(Val::Str(s)) => Ok(s.clone()),
        other => Err(descriptor(method, "str", other)),
    }
}

fn this_list(args: &Args, method: &str) -> EvalResult<Arc<ListCell>> {
    match args.get(0) {
        Some(Val::List(items)) => Ok(items.clone()),
        other => Err(descriptor(method, "list", other)),
    }
}

fn this_dict(
    args: &Args,
    method: &str,
) -> EvalResult<Arc<DictCell>> {
    match args.get(0) {
        Some(Val::Dict(map)) => Ok(map.clone()),
        other => Err(descriptor(method, "dict", other)),
    }
}

/// A string argument
fn str_arg<'a>(args: &'a Args, index: usize, method: &str) -> EvalResult<&'a str> {
    match args.get(index) {
        Some(Val::Str(s)) => Ok(s),
        Some(other) => Err(Throw::type_error(format!(
            "{}() argument {} must be str, not {}",
            method,
            index,
            other.type_name()
        ))),
        None => Err(Throw::type_error(format!("{}() missing required argument", method))),
    }
}

/// An optional string argument where `None` means the default
fn opt_str_arg<'a>(args: &'a Args, index: usize, method: &str) -> EvalResult<Option<&'a str>> {
    match args.get(index) {
        None | Some(Val::None) => Ok(None),
        Some(_) => str_arg(args, index, method).map(Some),
    }
}

fn opt_int_arg(args: &Args, index: usize, default: i64) -> EvalResult<i64> {
    match args.get(index) {
        None | Some(Val::None) => Ok(default),
        Some(value) => index_arg(value),
    }
}

/// Byte offset of the `n`th character
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(b, _)| b)
}

/// Resolve optional `start`/`end` character arguments to a window of `s`
///
/// Returns the byte range and the character index it starts at, or `None`
/// when the window is empty because start lies past end.
fn window(s: &str, start: Option<&Val>, end: Option<&Val>) -> EvalResult<Option<(usize, usize, usize)>> {
    let len = s.chars().count() as i64;
    let resolve = |value: Option<&Val>, default: i64| -> EvalResult<i64> {
        match value {
            None | Some(Val::None) => Ok(default),
            Some(v) => {
                let i = index_arg(v)?;
                Ok(if i < 0 { (i + len).max(0) } else { i.min(len) })
            }
        }
    };
    let start = resolve(start, 0)?;
    let end = resolve(end, len)?;
    if start > end {
        return Ok(None);
    }
    let (start, end) = (start as usize, end as usize);
    Ok(Some((byte_offset(s, start), byte_offset(s, end), start)))
}

/* ===================== str ===================== */

fn str_method(name: &str) -> Option<&'static NativeFn> {
    Some(match name {
        "upper" => native!("upper", str_upper),
        "lower" => native!("lower", str_lower),
        "casefold" => native!("casefold", str_lower),
        "swapcase" => native!("swapcase", str_swapcase),
        "title" => native!("title", str_title),
        "capitalize" => native!("capitalize", str_capitalize),
        "strip" => native!("strip", str_strip),
        "lstrip" => native!("lstrip", str_lstrip),
        "rstrip" => native!("rstrip", str_rstrip),
        "split" => native!("split", str_split),
        "rsplit" => native!("rsplit", str_rsplit),
        "splitlines" => native!("splitlines", str_splitlines),
        "join" => native!("join", str_join),
        "replace" => native!("replace", str_replace),
        "startswith" => native!("startswith", str_startswith),
        "endswith" => native!("endswith", str_endswith),
        "find" => native!("find", str_find),
        "rfind" => native!("rfind", str_rfind),
        "index" => native!("index", str_index),
        "rindex" => native!("rindex", str_rindex),
        "count" => native!("count", str_count),
        "format" => native!("format", str_format),
        "isdigit" => native!("isdigit", str_isdigit),
        "isalpha" => native!("isalpha", str_isalpha),
        "isalnum" => native!("isalnum", str_isalnum),
        "isspace" => native!("isspace", str_isspace),
        "isupper" => native!("isupper", str_isupper),
        "islower" => native!("islower", str_islower),
        "center" => native!("center", str_center),
        "ljust" => native!("ljust", str_ljust),
        "rjust" => native!("rjust", str_rjust),
        "zfill" => native!("zfill", str_zfill),
        "partition" => native!("partition", str_partition),
        "rpartition" => native!("rpartition", str_rpartition),
        "removeprefix" => native!("removeprefix", str_removeprefix),
        "removesuffix" => native!("removesuffix", str_removesuffix),
        _ => return None,
    })
}

fn str_upper(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "upper")?;
    arity(&args, "upper", 0, 0)?;
    Ok(Val::from(s.to_uppercase()))
}

fn str_lower(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "lower")?;
    arity(&args, "lower", 0, 0)?;
    Ok(Val::from(s.to_lowercase()))
}

fn str_swapcase(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "swapcase")?;
    arity(&args, "swapcase", 0, 0)?;
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_uppercase() {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
    }
    Ok(Val::from(out))
}

fn str_title(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "title")?;
    arity(&args, "title", 0, 0)?;
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    Ok(Val::from(out))
}

fn str_capitalize(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "capitalize")?;
    arity(&args, "capitalize", 0, 0)?;
    let mut chars = s.chars();
    let out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    };
    Ok(Val::from(out))
}

fn strip_with(args: Args, name: &str, left: bool, right: bool) -> EvalResult {
    let s = this_str(&args, name)?;
    arity(&args, name, 0, 1)?;
    let chars = opt_str_arg(&args, 1, name)?;
    let matches = |c: char| match chars {
        Some(set) => set.contains(c),
        None => c.is_whitespace(),
    };
    let mut out: &str = &s;
    if left {
        out = out.trim_start_matches(matches);
    }
    if right {
        out = out.trim_end_matches(matches);
    }
    Ok(Val::from(out))
}

fn str_strip(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    strip_with(args, "strip", true, true)
}

fn str_lstrip(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    strip_with(args, "lstrip", true, false)
}

fn str_rstrip(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    strip_with(args, "rstrip", false, true)
}

/// `sep` and `maxsplit` for `split` and `rsplit`, positional or keyword
fn split_args(args: &mut Args, name: &str) -> EvalResult<(Option<String>, i64)> {
    let sep_kw = args.take_keyword("sep");
    let max_kw = args.take_keyword("maxsplit");
    arity(args, name, 0, 2)?;
    let sep = match sep_kw.or_else(|| args.get(1).cloned()) {
        None | Some(Val::None) => None,
        Some(Val::Str(s)) if s.is_empty() => return Err(Throw::value_error("empty separator")),
        Some(Val::Str(s)) => Some(s.to_string()),
        Some(other) => {
            return Err(Throw::type_error(format!(
                "must be str or None, not {}",
                other.type_name()
            )))
        }
    };
    let maxsplit = match max_kw.or_else(|| args.get(2).cloned()) {
        Some(value) => index_arg(&value)?,
        None => -1,
    };
    Ok((sep, maxsplit))
}

fn split_whitespace(s: &str, maxsplit: i64) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if maxsplit >= 0 && out.len() as i64 == maxsplit {
            out.push(rest.to_string());
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(i) => {
                out.push(rest[..i].to_string());
                rest = rest[i..].trim_start();
            }
            None => {
                out.push(rest.to_string());
                break;
            }
        }
    }
    out
}

fn rsplit_whitespace(s: &str, maxsplit: i64) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = s.trim_end();
    while !rest.is_empty() {
        if maxsplit >= 0 && out.len() as i64 == maxsplit {
            out.push(rest.to_string());
            break;
        }
        match rest.rfind(char::is_whitespace) {
            Some(i) => {
                let width = rest[i..].chars().next().map_or(1, char::len_utf8);
                out.push(rest[i + width..].to_string());
                rest = rest[..i].trim_end();
            }
            None => {
                out.push(rest.to_string());
                break;
            }
        }
    }
    out.reverse();
    out
}

fn to_list(parts: Vec<String>) -> Val {
    Val::list(parts.into_iter().map(Val::from).collect())
}

fn str_split(_: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let s = this_str(&args, "split")?;
    let (sep, maxsplit) = split_args(&mut args, "split")?;
    let parts = match sep {
        None => split_whitespace(&s, maxsplit),
        Some(sep) if maxsplit < 0 => s.split(sep.as_str()).map(str::to_string).collect(),
        Some(sep) => s
            .splitn(maxsplit as usize + 1, sep.as_str())
            .map(str::to_string)
            .collect(),
    };
    Ok(to_list(parts))
}

fn str_rsplit(_: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let s = this_str(&args, "rsplit")?;
    let (sep, maxsplit) = split_args(&mut args, "rsplit")?;
    let parts = match sep {
        None => rsplit_whitespace(&s, maxsplit),
        Some(sep) if maxsplit < 0 => s.split(sep.as_str()).map(str::to_string).collect(),
        Some(sep) => {
            let mut parts: Vec<String> = s
                .rsplitn(maxsplit as usize + 1, sep.as_str())
                .map(str::to_string)
                .collect();
            parts.reverse();
            parts
        }
    };
    Ok(to_list(parts))
}

fn str_splitlines(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let s = this_str(&args, "splitlines")?;
    let keepends = args.take_keyword("keepends");
    arity(&args, "splitlines", 0, 1)?;
    let keepends = match keepends.or_else(|| args.get(1).cloned()) {
        Some(value) => interp.truthy(&value)?,
        None => false,
    };

    let mut parts = Vec::new();
    let mut line = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' | '\r' => {
                let mut ending = c.to_string();
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                    ending.push('\n');
                }
                if keepends {
                    line.push_str(&ending);
                }
                parts.push(std::mem::take(&mut line));
            }
            c => line.push(c),
        }
    }
    if !line.is_empty() {
        parts.push(line);
    }
    Ok(to_list(parts))
}

fn str_join(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let sep = this_str(&args, "join")?;
    arity(&args, "join", 1, 1)?;
    let items = interp.collect(&args.positional[1])?;
    let mut total = sep.len().saturating_mul(items.len().saturating_sub(1));
    for (i, item) in items.iter().enumerate() {
        match item {
            Val::Str(s) => total = total.saturating_add(s.len()),
            other => {
                return Err(Throw::type_error(format!(
                    "sequence item {}: expected str instance, {} found",
                    i,
                    other.type_name()
                )))
            }
        }
    }
    check_length(total)?;

    let mut out = String::with_capacity(total);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(&sep);
        }
        if let Val::Str(s) = item {
            out.push_str(s);
        }
    }
    Ok(Val::from(out))
}

fn str_replace(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "replace")?;
    arity(&args, "replace", 2, 3)?;
    let old = str_arg(&args, 1, "replace")?;
    let new = str_arg(&args, 2, "replace")?;
    let count = opt_int_arg(&args, 3, -1)?;
    if new.len() > old.len() {
        let found = if old.is_empty() {
            s.chars().count() + 1
        } else {
            s.matches(old).count()
        };
        let replaced = if count < 0 { found } else { found.min(count as usize) };
        check_length(s.len().saturating_add(replaced.saturating_mul(new.len() - old.len())))?;
    }
    let out = if count < 0 {
        s.replace(old, new)
    } else {
        s.replacen(old, new, count as usize)
    };
    Ok(Val::from(out))
}

fn affix_check(args: Args, name: &str, at_start: bool) -> EvalResult {
    let s = this_str(&args, name)?;
    arity(&args, name, 1, 3)?;
    let Some((from, to, _)) = window(&s, args.get(2), args.get(3))? else {
        return Ok(Val::Bool(false));
    };
    let slice = &s[from..to];
    let test = |affix: &str| {
        if at_start {
            slice.starts_with(affix)
        } else {
            slice.ends_with(affix)
        }
    };
    match &args.positional[1] {
        Val::Str(affix) => Ok(Val::Bool(test(affix))),
        Val::Tuple(options) => {
            for option in options.iter() {
                match option {
                    Val::Str(affix) if test(affix) => return Ok(Val::Bool(true)),
                    Val::Str(_) => {}
                    other => {
                        return Err(Throw::type_error(format!(
                            "tuple for {} must only contain str, not {}",
                            name,
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Val::Bool(false))
        }
        other => Err(Throw::type_error(format!(
            "{} first arg must be str or a tuple of str, not {}",
            name,
            other.type_name()
        ))),
    }
}

fn str_startswith(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    affix_check(args, "startswith", true)
}

fn str_endswith(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    affix_check(args, "endswith", false)
}

/// Character index of `sub` within the window, searching from either end
fn search(args: &Args, name: &str, from_right: bool) -> EvalResult<Option<usize>> {
    let s = this_str(args, name)?;
    arity(args, name, 1, 3)?;
    let sub = str_arg(args, 1, name)?;
    let Some((from, to, first_char)) = window(&s, args.get(2), args.get(3))? else {
        return Ok(None);
    };
    let slice = &s[from..to];
    let found = if from_right {
        slice.rfind(sub)
    } else {
        slice.find(sub)
    };
    Ok(found.map(|byte| first_char + slice[..byte].chars().count()))
}

fn found_or(result: Option<usize>, missing: i64) -> Val {
    result.map_or(Val::Int(missing), Val::from)
}

fn str_find(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    search(&args, "find", false).map(|r| found_or(r, -1))
}

fn str_rfind(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    search(&args, "rfind", true).map(|r| found_or(r, -1))
}

fn str_index(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    search(&args, "index", false)?
        .map(Val::from)
        .ok_or_else(|| Throw::value_error("substring not found"))
}

fn str_rindex(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    search(&args, "rindex", true)?
        .map(Val::from)
        .ok_or_else(|| Throw::value_error("substring not found"))
}

fn str_count(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "count")?;
    arity(&args, "count", 1, 3)?;
    let sub = str_arg(&args, 1, "count")?;
    let Some((from, to, _)) = window(&s, args.get(2), args.get(3))? else {
        return Ok(Val::Int(0));
    };
    let slice = &s[from..to];
    let n = if sub.is_empty() {
        slice.chars().count() + 1
    } else {
        slice.matches(sub).count()
    };
    Ok(Val::from(n))
}

fn str_format(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let template = this_str(&args, "format")?;
    let Args {
        mut positional,
        keywords,
    } = args;
    positional.remove(0);
    let rest = Args {
        positional,
        keywords,
    };
    interp.str_format(&template, &rest).map(Val::from)
}

fn char_test(args: Args, name: &str, test: fn(&str) -> bool) -> EvalResult {
    let s = this_str(&args, name)?;
    arity(&args, name, 0, 0)?;
    Ok(Val::Bool(test(&s)))
}

fn str_isdigit(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    char_test(args, "isdigit", |s| !s.is_empty() && s.chars().all(char::is_numeric))
}

fn str_isalpha(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    char_test(args, "isalpha", |s| !s.is_empty() && s.chars().all(char::is_alphabetic))
}

fn str_isalnum(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    char_test(args, "isalnum", |s| !s.is_empty() && s.chars().all(char::is_alphanumeric))
}

fn str_isspace(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    char_test(args, "isspace", |s| !s.is_empty() && s.chars().all(char::is_whitespace))
}

fn str_isupper(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    char_test(args, "isupper", |s| {
        s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
    })
}

fn str_islower(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    char_test(args, "islower", |s| {
        s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase)
    })
}

/// A target width, bounded before any padding is allocated
fn width_arg(value: &Val) -> EvalResult<usize> {
    let width = index_arg(value)?.max(0) as usize;
    check_length(width)?;
    Ok(width)
}

/// Width and fill character for the justification methods
fn justify_args(args: &Args, name: &str) -> EvalResult<(usize, char)> {
    arity(args, name, 1, 2)?;
    let width = width_arg(&args.positional[1])?;
    let fill = match args.get(2) {
        None => ' ',
        Some(Val::Str(s)) if s.chars().count() == 1 => s.chars().next().unwrap_or(' '),
        Some(Val::Str(_)) => {
            return Err(Throw::type_error(
                "The fill character must be exactly one character long",
            ))
        }
        Some(other) => {
            return Err(Throw::type_error(format!(
                "The fill character must be a unicode character, not {}",
                other.type_name()
            )))
        }
    };
    Ok((width, fill))
}

fn str_center(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "center")?;
    let (width, fill) = justify_args(&args, "center")?;
    let len = s.chars().count();
    if len >= width {
        return Ok(Val::Str(s));
    }
    let pad = width - len;
    let left = pad / 2 + (pad & width & 1);
    let fill = |n: usize| fill.to_string().repeat(n);
    Ok(Val::from(format!("{}{}{}", fill(left), s, fill(pad - left))))
}

fn str_ljust(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "ljust")?;
    let (width, fill) = justify_args(&args, "ljust")?;
    let pad = width.saturating_sub(s.chars().count());
    Ok(Val::from(format!("{}{}", s, fill.to_string().repeat(pad))))
}

fn str_rjust(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "rjust")?;
    let (width, fill) = justify_args(&args, "rjust")?;
    let pad = width.saturating_sub(s.chars().count());
    Ok(Val::from(format!("{}{}", fill.to_string().repeat(pad), s)))
}

fn str_zfill(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "zfill")?;
    arity(&args, "zfill", 1, 1)?;
    let width = width_arg(&args.positional[1])?;
    let pad = width.saturating_sub(s.chars().count());
    let (sign, digits) = match s.chars().next() {
        Some(c @ ('+' | '-')) => (c.to_string(), &s[1..]),
        _ => (String::new(), &*s),
    };
    Ok(Val::from(format!("{}{}{}", sign, "0".repeat(pad), digits)))
}

fn partition_with(args: Args, name: &str, from_right: bool) -> EvalResult {
    let s = this_str(&args, name)?;
    arity(&args, name, 1, 1)?;
    let sep = str_arg(&args, 1, name)?;
    if sep.is_empty() {
        return Err(Throw::value_error("empty separator"));
    }
    let split = if from_right {
        s.rsplit_once(sep)
    } else {
        s.split_once(sep)
    };
    let parts = match split {
        Some((head, tail)) => [head, sep, tail],
        None if from_right => ["", "", &*s],
        None => [&*s, "", ""],
    };
    Ok(Val::tuple(parts.into_iter().map(Val::from).collect()))
}

fn str_partition(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    partition_with(args, "partition", false)
}

fn str_rpartition(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    partition_with(args, "rpartition", true)
}

fn str_removeprefix(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "removeprefix")?;
    arity(&args, "removeprefix", 1, 1)?;
    let prefix = str_arg(&args, 1, "removeprefix")?;
    Ok(Val::from(s.strip_prefix(prefix).unwrap_or(&s)))
}

fn str_removesuffix(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let s = this_str(&args, "removesuffix")?;
    arity(&args, "removesuffix", 1, 1)?;
    let suffix = str_arg(&args, 1, "removesuffix")?;
    Ok(Val::from(s.strip_suffix(suffix).unwrap_or(&s)))
}

/* ===================== list ===================== */

fn list_method(name: &str) -> Option<&'static NativeFn> {
    Some(match name {
        "append" => native!("append", list_append),
        "extend" => native!("extend", list_extend),
        "insert" => native!("insert", list_insert),
        "pop" => native!("pop", list_pop),
        "remove" => native!("remove", list_remove),
        "index" => native!("index", list_index),
        "count" => native!("count", list_count),
        "sort" => native!("sort", list_sort),
        "reverse" => native!("reverse", list_reverse),
        "clear" => native!("clear", list_clear),
        "copy" => native!("copy", list_copy),
        _ => return None,
    })
}

fn list_append(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "append")?;
    arity(&args, "append", 1, 1)?;
    items.lock().push(args.positional[1].clone());
    Ok(Val::None)
}

fn list_extend(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "extend")?;
    arity(&args, "extend", 1, 1)?;
    let extra = interp.collect(&args.positional[1])?;
    items.lock().extend(extra);
    Ok(Val::None)
}

fn list_insert(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "insert")?;
    arity(&args, "insert", 2, 2)?;
    let index = index_arg(&args.positional[1])?;
    let mut items = items.lock();
    let len = items.len() as i64;
    let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
    items.insert(at as usize, args.positional[2].clone());
    Ok(Val::None)
}

fn list_pop(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "pop")?;
    arity(&args, "pop", 0, 1)?;
    let index = opt_int_arg(&args, 1, -1)?;
    let mut items = items.lock();
    if items.is_empty() {
        return Err(Throw::index_error("pop from empty list"));
    }
    let len = items.len() as i64;
    let at = if index < 0 { index + len } else { index };
    if at < 0 || at >= len {
        return Err(Throw::index_error("pop index out of range"));
    }
    Ok(items.remove(at as usize))
}

/// Position of the first item equal to `needle`
fn position(interp: &mut Interpreter<'_>, items: &[Val], needle: &Val) -> EvalResult<Option<usize>> {
    for (i, item) in items.iter().enumerate() {
        if item.is(needle) || interp.equals(item, needle)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn list_remove(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "remove")?;
    arity(&args, "remove", 1, 1)?;
    let snapshot = items.lock().clone();
    match position(interp, &snapshot, &args.positional[1])? {
        Some(i) => {
            let mut items = items.lock();
            if i < items.len() {
                items.remove(i);
            }
            Ok(Val::None)
        }
        None => Err(Throw::value_error("list.remove(x): x not in list")),
    }
}

fn list_index(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "index")?;
    arity(&args, "index", 1, 3)?;
    let snapshot = items.lock().clone();
    index_in(interp, &snapshot, &args, "list")
}

/// `seq.index(x[, start[, end]])` over a snapshot
fn index_in(interp: &mut Interpreter<'_>, items: &[Val], args: &Args, what: &str) -> EvalResult {
    let len = items.len() as i64;
    let clamp = |i: i64| if i < 0 { (i + len).max(0) } else { i.min(len) } as usize;
    let start = clamp(opt_int_arg(args, 2, 0)?);
    let end = clamp(opt_int_arg(args, 3, len)?);
    if start < end {
        if let Some(i) = position(interp, &items[start..end], &args.positional[1])? {
            return Ok(Val::from(start + i));
        }
    }
    let needle = interp.repr(&args.positional[1])?;
    Err(Throw::value_error(match what {
        "tuple" => "tuple.index(x): x not in tuple".to_string(),
        _ => format!("{} is not in list", needle),
    }))
}

fn count_in(interp: &mut Interpreter<'_>, items: &[Val], needle: &Val) -> EvalResult {
    let mut n = 0usize;
    for item in items {
        if item.is(needle) || interp.equals(item, needle)? {
            n += 1;
        }
    }
    Ok(Val::from(n))
}

fn list_count(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "count")?;
    arity(&args, "count", 1, 1)?;
    let snapshot = items.lock().clone();
    count_in(interp, &snapshot, &args.positional[1])
}

fn list_sort(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let items = this_list(&args, "sort")?;
    let key = args.take_keyword("key");
    let reverse = match args.take_keyword("reverse") {
        Some(value) => interp.truthy(&value)?,
        None => false,
    };
    if args.len() > 1 {
        return Err(Throw::type_error("sort() takes no positional arguments"));
    }
    arity(&args, "sort", 0, 0)?;
    let snapshot = items.lock().clone();
    let sorted = sort_values(interp, snapshot, key, reverse)?;
    *items.lock() = sorted;
    Ok(Val::None)
}

fn list_reverse(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "reverse")?;
    arity(&args, "reverse", 0, 0)?;
    items.lock().reverse();
    Ok(Val::None)
}

fn list_clear(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "clear")?;
    arity(&args, "clear", 0, 0)?;
    items.lock().clear();
    Ok(Val::None)
}

fn list_copy(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_list(&args, "copy")?;
    arity(&args, "copy", 0, 0)?;
    let copy = items.lock().clone();
    Ok(Val::list(copy))
}

/* ===================== dict ===================== */

fn dict_method(name: &str) -> Option<&'static NativeFn> {
    Some(match name {
        "keys" => native!("keys", dict_keys),
        "values" => native!("values", dict_values),
        "items" => native!("items", dict_items),
        "get" => native!("get", dict_get),
        "pop" => native!("pop", dict_pop),
        "setdefault" => native!("setdefault", dict_setdefault),
        "update" => native!("update", dict_update),
        "clear" => native!("clear", dict_clear),
        "copy" => native!("copy", dict_copy),
        "popitem" => native!("popitem", dict_popitem),
        _ => return None,
    })
}

fn dict_keys(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let map = this_dict(&args, "keys")?;
    arity(&args, "keys", 0, 0)?;
    let keys = map.lock().values().map(|(k, _)| k.clone()).collect();
    Ok(Val::list(keys))
}

fn dict_values(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let map = this_dict(&args, "values")?;
    arity(&args, "values", 0, 0)?;
    let values = map.lock().values().map(|(_, v)| v.clone()).collect();
    Ok(Val::list(values))
}

fn dict_items(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let map = this_dict(&args, "items")?;
    arity(&args, "items", 0, 0)?;
    let items = map
        .lock()
        .values()
        .map(|(k, v)| Val::tuple(vec![k.clone(), v.clone()]))
        .collect();
    Ok(Val::list(items))
}

fn dict_get(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let map = this_dict(&args, "get")?;
    arity(&args, "get", 1, 2)?;
    let key = args.positional[1].hash_key()?;
    let found = map.lock().get(&key).map(|(_, v)| v.clone());
    Ok(found.or_else(|| args.get(2).cloned()).unwrap_or(Val::None))
}

fn dict_pop(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let map = this_dict(&args, "pop")?;
    arity(&args, "pop", 1, 2)?;
    let key = args.positional[1].hash_key()?;
    let removed = map.lock().remove(&key);
    match (removed, args.get(2)) {
        (Some((_, value)), _) => Ok(value),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(Throw::key_error(args.positional[1].clone())),
    }
}

fn dict_setdefault(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let map = this_dict(&args, "setdefault")?;
    arity(&args, "setdefault", 1, 2)?;
    let key_val = args.positional[1].clone();
    let key = key_val.hash_key()?;
    let mut map = map.lock();
    if let Some((_, value)) = map.get(&key) {
        return Ok(value.clone());
    }
    let default = args.get(2).cloned().unwrap_or(Val::None);
    map.insert(key, (key_val, default.clone()));
    Ok(default)
}

fn dict_update(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let map = this_dict(&args, "update")?;
    let keywords = std::mem::take(&mut args.keywords);
    arity(&args, "update", 0, 1)?;
    let mut incoming = match args.get(1) {
        Some(source) => dict_entries(interp, source)?,
        None => crate::interpreter::object::DictMap::new(),
    };
    for (key, value) in keywords {
        let key = Val::Str(key);
        incoming.insert(key.hash_key()?, (key, value));
    }
    let mut map = map.lock();
    for (hash, entry) in incoming.iter() {
        match map.get_mut(hash) {
            Some(existing) => existing.1 = entry.1.clone(),
            None => {
                map.insert(hash.clone(), entry.clone());
            }
        }
    }
    Ok(Val::None)
}

fn dict_clear(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let map = this_dict(&args, "clear")?;
    arity(&args, "clear", 0, 0)?;
    map.lock().clear();
    Ok(Val::None)
}

fn dict_copy(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let map = this_dict(&args, "copy")?;
    arity(&args, "copy", 0, 0)?;
    let copy = map.lock().clone();
    Ok(Val::dict(copy))
}

fn dict_popitem(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let map = this_dict(&args, "popitem")?;
    arity(&args, "popitem", 0, 0)?;
    let last = map.lock().pop_last();
    match last {
        Some((_, (key, value))) => Ok(Val::tuple(vec![key, value])),
        None => Err(Throw::key_error(Val::from("popitem(): dictionary is empty"))),
    }
}

/* ===================== tuple and numbers ===================== */

fn this_tuple(args: &Args, method: &str) -> EvalResult<Arc<TupleCell>> {
    match args.get(0) {
        Some(Val::Tuple(items)) => Ok(items.clone()),
        other => Err(descriptor(method, "tuple", other)),
    }
}

fn tuple_index(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_tuple(&args, "index")?;
    arity(&args, "index", 1, 3)?;
    index_in(interp, &items, &args, "tuple")
}

fn tuple_count(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let items = this_tuple(&args, "count")?;
    arity(&args, "count", 1, 1)?;
    count_in(interp, &items, &args.positional[1])
}

fn int_bit_length(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let Some(i) = args.get(0).and_then(Val::as_int) else {
        return Err(descriptor("bit_length", "int", args.get(0)));
    };
    arity(&args, "bit_length", 0, 0)?;
    Ok(Val::Int((u64::BITS - i.unsigned_abs().leading_zeros()) as i64))
}

fn float_is_integer(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let Some(Val::Float(f)) = args.get(0) else {
        return Err(descriptor("is_integer", "float", args.get(0)));
    };
    arity(&args, "is_integer", 0, 0)?;
    Ok(Val::Bool(f.is_finite() && f.fract() == 0.0))
}

fn complex_conjugate(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let Some(Val::Complex(c)) = args.get(0) else {
        return Err(descriptor("conjugate", "complex", args.get(0)));
    };
    arity(&args, "conjugate", 0, 0)?;
    Ok(Val::Complex(c.conj()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_name_resolves() {
        for ty in [
            BuiltinType::Str,
            BuiltinType::List,
            BuiltinType::Dict,
            BuiltinType::Tuple,
            BuiltinType::Int,
            BuiltinType::Float,
            BuiltinType::Complex,
        ] {
            for name in names(ty) {
                assert!(lookup(ty, name).is_some(), "{}.{}", ty.name(), name);
            }
        }
        assert!(lookup(BuiltinType::Bool, "bit_length").is_some());
        assert!(lookup(BuiltinType::Str, "append").is_none());
    }

    #[test]
    fn test_whitespace_splitting() {
        assert_eq!(split_whitespace("  a b\tc  ", -1), vec!["a", "b", "c"]);
        assert_eq!(split_whitespace("a b  c", 1), vec!["a", "b  c"]);
        assert_eq!(rsplit_whitespace("a b  c", 1), vec!["a b", "c"]);
        assert!(split_whitespace("   ", -1).is_empty());
    }

    #[test]
    fn test_window_resolves_negative_bounds() {
        let s = "héllo";
        let (from, to, first) = window(s, Some(&Val::Int(1)), Some(&Val::Int(-1)))
            .unwrap()
            .unwrap();
        assert_eq!(&s[from..to], "éll");
        assert_eq!(first, 1);
        assert!(window(s, Some(&Val::Int(4)), Some(&Val::Int(2))).unwrap().is_none());
    }
}
