//! `string`

use super::Members;
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::executor::Interpreter;
use crate::interpreter::object::{Args, Val};

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;
const WHITESPACE: &str = " \t\n\r\x0b\x0c";

pub(super) fn members() -> Members {
    let letters = format!("{}{}", LOWERCASE, UPPERCASE);
    let printable = format!("{}{}{}{}", DIGITS, letters, PUNCTUATION, WHITESPACE);
    vec![
        ("ascii_lowercase", Val::from(LOWERCASE)),
        ("ascii_uppercase", Val::from(UPPERCASE)),
        ("ascii_letters", Val::from(letters)),
        ("digits", Val::from(DIGITS)),
        ("hexdigits", Val::from("0123456789abcdefABCDEF")),
        ("octdigits", Val::from("01234567")),
        ("punctuation", Val::from(PUNCTUATION)),
        ("whitespace", Val::from(WHITESPACE)),
        ("printable", Val::from(printable)),
        ("capwords", Val::Native(native!("capwords", capwords))),
    ]
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
        None => String::new(),
    }
}

fn capwords(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("capwords", 1, 2)?;
    let Val::Str(text) = &args.positional[0] else {
        return Err(Throw::type_error("capwords() argument must be str"));
    };
    let out = match args.get(1) {
        None | Some(Val::None) => text
            .split_whitespace()
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" "),
        Some(Val::Str(sep)) if !sep.is_empty() => text
            .split(&**sep)
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(sep),
        Some(Val::Str(_)) => return Err(Throw::value_error("empty separator")),
        Some(other) => {
            return Err(Throw::type_error(format!(
                "must be str or None, not {}",
                other.type_name()
            )))
        }
    };
    Ok(Val::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize_word() {
        assert_eq!(capitalize("hELLO"), "Hello");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_printable_contains_every_class() {
        let members = members();
        let printable = members
            .iter()
            .find(|(name, _)| *name == "printable")
            .and_then(|(_, v)| v.as_str().map(str::to_string))
            .unwrap();
        assert_eq!(printable.len(), 100);
    }
}
