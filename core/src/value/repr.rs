//! Text rendering shared by host values and guest objects

/// Render a float the way the guest language prints it
///
/// Integral values keep a trailing `.0`; very large or very small
/// magnitudes switch to exponent notation with a signed two-digit exponent.
pub(crate) fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{:e}", f);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exp: i32 = exponent.parse().unwrap_or(0);

    if (-4..16).contains(&exp) {
        let plain = format!("{}", f);
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    }
}

/// Render a complex number as `(re+imj)`, or `imj` when the real part is zero
pub(crate) fn complex_repr(re: f64, im: f64) -> String {
    let imag = trim_float(im);
    if re == 0.0 && !re.is_sign_negative() {
        return format!("{}j", imag);
    }
    let sign = if im < 0.0 || (im == 0.0 && im.is_sign_negative()) {
        ""
    } else {
        "+"
    };
    format!("({}{}{}j)", trim_float(re), sign, imag)
}

fn trim_float(f: f64) -> String {
    let s = float_repr(f);
    match s.strip_suffix(".0") {
        Some(trimmed) => trimmed.to_string(),
        None => s,
    }
}

/// Quote a string literal, preferring single quotes
pub(crate) fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_repr_matches_guest_rules() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(-2.5), "-2.5");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(123456789.0), "123456789.0");
        assert_eq!(float_repr(f64::INFINITY), "inf");
        assert_eq!(float_repr(f64::NAN), "nan");
    }

    #[test]
    fn test_complex_repr() {
        assert_eq!(complex_repr(0.0, 2.0), "2j");
        assert_eq!(complex_repr(1.0, -2.5), "(1-2.5j)");
        assert_eq!(complex_repr(1.5, 2.0), "(1.5+2j)");
    }

    #[test]
    fn test_string_repr_quotes() {
        assert_eq!(string_repr("abc"), "'abc'");
        assert_eq!(string_repr("it's"), "\"it's\"");
        assert_eq!(string_repr("a\nb"), "'a\\nb'");
    }
}
